use std::error::Error;

/// A set of parameters whose values have not been checked for validity. The
/// checked counterpart can only be obtained through `check_ref()` or
/// `check()`, so every code path that consumes parameters goes through
/// validation first.
///
/// The validation performed by `check_ref()` and `check()` must be
/// identical.
pub trait ParamGuard {
    /// The checked counterpart of this parameter set.
    type Checked;
    type Error: Error;

    /// Checks the parameters and returns a reference to the checked set on
    /// success.
    fn check_ref(&self) -> Result<&Self::Checked, Self::Error>;

    /// Checks the parameters and returns the checked set by value.
    fn check(self) -> Result<Self::Checked, Self::Error>;

    /// Calls `check()` and unwraps the result.
    ///
    /// **Panics** if any of the validation checks fail.
    fn check_unwrap(self) -> Self::Checked
    where
        Self: Sized,
    {
        self.check()
            .unwrap_or_else(|err| panic!("invalid parameters: {}", err))
    }
}
