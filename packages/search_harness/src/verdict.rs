use derive_more::derive::Display;

/// Below this speedup, the second configuration is slower than the first.
pub const BAD_SPEEDUP: f64 = 0.9;

/// The smallest speedup that counts as an improvement.
pub const MIN_SPEEDUP: f64 = 1.1;

/// The smallest speedup that counts as a moderate improvement.
pub const MOD_SPEEDUP: f64 = 1.5;

/// The smallest speedup that counts as a strong improvement.
pub const MAX_SPEEDUP: f64 = 2.0;

/// Informational classification of a speedup.
///
/// # Example
///
/// ```
/// use search_harness::SpeedupVerdict;
///
/// assert_eq!(SpeedupVerdict::classify(1.7), SpeedupVerdict::Moderate);
/// assert_eq!(SpeedupVerdict::classify(0.5).to_string(), "regression");
/// ```
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum SpeedupVerdict {
    /// The second configuration is noticeably slower.
    #[display("regression")]
    Regression,

    /// No meaningful difference either way.
    #[display("negligible")]
    Negligible,

    /// Faster, by the smallest acceptable margin.
    #[display("minimum acceptable")]
    Minimum,

    /// Moderately faster.
    #[display("moderate")]
    Moderate,

    /// At least twice as fast.
    #[display("strong")]
    Strong,
}

impl SpeedupVerdict {
    /// Classifies `speedup`. A speedup that is not a number counts as a regression.
    #[must_use]
    pub fn classify(speedup: f64) -> Self {
        if speedup.is_nan() || speedup < BAD_SPEEDUP {
            Self::Regression
        } else if speedup < MIN_SPEEDUP {
            Self::Negligible
        } else if speedup < MOD_SPEEDUP {
            Self::Minimum
        } else if speedup < MAX_SPEEDUP {
            Self::Moderate
        } else {
            Self::Strong
        }
    }
}
