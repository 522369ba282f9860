use std::time::Duration;

use rand::Rng;

/// Produces a fresh value each time it is asked, for example a username that must not collide
/// with any other virtual user.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueGenerator {
    /// `prefix` followed by a nanoid
    Unique { prefix: String },
    /// `prefix` followed by a random number in `[0, 1)`
    Random { prefix: String },
    /// A random integer in the inclusive range
    Integer { min: u64, max: u64 },
}

impl ValueGenerator {
    pub fn unique(prefix: impl Into<String>) -> Self {
        ValueGenerator::Unique {
            prefix: prefix.into(),
        }
    }

    pub fn random(prefix: impl Into<String>) -> Self {
        ValueGenerator::Random {
            prefix: prefix.into(),
        }
    }

    pub fn generate(&self) -> String {
        match self {
            ValueGenerator::Unique { prefix } => format!("{prefix}{}", nanoid::nanoid!()),
            ValueGenerator::Random { prefix } => {
                format!("{prefix}{}", rand::thread_rng().gen::<f64>())
            }
            ValueGenerator::Integer { min, max } => {
                rand::thread_rng().gen_range(*min..=*max).to_string()
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            ValueGenerator::Integer { min, max } if min > max => {
                Err(format!("integer generator range {min}..={max} is empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Pacing delay after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThinkTime {
    Fixed(Duration),
    /// Uniformly distributed between the bounds, inclusive
    Uniform { min: Duration, max: Duration },
}

impl ThinkTime {
    pub fn sample(&self) -> Duration {
        match self {
            ThinkTime::Fixed(duration) => *duration,
            ThinkTime::Uniform { min, max } if min == max => *min,
            ThinkTime::Uniform { min, max } => rand::thread_rng().gen_range(*min..=*max),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            ThinkTime::Uniform { min, max } if min > max => {
                Err(format!("think time range {min:?}..={max:?} is empty"))
            }
            _ => Ok(()),
        }
    }
}

impl From<Duration> for ThinkTime {
    fn from(value: Duration) -> Self {
        ThinkTime::Fixed(value)
    }
}
