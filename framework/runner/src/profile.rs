use std::time::Duration;

use loadline_core::prelude::{parse_duration, ConfigError, SchedulerError};

/// One segment of a staged ramp. The target is reached at the end of the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }

    /// Parse a stage from `<duration>:<target>`, for example `2m:100`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidStage {
            value: value.to_string(),
        };

        let (duration, target) = value.rsplit_once(':').ok_or_else(invalid)?;
        let duration = parse_duration(duration).map_err(|_| invalid())?;
        let target = target.trim().parse::<usize>().map_err(|_| invalid())?;

        Ok(Self { duration, target })
    }
}

/// How many virtual users should be running over the course of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunConfig {
    /// Hold `vus` virtual users for the whole `duration`.
    Constant { vus: usize, duration: Duration },
    /// Ramp linearly through each stage in turn, starting from zero.
    Staged { stages: Vec<Stage> },
}

impl RunConfig {
    pub fn constant(vus: usize, duration: Duration) -> Self {
        RunConfig::Constant { vus, duration }
    }

    pub fn staged(stages: Vec<Stage>) -> Self {
        RunConfig::Staged { stages }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let RunConfig::Staged { stages } = self {
            if stages.is_empty() {
                return Err(ConfigError::EmptyProfile);
            }
        }

        if self.total_duration().is_zero() {
            return Err(ConfigError::ZeroDuration);
        }

        Ok(())
    }

    /// Wall clock time the profile covers. Draining after the deadline is not included.
    pub fn total_duration(&self) -> Duration {
        match self {
            RunConfig::Constant { duration, .. } => *duration,
            RunConfig::Staged { stages } => stages.iter().map(|s| s.duration).sum(),
        }
    }

    /// The largest number of virtual users the profile ever asks for.
    pub fn peak_target(&self) -> usize {
        match self {
            RunConfig::Constant { vus, .. } => *vus,
            RunConfig::Staged { stages } => stages.iter().map(|s| s.target).max().unwrap_or(0),
        }
    }

    /// The number of virtual users that should be running `elapsed` into the run.
    ///
    /// Within a stage the target moves linearly from the previous stage's target to this stage's
    /// target and is rounded to the nearest whole user. A stage with no duration jumps straight to
    /// its target. Past the end of the profile the last target holds.
    pub fn target_at(&self, elapsed: Duration) -> Result<usize, SchedulerError> {
        let stages = match self {
            RunConfig::Constant { vus, .. } => return Ok(*vus),
            RunConfig::Staged { stages } => stages,
        };

        let mut previous = 0usize;
        let mut stage_start = Duration::ZERO;
        for stage in stages {
            let stage_end = stage_start + stage.duration;
            if !stage.duration.is_zero() && elapsed < stage_end {
                let fraction = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let value =
                    previous as f64 + fraction * (stage.target as f64 - previous as f64);

                return to_target(value, elapsed);
            }

            previous = stage.target;
            stage_start = stage_end;
        }

        Ok(previous)
    }
}

fn to_target(value: f64, elapsed: Duration) -> Result<usize, SchedulerError> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 0.0 {
        return Err(SchedulerError::InvalidTarget { value, elapsed });
    }

    Ok(rounded as usize)
}
