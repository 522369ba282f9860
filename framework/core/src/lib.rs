mod duration;
mod error;
mod shutdown;

pub mod prelude {
    pub use crate::duration::parse_duration;
    pub use crate::error::{ConfigError, SchedulerError};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, StopSignal};
}
