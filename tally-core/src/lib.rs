//! TALLY Core - Label Types and Shared Infrastructure
//!
//! Label-sets, their content hash, the clock abstraction, error types and
//! configuration. All other crates depend on this.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod labels;

pub use clock::{expiry_after, is_live, Clock, ManualClock, SystemClock, Timestamp};
pub use config::RegistryConfig;
pub use error::{ConfigError, LabelError, RegistryError, TallyError, TallyResult};
pub use labels::{Label, LabelSet};
