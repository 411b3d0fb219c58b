//! TALLY Enrich - Address-to-Labels Enrichment
//!
//! Derives extra labels for a label-set from its `instance` address:
//! a reverse lookup yields `__domain`, and when a swarm inspector is
//! available, swarm-style domains (`service.slot.task...`) also yield
//! `__service`, `__task`, `__container` and `__host`.
//!
//! Resolved labels are memoized per host for a short window. On a name
//! collision the label-set's own labels always win over derived ones.

pub mod address;
pub mod config;
pub mod enricher;
pub mod resolver;

pub use address::split_host_port;
pub use config::EnrichConfig;
pub use enricher::Enricher;
pub use resolver::{HostResolver, SwarmInspector};
