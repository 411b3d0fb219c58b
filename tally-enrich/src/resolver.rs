//! Lookup seams used by the enricher.
//!
//! Implementations are supplied by the host process (a DNS client, a
//! container orchestrator API). Failures are reported as `None`; the
//! enricher then leaves the label-set untouched.

use async_trait::async_trait;

/// Reverse name resolution.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// The first name the address resolves back to, if any.
    async fn reverse_lookup(&self, host: &str) -> Option<String>;
}

/// Swarm metadata lookups.
#[async_trait]
pub trait SwarmInspector: Send + Sync {
    /// Hostname of the node running `container`, if the container is known
    /// and carries a node assignment.
    async fn node_hostname(&self, container: &str) -> Option<String>;
}
