//! Memoizing label enricher

use std::collections::HashMap;
use std::sync::Arc;

use tally_core::constants::INSTANCE_LABEL;
use tally_core::{Clock, LabelSet, SystemClock, TallyResult, Timestamp};
use tokio::sync::RwLock;

use crate::address::split_host_port;
use crate::config::EnrichConfig;
use crate::resolver::{HostResolver, SwarmInspector};

/// Name the instance address resolved back to.
pub const DOMAIN_LABEL: &str = "__domain";
/// First component of a swarm domain.
pub const SERVICE_LABEL: &str = "__service";
/// First two components of a swarm domain.
pub const TASK_LABEL: &str = "__task";
/// First three components of a swarm domain; the container name.
pub const CONTAINER_LABEL: &str = "__container";
/// Hostname of the node running the container.
pub const HOST_LABEL: &str = "__host";

/// Minimum dot-separated components for a domain to be read as swarm-style.
const SWARM_DOMAIN_PARTS: usize = 3;

#[derive(Debug, Clone)]
struct Memo {
    labels: LabelSet,
    resolved_at: Timestamp,
}

/// Adds address-derived labels to label-sets.
///
/// Lookups run without holding the memo lock, so two concurrent calls for
/// the same cold host may both resolve it; the later result wins.
pub struct Enricher {
    resolver: Arc<dyn HostResolver>,
    inspector: Option<Arc<dyn SwarmInspector>>,
    memo: RwLock<HashMap<String, Memo>>,
    memo_window: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl Enricher {
    /// Create an enricher without swarm inspection.
    pub fn new(config: &EnrichConfig, resolver: Arc<dyn HostResolver>) -> TallyResult<Self> {
        config.validate()?;
        Ok(Self {
            resolver,
            inspector: None,
            memo: RwLock::new(HashMap::new()),
            memo_window: config.memo_window(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Enable swarm labels.
    pub fn with_inspector(mut self, inspector: Arc<dyn SwarmInspector>) -> Self {
        tracing::info!("Swarm label enrichment enabled");
        self.inspector = Some(inspector);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Return `labels` extended with the labels derived from its `instance`.
    ///
    /// Sets without a parseable `instance`, or whose host does not resolve,
    /// are returned unchanged. Existing labels are never overwritten.
    pub async fn enrich(&self, labels: &LabelSet) -> LabelSet {
        let Some(instance) = labels.get(INSTANCE_LABEL) else {
            return labels.clone();
        };
        let Some((host, _port)) = split_host_port(instance) else {
            tracing::debug!(instance, "Unparseable instance address");
            return labels.clone();
        };

        if let Some(memo) = self.memo.read().await.get(host) {
            if self.clock.now() - memo.resolved_at < self.memo_window {
                return labels.merged_with(&memo.labels);
            }
        }

        let Some(domain) = self.resolver.reverse_lookup(host).await else {
            tracing::debug!(host, "Reverse lookup returned no name");
            return labels.clone();
        };

        if let Some(labels) = self.refresh_if_unchanged(host, &domain, labels).await {
            return labels;
        }

        let derived = self.derive(&domain).await;
        let enriched = labels.merged_with(&derived);
        self.remember(host, derived).await;
        enriched
    }

    /// Memoize `derived` for `host`, dropping every other stale memo.
    async fn remember(&self, host: &str, derived: LabelSet) {
        let now = self.clock.now();
        let mut memo = self.memo.write().await;

        let before = memo.len();
        memo.retain(|_, m| now - m.resolved_at < self.memo_window);
        let pruned = before - memo.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped stale enrichment memos");
        }

        memo.insert(
            host.to_string(),
            Memo {
                labels: derived,
                resolved_at: now,
            },
        );
    }

    /// Enrich every label-set of a batch in place.
    pub async fn enrich_all(&self, sets: &mut [LabelSet]) {
        for set in sets.iter_mut() {
            *set = self.enrich(set).await;
        }
    }

    /// Number of memoized hosts. Stale memos linger until the next
    /// resolution is stored.
    pub async fn memo_len(&self) -> usize {
        self.memo.read().await.len()
    }

    /// Keep a stale memo whose domain still matches, evict it otherwise.
    async fn refresh_if_unchanged(
        &self,
        host: &str,
        domain: &str,
        labels: &LabelSet,
    ) -> Option<LabelSet> {
        let mut memo = self.memo.write().await;
        let unchanged = memo
            .get(host)
            .map(|m| m.labels.get(DOMAIN_LABEL) == Some(domain))?;

        if unchanged {
            let entry = memo.get_mut(host)?;
            entry.resolved_at = self.clock.now();
            return Some(labels.merged_with(&entry.labels));
        }

        memo.remove(host);
        tracing::debug!(host, domain, "Resolved domain changed, memo evicted");
        None
    }

    async fn derive(&self, domain: &str) -> LabelSet {
        let mut derived = LabelSet::new().with(DOMAIN_LABEL, domain);
        let Some(inspector) = &self.inspector else {
            return derived;
        };

        let parts: Vec<&str> = domain.strip_suffix('.').unwrap_or(domain).split('.').collect();
        if parts.len() < SWARM_DOMAIN_PARTS {
            return derived;
        }

        let container = parts[..SWARM_DOMAIN_PARTS].join(".");
        derived.insert(SERVICE_LABEL, parts[0]);
        derived.insert(TASK_LABEL, parts[..2].join("."));
        if let Some(node) = inspector.node_hostname(&container).await {
            derived.insert(HOST_LABEL, node);
        }
        derived.insert(CONTAINER_LABEL, container);
        derived
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("swarm", &self.inspector.is_some())
            .field("memo_window", &self.memo_window)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tally_test_utils::{fixed_clock, init_test_tracing, ManualClock};

    #[derive(Default)]
    struct MockResolver {
        names: Mutex<HashMap<String, String>>,
        lookups: AtomicUsize,
    }

    impl MockResolver {
        fn with(host: &str, name: &str) -> Arc<Self> {
            let resolver = Self::default();
            resolver.answer(host, name);
            Arc::new(resolver)
        }

        fn answer(&self, host: &str, name: &str) {
            self.names
                .lock()
                .unwrap()
                .insert(host.to_string(), name.to_string());
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HostResolver for MockResolver {
        async fn reverse_lookup(&self, host: &str) -> Option<String> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.names.lock().unwrap().get(host).cloned()
        }
    }

    struct MockSwarm {
        nodes: HashMap<String, String>,
    }

    #[async_trait]
    impl SwarmInspector for MockSwarm {
        async fn node_hostname(&self, container: &str) -> Option<String> {
            self.nodes.get(container).cloned()
        }
    }

    fn enricher(resolver: Arc<MockResolver>) -> (Enricher, ManualClock) {
        init_test_tracing();
        let clock = fixed_clock();
        let enricher = Enricher::new(&EnrichConfig::default(), resolver)
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (enricher, clock)
    }

    fn swarm(container: &str, node: &str) -> Arc<MockSwarm> {
        Arc::new(MockSwarm {
            nodes: HashMap::from([(container.to_string(), node.to_string())]),
        })
    }

    fn target(instance: &str) -> LabelSet {
        LabelSet::new()
            .with("__name__", "up")
            .with("instance", instance)
    }

    #[tokio::test]
    async fn test_without_instance_is_untouched() {
        let resolver = MockResolver::with("10.0.0.1", "db.internal");
        let (enricher, _clock) = enricher(resolver.clone());

        let set = LabelSet::new().with("__name__", "up");
        assert_eq!(enricher.enrich(&set).await, set);
        assert_eq!(resolver.lookups(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_instance_is_untouched() {
        let resolver = MockResolver::with("10.0.0.1", "db.internal");
        let (enricher, _clock) = enricher(resolver.clone());

        let set = target("10.0.0.1");
        assert_eq!(enricher.enrich(&set).await, set);
        assert_eq!(resolver.lookups(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_host_is_untouched() {
        let (enricher, _clock) = enricher(Arc::new(MockResolver::default()));

        let set = target("10.0.0.9:9100");
        assert_eq!(enricher.enrich(&set).await, set);
        assert_eq!(enricher.memo_len().await, 0);
    }

    #[tokio::test]
    async fn test_domain_label_added() {
        let (enricher, _clock) = enricher(MockResolver::with("10.0.0.1", "db.internal."));

        let out = enricher.enrich(&target("10.0.0.1:9100")).await;
        assert_eq!(out.get(DOMAIN_LABEL), Some("db.internal."));
        assert_eq!(out.get(SERVICE_LABEL), None);
        assert_eq!(out.get("instance"), Some("10.0.0.1:9100"));
    }

    #[tokio::test]
    async fn test_swarm_labels() {
        let resolver = MockResolver::with("10.0.1.5", "web.1.x7k2p9.ingress.");
        let (enricher, _clock) = enricher(resolver);
        let enricher = enricher.with_inspector(swarm("web.1.x7k2p9", "node-7"));

        let out = enricher.enrich(&target("10.0.1.5:8080")).await;
        assert_eq!(out.get(DOMAIN_LABEL), Some("web.1.x7k2p9.ingress."));
        assert_eq!(out.get(SERVICE_LABEL), Some("web"));
        assert_eq!(out.get(TASK_LABEL), Some("web.1"));
        assert_eq!(out.get(CONTAINER_LABEL), Some("web.1.x7k2p9"));
        assert_eq!(out.get(HOST_LABEL), Some("node-7"));
    }

    #[tokio::test]
    async fn test_swarm_labels_without_known_node() {
        let resolver = MockResolver::with("10.0.1.5", "web.1.x7k2p9");
        let (enricher, _clock) = enricher(resolver);
        let enricher = enricher.with_inspector(swarm("other.1.aaaa", "node-1"));

        let out = enricher.enrich(&target("10.0.1.5:8080")).await;
        assert_eq!(out.get(CONTAINER_LABEL), Some("web.1.x7k2p9"));
        assert_eq!(out.get(HOST_LABEL), None);
    }

    #[tokio::test]
    async fn test_short_domain_skips_swarm_labels() {
        let resolver = MockResolver::with("10.0.1.5", "db.internal.");
        let (enricher, _clock) = enricher(resolver);
        let enricher = enricher.with_inspector(swarm("db.internal", "node-1"));

        let out = enricher.enrich(&target("10.0.1.5:8080")).await;
        assert_eq!(out.get(DOMAIN_LABEL), Some("db.internal."));
        assert_eq!(out.get(SERVICE_LABEL), None);
        assert_eq!(out.get(HOST_LABEL), None);
    }

    #[tokio::test]
    async fn test_own_labels_win() {
        let (enricher, _clock) = enricher(MockResolver::with("10.0.0.1", "db.internal"));

        let set = target("10.0.0.1:9100").with(DOMAIN_LABEL, "pinned");
        let out = enricher.enrich(&set).await;
        assert_eq!(out.get(DOMAIN_LABEL), Some("pinned"));
    }

    #[tokio::test]
    async fn test_memoized_within_window() {
        let resolver = MockResolver::with("10.0.0.1", "db.internal");
        let (enricher, clock) = enricher(resolver.clone());

        enricher.enrich(&target("10.0.0.1:9100")).await;
        clock.advance_secs(4);
        let out = enricher.enrich(&target("10.0.0.1:9200")).await;

        assert_eq!(resolver.lookups(), 1);
        assert_eq!(out.get(DOMAIN_LABEL), Some("db.internal"));
        assert_eq!(out.get("instance"), Some("10.0.0.1:9200"));
    }

    #[tokio::test]
    async fn test_unchanged_domain_refreshes_memo() {
        let resolver = MockResolver::with("10.0.0.1", "db.internal");
        let (enricher, clock) = enricher(resolver.clone());

        enricher.enrich(&target("10.0.0.1:9100")).await;
        clock.advance_secs(6);
        enricher.enrich(&target("10.0.0.1:9100")).await;
        assert_eq!(resolver.lookups(), 2);

        // Refreshed at t=6s, so t=9s is still inside the window
        clock.advance_secs(3);
        enricher.enrich(&target("10.0.0.1:9100")).await;
        assert_eq!(resolver.lookups(), 2);
        assert_eq!(enricher.memo_len().await, 1);
    }

    #[tokio::test]
    async fn test_changed_domain_rebuilds_labels() {
        let resolver = MockResolver::with("10.0.1.5", "web.1.aaaa");
        let (enricher, clock) = enricher(resolver.clone());
        let enricher = enricher.with_inspector(swarm("web.1.aaaa", "node-1"));

        let first = enricher.enrich(&target("10.0.1.5:80")).await;
        assert_eq!(first.get(HOST_LABEL), Some("node-1"));

        resolver.answer("10.0.1.5", "api.2.bbbb");
        clock.advance(chrono::Duration::seconds(6));
        let second = enricher.enrich(&target("10.0.1.5:80")).await;

        assert_eq!(second.get(DOMAIN_LABEL), Some("api.2.bbbb"));
        assert_eq!(second.get(SERVICE_LABEL), Some("api"));
        assert_eq!(second.get(HOST_LABEL), None);
        assert_eq!(enricher.memo_len().await, 1);
    }

    #[tokio::test]
    async fn test_custom_memo_window() {
        let resolver = MockResolver::with("10.0.0.1", "db.internal");
        let clock = fixed_clock();
        let config = EnrichConfig::default().with_memo_ttl(Duration::from_millis(500));
        let enricher = Enricher::new(&config, resolver.clone())
            .unwrap()
            .with_clock(Arc::new(clock.clone()));

        enricher.enrich(&target("10.0.0.1:9100")).await;
        clock.advance_secs(1);
        enricher.enrich(&target("10.0.0.1:9100")).await;
        assert_eq!(resolver.lookups(), 2);
    }

    #[tokio::test]
    async fn test_stale_memos_dropped_on_next_store() {
        let resolver = Arc::new(MockResolver::default());
        for i in 1..=3 {
            resolver.answer(&format!("10.0.0.{}", i), &format!("n{}.internal", i));
        }
        let (enricher, clock) = enricher(resolver.clone());

        enricher.enrich(&target("10.0.0.1:9100")).await;
        enricher.enrich(&target("10.0.0.2:9100")).await;
        assert_eq!(enricher.memo_len().await, 2);

        clock.advance_secs(6);
        enricher.enrich(&target("10.0.0.3:9100")).await;
        assert_eq!(enricher.memo_len().await, 1);

        // A pruned host simply resolves again
        let out = enricher.enrich(&target("10.0.0.1:9100")).await;
        assert_eq!(out.get(DOMAIN_LABEL), Some("n1.internal"));
        assert_eq!(resolver.lookups(), 4);
        assert_eq!(enricher.memo_len().await, 2);
    }

    #[tokio::test]
    async fn test_enrich_all() {
        let resolver = Arc::new(MockResolver::default());
        resolver.answer("10.0.0.1", "a.internal");
        resolver.answer("10.0.0.2", "b.internal");
        let (enricher, _clock) = enricher(resolver.clone());

        let mut batch = vec![
            target("10.0.0.1:9100"),
            target("10.0.0.2:9100"),
            target("10.0.0.1:9200"),
            LabelSet::new().with("__name__", "orphan"),
        ];
        enricher.enrich_all(&mut batch).await;

        assert_eq!(batch[0].get(DOMAIN_LABEL), Some("a.internal"));
        assert_eq!(batch[1].get(DOMAIN_LABEL), Some("b.internal"));
        assert_eq!(batch[2].get(DOMAIN_LABEL), Some("a.internal"));
        assert_eq!(batch[3].get(DOMAIN_LABEL), None);
        assert_eq!(resolver.lookups(), 2);
    }

    #[test]
    fn test_zero_memo_window_rejected() {
        let config = EnrichConfig::default().with_memo_ttl(Duration::ZERO);
        assert!(Enricher::new(&config, Arc::new(MockResolver::default())).is_err());
    }
}
