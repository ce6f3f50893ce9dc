//! Idempotent publish coordination.
//!
//! Pollers run concurrently and may target the same catalog ID (a product and
//! a proxy revision sharing a name, for instance). The [`PublishCoordinator`]
//! is the single serialization point: the "is published / read recorded
//! fingerprint / publish" sequence runs under one lock, so a fingerprint is
//! never published twice.

use crate::Result;
use crate::description::{
    CACHE_KEY_DETAIL, GATEWAY_TYPE_ATTRIBUTE, ServiceDescription, UpdateSeverity,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};

/// Downstream registry that descriptions are published to.
///
/// The publisher owns the published records. The engine only reads them back
/// through [`is_published`](Publisher::is_published) and
/// [`get_attribute`](Publisher::get_attribute).
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Whether anything has been published under `catalog_id`.
    fn is_published(&self, catalog_id: &str) -> bool;

    /// Agent attribute recorded on the published entity.
    fn get_attribute(&self, catalog_id: &str, key: &str) -> Option<String>;

    /// Publish a description. Its agent details become the entity's
    /// recorded attributes only when this succeeds.
    async fn publish(&self, description: &ServiceDescription) -> Result<()>;
}

/// Where a description is published and where its fingerprint is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogKey {
    /// Catalog ID on the publisher.
    pub catalog_id: String,
    /// Attribute the fingerprint is recorded under.
    pub attribute: String,
    /// Cache key stamped into the instance details.
    pub cache_key: String,
}

impl CatalogKey {
    /// Key for a product.
    pub fn product(name: &str) -> Self {
        Self {
            catalog_id: name.to_string(),
            attribute: "hash".to_string(),
            cache_key: format!("apiproduct-{name}"),
        }
    }

    /// Key for a proxy deployed to `environment`.
    ///
    /// Each environment records its own fingerprint on the same entity.
    pub fn proxy(name: &str, environment: &str) -> Self {
        Self {
            catalog_id: name.to_string(),
            attribute: format!("{environment}-hash"),
            cache_key: format!("apiproxy-{environment}-{name}"),
        }
    }
}

/// Outcome of a publish decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Fingerprint already recorded; nothing to do.
    Skip,
    /// Never published before.
    Create,
    /// Published with a different fingerprint.
    Update,
}

impl Decision {
    /// Stable name for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializes publish decisions across every poller.
pub struct PublishCoordinator {
    publisher: Arc<dyn Publisher>,
    gateway_type: String,
    lock: tokio::sync::Mutex<()>,
}

impl fmt::Debug for PublishCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishCoordinator")
            .field("gateway_type", &self.gateway_type)
            .finish_non_exhaustive()
    }
}

impl PublishCoordinator {
    /// Coordinate publishes to `publisher`, stamping `gateway_type` on every
    /// description.
    pub fn new(publisher: Arc<dyn Publisher>, gateway_type: impl Into<String>) -> Self {
        Self {
            publisher,
            gateway_type: gateway_type.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Decide what publishing `fingerprint` under `key` would do.
    pub async fn decide(&self, key: &CatalogKey, fingerprint: &str) -> Decision {
        let _guard = self.lock.lock().await;
        self.decide_locked(key, fingerprint)
    }

    fn decide_locked(&self, key: &CatalogKey, fingerprint: &str) -> Decision {
        if !self.publisher.is_published(&key.catalog_id) {
            return Decision::Create;
        }
        match self.publisher.get_attribute(&key.catalog_id, &key.attribute) {
            Some(recorded) if recorded == fingerprint => Decision::Skip,
            _ => Decision::Update,
        }
    }

    /// Decide and, unless skipping, publish `description`.
    ///
    /// The lock is held from the decision until the publisher returns, so
    /// concurrent submits of the same fingerprint publish it once. A failed
    /// publish leaves the recorded fingerprint untouched and the error is
    /// returned; the next cycle reaches the same decision again.
    pub async fn submit(
        &self,
        key: &CatalogKey,
        fingerprint: &str,
        mut description: ServiceDescription,
    ) -> Result<Decision> {
        let _guard = self.lock.lock().await;

        let decision = self.decide_locked(key, fingerprint);
        match decision {
            Decision::Skip => {
                trace!(catalog_id = %key.catalog_id, "fingerprint unchanged, skipping");
                return Ok(decision);
            },
            Decision::Update => {
                debug!(catalog_id = %key.catalog_id, "fingerprint changed, publishing update");
                description.update_severity = Some(UpdateSeverity::Major);
                description.spec.clear();
            },
            Decision::Create => {},
        }

        description
            .attributes
            .insert(GATEWAY_TYPE_ATTRIBUTE.to_string(), self.gateway_type.clone());
        description
            .agent_details
            .insert(key.attribute.clone(), fingerprint.to_string());
        description
            .instance_details
            .insert(CACHE_KEY_DETAIL.to_string(), key.cache_key.clone());

        if let Err(e) = self.publisher.publish(&description).await {
            warn!(catalog_id = %key.catalog_id, %decision, "publish failed: {e}");
            return Err(e);
        }

        info!(
            catalog_id = %key.catalog_id,
            %decision,
            cache_key = %key.cache_key,
            "published service"
        );
        Ok(decision)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    attributes: HashMap<String, BTreeMap<String, String>>,
    history: Vec<ServiceDescription>,
    fail_next: usize,
}

/// In-memory [`Publisher`].
///
/// Records every successful publish and the agent attributes it carried.
/// Failures can be injected with [`fail_next`](MemoryPublisher::fail_next).
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    state: Mutex<MemoryState>,
}

impl MemoryPublisher {
    /// Empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `count` publishes.
    pub fn fail_next(&self, count: usize) {
        self.state().fail_next = count;
    }

    /// Number of successful publishes.
    pub fn publish_count(&self) -> usize {
        self.state().history.len()
    }

    /// Every successfully published description, oldest first.
    pub fn history(&self) -> Vec<ServiceDescription> {
        self.state().history.clone()
    }

    /// Most recent description published under `catalog_id`.
    pub fn last_published(&self, catalog_id: &str) -> Option<ServiceDescription> {
        self.state()
            .history
            .iter()
            .rev()
            .find(|d| d.id == catalog_id)
            .cloned()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    fn is_published(&self, catalog_id: &str) -> bool {
        self.state().attributes.contains_key(catalog_id)
    }

    fn get_attribute(&self, catalog_id: &str, key: &str) -> Option<String> {
        self.state()
            .attributes
            .get(catalog_id)
            .and_then(|attrs| attrs.get(key))
            .cloned()
    }

    async fn publish(&self, description: &ServiceDescription) -> Result<()> {
        let mut state = self.state();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(crate::Error::publish(&description.id, "injected failure"));
        }
        state
            .attributes
            .entry(description.id.clone())
            .or_default()
            .extend(description.agent_details.clone());
        state.history.push(description.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> (Arc<MemoryPublisher>, PublishCoordinator) {
        let publisher = Arc::new(MemoryPublisher::new());
        let coordinator = PublishCoordinator::new(publisher.clone(), "Apigee");
        (publisher, coordinator)
    }

    fn description(id: &str) -> ServiceDescription {
        ServiceDescription::new(id).with_spec(b"openapi: 3.0.0".to_vec())
    }

    #[test]
    fn test_catalog_keys() {
        let product = CatalogKey::product("orders");
        assert_eq!(product.attribute, "hash");
        assert_eq!(product.cache_key, "apiproduct-orders");

        let proxy = CatalogKey::proxy("orders-proxy", "prod");
        assert_eq!(proxy.catalog_id, "orders-proxy");
        assert_eq!(proxy.attribute, "prod-hash");
        assert_eq!(proxy.cache_key, "apiproxy-prod-orders-proxy");
    }

    #[tokio::test]
    async fn test_create_then_skip() {
        let (publisher, coordinator) = setup();
        let key = CatalogKey::product("orders");

        assert_eq!(coordinator.decide(&key, "fp1").await, Decision::Create);
        let first = coordinator.submit(&key, "fp1", description("orders")).await;
        assert_eq!(first.unwrap(), Decision::Create);

        for _ in 0..3 {
            assert_eq!(coordinator.decide(&key, "fp1").await, Decision::Skip);
            let again = coordinator.submit(&key, "fp1", description("orders")).await;
            assert_eq!(again.unwrap(), Decision::Skip);
        }
        assert_eq!(publisher.publish_count(), 1);
    }

    #[tokio::test]
    async fn test_created_description_is_stamped() {
        let (publisher, coordinator) = setup();
        let key = CatalogKey::product("orders");
        coordinator
            .submit(&key, "fp1", description("orders"))
            .await
            .unwrap();

        let published = publisher.last_published("orders").unwrap();
        assert_eq!(published.attributes["GatewayType"], "Apigee");
        assert_eq!(published.agent_details["hash"], "fp1");
        assert_eq!(published.instance_details["cacheKey"], "apiproduct-orders");
        assert_eq!(published.update_severity, None);
        assert!(published.has_spec());
    }

    #[tokio::test]
    async fn test_update_is_major_and_clears_spec() {
        let (publisher, coordinator) = setup();
        let key = CatalogKey::product("orders");
        coordinator
            .submit(&key, "fp1", description("orders"))
            .await
            .unwrap();

        let decision = coordinator
            .submit(&key, "fp2", description("orders"))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Update);

        let published = publisher.last_published("orders").unwrap();
        assert_eq!(published.update_severity, Some(UpdateSeverity::Major));
        assert!(!published.has_spec());
        assert_eq!(publisher.get_attribute("orders", "hash").unwrap(), "fp2");
    }

    #[tokio::test]
    async fn test_failed_publish_keeps_old_fingerprint() {
        let (publisher, coordinator) = setup();
        let key = CatalogKey::product("orders");
        coordinator
            .submit(&key, "fp1", description("orders"))
            .await
            .unwrap();

        publisher.fail_next(1);
        let err = coordinator
            .submit(&key, "fp2", description("orders"))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(publisher.get_attribute("orders", "hash").unwrap(), "fp1");

        assert_eq!(coordinator.decide(&key, "fp2").await, Decision::Update);
        let retry = coordinator
            .submit(&key, "fp2", description("orders"))
            .await
            .unwrap();
        assert_eq!(retry, Decision::Update);
        assert_eq!(publisher.publish_count(), 2);
    }

    #[tokio::test]
    async fn test_environments_record_separately() {
        let (publisher, coordinator) = setup();
        let prod = CatalogKey::proxy("orders-proxy", "prod");
        let test = CatalogKey::proxy("orders-proxy", "test");

        let first = coordinator
            .submit(&prod, "fp-prod", description("orders-proxy"))
            .await
            .unwrap();
        assert_eq!(first, Decision::Create);

        // Same entity, new environment: no fingerprint recorded for it yet.
        assert_eq!(coordinator.decide(&test, "fp-test").await, Decision::Update);
        coordinator
            .submit(&test, "fp-test", description("orders-proxy"))
            .await
            .unwrap();

        assert_eq!(coordinator.decide(&prod, "fp-prod").await, Decision::Skip);
        assert_eq!(coordinator.decide(&test, "fp-test").await, Decision::Skip);
        assert_eq!(publisher.publish_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_submits_publish_once() {
        let (publisher, coordinator) = setup();
        let coordinator = Arc::new(coordinator);
        let key = CatalogKey::product("shared");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coordinator = Arc::clone(&coordinator);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .submit(&key, "fp", description("shared"))
                    .await
                    .unwrap()
            }));
        }

        let mut creates = 0;
        for handle in handles {
            if handle.await.unwrap() == Decision::Create {
                creates += 1;
            }
        }
        assert_eq!(creates, 1);
        assert_eq!(publisher.publish_count(), 1);
    }
}
