//! Normalized service descriptions handed to the publisher.

use crate::Result;
use crate::endpoint::EndpointDefinition;
use crate::marker::content_hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute carrying the gateway type on every description.
pub const GATEWAY_TYPE_ATTRIBUTE: &str = "GatewayType";

/// Instance detail carrying the cache key of the published item.
pub const CACHE_KEY_DETAIL: &str = "cacheKey";

/// Agent detail carrying the product modification date.
pub const PRODUCT_MOD_DATE_DETAIL: &str = "productModDate";

/// Agent detail carrying the hash of the embedded spec content.
pub const SPEC_CONTENT_HASH_DETAIL: &str = "specContentHash";

/// Credential types a service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialType {
    /// API key credentials.
    ApiKey,
    /// OAuth 2 client credentials.
    OAuth,
}

/// Severity attached to a republished description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum UpdateSeverity {
    /// Breaking change; consumers must re-derive everything.
    Major,
}

/// Service description built by a poller from remote metadata.
///
/// The fingerprint covers every field, so two descriptions built from the
/// same remote state always fingerprint identically. Details stamped by the
/// [`PublishCoordinator`](crate::PublishCoordinator) are added after the
/// fingerprint is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    /// Catalog ID the description is published under.
    pub id: String,
    /// API name.
    pub name: String,
    /// Display title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Version label, the proxy revision for proxies.
    pub version: Option<String>,
    /// Stage label, the environment for proxies.
    pub stage: Option<String>,
    /// Specification document bytes, empty for bare registrations.
    #[serde(with = "spec_bytes")]
    pub spec: Vec<u8>,
    /// Endpoints the service is reachable at.
    pub endpoints: Vec<EndpointDefinition>,
    /// Service attributes.
    pub attributes: BTreeMap<String, String>,
    /// Agent-owned details on the service.
    pub agent_details: BTreeMap<String, String>,
    /// Agent-owned details on the service instance.
    pub instance_details: BTreeMap<String, String>,
    /// Accepted credential types.
    pub credential_types: Vec<CredentialType>,
    /// Whether a quota policy is enforced.
    pub quota_enforced: bool,
    /// Set when the description replaces an earlier publication.
    pub update_severity: Option<UpdateSeverity>,
}

impl ServiceDescription {
    /// Empty description for `id`, named after it.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            title: id.clone(),
            id,
            description: String::new(),
            version: None,
            stage: None,
            spec: Vec::new(),
            endpoints: Vec::new(),
            attributes: BTreeMap::new(),
            agent_details: BTreeMap::new(),
            instance_details: BTreeMap::new(),
            credential_types: Vec::new(),
            quota_enforced: false,
            update_severity: None,
        }
    }

    /// Set the display title, keeping the id when `title` is blank.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.trim().is_empty() {
            self.title = title;
        }
        self
    }

    /// Set the free-form description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the version label.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the stage label.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Attach specification bytes.
    #[must_use]
    pub fn with_spec(mut self, spec: Vec<u8>) -> Self {
        self.spec = spec;
        self
    }

    /// Attach endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Vec<EndpointDefinition>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Add a service attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add an agent detail.
    #[must_use]
    pub fn with_agent_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.agent_details.insert(key.into(), value.into());
        self
    }

    /// Record an accepted credential type once.
    #[must_use]
    pub fn with_credential_type(mut self, credential: CredentialType) -> Self {
        if !self.credential_types.contains(&credential) {
            self.credential_types.push(credential);
            self.credential_types.sort();
        }
        self
    }

    /// Mark the service as quota-enforced.
    #[must_use]
    pub const fn with_quota(mut self, enforced: bool) -> Self {
        self.quota_enforced = enforced;
        self
    }

    /// Whether a specification document is attached.
    pub fn has_spec(&self) -> bool {
        !self.spec.is_empty()
    }

    /// SHA-256 fingerprint of the canonical JSON form.
    pub fn fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        Ok(content_hash(&canonical))
    }
}

mod spec_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
