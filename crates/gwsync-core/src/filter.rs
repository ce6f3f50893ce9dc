//! Product discovery filtering.

use crate::types::{AGENT_PRODUCT_TAG, AGENT_PRODUCT_TAG_VALUE, ProductDetail};
use std::collections::BTreeMap;

/// Attribute never considered when filtering.
const IGNORED_ATTRIBUTE: &str = "access";

/// Why a product was not considered for publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Product passes.
    Accept,
    /// Product was provisioned by the agent itself.
    AgentProduct,
    /// Product lacks a required attribute value.
    Filtered,
}

/// Attribute-based product filter.
///
/// Every required attribute must be present with the exact value. Attribute
/// names compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryFilter {
    require: BTreeMap<String, String>,
}

impl DiscoveryFilter {
    /// Filter requiring each `name = value` pair.
    pub fn new(require: &BTreeMap<String, String>) -> Self {
        Self {
            require: require
                .iter()
                .map(|(name, value)| (name.to_lowercase(), value.clone()))
                .collect(),
        }
    }

    /// Whether the filter accepts everything.
    pub fn is_empty(&self) -> bool {
        self.require.is_empty()
    }

    /// Evaluate `product`.
    pub fn evaluate(&self, product: &ProductDetail) -> FilterOutcome {
        let attributes: BTreeMap<String, &str> = product
            .attributes
            .iter()
            .map(|att| (att.name.to_lowercase(), att.value.as_str()))
            .filter(|(name, _)| name != IGNORED_ATTRIBUTE)
            .collect();

        if attributes.get(AGENT_PRODUCT_TAG) == Some(&AGENT_PRODUCT_TAG_VALUE) {
            return FilterOutcome::AgentProduct;
        }

        let accepted = self
            .require
            .iter()
            .all(|(name, value)| attributes.get(name) == Some(&value.as_str()));
        if accepted {
            FilterOutcome::Accept
        } else {
            FilterOutcome::Filtered
        }
    }
}
