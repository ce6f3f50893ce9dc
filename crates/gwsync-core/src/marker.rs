//! Change detection markers.
//!
//! Every cache entry carries a [`ModMarker`] describing the version of the
//! remote item it was built from. [`changed`] is the single comparison rule the
//! pollers use to decide whether an item needs to be handled again.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Version marker of a remote catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ModMarker {
    /// Content hash of a spec document.
    Hash(String),
    /// Modification time, used for specs whose listing carries no hash.
    Timestamp(DateTime<Utc>),
    /// Products embed both their own metadata and their spec's content.
    Product {
        /// Product modification time.
        last_modified: DateTime<Utc>,
        /// Marker token of the spec the product was built from.
        spec_hash: String,
    },
    /// Remote revision identifier of a proxy.
    Revision(String),
}

impl fmt::Display for ModMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash(hash) => write!(f, "{hash}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.timestamp_millis()),
            Self::Product {
                last_modified,
                spec_hash,
            } => write!(f, "{}:{spec_hash}", last_modified.timestamp_millis()),
            Self::Revision(rev) => write!(f, "rev-{rev}"),
        }
    }
}

/// Decide whether `new` differs from the previously stored marker.
///
/// A missing prior marker always counts as changed. Product markers change
/// when either constituent moved.
pub fn changed(old: Option<&ModMarker>, new: &ModMarker) -> bool {
    match (old, new) {
        (None, _) => true,
        (
            Some(ModMarker::Product {
                last_modified: old_modified,
                spec_hash: old_spec,
            }),
            ModMarker::Product {
                last_modified,
                spec_hash,
            },
        ) => old_modified != last_modified || old_spec != spec_hash,
        (Some(old), new) => old != new,
    }
}

/// SHA-256 of raw content, base64 encoded.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    #[test]
    fn test_absent_prior_is_changed() {
        assert!(changed(None, &ModMarker::Hash("h1".into())));
    }

    #[test]
    fn test_hash_inequality() {
        let h1 = ModMarker::Hash("h1".into());
        assert!(!changed(Some(&h1), &ModMarker::Hash("h1".into())));
        assert!(changed(Some(&h1), &ModMarker::Hash("h2".into())));
    }

    #[test]
    fn test_product_changes_when_either_component_moves() {
        let base = ModMarker::Product {
            last_modified: ts(100),
            spec_hash: "h1".into(),
        };
        let product_moved = ModMarker::Product {
            last_modified: ts(200),
            spec_hash: "h1".into(),
        };
        let spec_moved = ModMarker::Product {
            last_modified: ts(100),
            spec_hash: "h2".into(),
        };
        assert!(!changed(Some(&base), &base.clone()));
        assert!(changed(Some(&base), &product_moved));
        assert!(changed(Some(&base), &spec_moved));
    }

    #[test]
    fn test_kind_switch_is_changed() {
        let by_time = ModMarker::Timestamp(ts(5));
        let by_hash = ModMarker::Hash("h".into());
        assert!(changed(Some(&by_time), &by_hash));
    }

    #[test]
    fn test_revision_marker() {
        let r1 = ModMarker::Revision("3".into());
        assert!(!changed(Some(&r1), &ModMarker::Revision("3".into())));
        assert!(changed(Some(&r1), &ModMarker::Revision("4".into())));
        assert_eq!(r1.to_string(), "rev-3");
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash(b"openapi"), content_hash(b"openapi"));
        assert_ne!(content_hash(b"openapi"), content_hash(b"swagger"));
    }
}
