//! Endpoint extraction from spec documents.
//!
//! Documents are read as YAML, which also covers JSON. OpenAPI 3 documents
//! list their endpoints under `servers[].url`. Swagger 2 documents use
//! `schemes`, `host` and `basePath`. Relative server URLs carry no host and
//! are ignored.

use gwsync_core::endpoint::definitions_from_urls;
use gwsync_core::{EndpointDefinition, Error, Result, SpecParser};
use serde::Deserialize;
use serde_yaml_ng::Value;

#[derive(Debug, Deserialize)]
struct Server {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpecDocument {
    // Versions are often unquoted (`swagger: 2.0`), so any scalar is accepted.
    #[serde(default)]
    openapi: Option<Value>,
    #[serde(default)]
    swagger: Option<Value>,
    #[serde(default)]
    servers: Vec<Server>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    base_path: Option<String>,
    #[serde(default)]
    schemes: Vec<String>,
}

/// [`SpecParser`] for OpenAPI 3 and Swagger 2 documents in YAML or JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenApiParser;

impl SpecParser for OpenApiParser {
    fn endpoints(&self, content: &[u8]) -> Result<Vec<EndpointDefinition>> {
        let doc: SpecDocument = serde_yaml_ng::from_slice(content)
            .map_err(|e| Error::Parse(format!("spec is not a YAML or JSON document: {e}")))?;

        if doc.openapi.is_some() {
            let urls: Vec<String> = doc.servers.into_iter().map(|s| s.url).collect();
            return Ok(definitions_from_urls(&urls));
        }

        if doc.swagger.is_some() {
            let Some(host) = doc.host.filter(|h| !h.trim().is_empty()) else {
                return Ok(Vec::new());
            };
            let base_path = doc.base_path.unwrap_or_default();
            let schemes = if doc.schemes.is_empty() {
                vec!["https".to_string()]
            } else {
                doc.schemes
            };
            let urls: Vec<String> = schemes
                .iter()
                .map(|scheme| format!("{}://{host}{base_path}", scheme.to_lowercase()))
                .collect();
            return Ok(definitions_from_urls(&urls));
        }

        Err(Error::Parse(
            "document declares neither 'openapi' nor 'swagger'".into(),
        ))
    }
}
