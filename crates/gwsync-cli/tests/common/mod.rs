#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Catalog with one spec, one product named after it and one proxy
/// associated with it.
pub const SNAPSHOT: &str = r#"{
    "specs": [
        {"id": "s1", "name": "Orders", "contentLocator": "/specs/orders", "modified": "2024-03-01T10:00:00Z", "contentHash": "h1"}
    ],
    "specContents": {
        "/specs/orders": "{\"openapi\":\"3.0.0\",\"servers\":[{\"url\":\"https://api.example.com/orders\"}]}"
    },
    "products": [
        {"name": "orders", "displayName": "Orders", "lastModified": "2024-03-02T10:00:00Z"}
    ],
    "proxies": [
        {
            "name": "orders-proxy",
            "deployments": {"environments": [{"name": "prod", "revisions": ["3"]}]},
            "revisions": [
                {
                    "name": "orders-proxy",
                    "revision": "3",
                    "policies": ["verify-key"],
                    "resourceFiles": [{"type": "openapi", "name": "association.json"}],
                    "connection": {"virtualHosts": ["secure"], "basePath": "/orders"},
                    "resources": {"openapi/association.json": "{\"url\":\"/specs/orders\"}"},
                    "policyDetails": [{"name": "verify-key", "policyType": "VerifyAPIKey"}]
                }
            ]
        }
    ],
    "virtualHosts": {
        "prod": [{"name": "secure", "hostAliases": ["api.example.com"], "port": "443", "tls": true}]
    }
}"#;

/// Scratch directory holding a snapshot and a journal path.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::write(dir.path().join("catalog.json"), SNAPSHOT).expect("write snapshot");
        Self { dir }
    }

    pub fn snapshot(&self) -> PathBuf {
        self.dir.path().join("catalog.json")
    }

    pub fn journal(&self) -> PathBuf {
        self.dir.path().join("published.jsonl")
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("write file");
        path
    }
}

/// `gwsync` binary with `GWSYNC_*` overrides cleared.
pub fn gwsync_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gwsync"));
    for key in [
        "GWSYNC_CONFIG",
        "GWSYNC_POLL_INTERVAL_SECS",
        "GWSYNC_WORKERS",
        "GWSYNC_MATCH_ON_URL",
        "GWSYNC_PARSE_ENDPOINTS",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// One `run --once` against `snapshot`, journaling into `journal`.
pub fn run_once(snapshot: &Path, journal: &Path) -> Command {
    let mut cmd = gwsync_cmd();
    cmd.arg("run")
        .arg("--once")
        .arg("--snapshot")
        .arg(snapshot)
        .arg("--journal")
        .arg(journal);
    cmd
}

pub fn journal_lines(journal: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(journal)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
