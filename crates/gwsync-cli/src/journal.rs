//! JSON lines journal of published descriptions.
//!
//! Each successful publish appends one line. Opening an existing journal
//! replays it, so recorded fingerprints survive restarts and a repeated
//! `run --once` publishes only what changed.

use async_trait::async_trait;
use gwsync_core::{Error, MemoryPublisher, Publisher, Result, ServiceDescription};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// [`Publisher`] that records into memory and appends to a journal file.
#[derive(Debug)]
pub struct JournalPublisher {
    records: MemoryPublisher,
    path: Option<PathBuf>,
    replayed: usize,
}

impl JournalPublisher {
    /// Open the journal at `path`, replaying any lines already present.
    ///
    /// Without a path descriptions are kept in memory only.
    pub async fn open(path: Option<&Path>) -> Result<Self> {
        let records = MemoryPublisher::new();
        let mut replayed = 0;

        if let Some(path) = path {
            if fs::try_exists(path).await? {
                let content = fs::read_to_string(path).await?;
                for (index, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let description: ServiceDescription =
                        serde_json::from_str(line).map_err(|e| {
                            Error::Parse(format!(
                                "journal {} line {}: {e}",
                                path.display(),
                                index + 1
                            ))
                        })?;
                    records.publish(&description).await?;
                    replayed += 1;
                }
                info!(journal = %path.display(), entries = replayed, "replayed journal");
            }
        }

        Ok(Self {
            records,
            path: path.map(Path::to_path_buf),
            replayed,
        })
    }

    /// Descriptions published since the journal was opened.
    pub fn published_since_open(&self) -> Vec<ServiceDescription> {
        self.records
            .history()
            .into_iter()
            .skip(self.replayed)
            .collect()
    }

    async fn append(&self, description: &ServiceDescription) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut line = serde_json::to_string(description)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(id = %description.id, journal = %path.display(), "journal entry written");
        Ok(())
    }
}

#[async_trait]
impl Publisher for JournalPublisher {
    fn is_published(&self, catalog_id: &str) -> bool {
        self.records.is_published(catalog_id)
    }

    fn get_attribute(&self, catalog_id: &str, key: &str) -> Option<String> {
        self.records.get_attribute(catalog_id, key)
    }

    async fn publish(&self, description: &ServiceDescription) -> Result<()> {
        // Written first: a description missing from the journal must not count as published.
        self.append(description)
            .await
            .map_err(|e| Error::publish(&description.id, e.to_string()))?;
        self.records.publish(description).await
    }
}
