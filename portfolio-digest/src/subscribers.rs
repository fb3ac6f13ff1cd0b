use crate::types::{DigestError, Result, Subscriber};
use async_trait::async_trait;
use interfaces::SubscriberStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// On-disk subscriber list: `{"users": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailList {
    #[serde(default)]
    pub users: Vec<Subscriber>,
}

/// Loads subscribers from a JSON file.
pub struct JsonSubscriberStore {
    path: PathBuf,
}

impl JsonSubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<EmailList> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DigestError::SubscriberFile {
                path: self.path.clone(),
                source,
            })?;
        let list: EmailList = serde_json::from_str(&content).map_err(|source| DigestError::SubscriberFormat {
            path: self.path.clone(),
            source,
        })?;
        info!("Loaded {} subscribers from {}", list.users.len(), self.path.display());
        Ok(list)
    }
}

#[async_trait]
impl SubscriberStore for JsonSubscriberStore {
    async fn load_subscribers(&self) -> anyhow::Result<Vec<Subscriber>> {
        Ok(self.load().await?.users)
    }
}
