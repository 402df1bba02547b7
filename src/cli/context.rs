use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::OnceCell;

use hidebox_rule_store::{JsonFileStore, RuleRepository};

use crate::config::Config;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    repository: OnceCell<RuleRepository>,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            repository: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Repository over the configured store file, opened on first use.
    pub async fn repository(&self) -> Result<RuleRepository> {
        self.repository
            .get_or_try_init(|| async {
                let path = &self.config.store_path;
                let store = JsonFileStore::open(path)
                    .await
                    .with_context(|| format!("Failed to open store {}", path.display()))?;
                let repo = RuleRepository::new(Arc::new(store), env!("CARGO_PKG_VERSION"));
                repo.initialize().await?;
                Ok::<_, anyhow::Error>(repo)
            })
            .await
            .cloned()
    }
}
