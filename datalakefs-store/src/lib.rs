pub mod config;
pub mod directory;
pub mod memory;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use datalakefs_common::uri::absolute_path;
use datalakefs_common::StoreClient;

pub use config::{FileSystemConfig, StoreConfig};
pub use directory::DirectoryStoreClient;
pub use memory::MemoryStoreClient;

/// Construct a store client from a validated configuration.
pub fn from_config(config: &FileSystemConfig) -> anyhow::Result<Arc<dyn StoreClient>> {
    config.validate()?;
    match &config.store {
        StoreConfig::Memory => {
            info!(account = %config.account_fqdn, "Using in-memory store");
            Ok(Arc::new(MemoryStoreClient::new(config.account_fqdn.clone())))
        }
        StoreConfig::Directory { root } => {
            std::fs::create_dir_all(root)
                .with_context(|| format!("Failed to create store root {}", root.display()))?;
            info!(account = %config.account_fqdn, root = %root.display(), "Using directory store");
            Ok(Arc::new(DirectoryStoreClient::new(config.account_fqdn.clone(), root)))
        }
    }
}

/// Canonical store path: rooted, dot segments resolved the same way URIs
/// resolve them, without empty segments or a trailing `/`.
pub(crate) fn normalize(path: &str) -> String {
    let resolved = absolute_path(path);
    let segments: Vec<&str> = resolved.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}
