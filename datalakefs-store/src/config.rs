use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct FileSystemConfig {
    /// Account authority used in every `adl://` URI.
    pub account_fqdn: String,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    Directory { root: PathBuf },
}

impl FileSystemConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: FileSystemConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.account_fqdn.is_empty() {
            anyhow::bail!("account_fqdn must not be empty");
        }
        if self
            .account_fqdn
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
        {
            anyhow::bail!("account_fqdn is not a valid host name: {}", self.account_fqdn);
        }
        if let StoreConfig::Directory { root } = &self.store {
            if !root.is_absolute() {
                anyhow::bail!("store root must be absolute: {}", root.display());
            }
        }
        Ok(())
    }
}
