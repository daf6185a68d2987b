use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};

pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;
pub type WriteStream = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
}

/// Policy applied by `create_file` when the target already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfExists {
    Overwrite,
    Fail,
}

/// A node in the store's entry tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Absolute path of the entry, e.g. `/d/f.txt`.
    pub full_name: String,
    pub entry_type: EntryType,
    /// Missing when the entry is being deleted concurrently.
    pub last_modified_time: Option<DateTime<Utc>>,
    pub length: u64,
}

impl DirectoryEntry {
    pub fn is_directory(&self) -> bool {
        self.entry_type == EntryType::Directory
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub path: String,
    pub reason: String,
}

/// Outcome of a bulk transfer. Failures are per entry, not per call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStatus {
    pub entries_transferred: u64,
    pub entries_failed: Vec<FailedEntry>,
}

impl TransferStatus {
    pub fn record_success(&mut self) {
        self.entries_transferred += 1;
    }

    pub fn record_failure(&mut self, path: impl Into<String>, reason: impl ToString) {
        self.entries_failed.push(FailedEntry {
            path: path.into(),
            reason: reason.to_string(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.entries_failed.is_empty()
    }
}

/// Raw path-keyed operations against a hierarchical object store.
///
/// Implementations own transport, auth, retries and bulk-transfer
/// parallelism. Boolean results report whether the store applied the
/// operation; `Err` is reserved for failures the store could not classify.
#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    /// Fully-qualified account name used as the URI authority.
    fn account_fqdn(&self) -> &str;

    async fn check_exists(&self, path: &str) -> anyhow::Result<bool>;

    async fn get_read_stream(&self, path: &str) -> anyhow::Result<ReadStream>;

    async fn create_file(&self, path: &str, if_exists: IfExists) -> anyhow::Result<WriteStream>;

    /// Delete a file or an empty directory.
    async fn delete(&self, path: &str) -> anyhow::Result<bool>;

    async fn create_directory(&self, path: &str) -> anyhow::Result<bool>;

    async fn delete_recursive(&self, path: &str) -> anyhow::Result<bool>;

    /// Look up a single entry. `None` when nothing exists at `path`.
    async fn get_directory_entry(&self, path: &str) -> anyhow::Result<Option<DirectoryEntry>>;

    /// Immediate children of the directory at `path`, in store order.
    async fn enumerate_directory(&self, path: &str) -> anyhow::Result<Vec<DirectoryEntry>>;

    async fn bulk_upload(&self, local_path: &Path, remote_path: &str) -> anyhow::Result<TransferStatus>;

    async fn bulk_download(&self, remote_path: &str, local_path: &Path) -> anyhow::Result<TransferStatus>;
}

/// Join a relative path onto a remote directory path.
pub fn join_remote(base: &str, relative: &Path) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    for component in relative.components() {
        out.push('/');
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Local destination for a remote descendant of `remote_root`.
pub fn local_target(local_root: &Path, remote_root: &str, remote_path: &str) -> PathBuf {
    let relative = remote_path
        .strip_prefix(remote_root.trim_end_matches('/'))
        .unwrap_or(remote_path)
        .trim_start_matches('/');
    if relative.is_empty() {
        local_root.to_path_buf()
    } else {
        local_root.join(relative)
    }
}
