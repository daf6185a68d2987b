use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::FsError;
use crate::store::{DirectoryEntry, ReadStream, WriteStream};
use crate::uri::RemoteUri;

/// Caller-facing metadata for a remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub modification_time: DateTime<Utc>,
    pub length_bytes: u64,
}

/// Child URIs of a directory.
///
/// Entries are fetched up front by the store client; each is turned into a
/// canonical URI only when the iterator reaches it.
pub struct Children {
    account: String,
    entries: std::vec::IntoIter<DirectoryEntry>,
}

impl Children {
    pub fn new(account: impl Into<String>, entries: Vec<DirectoryEntry>) -> Self {
        Self {
            account: account.into(),
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for Children {
    type Item = RemoteUri;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries
            .next()
            .map(|entry| RemoteUri::new(&self.account, &entry.full_name))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Children {}

/// Uniform filesystem contract shared by local and remote storage.
#[async_trait::async_trait]
pub trait FileSystem: Send + Sync {
    /// Open a file for reading, positioned at its start.
    async fn open(&self, uri: &RemoteUri) -> Result<ReadStream, FsError>;

    /// Create or overwrite a file. Missing parents are created by the store.
    async fn create(&self, uri: &RemoteUri) -> Result<WriteStream, FsError>;

    async fn delete(&self, uri: &RemoteUri) -> Result<(), FsError>;

    async fn exists(&self, uri: &RemoteUri) -> Result<bool, FsError>;

    async fn copy(&self, source: &RemoteUri, destination: &RemoteUri) -> Result<(), FsError>;

    async fn copy_to_local(&self, remote: &RemoteUri, local_path: &Path) -> Result<(), FsError>;

    async fn copy_from_local(&self, local_path: &Path, remote: &RemoteUri) -> Result<(), FsError>;

    async fn create_directory(&self, uri: &RemoteUri) -> Result<(), FsError>;

    /// Recursively delete a directory. Refuses to delete a file.
    async fn delete_directory(&self, uri: &RemoteUri) -> Result<(), FsError>;

    async fn get_children(&self, uri: &RemoteUri) -> Result<Children, FsError>;

    /// Build the canonical URI for a relative or absolute path.
    fn create_uri_for_path(&self, path: Option<&str>) -> Result<RemoteUri, FsError>;

    async fn get_file_status(&self, uri: Option<&RemoteUri>) -> Result<FileStatus, FsError>;
}
