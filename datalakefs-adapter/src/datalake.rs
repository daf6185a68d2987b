//! `FileSystem` implementation over a Data Lake store client.
//!
//! The store only knows typed entries keyed by absolute path. This layer
//! adds directory-aware delete and listing, builds canonical URIs, and
//! turns boolean store refusals into `FsError::StoreIo`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use datalakefs_common::{
    Children, EntryType, FileStatus, FileSystem, FsError, IfExists, ReadStream, RemoteUri,
    StoreClient, TransferStatus, WriteStream,
};

/// Existence and type of a path, from a single store lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryProbe {
    pub exists: bool,
    pub entry_type: Option<EntryType>,
}

impl EntryProbe {
    pub fn is_directory(&self) -> bool {
        self.exists && self.entry_type == Some(EntryType::Directory)
    }
}

pub struct DataLakeFileSystem {
    client: Arc<dyn StoreClient>,
}

impl DataLakeFileSystem {
    pub fn new(client: Arc<dyn StoreClient>) -> Result<Self, FsError> {
        if client.account_fqdn().is_empty() {
            return Err(FsError::InvalidArgument(
                "store client reports an empty account name".into(),
            ));
        }
        Ok(Self { client })
    }

    fn account(&self) -> &str {
        self.client.account_fqdn()
    }

    /// Entries without a modification time are being deleted and count as absent.
    pub async fn probe(&self, uri: &RemoteUri) -> Result<EntryProbe, FsError> {
        let entry = self.client.get_directory_entry(uri.absolute_path()).await?;
        Ok(match entry {
            Some(entry) if entry.last_modified_time.is_some() => EntryProbe {
                exists: true,
                entry_type: Some(entry.entry_type),
            },
            _ => EntryProbe { exists: false, entry_type: None },
        })
    }

    async fn require_directory(&self, op: &'static str, uri: &RemoteUri) -> Result<(), FsError> {
        let probe = self.probe(uri).await?;
        if probe.is_directory() {
            return Ok(());
        }
        let reason = if probe.exists { "not a directory" } else { "directory does not exist" };
        warn!(op = op, uri = %uri, reason = reason, "Directory precondition failed");
        Err(FsError::store_io(op, uri.to_string(), reason))
    }
}

fn check_transfer(op: &'static str, uri: &RemoteUri, status: TransferStatus) -> Result<(), FsError> {
    if status.is_complete() {
        debug!(op = op, uri = %uri, transferred = status.entries_transferred, "Bulk transfer complete");
        return Ok(());
    }
    for failed in &status.entries_failed {
        warn!(op = op, path = %failed.path, reason = %failed.reason, "Transfer entry failed");
    }
    Err(FsError::store_io(
        op,
        uri.to_string(),
        format!(
            "{} entries did not get transferred correctly",
            status.entries_failed.len()
        ),
    ))
}

#[async_trait]
impl FileSystem for DataLakeFileSystem {
    async fn open(&self, uri: &RemoteUri) -> Result<ReadStream, FsError> {
        debug!(uri = %uri, "open");
        Ok(self.client.get_read_stream(uri.absolute_path()).await?)
    }

    async fn create(&self, uri: &RemoteUri) -> Result<WriteStream, FsError> {
        debug!(uri = %uri, "create");
        Ok(self
            .client
            .create_file(uri.absolute_path(), IfExists::Overwrite)
            .await?)
    }

    async fn delete(&self, uri: &RemoteUri) -> Result<(), FsError> {
        debug!(uri = %uri, "delete");
        if self.client.delete(uri.absolute_path()).await? {
            return Ok(());
        }
        warn!(uri = %uri, "Store refused delete");
        Err(FsError::store_io(
            "delete",
            uri.to_string(),
            "cannot delete directory/file",
        ))
    }

    async fn exists(&self, uri: &RemoteUri) -> Result<bool, FsError> {
        Ok(self.client.check_exists(uri.absolute_path()).await?)
    }

    async fn copy(&self, source: &RemoteUri, destination: &RemoteUri) -> Result<(), FsError> {
        debug!(source = %source, destination = %destination, "copy requested");
        Err(FsError::Unsupported("remote-to-remote copy"))
    }

    async fn copy_to_local(&self, remote: &RemoteUri, local_path: &Path) -> Result<(), FsError> {
        debug!(uri = %remote, local = %local_path.display(), "copy_to_local");
        let status = self
            .client
            .bulk_download(remote.absolute_path(), local_path)
            .await?;
        check_transfer("copy_to_local", remote, status)
    }

    async fn copy_from_local(&self, local_path: &Path, remote: &RemoteUri) -> Result<(), FsError> {
        debug!(local = %local_path.display(), uri = %remote, "copy_from_local");
        let status = self
            .client
            .bulk_upload(local_path, remote.absolute_path())
            .await?;
        check_transfer("copy_from_local", remote, status)
    }

    async fn create_directory(&self, uri: &RemoteUri) -> Result<(), FsError> {
        debug!(uri = %uri, "create_directory");
        if self.client.create_directory(uri.absolute_path()).await? {
            return Ok(());
        }
        warn!(uri = %uri, "Store refused directory creation");
        Err(FsError::store_io(
            "create_directory",
            uri.to_string(),
            "cannot create directory",
        ))
    }

    async fn delete_directory(&self, uri: &RemoteUri) -> Result<(), FsError> {
        debug!(uri = %uri, "delete_directory");
        self.require_directory("delete_directory", uri).await?;
        if self.client.delete_recursive(uri.absolute_path()).await? {
            return Ok(());
        }
        warn!(uri = %uri, "Store refused recursive delete");
        Err(FsError::store_io(
            "delete_directory",
            uri.to_string(),
            "cannot delete directory",
        ))
    }

    async fn get_children(&self, uri: &RemoteUri) -> Result<Children, FsError> {
        self.require_directory("get_children", uri).await?;
        let entries = self.client.enumerate_directory(uri.absolute_path()).await?;
        debug!(uri = %uri, count = entries.len(), "get_children");
        Ok(Children::new(self.account(), entries))
    }

    fn create_uri_for_path(&self, path: Option<&str>) -> Result<RemoteUri, FsError> {
        let path = path.ok_or_else(|| FsError::InvalidArgument("Specified path is null".into()))?;
        Ok(RemoteUri::new(self.account(), path))
    }

    async fn get_file_status(&self, uri: Option<&RemoteUri>) -> Result<FileStatus, FsError> {
        let uri = uri.ok_or_else(|| FsError::InvalidArgument("Specified uri is null".into()))?;
        let entry = self
            .client
            .get_directory_entry(uri.absolute_path())
            .await?
            .ok_or_else(|| {
                FsError::store_io("get_file_status", uri.to_string(), "entry does not exist")
            })?;

        match entry.last_modified_time {
            Some(modification_time) => Ok(FileStatus {
                modification_time,
                length_bytes: entry.length,
            }),
            None => {
                warn!(uri = %uri, "Entry has no modification time");
                Err(FsError::store_io(
                    "get_file_status",
                    uri.to_string(),
                    "entry has no last modified time; it may have been deleted",
                ))
            }
        }
    }
}
