//! Local directory store client.
//!
//! Maps absolute store paths onto a directory tree rooted at `base_path`.
//! Write streams are buffered by tokio; callers must `shutdown()` them for
//! the contents to become visible.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use datalakefs_common::store::join_remote;
use datalakefs_common::{
    DirectoryEntry, EntryType, IfExists, ReadStream, StoreClient, TransferStatus, WriteStream,
};

use crate::normalize;

pub struct DirectoryStoreClient {
    account_fqdn: String,
    base_path: PathBuf,
}

impl DirectoryStoreClient {
    pub fn new(account_fqdn: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            account_fqdn: account_fqdn.into(),
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        // `..` is clamped at the store root, so a path can never escape `base_path`.
        let mut full = self.base_path.clone();
        for segment in normalize(path).split('/').filter(|s| !s.is_empty()) {
            full.push(segment);
        }
        full
    }

    fn is_root(&self, full: &Path) -> bool {
        full == self.base_path
    }

    async fn stat(&self, full: &Path) -> anyhow::Result<Option<Metadata>> {
        match tokio::fs::metadata(full).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to stat {}", full.display())),
        }
    }
}

fn to_entry(full_name: String, meta: &Metadata) -> DirectoryEntry {
    let entry_type = if meta.is_dir() { EntryType::Directory } else { EntryType::File };
    DirectoryEntry {
        full_name,
        entry_type,
        last_modified_time: meta.modified().ok().map(DateTime::<Utc>::from),
        length: if meta.is_dir() { 0 } else { meta.len() },
    }
}

async fn copy_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create parent directory")?;
    }
    if tokio::fs::metadata(to).await.is_ok_and(|m| m.is_dir()) {
        bail!("A directory exists at {}", to.display());
    }
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

/// Copy a file or tree from `src` to `dst`, recording each file.
async fn copy_tree(src: &Path, dst: &Path, status: &mut TransferStatus) {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                status.record_failure(path, e);
                continue;
            }
        };
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = if relative.as_os_str().is_empty() {
            dst.to_path_buf()
        } else {
            dst.join(relative)
        };

        if entry.file_type().is_dir() {
            if let Err(e) = tokio::fs::create_dir_all(&target).await {
                status.record_failure(target.display().to_string(), e);
            }
        } else if entry.file_type().is_file() {
            match copy_file(entry.path(), &target).await {
                Ok(()) => status.record_success(),
                Err(e) => status.record_failure(target.display().to_string(), format!("{:#}", e)),
            }
        }
    }
}

#[async_trait]
impl StoreClient for DirectoryStoreClient {
    fn account_fqdn(&self) -> &str {
        &self.account_fqdn
    }

    async fn check_exists(&self, path: &str) -> anyhow::Result<bool> {
        Ok(self.stat(&self.full_path(path)).await?.is_some())
    }

    async fn get_read_stream(&self, path: &str) -> anyhow::Result<ReadStream> {
        let full = self.full_path(path);
        if full.is_dir() {
            bail!("Cannot open {} for reading: it is a directory", path);
        }
        let file = tokio::fs::File::open(&full)
            .await
            .with_context(|| format!("File not found at path: {}", path))?;
        Ok(Box::new(file))
    }

    async fn create_file(&self, path: &str, if_exists: IfExists) -> anyhow::Result<WriteStream> {
        let full = self.full_path(path);
        if full.is_dir() {
            bail!("Cannot create file {}: a directory exists at that path", path);
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Cannot create parent directories for {}", path))?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        match if_exists {
            IfExists::Overwrite => options.create(true).truncate(true),
            IfExists::Fail => options.create_new(true),
        };
        let file = options
            .open(&full)
            .await
            .with_context(|| format!("Failed to create file {}", path))?;

        debug!(path = %path, "Directory file created");
        Ok(Box::new(file))
    }

    async fn delete(&self, path: &str) -> anyhow::Result<bool> {
        let full = self.full_path(path);
        if self.is_root(&full) {
            return Ok(false);
        }
        let Some(meta) = self.stat(&full).await? else {
            return Ok(false);
        };
        let result = if meta.is_dir() {
            tokio::fs::remove_dir(&full).await
        } else {
            tokio::fs::remove_file(&full).await
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!(path = %path, error = %e, "Directory delete refused");
                Ok(false)
            }
        }
    }

    async fn create_directory(&self, path: &str) -> anyhow::Result<bool> {
        let full = self.full_path(path);
        match tokio::fs::create_dir_all(&full).await {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!(path = %path, error = %e, "Directory create refused");
                Ok(false)
            }
        }
    }

    async fn delete_recursive(&self, path: &str) -> anyhow::Result<bool> {
        let full = self.full_path(path);
        if self.is_root(&full) {
            return Ok(false);
        }
        let Some(meta) = self.stat(&full).await? else {
            return Ok(false);
        };
        let result = if meta.is_dir() {
            tokio::fs::remove_dir_all(&full).await
        } else {
            tokio::fs::remove_file(&full).await
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!(path = %path, error = %e, "Directory recursive delete refused");
                Ok(false)
            }
        }
    }

    async fn get_directory_entry(&self, path: &str) -> anyhow::Result<Option<DirectoryEntry>> {
        let full = self.full_path(path);
        Ok(self
            .stat(&full)
            .await?
            .map(|meta| to_entry(normalize(path), &meta)))
    }

    async fn enumerate_directory(&self, path: &str) -> anyhow::Result<Vec<DirectoryEntry>> {
        let dir = normalize(path);
        let full = self.full_path(&dir);
        let mut entries = tokio::fs::read_dir(&full)
            .await
            .with_context(|| format!("Failed to read directory {}", dir))?;

        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().to_string();
            out.push(to_entry(join_remote(&dir, Path::new(&name)), &meta));
        }
        Ok(out)
    }

    async fn bulk_upload(&self, local_path: &Path, remote_path: &str) -> anyhow::Result<TransferStatus> {
        if tokio::fs::metadata(local_path).await.is_err() {
            bail!("Local path not found: {}", local_path.display());
        }
        let mut status = TransferStatus::default();
        copy_tree(local_path, &self.full_path(remote_path), &mut status).await;

        debug!(
            local = %local_path.display(),
            remote = %remote_path,
            transferred = status.entries_transferred,
            failed = status.entries_failed.len(),
            "Directory bulk upload complete"
        );
        Ok(status)
    }

    async fn bulk_download(&self, remote_path: &str, local_path: &Path) -> anyhow::Result<TransferStatus> {
        let full = self.full_path(remote_path);
        self.stat(&full)
            .await?
            .ok_or_else(|| anyhow!("Remote path not found: {}", remote_path))?;

        let mut status = TransferStatus::default();
        copy_tree(&full, local_path, &mut status).await;

        // Failures are reported against store paths, not the local mirror.
        for failed in &mut status.entries_failed {
            if let Ok(relative) = Path::new(&failed.path).strip_prefix(local_path) {
                failed.path = join_remote(&normalize(remote_path), relative);
            }
        }

        debug!(
            remote = %remote_path,
            local = %local_path.display(),
            transferred = status.entries_transferred,
            failed = status.entries_failed.len(),
            "Directory bulk download complete"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn write_file(client: &DirectoryStoreClient, path: &str, contents: &str) {
        let mut stream = client.create_file(path, IfExists::Overwrite).await.unwrap();
        stream.write_all(contents.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_client_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let client = DirectoryStoreClient::new("acct", dir.path());

        write_file(&client, "/test/subdir/file.txt", "hello world").await;

        let mut buf = String::new();
        client
            .get_read_stream("/test/subdir/file.txt")
            .await
            .unwrap()
            .read_to_string(&mut buf)
            .await
            .unwrap();
        assert_eq!(buf, "hello world");

        let parent = client.get_directory_entry("/test/subdir").await.unwrap().unwrap();
        assert_eq!(parent.entry_type, EntryType::Directory);
        let file = client.get_directory_entry("test/subdir/file.txt").await.unwrap().unwrap();
        assert_eq!(file.full_name, "/test/subdir/file.txt");
        assert_eq!(file.length, 11);

        assert!(client.delete("/test/subdir/file.txt").await.unwrap());
        assert!(client.get_read_stream("/test/subdir/file.txt").await.is_err());
    }

    #[test]
    fn test_directory_client_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let client = DirectoryStoreClient::new("acct", dir.path());

        let dest = client.full_path("../../../etc/passwd");
        assert!(dest.starts_with(dir.path()));
        assert_eq!(dest, dir.path().join("etc/passwd"));
        assert_eq!(client.full_path("x/../y"), dir.path().join("y"));
    }

    #[tokio::test]
    async fn test_dot_segments_address_resolved_entry() {
        let dir = tempfile::tempdir().unwrap();
        let client = DirectoryStoreClient::new("acct", dir.path());
        write_file(&client, "/x/../y", "hi").await;

        assert!(dir.path().join("y").is_file());
        assert!(!dir.path().join("x").exists());
        let entry = client.get_directory_entry("/x/../y").await.unwrap().unwrap();
        assert_eq!(entry.full_name, "/y");
    }

    #[tokio::test]
    async fn test_delete_refuses_root_and_non_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let client = DirectoryStoreClient::new("acct", dir.path());
        write_file(&client, "/d/f", "x").await;

        assert!(!client.delete("/").await.unwrap());
        assert!(!client.delete("/d").await.unwrap());
        assert!(!client.delete("/missing").await.unwrap());
        assert!(!client.delete_recursive("/").await.unwrap());
        assert!(client.delete_recursive("/d").await.unwrap());
        assert!(!client.check_exists("/d/f").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_directory_collides_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = DirectoryStoreClient::new("acct", dir.path());
        write_file(&client, "/f", "x").await;

        assert!(!client.create_directory("/f").await.unwrap());
        assert!(client.create_directory("/d/e").await.unwrap());
        assert!(client.create_directory("/d/e").await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_policy_rejects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = DirectoryStoreClient::new("acct", dir.path());
        write_file(&client, "/f", "x").await;
        assert!(client.create_file("/f", IfExists::Fail).await.is_err());
    }

    #[tokio::test]
    async fn test_enumerate_builds_absolute_names() {
        let dir = tempfile::tempdir().unwrap();
        let client = DirectoryStoreClient::new("acct", dir.path());
        write_file(&client, "/d/a", "1").await;
        write_file(&client, "/d/sub/b", "2").await;

        let mut names: Vec<String> = client
            .enumerate_directory("/d")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.full_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["/d/a", "/d/sub"]);
    }

    #[tokio::test]
    async fn test_bulk_transfer_single_file() {
        let store = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let client = DirectoryStoreClient::new("acct", store.path());

        let src = local.path().join("in.txt");
        std::fs::write(&src, "payload").unwrap();
        let status = client.bulk_upload(&src, "/remote/in.txt").await.unwrap();
        assert!(status.is_complete());
        assert_eq!(status.entries_transferred, 1);

        let out = local.path().join("out/copy.txt");
        let status = client.bulk_download("/remote/in.txt", &out).await.unwrap();
        assert!(status.is_complete());
        assert_eq!(std::fs::read_to_string(out).unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_bulk_download_missing_remote_is_error() {
        let store = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let client = DirectoryStoreClient::new("acct", store.path());
        assert!(client.bulk_download("/nope", local.path()).await.is_err());
    }
}
