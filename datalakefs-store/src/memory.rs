//! In-memory store client.
//!
//! Models the store as a flat map of absolute paths to typed entries.
//! Creating a file materializes its missing parents as directories, the
//! same way the hosted store does.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context as TaskContext, Poll};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tokio::io::AsyncWrite;
use tracing::debug;
use walkdir::WalkDir;

use datalakefs_common::store::{join_remote, local_target};
use datalakefs_common::{
    DirectoryEntry, EntryType, IfExists, ReadStream, StoreClient, TransferStatus, WriteStream,
};

use crate::normalize;

enum NodeKind {
    File(BytesMut),
    Directory,
}

struct Node {
    kind: NodeKind,
    modified: Option<DateTime<Utc>>,
}

impl Node {
    fn directory() -> Self {
        Self { kind: NodeKind::Directory, modified: Some(Utc::now()) }
    }

    fn file(data: BytesMut) -> Self {
        Self { kind: NodeKind::File(data), modified: Some(Utc::now()) }
    }

    fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }

    fn entry(&self, full_name: &str) -> DirectoryEntry {
        let (entry_type, length) = match &self.kind {
            NodeKind::File(data) => (EntryType::File, data.len() as u64),
            NodeKind::Directory => (EntryType::Directory, 0),
        };
        DirectoryEntry {
            full_name: full_name.to_string(),
            entry_type,
            last_modified_time: self.modified,
            length,
        }
    }
}

type Tree = BTreeMap<String, Node>;

#[derive(Clone)]
pub struct MemoryStoreClient {
    account_fqdn: String,
    tree: Arc<Mutex<Tree>>,
}

impl MemoryStoreClient {
    pub fn new(account_fqdn: impl Into<String>) -> Self {
        let mut tree = Tree::new();
        tree.insert("/".to_string(), Node::directory());
        Self {
            account_fqdn: account_fqdn.into(),
            tree: Arc::new(Mutex::new(tree)),
        }
    }

    /// Clear the modification time of an entry, as the store reports for an
    /// entry that is being deleted. Returns `false` if nothing is at `path`.
    pub fn mark_pending_delete(&self, path: &str) -> anyhow::Result<bool> {
        let mut tree = self.lock()?;
        Ok(match tree.get_mut(&normalize(path)) {
            Some(node) => {
                node.modified = None;
                true
            }
            None => false,
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Tree>> {
        self.tree.lock().map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Create the file at `path` with `data`, replacing an existing file
    /// only under `IfExists::Overwrite`. The existence check and the insert
    /// happen under one lock.
    fn put_file(&self, path: &str, data: BytesMut, if_exists: IfExists) -> anyhow::Result<()> {
        let mut tree = self.lock()?;
        match tree.get(path) {
            Some(node) if node.is_dir() => {
                bail!("Cannot create file {}: a directory exists at that path", path)
            }
            Some(_) if if_exists == IfExists::Fail => bail!("File already exists: {}", path),
            _ => {}
        }
        materialize_parents(&mut tree, path)
            .map_err(|reason| anyhow!("Cannot create file {}: {}", path, reason))?;
        tree.insert(path.to_string(), Node::file(data));
        Ok(())
    }

    async fn upload_file(&self, local: &Path, target: &str, status: &mut TransferStatus) {
        match tokio::fs::read(local).await {
            Ok(data) => match self.put_file(target, BytesMut::from(&data[..]), IfExists::Overwrite) {
                Ok(()) => status.record_success(),
                Err(e) => status.record_failure(target, e),
            },
            Err(e) => status.record_failure(local.display().to_string(), e),
        }
    }
}

/// Ancestors of `path` from the top down, excluding the root and `path`.
fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .map(|(idx, _)| &path[..idx])
        .filter(|p| !p.is_empty())
        .collect()
}

fn materialize_parents(tree: &mut Tree, path: &str) -> Result<(), String> {
    let parents = ancestors(path);
    if let Some(file) = parents
        .iter()
        .find(|p| tree.get(**p).is_some_and(|n| !n.is_dir()))
    {
        return Err(format!("parent {} is a file", file));
    }
    for parent in parents {
        tree.entry(parent.to_string()).or_insert_with(Node::directory);
    }
    Ok(())
}

fn descendant_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir)
    }
}

fn descendants<'a>(tree: &'a Tree, dir: &str) -> impl Iterator<Item = (&'a String, &'a Node)> {
    let prefix = descendant_prefix(dir);
    tree.range(prefix.clone()..)
        .take_while(move |(k, _)| k.starts_with(&prefix))
        .filter(|(k, _)| k.as_str() != "/")
}

fn is_child(dir: &str, path: &str) -> bool {
    let prefix = descendant_prefix(dir);
    path.strip_prefix(&prefix).is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}

struct MemoryWriteStream {
    tree: Arc<Mutex<Tree>>,
    path: String,
}

impl MemoryWriteStream {
    fn append(&self, buf: &[u8]) -> io::Result<()> {
        let mut tree = self
            .tree
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory store lock poisoned"))?;
        match tree.get_mut(&self.path) {
            Some(Node { kind: NodeKind::File(data), modified }) => {
                data.extend_from_slice(buf);
                *modified = Some(Utc::now());
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} was removed while open for writing", self.path),
            )),
        }
    }
}

impl AsyncWrite for MemoryWriteStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(self.append(buf).map(|_| buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl StoreClient for MemoryStoreClient {
    fn account_fqdn(&self) -> &str {
        &self.account_fqdn
    }

    async fn check_exists(&self, path: &str) -> anyhow::Result<bool> {
        Ok(self.lock()?.contains_key(&normalize(path)))
    }

    async fn get_read_stream(&self, path: &str) -> anyhow::Result<ReadStream> {
        let path = normalize(path);
        let tree = self.lock()?;
        match tree.get(&path) {
            Some(Node { kind: NodeKind::File(data), .. }) => {
                let data: Bytes = data.clone().freeze();
                Ok(Box::new(io::Cursor::new(data)))
            }
            Some(_) => bail!("Cannot open {} for reading: it is a directory", path),
            None => bail!("File not found at path: {}", path),
        }
    }

    async fn create_file(&self, path: &str, if_exists: IfExists) -> anyhow::Result<WriteStream> {
        let path = normalize(path);
        self.put_file(&path, BytesMut::new(), if_exists)?;
        debug!(path = %path, "Memory file created");
        Ok(Box::new(MemoryWriteStream { tree: self.tree.clone(), path }))
    }

    async fn delete(&self, path: &str) -> anyhow::Result<bool> {
        let path = normalize(path);
        if path == "/" {
            return Ok(false);
        }
        let mut tree = self.lock()?;
        let removable = match tree.get(&path) {
            None => false,
            Some(node) if node.is_dir() => descendants(&tree, &path).next().is_none(),
            Some(_) => true,
        };
        if removable {
            tree.remove(&path);
        }
        Ok(removable)
    }

    async fn create_directory(&self, path: &str) -> anyhow::Result<bool> {
        let path = normalize(path);
        let mut tree = self.lock()?;
        match tree.get(&path) {
            Some(node) if node.is_dir() => return Ok(true),
            Some(_) => return Ok(false),
            None => {}
        }
        if materialize_parents(&mut tree, &path).is_err() {
            return Ok(false);
        }
        tree.insert(path, Node::directory());
        Ok(true)
    }

    async fn delete_recursive(&self, path: &str) -> anyhow::Result<bool> {
        let path = normalize(path);
        if path == "/" {
            return Ok(false);
        }
        let mut tree = self.lock()?;
        if !tree.contains_key(&path) {
            return Ok(false);
        }
        let doomed: Vec<String> = descendants(&tree, &path).map(|(k, _)| k.clone()).collect();
        for key in doomed {
            tree.remove(&key);
        }
        tree.remove(&path);
        Ok(true)
    }

    async fn get_directory_entry(&self, path: &str) -> anyhow::Result<Option<DirectoryEntry>> {
        let path = normalize(path);
        Ok(self.lock()?.get(&path).map(|node| node.entry(&path)))
    }

    async fn enumerate_directory(&self, path: &str) -> anyhow::Result<Vec<DirectoryEntry>> {
        let path = normalize(path);
        let tree = self.lock()?;
        match tree.get(&path) {
            Some(node) if node.is_dir() => {}
            Some(_) => bail!("Not a directory: {}", path),
            None => bail!("Directory not found: {}", path),
        }
        Ok(descendants(&tree, &path)
            .filter(|(k, _)| is_child(&path, k))
            .map(|(k, node)| node.entry(k))
            .collect())
    }

    async fn bulk_upload(&self, local_path: &Path, remote_path: &str) -> anyhow::Result<TransferStatus> {
        let remote = normalize(remote_path);
        let meta = tokio::fs::metadata(local_path)
            .await
            .with_context(|| format!("Failed to stat {}", local_path.display()))?;

        let mut status = TransferStatus::default();
        if meta.is_file() {
            self.upload_file(local_path, &remote, &mut status).await;
            return Ok(status);
        }

        for entry in WalkDir::new(local_path).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    status.record_failure(path, e);
                    continue;
                }
            };
            let relative = entry.path().strip_prefix(local_path).unwrap_or(entry.path());
            let target = join_remote(&remote, relative);

            if entry.file_type().is_dir() {
                if !self.create_directory(&target).await? {
                    status.record_failure(&target, "directory collides with an existing file");
                }
            } else if entry.file_type().is_file() {
                self.upload_file(entry.path(), &target, &mut status).await;
            }
        }

        debug!(
            local = %local_path.display(),
            remote = %remote,
            transferred = status.entries_transferred,
            failed = status.entries_failed.len(),
            "Memory bulk upload complete"
        );
        Ok(status)
    }

    async fn bulk_download(&self, remote_path: &str, local_path: &Path) -> anyhow::Result<TransferStatus> {
        let remote = normalize(remote_path);

        // Snapshot under the lock, write to disk without it.
        let snapshot: Vec<(String, Option<Bytes>)> = {
            let tree = self.lock()?;
            let root = tree
                .get(&remote)
                .ok_or_else(|| anyhow!("Remote path not found: {}", remote))?;
            let mut items = Vec::new();
            match &root.kind {
                NodeKind::File(data) => items.push((remote.clone(), Some(data.clone().freeze()))),
                NodeKind::Directory => {
                    items.push((remote.clone(), None));
                    for (path, node) in descendants(&tree, &remote) {
                        let data = match &node.kind {
                            NodeKind::File(data) => Some(data.clone().freeze()),
                            NodeKind::Directory => None,
                        };
                        items.push((path.clone(), data));
                    }
                }
            }
            items
        };

        let mut status = TransferStatus::default();
        for (path, data) in snapshot {
            let target = local_target(local_path, &remote, &path);
            match data {
                Some(bytes) => match write_local(&target, &bytes).await {
                    Ok(()) => status.record_success(),
                    Err(e) => status.record_failure(&path, format!("{:#}", e)),
                },
                None => {
                    if let Err(e) = tokio::fs::create_dir_all(&target).await {
                        status.record_failure(&path, e);
                    }
                }
            }
        }

        debug!(
            remote = %remote,
            local = %local_path.display(),
            transferred = status.entries_transferred,
            failed = status.entries_failed.len(),
            "Memory bulk download complete"
        );
        Ok(status)
    }
}

async fn write_local(target: &Path, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create parent directory")?;
    }
    tokio::fs::write(target, data)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))
}
