//! Filesystem contract checks, run against every store client.

use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use datalakefs_adapter::DataLakeFileSystem;
use datalakefs_common::{EntryType, FileSystem, FsError, RemoteUri, StoreClient};
use datalakefs_store::{DirectoryStoreClient, MemoryStoreClient};

const ACCOUNT: &str = "contoso.azuredatalakestore.net";
const CONTENTS: &str = "hello";

struct Harness {
    fs: DataLakeFileSystem,
    client: Arc<dyn StoreClient>,
    folder: String,
    _root: Option<tempfile::TempDir>,
}

impl Harness {
    fn memory() -> Self {
        Self::with_client(Arc::new(MemoryStoreClient::new(ACCOUNT)), None)
    }

    fn directory() -> Self {
        let root = tempfile::tempdir().unwrap();
        let client = Arc::new(DirectoryStoreClient::new(ACCOUNT, root.path()));
        Self::with_client(client, Some(root))
    }

    fn with_client(client: Arc<dyn StoreClient>, root: Option<tempfile::TempDir>) -> Self {
        Self {
            fs: DataLakeFileSystem::new(client.clone()).unwrap(),
            client,
            folder: format!("test-folder-{}", uuid::Uuid::new_v4()),
            _root: root,
        }
    }

    fn path(&self, name: &str) -> String {
        format!("/{}/{}", self.folder, name)
    }

    fn uri(&self, path: &str) -> RemoteUri {
        self.fs.create_uri_for_path(Some(path)).unwrap()
    }

    async fn write(&self, uri: &RemoteUri, text: &str) {
        let mut stream = self.fs.create(uri).await.unwrap();
        stream.write_all(text.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    async fn read(&self, uri: &RemoteUri) -> String {
        let mut buf = String::new();
        let mut stream = self.fs.open(uri).await.unwrap();
        stream.read_to_string(&mut buf).await.unwrap();
        buf
    }

    async fn entry_type(&self, path: &str) -> Option<EntryType> {
        self.client
            .get_directory_entry(path)
            .await
            .unwrap()
            .map(|e| e.entry_type)
    }
}

async fn exists_flips_after_create(h: &Harness) {
    let file = h.uri(&h.path("f.txt"));
    assert!(!h.fs.exists(&file).await.unwrap());
    h.write(&file, CONTENTS).await;
    assert!(h.fs.exists(&file).await.unwrap());

    let dir = h.uri(&h.path("dir"));
    assert!(!h.fs.exists(&dir).await.unwrap());
    h.fs.create_directory(&dir).await.unwrap();
    assert!(h.fs.exists(&dir).await.unwrap());
}

async fn create_materializes_parent_directory(h: &Harness) {
    let parent = h.path("parent");
    h.write(&h.uri(&format!("{}/name", parent)), CONTENTS).await;

    assert_eq!(h.entry_type(&parent).await, Some(EntryType::Directory));
    assert_eq!(h.entry_type(&format!("{}/name", parent)).await, Some(EntryType::File));
    assert!(h.fs.probe(&h.uri(&parent)).await.unwrap().is_directory());
    h.fs.get_file_status(Some(&h.uri(&parent))).await.unwrap();
}

async fn delete_directory_refuses_file(h: &Harness) {
    let file = h.uri(&h.path("keep.txt"));
    h.write(&file, CONTENTS).await;

    let err = h.fs.delete_directory(&file).await.unwrap_err();
    assert!(err.is_store_io(), "unexpected error: {}", err);
    assert!(h.fs.exists(&file).await.unwrap());
    assert_eq!(h.read(&file).await, CONTENTS);
}

async fn get_children_of_empty_then_one(h: &Harness) {
    let dir = h.uri(&h.folder);
    h.fs.create_directory(&dir).await.unwrap();
    assert_eq!(h.fs.get_children(&dir).await.unwrap().count(), 0);

    let file_path = h.path("only.txt");
    h.write(&h.uri(&file_path), CONTENTS).await;
    let children: Vec<RemoteUri> = h.fs.get_children(&dir).await.unwrap().collect();
    assert_eq!(children, vec![h.fs.create_uri_for_path(Some(&file_path)).unwrap()]);
}

async fn get_children_lists_every_entry(h: &Harness) {
    let first = h.path("testFile1.txt");
    let second = h.path("testFile2.txt");
    h.write(&h.uri(&first), "file1").await;
    h.write(&h.uri(&second), "file2").await;

    let mut paths: Vec<String> = h
        .fs
        .get_children(&h.uri(&h.folder))
        .await
        .unwrap()
        .map(|u| u.absolute_path().to_string())
        .collect();
    paths.sort();
    assert_eq!(paths, vec![first, second]);
}

async fn get_children_requires_directory(h: &Harness) {
    let missing = h.uri(&h.path("missing"));
    assert!(h.fs.get_children(&missing).await.err().unwrap().is_store_io());

    let file = h.uri(&h.path("f.txt"));
    h.write(&file, CONTENTS).await;
    assert!(h.fs.get_children(&file).await.err().unwrap().is_store_io());
}

async fn delete_missing_fails(h: &Harness) {
    let missing = h.uri(&h.path("nope"));
    assert!(h.fs.delete(&missing).await.unwrap_err().is_store_io());
    assert!(h.fs.delete_directory(&missing).await.unwrap_err().is_store_io());
}

async fn delete_removes_file_and_empty_directory(h: &Harness) {
    let file = h.uri(&h.path("f.txt"));
    h.write(&file, CONTENTS).await;
    h.fs.delete(&file).await.unwrap();
    assert!(!h.fs.exists(&file).await.unwrap());

    let dir = h.uri(&h.folder);
    h.fs.delete(&dir).await.unwrap();
    assert!(!h.fs.exists(&dir).await.unwrap());
}

async fn delete_directory_is_recursive(h: &Harness) {
    h.write(&h.uri(&h.path("a/b/deep.txt")), CONTENTS).await;
    h.write(&h.uri(&h.path("top.txt")), CONTENTS).await;

    let dir = h.uri(&h.folder);
    h.fs.delete_directory(&dir).await.unwrap();
    assert!(!h.fs.exists(&dir).await.unwrap());
    assert!(!h.fs.exists(&h.uri(&h.path("a/b/deep.txt"))).await.unwrap());
}

async fn create_directory_collision_fails(h: &Harness) {
    let file = h.uri(&h.path("f.txt"));
    h.write(&file, CONTENTS).await;
    assert!(h.fs.create_directory(&file).await.unwrap_err().is_store_io());
    assert_eq!(h.entry_type(file.absolute_path()).await, Some(EntryType::File));
}

async fn create_overwrites_existing_file(h: &Harness) {
    let file = h.uri(&h.path("f.txt"));
    h.write(&file, "a much longer first version").await;
    h.write(&file, CONTENTS).await;
    assert_eq!(h.read(&file).await, CONTENTS);
}

async fn null_arguments_are_invalid(h: &Harness) {
    assert!(matches!(h.fs.create_uri_for_path(None), Err(FsError::InvalidArgument(_))));
    assert!(matches!(h.fs.get_file_status(None).await, Err(FsError::InvalidArgument(_))));
}

async fn uri_round_trip(h: &Harness) {
    let uri = h.fs.create_uri_for_path(Some("dir/fakefile")).unwrap();
    assert_eq!(uri, RemoteUri::new(ACCOUNT, "/dir/fakefile"));
    assert_eq!(uri.to_string(), format!("adl://{}/dir/fakefile", ACCOUNT));
    assert_eq!(h.fs.create_uri_for_path(Some(uri.absolute_path())).unwrap(), uri);
}

async fn dot_segments_address_resolved_entry(h: &Harness) {
    let dotted = h.uri(&h.path("x/../y"));
    assert_eq!(dotted, h.uri(&h.path("y")));
    h.write(&dotted, CONTENTS).await;

    assert!(h.fs.exists(&h.uri(&h.path("y"))).await.unwrap());
    assert!(!h.fs.exists(&h.uri(&h.path("x"))).await.unwrap());
    let children: Vec<RemoteUri> = h.fs.get_children(&h.uri(&h.folder)).await.unwrap().collect();
    assert_eq!(children, vec![h.uri(&h.path("y"))]);
}

async fn open_write_status_scenario(h: &Harness) {
    let dir = h.uri(&h.folder);
    h.fs.create_directory(&dir).await.unwrap();

    let file = h.uri(&h.path("f"));
    h.write(&file, CONTENTS).await;
    assert_eq!(h.read(&file).await, CONTENTS);

    let status = h.fs.get_file_status(Some(&file)).await.unwrap();
    assert_eq!(status.length_bytes, CONTENTS.len() as u64);
    let age = Utc::now() - status.modification_time;
    assert!(age < chrono::Duration::seconds(60), "stale modification time: {}", age);
    assert!(age > chrono::Duration::seconds(-5), "modification time in the future: {}", age);
}

async fn open_missing_passes_client_error_through(h: &Harness) {
    let err = h.fs.open(&h.uri(&h.path("nope"))).await.err().unwrap();
    assert!(matches!(err, FsError::Client(_)), "unexpected error: {}", err);
}

async fn copy_between_remotes_is_unsupported(h: &Harness) {
    let src = h.uri(&h.path("a"));
    h.write(&src, CONTENTS).await;
    let err = h.fs.copy(&src, &h.uri(&h.path("b"))).await.unwrap_err();
    assert!(matches!(err, FsError::Unsupported(_)));
    assert!(!h.fs.exists(&h.uri(&h.path("b"))).await.unwrap());
}

async fn copy_to_local_writes_contents(h: &Harness) {
    let remote = h.uri(&h.path("testFile1.txt"));
    h.write(&remote, CONTENTS).await;

    let local = tempfile::tempdir().unwrap();
    let target = local.path().join("download.txt");
    h.fs.copy_to_local(&remote, &target).await.unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), CONTENTS);
}

async fn copy_from_local_uploads_contents(h: &Harness) {
    let local = tempfile::tempdir().unwrap();
    let source = local.path().join("upload.txt");
    std::fs::write(&source, CONTENTS).unwrap();

    let remote = h.uri(&h.path("upload.txt"));
    h.fs.copy_from_local(&source, &remote).await.unwrap();
    assert!(h.client.check_exists(remote.absolute_path()).await.unwrap());
    assert_eq!(h.read(&remote).await, CONTENTS);
}

async fn copy_from_local_reports_failed_entries(h: &Harness) {
    let local = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("ok.txt"), "ok").unwrap();
    std::fs::write(local.path().join("blocked.txt"), "blocked").unwrap();

    // A directory already sitting at one target makes that entry fail.
    h.fs.create_directory(&h.uri(&h.path("up/blocked.txt"))).await.unwrap();

    let err = h
        .fs
        .copy_from_local(local.path(), &h.uri(&h.path("up")))
        .await
        .unwrap_err();
    assert!(err.is_store_io(), "unexpected error: {}", err);
    assert!(err.to_string().contains("1 entries did not get transferred correctly"));
}

macro_rules! contract_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $name() {
                    let h = super::Harness::memory();
                    super::$name(&h).await;
                }
            )*
        }

        mod directory {
            $(
                #[tokio::test]
                async fn $name() {
                    let h = super::Harness::directory();
                    super::$name(&h).await;
                }
            )*
        }
    };
}

contract_tests!(
    exists_flips_after_create,
    create_materializes_parent_directory,
    delete_directory_refuses_file,
    get_children_of_empty_then_one,
    get_children_lists_every_entry,
    get_children_requires_directory,
    delete_missing_fails,
    delete_removes_file_and_empty_directory,
    delete_directory_is_recursive,
    create_directory_collision_fails,
    create_overwrites_existing_file,
    null_arguments_are_invalid,
    uri_round_trip,
    dot_segments_address_resolved_entry,
    open_write_status_scenario,
    open_missing_passes_client_error_through,
    copy_between_remotes_is_unsupported,
    copy_to_local_writes_contents,
    copy_from_local_uploads_contents,
    copy_from_local_reports_failed_entries,
);

#[tokio::test]
async fn stale_entry_status_is_store_io() {
    let client = Arc::new(MemoryStoreClient::new(ACCOUNT));
    let fs = DataLakeFileSystem::new(client.clone()).unwrap();
    let uri = fs.create_uri_for_path(Some("/d/f")).unwrap();
    let mut stream = fs.create(&uri).await.unwrap();
    stream.shutdown().await.unwrap();

    assert!(client.mark_pending_delete("/d/f").unwrap());
    let err = fs.get_file_status(Some(&uri)).await.unwrap_err();
    assert!(err.is_store_io());
    assert!(err.to_string().contains("may have been deleted"));
}
