pub mod error;
pub mod filesystem;
pub mod store;
pub mod uri;

pub use error::FsError;
pub use filesystem::{Children, FileStatus, FileSystem};
pub use store::{
    DirectoryEntry, EntryType, FailedEntry, IfExists, ReadStream, StoreClient, TransferStatus,
    WriteStream,
};
pub use uri::RemoteUri;
