pub mod datalake;

pub use datalake::{DataLakeFileSystem, EntryProbe};
