//! Byte transfer: remote sources and the resumable executor.

mod executor;
mod http;
pub mod source;

pub use executor::{TransferExecutor, TransferReport, TRANSFER_CHUNK_SIZE};
pub use http::HttpSource;
pub use source::{BodyKind, RemoteBody, RemoteSource};
