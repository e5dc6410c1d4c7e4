//! # Ferry Core
//!
//! Backend-agnostic file and folder operations for the Ferry storage gateway.
//!
//! This crate provides:
//! - **Provider contract**: the [`Provider`] trait every storage backend implements
//! - **Naming**: destination resolution with `replace` / `keep` / `warn` conflict policies
//! - **Transfers**: generic copy and move between any two providers, with
//!   backend-pair fast paths and a batched recursive folder walk
//! - **Archives**: lazy streaming of a folder through a pluggable encoder
//! - **Memory provider**: a complete in-process backend for tests and embedding
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Request handlers               │
//! ├────────────────────┬────────────────────┤
//! │  Transfer (copy/   │  Archive (zip)     │
//! │  move, folder walk)│                    │
//! ├────────────────────┴────────────────────┤
//! │       Naming & conflict resolution      │
//! ├─────────────────────────────────────────┤
//! │            Provider trait               │
//! ├─────────────┬─────────────┬─────────────┤
//! │   Memory    │  HTTP-based backends      │
//! │             │  (via ferry-http)         │
//! └─────────────┴───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferry_core::{MemoryProvider, ProviderPath, Transfer, TransferOptions};
//! use std::sync::Arc;
//!
//! let src = Arc::new(MemoryProvider::new());
//! let dest = Arc::new(MemoryProvider::new());
//! let (metadata, created) = Transfer::default()
//!     .copy(src, dest, "/photos/".parse()?, "/".parse()?, TransferOptions::default())
//!     .await?;
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod memory;
pub mod metadata;
pub mod naming;
pub mod path;
pub mod provider;
pub mod registry;
pub mod stream;
pub mod transfer;

pub use archive::{zip, ArchiveEncoder, ArchiveEntry};
pub use config::TransferConfig;
pub use error::{ErrorKind, ProviderError, Result};
pub use memory::MemoryProvider;
pub use metadata::{Lookup, Metadata, NodeKind, Revision};
pub use naming::{handle_name_conflict, handle_naming, Conflict};
pub use path::{PathPart, ProviderPath};
pub use provider::{
    identity_eq, same_backend, Binding, Provider, SerializedProvider, Transferred,
};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use stream::{ByteStream, DownloadStream};
pub use transfer::{Operation, Transfer, TransferOptions};
