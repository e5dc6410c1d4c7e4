//! Lazy archive streaming of a folder (or a single file)
//!
//! The container format is supplied by an [`ArchiveEncoder`]. This module
//! only decides which files go in, under which names, and pulls each
//! download through the encoder one chunk at a time, so an archive is never
//! held in memory as a whole.

use crate::{ByteStream, Lookup, Metadata, Provider, ProviderPath, Result};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, instrument};

/// One file being written into an archive
#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveEntry {
    /// Name inside the archive, relative to the archive root (`sub/b.txt`)
    pub name: String,
    /// Size in bytes, when the provider reported one
    pub size: Option<u64>,
    /// Modification time, when known
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// Frames entries into an archive container (zip, tar, ...)
pub trait ArchiveEncoder: Send + 'static {
    /// Bytes that open a new entry
    fn begin_entry(&mut self, entry: &ArchiveEntry) -> Result<Bytes>;

    /// Encode one chunk of the current entry's content
    fn encode_chunk(&mut self, chunk: Bytes) -> Result<Bytes>;

    /// Bytes that close the current entry
    fn end_entry(&mut self) -> Result<Bytes>;

    /// Trailer written after the last entry
    fn finish(&mut self) -> Result<Bytes>;
}

/// Stream an archive of `path`.
///
/// A file path is archived as a one-entry archive rooted at its parent
/// folder. Sub-folders are listed lazily as the stream reaches them. The
/// returned stream is forward only and cannot be restarted; after the first
/// error it ends.
#[instrument(skip_all, fields(provider = provider.name(), path = %path))]
pub async fn zip<E: ArchiveEncoder>(
    provider: Arc<dyn Provider>,
    path: ProviderPath,
    encoder: E,
) -> Result<ByteStream> {
    let lookup = provider.metadata(&path).await?;
    let (root, items) = match lookup {
        Lookup::File(metadata) => (path.parent().unwrap_or_else(ProviderPath::root), vec![metadata]),
        Lookup::Folder(items) => (path, items),
    };
    debug!(items = items.len(), "archiving");

    let mut walker = ArchiveWalker {
        provider,
        encoder,
        pending: VecDeque::new(),
        current: None,
        finished: false,
    };
    walker.enqueue(&root, "", items);

    Ok(stream::unfold(walker, |mut walker| async move {
        let chunk = walker.next_chunk().await?;
        Some((chunk, walker))
    })
    .boxed())
}

struct Pending {
    path: ProviderPath,
    entry_name: String,
    metadata: Metadata,
}

struct ArchiveWalker<E> {
    provider: Arc<dyn Provider>,
    encoder: E,
    pending: VecDeque<Pending>,
    current: Option<ByteStream>,
    finished: bool,
}

impl<E: ArchiveEncoder> ArchiveWalker<E> {
    fn enqueue(&mut self, folder: &ProviderPath, prefix: &str, items: Vec<Metadata>) {
        for metadata in items {
            let path = self.provider.path_from_metadata(folder, &metadata);
            let entry_name = format!("{prefix}{}", metadata.name);
            self.pending.push_back(Pending {
                path,
                entry_name,
                metadata,
            });
        }
    }

    async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(body) = self.current.as_mut() {
                let framed = match body.next().await {
                    Some(Ok(chunk)) => self.encoder.encode_chunk(chunk),
                    Some(Err(err)) => Err(err),
                    None => {
                        self.current = None;
                        self.encoder.end_entry()
                    }
                };
                match self.emit(framed) {
                    Some(item) => return Some(item),
                    None => continue,
                }
            }

            let Some(next) = self.pending.pop_front() else {
                let trailer = self.encoder.finish();
                let item = self.emit(trailer);
                self.finished = true;
                return item;
            };

            if next.metadata.is_folder() {
                match self.provider.metadata(&next.path).await {
                    Ok(listing) => {
                        let prefix = format!("{}/", next.entry_name);
                        self.enqueue(&next.path, &prefix, listing.into_items());
                        continue;
                    }
                    Err(err) => return self.fail(err),
                }
            }

            let body = match self.provider.download(&next.path).await {
                Ok(body) => body,
                Err(err) => return self.fail(err),
            };
            let entry = ArchiveEntry {
                name: next.entry_name,
                size: body.size().or(next.metadata.size),
                modified: next.metadata.modified,
            };
            self.current = Some(body.into_inner());
            let header = self.encoder.begin_entry(&entry);
            if let Some(item) = self.emit(header) {
                return Some(item);
            }
        }
    }

    /// Pass encoder output through, dropping empty frames
    fn emit(&mut self, framed: Result<Bytes>) -> Option<Result<Bytes>> {
        match framed {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => Some(Ok(bytes)),
            Err(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: crate::ProviderError) -> Option<Result<Bytes>> {
        self.finished = true;
        self.current = None;
        Some(Err(err))
    }
}
