//! Byte streams flowing between providers

use crate::Result;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A boxed, sendable stream of byte chunks
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// The body of a download, plus what the provider knows about it
pub struct DownloadStream {
    name: Option<String>,
    size: Option<u64>,
    content_type: Option<String>,
    inner: ByteStream,
}

impl DownloadStream {
    /// Wrap an existing chunk stream
    pub fn new(inner: ByteStream) -> Self {
        Self {
            name: None,
            size: None,
            content_type: None,
            inner,
        }
    }

    /// A stream yielding `data` as a single chunk
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        let size = data.len() as u64;
        Self::new(futures::stream::once(async move { Ok(data) }).boxed()).with_size(size)
    }

    /// Suggested file name; a copy renames its destination to it
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn into_inner(self) -> ByteStream {
        self.inner
    }

    /// Drain the stream into memory
    pub async fn read_to_end(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for DownloadStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadStream")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
