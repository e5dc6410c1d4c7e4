//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ferry::{
    Binding, DownloadStream, Lookup, Metadata, MemoryProvider, Provider, ProviderError,
    ProviderPath, Result, Transferred,
};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn path(raw: &str) -> ProviderPath {
    ProviderPath::parse(raw).unwrap()
}

/// Write `content` at `raw`, creating missing parent folders
pub async fn put(provider: &MemoryProvider, raw: &str, content: &str) {
    let target = path(raw);
    let mut folder = ProviderPath::root();
    let parents: Vec<String> = target
        .parent()
        .map(|p| p.segments().map(str::to_string).collect())
        .unwrap_or_default();
    for segment in parents {
        folder = folder.child(segment, true);
        provider.create_folder(&folder, false).await.unwrap();
    }
    if target.is_dir() {
        provider.create_folder(&target, false).await.unwrap();
    } else {
        provider
            .upload(DownloadStream::from_bytes(content.to_string()), &target)
            .await
            .unwrap();
    }
}

pub fn read(provider: &MemoryProvider, raw: &str) -> String {
    String::from_utf8(provider.read(&path(raw)).unwrap().to_vec()).unwrap()
}

/// Tree used by most folder tests: 4 files, 3 folders below `/dir/`
pub async fn sample_tree(provider: &MemoryProvider) {
    put(provider, "/dir/a.txt", "alpha").await;
    put(provider, "/dir/sub/b.txt", "bravo").await;
    put(provider, "/dir/sub/deep/c.txt", "charlie").await;
    put(provider, "/dir/sub/deep/d.txt", "delta").await;
    put(provider, "/dir/empty/", "").await;
}

/// Counts calls into a wrapped provider and injects failures or latency
pub struct Recording {
    pub inner: MemoryProvider,
    pub downloads: AtomicUsize,
    pub uploads: AtomicUsize,
    pub deletes: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub fail_download_of: Option<String>,
    pub upload_delay: Option<Duration>,
    pub download_name: Option<String>,
}

impl Recording {
    pub fn new(inner: MemoryProvider) -> Self {
        Self {
            inner,
            downloads: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_download_of: None,
            upload_delay: None,
            download_name: None,
        }
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.fail_download_of = Some(name.to_string());
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    pub fn naming_downloads(mut self, name: &str) -> Self {
        self.download_name = Some(name.to_string());
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for Recording {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn binding(&self) -> &Binding {
        self.inner.binding()
    }

    fn can_duplicate_names(&self) -> bool {
        self.inner.can_duplicate_names()
    }

    async fn download(&self, path: &ProviderPath) -> Result<DownloadStream> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_download_of.as_deref() == Some(path.name()) {
            return Err(ProviderError::Download {
                code: 500,
                message: format!("injected failure for {path}"),
            });
        }
        let stream = self.inner.download(path).await?;
        Ok(match &self.download_name {
            Some(name) => stream.with_name(name.clone()),
            None => stream,
        })
    }

    async fn upload(&self, stream: DownloadStream, path: &ProviderPath) -> Result<Transferred> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.inner.upload(stream, path).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, path: &ProviderPath) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(path).await
    }

    async fn metadata(&self, path: &ProviderPath) -> Result<Lookup> {
        self.inner.metadata(path).await
    }

    async fn validate_path(&self, raw: &str) -> Result<ProviderPath> {
        self.inner.validate_path(raw).await
    }

    async fn validate_v1_path(&self, raw: &str) -> Result<ProviderPath> {
        self.inner.validate_v1_path(raw).await
    }

    async fn create_folder(&self, path: &ProviderPath, precheck: bool) -> Result<Metadata> {
        self.inner.create_folder(path, precheck).await
    }

    fn can_intra_copy(&self, other: &dyn Provider, path: &ProviderPath) -> bool {
        self.inner.can_intra_copy(other, path)
    }

    fn can_intra_move(&self, other: &dyn Provider, path: &ProviderPath) -> bool {
        self.inner.can_intra_move(other, path)
    }

    async fn intra_copy(
        &self,
        dest: &dyn Provider,
        src_path: &ProviderPath,
        dest_path: &ProviderPath,
    ) -> Result<Transferred> {
        self.inner.intra_copy(dest, src_path, dest_path).await
    }

    fn as_any(&self) -> Option<&dyn Any> {
        self.inner.as_any()
    }
}
