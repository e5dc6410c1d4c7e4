//! In-memory provider for testing and embedding

use crate::{
    same_backend, Binding, DownloadStream, Lookup, Metadata, Provider, ProviderError,
    ProviderPath, Result, Revision, Transferred,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone, Debug)]
struct FileVersion {
    data: Bytes,
    modified: DateTime<Utc>,
    version: u64,
}

#[derive(Clone, Debug)]
enum Node {
    Folder { modified: DateTime<Utc> },
    File { versions: Vec<FileVersion> },
}

#[derive(Debug)]
struct Store {
    nodes: RwLock<BTreeMap<String, Node>>,
    next_version: AtomicU64,
}

/// An in-memory provider.
///
/// Nodes are keyed by materialized path, so `/a` (file) and `/a/` (folder)
/// can coexist. Every upload keeps the previous content as a revision.
/// Clones share the same storage.
#[derive(Clone, Debug)]
pub struct MemoryProvider {
    binding: Binding,
    store: Arc<Store>,
    intra_ops: bool,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    pub const NAME: &'static str = "memory";

    /// Create a new empty provider
    pub fn new() -> Self {
        Self::with_binding(Binding::default())
    }

    /// Create a new empty provider bound to `binding`
    pub fn with_binding(binding: Binding) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Folder { modified: Utc::now() });
        Self {
            binding,
            store: Arc::new(Store {
                nodes: RwLock::new(nodes),
                next_version: AtomicU64::new(1),
            }),
            intra_ops: false,
        }
    }

    /// Serve copies and moves to providers with the same identity without
    /// streaming through the caller. Only clones sharing this storage take
    /// the fast path.
    pub fn with_intra_ops(mut self, enabled: bool) -> Self {
        self.intra_ops = enabled;
        self
    }

    /// Current content of a file
    pub fn read(&self, path: &ProviderPath) -> Result<Bytes> {
        let nodes = self.store.nodes.read();
        match nodes.get(&path.materialized()) {
            Some(Node::File { versions }) => versions
                .last()
                .map(|v| v.data.clone())
                .ok_or_else(|| ProviderError::NotFound(path.materialized())),
            _ => Err(ProviderError::NotFound(path.materialized())),
        }
    }

    /// Every stored path, sorted, root excluded
    pub fn paths(&self) -> Vec<String> {
        self.store
            .nodes
            .read()
            .keys()
            .filter(|key| key.as_str() != "/")
            .cloned()
            .collect()
    }

    /// Number of stored nodes, root excluded
    pub fn len(&self) -> usize {
        self.store.nodes.read().len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `other` is a memory provider over this same storage
    fn shares_store(&self, other: &dyn Provider) -> bool {
        other
            .as_any()
            .and_then(|any| any.downcast_ref::<MemoryProvider>())
            .is_some_and(|other| Arc::ptr_eq(&self.store, &other.store))
    }

    fn next_version(&self) -> u64 {
        self.store.next_version.fetch_add(1, Ordering::Relaxed)
    }

    fn require_parent(nodes: &BTreeMap<String, Node>, path: &ProviderPath) -> Result<()> {
        let parent = path.parent().unwrap_or_else(ProviderPath::root);
        match nodes.get(&parent.materialized()) {
            Some(Node::Folder { .. }) => Ok(()),
            _ => Err(ProviderError::NotFound(parent.materialized())),
        }
    }

    fn describe(key: &str, node: &Node) -> Metadata {
        let name = key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        match node {
            Node::Folder { modified } => Metadata::folder(name, key).with_modified(*modified),
            Node::File { versions } => {
                let mut metadata = Metadata::file(name, key);
                if let Some(latest) = versions.last() {
                    metadata = metadata
                        .with_size(latest.data.len() as u64)
                        .with_modified(latest.modified)
                        .with_etag(format!("v{}", latest.version));
                }
                metadata
            }
        }
    }

    fn children(nodes: &BTreeMap<String, Node>, folder_key: &str) -> Vec<Metadata> {
        nodes
            .range(folder_key.to_string()..)
            .take_while(|(key, _)| key.starts_with(folder_key))
            .filter(|(key, _)| {
                let rest = &key[folder_key.len()..];
                !rest.is_empty() && !rest.trim_end_matches('/').contains('/')
            })
            .map(|(key, node)| Self::describe(key, node))
            .collect()
    }

    fn subtree_keys(nodes: &BTreeMap<String, Node>, folder_key: &str) -> Vec<String> {
        nodes
            .range(folder_key.to_string()..)
            .take_while(|(key, _)| key.starts_with(folder_key))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn can_duplicate_names(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn download(&self, path: &ProviderPath) -> Result<DownloadStream> {
        if path.is_dir() {
            return Err(ProviderError::Download {
                code: 400,
                message: format!("{path} is a folder"),
            });
        }
        let data = self.read(path)?;
        Ok(DownloadStream::from_bytes(data))
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn upload(&self, stream: DownloadStream, path: &ProviderPath) -> Result<Transferred> {
        if path.is_dir() {
            return Err(ProviderError::Upload {
                code: 400,
                message: format!("{path} is a folder"),
            });
        }
        let data = stream.read_to_end().await?;
        let version = FileVersion {
            data,
            modified: Utc::now(),
            version: self.next_version(),
        };

        let key = path.materialized();
        let mut nodes = self.store.nodes.write();
        Self::require_parent(&nodes, path)?;

        let created = match nodes.get_mut(&key) {
            Some(Node::File { versions }) => {
                versions.push(version);
                false
            }
            _ => {
                nodes.insert(
                    key.clone(),
                    Node::File {
                        versions: vec![version],
                    },
                );
                true
            }
        };

        let metadata = Self::describe(&key, &nodes[&key]);
        Ok((metadata, created))
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn delete(&self, path: &ProviderPath) -> Result<()> {
        let key = path.materialized();
        let mut nodes = self.store.nodes.write();

        if path.is_root() {
            nodes.retain(|k, _| k == "/");
            return Ok(());
        }

        if !nodes.contains_key(&key) {
            return Err(ProviderError::NotFound(key));
        }

        if path.is_dir() {
            for child in Self::subtree_keys(&nodes, &key) {
                nodes.remove(&child);
            }
        } else {
            nodes.remove(&key);
        }
        Ok(())
    }

    async fn metadata(&self, path: &ProviderPath) -> Result<Lookup> {
        let key = path.materialized();
        let nodes = self.store.nodes.read();
        match nodes.get(&key) {
            Some(Node::Folder { .. }) if path.is_dir() => {
                Ok(Lookup::Folder(Self::children(&nodes, &key)))
            }
            Some(node @ Node::File { .. }) if path.is_file() => {
                Ok(Lookup::File(Self::describe(&key, node)))
            }
            _ => Err(ProviderError::Metadata {
                code: 404,
                message: format!("{key} not found"),
            }),
        }
    }

    async fn validate_path(&self, raw: &str) -> Result<ProviderPath> {
        let path = ProviderPath::parse(raw)?;
        if path.is_dir() {
            return Ok(path);
        }

        // `/a` names the folder `/a/` when no file of that name exists
        let nodes = self.store.nodes.read();
        let as_folder = format!("{}/", path.materialized());
        if !nodes.contains_key(&path.materialized()) && nodes.contains_key(&as_folder) {
            return ProviderPath::parse(&as_folder);
        }
        Ok(path)
    }

    async fn validate_v1_path(&self, raw: &str) -> Result<ProviderPath> {
        let path = ProviderPath::parse(raw)?;
        let nodes = self.store.nodes.read();
        let matches = match nodes.get(&path.materialized()) {
            Some(Node::Folder { .. }) => path.is_dir(),
            Some(Node::File { .. }) => path.is_file(),
            None => false,
        };
        if !matches {
            return Err(ProviderError::NotFound(raw.to_string()));
        }
        Ok(path)
    }

    async fn revisions(&self, path: &ProviderPath) -> Result<Vec<Revision>> {
        let nodes = self.store.nodes.read();
        match nodes.get(&path.materialized()) {
            Some(Node::File { versions }) if path.is_file() => Ok(versions
                .iter()
                .rev()
                .map(|v| Revision {
                    version: format!("v{}", v.version),
                    modified: Some(v.modified),
                    size: Some(v.data.len() as u64),
                })
                .collect()),
            _ => Err(ProviderError::NotFound(path.materialized())),
        }
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn create_folder(&self, path: &ProviderPath, precheck: bool) -> Result<Metadata> {
        if path.is_file() {
            return Err(ProviderError::FolderCreation {
                code: 400,
                message: format!("{path} is not a folder path"),
            });
        }

        let key = path.materialized();
        let mut nodes = self.store.nodes.write();
        Self::require_parent(&nodes, path)?;

        if nodes.contains_key(&key) {
            if precheck {
                return Err(ProviderError::FolderCreation {
                    code: 409,
                    message: format!("{key} already exists"),
                });
            }
        } else {
            nodes.insert(key.clone(), Node::Folder { modified: Utc::now() });
        }
        Ok(Self::describe(&key, &nodes[&key]))
    }

    fn can_intra_copy(&self, other: &dyn Provider, _path: &ProviderPath) -> bool {
        self.intra_ops && same_backend(self, other) && self.shares_store(other)
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn can_intra_move(&self, other: &dyn Provider, path: &ProviderPath) -> bool {
        self.can_intra_copy(other, path)
    }

    #[instrument(skip_all, fields(src = %src_path, dest = %dest_path))]
    async fn intra_copy(
        &self,
        _dest: &dyn Provider,
        src_path: &ProviderPath,
        dest_path: &ProviderPath,
    ) -> Result<Transferred> {
        let src_key = src_path.materialized();
        let dest_key = dest_path.materialized();
        let mut nodes = self.store.nodes.write();

        if !nodes.contains_key(&src_key) {
            return Err(ProviderError::NotFound(src_key));
        }
        Self::require_parent(&nodes, dest_path)?;

        let created = !nodes.contains_key(&dest_key);
        if src_path.is_file() {
            let node = nodes[&src_key].clone();
            nodes.insert(dest_key.clone(), node);
            return Ok((Self::describe(&dest_key, &nodes[&dest_key]), created));
        }

        let copied: Vec<(String, Node)> = Self::subtree_keys(&nodes, &src_key)
            .into_iter()
            .map(|key| {
                let node = nodes[&key].clone();
                (format!("{dest_key}{}", &key[src_key.len()..]), node)
            })
            .collect();
        for stale in Self::subtree_keys(&nodes, &dest_key) {
            nodes.remove(&stale);
        }
        nodes.extend(copied);

        let mut folder = Self::describe(&dest_key, &nodes[&dest_key]);
        folder.children = Self::children(&nodes, &dest_key);
        Ok((folder, created))
    }
}
