//! The capability contract every storage backend implements

use crate::{DownloadStream, Lookup, Metadata, ProviderError, ProviderPath, Result, Revision};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;

/// `(metadata of the resulting node, whether it was newly created)`
pub type Transferred = (Metadata, bool);

/// What a provider instance is bound to: who it acts for, how it
/// authenticates, and backend specific settings (bucket, folder, repo...).
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub auth: Value,
    pub credentials: Value,
    pub settings: Value,
}

impl Binding {
    pub fn new(auth: Value, credentials: Value, settings: Value) -> Self {
        Self {
            auth,
            credentials,
            settings,
        }
    }
}

impl std::fmt::Debug for Binding {
    // credentials never reach logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("auth", &self.auth)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Transportable form of a provider binding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedProvider {
    pub name: String,
    pub auth: Value,
    pub settings: Value,
    pub credentials: Value,
}

impl SerializedProvider {
    pub fn binding(&self) -> Binding {
        Binding::new(
            self.auth.clone(),
            self.credentials.clone(),
            self.settings.clone(),
        )
    }
}

/// Two backends are the same when they are the same variant holding the
/// same credentials. Auth context and settings do not take part.
pub fn identity_eq(
    left_name: &str,
    left_credentials: &Value,
    right_name: &str,
    right_credentials: &Value,
) -> bool {
    left_name == right_name && left_credentials == right_credentials
}

/// [`identity_eq`] applied to two provider instances
pub fn same_backend(left: &dyn Provider, right: &dyn Provider) -> bool {
    identity_eq(
        left.name(),
        &left.binding().credentials,
        right.name(),
        &right.binding().credentials,
    )
}

/// Trait for storage backends.
///
/// Transfer orchestration, naming resolution and archiving are written only
/// against this trait. Required methods are the wire operations each backend
/// must supply; provided methods carry the defaults a backend overrides when
/// it can do better (id lookups, server side copies, folder creation).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier of the backend variant
    fn name(&self) -> &'static str;

    /// The binding this instance was constructed with
    fn binding(&self) -> &Binding;

    /// Whether a file and a folder may share a name in one directory
    fn can_duplicate_names(&self) -> bool;

    /// Open a download of a file
    async fn download(&self, path: &ProviderPath) -> Result<DownloadStream>;

    /// Write a stream to `path`, returning the new metadata and whether the
    /// node was created (`false` when an existing file was overwritten)
    async fn upload(&self, stream: DownloadStream, path: &ProviderPath) -> Result<Transferred>;

    /// Delete a file or a folder and everything below it
    async fn delete(&self, path: &ProviderPath) -> Result<()>;

    /// Metadata of a file, or the direct children of a folder
    async fn metadata(&self, path: &ProviderPath) -> Result<Lookup>;

    /// Turn user input into a path
    async fn validate_path(&self, raw: &str) -> Result<ProviderPath>;

    /// Like [`Provider::validate_path`] but strict: a trailing slash must
    /// match the node's actual kind, otherwise the path is reported as not
    /// found.
    async fn validate_v1_path(&self, raw: &str) -> Result<ProviderPath>;

    /// Past versions of a file
    async fn revisions(&self, _path: &ProviderPath) -> Result<Vec<Revision>> {
        Ok(Vec::new())
    }

    /// Create a folder. With `precheck` the provider first verifies that
    /// nothing occupies the path.
    async fn create_folder(&self, _path: &ProviderPath, _precheck: bool) -> Result<Metadata> {
        Err(ProviderError::NotSupported(
            "folder creation not supported".into(),
        ))
    }

    /// Build the path of the child `name` under `base`. Id-based providers
    /// override this to look up the child's identifier.
    async fn revalidate_path(
        &self,
        base: &ProviderPath,
        name: &str,
        folder: bool,
    ) -> Result<ProviderPath> {
        Ok(base.child(name, folder))
    }

    /// Metadata when the node exists, `None` when it does not. An existing
    /// empty folder is `Some(Lookup::Folder(vec![]))`.
    async fn exists(&self, path: &ProviderPath) -> Result<Option<Lookup>> {
        match self.metadata(path).await {
            Ok(lookup) => Ok(Some(lookup)),
            Err(err) if err.is_missing_node() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Whether [`Provider::intra_copy`] can serve a copy to `other`
    fn can_intra_copy(&self, _other: &dyn Provider, _path: &ProviderPath) -> bool {
        false
    }

    /// Whether [`Provider::intra_move`] can serve a move to `other`
    fn can_intra_move(&self, _other: &dyn Provider, _path: &ProviderPath) -> bool {
        false
    }

    /// Backend-pair copy that bypasses download/upload
    async fn intra_copy(
        &self,
        _dest: &dyn Provider,
        _src_path: &ProviderPath,
        _dest_path: &ProviderPath,
    ) -> Result<Transferred> {
        Err(ProviderError::NotSupported("intra copy not supported".into()))
    }

    /// Backend-pair move; defaults to an intra copy followed by deleting the
    /// source
    async fn intra_move(
        &self,
        dest: &dyn Provider,
        src_path: &ProviderPath,
        dest_path: &ProviderPath,
    ) -> Result<Transferred> {
        let result = self.intra_copy(dest, src_path, dest_path).await?;
        self.delete(src_path).await?;
        Ok(result)
    }

    /// Child path of `parent` described by `metadata`, keeping the metadata's
    /// path as the child's identifier
    fn path_from_metadata(&self, parent: &ProviderPath, metadata: &Metadata) -> ProviderPath {
        parent.child_with_id(
            metadata.name.clone(),
            Some(metadata.path.trim_matches('/').to_string()),
            metadata.is_folder(),
        )
    }

    /// The concrete provider behind this handle, for fast paths that need to
    /// reach the other side's state
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }

    /// Transportable record of this binding
    fn serialized(&self) -> SerializedProvider {
        let binding = self.binding();
        SerializedProvider {
            name: self.name().to_string(),
            auth: binding.auth.clone(),
            settings: binding.settings.clone(),
            credentials: binding.credentials.clone(),
        }
    }
}
