//! Destination naming and conflict resolution
//!
//! ```text
//! cp /file.txt /folder/          -> /folder/file.txt
//! cp /folder/  /other/           -> /other/folder/
//! cp /file.txt /folder/doc.txt   -> /folder/doc.txt
//! cp /file.txt /folder/file.txt  -> /folder/file (1).txt   (conflict = keep)
//! ```

use crate::{Lookup, Provider, ProviderError, ProviderPath, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

/// What to do when the destination already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conflict {
    /// Overwrite the existing node in place
    #[default]
    Replace,
    /// Pick the next free numbered name
    Keep,
    /// Fail with [`ProviderError::NamingConflict`]
    Warn,
}

impl Conflict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Conflict::Replace => "replace",
            Conflict::Keep => "keep",
            Conflict::Warn => "warn",
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Conflict {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "replace" => Ok(Conflict::Replace),
            "keep" => Ok(Conflict::Keep),
            "warn" => Ok(Conflict::Warn),
            other => Err(ProviderError::provider(
                400,
                format!("unknown conflict policy {other:?}"),
            )),
        }
    }
}

/// Work out where `src_path` lands when sent to `dest_path` on `provider`.
///
/// Folders are always copied *into*: a folder destination gains a child
/// named `rename` (or the source's own name) of the source's kind. The
/// result then goes through [`handle_name_conflict`].
#[instrument(skip_all, fields(provider = provider.name(), src = %src_path, dest = %dest_path, %conflict))]
pub async fn handle_naming(
    provider: &dyn Provider,
    src_path: &ProviderPath,
    dest_path: ProviderPath,
    rename: Option<&str>,
    conflict: Conflict,
) -> Result<ProviderPath> {
    if src_path.is_dir() && dest_path.is_file() {
        return Err(ProviderError::InvalidPath(format!(
            "destination {dest_path} must be a folder when the source is"
        )));
    }

    let dest_path = if dest_path.is_dir() {
        provider
            .revalidate_path(
                &dest_path,
                rename.unwrap_or_else(|| src_path.name()),
                src_path.is_dir(),
            )
            .await?
    } else {
        dest_path
    };

    let (resolved, _) = handle_name_conflict(provider, dest_path, conflict).await?;
    debug!(resolved = %resolved, "destination resolved");
    Ok(resolved)
}

/// Resolve a possible collision at `path`.
///
/// Returns the path to write to together with the metadata of whatever
/// already occupies it (`None` when the path is free). Under
/// [`Conflict::Keep`] the returned path is always free.
#[instrument(skip_all, fields(provider = provider.name(), path = %path, %conflict))]
pub async fn handle_name_conflict(
    provider: &dyn Provider,
    path: ProviderPath,
    conflict: Conflict,
) -> Result<(ProviderPath, Option<Lookup>)> {
    let existing = provider.exists(&path).await?;
    if existing.is_none() || conflict == Conflict::Replace {
        return Ok((path, existing));
    }

    if conflict == Conflict::Warn {
        return Err(ProviderError::NamingConflict {
            path: path.materialized(),
        });
    }

    let parent = path.parent().unwrap_or_else(ProviderPath::root);
    let mut candidate = path;
    loop {
        candidate.increment_name();
        let test_path = provider
            .revalidate_path(&parent, candidate.name(), candidate.is_dir())
            .await?;
        if provider.exists(&test_path).await?.is_none() {
            debug!(candidate = %test_path, "found free name");
            return Ok((test_path, None));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DownloadStream, MemoryProvider};
    use proptest::prelude::*;

    async fn put(provider: &MemoryProvider, raw: &str) {
        let path = ProviderPath::parse(raw).unwrap();
        provider
            .upload(DownloadStream::from_bytes(raw.as_bytes().to_vec()), &path)
            .await
            .unwrap();
    }

    fn path(raw: &str) -> ProviderPath {
        ProviderPath::parse(raw).unwrap()
    }

    #[test]
    fn test_conflict_from_str() {
        assert_eq!("keep".parse::<Conflict>().unwrap(), Conflict::Keep);
        assert_eq!(Conflict::default(), Conflict::Replace);
        assert!("merge".parse::<Conflict>().is_err());
    }

    #[tokio::test]
    async fn test_file_into_folder_takes_source_name() {
        let provider = MemoryProvider::new();
        provider.create_folder(&path("/dir/"), true).await.unwrap();

        let dest = handle_naming(&provider, &path("/a.txt"), path("/dir/"), None, Conflict::Replace)
            .await
            .unwrap();
        assert_eq!(dest, path("/dir/a.txt"));
    }

    #[tokio::test]
    async fn test_rename_applies_inside_folder() {
        let provider = MemoryProvider::new();
        let dest = handle_naming(
            &provider,
            &path("/src/"),
            path("/"),
            Some("renamed"),
            Conflict::Replace,
        )
        .await
        .unwrap();
        assert_eq!(dest, path("/renamed/"));
    }

    #[tokio::test]
    async fn test_folder_onto_file_is_rejected() {
        let provider = MemoryProvider::new();
        let err = handle_naming(&provider, &path("/src/"), path("/a.txt"), None, Conflict::Replace)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_keep_skips_taken_names() {
        let provider = MemoryProvider::new();
        provider.create_folder(&path("/dir/"), true).await.unwrap();
        put(&provider, "/dir/a.txt").await;
        put(&provider, "/dir/a (1).txt").await;

        let (resolved, existing) = handle_name_conflict(&provider, path("/dir/a.txt"), Conflict::Keep)
            .await
            .unwrap();
        assert_eq!(resolved, path("/dir/a (2).txt"));
        assert!(existing.is_none());
    }

    #[tokio::test]
    async fn test_warn_reports_path() {
        let provider = MemoryProvider::new();
        put(&provider, "/a.txt").await;

        let err = handle_name_conflict(&provider, path("/a.txt"), Conflict::Warn)
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::NamingConflict { path: "/a.txt".into() });
    }

    #[tokio::test]
    async fn test_empty_folder_counts_as_existing() {
        let provider = MemoryProvider::new();
        provider.create_folder(&path("/empty/"), true).await.unwrap();

        let (resolved, existing) = handle_name_conflict(&provider, path("/empty/"), Conflict::Keep)
            .await
            .unwrap();
        assert_eq!(resolved, path("/empty (1)/"));
        assert!(existing.is_none());

        let (_, existing) = handle_name_conflict(&provider, path("/empty/"), Conflict::Replace)
            .await
            .unwrap();
        assert_eq!(existing, Some(Lookup::Folder(Vec::new())));
    }

    proptest! {
        #[test]
        fn prop_replace_never_moves_the_path(name in "[a-z]{1,10}\\.txt", present in any::<bool>()) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let provider = MemoryProvider::new();
                let target = ProviderPath::root().child(name.clone(), false);
                if present {
                    put(&provider, &target.materialized()).await;
                }
                let (resolved, existing) = handle_name_conflict(&provider, target.clone(), Conflict::Replace)
                    .await
                    .unwrap();
                assert_eq!(resolved, target);
                assert_eq!(existing.is_some(), present);
            });
        }

        #[test]
        fn prop_keep_returns_a_free_distinct_name(name in "[a-z]{1,10}\\.txt", taken in 0usize..6) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let provider = MemoryProvider::new();
                let target = ProviderPath::root().child(name.clone(), false);
                let mut occupied = vec![target.clone()];
                let mut next = target.clone();
                for _ in 0..taken {
                    next.increment_name();
                    occupied.push(next.clone());
                }
                for p in &occupied {
                    put(&provider, &p.materialized()).await;
                }

                let (resolved, _) = handle_name_conflict(&provider, target.clone(), Conflict::Keep)
                    .await
                    .unwrap();
                assert!(occupied.iter().all(|p| p.name() != resolved.name()));
                assert!(provider.exists(&resolved).await.unwrap().is_none());
            });
        }
    }
}
