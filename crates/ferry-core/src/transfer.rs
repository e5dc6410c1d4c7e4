//! Generic move/copy between any two providers
//!
//! ```text
//!   copy/move(src, dest, src_path, dest_path)
//!        │
//!        ├─ handle_naming on dest            (unless already resolved)
//!        ├─ src.can_intra_*(dest)? ──────────► src.intra_copy / intra_move
//!        ├─ src_path is a folder ────────────► folder_op: walk children in batches
//!        └─ file ──► download ─► upload      (move: then delete the source)
//! ```
//!
//! Folder walks process children in batches of `op_concurrency`. Inside a
//! batch, sub-folders run one at a time while files run as concurrent tasks.
//! The first failure aborts the walk; nothing already transferred is rolled
//! back and tasks already in flight are left to finish on their own.

use crate::naming::{handle_naming, Conflict};
use crate::{Metadata, Provider, ProviderPath, Result, TransferConfig, Transferred};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

/// Which transfer to run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Copy,
    Move,
}

/// Per-call naming options
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferOptions {
    /// Name to give the result instead of the source's name
    pub rename: Option<String>,
    /// Collision policy at the destination
    pub conflict: Conflict,
    /// Resolve `dest_path` through [`handle_naming`] first. Disabled for the
    /// children of a folder walk, whose destinations are already final.
    pub handle_naming: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            rename: None,
            conflict: Conflict::Replace,
            handle_naming: true,
        }
    }
}

impl TransferOptions {
    pub fn with_rename(mut self, rename: impl Into<String>) -> Self {
        self.rename = Some(rename.into());
        self
    }

    pub fn with_conflict(mut self, conflict: Conflict) -> Self {
        self.conflict = conflict;
        self
    }

    /// Treat `dest_path` as final
    pub fn resolved() -> Self {
        Self {
            handle_naming: false,
            ..Self::default()
        }
    }
}

/// Runs copies and moves between providers
#[derive(Clone, Debug, Default)]
pub struct Transfer {
    config: TransferConfig,
}

impl Transfer {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Copy `src_path` on `src` to `dest_path` on `dest`
    pub async fn copy(
        &self,
        src: Arc<dyn Provider>,
        dest: Arc<dyn Provider>,
        src_path: ProviderPath,
        dest_path: ProviderPath,
        options: TransferOptions,
    ) -> Result<Transferred> {
        self.run(Operation::Copy, src, dest, src_path, dest_path, options)
            .await
    }

    /// Move `src_path` on `src` to `dest_path` on `dest`
    pub async fn move_item(
        &self,
        src: Arc<dyn Provider>,
        dest: Arc<dyn Provider>,
        src_path: ProviderPath,
        dest_path: ProviderPath,
        options: TransferOptions,
    ) -> Result<Transferred> {
        self.run(Operation::Move, src, dest, src_path, dest_path, options)
            .await
    }

    /// Entry point shared by copy and move. Boxed because folder walks
    /// recurse through it.
    pub fn run(
        &self,
        op: Operation,
        src: Arc<dyn Provider>,
        dest: Arc<dyn Provider>,
        src_path: ProviderPath,
        dest_path: ProviderPath,
        options: TransferOptions,
    ) -> BoxFuture<'static, Result<Transferred>> {
        let this = self.clone();
        async move {
            let dest_path = if options.handle_naming {
                handle_naming(
                    dest.as_ref(),
                    &src_path,
                    dest_path,
                    options.rename.as_deref(),
                    options.conflict,
                )
                .await?
            } else {
                dest_path
            };

            match op {
                Operation::Copy => this.copy_resolved(src, dest, src_path, dest_path).await,
                Operation::Move => this.move_resolved(src, dest, src_path, dest_path).await,
            }
        }
        .boxed()
    }

    #[instrument(skip_all, fields(src = %src_path, dest = %dest_path))]
    async fn copy_resolved(
        &self,
        src: Arc<dyn Provider>,
        dest: Arc<dyn Provider>,
        src_path: ProviderPath,
        mut dest_path: ProviderPath,
    ) -> Result<Transferred> {
        if src.can_intra_copy(dest.as_ref(), &src_path) {
            debug!(provider = src.name(), "using intra copy");
            return src.intra_copy(dest.as_ref(), &src_path, &dest_path).await;
        }

        if src_path.is_dir() {
            return self
                .folder_op(Operation::Copy, src, dest, src_path, dest_path)
                .await;
        }

        let stream = src.download(&src_path).await?;
        if let Some(name) = stream.name() {
            dest_path.rename(name);
        }
        dest.upload(stream, &dest_path).await
    }

    #[instrument(skip_all, fields(src = %src_path, dest = %dest_path))]
    async fn move_resolved(
        &self,
        src: Arc<dyn Provider>,
        dest: Arc<dyn Provider>,
        src_path: ProviderPath,
        dest_path: ProviderPath,
    ) -> Result<Transferred> {
        if src.can_intra_move(dest.as_ref(), &src_path) {
            debug!(provider = src.name(), "using intra move");
            return src.intra_move(dest.as_ref(), &src_path, &dest_path).await;
        }

        let result = if src_path.is_dir() {
            self.folder_op(Operation::Move, src.clone(), dest, src_path.clone(), dest_path)
                .await?
        } else {
            self.copy_resolved(src.clone(), dest, src_path.clone(), dest_path)
                .await?
        };

        src.delete(&src_path).await?;
        Ok(result)
    }

    /// Recreate the folder `src_path` at `dest_path`, applying `op` to every
    /// child.
    ///
    /// Anything already at `dest_path` is deleted first; `created` reports
    /// whether there was nothing to delete. The returned folder metadata
    /// lists the transferred children in completion order.
    #[instrument(skip_all, fields(?op, src = %src_path, dest = %dest_path))]
    async fn folder_op(
        &self,
        op: Operation,
        src: Arc<dyn Provider>,
        dest: Arc<dyn Provider>,
        src_path: ProviderPath,
        dest_path: ProviderPath,
    ) -> Result<Transferred> {
        debug_assert!(src_path.is_dir(), "folder_op needs a folder source");

        let created = match dest.delete(&dest_path).await {
            Ok(()) => false,
            Err(err) if err.is_not_found() => true,
            Err(err) => return Err(err),
        };

        let mut folder = dest.create_folder(&dest_path, false).await?;

        let parent = dest_path.parent().unwrap_or_else(ProviderPath::root);
        let dest_path = dest
            .revalidate_path(&parent, dest_path.name(), dest_path.is_dir())
            .await?;

        folder.children.clear();
        let items = src.metadata(&src_path).await?.into_items();

        for batch in items.chunks(self.config.batch_size()) {
            debug!(size = batch.len(), "dispatching batch");
            let mut tasks: JoinSet<Result<Transferred>> = JoinSet::new();

            for item in batch {
                let scheduled = self
                    .schedule_child(op, &src, &dest, &src_path, &dest_path, item)
                    .await;
                let child = match scheduled {
                    Ok(child) => child,
                    Err(err) => {
                        tasks.detach_all();
                        return Err(err);
                    }
                };

                if item.is_folder() {
                    // sub-folders run to completion before the next sibling
                    match child.await {
                        Ok((metadata, _)) => folder.children.push(metadata),
                        Err(err) => {
                            tasks.detach_all();
                            return Err(err);
                        }
                    }
                } else {
                    tasks.spawn(child);
                }
            }

            collect_batch(&mut tasks, &mut folder).await?;
        }

        Ok((folder, created))
    }

    async fn schedule_child(
        &self,
        op: Operation,
        src: &Arc<dyn Provider>,
        dest: &Arc<dyn Provider>,
        src_path: &ProviderPath,
        dest_path: &ProviderPath,
        item: &Metadata,
    ) -> Result<BoxFuture<'static, Result<Transferred>>> {
        let child_src = src
            .revalidate_path(src_path, &item.name, item.is_folder())
            .await?;
        let child_dest = dest
            .revalidate_path(dest_path, &item.name, item.is_folder())
            .await?;
        Ok(self.run(
            op,
            src.clone(),
            dest.clone(),
            child_src,
            child_dest,
            TransferOptions::resolved(),
        ))
    }
}

/// Wait for a batch of file transfers, appending each result as it lands.
/// The first error detaches the remaining tasks and is returned.
async fn collect_batch(
    tasks: &mut JoinSet<Result<Transferred>>,
    folder: &mut Metadata,
) -> Result<()> {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((metadata, _))) => folder.children.push(metadata),
            Ok(Err(err)) => {
                tasks.detach_all();
                return Err(err);
            }
            Err(join_err) => {
                tasks.detach_all();
                return Err(join_err.into());
            }
        }
    }
    Ok(())
}
