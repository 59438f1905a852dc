//! Git checkouts.

use super::{Resolution, ResolveError, Resolver};
use crate::exec::{CommandRunner, Invocation};
use crate::paths;
use async_trait::async_trait;
use bottle_schema::ImportPath;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Clones git repositories into the workspace.
pub struct GitResolver {
    runner: Arc<dyn CommandRunner>,
    locks: DestinationLocks,
}

impl std::fmt::Debug for GitResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitResolver")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl GitResolver {
    /// A resolver cloning through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            locks: DestinationLocks::default(),
        }
    }

    /// Destinations currently being resolved or waited on.
    pub fn locks(&self) -> &DestinationLocks {
        &self.locks
    }
}

#[async_trait]
impl Resolver for GitResolver {
    #[tracing::instrument(level = "debug", skip(self, workspace))]
    async fn resolve(
        &self,
        locator: &str,
        import: &ImportPath,
        workspace: &Path,
    ) -> Result<Resolution, ResolveError> {
        let dest = paths::package_dir(workspace, import);
        let _guard = self.locks.lock(&dest).await;

        if dest.exists() {
            // TODO: check out the pinned revision once manifests can declare one
            if dest.join(".git").exists() {
                return Ok(Resolution::AlreadyResolved);
            }
            return Err(ResolveError::NotACheckout(dest));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ResolveError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tracing::info!(repo = locator, "cloning {import}");
        self.runner
            .run(&Invocation::new("git").args(["clone", "--"]).arg(locator).arg(&dest))
            .await?;
        Ok(Resolution::Fetched)
    }
}

/// One async mutex per destination directory.
///
/// Resolutions targeting the same directory run one after another, others
/// proceed in parallel. Entries are dropped once nobody holds or waits on
/// them.
#[derive(Debug, Default)]
pub struct DestinationLocks {
    slots: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl DestinationLocks {
    /// Wait until `dest` is free and claim it.
    pub async fn lock(&self, dest: &Path) -> DestinationGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(dest.to_path_buf()).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;
        DestinationGuard {
            locks: self,
            dest: dest.to_path_buf(),
            slot,
            guard: Some(guard),
        }
    }

    /// Number of destinations with a holder or waiter.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no destination is held or waited on.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases a destination on drop.
#[derive(Debug)]
pub struct DestinationGuard<'a> {
    locks: &'a DestinationLocks,
    dest: PathBuf,
    slot: Arc<tokio::sync::Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DestinationGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self
            .locks
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // the map and this guard are the only references left
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.dest);
        }
    }
}
