//! Local directories.

use super::{Resolution, ResolveError, Resolver};
use crate::materialize::{Mirror, MirrorOptions};
use crate::paths;
use async_trait::async_trait;
use bottle_schema::ImportPath;
use std::path::Path;

/// Mirrors a local directory into the workspace.
///
/// Local sources may change between runs, so the mirror always runs and the
/// result is always [`Resolution::Fetched`].
#[derive(Debug, Clone)]
pub struct PathResolver {
    mirror: Mirror,
}

impl PathResolver {
    /// A resolver copying with `mirror`.
    pub fn new(mirror: Mirror) -> Self {
        Self { mirror }
    }
}

#[async_trait]
impl Resolver for PathResolver {
    #[tracing::instrument(level = "debug", skip(self, workspace))]
    async fn resolve(
        &self,
        locator: &str,
        import: &ImportPath,
        workspace: &Path,
    ) -> Result<Resolution, ResolveError> {
        let dest = paths::package_dir(workspace, import);
        self.mirror
            .sync(Path::new(locator), &dest, &MirrorOptions::workspace())
            .await?;
        Ok(Resolution::Fetched)
    }
}
