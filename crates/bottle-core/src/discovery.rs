//! Package discovery: from a directory to its [`Config`].
//!
//! The same logic serves the root package (searching parent directories for
//! the nearest manifest) and every transitively fetched package (looking only
//! at the directory it was materialized into). A directory without a manifest
//! that lies inside a workspace becomes an unmanaged package addressed by its
//! position under `<workspace>/src`.

use crate::paths;
use crate::settings::Settings;
use bottle_schema::{Config, ImportPath, Manifest, ManifestError, PackageSection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on parent-directory steps before the walk is considered runaway.
const MAX_PARENT_STEPS: usize = 100;

/// Errors from locating or loading a package.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The starting point is not a directory.
    #[error("no such directory \"{}\"", .0.display())]
    NoSuchDirectory(PathBuf),

    /// No manifest was found and the directory is outside the workspace.
    #[error("unknown package root for \"{}\": no {manifest} found and not inside a workspace", .dir.display())]
    UnknownRoot {
        /// Directory the search started from.
        dir: PathBuf,
        /// Manifest file name searched for.
        manifest: String,
    },

    /// The parent walk exceeded its step limit.
    #[error("gave up looking for {manifest} above \"{}\" after {} directories", .dir.display(), MAX_PARENT_STEPS)]
    RunawayWalk {
        /// Directory the search started from.
        dir: PathBuf,
        /// Manifest file name searched for.
        manifest: String,
    },

    /// The manifest exists but is invalid.
    #[error("invalid manifest \"{}\": {source}", .path.display())]
    Manifest {
        /// Manifest location.
        path: PathBuf,
        /// What is wrong with it.
        #[source]
        source: ManifestError,
    },
}

/// Locates and loads package configurations.
#[derive(Debug, Clone)]
pub struct Discovery {
    manifest_name: String,
    workspace_base: PathBuf,
    workspace_root: Option<PathBuf>,
}

impl Discovery {
    /// Discovery for a root package; unmanaged directories are addressed
    /// relative to the host workspace, if any.
    pub fn new(settings: &Settings) -> Self {
        Self {
            manifest_name: settings.manifest_name.clone(),
            workspace_base: settings.workspace_base.clone(),
            workspace_root: settings.host_workspace.clone(),
        }
    }

    /// Address unmanaged directories relative to `workspace` instead.
    pub fn with_workspace_root(mut self, workspace: &Path) -> Self {
        self.workspace_root = Some(workspace.to_path_buf());
        self
    }

    /// Find the package containing `start`, walking up through parent
    /// directories until a manifest is found.
    pub fn find(&self, start: &Path) -> Result<Config, DiscoveryError> {
        let start = paths::absolute(start);
        if !start.is_dir() {
            return Err(DiscoveryError::NoSuchDirectory(start));
        }

        let mut dir = start.as_path();
        for _ in 0..MAX_PARENT_STEPS {
            let manifest = dir.join(&self.manifest_name);
            if manifest.is_file() {
                return self.from_manifest(dir, &manifest);
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return self.synthesize(&start),
            }
        }

        Err(DiscoveryError::RunawayWalk {
            dir: start,
            manifest: self.manifest_name.clone(),
        })
    }

    /// Load the package rooted exactly at `dir`, without searching parents.
    pub fn load(&self, dir: &Path) -> Result<Config, DiscoveryError> {
        let dir = paths::absolute(dir);
        if !dir.is_dir() {
            return Err(DiscoveryError::NoSuchDirectory(dir));
        }
        let manifest = dir.join(&self.manifest_name);
        if manifest.is_file() {
            self.from_manifest(&dir, &manifest)
        } else {
            self.synthesize(&dir)
        }
    }

    fn from_manifest(&self, dir: &Path, manifest_path: &Path) -> Result<Config, DiscoveryError> {
        let manifest = Manifest::load(manifest_path).map_err(|source| DiscoveryError::Manifest {
            path: manifest_path.to_path_buf(),
            source,
        })?;
        tracing::debug!(package = %manifest.package.name, dir = %dir.display(), "loaded manifest");

        let package_root = match manifest.package.root.as_deref() {
            Some(root) if !root.is_empty() => paths::clean(&dir.join(root)),
            _ => dir.to_path_buf(),
        };

        Ok(Config {
            project: dir.to_path_buf(),
            workspace: self.workspace_base.join(&manifest.package.name),
            package_root,
            package: manifest.package,
            dependencies: manifest.dependencies,
            bin: manifest.bin,
            missing: false,
            import_path: None,
        })
    }

    fn synthesize(&self, dir: &Path) -> Result<Config, DiscoveryError> {
        let import = self
            .workspace_root
            .as_deref()
            .and_then(|ws| paths::relative_slash(&paths::src_dir(ws), dir))
            .filter(|rel| !rel.is_empty())
            .map(ImportPath::from)
            .ok_or_else(|| DiscoveryError::UnknownRoot {
                dir: dir.to_path_buf(),
                manifest: self.manifest_name.clone(),
            })?;
        tracing::debug!(import = %import, "no manifest, treating as unmanaged package");

        let package = PackageSection {
            name: import.base_name().to_string(),
            ..PackageSection::default()
        };

        Ok(Config {
            project: dir.to_path_buf(),
            workspace: self.workspace_base.join(&package.name),
            package_root: dir.to_path_buf(),
            package,
            dependencies: BTreeMap::new(),
            bin: Vec::new(),
            missing: true,
            import_path: Some(import),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn settings(base: &Path) -> Settings {
        Settings {
            workspace_base: base.join("workspaces"),
            ..Settings::default()
        }
    }

    #[test]
    fn test_find_walks_up_to_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("app");
        let nested = project.join("cmd").join("tool");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            project.join("Bottle.toml"),
            "[package]\nname = \"example.com/app\"\nroot = \"src\"\n",
        )
        .unwrap();

        let cfg = Discovery::new(&settings(tmp.path())).find(&nested).unwrap();
        assert_eq!(cfg.project, project);
        assert_eq!(cfg.package_root, project.join("src"));
        assert_eq!(cfg.name(), "example.com/app");
        assert_eq!(
            cfg.workspace,
            tmp.path().join("workspaces").join("example.com/app")
        );
        assert!(!cfg.missing);
    }

    #[test]
    fn test_unmanaged_directory_in_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path().join("ws");
        let dir = ws.join("src").join("example.org").join("legacy");
        fs::create_dir_all(&dir).unwrap();

        let discovery = Discovery::new(&settings(tmp.path())).with_workspace_root(&ws);
        let cfg = discovery.load(&dir).unwrap();
        assert!(cfg.missing);
        assert_eq!(cfg.import_path.as_ref().unwrap(), "example.org/legacy");
        assert_eq!(cfg.package.name, "legacy");
        assert!(cfg.dependencies.is_empty());
    }

    #[test]
    fn test_outside_workspace_without_manifest_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("stray");
        fs::create_dir_all(&dir).unwrap();

        let err = Discovery::new(&settings(tmp.path())).load(&dir).unwrap_err();
        assert!(matches!(err, DiscoveryError::UnknownRoot { .. }));
        assert!(err.to_string().contains("stray"));
    }

    #[test]
    fn test_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Discovery::new(&settings(tmp.path()))
            .find(&tmp.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::NoSuchDirectory(_)));
    }

    #[test]
    fn test_malformed_manifest_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("Bottle.toml"), "[package\n").unwrap();
        let err = Discovery::new(&settings(tmp.path()))
            .load(tmp.path())
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Manifest { .. }));
    }
}
