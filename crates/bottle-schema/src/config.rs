//! Package manifests (`Bottle.toml`) and the per-package configuration built
//! from them.
//!
//! A manifest declares the package's identity, its dependencies keyed by
//! import path, and the binaries it produces:
//!
//! ```toml
//! [package]
//! name = "example.com/app"
//!
//! [dependencies]
//! "github.com/user/lib" = {}
//! "mylib" = { path = "../mylib", install = true }
//!
//! [[bin]]
//! name = "app"
//! path = "cmd/app"
//! ```

use crate::ImportPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Manifest location.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid TOML or does not match the schema.
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    /// `package.name` is absent or empty.
    #[error("manifest is missing the required `package.name`")]
    MissingName,
}

/// Top-level manifest as written on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// The `[package]` section.
    pub package: PackageSection,
    /// Dependencies keyed by the import path the package uses for them.
    pub dependencies: BTreeMap<String, DependencySpec>,
    /// Binaries produced by the package.
    pub bin: Vec<BinTarget>,
}

/// The `[package]` section of a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSection {
    /// Import path of the package's root package (required).
    pub name: String,
    /// Version of the code in this tree.
    pub version: String,
    /// Package authors.
    pub authors: Vec<String>,
    /// Source repository URL.
    pub repository: String,
    /// License identifier.
    pub license: String,
    /// Whether the package is meant to be published.
    pub publish: bool,
    /// Extra exclude patterns applied when mirroring the package into the workspace.
    pub exclude: Vec<String>,
    /// Source directory of the root package, relative to the manifest, when
    /// it is not the manifest's own directory.
    pub root: Option<String>,
}

/// One `[dependencies]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencySpec {
    /// Build the package into `<workspace>/bin` after resolution.
    pub install: bool,
    /// Local directory, relative to the declaring project.
    pub path: Option<String>,
    /// Git clone URL.
    pub git: Option<String>,
}

/// A `[[bin]]` target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinTarget {
    /// Name the binary is copied out under.
    pub name: String,
    /// Main package directory (or file) relative to the package root.
    pub path: String,
}

impl Manifest {
    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// does not name its package.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }
}

impl std::str::FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let manifest: Manifest = toml::from_str(s)?;
        if manifest.package.name.trim().is_empty() {
            return Err(ManifestError::MissingName);
        }
        Ok(manifest)
    }
}

/// Everything the resolver knows about one package.
///
/// Built once by discovery, either from a manifest or synthesized for a
/// directory without one (`missing == true`), and not modified afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the manifest, or the package directory itself.
    pub project: PathBuf,
    /// Workspace this package would be built in when it is the root.
    pub workspace: PathBuf,
    /// Absolute source directory of the root package.
    pub package_root: PathBuf,
    /// The `[package]` section, synthesized for unmanaged packages.
    pub package: PackageSection,
    /// Declared dependencies, keyed by local name.
    pub dependencies: BTreeMap<String, DependencySpec>,
    /// Declared binaries.
    pub bin: Vec<BinTarget>,
    /// No manifest was found; the configuration was synthesized.
    pub missing: bool,
    /// Workspace-relative import path, set for synthesized configurations.
    pub import_path: Option<ImportPath>,
}

impl Config {
    /// The package's import path as declared (or synthesized).
    pub fn name(&self) -> ImportPath {
        ImportPath::new(&self.package.name)
    }

    /// Copy of this configuration whose project directory is `project`.
    ///
    /// Relative `path` dependencies resolve against the project directory,
    /// so packages mirrored from a local directory keep pointing at their
    /// original neighbours.
    pub fn with_project(mut self, project: PathBuf) -> Self {
        self.project = project;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_manifest() {
        let manifest: Manifest = r#"
            [package]
            name = "example.com/app"
            version = "0.2.0"
            exclude = ["*.tmp"]
            root = "src"

            [dependencies]
            "github.com/user/lib" = {}
            "mylib" = { path = "../mylib", install = true }
            "tool" = { git = "https://example.com/tool.git" }

            [[bin]]
            name = "app"
            path = "cmd/app"
        "#
        .parse()
        .unwrap();

        assert_eq!(manifest.package.name, "example.com/app");
        assert_eq!(manifest.package.root.as_deref(), Some("src"));
        assert_eq!(manifest.dependencies.len(), 3);
        assert_eq!(
            manifest.dependencies["mylib"],
            DependencySpec {
                install: true,
                path: Some("../mylib".into()),
                git: None,
            }
        );
        assert_eq!(manifest.bin[0].path, "cmd/app");
    }

    #[test]
    fn test_dependencies_iterate_sorted() {
        let manifest: Manifest = r#"
            [package]
            name = "app"
            [dependencies]
            "zeta" = {}
            "alpha" = {}
            "mid" = {}
        "#
        .parse()
        .unwrap();
        let names: Vec<&str> = manifest.dependencies.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_missing_name_rejected() {
        let err = "[package]\nversion = \"1.0\"\n".parse::<Manifest>().unwrap_err();
        assert!(matches!(err, ManifestError::MissingName));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(&dir.path().join("Bottle.toml")).unwrap_err();
        assert!(err.to_string().contains("Bottle.toml"));
    }
}
