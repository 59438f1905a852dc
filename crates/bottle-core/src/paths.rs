//! Workspace paths.

use bottle_schema::ImportPath;
use std::path::{Component, Path, PathBuf};

/// Default parent directory of per-package workspaces: `$TMPDIR/bottle`.
///
/// `BOTTLE_WORKSPACE_BASE` overrides it.
pub fn default_workspace_base() -> PathBuf {
    if let Ok(val) = std::env::var("BOTTLE_WORKSPACE_BASE") {
        return PathBuf::from(val);
    }
    std::env::temp_dir().join("bottle")
}

/// Source root of a workspace: `<workspace>/src`
pub fn src_dir(workspace: &Path) -> PathBuf {
    workspace.join("src")
}

/// Materialized location of a package: `<workspace>/src/<import>`
pub fn package_dir(workspace: &Path, import: &ImportPath) -> PathBuf {
    let mut dir = src_dir(workspace);
    dir.extend(import.split('/').filter(|s| !s.is_empty()));
    dir
}

/// Binary installation target: `<workspace>/bin`
pub fn bin_dir(workspace: &Path) -> PathBuf {
    workspace.join("bin")
}

/// Lock file guarding a workspace: `<workspace>/.workspace.lock`
pub fn lock_path(workspace: &Path) -> PathBuf {
    workspace.join(".workspace.lock")
}

/// Make `path` absolute against the current directory and remove `.` and
/// `..` components lexically. Symlinks are not resolved and the path does not
/// have to exist.
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        clean(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_default();
        clean(&cwd.join(path))
    }
}

/// Lexically normalize a path.
///
/// ```
/// use bottle_core::paths::clean;
/// use std::path::Path;
///
/// assert_eq!(clean(Path::new("/a/b/../c/./d")), Path::new("/a/c/d"));
/// ```
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Slash-separated path of `path` relative to `base`, if `path` lies under it.
pub fn relative_slash(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_dir_splits_segments() {
        let dir = package_dir(Path::new("/ws"), &"github.com/a/b".into());
        assert_eq!(dir, Path::new("/ws/src/github.com/a/b"));
    }

    #[test]
    fn test_clean_keeps_root() {
        assert_eq!(clean(Path::new("/../x")), Path::new("/x"));
    }

    #[test]
    fn test_relative_slash() {
        let rel = relative_slash(Path::new("/ws/src"), Path::new("/ws/src/example.com/lib"));
        assert_eq!(rel.as_deref(), Some("example.com/lib"));
        assert_eq!(relative_slash(Path::new("/ws/src"), Path::new("/elsewhere")), None);
    }
}
