//! Materializing source trees into a workspace.
//!
//! [`Mirror`] copies directories with `rsync`. [`ImportRewriter`] then fixes
//! up the import statements of the copied Go sources so that packages
//! declared under a local name import the canonical path they were fetched
//! to.

use crate::exec::{CommandRunner, ExecError, Invocation};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

/// Suffix of the backup kept while a file is being rewritten.
const BACKUP_SUFFIX: &str = ".orig";

/// Lines starting with these end the import section of a Go file.
const DECLARATION_PREFIXES: [&str; 4] = ["func ", "type ", "const ", "var "];

/// Errors from mirroring directories or rewriting sources.
#[derive(Error, Debug)]
pub enum MaterializeError {
    /// A file or directory could not be read, written or created.
    #[error("failed to rewrite {}: {source}", .path.display())]
    Io {
        /// Path the operation failed on.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// rsync failed.
    #[error("failed to sync into {}: {source}", .dest.display())]
    Sync {
        /// Mirror destination.
        dest: PathBuf,
        /// The failed rsync run.
        #[source]
        source: ExecError,
    },

    /// The rename table produced an invalid pattern.
    #[error("invalid rename table: {0}")]
    Pattern(#[from] regex::Error),
}

// ============================================================================
// Mirror
// ============================================================================

/// Options for one [`Mirror::sync`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorOptions {
    /// Remove files from the destination that are absent from the source.
    pub delete: bool,
    /// Extra rsync exclude patterns.
    pub excludes: Vec<String>,
}

impl MirrorOptions {
    /// Options for copying a package into a workspace: stale files are removed.
    pub fn workspace() -> Self {
        Self {
            delete: true,
            excludes: Vec::new(),
        }
    }

    /// Add exclude patterns.
    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(patterns.into_iter().map(Into::into));
        self
    }
}

/// Directory mirroring through `rsync`.
#[derive(Clone)]
pub struct Mirror {
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror").finish_non_exhaustive()
    }
}

impl Mirror {
    /// A mirror running rsync through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// The rsync invocation copying the contents of `src` into `dest`.
    ///
    /// Hidden files and rewrite backups are never copied.
    pub fn invocation(src: &Path, dest: &Path, opts: &MirrorOptions) -> Invocation {
        let mut inv = Invocation::new("rsync")
            .arg("-rum")
            .args(["--exclude", ".*"])
            .args(["--exclude", "*.orig"]);
        for pattern in &opts.excludes {
            inv = inv.arg("--exclude").arg(pattern);
        }
        if opts.delete {
            inv = inv.arg("--delete");
        }

        let mut src = src.as_os_str().to_os_string();
        src.push("/");
        inv.arg("--out-format=%n").arg(src).arg(dest)
    }

    /// Mirror `src` into `dest` and return the files that were transferred,
    /// as paths under `dest`. Output lines that do not name a regular file
    /// under `dest` are ignored.
    #[tracing::instrument(level = "debug", skip(self, opts), fields(src = %src.display(), dest = %dest.display()))]
    pub async fn sync(
        &self,
        src: &Path,
        dest: &Path,
        opts: &MirrorOptions,
    ) -> Result<Vec<PathBuf>, MaterializeError> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|source| MaterializeError::Io {
                path: dest.to_path_buf(),
                source,
            })?;

        let output = self
            .runner
            .run(&Self::invocation(src, dest, opts))
            .await
            .map_err(|source| MaterializeError::Sync {
                dest: dest.to_path_buf(),
                source,
            })?;

        // the output also carries rsync's warnings; keep only names of copied files
        let files: Vec<PathBuf> = output
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty() && !line.starts_with("deleting ") && !line.ends_with('/'))
            .filter(|line| {
                Path::new(line)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            })
            .map(|line| dest.join(line))
            .filter(|path| path.is_file())
            .collect();
        tracing::debug!(transferred = files.len(), "sync complete");
        Ok(files)
    }
}

// ============================================================================
// Import rewriting
// ============================================================================

/// Rewrites import paths in the import section of Go source files.
///
/// Only whole quoted paths in one of the six import forms are replaced:
///
/// ```text
/// import "old"      import . "old"      import _ "old"
/// <tab>"old"        <tab>. "old"        <tab>_ "old"
/// ```
///
/// `"old"` and `"old/sub"` match, `"older"` does not. When several table
/// entries match at the same position the longest one wins.
#[derive(Debug, Clone)]
pub struct ImportRewriter {
    renames: BTreeMap<String, String>,
    pattern: Option<Regex>,
}

impl ImportRewriter {
    /// Build a rewriter from a `old -> new` table.
    pub fn new(renames: &BTreeMap<String, String>) -> Result<Self, MaterializeError> {
        let renames: BTreeMap<String, String> = renames
            .iter()
            .filter(|(old, new)| !old.is_empty() && old != new)
            .map(|(old, new)| (old.clone(), new.clone()))
            .collect();

        let pattern = if renames.is_empty() {
            None
        } else {
            let mut olds: Vec<&str> = renames.keys().map(String::as_str).collect();
            olds.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            let alternation = olds
                .iter()
                .map(|old| regex::escape(old))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(
                r#"(import \. |import _ |import |\t\. |\t_ |\t)"({alternation})(["/])"#
            ))?)
        };

        Ok(Self { renames, pattern })
    }

    /// The rewriter undoing this one.
    pub fn inverse(&self) -> Result<Self, MaterializeError> {
        let inverted: BTreeMap<String, String> = self
            .renames
            .iter()
            .map(|(old, new)| (new.clone(), old.clone()))
            .collect();
        Self::new(&inverted)
    }

    /// Whether the table has nothing to replace.
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    /// Apply the table to a single line.
    pub fn rewrite_line<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let Some(pattern) = &self.pattern else {
            return Cow::Borrowed(line);
        };
        pattern.replace_all(line, |caps: &Captures<'_>| {
            let new = self.renames.get(&caps[2]).map_or(&caps[2], String::as_str);
            format!("{}\"{}{}", &caps[1], new, &caps[3])
        })
    }

    /// Rewrite `path` in place. Returns whether the file changed.
    ///
    /// Lines are rewritten up to the first top-level declaration; that line
    /// and everything after it are copied unchanged. The file is moved to
    /// `<path>.orig` while the new content is written and moved back if
    /// anything fails.
    pub fn rewrite_file(&self, path: &Path) -> Result<bool, MaterializeError> {
        if self.is_empty() {
            return Ok(false);
        }
        let io_err = |source| MaterializeError::Io {
            path: path.to_path_buf(),
            source,
        };

        let content = fs::read(path).map_err(io_err)?;
        let Some(rewritten) = self.rewrite_content(&content) else {
            return Ok(false);
        };
        let permissions = fs::metadata(path).map_err(io_err)?.permissions();

        let backup = Backup::create(path).map_err(io_err)?;
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&rewritten).map_err(io_err)?;
        let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;
        fs::set_permissions(path, permissions).map_err(io_err)?;
        backup.commit().map_err(io_err)?;

        tracing::trace!(path = %path.display(), "rewrote imports");
        Ok(true)
    }

    /// New content for a file, or `None` if nothing in its import section
    /// matches.
    fn rewrite_content(&self, content: &[u8]) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(content.len());
        let mut changed = false;
        let mut rest = content;

        while !rest.is_empty() {
            let end = rest
                .iter()
                .position(|&b| b == b'\n')
                .map_or(rest.len(), |i| i + 1);
            let (line, tail) = rest.split_at(end);

            if DECLARATION_PREFIXES.iter().any(|p| line.starts_with(p.as_bytes())) {
                break;
            }
            match std::str::from_utf8(line) {
                Ok(text) => match self.rewrite_line(text) {
                    Cow::Owned(new) => {
                        changed = true;
                        out.extend_from_slice(new.as_bytes());
                    }
                    Cow::Borrowed(_) => out.extend_from_slice(line),
                },
                Err(_) => out.extend_from_slice(line),
            }
            rest = tail;
        }

        if !changed {
            return None;
        }
        out.extend_from_slice(rest);
        Some(out)
    }

    /// Rewrite every `.go` file in `files`. Returns the number changed.
    pub fn rewrite_files(&self, files: &[PathBuf]) -> Result<usize, MaterializeError> {
        let mut changed = 0;
        for file in files.iter().filter(|f| is_go_source(f)) {
            if self.rewrite_file(file)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Rewrite every `.go` file under `dir`, skipping hidden directories.
    pub fn rewrite_tree(&self, dir: &Path) -> Result<usize, MaterializeError> {
        if self.is_empty() {
            return Ok(0);
        }
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            let entry = entry.map_err(|e| MaterializeError::Io {
                path: e.path().unwrap_or(dir).to_path_buf(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        self.rewrite_files(&files)
    }
}

fn is_go_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "go")
}

/// A file moved aside to `<file>.orig`; moved back on drop unless committed.
#[derive(Debug)]
struct Backup {
    original: PathBuf,
    backup: PathBuf,
    committed: bool,
}

impl Backup {
    fn create(original: &Path) -> std::io::Result<Self> {
        let mut backup = original.as_os_str().to_os_string();
        backup.push(BACKUP_SUFFIX);
        let backup = PathBuf::from(backup);
        fs::rename(original, &backup)?;
        Ok(Self {
            original: original.to_path_buf(),
            backup,
            committed: false,
        })
    }

    fn commit(mut self) -> std::io::Result<()> {
        self.committed = true;
        fs::remove_file(&self.backup)
    }
}

impl Drop for Backup {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let _ = fs::remove_file(&self.original);
        if let Err(e) = fs::rename(&self.backup, &self.original) {
            tracing::error!(
                backup = %self.backup.display(),
                "failed to restore {}: {e}",
                self.original.display()
            );
        }
    }
}
