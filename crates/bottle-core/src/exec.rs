//! Running external programs (`go`, `git`, `rsync`).
//!
//! Every call site goes through [`CommandRunner`] so tests can substitute a
//! fake. The contract is uniform: exit status zero is success and yields the
//! captured output, anything else is an [`ExecError`] carrying the combined
//! stdout and stderr.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;

/// Errors from running an external program.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program is not installed.
    #[error("'{program}' not found in PATH")]
    NotFound {
        /// Program name as invoked.
        program: String,
    },

    /// The program exists but could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program name as invoked.
        program: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited with a non-zero status.
    #[error("`{command}` exited with {status}:\n\n\t{}\n", indent(.output))]
    Failed {
        /// Full command line.
        command: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Combined stdout and stderr.
        output: String,
    },
}

impl ExecError {
    /// Captured output of a failed command, empty for spawn failures.
    pub fn output(&self) -> &str {
        match self {
            Self::Failed { output, .. } => output,
            _ => "",
        }
    }
}

/// Indent multi-line tool output with tabs so it reads as a block inside an
/// error message.
pub fn indent(output: &str) -> String {
    output.trim_end().split('\n').collect::<Vec<_>>().join("\n\t")
}

/// A fully described external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name, looked up in `PATH`.
    pub program: String,
    /// Arguments after the program name.
    pub args: Vec<OsString>,
    /// Variables added to (or overriding) the inherited environment.
    pub env: Vec<(String, OsString)>,
    /// Working directory; inherited when unset.
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// An invocation of `program` without arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        self.env.push((key.into(), value.as_ref().to_os_string()));
        self
    }

    /// Run the child in `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Whether argument `index` equals `value`.
    pub fn arg_is(&self, index: usize, value: &str) -> bool {
        self.args.get(index).is_some_and(|a| a == value)
    }

    /// Command line for logs and error messages.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Build a tokio command; stdio is left to the caller.
    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Executes invocations and reports their captured output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion with stdout and stderr captured.
    async fn run(&self, invocation: &Invocation) -> Result<String, ExecError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<String, ExecError> {
        tracing::debug!(command = %invocation.display(), "running");

        let output = match invocation
            .to_command()
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExecError::NotFound {
                    program: invocation.program.clone(),
                });
            }
            Err(source) => {
                return Err(ExecError::Spawn {
                    program: invocation.program.clone(),
                    source,
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(ExecError::Failed {
                command: invocation.display(),
                status: output.status.to_string(),
                output: combined,
            })
        }
    }
}
