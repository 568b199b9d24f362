//! Filesystem containment for tool arguments.
//!
//! [`PathSandbox`] maps caller-supplied paths onto a fixed root directory.
//! Resolution happens in two steps:
//!
//! 1. [`PathSandbox::resolve`] normalizes `.` and `..` syntactically and checks
//!    containment component by component, so `/data2` is never inside `/data`.
//! 2. [`PathSandbox::resolve_existing`] additionally canonicalizes the result
//!    and checks it again, so a symlink inside the root cannot point outside.
//!
//! Absolute inputs are normalized as-is and must themselves land inside the
//! root; relative inputs are joined onto the root.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Errors raised while resolving a sandboxed path.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Access denied: path '{path}' is outside the allowed directory")]
    PathEscape { path: String },

    #[error("invalid sandbox root '{}': {reason}", .root.display())]
    InvalidRoot { root: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SandboxError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SandboxError::PathEscape { .. } => "path_escape",
            SandboxError::InvalidRoot { .. } => "invalid_root",
            SandboxError::Io(_) => "io_error",
        }
    }

    fn escape(path: &str) -> Self {
        SandboxError::PathEscape {
            path: path.to_string(),
        }
    }
}

/// A fixed root directory that every resolved path must stay inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Create a sandbox rooted at `root`, which must be absolute.
    ///
    /// An existing root is canonicalized so symlink checks compare like with
    /// like. A root that does not exist yet is normalized syntactically.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        if !root.is_absolute() {
            return Err(SandboxError::InvalidRoot {
                root: root.to_path_buf(),
                reason: "must be an absolute path".to_string(),
            });
        }

        let root = match std::fs::canonicalize(root) {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(root = %root.display(), "Sandbox root does not exist");
                normalize(root).ok_or_else(|| SandboxError::InvalidRoot {
                    root: root.to_path_buf(),
                    reason: "cannot be normalized".to_string(),
                })?
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `requested` syntactically.
    ///
    /// Empty and `.` resolve to the root itself.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, SandboxError> {
        let requested_path = Path::new(requested);
        let joined = if requested_path.is_absolute() {
            requested_path.to_path_buf()
        } else {
            self.root.join(requested_path)
        };

        let resolved = normalize(&joined).ok_or_else(|| SandboxError::escape(requested))?;
        if !resolved.starts_with(&self.root) {
            return Err(SandboxError::escape(requested));
        }
        Ok(resolved)
    }

    /// Resolve `requested` and follow symlinks, re-checking containment.
    ///
    /// The target must exist. Symlinks that stay inside the root are allowed.
    pub async fn resolve_existing(&self, requested: &str) -> Result<PathBuf, SandboxError> {
        let resolved = self.resolve(requested)?;
        let real = tokio::fs::canonicalize(&resolved).await?;
        if !real.starts_with(&self.root) {
            tracing::warn!(path = %requested, target = %real.display(), "Symlink escapes sandbox");
            return Err(SandboxError::escape(requested));
        }
        Ok(real)
    }

    /// Path of `resolved` relative to the root, for display to callers.
    pub fn relative<'a>(&self, resolved: &'a Path) -> &'a Path {
        resolved.strip_prefix(&self.root).unwrap_or(resolved)
    }
}

/// Collapse `.` and `..` without touching the filesystem.
///
/// `..` never climbs above the filesystem root. Windows path prefixes are
/// refused.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) => return None,
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    Some(normalized)
}
