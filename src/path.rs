//! Path mapping between the source tree and the rendered tree.
//!
//! Every source entry is classified once into a [`FileKind`], and the kind
//! decides which suffix is stripped on the way to the target path.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::constants::{ENCRYPTED_SUFFIX, SYMLINK_SUFFIX};
use crate::error::{Error, Result};

/// How a single source entry is turned into a target entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Rendered through the template engine
    Template,
    /// OS-level symlink, copied verbatim
    Symlink,
    /// `X.symlink` marker; creates a symlink at `X`'s target pointing back at `X`
    SymlinkMarker,
    /// `X.sops_enc`; decrypted bytes are written to `X`'s target
    EncryptedPassthrough,
    /// `X` whose `X.symlink` sibling exists; emitted by the marker instead
    Suppressed,
}

/// Returns true if the file name of `path` ends with `suffix`.
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}

/// Removes `suffix` from the file name of `path`, if present.
pub fn strip_suffix(path: &Path, suffix: &str) -> PathBuf {
    match path.file_name().map(|n| n.to_string_lossy().into_owned()) {
        Some(name) => match name.strip_suffix(suffix) {
            Some(stripped) if !stripped.is_empty() => path.with_file_name(stripped),
            _ => path.to_path_buf(),
        },
        None => path.to_path_buf(),
    }
}

/// Appends `suffix` to the file name of `path`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Classifies a source entry. Marker handling takes precedence over
/// everything else, then verbatim symlinks, then encrypted passthrough.
pub fn classify(path: &Path, is_symlink: bool, has_marker_sibling: bool) -> FileKind {
    if has_suffix(path, SYMLINK_SUFFIX) {
        FileKind::SymlinkMarker
    } else if has_marker_sibling {
        FileKind::Suppressed
    } else if is_symlink {
        FileKind::Symlink
    } else if has_suffix(path, ENCRYPTED_SUFFIX) {
        FileKind::EncryptedPassthrough
    } else {
        FileKind::Template
    }
}

/// Lexical relative path from directory `from` to `to`.
///
/// Both paths must be of the same kind (both absolute or both relative).
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for component in &to[common..] {
        rel.push(component.as_os_str());
    }
    rel
}

/// Maps paths under a source root onto paths under a target root.
#[derive(Debug, Clone)]
pub struct PathMapper {
    source_root: PathBuf,
    target_root: PathBuf,
}

impl PathMapper {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(source_root: P, target_root: Q) -> Self {
        Self {
            source_root: source_root.as_ref().to_path_buf(),
            target_root: target_root.as_ref().to_path_buf(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Path of `path` relative to the source root.
    pub fn relative<'a>(&self, path: &'a Path) -> Result<&'a Path> {
        path.strip_prefix(&self.source_root)
            .map_err(|_| Error::InvalidPath(path.to_path_buf()))
    }

    /// Target path for `path` before any suffix handling.
    pub fn target_path(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.target_root.join(self.relative(path)?))
    }

    /// Target path for `path` once `kind`'s suffix rule is applied.
    pub fn resolve(&self, path: &Path, kind: FileKind) -> Result<PathBuf> {
        let target = self.target_path(path)?;
        Ok(match kind {
            FileKind::SymlinkMarker => strip_suffix(&target, SYMLINK_SUFFIX),
            FileKind::EncryptedPassthrough => strip_suffix(&target, ENCRYPTED_SUFFIX),
            _ => target,
        })
    }

    /// Link text for the symlink a marker at `marker` creates at `target`:
    /// the marker's sibling, relative to the target's parent directory, so the
    /// link survives relocating both trees together.
    pub fn marker_link(&self, marker: &Path, target: &Path) -> Result<PathBuf> {
        let sibling = absolute(&strip_suffix(marker, SYMLINK_SUFFIX))?;
        let parent = target
            .parent()
            .ok_or_else(|| Error::InvalidPath(target.to_path_buf()))?;
        Ok(relative_path(&absolute(parent)?, &sibling))
    }

    /// Identity of `path` exposed to templates as the current file.
    pub fn template_name(&self, path: &Path) -> Result<String> {
        Ok(self.relative(path)?.to_string_lossy().into_owned())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
