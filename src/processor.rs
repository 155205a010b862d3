//! Forward pass: turns the source tree into the rendered target tree.
//!
//! Every regular file and symlink under the source root yields exactly one
//! target entry, except files suppressed by a `.symlink` marker sibling.
//! Any error aborts the run; writes made before it are not rolled back.

use log::{debug, info};
use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::fs::{symlink, DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ConfigMapping;
use crate::constants::{DIR_MODE, FILE_MODE, SCRIPT_EXTENSION, SECRET_MARKER, SYMLINK_SUFFIX, TOOL_STATE_DIR};
use crate::error::{Error, Result};
use crate::gateway::EncryptionGateway;
use crate::path::{classify, has_suffix, with_suffix, FileKind, PathMapper};
use crate::renderer::TemplateRenderer;

/// How the target root is cleared before a full render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Also delete files inside tool-state (`.terraform`) directories
    pub remove_tool_state: bool,
    /// Delete the whole target root, directories included
    pub remove_all_directories: bool,
}

/// Outcome of processing one source entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub kind: FileKind,
    /// Target path written, `None` if the entry was suppressed
    pub target: Option<PathBuf>,
}

/// Creates `path` and its missing parents with owner-only permissions.
pub fn create_private_dir(path: &Path) -> Result<()> {
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .map_err(Error::Io)
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => create_private_dir(parent),
        None => Ok(()),
    }
}

/// Mode for a rendered file: executable for scripts, owner-only when the
/// path names secret material.
pub fn file_mode(target: &Path, name: &str) -> u32 {
    let mut mode = FILE_MODE;
    if target.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION) {
        mode |= 0o111;
    }
    if name.contains(SECRET_MARKER) {
        mode &= 0o700;
    }
    mode
}

fn write_output(target: &Path, content: &[u8], name: &str) -> Result<()> {
    create_parent(target)?;
    let mode = file_mode(target, name);
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(target)?;
    // an existing file keeps its old mode on open
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    file.write_all(content)?;
    Ok(())
}

fn create_symlink(link: &Path, target: &Path) -> Result<()> {
    // a leftover entry would make symlink() fail
    if let Ok(meta) = fs::symlink_metadata(target) {
        if !meta.is_dir() {
            fs::remove_file(target)?;
        }
    }
    symlink(link, target).map_err(|e| {
        Error::Io(io::Error::new(
            e.kind(),
            format!("could not create symlink [{}]: {}", target.display(), e),
        ))
    })
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        Error::Io(io::Error::new(
            e.kind(),
            format!("could not read template [{}]: {}", path.display(), e),
        ))
    })
}

/// True if `relative` passes through a tool-state directory.
pub fn is_tool_state(relative: &Path) -> bool {
    relative.components().any(|c| c.as_os_str() == TOOL_STATE_DIR)
}

/// Clears `target` before a full render.
///
/// With `remove_all_directories` the whole tree goes. Otherwise only files
/// and symlinks are deleted, skipping tool-state directories unless
/// `remove_tool_state` is set; directories are always left in place.
pub fn clean_target(target: &Path, options: RenderOptions) -> Result<()> {
    if options.remove_all_directories {
        if fs::symlink_metadata(target).is_ok() {
            fs::remove_dir_all(target)?;
            debug!("Removed directory [{}]", target.display());
        }
        return Ok(());
    }
    if !target.is_dir() {
        return Ok(());
    }

    let mut doomed = Vec::new();
    for entry in WalkDir::new(target) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(target).unwrap_or(entry.path());
        if !options.remove_tool_state && is_tool_state(relative) {
            continue;
        }
        doomed.push(entry.into_path());
    }
    for path in doomed {
        fs::remove_file(&path)?;
    }
    Ok(())
}

/// Walks a source tree and writes the target tree.
pub struct Processor<'a> {
    renderer: &'a dyn TemplateRenderer,
    gateway: &'a dyn EncryptionGateway,
    config: &'a ConfigMapping,
    mapper: PathMapper,
}

impl<'a> Processor<'a> {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        renderer: &'a dyn TemplateRenderer,
        gateway: &'a dyn EncryptionGateway,
        config: &'a ConfigMapping,
        source_root: P,
        target_root: Q,
    ) -> Self {
        Self {
            renderer,
            gateway,
            config,
            mapper: PathMapper::new(source_root, target_root),
        }
    }

    /// Renders the whole source tree.
    ///
    /// Refuses to run while `taint_marker` exists, clears the target root
    /// according to `options`, then processes every entry in name order.
    ///
    /// # Returns
    /// * `Result<usize>` - Number of target entries written
    pub fn render_tree(&self, taint_marker: &Path, options: RenderOptions) -> Result<usize> {
        info!("Preparing to render templates ...");
        if taint_marker.exists() {
            return Err(Error::Tainted(taint_marker.to_path_buf()));
        }

        let target_root = self.mapper.target_root();
        clean_target(target_root, options)?;
        create_private_dir(target_root)?;

        let mut written = 0;
        for entry in WalkDir::new(self.mapper.source_root()).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let processed = self.process(entry.path(), entry.path_is_symlink())?;
            if processed.target.is_some() {
                written += 1;
            }
        }
        info!(
            "Rendered {} entries from [{}] into [{}]",
            written,
            self.mapper.source_root().display(),
            target_root.display()
        );
        Ok(written)
    }

    /// Processes a single source entry.
    ///
    /// # Arguments
    /// * `path` - Source entry beneath the source root
    /// * `is_symlink` - Whether the entry itself is a symlink
    pub fn process(&self, path: &Path, is_symlink: bool) -> Result<Processed> {
        let has_marker_sibling =
            !has_suffix(path, SYMLINK_SUFFIX) && fs::symlink_metadata(with_suffix(path, SYMLINK_SUFFIX)).is_ok();
        let kind = classify(path, is_symlink, has_marker_sibling);
        if kind == FileKind::Suppressed {
            debug!("Skipping [{}], it has a symlink marker", path.display());
            return Ok(Processed { kind, target: None });
        }

        let target = self.mapper.resolve(path, kind)?;
        create_parent(&target)?;

        match kind {
            FileKind::SymlinkMarker => {
                let link = self.mapper.marker_link(path, &target)?;
                create_symlink(&link, &target)?;
                debug!("Linked [{}] -> [{}]", target.display(), link.display());
            }
            FileKind::Symlink => {
                let link = fs::read_link(path)?;
                create_symlink(&link, &target)?;
                debug!("Copied symlink from [{}] to [{}]", path.display(), target.display());
            }
            FileKind::EncryptedPassthrough => {
                debug!("Decrypt file [{}] into [{}]", path.display(), target.display());
                let plaintext = self.gateway.decrypt(path)?;
                write_output(&target, &plaintext, &self.mapper.template_name(path)?)?;
            }
            FileKind::Template => {
                let name = self.mapper.template_name(path)?;
                debug!("Rendering template [{}] to [{}]", name, target.display());
                match String::from_utf8(read_source(path)?) {
                    Ok(content) => {
                        let rendered = self.renderer.render(&name, &content, self.config.as_value())?;
                        write_output(&target, rendered.as_bytes(), &name)?;
                    }
                    Err(e) => {
                        debug!("Copying [{}] verbatim, it is not UTF-8 text", name);
                        write_output(&target, e.as_bytes(), &name)?;
                    }
                }
            }
            FileKind::Suppressed => {}
        }

        Ok(Processed {
            kind,
            target: Some(target),
        })
    }
}

/// Renders one template from `input` (stdin if `None`) to `output` (stdout
/// if `None`). The template is named after the input's base name.
pub fn render_file(
    renderer: &dyn TemplateRenderer,
    config: &ConfigMapping,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let (name, content) = match input {
        Some(path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;
            let content = String::from_utf8(read_source(path)?).map_err(|_| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("template [{}] is not UTF-8 text", path.display()),
                ))
            })?;
            (name, content)
        }
        None => {
            let mut content = String::new();
            io::stdin().read_to_string(&mut content)?;
            ("stdin".to_string(), content)
        }
    };

    let rendered = renderer.render(&name, &content, config.as_value())?;

    match output {
        Some(target) => {
            info!("Rendered template [{}] to [{}]", name, target.display());
            write_output(target, rendered.as_bytes(), &name)
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush().map_err(Error::Io)
        }
    }
}
