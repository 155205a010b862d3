//! Reverse pass: folds generated artifacts back into encrypted storage.
//!
//! Two independent passes run in order. The re-encrypt pass writes rendered
//! `.sops_enc` counterparts back over their encrypted originals; the fold
//! pass stores every file under the generated-secrets root in the secrets
//! document at a key path derived from its name. Both passes skip anything
//! whose stored content already matches, so repeated runs stay quiet in
//! version control. A failure on one file is logged and the walk goes on.

use log::{debug, error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ConfigMapping;
use crate::constants::{ENCRYPTED_SUFFIX, EXCLUDED_EXTENSIONS};
use crate::error::{Error, Result};
use crate::gateway::EncryptionGateway;
use crate::keypath::{set_expression, SecretKeyPath};
use crate::path::{has_suffix, FileKind, PathMapper};

/// What happened to a single harvest candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Written back to encrypted storage
    Stored,
    /// Stored content already matches
    Unchanged,
    /// Nothing to harvest (no rendered counterpart, excluded extension)
    Skipped,
}

/// Tally of a harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub reencrypted: usize,
    pub stored: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl HarvestReport {
    fn record(&mut self, path: &Path, result: Result<Outcome>, stored: fn(&mut Self) -> &mut usize) {
        match result {
            Ok(Outcome::Stored) => *stored(self) += 1,
            Ok(Outcome::Unchanged) => self.unchanged += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Err(e) => {
                error!("Could not harvest [{}]: {}", path.display(), e);
                self.failed += 1;
            }
        }
    }
}

/// Harvests generated files back into the encrypted store.
pub struct Harvester<'a> {
    gateway: &'a dyn EncryptionGateway,
    config: &'a ConfigMapping,
    secrets_document: PathBuf,
    taint_marker: PathBuf,
}

impl<'a> Harvester<'a> {
    /// # Arguments
    /// * `config` - Mapping loaded before the run; used for change detection
    /// * `secrets_document` - Encrypted document receiving folded secrets
    /// * `taint_marker` - Marker removed once both passes are done
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        gateway: &'a dyn EncryptionGateway,
        config: &'a ConfigMapping,
        secrets_document: P,
        taint_marker: Q,
    ) -> Self {
        Self {
            gateway,
            config,
            secrets_document: secrets_document.as_ref().to_path_buf(),
            taint_marker: taint_marker.as_ref().to_path_buf(),
        }
    }

    /// Runs the re-encrypt pass over `source_root`/`target_root`, then the
    /// fold pass over `secrets_root`, then clears the taint marker.
    ///
    /// # Errors
    /// * Walking either tree fails; per-file failures only show up in the
    ///   report
    pub fn harvest(&self, secrets_root: &Path, source_root: &Path, target_root: &Path) -> Result<HarvestReport> {
        info!("Storing secrets back into [{}] ...", self.secrets_document.display());
        let mut report = HarvestReport::default();

        self.reencrypt_pass(source_root, target_root, &mut report)?;
        self.fold_pass(secrets_root, &mut report)?;

        match fs::remove_file(&self.taint_marker) {
            Ok(()) => debug!("Removed taint marker [{}]", self.taint_marker.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove [{}]: {}", self.taint_marker.display(), e),
        }
        Ok(report)
    }

    /// Re-encrypts every rendered counterpart of a `.sops_enc` source file
    /// whose content changed.
    pub fn reencrypt_pass(&self, source_root: &Path, target_root: &Path, report: &mut HarvestReport) -> Result<()> {
        let mapper = PathMapper::new(source_root, target_root);
        for entry in WalkDir::new(source_root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !has_suffix(entry.path(), ENCRYPTED_SUFFIX) {
                continue;
            }
            let rendered = mapper.resolve(entry.path(), FileKind::EncryptedPassthrough)?;
            let result = self.reencrypt(entry.path(), &rendered);
            report.record(entry.path(), result, |r| &mut r.reencrypted);
        }
        Ok(())
    }

    /// Overwrites `encrypted` with the encryption of `rendered` unless the
    /// decrypted original already equals it.
    pub fn reencrypt(&self, encrypted: &Path, rendered: &Path) -> Result<Outcome> {
        if !rendered.is_file() {
            return Ok(Outcome::Skipped);
        }
        let current = fs::read(rendered)?;
        if self.gateway.decrypt(encrypted)? == current {
            return Ok(Outcome::Unchanged);
        }

        debug!("Encrypt file [{}] into [{}]", rendered.display(), encrypted.display());
        let ciphertext = self.gateway.encrypt(rendered, true)?;
        fs::write(encrypted, ciphertext)?;
        Ok(Outcome::Stored)
    }

    /// Folds every harvestable file under `secrets_root` into the secrets
    /// document. A missing root is not an error.
    pub fn fold_pass(&self, secrets_root: &Path, report: &mut HarvestReport) -> Result<()> {
        if !secrets_root.is_dir() {
            debug!("No generated secrets under [{}]", secrets_root.display());
            return Ok(());
        }
        for entry in WalkDir::new(secrets_root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let result = self.fold(entry.path());
            report.record(entry.path(), result, |r| &mut r.stored);
        }
        Ok(())
    }

    /// Stores the content of `path` at the key path derived from its base
    /// name, unless the mapping already holds that content.
    pub fn fold(&self, path: &Path) -> Result<Outcome> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;
        if EXCLUDED_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            return Ok(Outcome::Skipped);
        }

        let content = fs::read_to_string(path)?;
        // stored values never carry carriage returns
        if self.config.lookup_string(&name).unwrap_or_default() == content.replace('\r', "") {
            return Ok(Outcome::Unchanged);
        }

        let key = SecretKeyPath::from_file_name(&name);
        debug!("Store secret [{}]", key);
        self.gateway
            .set_at_path(&self.secrets_document, &set_expression(&key, &content))?;
        Ok(Outcome::Stored)
    }
}
