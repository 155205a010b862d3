//! Synchronous gateway to the external encryption tool.
//!
//! kiln never encrypts anything itself; every decrypt, encrypt and in-place
//! set is a one-shot `sops` invocation that blocks until the tool exits.

use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Narrow interface to the encryption tool.
pub trait EncryptionGateway {
    /// Decrypts the file at `path` and returns its plaintext.
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>>;

    /// Encrypts the file at `path`. With `binary` the input is treated as
    /// opaque bytes rather than a structured document.
    fn encrypt(&self, path: &Path, binary: bool) -> Result<Vec<u8>>;

    /// Sets a value in the encrypted `document` in place. `expression` is a
    /// bracketed key path followed by a JSON value, e.g. `["a"]["b"] "v"`.
    fn set_at_path(&self, document: &Path, expression: &str) -> Result<()>;
}

/// [`EncryptionGateway`] backed by the `sops` binary.
#[derive(Debug, Clone)]
pub struct SopsGateway {
    binary: PathBuf,
    working_dir: PathBuf,
}

impl SopsGateway {
    /// Creates a gateway running `binary` from `working_dir`, so that
    /// `.sops.yaml` creation rules there apply.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(binary: P, working_dir: Q) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    /// Locates `sops` on `PATH`.
    pub fn locate<P: AsRef<Path>>(working_dir: P) -> Result<Self> {
        let binary = which::which("sops")
            .map_err(|e| Error::GatewayUnavailable(format!("sops binary not found in PATH: {}", e)))?;
        debug!("Using sops binary at: {}", binary.display());
        Ok(Self::new(binary, working_dir))
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let command_line = format!("{} {}", self.binary.display(), args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .map_err(|e| Error::GatewayUnavailable(format!("{}: {}", command_line, e)))?;

        if !output.status.success() {
            debug!("Failed command: {}", command_line);
            let mut combined = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                combined.push('\n');
                combined.push_str(stdout.trim());
            }
            return Err(Error::Gateway {
                command: command_line,
                output: format!("{} ({})", combined, output.status),
            });
        }
        Ok(output.stdout)
    }
}

impl EncryptionGateway for SopsGateway {
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>> {
        let path = path.to_string_lossy();
        self.run(&["-d", &path])
    }

    fn encrypt(&self, path: &Path, binary: bool) -> Result<Vec<u8>> {
        let path = path.to_string_lossy();
        if binary {
            self.run(&["-e", "--input-type", "binary", &path])
        } else {
            self.run(&["-e", &path])
        }
    }

    fn set_at_path(&self, document: &Path, expression: &str) -> Result<()> {
        let document = document.to_string_lossy();
        self.run(&["--set", expression, &document]).map(|_| ())
    }
}
