//! Error handling for kiln.
//! Defines the crate-wide error type and result alias.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while rendering or harvesting a tree.
///
/// Everything below `main` returns these; whether an error is fatal or
/// logged-and-skipped is decided by the renderer or harvester that sees it.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    Io(#[from] io::Error),

    /// Represents errors while walking a directory tree
    #[error("Directory walk error: {0}.")]
    Walk(#[from] walkdir::Error),

    /// Represents errors that occur while parsing or executing a template
    #[error("Template error in '{name}': {source}.")]
    Template {
        name: String,
        source: minijinja::Error,
    },

    /// Represents errors that occur during configuration loading
    #[error("Configuration error: {0}.")]
    Config(String),

    /// Represents YAML parse errors in the settings or secrets documents
    #[error("YAML error: {0}.")]
    Yaml(#[from] serde_yaml::Error),

    /// The external encryption tool exited unsuccessfully
    #[error("Command '{command}' failed: {output}.")]
    Gateway { command: String, output: String },

    /// The external encryption tool could not be located or started
    #[error("Encryption tool unavailable: {0}.")]
    GatewayUnavailable(String),

    /// The taint marker exists at the working root
    #[error("Marker file '{}' exists, repository is tainted, abort.", .0.display())]
    Tainted(PathBuf),

    /// A path could not be mapped between source and target roots
    #[error("Invalid path: '{}'.", .0.display())]
    InvalidPath(PathBuf),
}

/// Convenience type alias for Results with kiln's Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{}", err);
    std::process::exit(1);
}
