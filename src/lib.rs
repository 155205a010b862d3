//! kiln renders a directory of templates into an output tree, injecting
//! configuration values and SOPS-encrypted secrets, and harvests generated
//! secrets back into the encrypted store.

/// Command-line interface module for kiln
pub mod cli;

/// Configuration handling
/// Discovers kiln.yaml and merges the decrypted secrets.yaml over it
pub mod config;

/// Common constants: file names, suffixes and modes
pub mod constants;

/// Error types and handling for kiln
pub mod error;

/// Custom template functions
pub mod functions;

/// Gateway to the external encryption tool
pub mod gateway;

/// Reverse pass folding generated secrets back into encrypted storage
pub mod harvester;

/// Secret key paths derived from file names
pub mod keypath;

/// Logger setup and level selection
pub mod logger;

/// Source to target path mapping and file classification
pub mod path;

/// Forward pass rendering the source tree into the target tree
pub mod processor;

/// Template parsing and rendering functionality
pub mod renderer;

/// Block YAML output for templates
pub mod yaml;
