//! Common constants used throughout kiln.

/// Settings document looked up at the working root
pub const CONFIG_FILE: &str = "kiln.yaml";

/// Encrypted key/value document at the working root
pub const SECRETS_FILE: &str = "secrets.yaml";

/// Sentinel file signalling that generated secrets are mid-update
pub const TAINT_MARKER: &str = ".secrets-updated";

/// Suffix of files that redirect their sibling into a symlink
pub const SYMLINK_SUFFIX: &str = ".symlink";

/// Suffix of files decrypted verbatim instead of templated
pub const ENCRYPTED_SUFFIX: &str = ".sops_enc";

/// Tool-state directory preserved by partial cleanup
pub const TOOL_STATE_DIR: &str = ".terraform";

/// Rendered files with this extension get their executable bits set
pub const SCRIPT_EXTENSION: &str = "sh";

/// Rendered files whose source path contains this are restricted to the owner
pub const SECRET_MARKER: &str = "secrets";

/// File endings never folded back into the secrets document
pub const EXCLUDED_EXTENSIONS: [&str; 5] = [".md", ".txt", ".zip", ".tar.gz", ".tgz"];

/// Default source, target and generated-secrets directories
pub const DEFAULT_SOURCE_DIR: &str = "templates";
pub const DEFAULT_TARGET_DIR: &str = "rendered";
pub const DEFAULT_SECRETS_DIR: &str = "rendered/secrets";

/// Default template delimiters
pub const DEFAULT_DELIMITER_LEFT: &str = "{{{";
pub const DEFAULT_DELIMITER_RIGHT: &str = "}}}";

/// Mode for every directory created under the target root
pub const DIR_MODE: u32 = 0o700;

/// Default mode for rendered regular files
pub const FILE_MODE: u32 = 0o664;

/// How far upward the settings document is searched for
pub const MAX_SEARCH_DEPTH: usize = 32;
