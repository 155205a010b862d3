//! Configuration handling for kiln.
//! Discovers the `kiln.yaml` settings document, merges the decrypted
//! `secrets.yaml` over it and exposes the result as an immutable mapping.

use crate::constants::{
    CONFIG_FILE, DEFAULT_SECRETS_DIR, DEFAULT_SOURCE_DIR, DEFAULT_TARGET_DIR, MAX_SEARCH_DEPTH,
    SECRETS_FILE, TAINT_MARKER,
};
use crate::error::{Error, Result};
use crate::gateway::EncryptionGateway;
use crate::renderer::Delimiters;
use log::{debug, error};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Fully resolved configuration, read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMapping(Value);

impl ConfigMapping {
    pub fn new(value: Value) -> Self {
        match value {
            Value::Null => Self::default(),
            value => Self(value),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Looks `key` up as a literal top-level key first, then as a dotted path.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(key) {
            return Some(value);
        }
        key.split('.')
            .try_fold(&self.0, |node, segment| node.get(segment))
    }

    /// String form of a scalar at `key`; `None` for missing, null or
    /// structured values.
    pub fn lookup_string(&self, key: &str) -> Option<String> {
        match self.lookup(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Deep-merges `overlay` into `base`; mappings merge key by key, anything
/// else in `overlay` replaces what is in `base`.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Parses a YAML document into a JSON value; an empty document is an empty
/// mapping.
pub fn parse_document(content: &str) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_yaml::from_str(content)?;
    Ok(match value {
        Value::Null => Value::Object(Default::default()),
        value => value,
    })
}

/// Walks upward from `start` looking for the settings document, falling back
/// to `~/.kiln`.
///
/// # Errors
/// * `Error::Config` if no settings document is found
pub fn find_root<P: AsRef<Path>>(start: P) -> Result<PathBuf> {
    let start = std::path::absolute(start.as_ref())?;
    for dir in start.ancestors().take(MAX_SEARCH_DEPTH) {
        if dir.join(CONFIG_FILE).is_file() {
            debug!("Found {} in {}", CONFIG_FILE, dir.display());
            return Ok(dir.to_path_buf());
        }
    }

    if let Some(home) = dirs::home_dir().map(|home| home.join(".kiln")) {
        if home.join(CONFIG_FILE).is_file() {
            debug!("Using fallback configuration in {}", home.display());
            return Ok(home);
        }
    }

    Err(Error::Config(format!(
        "No {} found above {} or in ~/.kiln",
        CONFIG_FILE,
        start.display()
    )))
}

/// Settings steering a run, taken from the `kiln:` section of the mapping
/// and overridable through `KILN_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding `kiln.yaml`; relative settings resolve against it
    pub root: PathBuf,
    pub source: PathBuf,
    pub target: PathBuf,
    pub secrets: PathBuf,
    pub delimiters: Delimiters,
    pub log_level: Option<String>,
}

/// Raw `kiln:` section of the settings document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsSection {
    source: Option<String>,
    target: Option<String>,
    secrets: Option<String>,
    delimiters: DelimiterSection,
    log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DelimiterSection {
    left: Option<String>,
    right: Option<String>,
}

impl Settings {
    /// Resolves settings from `mapping`, letting `env` override each value.
    ///
    /// # Errors
    /// * `Error::Config` if the `kiln:` section has the wrong shape
    pub fn resolve<F>(root: &Path, mapping: &ConfigMapping, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section: SettingsSection = match mapping.as_value().get("kiln") {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())
                .map_err(|e| Error::Config(format!("invalid kiln section: {}", e)))?,
            _ => SettingsSection::default(),
        };
        let setting = |var: &str, value: Option<String>| {
            env(var)
                .filter(|v| !v.is_empty())
                .or(value)
                .filter(|v| !v.is_empty())
        };
        let dir = |var: &str, value: Option<String>, default: &str| {
            root.join(setting(var, value).unwrap_or_else(|| default.to_string()))
        };
        let defaults = Delimiters::default();

        Ok(Self {
            root: root.to_path_buf(),
            source: dir("KILN_SOURCE", section.source, DEFAULT_SOURCE_DIR),
            target: dir("KILN_TARGET", section.target, DEFAULT_TARGET_DIR),
            secrets: dir("KILN_SECRETS", section.secrets, DEFAULT_SECRETS_DIR),
            delimiters: Delimiters {
                left: setting("KILN_DELIMITER_LEFT", section.delimiters.left)
                    .unwrap_or(defaults.left),
                right: setting("KILN_DELIMITER_RIGHT", section.delimiters.right)
                    .unwrap_or(defaults.right),
            },
            log_level: setting("KILN_LOG_LEVEL", section.log_level),
        })
    }

    /// Encrypted secrets document at the working root
    pub fn secrets_document(&self) -> PathBuf {
        self.root.join(SECRETS_FILE)
    }

    /// Taint marker at the working root
    pub fn taint_marker(&self) -> PathBuf {
        self.root.join(TAINT_MARKER)
    }
}

/// Reads `kiln.yaml` at `root` and merges the decrypted secrets document
/// over it. A secrets document that cannot be decrypted is logged and left
/// out, a malformed one is an error.
pub fn load_mapping(root: &Path, gateway: &dyn EncryptionGateway) -> Result<ConfigMapping> {
    let config_path = root.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    let mut document = parse_document(&content)
        .map_err(|e| Error::Config(format!("{}: {}", config_path.display(), e)))?;
    debug!("Read config file [{}]", config_path.display());

    let secrets_path = root.join(SECRETS_FILE);
    if !secrets_path.is_file() {
        debug!("No {} found, no secrets loaded", SECRETS_FILE);
        return Ok(ConfigMapping::new(document));
    }

    match gateway.decrypt(&secrets_path) {
        Ok(plaintext) => {
            let secrets = parse_document(&String::from_utf8_lossy(&plaintext))
                .map_err(|e| Error::Config(format!("could not load secrets: {}", e)))?;
            merge(&mut document, secrets);
            debug!("Loaded secrets from [{}]", secrets_path.display());
        }
        Err(e) => error!("Could not decrypt [{}]: {}", secrets_path.display(), e),
    }
    Ok(ConfigMapping::new(document))
}

/// Working root discovered from `$KILN_WORKING_DIR` or the current
/// directory.
pub fn discover_root() -> Result<PathBuf> {
    let start = match std::env::var("KILN_WORKING_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::current_dir()?,
    };
    find_root(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_flat_then_dotted() {
        let mapping = ConfigMapping::new(json!({
            "tls.key": "flat",
            "tls": {"key": "nested", "port": 443},
            "test": {"myconfig": "TEST"}
        }));
        assert_eq!(mapping.lookup_string("tls.key").as_deref(), Some("flat"));
        assert_eq!(mapping.lookup_string("test.myconfig").as_deref(), Some("TEST"));
        assert_eq!(mapping.lookup_string("tls.port").as_deref(), Some("443"));
        assert_eq!(mapping.lookup_string("tls"), None);
        assert_eq!(mapping.lookup_string("missing.key"), None);
    }

    #[test]
    fn test_merge() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "d": [1]});
        merge(&mut base, json!({"a": {"c": 3, "e": 4}, "d": [2]}));
        assert_eq!(base, json!({"a": {"b": 1, "c": 3, "e": 4}, "d": [2]}));
    }

    #[test]
    fn test_parse_document() {
        assert_eq!(parse_document("").unwrap(), json!({}));
        assert_eq!(parse_document("a:\n  b: x\n").unwrap(), json!({"a": {"b": "x"}}));
        assert!(parse_document("a: [unclosed").is_err());
    }

    #[test]
    fn test_settings_defaults_and_overrides() {
        let root = Path::new("/work");
        let mapping = ConfigMapping::new(json!({
            "kiln": {"target": "out", "delimiters": {"left": "<<"}, "log_level": "debug"}
        }));
        let settings = Settings::resolve(root, &mapping, |_| None).unwrap();
        assert_eq!(settings.source, PathBuf::from("/work/templates"));
        assert_eq!(settings.target, PathBuf::from("/work/out"));
        assert_eq!(settings.secrets, PathBuf::from("/work/rendered/secrets"));
        assert_eq!(settings.delimiters.left, "<<");
        assert_eq!(settings.delimiters.right, "}}}");
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
        assert_eq!(settings.taint_marker(), PathBuf::from("/work/.secrets-updated"));

        let settings = Settings::resolve(root, &mapping, |var| {
            (var == "KILN_TARGET").then(|| "/abs/target".to_string())
        })
        .unwrap();
        assert_eq!(settings.target, PathBuf::from("/abs/target"));
    }

    #[test]
    fn test_find_root_walks_upward() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "kiln: {}\n").unwrap();
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_root(&nested).unwrap(), temp.path());
    }
}
