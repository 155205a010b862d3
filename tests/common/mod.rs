#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use kiln::error::{Error, Result};
use kiln::gateway::EncryptionGateway;
use serde_json::{Map, Value};

/// In-memory stand-in for sops.
///
/// "Encryption" wraps content in `ENC[...]`. Sets are applied to an
/// in-memory document and recorded so tests can count them.
#[derive(Default)]
pub struct FakeGateway {
    pub document: RefCell<Value>,
    pub sets: RefCell<Vec<String>>,
    pub encrypted: RefCell<Vec<String>>,
    fail_on: Option<String>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call whose path or expression contains `needle` fails.
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        }
    }

    pub fn wrap(content: &[u8]) -> Vec<u8> {
        let mut out = b"ENC[".to_vec();
        out.extend_from_slice(content);
        out.push(b']');
        out
    }

    fn check(&self, subject: &str) -> Result<()> {
        match &self.fail_on {
            Some(needle) if subject.contains(needle.as_str()) => Err(Error::Gateway {
                command: format!("fake {}", subject),
                output: "injected failure".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Splits `["a"]["b"] <json>` into its key segments and value.
pub fn parse_expression(expression: &str) -> (Vec<String>, Value) {
    let mut rest = expression;
    let mut segments = Vec::new();
    while let Some(stripped) = rest.strip_prefix("[\"") {
        let end = stripped.find("\"]").unwrap();
        segments.push(stripped[..end].to_string());
        rest = &stripped[end + 2..];
    }
    (segments, serde_json::from_str(rest.trim_start()).unwrap())
}

impl EncryptionGateway for FakeGateway {
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>> {
        self.check(&path.to_string_lossy())?;
        let content = fs::read(path)?;
        match content.strip_prefix(b"ENC[").and_then(|c| c.strip_suffix(b"]")) {
            Some(plain) => Ok(plain.to_vec()),
            None => Err(Error::Gateway {
                command: format!("fake -d {}", path.display()),
                output: "not encrypted".to_string(),
            }),
        }
    }

    fn encrypt(&self, path: &Path, _binary: bool) -> Result<Vec<u8>> {
        self.check(&path.to_string_lossy())?;
        self.encrypted
            .borrow_mut()
            .push(path.to_string_lossy().into_owned());
        Ok(Self::wrap(&fs::read(path)?))
    }

    fn set_at_path(&self, _document: &Path, expression: &str) -> Result<()> {
        self.check(expression)?;
        let (segments, value) = parse_expression(expression);
        let mut document = self.document.borrow_mut();
        let mut node = &mut *document;
        for segment in segments {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = node
                .as_object_mut()
                .unwrap()
                .entry(segment)
                .or_insert(Value::Null);
        }
        *node = value;
        self.sets.borrow_mut().push(expression.to_string());
        Ok(())
    }
}

/// Writes `content` to `root/relative`, creating parents.
pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
