//! Key paths into the encrypted secrets document, derived from file names.
//!
//! By convention a harvested file named `tls.key` is stored at `tls: key:`.

use std::fmt;

/// Ordered path segments addressing a value inside the secrets document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKeyPath {
    segments: Vec<String>,
}

impl SecretKeyPath {
    /// Splits a file's base name on `.` into path segments.
    pub fn from_file_name(name: &str) -> Self {
        Self {
            segments: name.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Bracketed form understood by `sops --set`, e.g. `["tls"]["key"]`.
    pub fn bracketed(&self) -> String {
        self.segments
            .iter()
            .map(|segment| format!("[\"{}\"]", segment.replace('"', "\\\"")))
            .collect()
    }
}

impl fmt::Display for SecretKeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Turns file content into a single-line, double-quoted JSON string literal.
///
/// Carriage returns are dropped, then backslashes, quotes, newlines and other
/// control characters are escaped. The escaped body has no raw newlines left,
/// so trimming outer newlines never alters the stored value.
pub fn normalize_content(content: &str) -> String {
    let stripped = content.replace('\r', "");
    let escaped = serde_json::Value::String(stripped).to_string();
    escaped.trim_matches('\n').to_string()
}

/// Full `sops --set` expression storing `content` at `path`.
pub fn set_expression(path: &SecretKeyPath, content: &str) -> String {
    format!("{} {}", path.bracketed(), normalize_content(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_name() {
        let path = SecretKeyPath::from_file_name("tls.key");
        assert_eq!(path.segments(), ["tls", "key"]);
        assert_eq!(path.bracketed(), r#"["tls"]["key"]"#);
        assert_eq!(path.to_string(), "tls.key");

        let single = SecretKeyPath::from_file_name("kubeconfig");
        assert_eq!(single.bracketed(), r#"["kubeconfig"]"#);
    }

    #[test]
    fn test_normalize_content() {
        assert_eq!(normalize_content("a\r\nb\n"), r#""a\nb\n""#);
        assert_eq!(normalize_content(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(normalize_content(r"c:\temp"), r#""c:\\temp""#);
    }

    #[test]
    fn test_normalized_content_decodes_to_original() {
        let content = "line one\r\nline \"two\"\n\ttabbed\n";
        let decoded: String = serde_json::from_str(&normalize_content(content)).unwrap();
        assert_eq!(decoded, content.replace('\r', ""));
    }

    #[test]
    fn test_set_expression() {
        let path = SecretKeyPath::from_file_name("test.myconfig");
        assert_eq!(
            set_expression(&path, "user: x\n"),
            r#"["test"]["myconfig"] "user: x\n""#
        );
    }
}
