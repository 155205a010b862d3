//! Template rendering for kiln.
//! Wraps MiniJinja with kiln's delimiters, strict undefined handling and
//! custom function set.
use crate::error::{Error, Result};
use crate::functions;
use minijinja::syntax::SyntaxConfig;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};

/// Left/right template delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            left: crate::constants::DEFAULT_DELIMITER_LEFT.to_string(),
            right: crate::constants::DEFAULT_DELIMITER_RIGHT.to_string(),
        }
    }
}

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders a template string with the given context.
    ///
    /// # Arguments
    /// * `name` - Name reported in errors and exposed through `filepath()`
    /// * `template` - Template string to render
    /// * `context` - Context variables for rendering
    ///
    /// # Returns
    /// * `Result<String>` - Rendered template string
    fn render(&self, name: &str, template: &str, context: &serde_json::Value) -> Result<String>;
}

/// MiniJinja-based template rendering engine.
pub struct MiniJinjaRenderer {
    /// MiniJinja environment instance
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    /// Creates a renderer using `delimiters` for expressions. Statements and
    /// comments use the same pair with `%` and `#` inserted.
    ///
    /// # Errors
    /// * `Error::Config` if the delimiters cannot form a valid syntax
    pub fn new(delimiters: &Delimiters) -> Result<Self> {
        let Delimiters { left, right } = delimiters;
        let syntax = SyntaxConfig::builder()
            .block_delimiters(format!("{}%", left), format!("%{}", right))
            .variable_delimiters(left.clone(), right.clone())
            .comment_delimiters(format!("{}#", left), format!("#{}", right))
            .build()
            .map_err(|e| Error::Config(format!("invalid delimiters [{} {}]: {}", left, right, e)))?;

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        env.add_function("kiln_header", functions::kiln_header);
        env.add_function("filepath", functions::filepath);
        env.add_function("ip_of_cidr", functions::ip_of_cidr);
        env.add_function("mkpasswd", functions::mkpasswd);
        env.add_function("to_yaml", functions::to_yaml);
        env.add_filter("to_yaml", functions::to_yaml);
        env.add_function("semver_check", functions::semver_check);

        Ok(Self { env })
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        // the default pair is known to form a valid syntax
        match MiniJinjaRenderer::new(&Delimiters::default()) {
            Ok(renderer) => renderer,
            Err(e) => panic!("default delimiters rejected: {}", e),
        }
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    /// Renders a template string using MiniJinja.
    ///
    /// # Errors
    /// * `Error::Template` naming the template if parsing or rendering
    ///   fails, including any reference to a key missing from `context`
    fn render(&self, name: &str, template: &str, context: &serde_json::Value) -> Result<String> {
        let to_error = |source| Error::Template {
            name: name.to_string(),
            source,
        };
        let mut env = self.env.clone();
        env.add_template_owned(name.to_string(), template.to_string())
            .map_err(to_error)?;

        let tmpl = env.get_template(name).map_err(to_error)?;

        tmpl.render(context).map_err(to_error)
    }
}
