//! Placeholder rendering for agent and task text
//!
//! Task and agent text is written with single-brace placeholders
//! (`"Write an article on {topic}"`). This module converts them to Tera
//! syntax and renders them with consistent error handling.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use tera::{Context, Tera};

use crate::{Error, Result};

lazy_static! {
    // Either an existing Tera expression (kept as is) or a `{name}` placeholder.
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{[^}]*\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// Convert `{name}` placeholders to `{{ name }}`.
///
/// Text already in Tera syntax is left alone, as are braces that do not
/// wrap a bare identifier (JSON snippets, for example).
pub fn convert_placeholders(template: &str) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match caps.get(1) {
            Some(name) => format!("{{{{ {} }}}}", name.as_str()),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render `{name}` placeholders from the fields of `context`.
///
/// A non-object context is exposed to the template as `data`. Unknown
/// placeholders are an error rather than an empty string.
pub fn render_template(template: &str, context: &Value) -> Result<String> {
    let source = convert_placeholders(template);

    let tera_context = match context {
        Value::Object(_) => Context::from_value(context.clone())
            .map_err(|e| Error::Template(format!("invalid template context: {}", e)))?,
        other => {
            let mut ctx = Context::new();
            ctx.insert("data", other);
            ctx
        }
    };

    Tera::one_off(&source, &tera_context, false)
        .map_err(|e| Error::Template(format!("failed to render '{}': {}", template, e)))
}
