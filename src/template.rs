//! Command template rendering.
//!
//! A template is an argv whose elements may contain `{key}` placeholders.
//! Each placeholder is resolved through [`ProjectConfig::get`], so unknown or
//! not-yet-assigned keys fail instead of rendering as empty strings. `{{` and
//! `}}` produce literal braces.

use crate::error::{Error, Result};
use crate::project::ProjectConfig;

/// Render every element of `template` against `config`.
pub fn render(template: &[String], config: &ProjectConfig) -> Result<Vec<String>> {
    template
        .iter()
        .map(|arg| render_arg(arg, |key| config.get(key)))
        .collect()
}

fn render_arg(arg: &str, lookup: impl Fn(&str) -> Result<String>) -> Result<String> {
    let mut out = String::with_capacity(arg.len());
    let mut chars = arg.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => key.push(k),
                        None => {
                            return Err(Error::UnknownKey(format!("{{{key}")));
                        }
                    }
                }
                out.push_str(&lookup(key.trim())?);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
