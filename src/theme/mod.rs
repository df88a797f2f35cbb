//! Theme engine
//!
//! This module provides page rendering using Tera.
//! Features:
//! - Templates compiled into the binary from `templates/`
//! - On-disk overrides from the configured theme directory
//! - SEO head metadata shared by every page
//! - Fallback page when a template fails to render

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

mod error;
mod meta;

pub use error::ThemeError;
pub use meta::PageMeta;

/// Built-in templates
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Template used for 404 pages and render failures
pub const ERROR_TEMPLATE: &str = "error.html";

/// Theme engine for rendering pages
pub struct ThemeEngine {
    /// Tera template engine instance
    tera: Tera,
    /// Directory holding template overrides, if any
    override_path: Option<PathBuf>,
}

/// Output of [`ThemeEngine::render_with_fallback`]
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    /// The requested template failed and an error page was rendered instead
    pub fallback: bool,
}

impl ThemeEngine {
    /// Create a theme engine from the embedded templates only
    pub fn embedded() -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            override_path: None,
        };
        engine.reload()?;
        Ok(engine)
    }

    /// Create a theme engine whose templates can be overridden from `override_path`
    ///
    /// A missing directory is not an error; the embedded templates are used.
    pub fn new(override_path: &Path) -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            override_path: Some(override_path.to_path_buf()),
        };
        engine.reload()?;
        Ok(engine)
    }

    /// Rebuild the template set from the embedded files and the override directory
    pub fn reload(&mut self) -> Result<()> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in EmbeddedTemplates::iter() {
            if let Some(file) = EmbeddedTemplates::get(&name) {
                let content = String::from_utf8(file.data.into_owned()).map_err(|_| {
                    ThemeError::TemplateError(format!("Template {} is not valid UTF-8", name))
                })?;
                templates.insert(name.to_string(), content);
            }
        }

        if let Some(ref path) = self.override_path {
            let mut overrides = Vec::new();
            collect_templates_from_dir(path, path, &mut overrides)?;
            if !overrides.is_empty() {
                tracing::info!(
                    "Loaded {} template override(s) from {:?}",
                    overrides.len(),
                    path
                );
            }
            templates.extend(overrides);
        }

        // Added in one batch so `extends` and `import` resolve regardless of order
        let count = templates.len();
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())
            .map_err(|e| {
                let mut error_msg = format!("Failed to load templates: {}", e);
                let mut source = e.source();
                while let Some(s) = source {
                    error_msg.push_str(&format!("\n  Caused by: {}", s));
                    source = s.source();
                }
                ThemeError::TemplateError(error_msg)
            })?;

        tracing::debug!("Theme engine ready with {} templates", count);
        self.tera = tera;
        Ok(())
    }

    /// Whether a template with this name is loaded
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render a template, falling back to an error page if it fails
    ///
    /// The theme's `error.html` is tried first; if that also fails a
    /// minimal built-in page is returned. Never fails.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> RenderedPage {
        match self.render(template, context) {
            Ok(html) => RenderedPage {
                html,
                fallback: false,
            },
            Err(e) => {
                tracing::error!("{}", e);

                let mut error_context = context.clone();
                error_context.insert("status", &500);
                error_context.insert("error_title", "Something went wrong");
                error_context.insert(
                    "error_message",
                    "The page could not be rendered. Please try again later.",
                );

                let html = match self.render(ERROR_TEMPLATE, &error_context) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::warn!(
                            "Failed to render error template: {}, returning simple HTML error page",
                            error_template_err
                        );
                        simple_error_page()
                    }
                };
                RenderedPage {
                    html,
                    fallback: true,
                }
            }
        }
    }
}

/// Collect `.html` templates below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    if !current_path.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(current_path).map_err(ThemeError::IoError)? {
        let entry = entry.map_err(ThemeError::IoError)?;
        let path = entry.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path.strip_prefix(base_path).map_err(|_| {
                ThemeError::TemplateError("Failed to get relative path".to_string())
            })?;

            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;

            templates.push((template_name, content));
        }
    }

    Ok(())
}

/// Last-resort page used when even the error template fails
pub fn simple_error_page() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="robots" content="noindex">
    <title>Error</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 50px auto; padding: 20px; }
        h1 { color: #e74c3c; }
    </style>
</head>
<body>
    <h1>Something went wrong</h1>
    <p>The page could not be rendered. Please try again later.</p>
</body>
</html>"#
        .to_string()
}

#[cfg(test)]
mod tests;
