//! Markdown rendering service
//!
//! Converts article Markdown to HTML with pulldown-cmark and highlights
//! fenced code blocks with syntect. Headings get stable `id` anchors so the
//! table of contents can link to them.
//!
//! # Example
//!
//! ```
//! use inkpress::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("# Hello World\n\nThis is **bold** text.");
//! assert!(html.contains("<h1 id=\"hello-world\">"));
//! assert!(html.contains("<strong>"));
//! ```

use once_cell::sync::Lazy;
use pulldown_cmark::{html, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use super::slug::slugify;

const DEFAULT_THEME: &str = "base16-ocean.dark";

// Loading the bundled definitions is slow; share one copy per process.
static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// Table of contents entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Heading level, 1..=6
    pub level: u8,
    /// Plain heading text
    pub text: String,
    /// Anchor id of the rendered heading
    pub id: String,
}

/// Markdown renderer with syntax highlighting.
///
/// Supports tables, strikethrough, task lists and smart punctuation in
/// addition to CommonMark.
#[derive(Clone)]
pub struct MarkdownRenderer {
    theme_name: String,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MarkdownRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkdownRenderer")
            .field("theme_name", &self.theme_name)
            .finish()
    }
}

impl MarkdownRenderer {
    /// Creates a renderer using the `base16-ocean.dark` highlighting theme.
    pub fn new() -> Self {
        Self::with_theme(DEFAULT_THEME)
    }

    /// Creates a renderer with a specific syntect theme.
    ///
    /// Unknown theme names fall back to the default theme.
    pub fn with_theme(theme_name: &str) -> Self {
        let theme_name = if THEME_SET.themes.contains_key(theme_name) {
            theme_name.to_string()
        } else {
            tracing::warn!("Unknown highlight theme {}, using {}", theme_name, DEFAULT_THEME);
            DEFAULT_THEME.to_string()
        };
        Self { theme_name }
    }

    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    /// Render Markdown to HTML
    pub fn render(&self, markdown: &str) -> String {
        self.render_with_toc(markdown).0
    }

    /// Render Markdown to HTML and collect the table of contents
    pub fn render_with_toc(&self, markdown: &str) -> (String, Vec<TocEntry>) {
        let parser = Parser::new_ext(markdown, parser_options());
        let (events, toc) = self.process_events(parser);

        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, events.into_iter());
        (html_output, toc)
    }

    /// Rewrites code blocks into highlighted HTML and headings into
    /// anchored HTML, passing every other event through.
    fn process_events<'a>(&self, parser: Parser<'a>) -> (Vec<Event<'a>>, Vec<TocEntry>) {
        let mut events = Vec::new();
        let mut toc = Vec::new();
        let mut anchors = AnchorSet::default();

        let mut code: Option<(Option<String>, String)> = None;
        let mut heading: Option<(HeadingLevel, Vec<Event<'a>>, String)> = None;

        for event in parser {
            if let Some((_, content)) = code.as_mut() {
                match event {
                    Event::Text(text) => content.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        if let Some((lang, content)) = code.take() {
                            let html = match lang {
                                Some(lang) => self.highlight_code(&content, &lang),
                                None => plain_code_block(&content),
                            };
                            events.push(Event::Html(html.into()));
                        }
                    }
                    _ => {}
                }
                continue;
            }

            if let Some((_, inner, text)) = heading.as_mut() {
                match event {
                    Event::End(TagEnd::Heading(_)) => {
                        if let Some((level, inner, text)) = heading.take() {
                            let level = level as u8;
                            let id = anchors.claim(&text);
                            events.push(Event::Html(
                                format!("<h{} id=\"{}\">", level, html_escape(&id)).into(),
                            ));
                            events.extend(inner);
                            events.push(Event::Html(format!("</h{}>\n", level).into()));
                            toc.push(TocEntry {
                                level,
                                text: text.trim().to_string(),
                                id,
                            });
                        }
                    }
                    other => {
                        if let Event::Text(t) | Event::Code(t) = &other {
                            text.push_str(t);
                        }
                        inner.push(other);
                    }
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .filter(|l| !l.is_empty())
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    code = Some((lang, String::new()));
                }
                Event::Start(Tag::Heading { level, .. }) => {
                    heading = Some((level, Vec::new(), String::new()));
                }
                other => events.push(other),
            }
        }

        (events, toc)
    }

    /// Highlight a code block, or render it plain if the language is unknown.
    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let syntax = SYNTAX_SET
            .find_syntax_by_token(lang)
            .or_else(|| SYNTAX_SET.find_syntax_by_extension(lang));

        match (syntax, THEME_SET.themes.get(&self.theme_name)) {
            (Some(syntax), Some(theme)) => {
                highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme)
                    .unwrap_or_else(|_| plain_code_block_with_lang(code, lang))
            }
            _ => plain_code_block_with_lang(code, lang),
        }
    }
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options
}

/// Hands out unique heading anchors, suffixing repeats with `-1`, `-2`, ...
#[derive(Default)]
struct AnchorSet {
    seen: HashMap<String, usize>,
}

impl AnchorSet {
    fn claim(&mut self, text: &str) -> String {
        let base = match slugify(text) {
            s if s.is_empty() => "section".to_string(),
            s => s,
        };
        let count = self.seen.entry(base.clone()).or_insert(0);
        let id = if *count == 0 {
            base
        } else {
            format!("{}-{}", base, count)
        };
        *count += 1;
        id
    }
}

/// Strip Markdown down to its plain text, skipping code blocks.
///
/// Used for excerpts and meta descriptions.
pub fn plain_text(markdown: &str) -> String {
    let mut text = String::new();
    let mut in_code_block = false;

    for event in Parser::new_ext(markdown, parser_options()) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Text(t) | Event::Code(t) if !in_code_block => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item) => {
                text.push(' ')
            }
            _ => {}
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of the plain text, cut at a word boundary
/// with a trailing ellipsis when shortened.
pub fn summarize(markdown: &str, max_chars: usize) -> String {
    let text = plain_text(markdown);
    if text.chars().count() <= max_chars {
        return text;
    }

    let cut: String = text.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(' ') {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end_matches(|c: char| c.is_ascii_punctuation()))
}

fn plain_code_block(code: &str) -> String {
    format!("<pre><code>{}</code></pre>\n", html_escape(code))
}

fn plain_code_block_with_lang(code: &str, lang: &str) -> String {
    format!(
        "<pre><code class=\"language-{}\">{}</code></pre>\n",
        html_escape(lang),
        html_escape(code)
    )
}

/// Escapes HTML special characters in a string.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
