//! SEO analyzer
//!
//! Scores an article for on-page SEO. Pure and synchronous: the same input
//! always yields the same report, and no input makes it fail. Blank or
//! malformed fields simply earn low scores.
//!
//! Text statistics come from the Markdown event stream, so code blocks do
//! not count as words and image alt text is read from the image itself.
//!
//! ```
//! use inkpress::services::seo::{analyze, Grade, SeoInput};
//!
//! let report = analyze(&SeoInput {
//!     title: "Getting started with Rust web services".into(),
//!     content: "# Rust\n\nRust is fast.".into(),
//!     slug: "rust-web-services".into(),
//!     tags: vec!["rust".into()],
//!     ..Default::default()
//! });
//! assert!(report.score <= 100);
//! assert_eq!(report.stats.keyword.as_deref(), Some("rust"));
//! assert_eq!(report.grade, Grade::from_score(report.score));
//! ```

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::slug::slugify;
use crate::models::{Article, Tag as ArticleTag};

pub const TITLE_WEIGHT: u32 = 15;
pub const DESCRIPTION_WEIGHT: u32 = 15;
pub const CONTENT_WEIGHT: u32 = 20;
pub const HEADINGS_WEIGHT: u32 = 10;
pub const KEYWORD_WEIGHT: u32 = 20;
pub const SLUG_WEIGHT: u32 = 10;
pub const TAGS_WEIGHT: u32 = 5;
pub const IMAGES_WEIGHT: u32 = 5;

const WORDS_PER_MINUTE: usize = 200;
const MAX_SLUG_CHARS: usize = 75;

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("slug pattern is valid"));

/// Everything the analyzer looks at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoInput {
    #[serde(default)]
    pub title: String,
    /// Meta description
    #[serde(default)]
    pub description: String,
    /// Markdown body
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub focus_keyword: Option<String>,
}

impl SeoInput {
    /// Build the analyzer input for a stored article.
    ///
    /// Uses the SEO title and description when set, falling back to the
    /// article title and excerpt the same way the page head does.
    pub fn from_article(article: &Article, tags: &[ArticleTag]) -> Self {
        Self {
            title: article.display_title().to_string(),
            description: article.display_description().unwrap_or_default().to_string(),
            content: article.content.clone(),
            slug: article.slug.clone(),
            tags: tags.iter().map(|t| t.name.clone()).collect(),
            focus_keyword: article.seo.focus_keyword.clone(),
        }
    }

    /// The keyword under analysis: the focus keyword when set, otherwise
    /// the first non-blank tag
    pub fn keyword(&self) -> Option<&str> {
        self.focus_keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| self.tags.iter().map(|t| t.trim()).find(|t| !t.is_empty()))
    }
}

/// Overall rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Good,
    NeedsImprovement,
    Poor,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Grade::Good,
            50..=79 => Grade::NeedsImprovement,
            _ => Grade::Poor,
        }
    }
}

/// Result of one weighted check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeoCheck {
    pub name: &'static str,
    pub weight: u32,
    /// 0..=100
    pub score: u8,
    pub passed: bool,
    pub message: String,
}

/// Content statistics gathered during analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeoStats {
    pub word_count: usize,
    pub heading_count: usize,
    pub image_count: usize,
    pub images_missing_alt: usize,
    pub link_count: usize,
    pub keyword: Option<String>,
    pub keyword_occurrences: usize,
    /// Percentage of content words taken by the keyword
    pub keyword_density: f64,
    pub reading_time_minutes: usize,
}

/// Full analysis result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeoReport {
    /// Weighted total, 0..=100
    pub score: u8,
    pub grade: Grade,
    pub checks: Vec<SeoCheck>,
    /// One actionable hint per failing check, in check order
    pub suggestions: Vec<String>,
    pub stats: SeoStats,
}

impl SeoReport {
    pub fn check(&self, name: &str) -> Option<&SeoCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Analyze `input` and produce a scored report
pub fn analyze(input: &SeoInput) -> SeoReport {
    let content = ContentStats::collect(&input.content);
    let keyword = input.keyword().map(KeywordMatch::new).filter(|k| !k.tokens.is_empty());

    let occurrences = keyword
        .as_ref()
        .map_or(0, |k| count_phrase(&content.words, &k.tokens));
    let density = match &keyword {
        Some(k) if !content.words.is_empty() => {
            (occurrences * k.tokens.len()) as f64 / content.words.len() as f64 * 100.0
        }
        _ => 0.0,
    };

    let outcomes = [
        ("title", TITLE_WEIGHT, check_title(&input.title)),
        ("description", DESCRIPTION_WEIGHT, check_description(&input.description)),
        ("content", CONTENT_WEIGHT, check_content(content.words.len())),
        ("headings", HEADINGS_WEIGHT, check_headings(content.heading_count)),
        (
            "keyword",
            KEYWORD_WEIGHT,
            check_keyword(keyword.as_ref(), input, &content, density),
        ),
        ("slug", SLUG_WEIGHT, check_slug(&input.slug)),
        ("tags", TAGS_WEIGHT, check_tags(&input.tags)),
        (
            "images",
            IMAGES_WEIGHT,
            check_images(content.image_count, content.images_missing_alt),
        ),
    ];

    let weighted: u32 = outcomes
        .iter()
        .map(|(_, weight, outcome)| weight * u32::from(outcome.score))
        .sum();
    let score = ((weighted + 50) / 100).min(100) as u8;

    let mut checks = Vec::with_capacity(outcomes.len());
    let mut suggestions = Vec::new();
    for (name, weight, outcome) in outcomes {
        let passed = outcome.score == 100;
        if !passed {
            suggestions.push(outcome.suggestion);
        }
        checks.push(SeoCheck {
            name,
            weight,
            score: outcome.score,
            passed,
            message: outcome.message,
        });
    }

    let word_count = content.words.len();
    SeoReport {
        score,
        grade: Grade::from_score(score),
        checks,
        suggestions,
        stats: SeoStats {
            word_count,
            heading_count: content.heading_count,
            image_count: content.image_count,
            images_missing_alt: content.images_missing_alt,
            link_count: content.link_count,
            keyword: keyword.map(|k| k.phrase),
            keyword_occurrences: occurrences,
            keyword_density: (density * 100.0).round() / 100.0,
            reading_time_minutes: word_count.div_ceil(WORDS_PER_MINUTE),
        },
    }
}

struct Outcome {
    score: u8,
    message: String,
    suggestion: String,
}

impl Outcome {
    fn new(score: u8, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            score,
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}

fn check_title(title: &str) -> Outcome {
    let len = title.trim().chars().count();
    let score = match len {
        0 => 0,
        30..=60 => 100,
        10..=29 | 61..=70 => 60,
        _ => 20,
    };
    let message = if len == 0 {
        "Title is empty".to_string()
    } else {
        format!("Title is {} characters long", len)
    };
    Outcome::new(score, message, "Write a title between 30 and 60 characters")
}

fn check_description(description: &str) -> Outcome {
    let len = description.trim().chars().count();
    let score = match len {
        0 => 0,
        120..=160 => 100,
        50..=119 | 161..=200 => 60,
        _ => 30,
    };
    let message = if len == 0 {
        "Meta description is empty".to_string()
    } else {
        format!("Meta description is {} characters long", len)
    };
    Outcome::new(
        score,
        message,
        "Write a meta description between 120 and 160 characters",
    )
}

fn check_content(words: usize) -> Outcome {
    let score = match words {
        600.. => 100,
        300..=599 => 70,
        100..=299 => 40,
        1..=99 => 10,
        _ => 0,
    };
    Outcome::new(
        score,
        format!("Content has {} words", words),
        "Expand the content to at least 600 words",
    )
}

fn check_headings(headings: usize) -> Outcome {
    let score = match headings {
        0 => 0,
        1 => 60,
        _ => 100,
    };
    Outcome::new(
        score,
        format!("Content has {} headings", headings),
        "Structure the content with at least two headings",
    )
}

fn check_keyword(
    keyword: Option<&KeywordMatch>,
    input: &SeoInput,
    content: &ContentStats,
    density: f64,
) -> Outcome {
    let Some(keyword) = keyword else {
        return Outcome::new(
            0,
            "No focus keyword or tags to analyze",
            "Set a focus keyword for the article",
        );
    };

    let parts: [(&str, u8, bool); 5] = [
        ("title", 35, contains_phrase(&tokenize(&input.title), &keyword.tokens)),
        (
            "meta description",
            20,
            contains_phrase(&tokenize(&input.description), &keyword.tokens),
        ),
        ("slug", 15, slug_contains(&input.slug, &keyword.slug)),
        (
            "first paragraph",
            15,
            contains_phrase(&content.first_paragraph, &keyword.tokens),
        ),
        ("density", 15, (0.5..=2.5).contains(&density)),
    ];

    let score = parts
        .iter()
        .filter(|(_, _, hit)| *hit)
        .map(|(_, points, _)| points)
        .sum();
    let missing: Vec<&str> = parts
        .iter()
        .filter(|(_, _, hit)| !hit)
        .map(|(name, _, _)| *name)
        .collect();

    let message = if missing.is_empty() {
        format!(
            "Keyword \"{}\" is well placed (density {:.1}%)",
            keyword.phrase, density
        )
    } else {
        format!(
            "Keyword \"{}\" falls short on: {} (density {:.1}%)",
            keyword.phrase,
            missing.join(", "),
            density
        )
    };

    Outcome::new(
        score,
        message,
        format!(
            "Use \"{}\" in the title, meta description, slug and first paragraph, at 0.5-2.5% density",
            keyword.phrase
        ),
    )
}

fn check_slug(slug: &str) -> Outcome {
    let len = slug.chars().count();
    let well_formed = SLUG_PATTERN.is_match(slug);
    let score = match (len, well_formed) {
        (0, _) => 0,
        (_, true) if len <= MAX_SLUG_CHARS => 100,
        (_, true) => 60,
        (_, false) => 20,
    };
    let message = match score {
        0 => "Slug is empty".to_string(),
        100 => "Slug is short and readable".to_string(),
        60 => format!("Slug is {} characters long", len),
        _ => "Slug contains characters other than a-z, 0-9 and single hyphens".to_string(),
    };
    Outcome::new(
        score,
        message,
        "Use a short lowercase slug of words joined by hyphens",
    )
}

fn check_tags(tags: &[String]) -> Outcome {
    let count = tags.iter().filter(|t| !t.trim().is_empty()).count();
    let score = match count {
        0 => 0,
        2..=8 => 100,
        _ => 60,
    };
    Outcome::new(
        score,
        format!("Article has {} tags", count),
        "Add between 2 and 8 relevant tags",
    )
}

fn check_images(images: usize, missing_alt: usize) -> Outcome {
    let (score, message) = match (images, missing_alt) {
        (0, _) => (50, "Content has no images".to_string()),
        (_, 0) => (100, format!("All {} images have alt text", images)),
        _ => (40, format!("{} of {} images lack alt text", missing_alt, images)),
    };
    Outcome::new(score, message, "Include images and give each one alt text")
}

/// Statistics read from the Markdown event stream
#[derive(Debug, Default)]
struct ContentStats {
    /// Lowercased word tokens outside code blocks and image alt text
    words: Vec<String>,
    first_paragraph: Vec<String>,
    heading_count: usize,
    image_count: usize,
    images_missing_alt: usize,
    link_count: usize,
}

impl ContentStats {
    fn collect(markdown: &str) -> Self {
        let mut stats = Self::default();
        let mut code_depth = 0usize;
        let mut alt: Option<String> = None;
        let mut paragraph: Option<String> = None;
        let mut first_paragraph_done = false;

        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        for event in Parser::new_ext(markdown, options) {
            match event {
                Event::Start(Tag::CodeBlock(_)) => code_depth += 1,
                Event::End(TagEnd::CodeBlock) => code_depth = code_depth.saturating_sub(1),
                Event::Start(Tag::Heading { .. }) => stats.heading_count += 1,
                Event::Start(Tag::Link { .. }) => stats.link_count += 1,
                Event::Start(Tag::Image { .. }) => {
                    stats.image_count += 1;
                    alt = Some(String::new());
                }
                Event::End(TagEnd::Image) => {
                    if alt.take().map_or(true, |a| a.trim().is_empty()) {
                        stats.images_missing_alt += 1;
                    }
                }
                Event::Start(Tag::Paragraph) if !first_paragraph_done => {
                    paragraph = Some(String::new());
                }
                Event::End(TagEnd::Paragraph) => {
                    if let Some(text) = paragraph.take() {
                        stats.first_paragraph = tokenize(&text);
                        first_paragraph_done = !stats.first_paragraph.is_empty();
                    }
                }
                Event::Text(text) | Event::Code(text) if code_depth == 0 => {
                    if let Some(alt) = alt.as_mut() {
                        alt.push_str(&text);
                        continue;
                    }
                    if let Some(paragraph) = paragraph.as_mut() {
                        paragraph.push(' ');
                        paragraph.push_str(&text);
                    }
                    stats.words.extend(tokenize(&text));
                }
                _ => {}
            }
        }

        stats
    }
}

/// Keyword prepared for matching
struct KeywordMatch {
    phrase: String,
    tokens: Vec<String>,
    slug: String,
}

impl KeywordMatch {
    fn new(phrase: &str) -> Self {
        Self {
            phrase: phrase.to_string(),
            tokens: tokenize(phrase),
            slug: slugify(phrase),
        }
    }
}

/// Lowercased alphanumeric word tokens
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Non-overlapping occurrences of `phrase` as consecutive whole words
fn count_phrase(words: &[String], phrase: &[String]) -> usize {
    if phrase.is_empty() || words.len() < phrase.len() {
        return 0;
    }
    let mut count = 0;
    let mut i = 0;
    while i + phrase.len() <= words.len() {
        if words[i..i + phrase.len()] == *phrase {
            count += 1;
            i += phrase.len();
        } else {
            i += 1;
        }
    }
    count
}

fn contains_phrase(words: &[String], phrase: &[String]) -> bool {
    count_phrase(words, phrase) > 0
}

fn slug_contains(slug: &str, keyword_slug: &str) -> bool {
    !keyword_slug.is_empty()
        && format!("-{}-", slug.to_lowercase()).contains(&format!("-{}-", keyword_slug))
}
