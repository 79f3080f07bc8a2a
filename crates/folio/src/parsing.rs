use crate::types::{Frontmatter, PageMeta, ParsedDocument};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde_json::Value;
use std::collections::BTreeMap;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

const YAML_DELIMITER: &str = "---";
const TOML_DELIMITER: &str = "+++";
const HIGHLIGHT_THEME: &str = "base16-ocean.dark";

pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    pub fn render(&self, content: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        let parser = Parser::new_ext(content, options);
        let mut html_output = String::new();
        let mut in_code_block = false;
        let mut code_block_lang: Option<String> = None;
        let mut code_block_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_block_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                            Some(lang.to_string())
                        }
                        _ => None,
                    };
                    code_block_content.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    html_output.push_str(&self.highlight(
                        code_block_lang.as_deref(),
                        &code_block_content,
                    ));
                    in_code_block = false;
                    code_block_lang = None;
                }
                Event::Text(text) if in_code_block => {
                    code_block_content.push_str(&text);
                }
                other => {
                    pulldown_cmark::html::push_html(&mut html_output, std::iter::once(other));
                }
            }
        }

        html_output
    }

    fn highlight(&self, lang: Option<&str>, code: &str) -> String {
        let Some(lang) = lang else {
            return format!("<pre><code>{}</code></pre>", escape_html(code));
        };

        let fallback = || {
            format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                escape_html(lang),
                escape_html(code)
            )
        };

        match (
            self.syntax_set.find_syntax_by_token(lang),
            self.theme_set.themes.get(HIGHLIGHT_THEME),
        ) {
            (Some(syntax), Some(theme)) => {
                highlighted_html_for_string(code, &self.syntax_set, syntax, theme)
                    .unwrap_or_else(|_| fallback())
            }
            _ => fallback(),
        }
    }
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Splits a leading `---` (YAML) or `+++` (TOML) block from the body.
///
/// Never fails: a missing, unterminated or unparsable block yields empty
/// front matter and the original text as body.
pub fn extract_frontmatter(content: &str) -> (Frontmatter, String) {
    let content = content.trim_start_matches('\u{feff}');
    let normalized = content.replace("\r\n", "\n");
    let trimmed = normalized.trim_start();

    let first_line = trimmed.lines().next().unwrap_or("").trim_end();
    let parsed = match first_line {
        YAML_DELIMITER => split_block(trimmed, YAML_DELIMITER)
            .and_then(|(block, body)| Some((parse_yaml_block(block)?, body))),
        TOML_DELIMITER => split_block(trimmed, TOML_DELIMITER)
            .and_then(|(block, body)| Some((parse_toml_block(block)?, body))),
        _ => None,
    };

    match parsed {
        Some((raw, body)) => (Frontmatter { raw }, body.trim().to_string()),
        None => (Frontmatter::default(), content.to_string()),
    }
}

pub fn parse_document(content: &str) -> ParsedDocument {
    let (frontmatter, body) = extract_frontmatter(content);
    let meta = PageMeta::from(&frontmatter);
    ParsedDocument {
        frontmatter,
        meta,
        body,
    }
}

fn split_block<'a>(content: &'a str, delimiter: &str) -> Option<(&'a str, &'a str)> {
    let opening_end = content.find('\n')?;
    let rest = &content[opening_end + 1..];
    let end_index = find_closing_delimiter(rest, delimiter)?;

    let block = &rest[..end_index];
    let after = &rest[end_index..];
    let body = after.find('\n').map(|newline| &after[newline + 1..]).unwrap_or("");

    Some((block, body))
}

fn find_closing_delimiter(content: &str, delimiter: &str) -> Option<usize> {
    let mut position = 0;

    for line in content.lines() {
        if line.trim() == delimiter {
            return Some(position);
        }
        position += line.len() + 1;
    }

    None
}

fn parse_yaml_block(block: &str) -> Option<BTreeMap<String, Value>> {
    if block.trim().is_empty() {
        return Some(BTreeMap::new());
    }

    match serde_yaml::from_str::<BTreeMap<String, Value>>(block) {
        Ok(raw) => Some(raw),
        Err(error) => {
            log::debug!(target: "pages", "ignoring malformed YAML front matter: {error}");
            None
        }
    }
}

fn parse_toml_block(block: &str) -> Option<BTreeMap<String, Value>> {
    match toml::from_str::<toml::Table>(block) {
        Ok(table) => Some(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
        Err(error) => {
            log::debug!(target: "pages", "ignoring malformed TOML front matter: {error}");
            None
        }
    }
}

/// TOML datetimes become their string form so `date` stays a string field.
pub(crate) fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markdown() {
        let input = "# Hello\n\nThis is **bold**.";
        let output = MarkdownRenderer::new().render(input);
        assert!(output.contains("<h1>"));
        assert!(output.contains("Hello"));
        assert!(output.contains("<strong>bold</strong>"));
    }

    #[test]
    fn test_parse_markdown_with_code() {
        let input = "```rust\nfn main() {}\n```";
        let output = MarkdownRenderer::new().render(input);
        assert!(output.contains("fn"));
        assert!(output.contains("main"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_unknown_code_language_escaped() {
        let input = "```nosuchlang\n<b>\n```";
        let output = MarkdownRenderer::new().render(input);
        assert!(output.contains("language-nosuchlang"));
        assert!(output.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let (fm, body) = extract_frontmatter("---\ntitle: \"Hello\"\n---\nWorld");
        assert_eq!(fm.get_string("title"), Some("Hello".to_string()));
        assert_eq!(body, "World");
    }

    #[test]
    fn test_yaml_frontmatter_with_dashes_in_content() {
        let content = "---\ntitle: Test\n---\n\nContent with --- dashes";
        let (fm, body) = extract_frontmatter(content);
        assert_eq!(fm.get_string("title"), Some("Test".to_string()));
        assert!(body.contains("---"));
        assert!(!body.contains("title"));
    }

    #[test]
    fn test_toml_frontmatter() {
        let content = "+++\ntitle = \"Test\"\ndate = 2024-01-15\n+++\n\nBody content";
        let (fm, body) = extract_frontmatter(content);
        assert_eq!(fm.get_string("title"), Some("Test".to_string()));
        assert_eq!(fm.get_string("date"), Some("2024-01-15".to_string()));
        assert_eq!(body, "Body content");
    }

    #[test]
    fn test_crlf_line_endings() {
        let (fm, body) = extract_frontmatter("---\r\ntitle: Windows\r\n---\r\nBody\r\n");
        assert_eq!(fm.get_string("title"), Some("Windows".to_string()));
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_byte_order_mark_before_frontmatter() {
        let (fm, body) = extract_frontmatter("\u{feff}---\ntitle: Hello\n---\nWorld");
        assert_eq!(fm.get_string("title"), Some("Hello".to_string()));
        assert_eq!(body, "World");

        let (fm, body) = extract_frontmatter("\u{feff}+++\r\ntitle = \"Hello\"\r\n+++\r\nWorld");
        assert_eq!(fm.get_string("title"), Some("Hello".to_string()));
        assert_eq!(body, "World");

        let (fm, body) = extract_frontmatter("\u{feff}# Heading");
        assert!(fm.is_empty());
        assert_eq!(body, "# Heading");
    }

    #[test]
    fn test_no_frontmatter() {
        let (fm, body) = extract_frontmatter("# Just a heading\n");
        assert!(fm.is_empty());
        assert_eq!(body, "# Just a heading\n");
    }

    #[test]
    fn test_unterminated_block_keeps_original_text() {
        let content = "---\ntitle: Oops\nno closing delimiter";
        let (fm, body) = extract_frontmatter(content);
        assert!(fm.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_malformed_yaml_keeps_original_text() {
        let content = "---\ntitle: [unclosed\n---\nBody";
        let (fm, body) = extract_frontmatter(content);
        assert!(fm.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_scalar_yaml_is_not_metadata() {
        let content = "---\njust a string\n---\nBody";
        let (fm, body) = extract_frontmatter(content);
        assert!(fm.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_empty_block() {
        let (fm, body) = extract_frontmatter("---\n---\nBody");
        assert!(fm.is_empty());
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_parse_document_typed_meta() {
        let doc = parse_document("---\ntitle: Post\ntags: [a, 1, b]\nlayout: wide\n---\nText");
        assert_eq!(doc.meta.title.as_deref(), Some("Post"));
        assert_eq!(
            doc.meta.tags,
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            doc.meta.extra.get("layout"),
            Some(&Value::String("wide".to_string()))
        );
        assert_eq!(doc.body, "Text");
    }
}
