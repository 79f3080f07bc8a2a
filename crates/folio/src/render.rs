use crate::components::ComponentProcessor;
use crate::config::BuildConfig;
use crate::error::{IoContext, Result};
use crate::parsing::{MarkdownRenderer, escape_html, parse_document};
use crate::routes::output_path;
use crate::theme::{Props, ThemeCapabilities};
use crate::types::{PageType, ParsedDocument, RouteEntry};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

const DOCTYPE: &str = "<!DOCTYPE html>";

/// Everything a route render reads. Shared read-only across routes.
pub struct RenderContext<'a> {
    pub config: &'a BuildConfig,
    pub theme: &'a ThemeCapabilities,
    pub markdown: &'a MarkdownRenderer,
    pub out_dir: &'a Path,
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub destination: PathBuf,
}

/// Renders a route to HTML without writing it.
pub fn render_page(context: &RenderContext<'_>, route: &RouteEntry) -> Result<RenderedPage> {
    let source = fs::read_to_string(&route.file_path).io_context("reading", &route.file_path)?;
    let document = parse_document(&source);

    let page_title = document
        .meta
        .title
        .clone()
        .unwrap_or_else(|| filename_title(&route.relative));
    let title = document_title(route.page_type, &page_title, &context.config.site_title);
    let props = build_props(context, route, &document, &page_title, &title)?;

    let processor = ComponentProcessor::new(&context.theme.components, context.markdown);
    let body = context.markdown.render(&processor.process(&document.body)?);

    let page = context.theme.page(route.page_type).render(&props, &body)?;
    let layout = context.theme.layout.render(&props, &page)?;
    let composed = context.theme.document.render(&props, &layout)?;

    let description = props
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or(&context.config.description);

    Ok(RenderedPage {
        html: serialize_document(&composed, &title, description, &context.config.base_url),
        destination: output_path(context.out_dir, &route.relative),
    })
}

/// Renders a route and writes it, creating parent directories as needed.
pub fn write_page(context: &RenderContext<'_>, route: &RouteEntry) -> Result<PathBuf> {
    let page = render_page(context, route)?;

    if let Some(parent) = page.destination.parent() {
        fs::create_dir_all(parent).io_context("creating", parent)?;
    }
    fs::write(&page.destination, &page.html).io_context("writing", &page.destination)?;

    Ok(page.destination)
}

pub fn document_title(page_type: PageType, page_title: &str, site_title: &str) -> String {
    match page_type {
        PageType::Home => site_title.to_string(),
        PageType::Article => format!("{} | {}", page_title, site_title),
        _ => page_title.to_string(),
    }
}

fn filename_title(relative: &Path) -> String {
    relative
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn build_props(
    context: &RenderContext<'_>,
    route: &RouteEntry,
    document: &ParsedDocument,
    page_title: &str,
    title: &str,
) -> Result<Props> {
    let description = document
        .meta
        .description
        .clone()
        .unwrap_or_else(|| context.config.description.clone());

    let mut props = Props::new();
    props.insert("config".to_string(), serde_json::to_value(context.config)?);
    props.insert(
        "route".to_string(),
        json!({
            "path": route.relative.to_string_lossy().replace('\\', "/"),
            "page_type": route.page_type.as_str(),
        }),
    );
    props.insert("page_type".to_string(), Value::from(route.page_type.as_str()));
    props.insert("title".to_string(), Value::from(title));
    props.insert("page_title".to_string(), Value::from(page_title));
    props.insert("description".to_string(), Value::from(description));

    if route.page_type == PageType::Article {
        let mut meta = document.meta.clone();
        if meta.date.is_none() {
            meta.date = Some(modified_date(&route.file_path)?);
        }
        props.insert("meta".to_string(), serde_json::to_value(meta)?);
    }

    Ok(props)
}

fn modified_date(path: &Path) -> Result<String> {
    let modified = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .io_context("reading modification time of", path)?;
    Ok(DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Prefixes the doctype, wrapping bare fragments in a standard document shell.
///
/// A doctype already emitted by the theme is dropped so the output carries exactly one.
pub fn serialize_document(composed: &str, title: &str, description: &str, base_url: &str) -> String {
    let content = strip_doctype(composed);
    let is_document = content
        .get(..5)
        .is_some_and(|start| start.eq_ignore_ascii_case("<html"));

    if is_document {
        return format!("{DOCTYPE}\n{}", content);
    }

    format!(
        r#"{DOCTYPE}
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <meta name="description" content="{}">
  <base href="{}">
  <title>{}</title>
</head>
<body>
{}
</body>
</html>
"#,
        escape_html(description),
        escape_html(base_url),
        escape_html(title),
        content
    )
}

fn strip_doctype(html: &str) -> &str {
    let trimmed = html.trim_start();
    let has_doctype = trimmed
        .get(..9)
        .is_some_and(|start| start.eq_ignore_ascii_case("<!doctype"));

    match trimmed.find('>') {
        Some(end) if has_doctype => trimmed[end + 1..].trim_start(),
        _ => trimmed,
    }
}
