use crate::error::{FolioError, IoContext, Result};
use crate::parsing::escape_html;
use crate::types::PageType;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tera::{Context, Tera};
use walkdir::WalkDir;

pub const BUILTIN_THEME_NAMES: [&str; 2] = ["default", "folio-theme-default"];
pub const THEME_MANIFEST: &str = "theme.toml";
pub const THEMES_DIR: &str = "themes";

const DEFAULT_DOCUMENT_TEMPLATE: &str = include_str!("../themes/default/document.html");
const DEFAULT_LAYOUT_TEMPLATE: &str = include_str!("../themes/default/layout.html");
const DEFAULT_HOME_TEMPLATE: &str = include_str!("../themes/default/pages/home.html");
const DEFAULT_POSTS_TEMPLATE: &str = include_str!("../themes/default/pages/posts.html");
const DEFAULT_TAGS_TEMPLATE: &str = include_str!("../themes/default/pages/tags.html");
const DEFAULT_ARTICLE_TEMPLATE: &str = include_str!("../themes/default/pages/article.html");
const DEFAULT_NOT_FOUND_TEMPLATE: &str = include_str!("../themes/default/pages/not_found.html");
const DEFAULT_NAV_PARTIAL: &str = include_str!("../themes/default/partials/nav.html");
const DEFAULT_NOTE_COMPONENT: &str = include_str!("../themes/default/components/note.html");
const DEFAULT_FIGURE_COMPONENT: &str = include_str!("../themes/default/components/figure.html");

const BUILTIN_DEFAULT: &[(&str, &str)] = &[
    ("document.html", DEFAULT_DOCUMENT_TEMPLATE),
    ("layout.html", DEFAULT_LAYOUT_TEMPLATE),
    ("pages/home.html", DEFAULT_HOME_TEMPLATE),
    ("pages/posts.html", DEFAULT_POSTS_TEMPLATE),
    ("pages/tags.html", DEFAULT_TAGS_TEMPLATE),
    ("pages/article.html", DEFAULT_ARTICLE_TEMPLATE),
    ("pages/not_found.html", DEFAULT_NOT_FOUND_TEMPLATE),
    ("partials/nav.html", DEFAULT_NAV_PARTIAL),
    ("components/note.html", DEFAULT_NOTE_COMPONENT),
    ("components/figure.html", DEFAULT_FIGURE_COMPONENT),
];

pub type Props = Map<String, Value>;

/// A theme capability: turns props plus already-rendered children into an HTML fragment.
pub trait Renderer: Send + Sync {
    fn render(&self, props: &Props, children: &str) -> Result<String>;

    fn is_fallback(&self) -> bool {
        false
    }
}

/// Renders only its children.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackRenderer;

impl Renderer for FallbackRenderer {
    fn render(&self, _props: &Props, children: &str) -> Result<String> {
        Ok(children.to_string())
    }

    fn is_fallback(&self) -> bool {
        true
    }
}

/// A Tera template; children are exposed to it as `children`.
pub struct TemplateRenderer {
    tera: Arc<Tera>,
    template: String,
}

impl Renderer for TemplateRenderer {
    fn render(&self, props: &Props, children: &str) -> Result<String> {
        let mut context = Context::from_value(Value::Object(props.clone()))?;
        context.insert("children", children);
        Ok(self.tera.render(&self.template, &context)?)
    }
}

/// Capability slots a theme may fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Document,
    Layout,
    Page(PageType),
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Document,
        Capability::Layout,
        Capability::Page(PageType::Home),
        Capability::Page(PageType::PostsIndex),
        Capability::Page(PageType::TagsIndex),
        Capability::Page(PageType::Article),
        Capability::Page(PageType::NotFound),
    ];

    pub fn manifest_key(&self) -> &'static str {
        match self {
            Capability::Document => "document",
            Capability::Layout => "layout",
            Capability::Page(PageType::Home) => "home",
            Capability::Page(PageType::PostsIndex) => "posts",
            Capability::Page(PageType::TagsIndex) => "tags",
            Capability::Page(PageType::Article) => "article",
            Capability::Page(PageType::NotFound) => "not_found",
        }
    }

    pub fn default_path(&self) -> &'static str {
        match self {
            Capability::Document => "document.html",
            Capability::Layout => "layout.html",
            Capability::Page(PageType::Home) => "pages/home.html",
            Capability::Page(PageType::PostsIndex) => "pages/posts.html",
            Capability::Page(PageType::TagsIndex) => "pages/tags.html",
            Capability::Page(PageType::Article) => "pages/article.html",
            Capability::Page(PageType::NotFound) => "pages/not_found.html",
        }
    }
}

/// The validated, fallback-completed renderers of a theme.
pub struct ThemeCapabilities {
    pub name: String,
    pub document: Box<dyn Renderer>,
    pub layout: Box<dyn Renderer>,
    pub home: Box<dyn Renderer>,
    pub posts_index: Box<dyn Renderer>,
    pub tags_index: Box<dyn Renderer>,
    pub article: Box<dyn Renderer>,
    pub not_found: Box<dyn Renderer>,
    pub components: BTreeMap<String, Box<dyn Renderer>>,
}

impl ThemeCapabilities {
    pub fn fallback() -> Self {
        Self {
            name: "fallback".to_string(),
            document: Box::new(FallbackRenderer),
            layout: Box::new(FallbackRenderer),
            home: Box::new(FallbackRenderer),
            posts_index: Box::new(FallbackRenderer),
            tags_index: Box::new(FallbackRenderer),
            article: Box::new(FallbackRenderer),
            not_found: Box::new(FallbackRenderer),
            components: BTreeMap::new(),
        }
    }

    pub fn page(&self, page_type: PageType) -> &dyn Renderer {
        match page_type {
            PageType::Home => self.home.as_ref(),
            PageType::PostsIndex => self.posts_index.as_ref(),
            PageType::TagsIndex => self.tags_index.as_ref(),
            PageType::Article => self.article.as_ref(),
            PageType::NotFound => self.not_found.as_ref(),
        }
    }

    pub fn capability(&self, capability: Capability) -> &dyn Renderer {
        match capability {
            Capability::Document => self.document.as_ref(),
            Capability::Layout => self.layout.as_ref(),
            Capability::Page(page_type) => self.page(page_type),
        }
    }

    fn slot_mut(&mut self, capability: Capability) -> &mut Box<dyn Renderer> {
        match capability {
            Capability::Document => &mut self.document,
            Capability::Layout => &mut self.layout,
            Capability::Page(PageType::Home) => &mut self.home,
            Capability::Page(PageType::PostsIndex) => &mut self.posts_index,
            Capability::Page(PageType::TagsIndex) => &mut self.tags_index,
            Capability::Page(PageType::Article) => &mut self.article,
            Capability::Page(PageType::NotFound) => &mut self.not_found,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeSource {
    Builtin,
    Directory(PathBuf),
}

impl ThemeSource {
    fn name(&self) -> String {
        match self {
            ThemeSource::Builtin => BUILTIN_THEME_NAMES[0].to_string(),
            ThemeSource::Directory(dir) => dir.display().to_string(),
        }
    }

    fn read(&self, relative: &str) -> Result<Option<String>> {
        match self {
            ThemeSource::Builtin => Ok(BUILTIN_DEFAULT
                .iter()
                .find(|(name, _)| *name == relative)
                .map(|(_, content)| content.to_string())),
            ThemeSource::Directory(dir) => {
                let path = dir.join(relative);
                if !path.is_file() {
                    return Ok(None);
                }
                fs::read_to_string(&path)
                    .io_context("reading theme template", &path)
                    .map(Some)
            }
        }
    }

    /// Relative names of the `.html` files below `subdir`, sorted.
    fn list_templates(&self, subdir: &str) -> Vec<String> {
        let mut names: Vec<String> = match self {
            ThemeSource::Builtin => BUILTIN_DEFAULT
                .iter()
                .map(|(name, _)| name.to_string())
                .filter(|name| name.starts_with(&format!("{subdir}/")))
                .collect(),
            ThemeSource::Directory(dir) => {
                let root = dir.join(subdir);
                WalkDir::new(&root)
                    .min_depth(1)
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_type().is_file())
                    .filter(|entry| {
                        entry
                            .path()
                            .extension()
                            .is_some_and(|extension| extension == "html")
                    })
                    .filter_map(|entry| {
                        entry
                            .path()
                            .strip_prefix(dir)
                            .ok()
                            .map(|relative| relative.to_string_lossy().replace('\\', "/"))
                    })
                    .collect()
            }
        };
        names.sort();
        names
    }
}

/// Per-capability template paths. `Err` marks an entry with the wrong shape.
struct Manifest {
    entries: BTreeMap<&'static str, std::result::Result<String, String>>,
    components_dir: String,
}

impl Manifest {
    fn conventional() -> Self {
        Self {
            entries: BTreeMap::new(),
            components_dir: "components".to_string(),
        }
    }

    fn read(source: &ThemeSource) -> Result<Self> {
        let Some(content) = source.read(THEME_MANIFEST)? else {
            return Ok(Self::conventional());
        };

        let table = toml::from_str::<toml::Table>(&content).map_err(|error| {
            FolioError::ThemeLoad {
                locator: source.name(),
                message: format!("invalid {THEME_MANIFEST}: {error}"),
            }
        })?;

        let mut manifest = Self::conventional();
        for (key, value) in table {
            if key == "components" {
                match value {
                    toml::Value::String(dir) => manifest.components_dir = dir,
                    other => log::warn!(
                        target: "theme",
                        "'components' in {THEME_MANIFEST} must be a directory name, found {other}"
                    ),
                }
                continue;
            }

            let Some(capability) = Capability::ALL
                .iter()
                .find(|capability| capability.manifest_key() == key)
            else {
                log::warn!(target: "theme", "ignoring unknown key '{key}' in {THEME_MANIFEST}");
                continue;
            };

            let entry = match value {
                toml::Value::String(path) => Ok(path),
                other => Err(format!("expected a template path, found {other}")),
            };
            manifest.entries.insert(capability.manifest_key(), entry);
        }

        Ok(manifest)
    }

    fn path_for(&self, capability: Capability) -> std::result::Result<String, String> {
        self.entries
            .get(capability.manifest_key())
            .cloned()
            .unwrap_or_else(|| Ok(capability.default_path().to_string()))
    }
}

/// Adds `name` to a copy of `tera`; the copy is kept only if the template compiles.
fn try_register(tera: &mut Tera, name: &str, content: &str) -> std::result::Result<(), String> {
    let mut candidate = tera.clone();
    candidate
        .add_raw_template(name, content)
        .map_err(|error| describe_tera_error(&error))?;
    *tera = candidate;
    Ok(())
}

fn describe_tera_error(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn load_source(source: &ThemeSource) -> Result<ThemeCapabilities> {
    let manifest = Manifest::read(source)?;
    let mut tera = Tera::default();
    tera.set_escape_fn(escape_html);

    for partial in source.list_templates("partials") {
        if let Some(content) = source.read(&partial)?
            && let Err(message) = try_register(&mut tera, &partial, &content)
        {
            log::warn!(target: "theme", "skipping partial {partial}: {message}");
        }
    }

    let mut component_templates = Vec::new();
    for template in source.list_templates(&manifest.components_dir) {
        let Some(content) = source.read(&template)? else {
            continue;
        };
        match try_register(&mut tera, &template, &content) {
            Ok(()) => component_templates.push(template),
            Err(message) => {
                log::warn!(target: "theme", "skipping component {template}: {message}")
            }
        }
    }

    let mut page_templates = Vec::new();
    for capability in Capability::ALL {
        let path = match manifest.path_for(capability) {
            Ok(path) => path,
            Err(message) => {
                log::warn!(
                    target: "theme",
                    "invalid '{}' capability: {message}; using fallback",
                    capability.manifest_key()
                );
                continue;
            }
        };

        let content = match source.read(&path) {
            Ok(Some(content)) => content,
            Ok(None) => {
                log::warn!(
                    target: "theme",
                    "theme has no '{}' template ({path}); using fallback",
                    capability.manifest_key()
                );
                continue;
            }
            Err(error) => {
                log::warn!(target: "theme", "{error}; using fallback");
                continue;
            }
        };

        match try_register(&mut tera, &path, &content) {
            Ok(()) => page_templates.push((capability, path)),
            Err(message) => log::warn!(
                target: "theme",
                "invalid '{}' template {path}: {message}; using fallback",
                capability.manifest_key()
            ),
        }
    }

    let tera = Arc::new(tera);
    let mut theme = ThemeCapabilities::fallback();
    theme.name = source.name();

    for (capability, template) in page_templates {
        *theme.slot_mut(capability) = Box::new(TemplateRenderer {
            tera: Arc::clone(&tera),
            template,
        });
    }

    let prefix = format!("{}/", manifest.components_dir.trim_end_matches('/'));
    for template in component_templates {
        let name = template
            .strip_prefix(&prefix)
            .unwrap_or(&template)
            .trim_end_matches(".html")
            .to_string();
        theme.components.insert(
            name,
            Box::new(TemplateRenderer {
                tera: Arc::clone(&tera),
                template,
            }),
        );
    }

    Ok(theme)
}

/// Resolves a theme locator against `base_dir`.
///
/// `file:` locators load directly; otherwise built-in names, then
/// `<base_dir>/themes/<locator>`, then `<base_dir>/<locator>` are tried in turn.
pub fn resolve_locator(locator: &str, base_dir: &Path) -> Result<ThemeSource> {
    let not_found = |message: String| FolioError::ThemeLoad {
        locator: locator.to_string(),
        message,
    };

    if let Some(rest) = locator.strip_prefix("file:") {
        let path = base_dir.join(rest.trim_start_matches("//"));
        return directory_source(&path)
            .ok_or_else(|| not_found(format!("{} is not a theme directory", path.display())));
    }

    if BUILTIN_THEME_NAMES.contains(&locator) {
        return Ok(ThemeSource::Builtin);
    }

    let candidates = [base_dir.join(THEMES_DIR).join(locator), base_dir.join(locator)];
    candidates
        .iter()
        .find_map(|candidate| directory_source(candidate))
        .ok_or_else(|| {
            not_found(format!(
                "not a built-in theme and no directory at {} or {}",
                candidates[0].display(),
                candidates[1].display()
            ))
        })
}

fn directory_source(path: &Path) -> Option<ThemeSource> {
    if path.is_dir() {
        return Some(ThemeSource::Directory(path.to_path_buf()));
    }
    if path.is_file() && path.file_name().is_some_and(|name| name == THEME_MANIFEST) {
        return path
            .parent()
            .map(|parent| ThemeSource::Directory(parent.to_path_buf()));
    }
    None
}

/// Loads a theme. Never fails: any load error degrades to the all-fallback set.
pub fn load_theme(locator: &str, base_dir: &Path) -> ThemeCapabilities {
    match resolve_locator(locator, base_dir).and_then(|source| load_source(&source)) {
        Ok(theme) => {
            log::info!(target: "theme", "Using theme {}", theme.name);
            theme
        }
        Err(error) => {
            log::warn!(
                target: "theme",
                "Failed to load theme \"{}\" from \"{}\". Falling back to built-in fallback theme.",
                locator,
                base_dir.display()
            );
            log::warn!(target: "theme", "{error}");
            ThemeCapabilities::fallback()
        }
    }
}
