use crate::config::{ConfigOverrides, load_config};
use crate::discovery::discover_content;
use crate::error::{IoContext, Result};
use crate::logging::format_elapsed_time;
use crate::parsing::MarkdownRenderer;
use crate::render::{RenderContext, write_page};
use crate::routes::build_routes;
use crate::theme::load_theme;
use crate::types::{BuildResult, RouteEntry};
use colored::Colorize;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One build pass: config, output reset, theme, discovery, then every route.
///
/// Config and discovery failures abort the build. Route failures are logged
/// and counted in the returned [`BuildResult`].
pub struct SiteBuilder {
    base_dir: PathBuf,
    config_path: Option<PathBuf>,
    overrides: ConfigOverrides,
}

impl SiteBuilder {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            config_path: None,
            overrides: ConfigOverrides::default(),
        }
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn build(&self) -> Result<BuildResult> {
        let start = Instant::now();

        let base_dir =
            std::path::absolute(&self.base_dir).io_context("resolving", &self.base_dir)?;
        let config = load_config(&base_dir, self.config_path.as_deref(), &self.overrides)?;

        let content_dir = base_dir.join(&config.content_dir);
        let out_dir = base_dir.join(&config.out_dir);

        log::info!(target: "build", "Output directory: {}", out_dir.display());
        empty_output_dir(&out_dir)?;

        let theme = load_theme(&config.theme, &base_dir);

        let files = discover_content(&content_dir)?;
        let routes = build_routes(&files);
        log::info!(target: "build", "Found {} content files", routes.len());

        let markdown = MarkdownRenderer::new();
        let context = RenderContext {
            config: &config,
            theme: &theme,
            markdown: &markdown,
            out_dir: &out_dir,
        };

        let result = render_routes(&context, &routes);

        log::info!(
            target: "build",
            "{}",
            format!(
                "Done. success={}, failed={} in {}",
                result.success_count,
                result.failure_count,
                format_elapsed_time(start.elapsed())
            )
            .bold()
        );

        Ok(result)
    }
}

/// Renders every route in parallel; failures stay with their route.
pub fn render_routes(context: &RenderContext<'_>, routes: &[RouteEntry]) -> BuildResult {
    let outcomes: Vec<(&RouteEntry, Result<PathBuf>)> = routes
        .par_iter()
        .map(|route| (route, write_page(context, route)))
        .collect();

    let mut result = BuildResult::default();

    for (route, outcome) in outcomes {
        match outcome {
            Ok(destination) => {
                result.success_count += 1;
                log::info!(
                    target: "pages",
                    "Built [{}]: {}",
                    route.page_type,
                    destination.display().to_string().dimmed()
                );
            }
            Err(error) => {
                result.failure_count += 1;
                log::error!(target: "pages", "Failed: {}", route.file_path.display());
                log::error!(target: "pages", "{error}");
            }
        }
    }

    result
}

/// Removes everything below `out_dir`, leaving it as an empty directory.
pub fn empty_output_dir(out_dir: &Path) -> Result<()> {
    if out_dir.exists() {
        fs::remove_dir_all(out_dir).io_context("emptying", out_dir)?;
    }
    fs::create_dir_all(out_dir).io_context("creating", out_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FolioError;
    use tempfile::TempDir;

    fn create_test_site() -> TempDir {
        let dir = TempDir::new().unwrap();

        fs::write(
            dir.path().join("folio.toml"),
            "siteTitle = \"Test Site\"\ndescription = \"A test site\"\n",
        )
        .unwrap();

        fs::create_dir_all(dir.path().join("contents/posts")).unwrap();
        fs::create_dir_all(dir.path().join("contents/tags")).unwrap();

        fs::write(
            dir.path().join("contents/index.mdx"),
            "---\ntitle: Home\n---\n\nWelcome home",
        )
        .unwrap();
        fs::write(
            dir.path().join("contents/posts/index.mdx"),
            "---\ntitle: All posts\n---\n\nEvery post",
        )
        .unwrap();
        fs::write(
            dir.path().join("contents/tags/index.mdx"),
            "Every tag",
        )
        .unwrap();
        fs::write(
            dir.path().join("contents/404.mdx"),
            "---\ntitle: Not found\n---\n\nNothing here",
        )
        .unwrap();
        fs::write(
            dir.path().join("contents/posts/hello.mdx"),
            "+++\ntitle = \"Hello World\"\ntags = [\"test\"]\ndate = \"2024-01-15\"\n+++\n\nFirst paragraph.",
        )
        .unwrap();

        dir
    }

    #[test]
    fn test_build_site() {
        let dir = create_test_site();
        let result = SiteBuilder::new(dir.path()).build().unwrap();

        assert_eq!(result.success_count, 5);
        assert_eq!(result.failure_count, 0);

        for page in [
            "index.html",
            "404.html",
            "posts/index.html",
            "tags/index.html",
            "posts/hello.html",
        ] {
            assert!(dir.path().join("dist").join(page).is_file(), "{page} missing");
        }
    }

    #[test]
    fn test_output_dir_emptied() {
        let dir = create_test_site();
        fs::create_dir_all(dir.path().join("dist/stale")).unwrap();
        fs::write(dir.path().join("dist/stale/old.html"), "old").unwrap();

        SiteBuilder::new(dir.path()).build().unwrap();

        assert!(!dir.path().join("dist/stale").exists());
        assert!(dir.path().join("dist/index.html").exists());
    }

    #[test]
    fn test_overrides_change_output_dir() {
        let dir = create_test_site();
        let overrides = ConfigOverrides {
            out_dir: Some("public".to_string()),
            ..Default::default()
        };
        SiteBuilder::new(dir.path())
            .overrides(overrides)
            .build()
            .unwrap();

        assert!(dir.path().join("public/posts/hello.html").is_file());
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn test_missing_config_aborts() {
        let dir = TempDir::new().unwrap();
        let result = SiteBuilder::new(dir.path()).build();
        assert!(matches!(result, Err(FolioError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_missing_content_dir_aborts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("folio.toml"), "contentDir = \"nowhere\"").unwrap();
        let result = SiteBuilder::new(dir.path()).build();
        assert!(matches!(result, Err(FolioError::Discovery { .. })));
    }

    #[test]
    fn test_explicit_config_path() {
        let dir = create_test_site();
        fs::write(dir.path().join("alt.toml"), "outDir = \"alt-out\"").unwrap();

        SiteBuilder::new(dir.path())
            .config_path("alt.toml")
            .build()
            .unwrap();

        assert!(dir.path().join("alt-out/index.html").is_file());
    }

    #[test]
    fn test_empty_output_dir_creates_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a/b");
        empty_output_dir(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }
}
