use crate::error::{FolioError, IoContext, Result};
use crate::parsing::toml_to_json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["folio.toml", "folio.json"];

pub const DEFAULT_SITE_TITLE: &str = "My Folio Site";
pub const DEFAULT_DESCRIPTION: &str = "A site built with Folio";
pub const DEFAULT_BASE_URL: &str = "/";
pub const DEFAULT_CONTENT_DIR: &str = "contents";
pub const DEFAULT_OUT_DIR: &str = "dist";
pub const DEFAULT_THEME: &str = "default";

/// Resolved configuration, immutable for the duration of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
    pub site_title: String,
    pub description: String,
    pub base_url: String,
    pub content_dir: String,
    pub out_dir: String,
    pub theme: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            site_title: DEFAULT_SITE_TITLE.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            content_dir: DEFAULT_CONTENT_DIR.to_string(),
            out_dir: DEFAULT_OUT_DIR.to_string(),
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl BuildConfig {
    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "siteTitle" => Some(&mut self.site_title),
            "description" => Some(&mut self.description),
            "baseURL" => Some(&mut self.base_url),
            "contentDir" => Some(&mut self.content_dir),
            "outDir" => Some(&mut self.out_dir),
            "theme" => Some(&mut self.theme),
            _ => None,
        }
    }
}

/// Partial configuration supplied by the caller. Set fields win over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverrides {
    pub site_title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "baseURL")]
    pub base_url: Option<String>,
    pub content_dir: Option<String>,
    pub out_dir: Option<String>,
    pub theme: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut BuildConfig) {
        let pairs = [
            (&self.site_title, &mut config.site_title),
            (&self.description, &mut config.description),
            (&self.base_url, &mut config.base_url),
            (&self.content_dir, &mut config.content_dir),
            (&self.out_dir, &mut config.out_dir),
            (&self.theme, &mut config.theme),
        ];

        for (value, field) in pairs {
            if let Some(value) = value {
                *field = value.clone();
            }
        }
    }
}

pub fn find_config(base_dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_CANDIDATES
        .iter()
        .map(|name| base_dir.join(name))
        .find(|path| path.is_file())
}

/// Resolves configuration with precedence overrides > config file > defaults.
///
/// `explicit` is resolved against `base_dir` when relative. No config file is an error.
pub fn load_config(
    base_dir: &Path,
    explicit: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<BuildConfig> {
    let config_path = match explicit {
        Some(path) => {
            let path = base_dir.join(path);
            if !path.is_file() {
                return Err(FolioError::ConfigNotFound { path });
            }
            path
        }
        None => find_config(base_dir).ok_or_else(|| FolioError::ConfigNotFound {
            path: base_dir.join(CONFIG_FILE_CANDIDATES[0]),
        })?,
    };

    let table = read_config_table(&config_path)?;

    let mut config = BuildConfig::default();
    apply_fields(&mut config, table, &config_path);
    overrides.apply(&mut config);

    log::debug!(target: "config", "loaded {}", config_path.display());

    Ok(config)
}

fn read_config_table(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path).io_context("reading config", path)?;

    let parse_error = |message: String| FolioError::ConfigParse {
        path: path.to_path_buf(),
        message,
    };

    let value = if path.extension().is_some_and(|extension| extension == "json") {
        serde_json::from_str::<Value>(&content).map_err(|error| parse_error(error.to_string()))?
    } else {
        let table = toml::from_str::<toml::Table>(&content)
            .map_err(|error| parse_error(error.to_string()))?;
        toml_to_json(toml::Value::Table(table))
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(parse_error("expected a table of settings".to_string())),
    }
}

fn apply_fields(config: &mut BuildConfig, table: Map<String, Value>, path: &Path) {
    for (key, value) in table {
        let Some(field) = config.field_mut(&key) else {
            log::warn!(
                target: "config",
                "ignoring unknown key '{}' in {}",
                key,
                path.display()
            );
            continue;
        };

        match value {
            Value::String(value) => *field = value,
            other => log::warn!(
                target: "config",
                "ignoring '{}' in {}: expected a string, found {}; using default",
                key,
                path.display(),
                other
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = load_config(dir.path(), None, &ConfigOverrides::default());
        assert!(matches!(result, Err(FolioError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_missing_explicit_config_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("folio.toml"), "siteTitle = \"x\"").unwrap();
        let result = load_config(
            dir.path(),
            Some(Path::new("other.toml")),
            &ConfigOverrides::default(),
        );
        assert!(matches!(result, Err(FolioError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_toml_values_over_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("folio.toml"),
            "siteTitle = \"Notebook\"\nbaseURL = \"/blog/\"\n",
        )
        .unwrap();

        let config = load_config(dir.path(), None, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.site_title, "Notebook");
        assert_eq!(config.base_url, "/blog/");
        assert_eq!(config.description, DEFAULT_DESCRIPTION);
        assert_eq!(config.out_dir, DEFAULT_OUT_DIR);
    }

    #[test]
    fn test_json_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("folio.json"),
            r#"{ "siteTitle": "From JSON", "outDir": "public" }"#,
        )
        .unwrap();

        let config = load_config(dir.path(), None, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.site_title, "From JSON");
        assert_eq!(config.out_dir, "public");
    }

    #[test]
    fn test_toml_preferred_over_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("folio.toml"), "siteTitle = \"toml\"").unwrap();
        fs::write(dir.path().join("folio.json"), r#"{ "siteTitle": "json" }"#).unwrap();

        let config = load_config(dir.path(), None, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.site_title, "toml");
    }

    #[test]
    fn test_overrides_win() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("folio.toml"),
            "siteTitle = \"File\"\ntheme = \"./my-theme\"\n",
        )
        .unwrap();

        let overrides = ConfigOverrides {
            site_title: Some("Override".to_string()),
            ..Default::default()
        };
        let config = load_config(dir.path(), None, &overrides).unwrap();
        assert_eq!(config.site_title, "Override");
        assert_eq!(config.theme, "./my-theme");
    }

    #[test]
    fn test_invalid_fields_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("folio.toml"),
            "siteTitle = 5\noutDir = \"out\"\nfavoriteColor = \"green\"\n",
        )
        .unwrap();

        let config = load_config(dir.path(), None, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.site_title, DEFAULT_SITE_TITLE);
        assert_eq!(config.out_dir, "out");
    }

    #[test]
    fn test_unparsable_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("folio.json"), "[1, 2, 3]").unwrap();
        let result = load_config(dir.path(), None, &ConfigOverrides::default());
        assert!(matches!(result, Err(FolioError::ConfigParse { .. })));
    }

    #[test]
    fn test_overrides_deserialize_camel_case() {
        let overrides: ConfigOverrides =
            serde_json::from_str(r#"{ "baseURL": "/x/", "outDir": "o" }"#).unwrap();
        assert_eq!(overrides.base_url.as_deref(), Some("/x/"));
        assert_eq!(overrides.out_dir.as_deref(), Some("o"));
        assert_eq!(overrides.theme, None);
    }
}
