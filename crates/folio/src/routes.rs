use crate::discovery::CONTENT_EXTENSION;
use crate::types::{ContentFile, PageType, RouteEntry};
use std::path::{Path, PathBuf};

/// Maps a content-relative path to its page type. Pure; never touches the filesystem.
pub fn classify(relative: &Path) -> PageType {
    let normalized = relative.to_string_lossy().replace('\\', "/");
    let normalized = normalized.trim_start_matches("./");

    let Some(stem) = normalized.strip_suffix(&format!(".{CONTENT_EXTENSION}")) else {
        return PageType::Article;
    };

    match stem {
        "index" => PageType::Home,
        "posts/index" => PageType::PostsIndex,
        "tags/index" => PageType::TagsIndex,
        "404" => PageType::NotFound,
        _ => PageType::Article,
    }
}

pub fn build_routes(files: &[ContentFile]) -> Vec<RouteEntry> {
    files
        .iter()
        .map(|file| RouteEntry {
            file_path: file.path.clone(),
            relative: file.relative.clone(),
            page_type: classify(&file.relative),
        })
        .collect()
}

/// `out_dir/<relative>` with the extension swapped for `.html`.
pub fn output_path(out_dir: &Path, relative: &Path) -> PathBuf {
    out_dir.join(relative).with_extension("html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_special_pages() {
        assert_eq!(classify(Path::new("index.mdx")), PageType::Home);
        assert_eq!(classify(Path::new("posts/index.mdx")), PageType::PostsIndex);
        assert_eq!(classify(Path::new("tags/index.mdx")), PageType::TagsIndex);
        assert_eq!(classify(Path::new("404.mdx")), PageType::NotFound);
    }

    #[test]
    fn test_classify_articles() {
        assert_eq!(classify(Path::new("posts/my-article.mdx")), PageType::Article);
        assert_eq!(classify(Path::new("about.mdx")), PageType::Article);
        assert_eq!(classify(Path::new("posts/2024/index.mdx")), PageType::Article);
        assert_eq!(classify(Path::new("docs/404.mdx")), PageType::Article);
        assert_eq!(classify(Path::new("index.md")), PageType::Article);
        assert_eq!(classify(Path::new("")), PageType::Article);
    }

    #[test]
    fn test_classify_normalizes_separators() {
        assert_eq!(classify(Path::new("posts\\index.mdx")), PageType::PostsIndex);
        assert_eq!(classify(Path::new("tags\\index.mdx")), PageType::TagsIndex);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for path in ["index.mdx", "posts/a.mdx", "404.mdx", "x/y/z.mdx"] {
            assert_eq!(classify(Path::new(path)), classify(Path::new(path)));
        }
    }

    #[test]
    fn test_output_path_mapping() {
        assert_eq!(
            output_path(Path::new("dist"), Path::new("posts/a/b.mdx")),
            PathBuf::from("dist/posts/a/b.html")
        );
        assert_eq!(
            output_path(Path::new("dist"), Path::new("index.mdx")),
            PathBuf::from("dist/index.html")
        );
    }

    #[test]
    fn test_build_routes_one_per_file() {
        let files = vec![
            ContentFile {
                path: PathBuf::from("/site/contents/index.mdx"),
                relative: PathBuf::from("index.mdx"),
            },
            ContentFile {
                path: PathBuf::from("/site/contents/posts/hello.mdx"),
                relative: PathBuf::from("posts/hello.mdx"),
            },
        ];
        let routes = build_routes(&files);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].page_type, PageType::Home);
        assert_eq!(routes[1].page_type, PageType::Article);
        assert_eq!(routes[1].file_path, files[1].path);
    }
}
