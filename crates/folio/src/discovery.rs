use crate::error::{FolioError, Result};
use crate::types::ContentFile;
use std::path::Path;
use walkdir::WalkDir;

pub const CONTENT_EXTENSION: &str = "mdx";

/// Recursively collects every `.mdx` file under `content_dir`, in file-name order.
///
/// A missing or unreadable root is an error; nothing else is filtered out.
/// Symlinks are not followed.
pub fn discover_content(content_dir: &Path) -> Result<Vec<ContentFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(content_dir).sort_by_file_name() {
        let entry = entry.map_err(|error| FolioError::Discovery {
            path: error
                .path()
                .unwrap_or(content_dir)
                .to_path_buf(),
            message: error.to_string(),
        })?;

        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        if path
            .extension()
            .map(|extension| extension != CONTENT_EXTENSION)
            .unwrap_or(true)
        {
            continue;
        }

        let relative = path
            .strip_prefix(content_dir)
            .map_err(|_| FolioError::InvalidPath {
                path: path.to_path_buf(),
            })?;

        files.push(ContentFile {
            path: path.to_path_buf(),
            relative: relative.to_path_buf(),
        });
    }

    Ok(files)
}
