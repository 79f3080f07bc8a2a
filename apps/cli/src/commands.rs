use folio_ssg::{ConfigOverrides, Result, SiteBuilder};
use std::path::Path;

pub fn build_site(root: &Path, config: Option<&Path>, overrides: ConfigOverrides) -> Result<()> {
    let mut builder = SiteBuilder::new(root).overrides(overrides);

    if let Some(path) = config {
        builder = builder.config_path(path);
    }

    let result = builder.build()?;

    if result.failure_count > 0 {
        log::warn!(
            target: "build",
            "{} of {} pages failed to render",
            result.failure_count,
            result.success_count + result.failure_count
        );
    }

    Ok(())
}
