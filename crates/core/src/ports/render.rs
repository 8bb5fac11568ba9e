use crate::domain::RepoStatistics;
use anyhow::Result;
use std::path::Path;

/// Port for report rendering
pub trait RenderPort: Send + Sync {
    /// Write the report for one repository into `output_dir`
    fn render(&self, stats: &RepoStatistics, output_dir: &Path) -> Result<()>;
}
