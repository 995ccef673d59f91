use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::error::{PipelineError, Result};

/// Monthly wave-height datasets for a buoy, laid out as
/// `<root>/<buoy>/<year>/<month>/<dataset_file>`, in path order.
pub fn discover_datasets(config: &AnalysisConfig, buoy: &str) -> Result<Vec<PathBuf>> {
    let buoy_path = config.buoy_path(buoy);
    if !buoy_path.is_dir() {
        return Err(PipelineError::Config(format!(
            "buoy directory {} does not exist",
            buoy_path.display()
        )));
    }

    let pattern = dataset_pattern(&buoy_path, &config.dataset_file)?;
    let mut paths = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(|err| PipelineError::Io(err.into()))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    debug!(buoy, datasets = paths.len(), "Discovered monthly datasets");
    Ok(paths)
}

fn dataset_pattern(buoy_path: &Path, dataset_file: &str) -> Result<String> {
    let base = buoy_path.to_str().ok_or_else(|| {
        PipelineError::Config(format!("{} is not valid UTF-8", buoy_path.display()))
    })?;
    let base = base.trim_end_matches(std::path::MAIN_SEPARATOR);
    Ok(format!(
        "{}{sep}*{sep}*{sep}{}",
        Pattern::escape(base),
        Pattern::escape(dataset_file),
        sep = std::path::MAIN_SEPARATOR
    ))
}
