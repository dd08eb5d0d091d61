use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use insight_core::ChartSpec;
use tracing::info;

/// Default directory for exported charts
pub fn default_export_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("insight-desk").join("exports"))
        .unwrap_or_else(|| PathBuf::from("exports"))
}

/// Write `spec` as pretty JSON into `dir` and return the file path.
pub fn export_chart(spec: &ChartSpec, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Could not create export directory {}", dir.display()))?;

    let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
    let mut path = dir.join(format!("chart-{}.json", stamp));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("chart-{}-{}.json", stamp, n));
        n += 1;
    }

    let content = serde_json::to_string_pretty(spec)?;
    fs::write(&path, content).with_context(|| format!("Could not write {}", path.display()))?;
    info!(path = %path.display(), "chart exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_writes_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("exports");
        let spec = ChartSpec::monthly_trend();

        let path = export_chart(&spec, &target).unwrap();
        assert!(path.starts_with(&target));
        let back: ChartSpec = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_repeated_exports_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let a = export_chart(&ChartSpec::monthly_trend(), dir.path()).unwrap();
        let b = export_chart(&ChartSpec::sales_top10(), dir.path()).unwrap();
        assert_ne!(a, b);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
