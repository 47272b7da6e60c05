use std::path::Path;

use super::duplicates::DuplicateGroup;
use super::{ConsolidatedScene, ConsolidationStats, ObjectInfo};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Serializable summary of one consolidation run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConsolidationReport {
    pub asset: String,
    pub stats: ConsolidationStats,
    pub objects: Vec<ObjectInfo>,
    pub duplicates: Vec<DuplicateGroup>,
}

impl ConsolidationReport {
    pub fn new(
        asset: impl Into<String>,
        scene: &ConsolidatedScene,
        duplicates: Vec<DuplicateGroup>,
    ) -> Self {
        Self {
            asset: asset.into(),
            stats: scene.stats().clone(),
            objects: scene.lookup().iter().cloned().collect(),
            duplicates,
        }
    }
}

pub fn save_report_to_file(report: &ConsolidationReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_report_from_file(path: &Path) -> Result<ConsolidationReport> {
    let json = std::fs::read_to_string(path)?;
    let report: ConsolidationReport = serde_json::from_str(&json)?;
    Ok(report)
}
