use std::path::Path;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const SUMMARY_SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub pose_index: usize,
    pub prompt: String,
    pub image_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub pose_index: usize,
    pub error: String,
}

/// Report of one batch, written next to the downloaded images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u64,
    pub session_id: String,
    pub style: String,
    pub model: String,
    pub started_at: String,
    pub finished_at: String,
    pub attempted: usize,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub results: Vec<ResultRecord>,
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
}

impl BatchSummary {
    pub fn find(&self, id: &str) -> Option<&ResultRecord> {
        self.results.iter().find(|record| record.id == id)
    }
}

pub fn write_summary(path: &Path, summary: &BatchSummary) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(summary)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_summary(path: &Path) -> anyhow::Result<BatchSummary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid batch summary {}", path.display()))
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn default_schema_version() -> u64 {
    SUMMARY_SCHEMA_VERSION
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{load_summary, write_summary, BatchSummary, FailureRecord, ResultRecord};

    #[test]
    fn summary_round_trips_through_disk() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("run").join("summary.json");
        let summary = BatchSummary {
            schema_version: 1,
            session_id: "session-1".to_string(),
            style: "minimalist".to_string(),
            model: "dryrun-image-1".to_string(),
            started_at: "2026-02-19T00:00:00+00:00".to_string(),
            finished_at: "2026-02-19T00:10:00+00:00".to_string(),
            attempted: 10,
            cancelled: false,
            results: vec![ResultRecord {
                id: "gen-1-0".to_string(),
                pose_index: 0,
                prompt: "Minimalist | walk".to_string(),
                image_path: "/tmp/run/lumiere-editorial-gen-1-0.png".to_string(),
            }],
            failures: vec![FailureRecord {
                pose_index: 3,
                error: "no image returned".to_string(),
            }],
        };
        write_summary(&path, &summary)?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(parsed["failures"][0]["pose_index"], json!(3));

        let loaded = load_summary(&path)?;
        assert_eq!(loaded, summary);
        assert!(loaded.find("gen-1-0").is_some());
        assert!(loaded.find("gen-1-9").is_none());
        Ok(())
    }

    #[test]
    fn older_summaries_default_optional_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("summary.json");
        std::fs::write(
            &path,
            r#"{"session_id":"s","style":"vintage","model":"m","started_at":"a","finished_at":"b","attempted":2}"#,
        )?;
        let loaded = load_summary(&path)?;
        assert_eq!(loaded.schema_version, 1);
        assert!(loaded.results.is_empty());
        assert!(!loaded.cancelled);
        Ok(())
    }
}
