//! Batch manifest: one JSON summary per batch run for downstream tooling.

use crate::job::BatchJobRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub created_at: DateTime<Utc>,
    pub num_jobs: usize,
    pub success: usize,
    pub failure: usize,
    pub jobs: Vec<BatchJobRecord>,
}

pub fn write_batch_manifest(path: &Path, manifest: &BatchManifest) -> Result<()> {
    let payload = serde_json::to_string_pretty(manifest)
        .context("serializing batch manifest")?;
    std::fs::write(path, payload)
        .with_context(|| format!("writing batch manifest '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch_manifest.json");

        let manifest = BatchManifest {
            created_at: Utc::now(),
            num_jobs: 2,
            success: 1,
            failure: 1,
            jobs: vec![
                BatchJobRecord {
                    case_id: "20201101001".to_string(),
                    status: "ok".to_string(),
                    detail: None,
                    objective: Some(123.4),
                    output_file: Some(dir.path().join("20201101001/solution.json")),
                },
                BatchJobRecord {
                    case_id: "20201101002".to_string(),
                    status: "error".to_string(),
                    detail: Some("casefile not found".to_string()),
                    objective: None,
                    output_file: None,
                },
            ],
        };
        write_batch_manifest(&path, &manifest).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: BatchManifest = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.num_jobs, 2);
        assert_eq!(parsed.success, 1);
        assert_eq!(parsed.jobs[1].status, "error");
    }
}
