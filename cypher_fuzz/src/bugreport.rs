//! Persisted bug reports.
//!
//! A report carries everything needed to reproduce a bug: the byte string the
//! query was generated from, the target and strategy it was generated with and
//! the statements as they ran.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use cypher_generation::Seed;
use serde::{Deserialize, Serialize};

use crate::dbms::{QueryResult, QueryResultType};
use crate::strategy::FuzzingStrategy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Unconfirmed,
    Confirmed,
    Fixed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugReport {
    pub target: String,
    pub strategy: FuzzingStrategy,
    /// Seconds since the unix epoch.
    pub time_found: u64,
    #[serde(default)]
    pub report_status: ReportStatus,
    /// Base64 of the byte string generating the query.
    pub byte_string: String,
    pub query: Vec<String>,
    pub result_type: QueryResultType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl BugReport {
    pub fn new(
        target: impl ToString,
        strategy: FuzzingStrategy,
        bytes: &[u8],
        query: Vec<String>,
        last_result: &QueryResult,
    ) -> Self {
        let time_found = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            target: target.to_string(),
            strategy,
            time_found,
            report_status: ReportStatus::default(),
            byte_string: Seed::replay(bytes.to_vec()).to_base64(),
            query,
            result_type: last_result.ty,
            last_error: last_result.error_message(),
        }
    }

    pub fn bytes(&self) -> anyhow::Result<Vec<u8>> {
        let seed = Seed::from_base64(&self.byte_string).context("bug report has an invalid byte string")?;
        Ok(seed.byte_string().to_vec())
    }

    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read bug report {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("failed to parse bug report {}", path.display()))
    }

    pub fn write(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).with_context(|| format!("failed to write bug report {}", path.display()))
    }

    /// Writes the report as `<name>.json` into `dir`, creating it if needed.
    pub fn write_into(&self, dir: impl AsRef<Path>, name: &str) -> anyhow::Result<PathBuf> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::warn!("bug report directory {} does not exist, creating it", dir.display());
            fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let path = dir.join(format!("{name}.json"));
        self.write(&path)?;
        tracing::error!("bug found, created bug report {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbms::DbError;

    fn report() -> BugReport {
        let mut result = QueryResult::error(DbError::Query("boom".into()));
        result.ty = QueryResultType::Bug;
        BugReport::new(
            "memgraph",
            FuzzingStrategy::None,
            &[0, 7, 255],
            vec!["CREATE ()".into(), "MATCH (n) RETURN n".into()],
            &result,
        )
    }

    #[test]
    fn reports_survive_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let original = report();
        let path = original.write_into(dir.path().join("reports"), "report_1").unwrap();
        assert!(path.ends_with("reports/report_1.json"));

        let read = BugReport::read(&path).unwrap();
        assert_eq!(read, original);
        assert_eq!(read.bytes().unwrap(), vec![0, 7, 255]);
        assert_eq!(read.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn report_fields_are_readable() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["strategy"], "none");
        assert_eq!(json["result_type"], "BUG");
        assert_eq!(json["report_status"], "unconfirmed");
        assert_eq!(json["byte_string"], "AAf/");
    }

    #[test]
    fn broken_reports_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ \"target\": \"mock\" }").unwrap();
        assert!(BugReport::read(&path).is_err());
        assert!(BugReport::read(dir.path().join("missing.json")).is_err());

        let mut invalid = report();
        invalid.byte_string = "not base64!".into();
        assert!(invalid.bytes().is_err());
    }
}
