use crate::reporting;
use std::fs;
use std::path::Path;
use tickwise_domain::entities::metrics::MetricsSummary;
use tickwise_domain::repositories::artifacts::ArtifactWriter;
use tickwise_domain::services::audit::AuditEvent;
use tickwise_domain::value_objects::equity_point::EquityPoint;
use tickwise_domain::value_objects::fill::Fill;
use tickwise_domain::value_objects::trade::Trade;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err))
    }

    fn write_trades_csv(&self, path: &Path, trades: &[Trade]) -> Result<(), String> {
        reporting::write_trades_csv(path, trades)
    }

    fn write_fills_csv(&self, path: &Path, fills: &[Fill]) -> Result<(), String> {
        reporting::write_fills_csv(path, fills)
    }

    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String> {
        reporting::write_equity_csv(path, points)
    }

    fn write_summary_json(&self, path: &Path, summary: &serde_json::Value) -> Result<(), String> {
        reporting::write_summary_json(path, summary)
    }

    fn write_summary_html(
        &self,
        path: &Path,
        summary: &MetricsSummary,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        reporting::write_summary_html(path, summary, meta)
    }

    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String> {
        reporting::write_audit_jsonl(path, events)
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        fs::write(path, contents).map_err(|err| {
            format!(
                "failed to write config snapshot {}: {}",
                path.display(),
                err
            )
        })
    }
}
