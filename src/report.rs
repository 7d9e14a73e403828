//! Analysis report: clause records plus run metadata, as pretty JSON.
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::models::{ClauseRecord, RiskRating};
use crate::pipeline::QaEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub found: usize,
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ReportSummary {
    #[must_use]
    pub fn from_records(records: &[ClauseRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records.iter().filter(|r| r.found) {
            summary.found += 1;
            match record.risk_rating {
                RiskRating::High => summary.high += 1,
                RiskRating::Medium => summary.medium += 1,
                RiskRating::Low => summary.low += 1,
                RiskRating::NotApplicable => {}
            }
        }
        summary
    }
}

/// Oracle models a report was produced with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportModels {
    pub completion: String,
    pub embedding: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub contract: String,
    pub fingerprint: String,
    #[serde(default)]
    pub models: ReportModels,
    /// RFC 3339 timestamp.
    pub generated_at: String,
    pub clauses: Vec<ClauseRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qa: Vec<QaEntry>,
    pub summary: ReportSummary,
}

impl AnalysisReport {
    #[must_use]
    pub fn new(
        contract: &str,
        fingerprint: &str,
        models: ReportModels,
        clauses: Vec<ClauseRecord>,
        qa: Vec<QaEntry>,
    ) -> Self {
        Self {
            contract: contract.to_string(),
            fingerprint: fingerprint.to_string(),
            models,
            generated_at: Utc::now().to_rfc3339(),
            summary: ReportSummary::from_records(&clauses),
            clauses,
            qa,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!("Report written to {}", path.display());
        Ok(())
    }

    /// Short human-readable overview, one line per clause.
    #[must_use]
    pub fn render_summary(&self) -> String {
        let mut out = format!(
            "{}: {}/{} clauses found (HIGH {}, MEDIUM {}, LOW {})\n",
            self.contract,
            self.summary.found,
            self.summary.total,
            self.summary.high,
            self.summary.medium,
            self.summary.low
        );
        for record in &self.clauses {
            let pages: Vec<String> = record.citations.iter().map(|c| c.page.to_string()).collect();
            if record.found {
                out.push_str(&format!(
                    "  [{}] {} (pages {})\n",
                    record.risk_rating,
                    record.clause_type,
                    pages.join(", ")
                ));
            } else {
                out.push_str(&format!("  [N/A] {} (not found)\n", record.clause_type));
            }
        }
        out
    }
}
