//! Structured outputs of the extraction pipeline.
use serde::{Deserialize, Serialize};

/// Risk explanation carried by every not-found record.
pub const NOT_FOUND_EXPLANATION: &str = "Cannot assess risk as clause was not found.";

/// One cited passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub page: u32,
    pub section: String,
    /// Opening characters of the passage followed by `...`.
    pub preview: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    None,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskRating {
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "LOW")]
    Low,
    /// The clause was not found.
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl RiskRating {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::NotApplicable => "N/A",
        }
    }
}

impl std::fmt::Display for RiskRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to an open question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<Citation>,
    pub confidence: Confidence,
}

/// Suggested replacement language for a high-risk clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redline {
    pub revision: String,
    pub rationale: String,
}

/// Outcome of analyzing one clause type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseRecord {
    pub clause_type: String,
    pub found: bool,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub risk_rating: RiskRating,
    pub risk_explanation: String,
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redline: Option<Redline>,
}

impl ClauseRecord {
    /// The fixed shape of a clause that is absent from the contract.
    #[must_use]
    pub fn not_found(clause_type: &str) -> Self {
        Self {
            clause_type: clause_type.to_string(),
            found: false,
            content: None,
            summary: None,
            risk_rating: RiskRating::NotApplicable,
            risk_explanation: NOT_FOUND_EXPLANATION.to_string(),
            citations: Vec::new(),
            redline: None,
        }
    }
}
