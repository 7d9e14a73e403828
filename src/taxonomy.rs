/// Clause taxonomy: the fixed, ordered set of clause types analyzed per
/// contract, each with its deterministic risk keyword lists.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseSpec {
    pub name: String,
    #[serde(default)]
    pub high_risk_keywords: Vec<String>,
    #[serde(default)]
    pub low_risk_keywords: Vec<String>,
}

impl ClauseSpec {
    pub fn new(name: &str, high: &[&str], low: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            high_risk_keywords: high.iter().map(|s| s.to_string()).collect(),
            low_risk_keywords: low.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Default taxonomy, in report order.
pub fn default_clauses() -> Vec<ClauseSpec> {
    vec![
        ClauseSpec::new(
            "IP Ownership Assignment",
            &[
                "assigns all rights",
                "exclusive ownership",
                "perpetual",
                "irrevocable",
                "waives all rights",
            ],
            &[
                "joint ownership",
                "limited license",
                "retains rights",
                "shared ownership",
            ],
        ),
        ClauseSpec::new(
            "Price Restrictions",
            &[
                "no increase allowed",
                "fixed price",
                "price ceiling",
                "cannot adjust",
                "locked price",
            ],
            &["annual adjustment", "CPI indexed", "market rate", "negotiable"],
        ),
        ClauseSpec::new(
            "Non-compete, Exclusivity, No-solicit of Customers",
            &[
                "indefinite",
                "worldwide",
                "all industries",
                "perpetual",
                "unlimited scope",
            ],
            &[
                "limited duration",
                "specific geography",
                "narrow scope",
                "reasonable restrictions",
            ],
        ),
        ClauseSpec::new(
            "Termination for Convenience",
            &[
                "no termination right",
                "cannot terminate",
                "irrevocable",
                "no exit clause",
            ],
            &[
                "30 days notice",
                "60 days notice",
                "mutual termination",
                "either party may terminate",
            ],
        ),
        ClauseSpec::new(
            "Governing Law",
            &[
                "foreign jurisdiction",
                "arbitration mandatory",
                "waives jury trial",
                "exclusive venue",
            ],
            &[
                "mutual jurisdiction",
                "local courts",
                "mediation first",
                "negotiable venue",
            ],
        ),
    ]
}

/// Look up a clause spec by exact name.
pub fn find<'a>(clauses: &'a [ClauseSpec], name: &str) -> Option<&'a ClauseSpec> {
    clauses.iter().find(|c| c.name == name)
}
