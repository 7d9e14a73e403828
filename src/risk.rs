//! Risk rating for extracted clauses.
//!
//! The oracle's verdict is taken as-is unless it says MEDIUM, in which case
//! an imbalance between high- and low-risk keyword hits moves the rating up
//! or down. Equal counts leave MEDIUM alone.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::llm::Completer;
use crate::models::{Redline, RiskRating};
use crate::taxonomy::ClauseSpec;

/// Explanation used when the oracle reply carries no `RISK_LEVEL:` line.
pub const UNDETERMINED_EXPLANATION: &str = "Unable to determine risk level.";

const RISK_LEVEL_PREFIX: &str = "RISK_LEVEL:";
const EXPLANATION_PREFIX: &str = "EXPLANATION:";
const REVISION_MARKER: &str = "SUGGESTED REVISION:";
const RATIONALE_MARKER: &str = "RATIONALE:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub rating: RiskRating,
    pub explanation: String,
}

/// Case-insensitive keyword hits in a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeywordCounts {
    pub high: usize,
    pub low: usize,
}

pub struct RiskClassifier<'a> {
    oracle: &'a dyn Completer,
}

impl<'a> RiskClassifier<'a> {
    #[must_use]
    pub fn new(oracle: &'a dyn Completer) -> Self {
        Self { oracle }
    }

    /// Rate `clause_text` as an instance of `spec`.
    ///
    /// A failed oracle call is treated like a reply without a risk level.
    #[must_use]
    pub fn classify(&self, clause_text: &str, spec: &ClauseSpec) -> RiskAssessment {
        let counts = count_keywords(clause_text, spec);

        let response = match self.oracle.complete(&risk_prompt(&spec.name, clause_text)) {
            Ok(text) => text,
            Err(e) => {
                warn!("{}: risk oracle failed: {e}", spec.name);
                String::new()
            }
        };
        let reported = parse_risk_response(&response);
        let rating = apply_tie_break(reported.rating, counts);

        if rating != reported.rating {
            info!(
                "{}: keyword evidence (high {}, low {}) moved {} to {}",
                spec.name, counts.high, counts.low, reported.rating, rating
            );
        } else {
            debug!("{}: rated {rating}", spec.name);
        }

        RiskAssessment {
            rating,
            explanation: reported.explanation,
        }
    }

    /// Ask for a more balanced rewrite of a high-risk clause.
    pub fn suggest_redline(&self, clause_type: &str, clause_text: &str) -> Result<Redline> {
        let response = self.oracle.complete(&redline_prompt(clause_type, clause_text))?;
        Ok(parse_redline(&response))
    }
}

fn count_occurrences(haystack: &str, keywords: &[String]) -> usize {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .map(|k| haystack.matches(k.as_str()).count())
        .sum()
}

#[must_use]
pub fn count_keywords(clause_text: &str, spec: &ClauseSpec) -> KeywordCounts {
    let lowered = clause_text.to_lowercase();
    KeywordCounts {
        high: count_occurrences(&lowered, &spec.high_risk_keywords),
        low: count_occurrences(&lowered, &spec.low_risk_keywords),
    }
}

/// Keywords only ever resolve a MEDIUM verdict.
#[must_use]
pub fn apply_tie_break(reported: RiskRating, counts: KeywordCounts) -> RiskRating {
    if reported != RiskRating::Medium {
        return reported;
    }
    match counts.high.cmp(&counts.low) {
        std::cmp::Ordering::Greater => RiskRating::High,
        std::cmp::Ordering::Less => RiskRating::Low,
        std::cmp::Ordering::Equal => RiskRating::Medium,
    }
}

fn strip_decoration(line: &str) -> &str {
    line.trim().trim_start_matches(['*', '#', '-', ' '])
}

fn parse_level(value: &str) -> RiskRating {
    let value = value
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | '*' | '"' | '.'))
        .to_ascii_uppercase();
    if value.starts_with("HIGH") {
        RiskRating::High
    } else if value.starts_with("LOW") {
        RiskRating::Low
    } else {
        RiskRating::Medium
    }
}

/// Read the `RISK_LEVEL:` and `EXPLANATION:` lines of an oracle reply.
///
/// No `RISK_LEVEL:` line at all gives MEDIUM with
/// [`UNDETERMINED_EXPLANATION`]; an unrecognised level reads as MEDIUM.
#[must_use]
pub fn parse_risk_response(response: &str) -> RiskAssessment {
    let mut rating = None;
    let mut explanation = None;

    for line in response.lines().map(strip_decoration) {
        if let Some(rest) = line.strip_prefix(RISK_LEVEL_PREFIX) {
            rating.get_or_insert_with(|| parse_level(rest));
        } else if let Some(rest) = line.strip_prefix(EXPLANATION_PREFIX) {
            let rest = rest.trim().trim_start_matches('*').trim();
            if !rest.is_empty() && explanation.is_none() {
                explanation = Some(rest.to_string());
            }
        }
    }

    match rating {
        Some(rating) => RiskAssessment {
            rating,
            explanation: explanation.unwrap_or_else(|| UNDETERMINED_EXPLANATION.to_string()),
        },
        None => RiskAssessment {
            rating: RiskRating::Medium,
            explanation: UNDETERMINED_EXPLANATION.to_string(),
        },
    }
}

/// Split a redline reply into revision and rationale. Without markers the
/// whole reply is the revision.
#[must_use]
pub fn parse_redline(response: &str) -> Redline {
    let response = response.trim();
    let Some(rev_at) = response.find(REVISION_MARKER) else {
        return Redline {
            revision: response.to_string(),
            rationale: String::new(),
        };
    };

    let after = &response[rev_at + REVISION_MARKER.len()..];
    match after.find(RATIONALE_MARKER) {
        Some(rat_at) => Redline {
            revision: after[..rat_at].trim().to_string(),
            rationale: after[rat_at + RATIONALE_MARKER.len()..].trim().to_string(),
        },
        None => Redline {
            revision: after.trim().to_string(),
            rationale: String::new(),
        },
    }
}

fn risk_prompt(clause_type: &str, content: &str) -> String {
    format!(
        "You are a legal risk assessment expert. Analyze the following {clause_type} clause and determine if it is vendor-friendly or customer-friendly.\n\n\
         Clause Content:\n{content}\n\n\
         Assess the risk level as:\n\
         - HIGH: Very unfavorable terms, one-sided obligations, severe restrictions, or lack of protections\n\
         - MEDIUM: Somewhat unbalanced terms, moderate restrictions, or unclear provisions\n\
         - LOW: Balanced terms, reasonable restrictions, mutual obligations, or favorable protections\n\n\
         Consider:\n\
         1. Balance of obligations between parties\n\
         2. Severity of restrictions or penalties\n\
         3. Flexibility and termination rights\n\
         4. Protection of interests\n\n\
         Respond in this exact format:\n\
         {RISK_LEVEL_PREFIX} [HIGH/MEDIUM/LOW]\n\
         {EXPLANATION_PREFIX} [2-3 sentences explaining why]"
    )
}

fn redline_prompt(clause_type: &str, content: &str) -> String {
    format!(
        "You are a legal contract negotiation expert. The following {clause_type} clause has been identified as HIGH RISK.\n\n\
         Original Clause:\n{content}\n\n\
         Suggest a more balanced alternative version of this clause that:\n\
         1. Maintains the core intent\n\
         2. Provides better protection for both parties\n\
         3. Reduces one-sided obligations\n\
         4. Adds reasonable limitations or safeguards\n\n\
         Provide your suggestion in this format:\n\
         {REVISION_MARKER}\n[Your revised clause text]\n\n\
         {RATIONALE_MARKER}\n[Brief explanation of changes]"
    )
}
