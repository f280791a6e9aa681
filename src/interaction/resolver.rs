use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use super::index::Retriever;
use super::rules::{RiskLevel, Rule, INTERACTION_DELIMITER};
use super::validator::Validator;
use crate::errors::{EngineError, EngineResult};

/// Confidence reported with every Safe result
pub const SAFE_CONFIDENCE: f64 = 0.85;

/// Confidence reported with every Risky result
pub const RISKY_CONFIDENCE: f64 = 0.92;

/// Source cited when no interaction is found
pub const SAFE_SOURCE: &str = "PrismCare AI Analysis - Medical Guidelines Database 2025";

/// Retrieval proposes a single candidate per current medication. If it fails
/// validation the medication counts as non-interacting; the second-best
/// candidate is never consulted.
const CANDIDATES_PER_MEDICATION: usize = 1;

/// One confirmed interaction as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionMatch {
    pub drugs: String,
    pub severity: RiskLevel,
}

/// Outcome of checking a new medicine against a medication history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum AnalysisResult {
    Safe {
        patient_explanation: String,
        doctor_explanation: String,
        source: String,
        confidence: f64,
        interactions: Vec<InteractionMatch>,
    },
    Risky {
        risk_level: RiskLevel,
        patient_explanation: String,
        doctor_explanation: String,
        source: String,
        mechanism: String,
        confidence: f64,
        interactions: Vec<InteractionMatch>,
    },
}

impl AnalysisResult {
    fn safe(new_medicine: &str) -> Self {
        AnalysisResult::Safe {
            patient_explanation: format!(
                "{} appears to be safe to take with your current medications. No known interactions were found.",
                new_medicine
            ),
            doctor_explanation: format!(
                "No significant drug-drug interactions detected between {} and current medication regimen based on available guidelines.",
                new_medicine
            ),
            source: SAFE_SOURCE.to_string(),
            confidence: SAFE_CONFIDENCE,
            interactions: Vec::new(),
        }
    }

    fn risky(selected: &Rule, confirmed: &[Arc<Rule>]) -> Self {
        AnalysisResult::Risky {
            risk_level: selected.risk_level(),
            patient_explanation: selected.patient_explanation().to_string(),
            doctor_explanation: selected.doctor_explanation().to_string(),
            source: selected.source().to_string(),
            mechanism: selected.mechanism().to_string(),
            confidence: RISKY_CONFIDENCE,
            interactions: confirmed
                .iter()
                .map(|rule| InteractionMatch {
                    drugs: rule.interaction().to_string(),
                    severity: rule.risk_level(),
                })
                .collect(),
        }
    }

    pub fn is_risky(&self) -> bool {
        matches!(self, AnalysisResult::Risky { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            AnalysisResult::Safe { .. } => "Safe",
            AnalysisResult::Risky { .. } => "Risky",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            AnalysisResult::Safe { confidence, .. } | AnalysisResult::Risky { confidence, .. } => {
                *confidence
            }
        }
    }

    pub fn risk_level(&self) -> Option<RiskLevel> {
        match self {
            AnalysisResult::Safe { .. } => None,
            AnalysisResult::Risky { risk_level, .. } => Some(*risk_level),
        }
    }

    pub fn interactions(&self) -> &[InteractionMatch] {
        match self {
            AnalysisResult::Safe { interactions, .. }
            | AnalysisResult::Risky { interactions, .. } => interactions,
        }
    }
}

/// Aggregates validated matches across a medication history and applies
/// the severity policy
#[derive(Debug, Clone, Default)]
pub struct ResultResolver<V> {
    validator: V,
}

impl<V: Validator> ResultResolver<V> {
    pub fn new(validator: V) -> Self {
        Self { validator }
    }

    /// Check `new_medicine` against each entry of `history`.
    ///
    /// Every entry goes through retrieval and validation, blank ones included;
    /// an empty name is contained in every segment. The selected rule is the
    /// first High-risk confirmation in history order, or the first confirmation if
    /// none is High; every confirmation is listed in `interactions`.
    pub fn resolve(
        &self,
        retriever: &dyn Retriever,
        history: &[String],
        new_medicine: &str,
    ) -> EngineResult<AnalysisResult> {
        let mut confirmed: Vec<Arc<Rule>> = Vec::new();

        for current in history {
            let query = format!("{}{}{}", current, INTERACTION_DELIMITER, new_medicine);
            let candidates = retriever
                .query(&query, CANDIDATES_PER_MEDICATION)
                .map_err(|e| analysis_failure(format!("retrieving candidates for '{}'", query), e))?;

            let Some(best) = candidates.into_iter().next() else {
                continue;
            };

            if self.validator.validate(&best.rule, current, new_medicine) {
                debug!(
                    "Confirmed '{}' ({}) for {} + {}",
                    best.rule.interaction(),
                    best.rule.risk_level(),
                    current,
                    new_medicine
                );
                confirmed.push(best.rule);
            } else {
                debug!(
                    "Rejected candidate '{}' (score {:.3}) for {} + {}",
                    best.rule.interaction(),
                    best.score,
                    current,
                    new_medicine
                );
            }
        }

        let selected = confirmed
            .iter()
            .find(|rule| rule.risk_level() == RiskLevel::High)
            .or_else(|| confirmed.first());

        Ok(match selected {
            Some(rule) => AnalysisResult::risky(rule, &confirmed),
            None => AnalysisResult::safe(new_medicine),
        })
    }
}

/// Wrap `cause` as an internal analysis error and log it with `context`
pub(crate) fn analysis_failure(context: String, cause: EngineError) -> EngineError {
    let failure = match cause {
        failure @ EngineError::InternalAnalysis { .. } => failure,
        other => EngineError::InternalAnalysis {
            context,
            message: other.to_string(),
        },
    };
    error!("Interaction analysis failed: {}", failure);
    failure
}
