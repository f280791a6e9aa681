use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{EngineError, EngineResult};

/// Separator between the two drug names of a rule's interaction
pub const INTERACTION_DELIMITER: &str = " + ";

/// Mechanism reported when a rule does not carry one
pub const UNSPECIFIED_MECHANISM: &str = "Not specified";

/// Severity of a known interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        };
        f.write_str(label)
    }
}

/// A rule as curated, before it is embedded and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub interaction: String,
    pub risk_level: RiskLevel,
    pub patient_explanation: String,
    pub doctor_explanation: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
}

impl RuleDefinition {
    /// Check the structural invariants of a definition
    pub fn validate(&self) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::InvalidRule {
                id: self.id.clone(),
                reason: "id must not be blank".to_string(),
            });
        }
        split_interaction(&self.interaction)
            .map(|_| ())
            .ok_or_else(|| EngineError::InvalidRule {
                id: self.id.clone(),
                reason: format!(
                    "interaction '{}' does not split into two drug names on '{}'",
                    self.interaction, INTERACTION_DELIMITER
                ),
            })
    }

    /// Text the rule is embedded from
    pub fn embedding_text(&self) -> String {
        format!("{} - {}", self.interaction, self.patient_explanation)
    }
}

/// A loaded, immutable interaction rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    #[serde(flatten)]
    definition: RuleDefinition,
    #[serde(skip)]
    embedding: Vec<f32>,
}

impl Rule {
    pub(crate) fn new(definition: RuleDefinition, embedding: Vec<f32>) -> Self {
        Self { definition, embedding }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn interaction(&self) -> &str {
        &self.definition.interaction
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.definition.risk_level
    }

    pub fn patient_explanation(&self) -> &str {
        &self.definition.patient_explanation
    }

    pub fn doctor_explanation(&self) -> &str {
        &self.definition.doctor_explanation
    }

    pub fn source(&self) -> &str {
        &self.definition.source
    }

    pub fn mechanism(&self) -> &str {
        self.definition
            .mechanism
            .as_deref()
            .unwrap_or(UNSPECIFIED_MECHANISM)
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// The two drug-name segments of the interaction, in stored order
    pub fn drug_pair(&self) -> Option<(&str, &str)> {
        split_interaction(&self.definition.interaction)
    }

    pub fn definition(&self) -> &RuleDefinition {
        &self.definition
    }
}

/// Split `"DrugA + DrugB"` into its two non-empty segments
pub fn split_interaction(interaction: &str) -> Option<(&str, &str)> {
    let mut parts = interaction.split(INTERACTION_DELIMITER);
    let first = parts.next()?;
    let second = parts.next()?;
    if parts.next().is_some() || first.trim().is_empty() || second.trim().is_empty() {
        return None;
    }
    Some((first, second))
}

/// The curated catalogue used when no rule file is configured
pub fn default_rules() -> Vec<RuleDefinition> {
    vec![
        RuleDefinition {
            id: "rule_001".to_string(),
            interaction: "Aspirin + Warfarin".to_string(),
            risk_level: RiskLevel::High,
            patient_explanation: "Taking aspirin with warfarin can increase your risk of bleeding. This combination can make it harder for your blood to clot, which could lead to serious bleeding problems.".to_string(),
            doctor_explanation: "Concurrent use of aspirin and warfarin significantly increases bleeding risk due to additive antiplatelet and anticoagulant effects. Monitor INR closely and consider alternative analgesics. Risk of major hemorrhage increases 2-3 fold.".to_string(),
            source: "FDA Drug Interaction Database - Anticoagulant Guidelines 2025".to_string(),
            mechanism: Some("Synergistic inhibition of platelet aggregation and coagulation cascade".to_string()),
        },
        RuleDefinition {
            id: "rule_002".to_string(),
            interaction: "Ibuprofen + Aspirin".to_string(),
            risk_level: RiskLevel::Moderate,
            patient_explanation: "Taking ibuprofen with aspirin may reduce the heart-protective effects of aspirin and can increase the risk of stomach problems like ulcers or bleeding.".to_string(),
            doctor_explanation: "Ibuprofen can interfere with aspirin's irreversible platelet inhibition, potentially reducing cardioprotective benefits. Additionally, dual NSAID therapy increases GI bleeding risk and may exacerbate renal dysfunction.".to_string(),
            source: "American Heart Association - NSAID Interaction Guidelines".to_string(),
            mechanism: Some("Competitive inhibition of COX-1 enzyme binding site".to_string()),
        },
        RuleDefinition {
            id: "rule_003".to_string(),
            interaction: "Metformin + Alcohol".to_string(),
            risk_level: RiskLevel::Moderate,
            patient_explanation: "Drinking alcohol while taking metformin can increase the risk of a serious condition called lactic acidosis, which can cause weakness, trouble breathing, and irregular heartbeat.".to_string(),
            doctor_explanation: "Alcohol consumption with metformin increases risk of lactic acidosis, particularly in patients with renal impairment. Ethanol inhibits gluconeogenesis, potentially causing hypoglycemia. Advise patients to limit alcohol intake.".to_string(),
            source: "Endocrine Society - Diabetes Medication Safety 2025".to_string(),
            mechanism: Some("Impaired lactate clearance and hepatic gluconeogenesis inhibition".to_string()),
        },
        RuleDefinition {
            id: "rule_004".to_string(),
            interaction: "Lisinopril + Potassium Supplements".to_string(),
            risk_level: RiskLevel::High,
            patient_explanation: "Taking potassium supplements with lisinopril can cause dangerously high potassium levels in your blood, which can affect your heart rhythm and may be life-threatening.".to_string(),
            doctor_explanation: "ACE inhibitors like lisinopril reduce aldosterone secretion, leading to potassium retention. Concurrent potassium supplementation can cause severe hyperkalemia (K+ >6.0 mEq/L), risking cardiac arrhythmias. Monitor serum potassium regularly.".to_string(),
            source: "ACC/AHA Hypertension Guidelines - Drug Interactions".to_string(),
            mechanism: Some("Reduced renal potassium excretion via aldosterone suppression".to_string()),
        },
        RuleDefinition {
            id: "rule_005".to_string(),
            interaction: "Atorvastatin + Grapefruit Juice".to_string(),
            risk_level: RiskLevel::Moderate,
            patient_explanation: "Grapefruit juice can increase the amount of atorvastatin in your blood, which may increase the risk of side effects like muscle pain or liver problems.".to_string(),
            doctor_explanation: "Grapefruit juice inhibits CYP3A4 enzyme in the intestinal wall, increasing atorvastatin bioavailability by up to 260%. This elevates risk of myopathy and rhabdomyolysis. Advise patients to avoid grapefruit products or switch to pravastatin/rosuvastatin.".to_string(),
            source: "Clinical Pharmacology - Statin Interaction Database".to_string(),
            mechanism: Some("CYP3A4 inhibition leading to increased drug plasma concentrations".to_string()),
        },
    ]
}
