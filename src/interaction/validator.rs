use super::rules::Rule;

/// Confirms or rejects a retrieved rule against the actual drug pair
pub trait Validator: Send + Sync {
    fn validate(&self, candidate: &Rule, current_drug: &str, new_drug: &str) -> bool;
}

/// Case-insensitive, direction-agnostic substring matching.
///
/// A pair matches when each drug name is contained in a different segment of
/// the rule's interaction. Containment rather than equality means a short
/// name can match inside a longer unrelated one ("pirin" inside "aspirin");
/// swap this validator out for exact tokenized matching if that matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringValidator;

impl Validator for SubstringValidator {
    fn validate(&self, candidate: &Rule, current_drug: &str, new_drug: &str) -> bool {
        let Some((first, second)) = candidate.drug_pair() else {
            return false;
        };

        let first = first.to_lowercase();
        let second = second.to_lowercase();
        let current = current_drug.to_lowercase();
        let new = new_drug.to_lowercase();

        (first.contains(&current) && second.contains(&new))
            || (first.contains(&new) && second.contains(&current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::rules::{RiskLevel, RuleDefinition};

    fn rule(interaction: &str) -> Rule {
        Rule::new(
            RuleDefinition {
                id: "test".to_string(),
                interaction: interaction.to_string(),
                risk_level: RiskLevel::High,
                patient_explanation: String::new(),
                doctor_explanation: String::new(),
                source: String::new(),
                mechanism: None,
            },
            Vec::new(),
        )
    }

    #[test]
    fn test_matches_in_both_directions() {
        let candidate = rule("Aspirin + Warfarin");
        assert!(SubstringValidator.validate(&candidate, "Warfarin", "Aspirin"));
        assert!(SubstringValidator.validate(&candidate, "Aspirin", "Warfarin"));
    }

    #[test]
    fn test_matching_ignores_case() {
        let candidate = rule("Aspirin + Warfarin");
        assert!(SubstringValidator.validate(&candidate, "WARFARIN", "aspirin"));
    }

    #[test]
    fn test_rejects_pair_not_in_rule() {
        let candidate = rule("Aspirin + Warfarin");
        assert!(!SubstringValidator.validate(&candidate, "Metformin", "Aspirin"));
        assert!(!SubstringValidator.validate(&candidate, "Warfarin", "Lisinopril"));
    }

    #[test]
    fn test_both_drugs_must_hit_different_segments() {
        let candidate = rule("Aspirin + Warfarin");
        assert!(!SubstringValidator.validate(&candidate, "Aspirin", "Aspirin"));
    }

    #[test]
    fn test_substring_names_match() {
        // Current behavior: containment, not equality
        let candidate = rule("Lisinopril + Potassium Supplements");
        assert!(SubstringValidator.validate(&candidate, "Potassium", "Lisinopril"));

        let candidate = rule("Aspirin + Warfarin");
        assert!(SubstringValidator.validate(&candidate, "pirin", "Warfarin"));
    }

    #[test]
    fn test_longer_name_does_not_match_shorter_segment() {
        let candidate = rule("Aspirin + Warfarin");
        assert!(!SubstringValidator.validate(&candidate, "Aspirin Low Dose", "Warfarin"));
    }

    #[test]
    fn test_malformed_interaction_never_matches() {
        let candidate = rule("Aspirin and Warfarin");
        assert!(!SubstringValidator.validate(&candidate, "Aspirin", "Warfarin"));
    }
}
