use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub status: MedicationStatus,
    pub start_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub abha_id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub medications: Vec<MedicationEntry>,
}

impl PatientRecord {
    /// Names of medications the patient is currently taking
    pub fn active_medications(&self) -> Vec<String> {
        self.medications
            .iter()
            .filter(|m| m.status == MedicationStatus::Active)
            .map(|m| m.name.clone())
            .collect()
    }
}

/// Source of patient demographics and medication history
pub trait PatientDirectory: Send + Sync {
    fn find(&self, abha_id: &str) -> EngineResult<PatientRecord>;
}

/// Fixed set of sample patients standing in for a health-records provider
pub struct MockPatientDirectory {
    patients: HashMap<String, PatientRecord>,
}

impl MockPatientDirectory {
    pub fn new(records: Vec<PatientRecord>) -> Self {
        Self {
            patients: records
                .into_iter()
                .map(|record| (record.abha_id.clone(), record))
                .collect(),
        }
    }

    pub fn with_sample_patients() -> Self {
        Self::new(vec![
            PatientRecord {
                abha_id: "ABHA001".to_string(),
                name: "Rajesh Kumar".to_string(),
                age: 58,
                gender: "male".to_string(),
                medications: vec![
                    medication("Warfarin", "5mg", "Once daily", MedicationStatus::Active, "2025-06-15"),
                    medication("Metformin", "500mg", "Twice daily", MedicationStatus::Active, "2025-01-10"),
                ],
            },
            PatientRecord {
                abha_id: "ABHA002".to_string(),
                name: "Priya Sharma".to_string(),
                age: 42,
                gender: "female".to_string(),
                medications: vec![
                    medication("Lisinopril", "10mg", "Once daily", MedicationStatus::Active, "2025-03-20"),
                    medication("Atorvastatin", "20mg", "Once daily at night", MedicationStatus::Active, "2025-03-20"),
                ],
            },
            PatientRecord {
                abha_id: "ABHA003".to_string(),
                name: "Mohammed Ali".to_string(),
                age: 35,
                gender: "male".to_string(),
                medications: vec![
                    medication("Ibuprofen", "400mg", "As needed", MedicationStatus::Completed, "2025-12-01"),
                ],
            },
        ])
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}

impl PatientDirectory for MockPatientDirectory {
    fn find(&self, abha_id: &str) -> EngineResult<PatientRecord> {
        if abha_id.trim().is_empty() {
            return Err(EngineError::EmptyInput { field: "abha_id" });
        }
        self.patients
            .get(abha_id)
            .cloned()
            .ok_or_else(|| EngineError::PatientNotFound(abha_id.to_string()))
    }
}

fn medication(
    name: &str,
    dosage: &str,
    frequency: &str,
    status: MedicationStatus,
    start_date: &str,
) -> MedicationEntry {
    MedicationEntry {
        name: name.to_string(),
        dosage: dosage.to_string(),
        frequency: frequency.to_string(),
        status,
        start_date: start_date.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_patients() {
        let directory = MockPatientDirectory::with_sample_patients();
        assert_eq!(directory.len(), 3);

        let patient = directory.find("ABHA001").unwrap();
        assert_eq!(patient.name, "Rajesh Kumar");
        assert_eq!(patient.active_medications(), vec!["Warfarin", "Metformin"]);
    }

    #[test]
    fn test_completed_medications_are_not_active() {
        let directory = MockPatientDirectory::with_sample_patients();
        let patient = directory.find("ABHA003").unwrap();
        assert_eq!(patient.medications.len(), 1);
        assert!(patient.active_medications().is_empty());
    }

    #[test]
    fn test_unknown_patient() {
        let directory = MockPatientDirectory::with_sample_patients();
        assert_eq!(
            directory.find("ABHA999"),
            Err(EngineError::PatientNotFound("ABHA999".to_string()))
        );
        assert_eq!(
            directory.find(""),
            Err(EngineError::EmptyInput { field: "abha_id" })
        );
    }
}
