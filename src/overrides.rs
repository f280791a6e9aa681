use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::{EngineError, EngineResult};
use crate::persistence::{read_json, write_json};

pub const PENDING_REVIEW: &str = "Pending Review";
const UNKNOWN: &str = "Unknown";

/// A doctor's request to proceed despite a risk alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub doctor_id: String,
    #[serde(default)]
    pub doctor_name: Option<String>,
    pub patient_id: String,
    pub drug: String,
    #[serde(default)]
    pub risk_level: Option<String>,
    pub reason: String,
}

impl OverrideRequest {
    fn validate(&self) -> EngineResult<()> {
        let required = [
            ("doctor_id", &self.doctor_id),
            ("patient_id", &self.patient_id),
            ("drug", &self.drug),
            ("reason", &self.reason),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(EngineError::EmptyInput { field });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub doctor_id: String,
    pub doctor_name: String,
    pub patient_id: String,
    pub drug: String,
    pub risk_level: String,
    pub reason: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverridePage {
    pub overrides: Vec<OverrideEntry>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

/// Append-only log of risk-alert overrides
pub struct OverrideLog {
    entries: Arc<RwLock<Vec<OverrideEntry>>>,
    path: Option<PathBuf>,
}

impl OverrideLog {
    /// Log kept in memory only
    pub fn in_memory() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            path: None,
        }
    }

    /// Log persisted at `path`, resuming from its contents if it exists
    pub async fn open(path: PathBuf) -> EngineResult<Self> {
        let entries: Vec<OverrideEntry> = read_json(&path).await?.unwrap_or_default();
        info!("Override log opened at {} ({} entries)", path.display(), entries.len());

        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
            path: Some(path),
        })
    }

    pub async fn append(&self, request: OverrideRequest) -> EngineResult<OverrideEntry> {
        request.validate()?;

        let mut entries = self.entries.write().await;
        let entry = OverrideEntry {
            id: entries.len() as u64 + 1,
            timestamp: Utc::now(),
            doctor_id: request.doctor_id,
            doctor_name: request.doctor_name.unwrap_or_else(|| UNKNOWN.to_string()),
            patient_id: request.patient_id,
            drug: request.drug,
            risk_level: request.risk_level.unwrap_or_else(|| UNKNOWN.to_string()),
            reason: request.reason,
            status: PENDING_REVIEW.to_string(),
        };

        entries.push(entry.clone());
        if let Some(path) = &self.path {
            if let Err(e) = write_json(path, &*entries).await {
                entries.pop();
                return Err(e);
            }
        }

        info!(
            "Override {} logged by {} for patient {} ({})",
            entry.id, entry.doctor_id, entry.patient_id, entry.drug
        );
        Ok(entry)
    }

    /// One page of the log, oldest first. Pages are numbered from 1.
    pub async fn page(&self, page: usize, per_page: usize) -> EngineResult<OverridePage> {
        if page == 0 || per_page == 0 {
            return Err(EngineError::InvalidRequest(
                "page and per_page must be at least 1".to_string(),
            ));
        }

        let entries = self.entries.read().await;
        let total = entries.len();
        let overrides = entries
            .iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();

        Ok(OverridePage {
            overrides,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        })
    }

    /// The last `limit` entries, oldest first
    pub async fn recent(&self, limit: usize) -> Vec<OverrideEntry> {
        let entries = self.entries.read().await;
        let start = entries.len().saturating_sub(limit);
        entries[start..].to_vec()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
