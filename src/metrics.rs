use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::EngineResult;
use crate::overrides::OverrideEntry;
use crate::persistence::{read_json, write_json};

/// Running totals of validations and overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationCounters {
    pub total_validations: u64,
    pub risky_detections: u64,
    pub safe_validations: u64,
    pub total_overrides: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub counters: ValidationCounters,
    pub risk_percentage: f64,
    pub override_rate: f64,
    pub recent_overrides: Vec<OverrideEntry>,
    pub last_updated: DateTime<Utc>,
}

pub struct StatsCollector {
    counters: Arc<RwLock<ValidationCounters>>,
    path: Option<PathBuf>,
}

impl StatsCollector {
    pub fn in_memory() -> Self {
        Self {
            counters: Arc::new(RwLock::new(ValidationCounters::default())),
            path: None,
        }
    }

    /// Collector persisted at `path`, resuming from its contents if it exists
    pub async fn open(path: PathBuf) -> EngineResult<Self> {
        let counters: ValidationCounters = read_json(&path).await?.unwrap_or_default();
        info!(
            "Statistics opened at {} ({} validations so far)",
            path.display(),
            counters.total_validations
        );

        Ok(Self {
            counters: Arc::new(RwLock::new(counters)),
            path: Some(path),
        })
    }

    pub async fn record_validation(&self, is_risky: bool) -> EngineResult<()> {
        let mut counters = self.counters.write().await;
        counters.total_validations += 1;
        if is_risky {
            counters.risky_detections += 1;
        } else {
            counters.safe_validations += 1;
        }

        debug!(
            "Validation recorded (risky: {}, total: {})",
            is_risky, counters.total_validations
        );
        self.persist(&counters).await
    }

    pub async fn record_override(&self) -> EngineResult<()> {
        let mut counters = self.counters.write().await;
        counters.total_overrides += 1;
        self.persist(&counters).await
    }

    pub async fn counters(&self) -> ValidationCounters {
        self.counters.read().await.clone()
    }

    pub async fn report(&self, recent_overrides: Vec<OverrideEntry>) -> StatsReport {
        let counters = self.counters().await;

        let risk_percentage = percentage(counters.risky_detections, counters.total_validations);
        let override_rate = percentage(counters.total_overrides, counters.risky_detections);

        StatsReport {
            counters,
            risk_percentage,
            override_rate,
            recent_overrides,
            last_updated: Utc::now(),
        }
    }

    async fn persist(&self, counters: &ValidationCounters) -> EngineResult<()> {
        match &self.path {
            Some(path) => write_json(path, counters).await,
            None => Ok(()),
        }
    }
}

/// `part / whole` as a percentage rounded to 2 decimals; 0 when `whole` is 0
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let value = part as f64 / whole as f64 * 100.0;
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(4, 4), 100.0);
    }

    #[tokio::test]
    async fn test_counts_validations() {
        let stats = StatsCollector::in_memory();
        stats.record_validation(true).await.unwrap();
        stats.record_validation(false).await.unwrap();
        stats.record_validation(false).await.unwrap();

        let counters = stats.counters().await;
        assert_eq!(counters.total_validations, 3);
        assert_eq!(counters.risky_detections, 1);
        assert_eq!(counters.safe_validations, 2);
    }

    #[tokio::test]
    async fn test_report_rates() {
        let stats = StatsCollector::in_memory();
        for risky in [true, true, false, false] {
            stats.record_validation(risky).await.unwrap();
        }
        stats.record_override().await.unwrap();

        let report = stats.report(Vec::new()).await;
        assert_eq!(report.risk_percentage, 50.0);
        assert_eq!(report.override_rate, 50.0);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["total_validations"], 4);
        assert_eq!(value["total_overrides"], 1);
    }

    #[tokio::test]
    async fn test_override_leaves_validation_counters_alone() {
        let stats = StatsCollector::in_memory();
        stats.record_validation(true).await.unwrap();
        stats.record_override().await.unwrap();
        stats.record_override().await.unwrap();

        let counters = stats.counters().await;
        assert_eq!(counters.total_validations, 1);
        assert_eq!(counters.risky_detections, 1);
        assert_eq!(counters.total_overrides, 2);
        assert_eq!(stats.report(Vec::new()).await.override_rate, 200.0);
    }

    #[tokio::test]
    async fn test_empty_report_has_zero_rates() {
        let report = StatsCollector::in_memory().report(Vec::new()).await;
        assert_eq!(report.risk_percentage, 0.0);
        assert_eq!(report.override_rate, 0.0);
    }

    #[tokio::test]
    async fn test_counters_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        {
            let stats = StatsCollector::open(path.clone()).await.unwrap();
            stats.record_validation(true).await.unwrap();
            stats.record_override().await.unwrap();
        }

        let reopened = StatsCollector::open(path).await.unwrap();
        let counters = reopened.counters().await;
        assert_eq!(counters.total_validations, 1);
        assert_eq!(counters.total_overrides, 1);
    }
}
