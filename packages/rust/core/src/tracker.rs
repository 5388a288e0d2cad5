//! Post-slate tracking: the in-memory performance log and dashboard summary.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::compare::{Comparison, PlayerError};
use crate::learner::{CURRENT_WEIGHTS, Weights};

/// Misses kept per record.
const MISSES_PER_RECORD: usize = 3;
/// Records shown on the dashboard.
const DASHBOARD_RECENT: usize = 10;
/// Misses shown on the dashboard.
const DASHBOARD_TOP_MISSES: usize = 5;

/// One tracked slate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRecord {
    pub optimizer_job_id: String,
    pub slate_date: Option<String>,
    pub mae: f64,
    pub mse: f64,
    pub accuracy_rate: f64,
    pub matched_players: usize,
    pub projected_total: f64,
    pub actual_total: f64,
    pub biggest_misses: Vec<PlayerError>,
    pub recorded_at: DateTime<Utc>,
}

impl PerformanceRecord {
    pub fn from_comparison(
        optimizer_job_id: impl Into<String>,
        slate_date: Option<String>,
        comparison: &Comparison,
    ) -> Self {
        Self {
            optimizer_job_id: optimizer_job_id.into(),
            slate_date,
            mae: comparison.mae,
            mse: comparison.mse,
            accuracy_rate: comparison.accuracy_rate,
            matched_players: comparison.matched,
            projected_total: comparison.projected_total,
            actual_total: comparison.actual_total,
            biggest_misses: comparison.biggest_misses(MISSES_PER_RECORD).to_vec(),
            recorded_at: Utc::now(),
        }
    }
}

/// Bounded, process-lifetime log of tracked slates. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PerformanceLog {
    capacity: usize,
    records: Arc<RwLock<VecDeque<PerformanceRecord>>>,
}

impl PerformanceLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Append a record, evicting the oldest when full.
    pub async fn record(&self, record: PerformanceRecord) {
        let mut records = self.records.write().await;
        while records.len() >= self.capacity {
            records.pop_front();
        }
        debug!(job_id = %record.optimizer_job_id, mae = record.mae, "recording slate performance");
        records.push_back(record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Aggregate the log for the dashboard.
    #[instrument(skip(self))]
    pub async fn summary(&self) -> DashboardSummary {
        let records = self.records.read().await;
        let total = records.len();

        let mean = |f: fn(&PerformanceRecord) -> f64| {
            if total == 0 {
                0.0
            } else {
                records.iter().map(f).sum::<f64>() / total as f64
            }
        };

        let mut top_misses: Vec<TrackedMiss> = records
            .iter()
            .flat_map(|r| {
                r.biggest_misses.iter().map(|m| TrackedMiss {
                    optimizer_job_id: r.optimizer_job_id.clone(),
                    slate_date: r.slate_date.clone(),
                    miss: m.clone(),
                })
            })
            .collect();
        top_misses.sort_by(|a, b| b.miss.abs_error.total_cmp(&a.miss.abs_error));
        top_misses.truncate(DASHBOARD_TOP_MISSES);

        info!(total_slates = total, "dashboard summary computed");

        DashboardSummary {
            ok: true,
            avg_mae: mean(|r| r.mae),
            accuracy_rate: mean(|r| r.accuracy_rate),
            total_slates: total,
            last_updated: Utc::now(),
            performance: records.iter().rev().take(DASHBOARD_RECENT).cloned().collect(),
            top_misses,
            current_weights: CURRENT_WEIGHTS,
        }
    }
}

/// A player miss tagged with the slate it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedMiss {
    pub optimizer_job_id: String,
    pub slate_date: Option<String>,
    #[serde(flatten)]
    pub miss: PlayerError,
}

/// Body of a `dashboard` response.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub ok: bool,
    pub avg_mae: f64,
    pub accuracy_rate: f64,
    pub total_slates: usize,
    pub last_updated: DateTime<Utc>,
    /// Most recent first.
    pub performance: Vec<PerformanceRecord>,
    pub top_misses: Vec<TrackedMiss>,
    pub current_weights: Weights,
}

/// Body of a `tracker` response.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerResponse {
    pub ok: bool,
    pub message: String,
    pub optimizer_job_id: String,
    pub slate_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
}
