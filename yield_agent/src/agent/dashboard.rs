//! Dashboard sink: keeps the latest recommendations for the dashboard's queries

use std::collections::VecDeque;

use candid::CandidType;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::{
    constants::DASHBOARD_HISTORY, selector::Allocation, state::DASHBOARD,
    utils::error::{ManagerError, ManagerResult},
};

/// Receipt of a broadcast rebalance suggestion
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq, Serialize)]
pub struct TransactionReceipt {
    /// Transaction hash, if the providers returned one
    pub tx_hash: Option<String>,
    pub nonce: u64,
    pub chain_id: u64,
}

/// What happened to the on-chain suggestion of a cycle
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq, Serialize)]
pub enum SubmissionOutcome {
    Submitted(TransactionReceipt),
    Failed(String),
}

/// Result of one cycle, as shown on the dashboard
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq, Serialize)]
pub struct Recommendation {
    pub cycle: u64,
    /// Seconds since the UNIX epoch
    pub timestamp: u64,
    pub rates: Vec<f64>,
    pub allocation: Allocation,
    /// Winning pools, best first
    pub ranked_winners: Vec<u64>,
    pub submission: SubmissionOutcome,
}

impl Recommendation {
    /// RFC 3339 rendering of `timestamp`
    pub fn published_at(&self) -> String {
        DateTime::from_timestamp(self.timestamp as i64, 0)
            .map(|date_time| date_time.to_rfc3339())
            .unwrap_or_default()
    }
}

/// Receives every recommendation. Publishing never fails from the cycle's perspective.
#[cfg_attr(test, mockall::automock)]
pub trait DashboardSink {
    fn publish(&mut self, recommendation: Recommendation);
}

/// Bounded history of recommendations, newest last
#[derive(Clone, Debug)]
pub struct DashboardBoard {
    history: VecDeque<Recommendation>,
    capacity: usize,
}

impl Default for DashboardBoard {
    fn default() -> Self {
        Self::with_capacity(DASHBOARD_HISTORY)
    }
}

impl DashboardBoard {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn latest(&self) -> Option<&Recommendation> {
        self.history.back()
    }

    /// Up to `depth` recommendations, newest first
    pub fn recent(&self, depth: usize) -> Vec<Recommendation> {
        self.history.iter().rev().take(depth).cloned().collect()
    }

    /// JSON document served to the dashboard frontend
    pub fn to_json(&self, depth: usize) -> ManagerResult<String> {
        let documents: Vec<serde_json::Value> = self
            .recent(depth)
            .into_iter()
            .map(|recommendation| {
                serde_json::json!({
                    "cycle": recommendation.cycle,
                    "published_at": recommendation.published_at(),
                    "rates": recommendation.rates,
                    "allocation": recommendation.allocation.as_slice(),
                    "ranked_winners": recommendation.ranked_winners,
                    "submission": recommendation.submission,
                })
            })
            .collect();

        serde_json::to_string(&documents)
            .map_err(|err| ManagerError::DecodingError(err.to_string()))
    }
}

impl DashboardSink for DashboardBoard {
    fn publish(&mut self, recommendation: Recommendation) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(recommendation);
    }
}

/// Dashboard backed by the canister state
pub struct StateDashboard;

impl DashboardSink for StateDashboard {
    fn publish(&mut self, recommendation: Recommendation) {
        DASHBOARD.with(|board| board.borrow_mut().publish(recommendation));
    }
}
