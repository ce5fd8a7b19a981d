use anyhow::{Context, Result};
use serde::Serialize;

/// Outcome of measuring a mirror against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCheck {
    Fits { bytes: usize },
    Exceeded { bytes: usize, limit: usize },
}

/// Size limit for the locally persisted roster and leaderboard mirrors.
/// Those hold avatar data URIs, so a large lobby can outgrow the quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageBudget {
    limit: usize,
}

impl StorageBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn check<T: Serialize + ?Sized>(&self, value: &T) -> Result<BudgetCheck> {
        let bytes = serde_json::to_vec(value)
            .context("measure session mirror")?
            .len();
        if bytes > self.limit {
            Ok(BudgetCheck::Exceeded {
                bytes,
                limit: self.limit,
            })
        } else {
            Ok(BudgetCheck::Fits { bytes })
        }
    }
}
