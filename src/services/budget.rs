// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared daily call budget and per-cycle call pacing.
//!
//! The budget is an explicit value threaded through a batch. Calls are
//! written back as increments, so several writers share one counter
//! without losing each other's calls. Its daily reset happens elsewhere.

use std::time::Duration;

use tokio::time::Instant;

use crate::db::RecordStore;
use crate::error::{AppError, Result};

pub const DEFAULT_DAILY_CAP: u64 = 25_000;

/// Remote calls consumed against a daily cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetTracker {
    consumed: u64,
    cap: u64,
    /// Calls recorded but not yet added to the stored counter
    unsaved: u64,
    /// Calls recorded by this tracker
    issued: u64,
}

impl BudgetTracker {
    pub fn new(consumed: u64, cap: u64) -> Self {
        Self {
            consumed,
            cap,
            unsaved: 0,
            issued: 0,
        }
    }

    /// Read the persisted counter.
    pub async fn load(store: &dyn RecordStore, cap: u64) -> Result<Self> {
        let budget = store.get_budget().await?;
        Ok(Self::new(budget.consumed, cap))
    }

    /// Add unsaved calls to the stored counter and adopt its new value,
    /// which includes calls made by other writers in the meantime.
    pub async fn persist(&mut self, store: &dyn RecordStore) -> Result<()> {
        if self.unsaved == 0 {
            return Ok(());
        }
        let stored = store.add_budget_calls(self.unsaved).await?;
        self.unsaved = 0;
        self.consumed = stored.consumed;
        Ok(())
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn record_call(&mut self) {
        self.consumed += 1;
        self.unsaved += 1;
        self.issued += 1;
    }

    pub fn remaining(&self) -> u64 {
        self.cap.saturating_sub(self.consumed)
    }

    /// Already past the cap. Halts a batch before any work starts.
    pub fn is_exceeded(&self) -> bool {
        self.consumed > self.cap
    }

    /// Error unless one more call fits under the cap.
    pub fn ensure_capacity(&self) -> Result<()> {
        if self.remaining() == 0 {
            return Err(AppError::BudgetExceeded {
                consumed: self.consumed,
                cap: self.cap,
            });
        }
        Ok(())
    }
}

/// Minimum spacing between consecutive detail fetches.
#[derive(Debug)]
pub struct CallPacer {
    interval: Duration,
    last_call: Option<Instant>,
}

impl CallPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: None,
        }
    }

    /// Sleep out the rest of the interval since the previous call, then
    /// mark a new call as started. The first call never waits.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}
