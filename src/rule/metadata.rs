//! Per-evaluation metadata.

use crate::Bindings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Trace of one rule evaluation: the input snapshot and its timing.
///
/// The input is a copy taken when the evaluation call started, so later
/// changes to the caller's map never show up here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Input variables the rule was evaluated against
    pub input_variables: Arc<Bindings>,
    /// When evaluation of the rule started
    pub start_time: DateTime<Utc>,
    /// When evaluation of the rule finished
    pub end_time: DateTime<Utc>,
}

impl Metadata {
    /// Start timing an evaluation over the given input snapshot.
    pub fn start(input_variables: Arc<Bindings>) -> Self {
        let now = Utc::now();
        Self {
            input_variables,
            start_time: now,
            end_time: now,
        }
    }

    /// Record the end time.
    pub fn finish(mut self) -> Self {
        self.end_time = Utc::now();
        self
    }

    /// Elapsed time in nanoseconds.
    pub fn elapsed_nanos(&self) -> i64 {
        (self.end_time - self.start_time)
            .num_nanoseconds()
            .unwrap_or(i64::MAX)
    }
}
