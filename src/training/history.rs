//! Per-epoch training logs returned by `fit`.

use serde::Serialize;
use std::collections::BTreeMap;

/// Averages recorded at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochLogs {
    /// Zero-based epoch index.
    pub epoch: usize,
    pub loss: f32,
    pub metrics: BTreeMap<String, f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub val_metrics: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct History {
    pub epochs: Vec<EpochLogs>,
}

impl History {
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Training loss of every epoch, in order.
    pub fn losses(&self) -> Vec<f32> {
        self.epochs.iter().map(|e| e.loss).collect()
    }

    pub fn last(&self) -> Option<&EpochLogs> {
        self.epochs.last()
    }
}
