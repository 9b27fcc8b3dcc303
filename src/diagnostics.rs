//! Bounded drift history for overlays and logging
//!
//! Observational only. The reconciliation engine never reads it back.

use std::collections::VecDeque;

use crate::reconcile::{CorrectionReport, CorrectionTier};

#[derive(Debug, Clone)]
pub struct DriftHistory {
    reports: VecDeque<CorrectionReport>,
    capacity: usize,
    /// Lifetime count, survives eviction
    emergencies: u64,
}

/// Aggregate over the retained reports
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriftSummary {
    pub samples: usize,
    pub emergencies: usize,
    pub cooldown_blocked: usize,
    pub mean_position_error: f32,
    pub max_position_error: f32,
    pub last_emergency_ms: Option<f64>,
}

impl DriftHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            reports: VecDeque::with_capacity(capacity),
            capacity,
            emergencies: 0,
        }
    }

    pub fn record(&mut self, report: CorrectionReport) {
        if report.tier == CorrectionTier::Emergency {
            self.emergencies += 1;
        }
        if self.reports.len() == self.capacity {
            self.reports.pop_front();
        }
        self.reports.push_back(report);
    }

    pub fn latest(&self) -> Option<&CorrectionReport> {
        self.reports.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorrectionReport> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn total_emergencies(&self) -> u64 {
        self.emergencies
    }

    /// Bootstrap reports carry no error and are left out
    pub fn summary(&self) -> DriftSummary {
        let mut summary = DriftSummary::default();
        let mut total = 0.0;
        for report in self.reports.iter().filter(|r| r.tier != CorrectionTier::Bootstrap) {
            summary.samples += 1;
            total += report.errors.position;
            summary.max_position_error = summary.max_position_error.max(report.errors.position);
            if report.cooldown_blocked {
                summary.cooldown_blocked += 1;
            }
            if report.tier == CorrectionTier::Emergency {
                summary.emergencies += 1;
                summary.last_emergency_ms = Some(report.at_ms);
            }
        }
        if summary.samples > 0 {
            summary.mean_position_error = total / summary.samples as f32;
        }
        summary
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }
}
