//! Round-trip time estimate from the ping/pong exchange
//!
//! Display only; nothing in prediction or reconciliation reads it.

/// Weight of each new sample in the smoothed estimate
const RTT_ALPHA: f64 = 0.125;

#[derive(Debug, Clone, Default)]
pub struct RttEstimator {
    smoothed_ms: Option<f64>,
    latest_ms: Option<f64>,
    samples: u32,
}

impl RttEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pong echoing `sent_ms`, received at `now_ms`
    ///
    /// Echoes from the future (clock reset) are ignored.
    pub fn on_pong(&mut self, sent_ms: f64, now_ms: f64) -> Option<f64> {
        let rtt = now_ms - sent_ms;
        if !rtt.is_finite() || rtt < 0.0 {
            log::debug!("ignoring pong with rtt {rtt:.1}ms");
            return None;
        }
        self.latest_ms = Some(rtt);
        self.smoothed_ms = Some(match self.smoothed_ms {
            Some(prev) => prev + RTT_ALPHA * (rtt - prev),
            None => rtt,
        });
        self.samples += 1;
        self.smoothed_ms
    }

    pub fn smoothed_ms(&self) -> Option<f64> {
        self.smoothed_ms
    }

    pub fn latest_ms(&self) -> Option<f64> {
        self.latest_ms
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_seeds_estimate() {
        let mut rtt = RttEstimator::new();
        assert_eq!(rtt.on_pong(100.0, 180.0), Some(80.0));
        assert_eq!(rtt.samples(), 1);
    }

    #[test]
    fn test_smoothing() {
        let mut rtt = RttEstimator::new();
        rtt.on_pong(0.0, 80.0);
        let s = rtt.on_pong(1000.0, 1160.0).unwrap();
        assert!((s - 90.0).abs() < 1e-9);
        assert_eq!(rtt.latest_ms(), Some(160.0));
    }

    #[test]
    fn test_negative_rtt_ignored() {
        let mut rtt = RttEstimator::new();
        assert_eq!(rtt.on_pong(500.0, 100.0), None);
        assert_eq!(rtt.samples(), 0);
        assert!(rtt.smoothed_ms().is_none());
    }
}
