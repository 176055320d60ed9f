use std::time::Duration;

use crate::effects::Effect;

pub const BEAT_THRESHOLD: f64 = 1.3;

pub const PULSE_DWELL: Duration = Duration::from_millis(300);
pub const ABSTRACT_PULSE_DWELL: Duration = Duration::from_millis(3000);

pub fn pulse_dwell(effect: Effect) -> Duration {
    match effect {
        Effect::Abstract => ABSTRACT_PULSE_DWELL,
        _ => PULSE_DWELL,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Sampling,
}

/// Rising-edge energy detector. The baseline is simply last tick's energy, so any
/// 30% jump counts, noise included.
#[derive(Debug, Clone)]
pub struct BeatDetector {
    state: DetectorState,
    previous_energy: f64,
    threshold: f64,
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self {
            state: DetectorState::Idle,
            previous_energy: 0.0,
            threshold: BEAT_THRESHOLD,
        }
    }
}

impl BeatDetector {
    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_sampling(&self) -> bool {
        self.state == DetectorState::Sampling
    }

    pub fn previous_energy(&self) -> f64 {
        self.previous_energy
    }

    pub fn start(&mut self) {
        self.state = DetectorState::Sampling;
        self.previous_energy = 0.0;
    }

    pub fn stop(&mut self) {
        self.state = DetectorState::Idle;
    }

    /// Compare against the stored baseline, then replace it unconditionally.
    pub fn observe(&mut self, energy: f64) -> bool {
        let fired = energy > self.previous_energy * self.threshold;
        self.previous_energy = energy;
        fired
    }

    pub fn sample(&mut self, bins: &[u8], rng: &mut fastrand::Rng) -> Option<Effect> {
        if !self.is_sampling() {
            return None;
        }
        if self.observe(energy(bins)) {
            Some(Effect::ALL[rng.usize(..Effect::ALL.len())])
        } else {
            None
        }
    }
}

pub fn energy(bins: &[u8]) -> f64 {
    bins.iter().map(|&b| (b as f64) * (b as f64)).sum()
}
