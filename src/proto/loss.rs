use rand::Rng;

/// Decides whether a packet crossing the simulated lossy link is dropped.
pub trait LossGate {
    fn should_drop(&mut self) -> bool;
}

/// Drops packets uniformly at a configured percentage.
#[derive(Debug, Clone)]
pub struct RandomLoss {
    drop_percent: u32,
}

impl RandomLoss {
    pub fn new(drop_percent: u32) -> Self {
        Self { drop_percent }
    }

    /// Scales a 0.0..=1.0 command line probability to a percentage.
    pub fn from_fraction(fraction: f64) -> Self {
        Self::new((fraction * 100.0) as u32)
    }
}

impl LossGate for RandomLoss {
    fn should_drop(&mut self) -> bool {
        self.drop_percent > 0 && rand::thread_rng().gen_range(0u32, 101) <= self.drop_percent
    }
}
