//! Random-walk price feed for the paper gateway

use std::time::Duration;

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::interval;

use super::paper::PaperGateway;

/// Apply a percentage shock to a price, never going below `floor`
pub fn next_price(price: f64, shock_percent: f64, floor: f64) -> f64 {
    (price * (1.0 + shock_percent / 100.0)).max(floor)
}

/// Drives every listed symbol of a [`PaperGateway`] with a uniform random walk
pub struct RandomWalkFeed {
    gateway: PaperGateway,
    /// Largest move per step, in percent
    volatility_percent: f64,
    step: Duration,
    rng: StdRng,
}

impl RandomWalkFeed {
    pub fn new(gateway: PaperGateway, volatility_percent: f64, step: Duration) -> Self {
        Self {
            gateway,
            volatility_percent,
            step,
            rng: StdRng::from_entropy(),
        }
    }

    /// Builder: deterministic walk
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Move every listed symbol once
    pub async fn step_once(&mut self) {
        for symbol in self.gateway.symbols().await {
            let Some(price) = self.gateway.price(&symbol).await else {
                continue;
            };
            let shock = if self.volatility_percent > 0.0 {
                self.rng.gen_range(-self.volatility_percent..=self.volatility_percent)
            } else {
                0.0
            };
            // keep prices strictly positive
            let next = next_price(price, shock, price * 1e-6);
            match self.gateway.update_price(&symbol, next).await {
                Ok(fills) if fills > 0 => debug!("{} -> {:.6}, {} fills", symbol, next, fills),
                Ok(_) => {}
                Err(e) => error!("Failed to update {}: {}", symbol, e),
            }
        }
    }

    /// Walk prices until shutdown is signalled
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Random walk feed started: volatility={}%, step={:?}",
            self.volatility_percent, self.step
        );
        let mut timer = interval(self.step);
        loop {
            tokio::select! {
                _ = timer.tick() => self.step_once().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Random walk feed stopped");
                        break;
                    }
                }
            }
        }
    }
}
