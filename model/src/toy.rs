//! A small deterministic model so the protocol can be exercised end to end
//! without a real training stack.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{Blob, HyperUpdate, TrainableModel};

const PARAM_COUNT: usize = 16;
const INITIAL_LR: f32 = 0.05;

/// A trainable unit that shrinks its parameters toward zero.
///
/// The loss is the mean square of the parameters, one train step is one
/// gradient step on it, and accuracy is `1 / (1 + loss)` so it grows
/// monotonically as training progresses. Everything is seeded from the
/// population index, so two models with the same index behave identically.
pub struct ToyModel {
    num: usize,
    device: Option<String>,
    params: Vec<f32>,
    lr: f32,
    step: u64,
    history: Vec<HyperUpdate>,
    rng: StdRng,
}

impl ToyModel {
    pub fn new(num: usize, device: Option<String>) -> Self {
        let seed = (num as u64)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(1);

        Self {
            num,
            device,
            params: Vec::new(),
            lr: INITIAL_LR,
            step: 0,
            history: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn num(&self) -> usize {
        self.num
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn learning_rate(&self) -> f32 {
        self.lr
    }

    fn mean_square(&self) -> f64 {
        if self.params.is_empty() {
            return f64::INFINITY;
        }

        let sum: f64 = self.params.iter().map(|p| (*p as f64) * (*p as f64)).sum();
        sum / self.params.len() as f64
    }
}

impl TrainableModel for ToyModel {
    fn initialize(&mut self) {
        self.params = (0..PARAM_COUNT)
            .map(|_| self.rng.random_range(-1.0..1.0))
            .collect();
    }

    fn value(&self) -> Blob {
        bytemuck::cast_slice(&self.params).to_vec()
    }

    fn set_value(&mut self, blob: &[u8]) {
        self.params = blob
            .chunks_exact(size_of::<f32>())
            .map(bytemuck::pod_read_unaligned)
            .collect();
    }

    fn train(&mut self) {
        // One gradient step on mean(p^2): d/dp = 2p.
        for p in &mut self.params {
            *p -= self.lr * 2.0 * *p;
        }
        self.step += 1;
    }

    fn explore(&mut self) {
        let factor = if self.rng.random_bool(0.5) { 0.8 } else { 1.2 };
        let old = self.lr;
        self.lr *= factor;
        self.history.push(HyperUpdate {
            step: self.step,
            detail: format!("learning rate {old} -> {}", self.lr),
        });
    }

    fn step_num(&self) -> u64 {
        self.step
    }

    fn accuracy(&self) -> f64 {
        let loss = self.mean_square();
        if loss.is_infinite() {
            return 0.0;
        }
        1.0 / (1.0 + loss)
    }

    fn update_history(&self) -> &[HyperUpdate] {
        &self.history
    }
}
