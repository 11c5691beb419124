//! The capability boundary between the coordination layer and whatever is
//! actually being trained.
//!
//! The cluster and its workers only ever touch models through the
//! [`TrainableModel`] trait: parameters move as opaque byte blobs, metrics
//! are plain numbers, and the perturbation applied after a parameter copy is
//! the model's own business. [`ToyModel`] is the built-in implementation
//! used by the launch binary and the end-to-end tests.

mod toy;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use toy::ToyModel;

/// An opaque, transport-serializable parameter snapshot of one model.
pub type Blob = Vec<u8>;

/// One hyperparameter update applied by a model's explore step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperUpdate {
    /// The training step at which the update was applied.
    pub step: u64,
    /// Human-readable description of the update.
    pub detail: String,
}

impl fmt::Display for HyperUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: {}", self.step, self.detail)
    }
}

/// A stateful trainable unit identified by a population index.
pub trait TrainableModel {
    /// Establishes trainable parameters from the model's own deterministic
    /// scheme. Called once, before any other operation.
    fn initialize(&mut self);

    /// Returns an opaque snapshot of the current parameters.
    fn value(&self) -> Blob;

    /// Overwrites the current parameters with a snapshot taken from
    /// another model.
    fn set_value(&mut self, blob: &[u8]);

    /// Executes one unit of training work; increments the step count by
    /// exactly one.
    fn train(&mut self);

    /// Applies a perturbation after a value copy; appends one entry to the
    /// update history.
    fn explore(&mut self);

    fn step_num(&self) -> u64;

    fn accuracy(&self) -> f64;

    fn update_history(&self) -> &[HyperUpdate];
}

/// A factory for model handles: population index and device hint in, fresh
/// handle out. Both workers and the cluster construct handles through one
/// of these.
pub type ModelFactory = Box<dyn Fn(usize, Option<&str>) -> Box<dyn TrainableModel + Send> + Send>;

/// The built-in factory producing [`ToyModel`] handles.
pub fn toy_factory() -> ModelFactory {
    Box::new(|num, device| Box::new(ToyModel::new(num, device.map(str::to_owned))))
}
