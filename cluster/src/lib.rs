//! The master side of synchronous population-based training: partitions a
//! population of trainable models over workers, drives training rounds,
//! and periodically copies parameters from the best performers to the
//! worst ("exploit") before the receiving models perturb them ("explore").

mod cluster;
pub mod error;
mod partition;
mod policy;

pub use cluster::{Cluster, WorkerLink};
pub use error::{ClusterError, Result};
pub use partition::partition_population;
