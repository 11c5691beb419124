pub mod error;
mod loop_;

pub use error::{Result, WorkerErr};
pub use loop_::WorkerLoop;
