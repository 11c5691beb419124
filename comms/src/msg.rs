//! The instruction and attribute vocabulary shared by the cluster and its
//! workers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use model::{Blob, HyperUpdate};

/// The reply to a `Get` or `CopyTrainGet` instruction: for each requested
/// population index, the attribute values in the order they were requested.
pub type Reply = HashMap<usize, Vec<AttrValue>>;

/// An attribute of a model that the cluster can read remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    StepNum,
    Value,
    UpdateHistory,
    Accuracy,
}

/// The value of one remotely read attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    StepNum(u64),
    Value(Blob),
    UpdateHistory(Vec<HyperUpdate>),
    Accuracy(f64),
}

impl AttrValue {
    pub fn step_num(&self) -> Option<u64> {
        match self {
            Self::StepNum(n) => Some(*n),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Self::Value(blob) => Some(blob),
            _ => None,
        }
    }

    pub fn update_history(&self) -> Option<&[HyperUpdate]> {
        match self {
            Self::UpdateHistory(updates) => Some(updates),
            _ => None,
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        match self {
            Self::Accuracy(acc) => Some(*acc),
            _ => None,
        }
    }
}

/// The one-time assignment a worker receives before entering its
/// instruction loop: a device hint and a half-open population index range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub device: Option<String>,
    pub start: usize,
    pub end: usize,
}

/// An instruction sent by the cluster to one of its workers.
///
/// `Get` and `CopyTrainGet` each produce exactly one [`Reply`]; `Init` and
/// `Exit` produce none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// Leave the instruction loop; the worker is unreachable afterward.
    Exit,
    /// Initialize every model the worker owns.
    Init,
    /// Read `attrs` of each index in `indices`.
    Get {
        indices: Vec<usize>,
        attrs: Vec<Attribute>,
    },
    /// For each index in `replacements`, overwrite the model's parameter
    /// value and perturb it; then train every model in `indices` for one
    /// step; then reply as `Get` would over `indices`.
    CopyTrainGet {
        indices: Vec<usize>,
        attrs: Vec<Attribute>,
        replacements: HashMap<usize, Blob>,
    },
}
