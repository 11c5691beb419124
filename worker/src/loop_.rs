use std::collections::BTreeMap;

use comms::{
    FrameReceiver, FrameSender,
    msg::{AttrValue, Attribute, Instruction, Reply, Setup},
};
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Result, WorkerErr};
use model::{ModelFactory, TrainableModel};

type Handles = BTreeMap<usize, Box<dyn TrainableModel + Send>>;

/// One worker's side of the cluster protocol.
///
/// Starts uninitialized, becomes ready after the one-time [`Setup`] message
/// assigns it a half-open index range, then serves instructions strictly in
/// receipt order until `Exit`. `Get` and `CopyTrainGet` each produce
/// exactly one reply; `Init` and `Exit` produce none.
pub struct WorkerLoop {
    worker_id: usize,
    factory: ModelFactory,
}

impl WorkerLoop {
    /// # Arguments
    /// * `worker_id` - Identifier used for observability.
    /// * `factory` - Constructs one model handle per assigned index.
    pub fn new(worker_id: usize, factory: ModelFactory) -> Self {
        Self { worker_id, factory }
    }

    /// Runs the worker over a channel to the cluster until `Exit` arrives.
    ///
    /// # Errors
    /// Returns `WorkerErr` on I/O failure or when an instruction addresses
    /// an index outside the assigned range.
    pub async fn run<R, W>(self, mut rx: FrameReceiver<R>, mut tx: FrameSender<W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let worker_id = self.worker_id;

        let setup: Setup = rx.recv().await?;
        info!(worker_id = worker_id, start = setup.start, end = setup.end;
            "assignment received");

        let mut handles: Handles = BTreeMap::new();
        for num in setup.start..setup.end {
            handles.insert(num, (self.factory)(num, setup.device.as_deref()));
        }
        let range = (setup.start, setup.end);

        loop {
            let instruction: Instruction = rx.recv().await?;
            match instruction {
                Instruction::Exit => {
                    info!(worker_id = worker_id; "exit received");
                    break;
                }
                Instruction::Init => {
                    for handle in handles.values_mut() {
                        handle.initialize();
                    }
                    debug!(worker_id = worker_id, models = handles.len(); "models initialized");
                }
                Instruction::Get { indices, attrs } => {
                    let reply = read(&handles, range, &indices, &attrs)?;
                    tx.send(&reply).await?;
                }
                Instruction::CopyTrainGet {
                    indices,
                    attrs,
                    replacements,
                } => {
                    for (num, blob) in &replacements {
                        let handle = owned_mut(&mut handles, range, *num)?;
                        handle.set_value(blob);
                        handle.explore();
                        debug!(worker_id = worker_id, num = *num; "value replaced and perturbed");
                    }

                    for num in &indices {
                        owned_mut(&mut handles, range, *num)?.train();
                    }
                    debug!(worker_id = worker_id, trained = indices.len(); "training step done");

                    let reply = read(&handles, range, &indices, &attrs)?;
                    tx.send(&reply).await?;
                }
            }
        }

        Ok(())
    }
}

fn owned_mut(
    handles: &mut Handles,
    (start, end): (usize, usize),
    num: usize,
) -> Result<&mut Box<dyn TrainableModel + Send>> {
    handles.get_mut(&num).ok_or(WorkerErr::UnownedIndex {
        index: num,
        start,
        end,
    })
}

fn read(
    handles: &Handles,
    (start, end): (usize, usize),
    indices: &[usize],
    attrs: &[Attribute],
) -> Result<Reply> {
    indices
        .iter()
        .map(|num| {
            let handle = handles.get(num).ok_or(WorkerErr::UnownedIndex {
                index: *num,
                start,
                end,
            })?;

            let values = attrs
                .iter()
                .map(|attr| read_attribute(handle.as_ref(), *attr))
                .collect();

            Ok((*num, values))
        })
        .collect()
}

/// Reads one attribute of a model through its getter. Total over the
/// attribute vocabulary: every tag has an accessor.
fn read_attribute(model: &dyn TrainableModel, attr: Attribute) -> AttrValue {
    match attr {
        Attribute::StepNum => AttrValue::StepNum(model.step_num()),
        Attribute::Value => AttrValue::Value(model.value()),
        Attribute::UpdateHistory => AttrValue::UpdateHistory(model.update_history().to_vec()),
        Attribute::Accuracy => AttrValue::Accuracy(model.accuracy()),
    }
}
