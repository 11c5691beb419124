use std::{
    collections::{BTreeMap, HashMap},
    ops::Range,
};

use comms::{
    FrameReceiver, FrameSender,
    msg::{AttrValue, Attribute, Blob, Instruction, Reply, Setup},
};
use futures::future;
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    error::{ClusterError, Result},
    partition::partition_population,
    policy::exploit_pairs,
};
use model::{ModelFactory, TrainableModel};

/// One worker's side of the construction handshake: its device hint and
/// the channel pair the cluster will use to reach it. Worker rank is the
/// position in the vector handed to [`Cluster::new`].
pub struct WorkerLink<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub device: Option<String>,
    pub rx: FrameReceiver<R>,
    pub tx: FrameSender<W>,
}

/// The master side of synchronous population-based training.
///
/// Owns one framed channel per worker and the write-once assignment tables
/// mapping worker ranks to contiguous population index ranges. Every
/// protocol step fans out sends to all involved workers without blocking
/// between them, joins the sends, and only then collects replies — a full
/// barrier per step. There is no timeout: a worker that never replies
/// stalls the cluster indefinitely.
///
/// `get_population` and `get_best_model` return fresh local copies of the
/// workers' models, built through the cluster's own factory.
pub struct Cluster<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pop_size: usize,
    channels: Vec<(FrameReceiver<R>, FrameSender<W>)>,
    rank_models: Vec<Range<usize>>,
    model_ranks: Vec<usize>,
    factory: ModelFactory,
}

impl<R, W> Cluster<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Partitions `pop_size` model slots over the given workers and sends
    /// each one its assignment.
    ///
    /// # Errors
    /// Returns `ClusterError::InvalidConfig` before any message is sent
    /// when the population is empty or there are no workers.
    pub async fn new(
        pop_size: usize,
        workers: Vec<WorkerLink<R, W>>,
        factory: ModelFactory,
    ) -> Result<Self> {
        if pop_size < 1 {
            return Err(ClusterError::InvalidConfig(
                "population size must be at least 1".into(),
            ));
        }
        if workers.is_empty() {
            return Err(ClusterError::InvalidConfig(
                "at least one worker is required".into(),
            ));
        }

        let rank_models = partition_population(pop_size, workers.len());

        let mut model_ranks = vec![0; pop_size];
        for (rank, range) in rank_models.iter().enumerate() {
            for num in range.clone() {
                model_ranks[num] = rank;
            }
        }

        let mut channels = Vec::with_capacity(workers.len());
        let mut setups = Vec::with_capacity(workers.len());
        for (rank, link) in workers.into_iter().enumerate() {
            setups.push(Setup {
                device: link.device,
                start: rank_models[rank].start,
                end: rank_models[rank].end,
            });
            channels.push((link.rx, link.tx));
        }

        let sends = channels
            .iter_mut()
            .zip(&setups)
            .map(|((_, tx), setup)| tx.send(setup));
        future::try_join_all(sends).await?;

        info!(pop_size = pop_size, workers = channels.len(); "assignments sent");

        Ok(Self {
            pop_size,
            channels,
            rank_models,
            model_ranks,
            factory,
        })
    }

    pub fn pop_size(&self) -> usize {
        self.pop_size
    }

    /// The contiguous index range owned by each worker, in rank order.
    pub fn assignment(&self) -> &[Range<usize>] {
        &self.rank_models
    }

    /// Broadcasts `Init` so every worker initializes its models. No
    /// replies are expected.
    pub async fn init_models(&mut self) -> Result<()> {
        self.broadcast(&Instruction::Init).await?;
        info!("models initialized");
        Ok(())
    }

    /// Reads `attrs` of the models with the given indices.
    ///
    /// When `indices` is `None` the whole population is read in index
    /// order. Otherwise the result order matches `indices` exactly, which
    /// may be any permutation of any subset of the population. Each inner
    /// vector holds the attribute values in the order they were requested.
    pub async fn get_attributes(
        &mut self,
        attrs: &[Attribute],
        indices: Option<&[usize]>,
    ) -> Result<Vec<Vec<AttrValue>>> {
        let all: Vec<usize>;
        let requested = match indices {
            Some(nums) => nums,
            None => {
                all = (0..self.pop_size).collect();
                &all
            }
        };

        let by_rank = self.group_by_rank(requested)?;
        let instructions: BTreeMap<usize, Instruction> = by_rank
            .into_iter()
            .map(|(rank, nums)| {
                let get = Instruction::Get {
                    indices: nums,
                    attrs: attrs.to_vec(),
                };
                (rank, get)
            })
            .collect();

        let merged = self.round_trip(instructions).await?;
        ordered(merged, requested, attrs.len())
    }

    /// Returns a fresh local copy of every model, in index order.
    pub async fn get_population(&mut self) -> Result<Vec<Box<dyn TrainableModel + Send>>> {
        let values = self.get_attributes(&[Attribute::Value], None).await?;

        let mut population = Vec::with_capacity(self.pop_size);
        for (num, vals) in values.into_iter().enumerate() {
            let blob = into_value(vals)?;
            let mut local = (self.factory)(num, None);
            local.set_value(&blob);
            population.push(local);
        }

        Ok(population)
    }

    /// Returns a fresh local copy of the model with the highest accuracy.
    /// Ties go to the lowest index.
    pub async fn get_best_model(&mut self) -> Result<Box<dyn TrainableModel + Send>> {
        let accuracies = self.get_attributes(&[Attribute::Accuracy], None).await?;

        let mut best: Option<(usize, f64)> = None;
        for (num, vals) in accuracies.into_iter().enumerate() {
            let acc = into_accuracy(vals)?;
            if best.is_none_or(|(_, best_acc)| acc > best_acc) {
                best = Some((num, acc));
            }
        }

        // The population is never empty, so `best` is set.
        let Some((best_num, best_acc)) = best else {
            return Err(ClusterError::Protocol("empty accuracy reply".into()));
        };
        info!(num = best_num, accuracy = best_acc; "best model selected");

        let mut values = self
            .get_attributes(&[Attribute::Value], Some(&[best_num]))
            .await?;
        let vals = values
            .pop()
            .ok_or_else(|| ClusterError::Protocol("missing value reply".into()))?;
        let blob = into_value(vals)?;

        let mut local = (self.factory)(best_num, None);
        local.set_value(&blob);
        Ok(local)
    }

    /// Drives synchronous training rounds until every model's step count
    /// reaches `target_step`.
    ///
    /// Each round reads a `(step, accuracy)` snapshot of the population,
    /// decides parameter copies (never on the first round, when every step
    /// count is still zero), and sends every worker one `CopyTrainGet`
    /// carrying only the replacements relevant to its own indices. The
    /// round's replies become the next snapshot. Every model trains
    /// exactly one step per round, so the loop terminates.
    ///
    /// # Returns
    /// The number of rounds executed.
    pub async fn train(&mut self, target_step: u64) -> Result<u64> {
        let attrs = [Attribute::StepNum, Attribute::Accuracy];
        let mut snapshot = snapshots(self.get_attributes(&attrs, None).await?)?;
        let mut rounds = 0;

        loop {
            let keep_training = snapshot.iter().any(|(step, _)| *step < target_step);
            if !keep_training {
                break;
            }

            // The first round, with every step count at zero, trains
            // without copying.
            let exploit = snapshot
                .iter()
                .any(|(step, _)| *step > 0 && *step < target_step);
            let mut new_values = if exploit {
                info!("exploiting/exploring");
                self.exploit_explore(&snapshot).await?
            } else {
                HashMap::new()
            };

            rounds += 1;
            debug!(round = rounds, copies = new_values.len(); "starting training round");

            let instructions: BTreeMap<usize, Instruction> = self
                .rank_models
                .iter()
                .enumerate()
                .map(|(rank, range)| {
                    let indices: Vec<usize> = range.clone().collect();
                    let replacements = indices
                        .iter()
                        .filter_map(|num| new_values.remove(num).map(|blob| (*num, blob)))
                        .collect();

                    let ctg = Instruction::CopyTrainGet {
                        indices,
                        attrs: attrs.to_vec(),
                        replacements,
                    };
                    (rank, ctg)
                })
                .collect();

            let merged = self.round_trip(instructions).await?;
            let requested: Vec<usize> = (0..self.pop_size).collect();
            snapshot = snapshots(ordered(merged, &requested, attrs.len())?)?;

            info!(round = rounds; "finished training round");
        }

        Ok(rounds)
    }

    /// Instructs every worker to exit its instruction loop and consumes
    /// the cluster, so no method can be called against the dead channels.
    pub async fn shutdown(mut self) -> Result<()> {
        self.broadcast(&Instruction::Exit).await?;
        info!("workers shut down");
        Ok(())
    }

    /// Decides the parameter copies for one exploit/explore step.
    ///
    /// Ranks the population by accuracy and maps each of the worst fifth
    /// to a replacement value fetched from one of the best fifth. Indices
    /// absent from the returned map keep training their current value.
    async fn exploit_explore(&mut self, snapshot: &[(u64, f64)]) -> Result<HashMap<usize, Blob>> {
        for (num, (_, accuracy)) in snapshot.iter().enumerate() {
            debug!(num = num, accuracy = *accuracy; "model accuracy");
        }

        if self.pop_size <= 1 {
            return Ok(HashMap::new());
        }

        let accuracies: Vec<f64> = snapshot.iter().map(|(_, acc)| *acc).collect();
        let pairs = exploit_pairs(&accuracies);

        let best_nums: Vec<usize> = pairs.iter().map(|(_, best)| *best).collect();
        let best_values = self
            .get_attributes(&[Attribute::Value], Some(&best_nums))
            .await?;

        let mut new_values = HashMap::with_capacity(pairs.len());
        for ((worst, best), vals) in pairs.into_iter().zip(best_values) {
            info!(from = best, to = worst; "copying parameters");
            new_values.insert(worst, into_value(vals)?);
        }

        Ok(new_values)
    }

    /// Splits requested indices by owning worker, preserving request order
    /// within each worker.
    fn group_by_rank(&self, indices: &[usize]) -> Result<BTreeMap<usize, Vec<usize>>> {
        let mut by_rank: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for num in indices {
            let rank = *self
                .model_ranks
                .get(*num)
                .ok_or(ClusterError::UnknownIndex {
                    index: *num,
                    pop_size: self.pop_size,
                })?;
            by_rank.entry(rank).or_default().push(*num);
        }
        Ok(by_rank)
    }

    /// Sends one instruction to each addressed worker without blocking
    /// between sends, joins the sends, then collects one reply per worker
    /// and merges them. The round does not advance until every addressed
    /// worker has replied.
    async fn round_trip(&mut self, instructions: BTreeMap<usize, Instruction>) -> Result<Reply> {
        let sends = self
            .channels
            .iter_mut()
            .enumerate()
            .filter_map(|(rank, (_, tx))| instructions.get(&rank).map(|ins| tx.send(ins)));
        future::try_join_all(sends).await?;

        let mut merged = Reply::new();
        for rank in instructions.keys() {
            let reply: Reply = self.channels[*rank].0.recv().await?;
            merged.extend(reply);
        }

        Ok(merged)
    }

    /// Broadcasts a reply-less instruction to every worker, non-blocking
    /// sends joined afterward.
    async fn broadcast(&mut self, instruction: &Instruction) -> Result<()> {
        let sends = self
            .channels
            .iter_mut()
            .map(|(_, tx)| tx.send(instruction));
        future::try_join_all(sends).await?;
        Ok(())
    }
}

/// Reorders a merged reply to match the requested index order, checking
/// that every requested index is present with the right number of values
/// and that nothing unrequested slipped in.
fn ordered(mut merged: Reply, requested: &[usize], attr_count: usize) -> Result<Vec<Vec<AttrValue>>> {
    let results = requested
        .iter()
        .map(|num| {
            let values = merged
                .remove(num)
                .ok_or_else(|| ClusterError::Protocol(format!("missing index {num} in reply")))?;

            if values.len() != attr_count {
                return Err(ClusterError::Protocol(format!(
                    "index {num} replied {} attribute values, expected {attr_count}",
                    values.len()
                )));
            }

            Ok(values)
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(num) = merged.keys().next() {
        return Err(ClusterError::Protocol(format!(
            "reply contains unrequested index {num}"
        )));
    }

    Ok(results)
}

fn snapshots(attributes: Vec<Vec<AttrValue>>) -> Result<Vec<(u64, f64)>> {
    attributes
        .into_iter()
        .map(|vals| match vals.as_slice() {
            [AttrValue::StepNum(step), AttrValue::Accuracy(acc)] => Ok((*step, *acc)),
            other => Err(ClusterError::Protocol(format!(
                "expected a (step, accuracy) pair, got {other:?}"
            ))),
        })
        .collect()
}

fn into_value(mut vals: Vec<AttrValue>) -> Result<Blob> {
    match vals.pop() {
        Some(AttrValue::Value(blob)) if vals.is_empty() => Ok(blob),
        other => Err(ClusterError::Protocol(format!(
            "expected a single parameter value, got {other:?}"
        ))),
    }
}

fn into_accuracy(vals: Vec<AttrValue>) -> Result<f64> {
    match vals.as_slice() {
        [AttrValue::Accuracy(acc)] => Ok(*acc),
        other => Err(ClusterError::Protocol(format!(
            "expected a single accuracy, got {other:?}"
        ))),
    }
}
