//! Launches one synchronous PBT run: a cluster plus its workers, wired
//! over in-process duplex pipes. The first process slot plays the cluster
//! and the remaining ones play workers, mirroring a rank-0 launcher.

use std::{env, io, process::ExitCode, time::Instant};

use cluster::{Cluster, WorkerLink};
use comms::msg::{AttrValue, Attribute};
use log::{error, info};
use model::toy_factory;
use tokio::{
    io::{duplex, split},
    task::JoinSet,
};
use worker::WorkerLoop;

const DEFAULT_TARGET_STEP: u64 = 20;
const PIPE_CAPACITY: usize = 1 << 20;

fn usage() -> io::Error {
    io::Error::other("usage: node <nprocs> <pop_size> [target_step]")
}

fn parse_args() -> io::Result<(usize, usize, u64)> {
    let mut args = env::args().skip(1);

    let nprocs: usize = args
        .next()
        .ok_or_else(usage)?
        .parse()
        .map_err(|_| usage())?;
    let pop_size: usize = args
        .next()
        .ok_or_else(usage)?
        .parse()
        .map_err(|_| usage())?;
    let target_step: u64 = match args.next() {
        Some(raw) => raw.parse().map_err(|_| usage())?,
        None => DEFAULT_TARGET_STEP,
    };

    if nprocs < 2 {
        return Err(io::Error::other(
            "at least 2 process slots are required (1 cluster + 1 worker)",
        ));
    }

    Ok((nprocs - 1, pop_size, target_step))
}

async fn run() -> io::Result<()> {
    let (worker_count, pop_size, target_step) = parse_args()?;

    let mut links = Vec::with_capacity(worker_count);
    let mut tasks = JoinSet::new();
    for worker_id in 0..worker_count {
        let (cluster_side, worker_side) = duplex(PIPE_CAPACITY);

        let (rx, tx) = split(cluster_side);
        let (rx, tx) = comms::channel(rx, tx);
        links.push(WorkerLink {
            device: Some(format!("cpu:{worker_id}")),
            rx,
            tx,
        });

        let (rx, tx) = split(worker_side);
        let (rx, tx) = comms::channel(rx, tx);
        let worker = WorkerLoop::new(worker_id, toy_factory());
        tasks.spawn(async move { worker.run(rx, tx).await.map_err(io::Error::from) });
    }

    info!(workers = worker_count, pop_size = pop_size, target_step = target_step;
        "cluster starting");
    let mut cluster = Cluster::new(pop_size, links, toy_factory()).await?;
    cluster.init_models().await?;

    let training_start = Instant::now();
    let rounds = cluster.train(target_step).await?;
    info!(rounds = rounds, elapsed_ms = training_start.elapsed().as_millis() as u64;
        "training finished");

    let attrs = [
        Attribute::StepNum,
        Attribute::UpdateHistory,
        Attribute::Accuracy,
    ];
    let attributes = cluster.get_attributes(&attrs, None).await?;
    report(&attributes);

    cluster.shutdown().await?;
    while let Some(res) = tasks.join_next().await {
        res.map_err(io::Error::other)??;
    }

    Ok(())
}

/// Prints the population ranked by descending accuracy, with each model's
/// hyperparameter update history.
fn report(attributes: &[Vec<AttrValue>]) {
    let accuracy = |num: usize| attributes[num][2].accuracy().unwrap_or(0.0);

    let mut ranked: Vec<usize> = (0..attributes.len()).collect();
    ranked.sort_by(|a, b| accuracy(*b).total_cmp(&accuracy(*a)));

    for num in ranked {
        let vals = &attributes[num];
        println!("model {num}");
        println!("  steps: {}", vals[0].step_num().unwrap_or(0));
        println!("  accuracy: {:.6}", accuracy(num));
        println!("  hyperparameter updates:");
        for update in vals[1].update_history().unwrap_or_default() {
            println!("    {update}");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("run failed: {e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
