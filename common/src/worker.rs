//! Defines the `Worker` trait, which lets the node start, watch, and clean up
//! its long running components uniformly

use std::{
    fmt::Debug,
    thread::{Builder, JoinHandle},
};

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tracing::error;

/// A long running component of the node
///
/// Workers own one or more threads; the node watches the threads' join
/// handles and tears down the process when any of them exits
#[async_trait]
pub trait Worker {
    /// The configuration needed to spawn the implementing worker
    type WorkerConfig;
    /// The error type that results from an invalid startup or cleanup
    type Error: 'static + Send + Debug;

    /// Create a new instance of the implementing worker
    async fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error>
    where
        Self: Sized;

    /// Start the worker's threads
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Returns a name by which the worker can be identified
    fn name(&self) -> String;

    /// Take the join handles of the worker's threads
    fn join(&mut self) -> Vec<JoinHandle<Self::Error>>;

    /// Called to cleanup the resources a worker owns when the worker crashes
    fn cleanup(&mut self) -> Result<(), Self::Error>;
}

/// Spawn a watcher thread for each of a worker's join handles
///
/// Each watcher signals `failure_channel` when its thread exits
pub fn watch_worker<W: Worker>(worker: &mut W, failure_channel: &Sender<()>) {
    let watcher_name = format!("{}-watcher", worker.name());
    for join_handle in worker.join() {
        let worker_name = worker.name();
        let channel = failure_channel.clone();

        let spawn_res = Builder::new().name(watcher_name.clone()).spawn(move || {
            match join_handle.join() {
                Err(panic) => error!("worker {worker_name} panicked with error: {panic:?}"),
                Ok(err) => error!("worker {worker_name} exited with error: {err:?}"),
            }

            if channel.blocking_send(()).is_err() {
                error!("failure channel closed before {worker_name} exit was reported");
            }
        });

        if let Err(e) = spawn_res {
            error!("failed to spawn watcher for {watcher_name}: {e}");
        }
    }
}
