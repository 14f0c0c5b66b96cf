//! Driver - runs a sequencer on a tokio task
//!
//! The worker owns the [`Sequencer`] and waits on three sources at once:
//! - commands from the [`DriverHandle`] (cue batches, shutdown)
//! - change notifications from the motion source
//! - the schedule deadline
//!
//! Update commands already queued when one is received are drained and
//! applied as a single batch. Each queued batch is validated on its own
//! first: a rejected batch is answered with its error and left out, the
//! others still apply together. Every non-empty event batch is forwarded on
//! the events channel.

use std::time::Duration;

use axis::Axis;
use contracts::{ContractError, CueArg, CueEvent};
use motion::MotionSource;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::Sequencer;

/// Outcome of one queued cue batch.
pub type UpdateReply = oneshot::Receiver<Result<(), ContractError>>;

#[derive(Debug)]
pub enum Command {
    Update {
        args: Vec<CueArg>,
        reply: oneshot::Sender<Result<(), ContractError>>,
    },
    Shutdown,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver task has stopped")]
    Closed,

    #[error("cue batch rejected: {0}")]
    Rejected(#[from] ContractError),

    #[error("driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handle to a running driver task.
pub struct DriverHandle<S> {
    tx: mpsc::Sender<Command>,
    worker_handle: JoinHandle<Sequencer<S>>,
}

impl<S: MotionSource + 'static> DriverHandle<S> {
    /// Spawn the worker. Returns the handle and the event batch receiver.
    pub fn spawn(
        sequencer: Sequencer<S>,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<Vec<CueEvent>>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let (events_tx, events_rx) = mpsc::channel(queue_capacity);
        let worker_handle = tokio::spawn(drive(sequencer, rx, events_tx));
        (Self { tx, worker_handle }, events_rx)
    }

    /// Queue a cue batch without waiting for it to be applied.
    ///
    /// The returned receiver resolves once the worker has applied or
    /// rejected this batch.
    pub async fn submit(&self, args: Vec<CueArg>) -> Result<UpdateReply, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Update { args, reply })
            .await
            .map_err(|_| DriverError::Closed)?;
        Ok(rx)
    }

    /// Apply a cue batch and wait for its result.
    pub async fn update(&self, args: Vec<CueArg>) -> Result<(), DriverError> {
        let reply = self.submit(args).await?;
        reply.await.map_err(|_| DriverError::Closed)??;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.worker_handle.is_finished()
    }

    /// Stop the worker and take the sequencer back.
    pub async fn shutdown(self) -> Result<Sequencer<S>, DriverError> {
        // A worker that already stopped has dropped its receiver.
        let _ = self.tx.send(Command::Shutdown).await;
        Ok(self.worker_handle.await?)
    }
}

async fn forward(events_tx: &mpsc::Sender<Vec<CueEvent>>, events: Vec<CueEvent>) {
    if events.is_empty() {
        return;
    }
    if events_tx.send(events).await.is_err() {
        debug!("Event receiver dropped");
    }
}

type Pending = (Vec<CueArg>, oneshot::Sender<Result<(), ContractError>>);

/// Apply queued batches as one sequencer update, skipping the invalid ones.
fn apply_pending<S: MotionSource>(
    sequencer: &mut Sequencer<S>,
    pending: Vec<Pending>,
) -> Vec<CueEvent> {
    let mut merged = Vec::new();
    let mut accepted = Vec::with_capacity(pending.len());
    for (args, reply) in pending {
        match Axis::validate(&args) {
            Ok(()) => {
                merged.extend(args);
                accepted.push(reply);
            }
            Err(e) => {
                warn!(error = %e, "Rejected cue batch");
                let _ = reply.send(Err(e));
            }
        }
    }
    if accepted.is_empty() {
        return Vec::new();
    }

    debug!(batches = accepted.len(), entries = merged.len(), "Applying cue batches");
    match sequencer.update(merged) {
        Ok(events) => {
            for reply in accepted {
                let _ = reply.send(Ok(()));
            }
            events
        }
        Err(e) => {
            error!(error = %e, "Validated cue batches failed to apply");
            let message = e.to_string();
            for reply in accepted {
                let _ = reply.send(Err(ContractError::Other(message.clone())));
            }
            Vec::new()
        }
    }
}

async fn drive<S: MotionSource>(
    mut sequencer: Sequencer<S>,
    mut rx: mpsc::Receiver<Command>,
    events_tx: mpsc::Sender<Vec<CueEvent>>,
) -> Sequencer<S> {
    let mut changes = sequencer.source().changes();
    changes.borrow_and_update();
    let mut motion_open = true;

    info!("Driver started");
    let init = sequencer.on_timing_change();
    forward(&events_tx, init).await;

    loop {
        let delay = sequencer
            .next_deadline()
            .map(|t| (t - sequencer.source().now()).max(0.0));

        tokio::select! {
            cmd = rx.recv() => {
                let Some(Command::Update { args, reply }) = cmd else {
                    break;
                };
                let mut pending = vec![(args, reply)];
                let mut shutdown = false;
                while let Ok(next) = rx.try_recv() {
                    match next {
                        Command::Update { args, reply } => pending.push((args, reply)),
                        Command::Shutdown => {
                            shutdown = true;
                            break;
                        }
                    }
                }
                let events = apply_pending(&mut sequencer, pending);
                forward(&events_tx, events).await;
                if shutdown {
                    break;
                }
            }
            changed = changes.changed(), if motion_open => {
                if changed.is_err() {
                    debug!("Motion source closed");
                    motion_open = false;
                    continue;
                }
                changes.borrow_and_update();
                let events = sequencer.on_timing_change();
                forward(&events_tx, events).await;
            }
            _ = tokio::time::sleep(Duration::from_secs_f64(delay.unwrap_or(0.0))), if delay.is_some() => {
                let events = sequencer.on_timeout();
                forward(&events_tx, events).await;
            }
        }
    }

    sequencer.close();
    info!("Driver stopped");
    sequencer
}
