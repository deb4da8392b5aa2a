//! Execution host: the dedicated worker sequences run on.
//!
//! All five instrument handles are shared, unprotected mutable resources, so
//! correctness depends on never running two sequences concurrently. The host
//! enforces that by owning the rack, the engine, and the result model inside
//! a single worker task; jobs arrive over a channel and are executed
//! strictly one at a time. The interactive side dispatches a job, gets a
//! future back, and is additionally notified through a broadcast event
//! stream when a sequence completes.
//!
//! There is no cancellation: once a sequence begins it runs to completion or
//! to its single safety-triggered abort.

use crate::rack::{AddressMap, InstrumentRack, InstrumentRole};
use crate::result::{MeasureResult, Sample};
use crate::sequence::SequenceEngine;
use anyhow::{anyhow, Result};
use rig_core::capabilities::InstrumentStatus;
use rig_core::params::SecondaryParams;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, info};

/// Observable host state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// No sequence running, ready to accept jobs.
    Idle,
    /// A presence check is in flight.
    Checking,
    /// A measure sweep is in flight.
    Measuring,
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostState::Idle => write!(f, "idle"),
            HostState::Checking => write!(f, "checking"),
            HostState::Measuring => write!(f, "measuring"),
        }
    }
}

/// Completion notifications for the presentation layer.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Discovery finished for every role.
    Connected { found: bool },
    /// A presence check finished.
    CheckComplete { device_type: String, present: bool },
    /// A measure sweep finished.
    MeasureComplete { device_type: String, ready: bool },
}

/// Read-only copy of the result model for the presentation layer.
#[derive(Debug, Clone)]
pub struct ResultSnapshot {
    pub ready: bool,
    pub only_important: bool,
    pub headers: Vec<String>,
    pub data: Vec<Sample>,
}

enum Job {
    Connect {
        overrides: AddressMap,
        reply: oneshot::Sender<Result<bool>>,
    },
    Check {
        device_type: String,
        secondary: SecondaryParams,
        reply: oneshot::Sender<Result<bool>>,
    },
    Measure {
        device_type: String,
        secondary: SecondaryParams,
        reply: oneshot::Sender<Result<bool>>,
    },
    Result {
        reply: oneshot::Sender<ResultSnapshot>,
    },
    Statuses {
        reply: oneshot::Sender<Vec<(InstrumentRole, InstrumentStatus)>>,
    },
}

/// Handle to the worker that runs sequences.
///
/// Dropping the host closes the job channel and lets the worker finish its
/// current job and exit.
pub struct ExecutionHost {
    jobs: mpsc::Sender<Job>,
    events: broadcast::Sender<HostEvent>,
    state: Arc<RwLock<HostState>>,
}

impl ExecutionHost {
    /// Spawn the worker with everything a sequence needs.
    pub fn spawn(rack: InstrumentRack, engine: SequenceEngine, result: MeasureResult) -> Self {
        let (jobs, rx) = mpsc::channel(16);
        let (events, _) = broadcast::channel(64);
        let state = Arc::new(RwLock::new(HostState::Idle));

        tokio::spawn(worker(rx, rack, engine, result, events.clone(), state.clone()));

        Self {
            jobs,
            events,
            state,
        }
    }

    /// Subscribe to completion events.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    /// Current host state.
    pub async fn state(&self) -> HostState {
        *self.state.read().await
    }

    /// Apply address overrides and discover every instrument role.
    pub async fn connect(&self, overrides: AddressMap) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Connect { overrides, reply }).await?;
        rx.await.map_err(|_| worker_gone())?
    }

    /// Run a presence check for a device type.
    pub async fn check(&self, device_type: &str, secondary: SecondaryParams) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Check {
            device_type: device_type.to_string(),
            secondary,
            reply,
        })
        .await?;
        rx.await.map_err(|_| worker_gone())?
    }

    /// Run a measure sweep for a device type.
    ///
    /// Returns whether the result model is ready afterwards; the
    /// safety-abort path resolves to `Ok(false)` with the model untouched.
    pub async fn measure(&self, device_type: &str, secondary: SecondaryParams) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Measure {
            device_type: device_type.to_string(),
            secondary,
            reply,
        })
        .await?;
        rx.await.map_err(|_| worker_gone())?
    }

    /// Snapshot the result model.
    pub async fn result(&self) -> Result<ResultSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Result { reply }).await?;
        rx.await.map_err(|_| worker_gone())
    }

    /// Status token of every instrument role.
    pub async fn statuses(&self) -> Result<Vec<(InstrumentRole, InstrumentStatus)>> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Statuses { reply }).await?;
        rx.await.map_err(|_| worker_gone())
    }

    async fn submit(&self, job: Job) -> Result<()> {
        self.jobs.send(job).await.map_err(|_| worker_gone())
    }
}

fn worker_gone() -> anyhow::Error {
    anyhow!("execution host worker stopped")
}

async fn worker(
    mut jobs: mpsc::Receiver<Job>,
    rack: InstrumentRack,
    engine: SequenceEngine,
    mut result: MeasureResult,
    events: broadcast::Sender<HostEvent>,
    state: Arc<RwLock<HostState>>,
) {
    info!("execution host worker started");
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Connect { overrides, reply } => {
                let outcome = rack.connect(&overrides).await;
                if let Ok(found) = &outcome {
                    let _ = events.send(HostEvent::Connected { found: *found });
                }
                let _ = reply.send(outcome);
            }
            Job::Check {
                device_type,
                secondary,
                reply,
            } => {
                *state.write().await = HostState::Checking;
                let verdict = engine.check(&rack, &device_type, &secondary, &mut result).await;
                *state.write().await = HostState::Idle;

                let present = matches!(&verdict, Ok(true));
                let _ = events.send(HostEvent::CheckComplete {
                    device_type,
                    present,
                });
                let _ = reply.send(verdict);
            }
            Job::Measure {
                device_type,
                secondary,
                reply,
            } => {
                *state.write().await = HostState::Measuring;
                let outcome = engine.measure(&rack, &device_type, &secondary).await;
                let outcome = match outcome {
                    Ok(Some(summary)) => {
                        debug!(
                            device_index = summary.device_index,
                            points = summary.points_visited,
                            "sweep finished, populating result model"
                        );
                        result
                            .populate(summary.device_index, secondary.important)
                            .map(|()| result.ready())
                            .map_err(Into::into)
                    }
                    // Safety abort: no result, model keeps its prior state.
                    Ok(None) => Ok(false),
                    Err(e) => Err(e),
                };
                *state.write().await = HostState::Idle;

                let ready = matches!(&outcome, Ok(true));
                let _ = events.send(HostEvent::MeasureComplete {
                    device_type,
                    ready,
                });
                let _ = reply.send(outcome);
            }
            Job::Result { reply } => {
                let _ = reply.send(ResultSnapshot {
                    ready: result.ready(),
                    only_important: result.only_important(),
                    headers: result.headers().to_vec(),
                    data: result.data().to_vec(),
                });
            }
            Job::Statuses { reply } => {
                let _ = reply.send(rack.statuses());
            }
        }
    }
    info!("execution host worker stopped");
}
