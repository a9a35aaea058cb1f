use crate::types::{CheckRequest, CheckResponse};
use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tollgate::{AdaptiveStore, AdmissionControl, Decision, PeriodicStore};

/// Message types for the admission actor
pub enum AdmissionMessage {
    Check {
        request: CheckRequest,
        response_tx: oneshot::Sender<CheckResponse>,
    },
    // Future: Stats, Clear, Shutdown, etc.
}

/// Handle to communicate with the admission actor
#[derive(Clone)]
pub struct AdmissionHandle {
    tx: mpsc::Sender<AdmissionMessage>,
}

impl AdmissionHandle {
    /// Run one admission check
    ///
    /// The admission facade itself always answers with a decision, so the
    /// only error paths here are actor-lifecycle ones.
    pub async fn check(&self, request: CheckRequest) -> Result<CheckResponse> {
        let (response_tx, response_rx) = oneshot::channel();

        self.tx
            .send(AdmissionMessage::Check {
                request,
                response_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("admission actor has shut down"))?;

        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("admission actor dropped response channel"))
    }
}

/// The admission actor
///
/// Owns the facade (and through it the store) on one task, so every
/// read-compute-write cycle runs to completion before the next request's
/// begins — the single-process realization of the store's per-key
/// atomicity contract.
pub struct AdmissionActor;

impl AdmissionActor {
    /// Spawn a new admission actor over a periodic-cleanup store
    pub fn spawn_periodic(
        buffer_size: usize,
        admission: AdmissionControl<PeriodicStore>,
    ) -> AdmissionHandle {
        let (tx, rx) = mpsc::channel(buffer_size);

        tokio::spawn(async move {
            run_actor(rx, Limiter::Periodic(admission)).await;
        });

        AdmissionHandle { tx }
    }

    /// Spawn a new admission actor over an adaptive-cleanup store
    pub fn spawn_adaptive(
        buffer_size: usize,
        admission: AdmissionControl<AdaptiveStore>,
    ) -> AdmissionHandle {
        let (tx, rx) = mpsc::channel(buffer_size);

        tokio::spawn(async move {
            run_actor(rx, Limiter::Adaptive(admission)).await;
        });

        AdmissionHandle { tx }
    }
}

/// Internal enum to handle different store types
enum Limiter {
    Periodic(AdmissionControl<PeriodicStore>),
    Adaptive(AdmissionControl<AdaptiveStore>),
}

impl Limiter {
    fn admit(&mut self, request: &CheckRequest) -> Decision {
        match self {
            Limiter::Periodic(admission) => admission.admit(
                &request.identity,
                &request.resource,
                request.tier.as_deref(),
                request.timestamp,
            ),
            Limiter::Adaptive(admission) => admission.admit(
                &request.identity,
                &request.resource,
                request.tier.as_deref(),
                request.timestamp,
            ),
        }
    }
}

async fn run_actor(mut rx: mpsc::Receiver<AdmissionMessage>, mut limiter: Limiter) {
    while let Some(msg) = rx.recv().await {
        match msg {
            AdmissionMessage::Check {
                request,
                response_tx,
            } => {
                let decision = limiter.admit(&request);
                // Ignore send errors - receiver may have timed out
                let _ = response_tx.send(CheckResponse::from(decision));
            }
        }
    }

    tracing::info!("admission actor shutting down");
}
