//! Fire-and-forget dispatch to the background job runner.

use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

/// Job name for the hardware inventory refresh of a single asset.
pub const ASSET_HARDWARE_JOB: &str = "asset_hardware";

#[derive(Clone, Debug, PartialEq)]
pub struct QueuedJob {
    pub name: String,
    pub payload: Value,
}

/// One-way notification to the external job runner. Callers never observe
/// completion, so `enqueue` has nothing to return.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job_name: &str, payload: Value);
}

pub struct ChannelJobQueue {
    sender: UnboundedSender<QueuedJob>,
}

impl ChannelJobQueue {
    pub fn new() -> (Self, UnboundedReceiver<QueuedJob>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl JobQueue for ChannelJobQueue {
    fn enqueue(&self, job_name: &str, payload: Value) {
        let job = QueuedJob {
            name: job_name.to_string(),
            payload,
        };
        if self.sender.send(job).is_err() {
            warn!("Job runner is gone, dropped job {}", job_name);
        }
    }
}

/// Drain the queue, handing each job to the runner hook. The bundled server
/// only logs the hand-off; the runner itself lives outside this service.
pub fn spawn_job_forwarder(
    mut receiver: UnboundedReceiver<QueuedJob>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            let target = job
                .payload
                .get("asset_id")
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            info!("Dispatched job {} for asset {}", job.name, target);
        }
    })
}
