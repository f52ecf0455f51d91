//! Pipeline runner with channel-based triggering.
//!
//! The `PipelineRunner` owns an mpsc channel of trigger requests and
//! executes them one after another against a prepared pipeline.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::engine::{PipelineEngine, PreparedPipeline};
use crate::error::RuntimeError;
use crate::result::{TriggerRequest, TriggerResult};

/// Reply channel for one trigger.
pub type TriggerReply = oneshot::Receiver<Result<TriggerResult, RuntimeError>>;

/// A queued trigger and where to send its result.
pub struct TriggerEnvelope {
  pub request: TriggerRequest,
  pub reply: Option<oneshot::Sender<Result<TriggerResult, RuntimeError>>>,
}

/// Executes a prepared pipeline in response to trigger requests.
///
/// # Usage
///
/// ```ignore
/// let runner = PipelineRunner::new(engine, prepared);
/// let sender = runner.sender();
///
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await?;
/// ```
pub struct PipelineRunner {
  sender: mpsc::Sender<TriggerEnvelope>,
  receiver: mpsc::Receiver<TriggerEnvelope>,
  engine: Arc<PipelineEngine>,
  pipeline: Arc<PreparedPipeline>,
}

impl PipelineRunner {
  pub fn new(engine: Arc<PipelineEngine>, pipeline: Arc<PreparedPipeline>) -> Self {
    Self::with_buffer_size(engine, pipeline, 100)
  }

  pub fn with_buffer_size(
    engine: Arc<PipelineEngine>,
    pipeline: Arc<PreparedPipeline>,
    buffer_size: usize,
  ) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      engine,
      pipeline,
    }
  }

  /// Sender handle for external triggers. Envelopes without a reply
  /// channel are fire-and-forget.
  pub fn sender(&self) -> mpsc::Sender<TriggerEnvelope> {
    self.sender.clone()
  }

  /// Queue a trigger and get a receiver for its result.
  pub async fn run(&self, request: TriggerRequest) -> Result<TriggerReply, RuntimeError> {
    let (reply, receiver) = oneshot::channel();
    self
      .sender
      .send(TriggerEnvelope {
        request,
        reply: Some(reply),
      })
      .await
      .map_err(|_| RuntimeError::ChannelClosed)?;
    Ok(receiver)
  }

  /// Execute queued triggers until the token is cancelled or every sender
  /// is dropped. Each trigger gets a child token.
  pub async fn start(mut self, cancel: CancellationToken) -> Result<(), RuntimeError> {
    // Our own sender would keep the channel open forever.
    drop(self.sender);
    info!(
      version = %self.pipeline.pipeline().version,
      components = self.pipeline.plan().dag().len(),
      "pipeline_runner_started"
    );

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("pipeline_runner_cancelled");
          break;
        }
        envelope = self.receiver.recv() => {
          let Some(TriggerEnvelope { request, reply }) = envelope else {
            info!("pipeline_runner_channel_closed");
            break;
          };

          let result = self
            .engine
            .execute(&self.pipeline, request, cancel.child_token())
            .await;
          match &result {
            Ok(result) => info!(
              trigger_id = %result.trigger_id,
              status = ?result.status,
              failed_items = result.failed_items().len(),
              "trigger_finished"
            ),
            Err(e) => error!(error = %e, "trigger_rejected"),
          }

          if let Some(reply) = reply {
            // Caller may have stopped waiting
            let _ = reply.send(result);
          }
        }
      }
    }

    Ok(())
  }

  pub fn engine(&self) -> &PipelineEngine {
    &self.engine
  }
}
