use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::capture::FrameSource;
use crate::stream::streamer::{stream_frames, StreamError, StreamSummary};
use crate::stream::Shutdown;

pub type CaptureOutcome = Result<StreamSummary, StreamError>;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("capture thread exited without reporting")]
    Lost,
    #[error("capture did not stop within {0:?}, the output stream is not being drained")]
    Stuck(Duration),
    #[error("second termination signal, exiting without waiting for the capture")]
    Interrupted,
}

/// Runs the capture loop on its own OS thread; the receiver resolves once the loop ends.
///
/// A plain thread is used so that a loop stuck on a full output pipe never holds up
/// runtime shutdown.
pub fn spawn_capture<S, W>(
    mut source: S,
    mut sink: W,
    shutdown: Shutdown,
) -> io::Result<oneshot::Receiver<CaptureOutcome>>
where
    S: FrameSource + Send + 'static,
    W: Write + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name("capture".to_string())
        .spawn(move || {
            let _ = tx.send(stream_frames(&mut source, &mut sink, &shutdown));
        })?;
    Ok(rx)
}

/// Waits for the capture loop to report its outcome.
pub async fn wait_finished(
    done: &mut oneshot::Receiver<CaptureOutcome>,
) -> Result<StreamSummary, RunError> {
    match done.await {
        Ok(outcome) => Ok(outcome?),
        Err(_) => Err(RunError::Lost),
    }
}

/// Waits at most `grace` for a loop that was already asked to stop.
pub async fn wait_stopped(
    done: &mut oneshot::Receiver<CaptureOutcome>,
    grace: Duration,
) -> Result<StreamSummary, RunError> {
    tokio::time::timeout(grace, wait_finished(done))
        .await
        .unwrap_or(Err(RunError::Stuck(grace)))
}
