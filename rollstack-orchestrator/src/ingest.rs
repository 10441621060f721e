//! Log ingestion
//!
//! Tails the log file a driver writes for one deployment step and turns each
//! line into a persisted log row while the step runs.
//!
//! The tailer never blocks on a read that cancellation cannot interrupt:
//! every pass reads to end of file and then sleeps in a `select!` against
//! the token. Once cancelled, it performs one last pass, flushes the held
//! partial line and returns.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::repository::{LogRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to persist {lines} log lines: {source}")]
    Persist {
        lines: usize,
        #[source]
        source: RepositoryError,
    },
}

/// What to tail and whom the rows belong to
#[derive(Debug, Clone)]
pub struct TailTarget {
    pub stack_id: Uuid,
    pub deployment_id: Uuid,
    pub path: PathBuf,
}

/// Tails step log files into the log repository
#[derive(Clone)]
pub struct LogTailer {
    logs: Arc<dyn LogRepository>,
    poll_interval: Duration,
    idle_interval: Duration,
}

/// A running tail
pub struct TailHandle {
    token: CancellationToken,
    join: JoinHandle<Result<u64, IngestError>>,
}

impl TailHandle {
    /// Stop tailing and wait for the final drain
    ///
    /// Returns the number of rows written. Failures are logged, never
    /// propagated, so a broken log never fails the step it belongs to.
    pub async fn finish(self) -> u64 {
        self.token.cancel();
        match self.join.await {
            Ok(Ok(written)) => written,
            Ok(Err(e)) => {
                warn!("Log ingestion ended with an error: {:#}", e);
                0
            }
            Err(e) => {
                error!("Log ingestion task failed: {}", e);
                0
            }
        }
    }
}

impl LogTailer {
    pub fn new(logs: Arc<dyn LogRepository>, poll_interval: Duration, idle_interval: Duration) -> Self {
        Self {
            logs,
            poll_interval,
            idle_interval,
        }
    }

    /// Start tailing in the background on a child of `parent`
    pub fn spawn(&self, target: TailTarget, parent: &CancellationToken) -> TailHandle {
        self.spawn_at(target, 0, parent)
    }

    /// Like [`spawn`](Self::spawn), skipping the first `start` bytes
    ///
    /// Used to pick a file up again where an earlier tail stopped.
    pub fn spawn_at(&self, target: TailTarget, start: u64, parent: &CancellationToken) -> TailHandle {
        let token = parent.child_token();
        let tailer = self.clone();
        let run_token = token.clone();
        let join = tokio::spawn(async move { tailer.tail(&target, start, run_token).await });
        TailHandle { token, join }
    }

    /// Tail `target` from byte `start` until `token` is cancelled
    pub async fn tail(
        &self,
        target: &TailTarget,
        start: u64,
        token: CancellationToken,
    ) -> Result<u64, IngestError> {
        let Some(mut file) = self.wait_for_file(&target.path, &token).await? else {
            debug!("Log file {} never appeared", target.path.display());
            return Ok(0);
        };
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }

        let mut reader = BufReader::new(file);
        let mut partial = Vec::new();
        let mut batch: Vec<String> = Vec::new();
        let mut written = 0;

        loop {
            // Observed before the pass so the last pass sees everything
            // written up to the cancellation
            let last_pass = token.is_cancelled();

            read_to_eof(&mut reader, &mut partial, &mut batch).await?;
            if last_pass && !partial.is_empty() {
                push_line(&partial, &mut batch);
                partial.clear();
            }

            if !batch.is_empty() {
                match self
                    .logs
                    .add_entries(target.stack_id, target.deployment_id, &batch)
                    .await
                {
                    Ok(count) => {
                        written += count;
                        batch.clear();
                    }
                    Err(source) if last_pass => {
                        return Err(IngestError::Persist {
                            lines: batch.len(),
                            source,
                        });
                    }
                    Err(e) => {
                        // Kept for the next pass
                        warn!("Failed to persist {} log lines, retrying: {:#}", batch.len(), e);
                    }
                }
            }

            if last_pass {
                debug!(
                    "Ingested {} log lines for deployment {}",
                    written, target.deployment_id
                );
                return Ok(written);
            }

            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(self.idle_interval) => {}
            }
        }
    }

    /// Poll until the file exists; `None` if cancelled first
    async fn wait_for_file(
        &self,
        path: &Path,
        token: &CancellationToken,
    ) -> Result<Option<File>, IngestError> {
        loop {
            match File::open(path).await {
                Ok(file) => return Ok(Some(file)),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }

            if token.is_cancelled() {
                return Ok(None);
            }

            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Read complete lines into `batch` until end of file
///
/// Bytes after the last newline stay in `partial` and are completed by a
/// later pass.
async fn read_to_eof(
    reader: &mut BufReader<File>,
    partial: &mut Vec<u8>,
    batch: &mut Vec<String>,
) -> std::io::Result<()> {
    loop {
        let read = reader.read_until(b'\n', partial).await?;
        if read == 0 || partial.last() != Some(&b'\n') {
            return Ok(());
        }
        push_line(partial, batch);
        partial.clear();
    }
}

fn push_line(raw: &[u8], batch: &mut Vec<String>) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\r', '\n']);
    if !line.is_empty() {
        batch.push(line.to_string());
    }
}
