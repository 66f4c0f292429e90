use super::error::ProcessError;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Launches child processes with an optional deadline and cancellation token.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Spawns `program` with `args` passed verbatim, one token each.
    pub fn run<I, S>(&self, program: &str, args: I) -> Result<ProcessHandle, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;

        debug!("Spawned {} (pid {:?})", program, child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::MissingStdout(program.to_string()))?;

        // Drained in the background so a full stderr pipe never stalls the child.
        let stderr_task = child.stderr.take().map(|stderr| {
            let program = program.to_string();
            tokio::spawn(async move {
                let mut collected = Vec::new();
                let mut lines = LossyLines::new(stderr);
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => collected.push(line),
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Failed to read stderr of {}: {}", program, e);
                            // Keep the pipe open until the child closes it.
                            let _ = tokio::io::copy(&mut lines.reader, &mut tokio::io::sink())
                                .await;
                            break;
                        }
                    }
                }
                collected
            })
        });

        Ok(ProcessHandle {
            program: program.to_string(),
            child,
            stdout: Some(LossyLines::new(stdout)),
            stderr_task,
            timeout: self.timeout,
            deadline: self.timeout.map(|t| Instant::now() + t),
            cancel: self.cancel.clone().unwrap_or_default(),
        })
    }
}

/// Newline-delimited reader that decodes each line lossily, so stray
/// non-UTF-8 bytes in titles or paths never end the stream.
struct LossyLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LossyLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Partially read bytes stay in `buf`, so an interrupted call can be retried.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        let mut line = self.buf.as_slice();
        if let Some(stripped) = line.strip_suffix(b"\n") {
            line = stripped;
        }
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }

        let decoded = String::from_utf8_lossy(line).into_owned();
        self.buf.clear();
        Ok(Some(decoded))
    }
}

/// Exit information collected once the child has terminated.
#[derive(Debug)]
pub struct ProcessExit {
    pub status: ExitStatus,
    pub stderr: Vec<String>,
}

impl ProcessExit {
    /// `None` when the child was terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// A running child, exclusively owned by the operation that spawned it.
///
/// Dropping the handle kills the child, so an early return never leaves a
/// process behind.
pub struct ProcessHandle {
    program: String,
    child: Child,
    stdout: Option<LossyLines<ChildStdout>>,
    stderr_task: Option<JoinHandle<Vec<String>>>,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl ProcessHandle {
    /// Next stdout line, or `None` once the child closed its output.
    pub async fn next_line(&mut self) -> Result<Option<String>, ProcessError> {
        if self.stdout.is_none() {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(self.terminate(ProcessError::Cancelled).await);
        }
        let Some(lines) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let deadline = self.deadline;
        let timed_out = ProcessError::TimedOut(self.timeout.unwrap_or_default());
        let result = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(ProcessError::Cancelled),
            _ = sleep_until(deadline) => Err(timed_out),
            line = lines.next_line() => line.map_err(ProcessError::from),
        };

        match result {
            Ok(Some(line)) => Ok(Some(line)),
            Ok(None) => {
                self.stdout = None;
                Ok(None)
            }
            Err(e) => Err(self.terminate(e).await),
        }
    }

    /// Closes stdout, waits for the child to exit and collects its stderr.
    pub async fn finish(mut self) -> Result<ProcessExit, ProcessError> {
        self.stdout = None;

        if self.cancel.is_cancelled() {
            return Err(self.terminate(ProcessError::Cancelled).await);
        }

        let deadline = self.deadline;
        let timed_out = ProcessError::TimedOut(self.timeout.unwrap_or_default());
        // A child that already exited is never reported as timed out.
        let waited = match self.child.try_wait() {
            Ok(Some(status)) => Ok(status),
            _ => tokio::select! {
                biased;

                _ = self.cancel.cancelled() => Err(ProcessError::Cancelled),
                status = self.child.wait() => status.map_err(ProcessError::from),
                _ = sleep_until(deadline) => Err(timed_out),
            },
        };

        let status = match waited {
            Ok(status) => status,
            Err(e) => return Err(self.terminate(e).await),
        };

        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        debug!("{} exited with {}", self.program, status);
        Ok(ProcessExit { status, stderr })
    }

    async fn terminate(&mut self, reason: ProcessError) -> ProcessError {
        warn!("Terminating {}: {}", self.program, reason);
        self.stdout = None;
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill {}: {}", self.program, e);
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        reason
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
