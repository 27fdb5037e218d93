#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Supervised child processes with bounded output and a hard deadline.

use std::{
    ffi::{OsStr, OsString},
    process::Stdio,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader},
    process::{Child, Command},
    time::timeout,
};
use tracing::debug;

/// Upper bound on how many bytes of each stream are kept in memory. Anything
/// past this is drained and discarded so the child never blocks on a full pipe.
pub const MAX_CAPTURE_BYTES: u64 = 4 * 1024 * 1024;

/// How long stdout/stderr may stay open once the child has exited. A
/// grandchild that inherited the pipes can hold them open indefinitely.
pub const PIPE_GRACE: Duration = Duration::from_millis(250);

/// Output collected so far from one stream.
type Captured = Arc<Mutex<Vec<u8>>>;

/// Drop guard that terminates a spawned child process if it is still running
/// when the guard goes out of scope (deadline elapsed, task cancelled).
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process with the drop guard.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> anyhow::Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process.
    pub status:  std::process::ExitStatus,
    /// Contents written to stdout.
    pub stdout:  Vec<u8>,
    /// Contents written to stderr.
    pub stderr:  Vec<u8>,
    /// Wall-clock time between spawn and exit.
    pub elapsed: Duration,
}

/// How a supervised subprocess ended.
#[derive(Debug)]
pub enum Finished {
    /// The process exited on its own before the deadline.
    Exited(Collected),
    /// The deadline elapsed and the process was killed.
    TimedOut {
        /// The budget that was exceeded.
        limit: Duration,
    },
}

/// Reads a stream into `captured`, keeping at most [`MAX_CAPTURE_BYTES`] and
/// draining the rest.
async fn capture<R: AsyncRead + Unpin>(stream: R, captured: Captured) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let mut chunk = [0u8; 8 * 1024];
    loop {
        let read = reader
            .read(&mut chunk)
            .await
            .context("failed to read child output")?;
        if read == 0 {
            return Ok(());
        }
        let mut buf = captured
            .lock()
            .map_err(|_| anyhow!("capture buffer poisoned"))?;
        let room = (MAX_CAPTURE_BYTES as usize).saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..read.min(room)]);
    }
}

/// Takes everything captured so far.
fn take(captured: &Captured) -> Result<Vec<u8>> {
    let mut buf = captured
        .lock()
        .map_err(|_| anyhow!("capture buffer poisoned"))?;
    Ok(std::mem::take(&mut *buf))
}

/// Spawns a command, writes `stdin` to it, and collects stdout/stderr.
///
/// The child is killed once `deadline` elapses; that case is reported as
/// [`Finished::TimedOut`] rather than as an error so callers can grade it.
/// Once the child exits, its pipes get [`PIPE_GRACE`] to reach end of file;
/// whatever was read by then is returned.
pub async fn run_collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    stdin: Vec<u8>,
    deadline: Duration,
) -> Result<Finished> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let mut guard = ChildDropGuard::new(cmd.spawn().context("failed to spawn process")?);

    if let Some(mut handle) = guard.child_mut()?.stdin.take() {
        tokio::spawn(async move {
            if !stdin.is_empty() {
                let _ = handle.write_all(&stdin).await;
            }
            let _ = handle.shutdown().await;
        });
    }

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .context("missing stdout pipe")?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;

    let out_buf = Captured::default();
    let err_buf = Captured::default();
    let out_task = tokio::spawn(capture(stdout, out_buf.clone()));
    let err_task = tokio::spawn(capture(stderr, err_buf.clone()));
    let aborts = [out_task.abort_handle(), err_task.abort_handle()];
    let stop_capture = [out_task.abort_handle(), err_task.abort_handle()];

    let wait_future = async move {
        let mut guard = guard;
        let status = guard
            .child_mut()?
            .wait()
            .await
            .context("failed to wait on process")?;
        let elapsed = started.elapsed();
        guard.disarm();

        let drained = async {
            out_task.await.context("stdout task join error")??;
            err_task.await.context("stderr task join error")??;
            anyhow::Ok(())
        };
        match timeout(PIPE_GRACE, drained).await {
            Ok(drained) => drained?,
            Err(_) => {
                debug!("child exited but its output pipes stayed open; keeping what was read");
                stop_capture.iter().for_each(|task| task.abort());
            }
        }

        Ok(Collected {
            status,
            stdout: take(&out_buf)?,
            stderr: take(&err_buf)?,
            elapsed,
        })
    };

    match timeout(deadline, wait_future).await {
        Ok(collected) => collected.map(Finished::Exited),
        Err(_) => {
            aborts.iter().for_each(|task| task.abort());
            Ok(Finished::TimedOut { limit: deadline })
        }
    }
}
