//! Per-process supervising task
//!
//! Owns the `Child` and both output pipes. A single `select!` loop drains
//! stdout and stderr, reaps the child, and serves control messages, so a
//! full pipe on one stream can never block the other or the caller's writes.
//! Progress is published on a `watch` channel that `stop` waits on.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::buffer::CaptureBuffers;
use crate::state::StreamKind;

const READ_CHUNK: usize = 8 * 1024;

/// How the child ended, as far as the OS tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Latest state published by the supervising task
#[derive(Debug, Clone)]
pub(crate) struct Progress {
    /// Spawn time, then the arrival of the most recent output chunk
    pub last_activity: Instant,
    pub exit: Option<ExitInfo>,
    pub exited_at: Option<Instant>,
    /// Child reaped and both pipes closed; the task is done
    pub drained: bool,
}

/// Requests from the handle to the supervising task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    /// Stop capturing one output stream
    Close(StreamKind),
    /// Kill the direct child
    Kill,
}

/// Handle-side end of the supervising task
#[derive(Debug)]
pub(crate) struct Supervisor {
    progress: watch::Receiver<Progress>,
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

impl Supervisor {
    /// Start supervising a freshly spawned child
    pub(crate) fn start(
        child: Child,
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
        buffers: CaptureBuffers,
        pid: u32,
    ) -> Self {
        let (progress_tx, progress) = watch::channel(Progress {
            last_activity: Instant::now(),
            exit: None,
            exited_at: None,
            drained: false,
        });
        let (control, control_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(supervise(
            child,
            stdout,
            stderr,
            buffers,
            progress_tx,
            control_rx,
            pid,
        ));

        Self {
            progress,
            control,
            task,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.clone()
    }

    pub(crate) fn snapshot(&self) -> Progress {
        self.progress.borrow().clone()
    }

    pub(crate) fn close(&self, stream: StreamKind) {
        self.send(Control::Close(stream));
    }

    pub(crate) fn kill(&self) {
        self.send(Control::Kill);
    }

    fn send(&self, message: Control) {
        // The task may already have finished; nothing left to control then.
        if self.control.send(message).is_err() {
            debug!(message = ?message, "Supervisor already finished");
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // Dropping the task drops the Child, and kill_on_drop reaps it.
        self.task.abort();
    }
}

async fn supervise(
    mut child: Child,
    mut stdout: Option<ChildStdout>,
    mut stderr: Option<ChildStderr>,
    buffers: CaptureBuffers,
    progress: watch::Sender<Progress>,
    mut control: mpsc::UnboundedReceiver<Control>,
    pid: u32,
) {
    let mut out_chunk = vec![0u8; READ_CHUNK];
    let mut err_chunk = vec![0u8; READ_CHUNK];
    let mut exited = false;
    let mut control_open = true;

    while !(exited && stdout.is_none() && stderr.is_none()) {
        tokio::select! {
            read = read_some(&mut stdout, &mut out_chunk), if stdout.is_some() => {
                if !capture(read, StreamKind::Output, &out_chunk, &buffers, &progress, pid) {
                    stdout = None;
                }
            }
            read = read_some(&mut stderr, &mut err_chunk), if stderr.is_some() => {
                if !capture(read, StreamKind::Error, &err_chunk, &buffers, &progress, pid) {
                    stderr = None;
                }
            }
            status = child.wait(), if !exited => {
                exited = true;
                let info = match status {
                    Ok(status) => ExitInfo::from(status),
                    Err(e) => {
                        warn!(pid = %pid, error = %e, "Error waiting for process");
                        ExitInfo::default()
                    }
                };
                debug!(pid = %pid, code = ?info.code, signal = ?info.signal, "Process exited");
                progress.send_modify(|p| {
                    p.exit = Some(info);
                    p.exited_at = Some(Instant::now());
                });
            }
            message = control.recv(), if control_open => {
                match message {
                    Some(Control::Close(StreamKind::Output)) => stdout = None,
                    Some(Control::Close(StreamKind::Error)) => stderr = None,
                    Some(Control::Close(StreamKind::Input)) => {}
                    Some(Control::Kill) if !exited => {
                        if let Err(e) = child.start_kill() {
                            debug!(pid = %pid, error = %e, "start_kill failed");
                        }
                    }
                    Some(Control::Kill) => {}
                    None => control_open = false,
                }
            }
        }
    }

    progress.send_modify(|p| p.drained = true);
    debug!(pid = %pid, "Supervisor finished");
}

/// Record one read result. Returns false once the stream is finished.
fn capture(
    read: io::Result<usize>,
    stream: StreamKind,
    chunk: &[u8],
    buffers: &CaptureBuffers,
    progress: &watch::Sender<Progress>,
    pid: u32,
) -> bool {
    match read {
        Ok(0) => false,
        Ok(n) => {
            buffers.append(stream, &chunk[..n]);
            progress.send_modify(|p| p.last_activity = Instant::now());
            true
        }
        Err(e) => {
            warn!(pid = %pid, stream = %stream, error = %e, "Read failed; stream closed");
            false
        }
    }
}

async fn read_some<R>(reader: &mut Option<R>, chunk: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.read(chunk).await,
        None => std::future::pending().await,
    }
}
