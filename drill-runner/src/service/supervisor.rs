//! Process supervisor
//!
//! Runs one shell invocation with a hard wall-clock limit while its combined
//! stdout/stderr flows through a [`LogStreamer`]. The supervision loop reacts
//! to the deadline, process exit, and streamed log chunks, in that priority.

use futures::future::OptionFuture;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StepError;
use crate::service::log_streamer::LogStreamer;

/// How long to wait for output pipes to drain after the shell exits
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// One supervised command
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    /// Shell command line, run after changing into `work_dir`
    pub command: &'a str,
    pub work_dir: &'a Path,
    /// Extra environment for this subprocess only
    pub env: Vec<(&'static str, String)>,
    pub timeout: Duration,
}

impl Invocation<'_> {
    /// The single `sh -c` script: change directory, then run the command
    ///
    /// The command is grouped so that every part of a compound command line
    /// depends on the `cd`.
    pub fn script(&self) -> String {
        format!(
            "cd {} && {{\n{}\n}}",
            shell_quote(&self.work_dir.to_string_lossy()),
            self.command
        )
    }
}

/// Runs `invocation` to completion, timeout, or spawn failure
///
/// Each chunk received on `chunks` is passed to `on_chunk` while the process
/// runs, one at a time; a slow `on_chunk` never delays the deadline. On
/// timeout any in-flight `on_chunk` is abandoned, the whole process group is
/// killed and [`StepError::Timeout`] is returned, distinct from the
/// [`StepError::Command`] returned for an unsuccessful exit.
pub async fn run<F, Fut>(
    invocation: Invocation<'_>,
    streamer: &Arc<LogStreamer>,
    mut chunks: mpsc::Receiver<String>,
    mut on_chunk: F,
) -> Result<(), StepError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ()>,
{
    let script = invocation.script();
    debug!(script = %script, "Spawning supervised command");

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&script)
        .envs(invocation.env.iter().map(|(key, value)| (*key, value.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(StepError::Spawn)?;

    let mut pumps = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(pump(stdout, Arc::clone(streamer)));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(pump(stderr, Arc::clone(streamer)));
    }

    let deadline = tokio::time::sleep(invocation.timeout);
    tokio::pin!(deadline);
    let mut in_flight: Option<Pin<Box<Fut>>> = None;
    let mut chunks_open = true;

    loop {
        tokio::select! {
            biased;

            _ = &mut deadline => {
                warn!(timeout = ?invocation.timeout, "Supervised command timed out, killing it");
                kill_tree(&mut child).await;
                for pump in &pumps {
                    pump.abort();
                }
                break Err(StepError::Timeout(invocation.timeout));
            }

            status = child.wait() => {
                drain(pumps).await;
                if let Some(report) = in_flight.take() {
                    report.await;
                }
                break match status {
                    Ok(status) if status.success() => {
                        info!("Supervised command succeeded");
                        Ok(())
                    }
                    Ok(status) => Err(StepError::Command(status.to_string())),
                    Err(e) => Err(StepError::Command(format!("failed to wait for process: {}", e))),
                };
            }

            Some(()) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                in_flight = None;
            }

            chunk = chunks.recv(), if in_flight.is_none() && chunks_open => match chunk {
                Some(chunk) => in_flight = Some(Box::pin(on_chunk(chunk))),
                None => chunks_open = false,
            },
        }
    }
}

fn pump<R>(mut reader: R, streamer: Arc<LogStreamer>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => streamer.write(&buf[..n]),
                Err(e) => {
                    debug!("Output pipe closed with error: {}", e);
                    break;
                }
            }
        }
    })
}

/// Waits for the output pumps, giving up on pipes held open by stray children
async fn drain(pumps: Vec<JoinHandle<()>>) {
    for pump in pumps {
        let abort = pump.abort_handle();
        if tokio::time::timeout(PIPE_DRAIN_GRACE, pump).await.is_err() {
            debug!("Output pipe still open after exit, abandoning it");
            abort.abort();
        }
    }
}

/// Kills the shell and everything it started
async fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // The shell leads its own process group; signal the whole group
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            warn!("Failed to kill process group {}: {}", pid, e);
        }
    }

    if let Err(e) = child.kill().await {
        debug!("Failed to kill supervised command: {}", e);
    }
}

/// Quotes `value` for safe interpolation into a POSIX shell script
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
