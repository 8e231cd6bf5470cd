//! Invocation of external collaborator executables.
//!
//! The collaborator runs in the project root with stdout and stderr captured.
//! A non-zero exit becomes `CollaboratorFailed` carrying the exit code and
//! stderr verbatim.

use crate::error::{Result, SeedError};
use crate::probe::ToolAvailability;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

/// Captured output is capped to this many bytes per stream (keeping the tail).
const MAX_OUTPUT: usize = 10 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorOutput {
    pub tool: String,
    pub args: Vec<String>,
    /// `None` when the process was killed (timeout or signal).
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub timed_out: bool,
}

impl CollaboratorOutput {
    /// Convert a failed run into `CollaboratorFailed`.
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(self.to_error())
        }
    }

    pub fn to_error(&self) -> SeedError {
        SeedError::CollaboratorFailed {
            tool: self.tool.clone(),
            exit_code: self.exit_code,
            stderr: self.stderr.clone(),
        }
    }
}

/// Run an available collaborator with `args`.
///
/// Returns the captured output whatever happened to the process: a non-zero
/// exit, a timeout and a failure to spawn all come back as an unsuccessful
/// [`CollaboratorOutput`] so callers can record them. Use
/// [`CollaboratorOutput::into_result`] to turn failures into errors. Only an
/// absent tool is an `Err` here.
pub fn run(
    tool: &ToolAvailability,
    args: &[String],
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<CollaboratorOutput> {
    let Some(program) = tool.path.as_deref().filter(|_| tool.present) else {
        return Err(SeedError::CollaboratorUnavailable(tool.tool.clone()));
    };

    tracing::info!(tool = %tool.tool, ?args, "running collaborator");
    let start = Instant::now();
    let unsuccessful = |stdout: String, stderr: String, timed_out: bool| CollaboratorOutput {
        tool: tool.tool.clone(),
        args: args.to_vec(),
        exit_code: None,
        success: false,
        stdout: cap_tail(&stdout),
        stderr: cap_tail(&stderr),
        duration_ms: start.elapsed().as_millis() as u64,
        timed_out,
    };

    let spawned = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(tool = %tool.tool, error = %e, "collaborator failed to spawn");
            return Ok(unsuccessful(String::new(), format!("failed to spawn: {e}"), false));
        }
    };

    let child_pid = child.id();

    // Drain pipes in dedicated threads so a chatty child cannot fill the
    // pipe buffer and block forever.
    let stdout = Drain::spawn(child.stdout.take());
    let stderr = Drain::spawn(child.stderr.take());

    let wait_result = match timeout {
        None => child.wait(),
        Some(limit) => {
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });
            match rx.recv_timeout(limit) {
                Ok(result) => result,
                Err(_) => {
                    // A grandchild may still hold the pipes open, so the
                    // readers only get a short grace period after the kill.
                    kill_process(child_pid);
                    tracing::warn!(tool = %tool.tool, "collaborator timed out");
                    let out = stdout.collect(Some(KILL_GRACE));
                    let mut err = stderr.collect(Some(KILL_GRACE));
                    err.push_str(&format!("\ntimed out after {}s", limit.as_secs_f64()));
                    return Ok(unsuccessful(out, err, true));
                }
            }
        }
    };

    let stdout = stdout.collect(None);
    let stderr = stderr.collect(None);

    let status = match wait_result {
        Ok(status) => status,
        Err(e) => return Ok(unsuccessful(stdout, format!("{stderr}\nwait failed: {e}"), false)),
    };

    let output = CollaboratorOutput {
        tool: tool.tool.clone(),
        args: args.to_vec(),
        exit_code: status.code(),
        success: status.success(),
        stdout: cap_tail(&stdout),
        stderr: cap_tail(&stderr),
        duration_ms: start.elapsed().as_millis() as u64,
        timed_out: false,
    };
    tracing::debug!(
        tool = %output.tool,
        exit_code = ?output.exit_code,
        duration_ms = output.duration_ms,
        "collaborator finished"
    );
    Ok(output)
}

/// How long readers may keep draining after a timed-out child is killed.
const KILL_GRACE: Duration = Duration::from_millis(250);

/// A pipe being read on its own thread into a shared buffer, so whatever
/// arrived so far can be taken even if the pipe never reaches EOF.
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(handle: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&buf);
        std::thread::spawn(move || {
            if let Some(mut reader) = handle {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut b) = sink.lock() {
                                b.extend_from_slice(&chunk[..n]);
                                // Only the tail is ever kept.
                                if b.len() > 4 * MAX_OUTPUT {
                                    let excess = b.len() - 2 * MAX_OUTPUT;
                                    b.drain(..excess);
                                }
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            }
            let _ = tx.send(());
        });
        Self { buf, done }
    }

    /// Wait for EOF (at most `limit` when given) and return what was read.
    fn collect(self, limit: Option<Duration>) -> String {
        match limit {
            None => {
                let _ = self.done.recv();
            }
            Some(limit) => {
                let _ = self.done.recv_timeout(limit);
            }
        }
        let bytes = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Trim and keep the last `MAX_OUTPUT` bytes, on a char boundary.
fn cap_tail(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() <= MAX_OUTPUT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_OUTPUT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

/// Well-known locations of `kill`, tried before the search path so a
/// stripped `PATH` cannot leave a timed-out child running.
const KILL_CANDIDATES: &[&str] = &["/bin/kill", "/usr/bin/kill"];

fn kill_program(candidates: &[&str]) -> PathBuf {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .unwrap_or_else(|| PathBuf::from("kill"))
}

/// Terminate a process by PID using SIGKILL. Best-effort; errors are ignored.
fn kill_process(pid: u32) {
    let _ = Command::new(kill_program(KILL_CANDIDATES))
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}
