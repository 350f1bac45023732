//! Capture subprocess lifecycle: spawn, cooperative stop, bounded wait,
//! forced termination.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::capture::{self, CaptureCommandBuilder, CAPTURE_TOOL};
use crate::config::SessionConfig;
use crate::error::{CastError, Result};

/// How long `stop()` waits for a graceful exit before force-killing.
const STOP_TIMEOUT: Duration = Duration::from_secs(90);

/// Poll interval while waiting for the child to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle state of the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Running,
    Stopping,
}

/// How a capture subprocess ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The capture tool honored the stop token and flushed its output.
    Graceful,
    /// The capture tool ignored the stop token past the timeout and was
    /// killed. Output may be truncated.
    Forced,
}

/// Owns the background capture subprocess for one session.
pub struct Recorder {
    config: SessionConfig,
    program: Option<PathBuf>,
    child: Option<Child>,
    status: RecorderStatus,
    stop_timeout: Duration,
}

impl Recorder {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            program: None,
            child: None,
            status: RecorderStatus::Idle,
            stop_timeout: STOP_TIMEOUT,
        })
    }

    /// Use a specific capture executable instead of searching PATH.
    pub fn with_capture_program(mut self, program: PathBuf) -> Self {
        self.program = Some(program);
        self
    }

    /// Override the graceful-stop timeout.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn status(&self) -> RecorderStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Launch the capture subprocess. Exactly one capture per recorder;
    /// calling start while a capture is live is an error.
    pub fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Err(CastError::AlreadyRunning);
        }

        let program = match &self.program {
            Some(path) => path.clone(),
            None => capture::find_tool(CAPTURE_TOOL)
                .ok_or(CastError::ToolMissing { tool: CAPTURE_TOOL })?,
        };

        let builder = CaptureCommandBuilder::from_config(&self.config);
        info!(target = %format!("{}:{}", self.config.host, self.config.display),
              output = %self.config.output_path().display(),
              "starting capture");

        // stdin stays piped: it is the stop channel.
        let child = capture::capture_command(&program, &builder)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CastError::Capture(format!("failed to launch {}: {}", CAPTURE_TOOL, e)))?;

        info!(pid = child.id(), "capture started");
        self.child = Some(child);
        self.status = RecorderStatus::Running;
        Ok(())
    }

    /// Ask the capture subprocess to finish. Writes the stop token on the
    /// child's stdin and closes the pipe; the tool flushes its output and
    /// exits on its own. Never terminates the child directly.
    pub fn flag_for_stop(&mut self) -> Result<()> {
        let child = self.child.as_mut().ok_or(CastError::NotRunning)?;
        if let Some(mut stdin) = child.stdin.take() {
            // Write may fail if the child already exited; closing the pipe
            // is the signal either way.
            if let Err(e) = stdin.write_all(b"q") {
                warn!("stop token not delivered: {}", e);
            }
        }
        self.status = RecorderStatus::Stopping;
        Ok(())
    }

    /// Stop the capture: flag it, wait up to the stop timeout for a
    /// graceful exit, then force-kill once. The subprocess is gone when
    /// this returns.
    pub fn stop(&mut self) -> Result<StopOutcome> {
        self.flag_for_stop()?;
        let child = self.child.take().ok_or(CastError::NotRunning)?;
        let outcome = shutdown_child(child, self.stop_timeout)?;
        match outcome {
            StopOutcome::Graceful => info!("capture exited gracefully"),
            StopOutcome::Forced => warn!("capture ignored stop token, killed"),
        }
        self.status = RecorderStatus::Idle;
        Ok(outcome)
    }

    /// Stop, then start again with the same configuration.
    pub fn restart(&mut self) -> Result<()> {
        self.stop()?;
        self.start()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Wait for a child whose stop signal has already been sent. Polls for up
/// to `timeout`, then kills and reaps it. Exactly one kill attempt.
fn shutdown_child(mut child: Child, timeout: Duration) -> Result<StopOutcome> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(_) => return Ok(StopOutcome::Graceful),
            None if Instant::now() >= deadline => break,
            None => std::thread::sleep(POLL_INTERVAL),
        }
    }

    child
        .kill()
        .map_err(|e| CastError::Capture(format!("failed to kill capture process: {}", e)))?;
    child.wait()?;
    Ok(StopOutcome::Forced)
}
