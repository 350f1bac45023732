//! Post-processing pipeline: encode, measure duration, generate cuepoints,
//! inject them into the container, clean up.
//!
//! Steps run strictly in order; each step's output path is the next step's
//! input. No step is retried: any failure aborts the remaining steps and a
//! best-effort sweep removes partial artifacts.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::capture::find_tool;
use crate::config::{Codec, SessionConfig};
use crate::cuepoints;
use crate::error::{CastError, Result};
use crate::probe;

/// Name of the container metadata injector.
pub const INJECT_TOOL: &str = "flvtool2";

/// Maximum output width when downscaling is requested.
pub const DOWNSCALE_WIDTH: u32 = 1024;

const TOOL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the five-step post-processing pipeline over a finished capture.
pub struct PostProcessor {
    config: SessionConfig,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    injector: PathBuf,
    tool_timeout: Duration,
}

impl PostProcessor {
    /// Locate the external tools in PATH and build a processor.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let ffmpeg = find_tool("ffmpeg").ok_or(CastError::ToolMissing { tool: "ffmpeg" })?;
        let ffprobe = find_tool("ffprobe").ok_or(CastError::ToolMissing { tool: "ffprobe" })?;
        let injector =
            find_tool(INJECT_TOOL).ok_or(CastError::ToolMissing { tool: INJECT_TOOL })?;
        Ok(Self::with_tools(config, ffmpeg, ffprobe, injector))
    }

    /// Build a processor with explicit tool locations.
    pub fn with_tools(
        config: SessionConfig,
        ffmpeg: PathBuf,
        ffprobe: PathBuf,
        injector: PathBuf,
    ) -> Self {
        let tool_timeout = Duration::from_secs(config.tool_timeout_secs);
        Self {
            config,
            ffmpeg,
            ffprobe,
            injector,
            tool_timeout,
        }
    }

    /// Run the full pipeline. Returns the final output path. On failure the
    /// transient temp and cuepoint files are swept away before the error
    /// propagates.
    pub fn process(&self, downscale: bool) -> Result<PathBuf> {
        info!("starting video processing");
        let result = self.run(downscale);
        if result.is_err() {
            let _ = fs::remove_file(self.config.cuepoint_path());
            let _ = fs::remove_file(self.config.temp_path());
        }
        result
    }

    fn run(&self, downscale: bool) -> Result<PathBuf> {
        self.encode(downscale)?;

        let duration = probe::measure_duration(&self.ffprobe, &self.config.temp_path())?;
        info!(duration, "measured encoded duration");

        let cues = cuepoints::generate(duration, self.config.cue_interval);
        info!(count = cues.len(), "writing cuepoints");
        cuepoints::write_document(&self.config.cuepoint_path(), &cues)?;

        self.inject_metadata()?;
        self.cleanup()?;
        Ok(self.config.output_path())
    }

    /// Re-encode the capture into the temp file, forcing keyframes at the
    /// configured interval and optionally downscaling.
    fn encode(&self, downscale: bool) -> Result<()> {
        let source = self.config.output_path();

        let resize = if downscale {
            let (width, height) = probe::probe_dimensions(&self.ffmpeg, &source)?;
            info!(width, height, "downscaling requested, probed source size");
            target_size(width, height)
        } else {
            None
        };

        let mut args: Vec<String> = vec![
            "-y".to_string(),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
        ];
        args.extend(match self.config.codec {
            Codec::Flv => generic_preset(self.config.keyframe_interval()),
            Codec::H264 => h264_baseline_preset(self.config.keyframe_interval()),
        });
        if let Some((width, height)) = resize {
            info!(width, height, "size after downscaling");
            args.push("-s".to_string());
            args.push(format!("{}x{}", width, height));
        }
        args.push(self.config.temp_path().to_string_lossy().to_string());

        run_tool("ffmpeg", &self.ffmpeg, &args, self.tool_timeout)
    }

    /// Merge the cuepoint document into the temp file, producing the final
    /// named output.
    fn inject_metadata(&self) -> Result<()> {
        let args = vec![
            "-AUt".to_string(),
            self.config.cuepoint_path().to_string_lossy().to_string(),
            self.config.temp_path().to_string_lossy().to_string(),
            self.config.output_path().to_string_lossy().to_string(),
        ];
        run_tool(INJECT_TOOL, &self.injector, &args, self.tool_timeout)
    }

    /// Delete the two transient files; only the final output remains.
    fn cleanup(&self) -> Result<()> {
        fs::remove_file(self.config.cuepoint_path())?;
        fs::remove_file(self.config.temp_path())?;
        Ok(())
    }
}

/// Downscaled size preserving aspect ratio, capped at [`DOWNSCALE_WIDTH`].
/// `None` when the probe failed (zero dimension) or the video is already
/// at or below the cap. Height is truncated, then bumped to even: the
/// codec requires it.
pub fn target_size(width: u32, height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || width <= DOWNSCALE_WIDTH {
        return None;
    }
    let new_width = DOWNSCALE_WIDTH;
    let mut new_height = ((f64::from(new_width) / f64::from(width)) * f64::from(height)) as u32;
    if new_height % 2 != 0 {
        new_height += 1;
    }
    Some((new_width, new_height))
}

/// Generic high-quality preset: keyframes only, quality pinned.
fn generic_preset(keyframe_interval: u32) -> Vec<String> {
    vec![
        "-g".to_string(),
        keyframe_interval.to_string(),
        "-qscale:v".to_string(),
        "0".to_string(),
    ]
}

/// Constrained-baseline libx264 preset for wider player compatibility.
fn h264_baseline_preset(keyframe_interval: u32) -> Vec<String> {
    [
        "-vcodec", "libx264",
        "-coder", "0",
        "-flags", "-loop",
        "-cmp", "+chroma",
        "-partitions", "-parti8x8-parti4x4-partp8x8-partb8x8",
        "-me_method", "dia",
        "-subq", "0",
        "-me_range", "16",
        "-g", &keyframe_interval.to_string(),
        "-keyint_min", "25",
        "-sc_threshold", "0",
        "-i_qfactor", "0.71",
        "-b_strategy", "0",
        "-qcomp", "0.6",
        "-qmin", "10",
        "-qmax", "51",
        "-qdiff", "4",
        "-bf", "0",
        "-refs", "1",
        "-directpred", "1",
        "-trellis", "0",
        "-flags2", "-bpyramid-mixed_refs-wpred-dct8x8+fastpskip-mbtree",
        "-wpredp", "0",
        "-aq_mode", "0",
        "-crf", "30",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Run an external tool to completion with a timeout. Nonzero exit is an
/// error carrying the tool's stderr; exceeding the timeout kills the tool.
fn run_tool(tool: &'static str, program: &Path, args: &[String], timeout: Duration) -> Result<()> {
    debug!(%tool, ?args, "running external tool");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain stderr off-thread so a chatty tool cannot fill the pipe.
    let stderr = child.stderr.take();
    let drain = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_end(&mut buf);
        }
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CastError::ToolTimedOut { tool, timeout });
            }
            None => std::thread::sleep(TOOL_POLL_INTERVAL),
        }
    };

    let stderr_buf = drain.join().unwrap_or_default();
    if !status.success() {
        return Err(CastError::ToolFailed {
            tool,
            status,
            stderr: String::from_utf8_lossy(&stderr_buf).to_string(),
        });
    }
    Ok(())
}
