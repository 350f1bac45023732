//! External metadata probes: frame dimensions from the transcoder's
//! diagnostic output, duration from the metadata reader's JSON.

use std::path::Path;
use std::process::Command;

use regex::Regex;
use serde::Deserialize;

use crate::error::{CastError, Result};

/// Probe the video's frame dimensions by running `ffmpeg -i` and scanning
/// its diagnostic output. Returns (0, 0) when no video stream line matches;
/// callers treat that as "probe failed, keep native resolution".
pub fn probe_dimensions(ffmpeg: &Path, video: &Path) -> Result<(u32, u32)> {
    // ffmpeg -i with no output file always exits nonzero; only the
    // stream description on stderr matters here.
    let output = Command::new(ffmpeg).arg("-i").arg(video).output()?;
    let text = String::from_utf8_lossy(&output.stderr);
    Ok(parse_dimensions(&text).unwrap_or((0, 0)))
}

/// Scan transcoder diagnostics for the video stream's `WxH` description.
pub fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let pattern = Regex::new(r"Stream.*Video.* (\d+)x(\d+)").ok()?;
    let caps = pattern.captures(text)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some((width, height))
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

/// Measure the video's duration with ffprobe, rounded to the nearest
/// whole second.
pub fn measure_duration(ffprobe: &Path, video: &Path) -> Result<u32> {
    let output = Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(video)
        .output()?;

    if !output.status.success() {
        return Err(CastError::ToolFailed {
            tool: "ffprobe",
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the format-level duration field from ffprobe's JSON output.
/// Output that does not parse, or that lacks a duration, is a data-format
/// error carrying the raw text.
pub fn parse_duration(json: &str) -> Result<u32> {
    let parse_err = || CastError::MetadataParse {
        raw: json.to_string(),
    };

    let probe: FfprobeOutput = serde_json::from_str(json).map_err(|_| parse_err())?;
    let duration: f64 = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse().ok())
        .ok_or_else(parse_err)?;

    Ok(duration.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FFMPEG_BANNER: &str = "Input #0, flv, from 'capture.flv':\n  Duration: 00:00:12.60, start: 0.000000, bitrate: 371 kb/s\n    Stream #0:0: Video: flv1, yuv420p, 1920x1080, 12 fps, 12 tbr, 1k tbn\n";

    #[test]
    fn parses_dimensions_from_stream_line() {
        assert_eq!(parse_dimensions(FFMPEG_BANNER), Some((1920, 1080)));
    }

    #[test]
    fn no_video_stream_means_no_dimensions() {
        assert_eq!(parse_dimensions("Stream #0:0: Audio: mp3"), None);
        assert_eq!(parse_dimensions(""), None);
    }

    #[test]
    fn duration_rounds_to_nearest_second() {
        let up = r#"{"format": {"duration": "12.6"}}"#;
        let down = r#"{"format": {"duration": "12.4"}}"#;
        assert_eq!(parse_duration(up).unwrap(), 13);
        assert_eq!(parse_duration(down).unwrap(), 12);
    }

    #[test]
    fn unparseable_output_is_a_metadata_error_with_the_raw_text() {
        let raw = "not json at all";
        match parse_duration(raw) {
            Err(CastError::MetadataParse { raw: got }) => assert_eq!(got, raw),
            other => panic!("expected MetadataParse, got {:?}", other),
        }
    }

    #[test]
    fn missing_duration_field_is_a_metadata_error() {
        assert!(matches!(
            parse_duration(r#"{"format": {}}"#),
            Err(CastError::MetadataParse { .. })
        ));
        assert!(matches!(
            parse_duration(r#"{}"#),
            Err(CastError::MetadataParse { .. })
        ));
    }
}
