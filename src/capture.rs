use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::SessionConfig;

/// Name of the external framebuffer capture tool.
pub const CAPTURE_TOOL: &str = "vnc2swf";

/// Reconnect attempts the capture tool makes before giving up.
const RECONNECT_TRIES: u32 = 3;

/// Find an external executable in PATH or in common install locations.
pub fn find_tool(name: &str) -> Option<PathBuf> {
    if let Ok(output) = Command::new("which").arg(name).output() {
        if output.status.success() {
            let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path_str.is_empty() {
                return Some(PathBuf::from(path_str));
            }
        }
    }

    let common_paths = [
        format!("/usr/local/bin/{}", name),
        format!("/opt/homebrew/bin/{}", name),
        format!("/usr/bin/{}", name),
        format!("/opt/local/bin/{}", name),
    ];

    common_paths
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// Builds the argument vector for the capture tool. The tool's parser is
/// positional-sensitive, so flag ordering here is part of the contract:
/// `-n -o <path> [-C clip] [-r rate] [-P passwd] -R <tries> host:display [port]`.
#[derive(Debug, Clone)]
pub struct CaptureCommandBuilder {
    output_path: PathBuf,
    host: String,
    display: u32,
    framerate: Option<u32>,
    clipping: Option<String>,
    password_file: Option<PathBuf>,
    port: Option<u16>,
}

impl CaptureCommandBuilder {
    pub fn new(output_path: PathBuf, host: impl Into<String>, display: u32) -> Self {
        Self {
            output_path,
            host: host.into(),
            display,
            framerate: None,
            clipping: None,
            password_file: None,
            port: None,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.output_path(), config.host.clone(), config.display)
            .with_framerate(Some(config.framerate))
            .with_clipping(config.clipping.clone())
            .with_password_file(config.password_file.clone())
            .with_port(config.port)
    }

    pub fn with_framerate(mut self, framerate: Option<u32>) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_clipping(mut self, clipping: Option<String>) -> Self {
        self.clipping = clipping;
        self
    }

    pub fn with_password_file(mut self, password_file: Option<PathBuf>) -> Self {
        self.password_file = password_file;
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn build(&self) -> Vec<String> {
        let mut args = vec![
            "-n".to_string(),
            "-o".to_string(),
            self.output_path.to_string_lossy().to_string(),
        ];

        if let Some(clip) = &self.clipping {
            args.push("-C".to_string());
            args.push(clip.clone());
        }

        if let Some(rate) = self.framerate {
            args.push("-r".to_string());
            args.push(rate.to_string());
        }

        if let Some(passwd) = &self.password_file {
            args.push("-P".to_string());
            args.push(passwd.to_string_lossy().to_string());
        }

        args.push("-R".to_string());
        args.push(RECONNECT_TRIES.to_string());
        args.push(format!("{}:{}", self.host, self.display));

        if let Some(port) = self.port {
            args.push(port.to_string());
        }

        args
    }
}

/// Build a spawnable capture command for the given program.
pub fn capture_command(program: &Path, builder: &CaptureCommandBuilder) -> Command {
    let mut command = Command::new(program);
    command.args(builder.build());
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_args_ordering() {
        let builder = CaptureCommandBuilder::new(PathBuf::from("/tmp/out.flv"), "localhost", 0);
        let args = builder.build();

        assert_eq!(
            args,
            vec!["-n", "-o", "/tmp/out.flv", "-R", "3", "localhost:0"]
        );
    }

    #[test]
    fn full_args_ordering() {
        let builder = CaptureCommandBuilder::new(PathBuf::from("/tmp/out.flv"), "vnchost", 2)
            .with_clipping(Some("640x480+10+20".to_string()))
            .with_framerate(Some(12))
            .with_password_file(Some(PathBuf::from("/home/u/.vnc/passwd")))
            .with_port(Some(5902));
        let args = builder.build();

        assert_eq!(
            args,
            vec![
                "-n",
                "-o",
                "/tmp/out.flv",
                "-C",
                "640x480+10+20",
                "-r",
                "12",
                "-P",
                "/home/u/.vnc/passwd",
                "-R",
                "3",
                "vnchost:2",
                "5902",
            ]
        );
    }

    #[test]
    fn from_config_targets_the_configured_display() {
        let config = crate::config::SessionConfig {
            host: "desk".to_string(),
            display: 1,
            ..Default::default()
        };
        let args = CaptureCommandBuilder::from_config(&config).build();
        assert!(args.contains(&"desk:1".to_string()));
    }
}
