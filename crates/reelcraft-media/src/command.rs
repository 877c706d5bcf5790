//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use metrics::histogram;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Number of trailing stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// One `-i` input and the options placed before it.
#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg commands.
///
/// Input options (`input_arg`, `seek`, `duration`) apply to the most
/// recently added input.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![FfmpegInput {
                args: Vec::new(),
                path: input.as_ref().to_path_buf(),
            }],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add another input. Later input options attach to it.
    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput {
            args: Vec::new(),
            path: input.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an option before the current input's `-i`.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(input) = self.inputs.last_mut() {
            input.args.push(arg.into());
        }
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek the current input.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Limit how much of the current input is read.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Stop writing when the shortest output stream ends.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Write exactly one video frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Progress snapshot from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    pub is_complete: bool,
}

/// Runs FFmpeg to completion and records its duration under an operation label.
pub struct FfmpegRunner {
    operation: &'static str,
}

impl FfmpegRunner {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }

    /// Run `cmd`, failing with the tail of its diagnostics on a non-zero exit.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!(operation = self.operation, "Running FFmpeg: ffmpeg {}", args.join(" "));

        let started = Instant::now();
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;
        let mut reader = BufReader::new(stderr).lines();
        let operation = self.operation;

        // Progress lines and diagnostics share stderr; keep a tail of the latter.
        let reader_handle = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                match parse_progress_line(&line, &mut current) {
                    LineKind::Snapshot => debug!(
                        operation,
                        out_time_ms = current.out_time_ms,
                        speed = current.speed,
                        done = current.is_complete,
                        "FFmpeg progress"
                    ),
                    LineKind::Progress => {}
                    LineKind::Other => {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            }

            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let status = child.wait().await;
        let stderr_tail = reader_handle.await.unwrap_or_default();
        histogram!("reelcraft_ffmpeg_duration_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());

        let status = status?;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                format!("{operation} exited with non-zero status"),
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                status.code(),
            ))
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineKind {
    /// A `progress=` line closing one progress block.
    Snapshot,
    /// Any other `key=value` progress field.
    Progress,
    Other,
}

fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> LineKind {
    let line = line.trim();
    let Some((key, value)) = line.split_once('=') else {
        return LineKind::Other;
    };

    match key {
        "out_time_us" | "out_time_ms" => {
            // Both keys report microseconds in current FFmpeg releases.
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
            LineKind::Progress
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
            LineKind::Progress
        }
        "progress" => {
            current.is_complete = value == "end";
            LineKind::Snapshot
        }
        "frame" | "fps" | "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames"
        | "stream_0_0_q" => LineKind::Progress,
        _ => LineKind::Other,
    }
}

/// Resolve an external binary on PATH.
pub fn require_tool(tool: &'static str) -> MediaResult<PathBuf> {
    which::which(tool).map_err(|_| MediaError::tool_missing(tool))
}

pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    require_tool("ffmpeg")
}

pub fn check_ffprobe() -> MediaResult<PathBuf> {
    require_tool("ffprobe")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(30.0)
            .video_codec("libx264")
            .crf(18);

        let args = cmd.build_args();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(&args[i - 4..i], ["-ss", "10.000", "-t", "30.000"]);
        assert!(args.ends_with(&["-crf".to_string(), "18".to_string(), "output.mp4".to_string()]));
    }

    #[test]
    fn test_input_options_follow_their_input() {
        let args = FfmpegCommand::new("a.mp4", "out.mp4")
            .duration(3.0)
            .add_input("b.mp4")
            .duration(1.5)
            .add_input("voice.mp3")
            .build_args();

        let joined = args.join(" ");
        assert!(joined.contains("-t 3.000 -i a.mp4 -t 1.500 -i b.mp4 -i voice.mp3"));
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert_eq!(parse_progress_line("out_time_us=5000000", &mut progress), LineKind::Progress);
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        assert_eq!(parse_progress_line("progress=end", &mut progress), LineKind::Snapshot);
        assert!(progress.is_complete);

        assert_eq!(
            parse_progress_line("[mp4 @ 0x1] moov atom not found", &mut progress),
            LineKind::Other
        );
    }
}
