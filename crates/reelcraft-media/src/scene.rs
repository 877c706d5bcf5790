//! Content-adaptive scene detection.
//!
//! Two backends implement [`SceneDetector`]:
//! - [`FfmpegSceneDetector`] reads per-frame `scene` scores from FFmpeg and
//!   applies an adaptive threshold (a frame's score relative to the mean of
//!   its neighbours).
//! - [`SceneDetectCli`] shells out to PySceneDetect's `detect-adaptive`.
//!
//! Both return scenes covering the whole video; a video without cuts is
//! one scene.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use reelcraft_models::SceneBoundary;
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::{check_ffmpeg, require_tool};
use crate::error::{MediaError, MediaResult};
use crate::probe::get_duration;

/// Scene boundary detector.
#[async_trait]
pub trait SceneDetector: Send + Sync {
    /// Detect scenes in `video`, optionally writing per-frame stats to `stats_file`.
    async fn detect(&self, video: &Path, stats_file: Option<&Path>) -> MediaResult<Vec<SceneBoundary>>;

    fn name(&self) -> &'static str;
}

/// Adaptive threshold parameters.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveParams {
    /// Minimum score/neighbour-mean ratio for a cut
    pub adaptive_threshold: f64,
    /// Minimum absolute scene score (FFmpeg scale, 0..1) for a cut
    pub min_content_val: f64,
    /// Neighbouring frames on each side used for the rolling mean
    pub window_width: usize,
    /// Minimum frames between cuts
    pub min_scene_len: usize,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            adaptive_threshold: 3.0,
            min_content_val: 0.06,
            window_width: 2,
            min_scene_len: 15,
        }
    }
}

/// Scene score for one decoded frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScore {
    pub frame: usize,
    /// Presentation time in seconds
    pub time: f64,
    pub score: f64,
}

/// Score of each frame divided by the mean of its neighbours.
///
/// Frames without a full window on both sides have no ratio.
pub fn adaptive_ratios(scores: &[FrameScore], window_width: usize) -> Vec<Option<f64>> {
    let n = scores.len();
    (0..n)
        .map(|i| {
            if window_width == 0 || i < window_width || i + window_width >= n {
                return None;
            }
            let neighbours = (i - window_width..=i + window_width).filter(|&j| j != i);
            let sum: f64 = neighbours.map(|j| scores[j].score).sum();
            let mean = sum / (2 * window_width) as f64;
            let score = scores[i].score;
            Some(if mean > f64::EPSILON {
                score / mean
            } else if score > 0.0 {
                f64::INFINITY
            } else {
                0.0
            })
        })
        .collect()
}

/// Cut times (seconds) chosen by the adaptive threshold.
pub fn adaptive_cuts(scores: &[FrameScore], params: &AdaptiveParams) -> Vec<f64> {
    let ratios = adaptive_ratios(scores, params.window_width);
    let mut cuts = Vec::new();
    let mut last_cut_frame: Option<usize> = None;

    for (frame, ratio) in scores.iter().zip(ratios) {
        let Some(ratio) = ratio else { continue };
        let far_enough = match last_cut_frame {
            Some(last) => frame.frame - last >= params.min_scene_len,
            None => frame.frame >= params.min_scene_len,
        };
        if ratio >= params.adaptive_threshold && frame.score >= params.min_content_val && far_enough {
            cuts.push(frame.time);
            last_cut_frame = Some(frame.frame);
        }
    }

    cuts
}

/// Turn cut times into contiguous scenes spanning `[0, duration]`.
pub fn boundaries_from_cuts(cuts: &[f64], duration: f64) -> Vec<SceneBoundary> {
    let mut edges = vec![0.0];
    edges.extend(cuts.iter().copied().filter(|&c| c > 0.0 && c < duration));
    edges.push(duration);

    edges
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| SceneBoundary::new(w[0], w[1]))
        .collect()
}

/// Parse FFmpeg `metadata=print` output into frame scores.
///
/// Expects `pts_time:<t>` on the frame line followed by
/// `lavfi.scene_score=<s>`; log prefixes are ignored.
pub fn parse_scene_scores(log: &str) -> Vec<FrameScore> {
    let mut scores = Vec::new();
    let mut pending_time: Option<f64> = None;

    for line in log.lines() {
        if let Some(idx) = line.find("pts_time:") {
            pending_time = line[idx + "pts_time:".len()..]
                .split_whitespace()
                .next()
                .and_then(|t| t.parse().ok());
        } else if let Some(idx) = line.find("lavfi.scene_score=") {
            let value = line[idx + "lavfi.scene_score=".len()..].trim();
            if let (Some(time), Ok(score)) = (pending_time.take(), value.parse::<f64>()) {
                scores.push(FrameScore {
                    frame: scores.len(),
                    time,
                    score,
                });
            }
        }
    }

    scores
}

/// Render per-frame stats as CSV.
pub fn stats_csv(scores: &[FrameScore], ratios: &[Option<f64>]) -> String {
    let mut out = String::from("Frame Number,Timecode,scene_score,adaptive_ratio\n");
    for (frame, ratio) in scores.iter().zip(ratios) {
        let ratio = match ratio {
            Some(r) if r.is_finite() => format!("{r:.6}"),
            Some(_) => "inf".to_string(),
            None => String::new(),
        };
        out.push_str(&format!(
            "{},{},{:.6},{}\n",
            frame.frame + 1,
            timecode(frame.time),
            frame.score,
            ratio
        ));
    }
    out
}

/// `HH:MM:SS.mmm`
fn timecode(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// Adaptive detector driven by FFmpeg's scene score.
#[derive(Debug, Clone, Default)]
pub struct FfmpegSceneDetector {
    pub params: AdaptiveParams,
}

impl FfmpegSceneDetector {
    pub fn new(params: AdaptiveParams) -> Self {
        Self { params }
    }

    async fn frame_scores(&self, video: &Path) -> MediaResult<Vec<FrameScore>> {
        check_ffmpeg()?;

        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-nostats", "-v", "info", "-i"])
            .arg(video)
            .args([
                "-an",
                "-sn",
                "-dn",
                "-vf",
                "select='gte(scene,0)',metadata=print:key=lavfi.scene_score",
                "-f",
                "null",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let log = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let tail: Vec<&str> = log.lines().rev().take(5).collect();
            return Err(MediaError::ffmpeg_failed(
                format!("scene scoring failed for {}", video.display()),
                Some(tail.into_iter().rev().collect::<Vec<_>>().join("\n")),
                output.status.code(),
            ));
        }

        Ok(parse_scene_scores(&log))
    }
}

#[async_trait]
impl SceneDetector for FfmpegSceneDetector {
    async fn detect(&self, video: &Path, stats_file: Option<&Path>) -> MediaResult<Vec<SceneBoundary>> {
        if !video.exists() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }

        let duration = get_duration(video).await?;
        let scores = self.frame_scores(video).await?;
        debug!(video = %video.display(), frames = scores.len(), "Scored frames");

        if let Some(stats_file) = stats_file {
            let ratios = adaptive_ratios(&scores, self.params.window_width);
            tokio::fs::write(stats_file, stats_csv(&scores, &ratios)).await?;
        }

        let cuts = adaptive_cuts(&scores, &self.params);
        let scenes = boundaries_from_cuts(&cuts, duration);
        info!(video = %video.display(), scenes = scenes.len(), "Detected scenes");
        Ok(scenes)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// PySceneDetect CLI backend (`scenedetect detect-adaptive`).
#[derive(Debug, Clone)]
pub struct SceneDetectCli {
    pub adaptive_threshold: f64,
    pub min_scene_len: usize,
}

impl Default for SceneDetectCli {
    fn default() -> Self {
        let params = AdaptiveParams::default();
        Self {
            adaptive_threshold: params.adaptive_threshold,
            min_scene_len: params.min_scene_len,
        }
    }
}

#[async_trait]
impl SceneDetector for SceneDetectCli {
    async fn detect(&self, video: &Path, stats_file: Option<&Path>) -> MediaResult<Vec<SceneBoundary>> {
        if !video.exists() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }
        require_tool("scenedetect")?;

        let work_dir = tempfile::tempdir()?;
        let threshold = self.adaptive_threshold.to_string();
        let min_scene_len = self.min_scene_len.to_string();
        let mut cmd = Command::new("scenedetect");
        cmd.arg("--input").arg(video);
        if let Some(stats_file) = stats_file {
            cmd.arg("--stats").arg(stats_file);
        }
        cmd.args([
            "--quiet",
            "detect-adaptive",
            "--threshold",
            threshold.as_str(),
            "--min-scene-len",
            min_scene_len.as_str(),
            "list-scenes",
            "--skip-cuts",
            "--filename",
            "scenes.csv",
            "--output",
        ])
        .arg(work_dir.path());

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::detection_failed(format!(
                "scenedetect exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let csv = tokio::fs::read_to_string(work_dir.path().join("scenes.csv")).await?;
        let scenes = parse_scene_list_csv(&csv)?;
        if scenes.is_empty() {
            let duration = get_duration(video).await?;
            return Ok(boundaries_from_cuts(&[], duration));
        }
        info!(video = %video.display(), scenes = scenes.len(), "Detected scenes");
        Ok(scenes)
    }

    fn name(&self) -> &'static str {
        "scenedetect"
    }
}

/// Parse a `list-scenes` CSV (written with `--skip-cuts`).
pub fn parse_scene_list_csv(csv: &str) -> MediaResult<Vec<SceneBoundary>> {
    let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| MediaError::detection_failed("empty scene list"))?
        .split(',')
        .map(str::trim)
        .collect();

    let column = |name: &str| {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or_else(|| MediaError::detection_failed(format!("scene list missing column {name}")))
    };
    let start_col = column("Start Time (seconds)")?;
    let end_col = column("End Time (seconds)")?;

    lines
        .map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let parse = |col: usize| {
                fields
                    .get(col)
                    .and_then(|v| v.parse::<f64>().ok())
                    .ok_or_else(|| MediaError::detection_failed(format!("bad scene row: {line}")))
            };
            Ok(SceneBoundary::new(parse(start_col)?, parse(end_col)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[f64], fps: f64) -> Vec<FrameScore> {
        values
            .iter()
            .enumerate()
            .map(|(i, &score)| FrameScore {
                frame: i,
                time: i as f64 / fps,
                score,
            })
            .collect()
    }

    #[test]
    fn test_adaptive_ratio_window() {
        let s = scores(&[0.01, 0.01, 0.5, 0.01, 0.01], 25.0);
        let ratios = adaptive_ratios(&s, 2);
        assert_eq!(ratios[0], None);
        assert_eq!(ratios[1], None);
        assert!((ratios[2].unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(ratios[4], None);
    }

    #[test]
    fn test_adaptive_cuts_single_spike() {
        let mut values = vec![0.01; 60];
        values[30] = 0.6;
        let s = scores(&values, 10.0);

        let cuts = adaptive_cuts(&s, &AdaptiveParams::default());
        assert_eq!(cuts, vec![3.0]);
    }

    #[test]
    fn test_adaptive_cuts_ignores_gradual_motion() {
        // Uniformly high motion: ratios stay near 1.
        let s = scores(&vec![0.3; 60], 10.0);
        assert!(adaptive_cuts(&s, &AdaptiveParams::default()).is_empty());
    }

    #[test]
    fn test_adaptive_cuts_respects_min_scene_len() {
        let mut values = vec![0.01; 80];
        values[20] = 0.7;
        values[25] = 0.7;
        values[50] = 0.7;
        let s = scores(&values, 10.0);

        let cuts = adaptive_cuts(&s, &AdaptiveParams::default());
        assert_eq!(cuts, vec![2.0, 5.0]);
    }

    #[test]
    fn test_boundaries_from_cuts() {
        let b = boundaries_from_cuts(&[2.0, 5.0], 8.0);
        assert_eq!(
            b,
            vec![
                SceneBoundary::new(0.0, 2.0),
                SceneBoundary::new(2.0, 5.0),
                SceneBoundary::new(5.0, 8.0)
            ]
        );
        assert_eq!(boundaries_from_cuts(&[], 4.0), vec![SceneBoundary::new(0.0, 4.0)]);
    }

    #[test]
    fn test_parse_scene_scores_from_log() {
        let log = "\
[Parsed_metadata_1 @ 0x55] frame:0    pts:0       pts_time:0
[Parsed_metadata_1 @ 0x55] lavfi.scene_score=0.000000
[Parsed_metadata_1 @ 0x55] frame:1    pts:512     pts_time:0.04
[Parsed_metadata_1 @ 0x55] lavfi.scene_score=0.412300
frame=    2 fps=0.0 q=-0.0 Lsize=N/A";
        let s = parse_scene_scores(log);
        assert_eq!(s.len(), 2);
        assert_eq!(s[1].frame, 1);
        assert!((s[1].time - 0.04).abs() < 1e-9);
        assert!((s[1].score - 0.4123).abs() < 1e-9);
    }

    #[test]
    fn test_stats_csv() {
        let s = scores(&[0.0, 0.2], 1.0);
        let csv = stats_csv(&s, &[None, Some(1.5)]);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "Frame Number,Timecode,scene_score,adaptive_ratio");
        assert_eq!(lines[2], "2,00:00:01.000,0.200000,1.500000");
    }

    #[test]
    fn test_parse_scene_list_csv() {
        let csv = "\
Scene Number,Start Frame,Start Timecode,Start Time (seconds),End Frame,End Timecode,End Time (seconds),Length (frames),Length (timecode),Length (seconds)
1,1,00:00:00.000,0.000,90,00:00:03.000,3.000,90,00:00:03.000,3.000
2,91,00:00:03.000,3.000,150,00:00:05.000,5.000,60,00:00:02.000,2.000
";
        let scenes = parse_scene_list_csv(csv).unwrap();
        assert_eq!(scenes, vec![SceneBoundary::new(0.0, 3.0), SceneBoundary::new(3.0, 5.0)]);
        assert!(parse_scene_list_csv("a,b\n1,2\n").is_err());
    }
}
