//! Word-highlighted captions rendered as ASS subtitles and burned in.
//!
//! The whole script is laid out at the bottom of the frame; whichever word
//! is being spoken is recolored. Events are cut at every word boundary so
//! each one carries a single highlight state.

use std::path::Path;

use reelcraft_models::WordTiming;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH_RATIO: f64 = 0.55;

/// Caption look and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    pub font_name: String,
    pub font_size: u32,
    pub bold: bool,
    /// `#RRGGBB`
    pub text_color: String,
    /// `#RRGGBB`
    pub highlight_color: String,
    pub margin_side: u32,
    pub margin_bottom: u32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_name: "Roboto".to_string(),
            font_size: 20,
            bold: true,
            text_color: "#FFFFFF".to_string(),
            highlight_color: "#FFFF00".to_string(),
            margin_side: 25,
            margin_bottom: 20,
        }
    }
}

impl CaptionStyle {
    /// Usable text width for a frame `frame_width` pixels wide.
    pub fn text_width(&self, frame_width: u32) -> u32 {
        frame_width.saturating_sub(self.margin_side * 2)
    }
}

/// `#RRGGBB` to ASS `&H00BBGGRR`. Malformed input falls back to white.
pub fn hex_to_ass_color(hex: &str) -> String {
    let hex = hex.trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let (r, g, b) = (&hex[0..2], &hex[2..4], &hex[4..6]);
        format!("&H00{}{}{}", b, g, r).to_uppercase()
    } else {
        "&H00FFFFFF".to_string()
    }
}

/// Inline override form (`&HBBGGRR&`) of a `#RRGGBB` color.
fn inline_color(hex: &str) -> String {
    let full = hex_to_ass_color(hex);
    format!("&H{}&", &full[4..])
}

/// Centiseconds as an ASS timestamp (`H:MM:SS.cc`).
pub fn cs_to_ass(cs: i64) -> String {
    let total = cs.max(0);
    let h = total / 360_000;
    let m = (total % 360_000) / 6_000;
    let s = (total % 6_000) / 100;
    let c = total % 100;
    format!("{}:{:02}:{:02}.{:02}", h, m, s, c)
}

fn secs_to_cs(secs: f64) -> i64 {
    (secs.max(0.0) * 100.0).round() as i64
}

/// Greedy line wrap of `words` into `max_width` pixels.
///
/// Returns word indices per line. A word wider than the line gets a line
/// of its own.
pub fn wrap_words(words: &[&str], max_width: u32, font_size: u32) -> Vec<Vec<usize>> {
    let char_px = CHAR_WIDTH_RATIO * font_size as f64;
    let width_of = |chars: usize| chars as f64 * char_px;

    let mut lines: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_chars = 0usize;

    for (idx, word) in words.iter().enumerate() {
        let len = word.chars().count();
        let candidate = if current.is_empty() { len } else { current_chars + 1 + len };
        if current.is_empty() || width_of(candidate) <= max_width as f64 {
            current.push(idx);
            current_chars = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push(idx);
            current_chars = len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// ASS has no escape for override braces.
fn sanitize_word(word: &str) -> String {
    word.replace('{', "(").replace('}', ")").replace('\\', "/")
}

fn render_text(words: &[String], lines: &[Vec<usize>], highlight: Option<usize>, color: &str) -> String {
    lines
        .iter()
        .map(|line| {
            line.iter()
                .map(|&i| match highlight {
                    Some(h) if h == i => format!("{{\\c{}}}{}{{\\r}}", color, words[i]),
                    _ => words[i].clone(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\\N")
}

/// Highlighted word index for each caption interval, merged where equal.
fn highlight_intervals(timings: &[WordTiming], duration: f64) -> Vec<(i64, i64, Option<usize>)> {
    let end_cs = secs_to_cs(duration);
    let mut cuts: Vec<i64> = vec![0, end_cs];
    for t in timings {
        cuts.push(secs_to_cs(t.start).min(end_cs));
        cuts.push(secs_to_cs(t.end).min(end_cs));
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut intervals: Vec<(i64, i64, Option<usize>)> = Vec::new();
    for pair in cuts.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b <= a {
            continue;
        }
        let highlight = timings
            .iter()
            .position(|w| secs_to_cs(w.start) <= a && a < secs_to_cs(w.end));
        match intervals.last_mut() {
            Some(last) if last.2 == highlight && last.1 == a => last.1 = b,
            _ => intervals.push((a, b, highlight)),
        }
    }
    intervals
}

/// Build the complete ASS document for a `width`x`height` video lasting
/// `duration` seconds.
pub fn build_caption_document(
    timings: &[WordTiming],
    width: u32,
    height: u32,
    duration: f64,
    style: &CaptionStyle,
) -> String {
    let duration = if duration > 0.0 {
        duration
    } else {
        timings.iter().map(|t| t.end).fold(0.0, f64::max)
    };

    let words: Vec<String> = timings.iter().map(|t| sanitize_word(&t.word)).collect();
    let word_refs: Vec<&str> = words.iter().map(String::as_str).collect();
    let lines = wrap_words(&word_refs, style.text_width(width), style.font_size);
    let highlight_color = inline_color(&style.highlight_color);

    let mut doc = format!(
        r#"[Script Info]
ScriptType: v4.00+
PlayResX: {w}
PlayResY: {h}
WrapStyle: 2
ScaledBorderAndShadow: yes

[V4+ Styles]
Format: Name,Fontname,Fontsize,PrimaryColour,SecondaryColour,OutlineColour,BackColour,Bold,Italic,Underline,StrikeOut,ScaleX,ScaleY,Spacing,Angle,BorderStyle,Outline,Shadow,Alignment,MarginL,MarginR,MarginV,Encoding
Style: Caption,{font},{size},{primary},{primary},&H00000000,&H64000000,{bold},0,0,0,100,100,0,0,1,1,0,1,{side},{side},{bottom},1

[Events]
Format: Layer,Start,End,Style,Name,MarginL,MarginR,MarginV,Effect,Text
"#,
        w = width,
        h = height,
        font = style.font_name,
        size = style.font_size,
        primary = hex_to_ass_color(&style.text_color),
        bold = if style.bold { -1 } else { 0 },
        side = style.margin_side,
        bottom = style.margin_bottom,
    );

    if words.is_empty() {
        return doc;
    }

    for (start, end, highlight) in highlight_intervals(timings, duration) {
        doc.push_str(&format!(
            "Dialogue: 0,{},{},Caption,,0,0,0,,{}\n",
            cs_to_ass(start),
            cs_to_ass(end),
            render_text(&words, &lines, highlight, &highlight_color)
        ));
    }
    doc
}

/// Quote a path for use inside an FFmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Burn highlighted captions for `timings` into `video`, writing `output`.
pub async fn burn_captions(
    video: &Path,
    timings: &[WordTiming],
    output: &Path,
    style: &CaptionStyle,
) -> MediaResult<()> {
    let info = probe_video(video).await?;
    let document = build_caption_document(timings, info.width, info.height, info.duration, style);

    let subtitles = output.with_extension("ass");
    fs::write(&subtitles, document).await?;
    debug!(subtitles = %subtitles.display(), words = timings.len(), "Wrote caption track");

    let cmd = FfmpegCommand::new(video, output)
        .video_filter(format!("subtitles={}", escape_filter_path(&subtitles)))
        .output_args(["-c:a", "copy"]);
    let result = FfmpegRunner::new("burn_captions").run(&cmd).await;

    if let Err(e) = fs::remove_file(&subtitles).await {
        debug!(error = %e, "Failed to remove caption track");
    }
    result?;

    if !output.exists() {
        return Err(MediaError::ffmpeg_failed("captioned video was not written", None, None));
    }
    info!(output = %output.display(), words = timings.len(), "Burned captions");
    Ok(())
}
