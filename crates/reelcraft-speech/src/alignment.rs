//! Transcript to script alignment for caption timing.
//!
//! Speech recognition rarely returns the script verbatim, but the script is
//! known exactly. The aligner walks the transcript once and gives each script
//! word the time span of the transcript entry at the same position, so the
//! captions always show the script's words. This is a greedy best-effort
//! heuristic: it never resynchronizes after inserted or dropped words, it
//! only degrades timings.

use reelcraft_models::WordTiming;

/// Align a timed transcript to the whitespace-separated words of `script`.
///
/// Output follows script order. When the transcript runs out, the remaining
/// script words are pinned to the last known end time (`0.0` for an empty
/// transcript). A script word equal to the previous output word extends that
/// entry instead of adding a new one.
pub fn align_transcript(transcript: &[WordTiming], script: &str) -> Vec<WordTiming> {
    let reference: Vec<&str> = script.split_whitespace().collect();
    let mut aligned: Vec<WordTiming> = Vec::with_capacity(reference.len());
    let mut ref_idx = 0;
    let mut last_end = 0.0;

    for entry in transcript {
        let Some(&word) = reference.get(ref_idx) else {
            break;
        };
        last_end = entry.end;
        push_or_extend(&mut aligned, word, entry.start, entry.end);
        ref_idx += 1;
    }

    for &word in &reference[ref_idx..] {
        push_or_extend(&mut aligned, word, last_end, last_end);
    }

    aligned
}

fn push_or_extend(aligned: &mut Vec<WordTiming>, word: &str, start: f64, end: f64) {
    match aligned.last_mut() {
        Some(prev) if prev.word == word => prev.end = end.max(prev.start),
        _ => aligned.push(WordTiming::new(word, start, end.max(start))),
    }
}
