//! Post-processing: deterministic cleanup of recognizer transcripts.
//!
//! The legibility check counts characters, so anything in the transcript
//! that did not come off the document must go before counting. Vision models
//! occasionally:
//!
//! - wrap the output in ` ```text ... ``` ` fences despite the prompt;
//! - mark unreadable spans as `[illegible]` or `[unreadable]`;
//! - emit `\r\n` line endings or zero-width characters.
//!
//! Each rule is a pure `&str → String` pass and independently testable.
//!
//! ## Rule Order
//!
//! Fences are stripped first so the marker rule sees clean lines; whitespace
//! normalisation runs last because the earlier rules leave gaps behind.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw transcript.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Remove `[illegible]`-style markers
/// 5. Trim trailing whitespace per line
/// 6. Collapse runs of blank lines to one
/// 7. Trim the whole transcript
pub fn clean_transcript(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = remove_unreadable_markers(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Remove unreadable-span markers ──────────────────────────────────

static RE_UNREADABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[\s*(?:illegible|unreadable|blurred|blurry|unclear|no text)[^\]]*\]")
        .unwrap()
});

fn remove_unreadable_markers(input: &str) -> String {
    RE_UNREADABLE.replace_all(input, "").to_string()
}

// ── Rule 5: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Collapse blank lines ─────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
