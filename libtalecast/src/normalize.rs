//! Cleanup of model output before it is posted
//!
//! Generated stories arrive with markdown emphasis, heading markers and
//! boilerplate labels such as `Title:`. [`clean`] removes them with a fixed
//! pipeline, applied in this order:
//!
//! 1. drop `*`, `_` and `~`
//! 2. drop `[`, `]`, `(`, `)` and `#`
//! 3. strip a leading `title` / `title:` label (any case)
//! 4. strip a leading `story` / `story:` label (any case)
//! 5. strip a leading `###` marker
//! 6. trim surrounding whitespace
//!
//! Steps 3 to 6 repeat until the text stops changing, so `### Title: Foo`
//! and `Story: Title: Foo` both come out as `Foo` and `clean` is idempotent.

use std::sync::OnceLock;

use regex::Regex;

const EMPHASIS_MARKERS: [char; 3] = ['*', '_', '~'];
const BRACKETS_AND_HASHES: [char; 5] = ['[', ']', '(', ')', '#'];

fn title_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^title(?:[:\s]+|$)").expect("valid title regex"))
}

fn story_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^story(?:[:\s]+|$)").expect("valid story regex"))
}

fn heading_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^###\s*").expect("valid heading regex"))
}

fn strip_anchored<'a>(re: &Regex, text: &'a str) -> &'a str {
    match re.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

fn remove_chars(text: &str, unwanted: &[char]) -> String {
    text.chars().filter(|c| !unwanted.contains(c)).collect()
}

pub fn strip_title_prefix(text: &str) -> &str {
    strip_anchored(title_label(), text)
}

/// Also used by the scheduler on the finished body.
pub fn strip_story_prefix(text: &str) -> &str {
    strip_anchored(story_label(), text)
}

pub fn strip_heading_marker(text: &str) -> &str {
    strip_anchored(heading_marker(), text)
}

fn strip_labels_once(text: &str) -> String {
    let text = strip_title_prefix(text);
    let text = strip_story_prefix(text);
    let text = strip_heading_marker(text);
    text.trim().to_string()
}

/// Normalize one piece of generated text. Pure and deterministic.
pub fn clean(text: &str) -> String {
    let text = remove_chars(text, &EMPHASIS_MARKERS);
    let mut text = remove_chars(&text, &BRACKETS_AND_HASHES);

    loop {
        let next = strip_labels_once(&text);
        if next == text {
            return next;
        }
        text = next;
    }
}
