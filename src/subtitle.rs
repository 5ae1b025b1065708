//! SRT to ASS subtitle conversion.
//!
//! Only what players need to render SRT cues through an ASS renderer is
//! produced: a script header, the configured style lines and one `Dialogue`
//! event per cue. Basic inline tags (`<i>`, `<b>`, `<u>`) are translated,
//! everything else in angle brackets is dropped.

use std::sync::OnceLock;

use regex::Regex;

const UTF8_BOM: char = '\u{feff}';

const SCRIPT_INFO: &str = "[Script Info]\n\
ScriptType: v4.00+\n\
Collisions: Normal\n\
PlayResX: 384\n\
PlayResY: 288\n";

const EVENTS_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

fn timing_regex() -> &'static Regex {
    static TIMING: OnceLock<Regex> = OnceLock::new();
    TIMING.get_or_init(|| {
        Regex::new(
            r"^\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})",
        )
        .expect("timing pattern is valid")
    })
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"(?i)</?([a-z]+)[^>]*>").expect("tag pattern is valid"))
}

#[derive(Debug, Clone, PartialEq)]
struct Cue {
    start: String,
    end: String,
    text: String,
}

/// Whether `body` looks like an SRT document: a numeric counter line
/// followed by a timing line
pub fn is_srt(body: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(body) else {
        return false;
    };
    let mut lines = text
        .trim_start_matches(UTF8_BOM)
        .lines()
        .map(str::trim)
        .skip_while(|l| l.is_empty());

    let counter = lines.next().unwrap_or_default();
    let timing = lines.next().unwrap_or_default();
    !counter.is_empty()
        && counter.chars().all(|c| c.is_ascii_digit())
        && timing_regex().is_match(timing)
}

/// Convert an SRT document to ASS using `style_lines` for `[V4+ Styles]`
pub fn srt_to_ass(srt: &str, style_lines: &[String]) -> String {
    let mut out = String::with_capacity(srt.len() * 2);
    out.push_str(SCRIPT_INFO);
    out.push_str("\n[V4+ Styles]\n");
    for line in style_lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\n[Events]\n");
    out.push_str(EVENTS_FORMAT);
    out.push('\n');

    for cue in parse_cues(srt) {
        out.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
            cue.start, cue.end, cue.text
        ));
    }
    out
}

fn parse_cues(srt: &str) -> Vec<Cue> {
    let normalized = srt.trim_start_matches(UTF8_BOM).replace("\r\n", "\n");
    let mut cues = Vec::new();

    for block in normalized.split("\n\n") {
        let mut lines = block.lines().skip_while(|l| l.trim().is_empty());
        let mut first = lines.next().unwrap_or_default();
        // Counter lines are optional in the wild
        if !timing_regex().is_match(first) {
            first = lines.next().unwrap_or_default();
        }
        let Some(caps) = timing_regex().captures(first) else {
            continue;
        };

        let field = |i: usize| caps.get(i).map_or("0", |m| m.as_str());
        let start = ass_timestamp(field(1), field(2), field(3), field(4));
        let end = ass_timestamp(field(5), field(6), field(7), field(8));
        let text = lines
            .map(|l| convert_tags(l.trim_end()))
            .collect::<Vec<_>>()
            .join("\\N");

        cues.push(Cue { start, end, text });
    }
    cues
}

/// `H:MM:SS.cc` from SRT components
fn ass_timestamp(hours: &str, minutes: &str, seconds: &str, millis: &str) -> String {
    let hours: u32 = hours.parse().unwrap_or(0);
    // "5" means 500ms, "05" means 50ms
    let millis: u32 = format!("{millis:0<3}").parse().unwrap_or(0);
    format!("{}:{}:{}.{:02}", hours, minutes, seconds, millis / 10)
}

fn convert_tags(line: &str) -> String {
    tag_regex()
        .replace_all(line, |caps: &regex::Captures| {
            let closing = caps[0].starts_with("</");
            let state = if closing { 0 } else { 1 };
            match caps[1].to_ascii_lowercase().as_str() {
                "i" => format!("{{\\i{state}}}"),
                "b" => format!("{{\\b{state}}}"),
                "u" => format!("{{\\u{state}}}"),
                _ => String::new(),
            }
        })
        .into_owned()
}
