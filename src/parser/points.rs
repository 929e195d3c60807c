//! Point extraction: `N.(tag-seconds) body` / `N) (tag seconds) body`.
//!
//! Documents mix both marker styles and both qualifier joiners, so a fixed,
//! ordered list of grammars is run over the whole text. A match is keyed by
//! its start offset; once an offset is claimed by an earlier grammar, later
//! grammars skip it. Claiming happens before validation, so a span dropped
//! for a short body is not re-extracted by a looser grammar either.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Bodies shorter than this (in characters, after trimming) are noise.
pub const MIN_BODY_CHARS: usize = 10;

/// A point as found in the text, before storage renumbers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointCandidate {
    /// Ordinal as written in the source; not necessarily unique or contiguous.
    pub ordinal: u64,
    pub tag: String,
    pub seconds: u32,
    pub body: String,
}

const DOT_MARKER: &str = r"(\d+)\.";
const PAREN_MARKER: &str = r"(\d+)\)";
const HYPHEN_QUALIFIER: &str = r"\s*\(\s*([^-()]+?)\s*-\s*(\d+)\s*\)\s*";
const SPACE_QUALIFIER: &str = r"\s*\(\s*([^-()0-9\s]+(?:\s+[^-()0-9\s]+)*)\s+(\d+)\s*\)\s*";

/// Start of the next point: `N.` or `N)` followed by `(`.
static NEXT_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+[.)]\s*\(").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyEnd {
    /// Body stops at the next marker (or end of text).
    NextMarker,
    /// Body runs to the end of text; one match per pass.
    EndOfText,
}

struct Grammar {
    name: &'static str,
    head: Regex,
    body_end: BodyEnd,
}

static GRAMMARS: LazyLock<Vec<Grammar>> = LazyLock::new(|| {
    let heads = [
        ("hyphen/dot", DOT_MARKER, HYPHEN_QUALIFIER),
        ("space/dot", DOT_MARKER, SPACE_QUALIFIER),
        ("hyphen/paren", PAREN_MARKER, HYPHEN_QUALIFIER),
        ("space/paren", PAREN_MARKER, SPACE_QUALIFIER),
    ];
    [BodyEnd::NextMarker, BodyEnd::EndOfText]
        .into_iter()
        .flat_map(|body_end| {
            heads.iter().map(move |&(name, marker, qualifier)| Grammar {
                name,
                head: Regex::new(&format!("{marker}{qualifier}")).unwrap(),
                body_end,
            })
        })
        .collect()
});

/// A raw match: header captures plus the byte range of the body.
struct Span<'t> {
    start: usize,
    caps: Captures<'t>,
    body: &'t str,
}

impl Grammar {
    fn spans<'t>(&self, text: &'t str) -> Vec<Span<'t>> {
        let mut spans = Vec::new();
        let mut pos = 0;

        while let Some(caps) = self.head.captures_at(text, pos) {
            let (start, head_end) = match caps.get(0) {
                Some(m) => (m.start(), m.end()),
                None => break,
            };
            let body_end = match self.body_end {
                BodyEnd::NextMarker => NEXT_MARKER
                    .find_at(text, head_end)
                    .map_or(text.len(), |m| m.start()),
                BodyEnd::EndOfText => text.len(),
            };
            spans.push(Span {
                start,
                body: &text[head_end..body_end],
                caps,
            });
            if body_end >= text.len() {
                break;
            }
            pos = body_end;
        }

        spans
    }
}

impl Span<'_> {
    fn into_candidate(self) -> Option<PointCandidate> {
        let ordinal = self.caps[1].parse::<u64>().ok()?;
        let tag = self.caps[2].trim();
        let seconds = self.caps[3].parse::<u32>().ok()?;
        let body = self.body.trim();

        if tag.is_empty() || body.chars().count() < MIN_BODY_CHARS {
            return None;
        }

        Some(PointCandidate {
            ordinal,
            tag: tag.to_string(),
            seconds,
            body: body.to_string(),
        })
    }
}

/// Extract all points from `text`, ordered by declared ordinal. Ties keep
/// discovery order. Never fails; text without markers yields an empty list.
pub fn extract(text: &str) -> Vec<PointCandidate> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut claimed: HashSet<usize> = HashSet::new();
    let mut points = Vec::new();

    for grammar in GRAMMARS.iter() {
        let mut accepted = 0usize;
        for span in grammar.spans(text) {
            if !claimed.insert(span.start) {
                continue;
            }
            if let Some(point) = span.into_candidate() {
                points.push(point);
                accepted += 1;
            }
        }
        if accepted > 0 {
            tracing::trace!(
                grammar = grammar.name,
                body_end = ?grammar.body_end,
                accepted,
                "grammar pass"
            );
        }
    }

    points.sort_by_key(|p| p.ordinal);
    points
}
