//! Temporal consistency analysis (`spec.md` §4.13 "Temporal Module").
//!
//! Extracts relative-time markers ("al día siguiente", "tres años después"),
//! anchors them into a day-offset timeline relative to the manuscript's
//! first dated event, and flags inconsistencies where narrative order and
//! computed chronological order disagree without an explicit flashback
//! marker.

use regex::Regex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MarkerKind {
    /// "al día siguiente", "una semana después" — relative to the nearest
    /// preceding anchored event.
    RelativeForward,
    /// "tres años antes", "recordó cuando" — signals a flashback; narrative
    /// order is expected to run ahead of chronological order here.
    RelativeBackward,
    /// "el 12 de marzo de 1921" — an absolute calendar anchor.
    Absolute,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TemporalMarker {
    pub start_char: usize,
    pub end_char: usize,
    pub surface: String,
    pub kind: MarkerKind,
    /// Parsed day delta for relative markers; `None` for absolute markers
    /// (those anchor a fresh origin rather than offsetting one).
    pub day_delta: Option<i64>,
}

struct Pattern {
    regex: Regex,
    kind: MarkerKind,
    /// Sign applied to the parsed quantity; `RelativeBackward` patterns are
    /// negative.
    day_multiplier: i64,
    unit_days: i64,
}

fn patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            regex: Regex::new(r"(?i)al\s+día\s+siguiente").unwrap(),
            kind: MarkerKind::RelativeForward,
            day_multiplier: 1,
            unit_days: 1,
        },
        Pattern {
            regex: Regex::new(r"(?i)(\d+|un[ao]?)\s+día[s]?\s+despu[ée]s").unwrap(),
            kind: MarkerKind::RelativeForward,
            day_multiplier: 1,
            unit_days: 1,
        },
        Pattern {
            regex: Regex::new(r"(?i)(\d+|un[ao]?)\s+semana[s]?\s+despu[ée]s").unwrap(),
            kind: MarkerKind::RelativeForward,
            day_multiplier: 1,
            unit_days: 7,
        },
        Pattern {
            regex: Regex::new(r"(?i)(\d+|un[ao]?)\s+mes(es)?\s+despu[ée]s").unwrap(),
            kind: MarkerKind::RelativeForward,
            day_multiplier: 1,
            unit_days: 30,
        },
        Pattern {
            regex: Regex::new(r"(?i)(\d+|un[ao]?)\s+a[ñn]o[s]?\s+despu[ée]s").unwrap(),
            kind: MarkerKind::RelativeForward,
            day_multiplier: 1,
            unit_days: 365,
        },
        Pattern {
            regex: Regex::new(r"(?i)(\d+|un[ao]?)\s+a[ñn]o[s]?\s+antes").unwrap(),
            kind: MarkerKind::RelativeBackward,
            day_multiplier: -1,
            unit_days: 365,
        },
        Pattern {
            regex: Regex::new(r"(?i)record[oó]\s+cuando|volvi[oó]\s+a\s+pensar\s+en").unwrap(),
            kind: MarkerKind::RelativeBackward,
            day_multiplier: -1,
            unit_days: 0,
        },
    ]
}

fn parse_quantity(text: &str) -> i64 {
    if let Ok(n) = text.parse::<i64>() {
        return n;
    }
    match text.to_lowercase().as_str() {
        "un" | "una" | "uno" => 1,
        _ => 1,
    }
}

/// Scan a chapter's text for temporal markers using the closed pattern set
/// above. This intentionally mirrors a lexicon/regex approach rather than
/// full date parsing, since the marker vocabulary in literary prose is a
/// small closed class.
pub fn extract_markers(text: &str) -> Vec<TemporalMarker> {
    let mut markers = Vec::new();
    for pattern in patterns() {
        for caps in pattern.regex.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            let quantity = caps
                .get(1)
                .map(|m| parse_quantity(m.as_str()))
                .unwrap_or(1);
            let day_delta = if pattern.unit_days == 0 {
                None
            } else {
                Some(pattern.day_multiplier * quantity * pattern.unit_days)
            };
            markers.push(TemporalMarker {
                start_char: whole.start(),
                end_char: whole.end(),
                surface: whole.as_str().to_string(),
                kind: pattern.kind,
                day_delta,
            });
        }
    }
    markers.sort_by_key(|m| m.start_char);
    markers
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub char_pos: usize,
    /// Narrative order: the event's position in reading order.
    pub narrative_order: usize,
    /// Chronological day offset computed by walking markers forward from
    /// the first anchor; `None` when no anchor could be established.
    pub day_offset: Option<i64>,
    pub is_flashback_marked: bool,
}

#[derive(Debug, Clone)]
pub struct TemporalInconsistency {
    pub event_a: Uuid,
    pub event_b: Uuid,
    pub description: String,
}

/// Build a day-offset timeline from a chapter's markers, starting from
/// offset 0 at the chapter's first event and applying forward/backward
/// deltas as they're encountered in reading order.
pub fn build_timeline(chapter_id: Uuid, markers: &[TemporalMarker]) -> Vec<TimelineEvent> {
    let mut events = Vec::new();
    let mut running_offset = 0i64;
    for (order, marker) in markers.iter().enumerate() {
        if let Some(delta) = marker.day_delta {
            running_offset += delta;
        }
        events.push(TimelineEvent {
            id: Uuid::new_v4(),
            chapter_id,
            char_pos: marker.start_char,
            narrative_order: order,
            day_offset: Some(running_offset),
            is_flashback_marked: marker.kind == MarkerKind::RelativeBackward,
        });
    }
    events
}

/// Flag pairs of consecutive events where chronological order runs behind
/// narrative order without an explicit flashback marker on the earlier
/// event — a contradiction a careful editor would want surfaced
/// (`spec.md` §4.13 "Inconsistency").
pub fn find_inconsistencies(events: &[TimelineEvent]) -> Vec<TemporalInconsistency> {
    let mut out = Vec::new();
    for pair in events.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if let (Some(offset_a), Some(offset_b)) = (a.day_offset, b.day_offset) {
            if offset_b < offset_a && !b.is_flashback_marked {
                out.push(TemporalInconsistency {
                    event_a: a.id,
                    event_b: b.id,
                    description: format!(
                        "event at narrative position {} occurs chronologically before the one at {} with no flashback marker",
                        b.narrative_order, a.narrative_order
                    ),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_day_after_marker() {
        let markers = extract_markers("Al día siguiente, todo había cambiado.");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].day_delta, Some(1));
    }

    #[test]
    fn detects_years_later_marker() {
        let markers = extract_markers("Tres años después, volvió al pueblo.");
        assert_eq!(markers[0].day_delta, Some(3 * 365));
    }

    #[test]
    fn backward_marker_without_flashback_flag_creates_inconsistency() {
        let chapter_id = Uuid::new_v4();
        let markers = vec![
            TemporalMarker { start_char: 0, end_char: 1, surface: "a".into(), kind: MarkerKind::RelativeForward, day_delta: Some(10) },
            TemporalMarker { start_char: 2, end_char: 3, surface: "b".into(), kind: MarkerKind::RelativeForward, day_delta: Some(-20) },
        ];
        let events = build_timeline(chapter_id, &markers);
        let inconsistencies = find_inconsistencies(&events);
        assert_eq!(inconsistencies.len(), 1);
    }

    #[test]
    fn flashback_marked_event_does_not_flag() {
        let chapter_id = Uuid::new_v4();
        let markers = vec![
            TemporalMarker { start_char: 0, end_char: 1, surface: "a".into(), kind: MarkerKind::RelativeForward, day_delta: Some(10) },
            TemporalMarker { start_char: 2, end_char: 3, surface: "b".into(), kind: MarkerKind::RelativeBackward, day_delta: Some(-20) },
        ];
        let events = build_timeline(chapter_id, &markers);
        assert!(find_inconsistencies(&events).is_empty());
    }
}
