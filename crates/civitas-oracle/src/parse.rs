//! LLM response parsing into typed payloads.
//!
//! The LLM returns raw text, ideally JSON. Models wrap it in markdown
//! fences, add prose around it, or leave trailing commas, so parsing tries
//! several recovery strategies before giving up:
//!
//! 1. Direct `serde_json` deserialization
//! 2. Extract JSON from a markdown code block
//! 3. Take the outermost `{ ... }` span
//!
//! Each candidate is tried as-is and again with trailing commas stripped.
//! Payload validation happens later, in `civitas-core`.

use std::collections::BTreeMap;

use civitas_types::{DailySchedule, TimeSlot};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::LlmError;

/// Parse an LLM response into `T` through the recovery strategies.
///
/// # Errors
///
/// Returns [`LlmError::Parse`] if no strategy yields a valid `T`.
pub fn parse_payload<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let trimmed = raw.trim();
    let candidates = [
        Some(trimmed),
        extract_json_from_codeblock(trimmed),
        extract_brace_span(trimmed),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(parsed) = serde_json::from_str::<T>(candidate) {
            return Ok(parsed);
        }
        let cleaned = strip_trailing_commas(candidate);
        if let Ok(parsed) = serde_json::from_str::<T>(&cleaned) {
            return Ok(parsed);
        }
    }

    Err(LlmError::Parse(format!(
        "all parse strategies failed for: {}",
        preview(trimmed)
    )))
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// One planned activity as the LLM writes it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawActivity {
    Detailed {
        #[serde(default)]
        time: Option<String>,
        action: String,
        #[serde(default)]
        location: Option<String>,
    },
    Plain(String),
}

impl RawActivity {
    fn into_line(self) -> Option<String> {
        let line = match self {
            Self::Detailed {
                time,
                action,
                location,
            } => {
                let mut line = String::new();
                if let Some(time) = time.filter(|t| !t.trim().is_empty()) {
                    line.push_str(time.trim());
                    line.push(' ');
                }
                line.push_str(action.trim());
                if let Some(location) = location.filter(|l| !l.trim().is_empty()) {
                    line.push_str(" at ");
                    line.push_str(location.trim());
                }
                line
            }
            Self::Plain(text) => text.trim().to_owned(),
        };
        if line.is_empty() { None } else { Some(line) }
    }
}

/// Parse a schedule response (`{"morning": [...], ...}`) into a
/// [`DailySchedule`].
///
/// Activities may be objects with `time`, `action`, and `location`, or
/// plain strings. Unknown slot names are ignored.
///
/// # Errors
///
/// Returns [`LlmError::Parse`] if the text holds no slot map or every slot
/// is empty.
pub fn parse_schedule(raw: &str) -> Result<DailySchedule, LlmError> {
    let map: BTreeMap<String, Vec<RawActivity>> = parse_payload(raw)?;

    let mut schedule = DailySchedule::default();
    for (name, activities) in map {
        let Some(slot) = slot_from_name(&name) else {
            continue;
        };
        let lines: Vec<String> = activities
            .into_iter()
            .filter_map(RawActivity::into_line)
            .collect();
        if !lines.is_empty() {
            schedule.slots.insert(slot, lines);
        }
    }

    if schedule.is_empty() {
        return Err(LlmError::Parse("schedule has no activities".to_owned()));
    }
    Ok(schedule)
}

fn slot_from_name(name: &str) -> Option<TimeSlot> {
    let name = name.trim().to_lowercase();
    TimeSlot::ALL.into_iter().find(|slot| slot.as_str() == name)
}

// ---------------------------------------------------------------------------
// Recovery helpers
// ---------------------------------------------------------------------------

/// Extract JSON content from a markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let open = text.find("```json").map_or_else(
        || text.find("```").map(|i| (i, 3usize)),
        |i| Some((i, 7usize)),
    )?;
    let (index, tag_len) = open;
    let after_tag = index.checked_add(tag_len)?;

    let start = text
        .get(after_tag..)
        .and_then(|s| s.find('\n'))
        .and_then(|nl| after_tag.checked_add(nl))
        .and_then(|pos| pos.checked_add(1))
        .unwrap_or(after_tag);

    let remaining = text.get(start..)?;
    let end = remaining.find("```")?;
    remaining.get(..end).map(str::trim)
}

/// The span from the first `{` to the last `}`.
fn extract_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

/// Strip trailing commas before closing braces and brackets.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ',' {
            let rest: String = chars.clone().skip_while(|n| n.is_whitespace()).take(1).collect();
            if rest == "}" || rest == "]" {
                continue;
            }
        }
        result.push(c);
    }
    result
}

/// First 200 characters of a response, for error messages.
fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}
