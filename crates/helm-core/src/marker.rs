//! Interaction-pause marker scanning.
//!
//! The model requests a blocking user answer by emitting the literal tagged
//! substring `[PAUSE_INTERACTION: "<prompt>"]` in its text. The marker may
//! arrive split across stream fragments, so callers scan a cumulative buffer
//! rather than individual fragments.

use std::sync::LazyLock;

use regex::Regex;

static INTERACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[PAUSE_INTERACTION:\s*"([^"]+)"\]"#).expect("interaction marker pattern")
});

/// A located interaction-pause marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerMatch {
    /// Byte offset of the marker's `[` in the scanned text.
    pub start: usize,
    /// Byte offset one past the marker's `]`.
    pub end: usize,
    /// The extracted prompt text.
    pub prompt: String,
}

/// Find the first interaction-pause marker in `text`.
///
/// The prompt is everything between the quotes; a `]` inside the prompt does
/// not terminate the marker.
#[must_use]
pub fn find_interaction_marker(text: &str) -> Option<MarkerMatch> {
    let captures = INTERACTION_RE.captures(text)?;
    let whole = captures.get(0)?;
    Some(MarkerMatch {
        start: whole.start(),
        end: whole.end(),
        prompt: captures.get(1)?.as_str().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_marker_and_prompt() {
        let m = find_interaction_marker(r#"Before. [PAUSE_INTERACTION: "Pick a name"] After"#)
            .unwrap();
        assert_eq!(m.prompt, "Pick a name");
        assert_eq!(m.start, 8);
        assert_eq!(&r#"Before. [PAUSE_INTERACTION: "Pick a name"] After"#[m.start..m.end],
            r#"[PAUSE_INTERACTION: "Pick a name"]"#);
    }

    #[test]
    fn no_marker_in_plain_text() {
        assert!(find_interaction_marker("just some text [not a marker]").is_none());
    }

    #[test]
    fn tolerates_missing_space_after_colon() {
        let m = find_interaction_marker(r#"[PAUSE_INTERACTION:"Continue?"]"#).unwrap();
        assert_eq!(m.prompt, "Continue?");
    }

    #[test]
    fn prompt_may_contain_closing_bracket() {
        let m = find_interaction_marker(r#"[PAUSE_INTERACTION: "Use arr[0] or arr[1]?"]"#)
            .unwrap();
        assert_eq!(m.prompt, "Use arr[0] or arr[1]?");
    }

    #[test]
    fn incomplete_marker_does_not_match() {
        assert!(find_interaction_marker(r#"text [PAUSE_INTERACTION: "half"#).is_none());
    }

    #[test]
    fn first_of_two_markers_wins() {
        let m = find_interaction_marker(
            r#"[PAUSE_INTERACTION: "first"] and [PAUSE_INTERACTION: "second"]"#,
        )
        .unwrap();
        assert_eq!(m.prompt, "first");
    }
}
