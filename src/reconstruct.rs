//! Synthetic history for messages edited before tracking began
//!
//! This is a heuristic fallback so that a viewer opened on a legacy edited
//! message is not empty. It never claims to be the real edit sequence.

/// Text used for the first version when no sequence pattern is found
pub const PLACEHOLDER_TEXT: &str = "Original message";

/// How far back the first synthetic version is placed (seconds)
pub const FIRST_VERSION_AGE: i64 = 300;

/// Spacing between synthetic edits (seconds)
pub const EDIT_SPACING: i64 = 30;

/// Upper bound on versions synthesized from a trailing number
pub const MAX_SYNTHETIC_VERSIONS: u32 = 100;

/// One fabricated version of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticVersion {
    pub text: String,
    pub timestamp: i64,
}

/// Build a plausible version sequence ending in `current_text`.
///
/// Text shaped like `<prefix><N>` (e.g. `"ку4"`) yields `N` versions
/// `<prefix>1 ..= <prefix>N`, 30 seconds apart, the first one five minutes
/// before `now`. Anything else yields the placeholder followed by the
/// current text. The result always has at least two versions except for
/// `<prefix>1`, which yields exactly one.
pub fn synthesize_versions(current_text: &str, now: i64) -> Vec<SyntheticVersion> {
    let base = now - FIRST_VERSION_AGE;

    if let Some((prefix, count)) = split_sequence(current_text) {
        return (1..=count)
            .map(|i| SyntheticVersion {
                text: format!("{}{}", prefix, i),
                timestamp: base + i64::from(i - 1) * EDIT_SPACING,
            })
            .collect();
    }

    vec![
        SyntheticVersion {
            text: PLACEHOLDER_TEXT.to_string(),
            timestamp: base,
        },
        SyntheticVersion {
            text: current_text.to_string(),
            timestamp: now,
        },
    ]
}

/// Split `<prefix><N>` where `<prefix>` is non-empty and `N` is the maximal
/// run of trailing ASCII digits (or all but the first character when the
/// text is entirely digits).
fn split_sequence(text: &str) -> Option<(&str, u32)> {
    let digits_start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;

    // Prefix must be non-empty: borrow the first char when all digits
    let digits_start = if digits_start == 0 {
        text.char_indices().nth(1).map(|(i, _)| i)?
    } else {
        digits_start
    };

    let (prefix, digits) = text.split_at(digits_start);
    let count: u32 = digits.parse().ok()?;

    if count == 0 || count > MAX_SYNTHETIC_VERSIONS {
        return None;
    }

    Some((prefix, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_sequence_pattern() {
        let versions = synthesize_versions("ку4", NOW);

        let texts: Vec<&str> = versions.iter().map(|v| v.text.as_str()).collect();
        assert_eq!(texts, vec!["ку1", "ку2", "ку3", "ку4"]);

        assert!(versions.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(versions[0].timestamp, NOW - 300);
        assert_eq!(versions[3].timestamp, NOW - 300 + 90);
    }

    #[test]
    fn test_no_pattern_falls_back_to_placeholder() {
        let versions = synthesize_versions("hello there", NOW);

        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].text, PLACEHOLDER_TEXT);
        assert_eq!(versions[0].timestamp, NOW - 300);
        assert_eq!(versions[1].text, "hello there");
        assert_eq!(versions[1].timestamp, NOW);
    }

    #[test]
    fn test_degenerate_numbers_fall_back() {
        assert_eq!(synthesize_versions("item0", NOW).len(), 2);
        assert_eq!(synthesize_versions("item5000", NOW).len(), 2);
        assert_eq!(synthesize_versions("x99999999999999999999", NOW).len(), 2);
        assert_eq!(synthesize_versions("", NOW).len(), 2);
    }

    #[test]
    fn test_all_digit_text_uses_first_char_as_prefix() {
        let versions = synthesize_versions("12", NOW);
        let texts: Vec<&str> = versions.iter().map(|v| v.text.as_str()).collect();
        assert_eq!(texts, vec!["11", "12"]);

        // A single digit has no room for a prefix
        assert_eq!(synthesize_versions("7", NOW)[0].text, PLACEHOLDER_TEXT);
    }

    #[test]
    fn test_multibyte_prefix_boundary() {
        let versions = synthesize_versions("версия3", NOW);
        assert_eq!(versions.last().unwrap().text, "версия3");
        assert_eq!(versions.len(), 3);
    }
}
