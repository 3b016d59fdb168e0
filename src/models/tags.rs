//! Inline tag extraction from free-text notes.
//!
//! A tag is any whitespace-delimited token starting with `+`:
//! `+review` (bare, empty value) or `+client=acme` (split on the first `=`).

use std::collections::BTreeMap;

pub const TAG_PREFIX: char = '+';

pub type Tags = BTreeMap<String, String>;

/// Scan `note` for tags. The same key may appear more than once only with
/// the same value.
pub fn parse_tags(note: &str) -> Result<Tags, String> {
    let mut tags = Tags::new();

    for token in note.split_whitespace() {
        let Some(body) = token.strip_prefix(TAG_PREFIX) else {
            continue;
        };

        let (key, value) = match body.split_once('=') {
            Some((k, v)) => (k, v),
            None => (body, ""),
        };

        // "+" or "+=x" alone is punctuation, not a tag
        if key.is_empty() {
            continue;
        }

        match tags.get(key) {
            Some(existing) if existing != value => {
                return Err(format!(
                    "tag '{}' has conflicting values '{}' and '{}'",
                    key, existing, value
                ));
            }
            Some(_) => {}
            None => {
                tags.insert(key.to_string(), value.to_string());
            }
        }
    }

    Ok(tags)
}
