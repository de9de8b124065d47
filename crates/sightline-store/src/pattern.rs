//! Key patterns for `track_match`
//!
//! A pattern is a key in which `*` stands for zero or more characters. Every
//! other character, including the glob metacharacters `?`, `[` and `]`, is
//! literal. Matching is anchored at both ends.

use glob::{MatchOptions, Pattern};

use sightline_core::{Result, SightlineError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiled key pattern
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    compiled: Pattern,
}

impl KeyPattern {
    /// Compile `raw`. Blank patterns are rejected.
    pub fn new(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(SightlineError::invalid_argument("pattern must not be blank"));
        }

        let collapsed = collapse_stars(raw);
        let escaped = collapsed
            .split('*')
            .map(Pattern::escape)
            .collect::<Vec<_>>()
            .join("*");
        let compiled = Pattern::new(&escaped).map_err(|e| {
            SightlineError::invalid_argument(format!("invalid pattern '{raw}': {e}"))
        })?;

        Ok(Self {
            raw: raw.to_string(),
            compiled,
        })
    }

    /// Whether `key` matches the whole pattern
    pub fn matches(&self, key: &str) -> bool {
        self.compiled.matches_with(key, MATCH_OPTIONS)
    }

    /// Pattern as supplied
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

// glob rejects `**` that is not a whole path component; a run of stars
// means the same as one star here.
fn collapse_stars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut previous_star = false;
    for c in raw.chars() {
        let star = c == '*';
        if !(star && previous_star) {
            out.push(c);
        }
        previous_star = star;
    }
    out
}
