/* 📖 # Why derive ids instead of storing them?

The id of a reference is the HTML anchor the rendered page uses for it
(`#cite_note-smith-1`). Deriving it from the stored name and key with the same
rules the renderer uses means API consumers can link straight into the page.

The rules: wrap the raw key in the configured prefix and suffix, turn spaces into
underscores, percent-encode everything outside `[A-Za-z0-9_.:-]` and write the
`%` as `.`, then collapse runs of underscores.
*/

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::reference::RefName;

const ANCHOR_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b':')
    .remove(b'-');

pub const DEFAULT_LINK_PREFIX: &str = "cite_note-";
pub const DEFAULT_LINK_SUFFIX: &str = "";

/// Turns reference names and keys into anchor ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceKeyEncoder {
    prefix: String,
    suffix: String,
}

impl ReferenceKeyEncoder {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Id of a reference: `name-key` for named references, `key` otherwise.
    pub fn reference_id(&self, name: &RefName, key: u64) -> String {
        match name.explicit() {
            Some(name) => self.encode(&format!("{}-{}", name, key)),
            None => self.encode(&key.to_string()),
        }
    }

    /// Wrap `raw` in prefix and suffix and normalize it into a valid anchor.
    pub fn encode(&self, raw: &str) -> String {
        let wrapped = format!("{}{}{}", self.prefix, raw, self.suffix).replace(' ', "_");
        let escaped = utf8_percent_encode(&wrapped, ANCHOR_ENCODE_SET)
            .to_string()
            .replace('%', ".");
        collapse_underscores(&escaped)
    }
}

impl Default for ReferenceKeyEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_PREFIX, DEFAULT_LINK_SUFFIX)
    }
}

fn collapse_underscores(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_underscore = false;
    for c in s.chars() {
        if c == '_' {
            if !previous_underscore {
                out.push(c);
            }
            previous_underscore = true;
        } else {
            out.push(c);
            previous_underscore = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_and_indexed_use_key_only() {
        let encoder = ReferenceKeyEncoder::default();
        assert_eq!(encoder.reference_id(&RefName::Anonymous, 1), "cite_note-1");
        assert_eq!(encoder.reference_id(&RefName::Index(7), 3), "cite_note-3");
    }

    #[test]
    fn test_named_uses_name_and_key() {
        let encoder = ReferenceKeyEncoder::default();
        assert_eq!(
            encoder.reference_id(&RefName::Named("note".to_string()), 2),
            "cite_note-note-2"
        );
    }

    #[test]
    fn test_spaces_and_underscore_runs() {
        let encoder = ReferenceKeyEncoder::default();
        assert_eq!(encoder.encode("Smith  2010__a"), "cite_note-Smith_2010_a");
    }

    #[test]
    fn test_non_ascii_and_punctuation_are_escaped() {
        let encoder = ReferenceKeyEncoder::default();
        assert_eq!(encoder.encode("é"), "cite_note-.C3.A9");
        assert_eq!(encoder.encode("a&b"), "cite_note-a.26b");
        assert_eq!(encoder.encode("v1.2:x"), "cite_note-v1.2:x");
    }

    #[test]
    fn test_custom_prefix_and_suffix() {
        let encoder = ReferenceKeyEncoder::new("ref ", "_end");
        assert_eq!(encoder.encode("1"), "ref_1_end");
    }
}
