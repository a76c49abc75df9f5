//! Join-key normalization for cross-source matching.
//!
//! Every city and neighborhood string passes through [`normalize`] before any
//! read, aggregation, or join, so that "Downtown ", "downtown" and
//! "DOWNTOWN  " all land on the same key.

/// Canonicalizes a free-text key value.
///
/// `None` propagates unchanged. Otherwise the value is ASCII-lowercased,
/// trimmed, and every run of consecutive interior spaces is collapsed to a
/// single space.
///
/// Only ASCII case is folded; punctuation, accents, and non-ASCII case are
/// left as-is. That is a known limitation of the matching scheme, not
/// something callers should work around.
pub fn normalize(text: Option<&str>) -> Option<String> {
    let text = text?;
    let mut out = text.trim().to_ascii_lowercase();
    while out.contains("  ") {
        out = out.replace("  ", " ");
    }
    Some(out)
}

/// Composite (city, neighborhood) identifier, post-normalization.
///
/// All cross-source matching keys on this pair. `Ord` is derived so keyed
/// tables iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinKey {
    pub city: String,
    pub neighborhood: String,
}

impl JoinKey {
    pub fn new(city: impl Into<String>, neighborhood: impl Into<String>) -> Self {
        JoinKey {
            city: city.into(),
            neighborhood: neighborhood.into(),
        }
    }
}
