//! # Knot label grammar
//!
//! One parser for the corpus's knot label conventions, instead of ad hoc
//! string surgery at every call site. Accepted forms:
//!
//! - `<crossings><a|n>_<id>` — census labels such as `14a_123` or `14n_45`
//!   (`a` alternating, `n` non-alternating);
//! - `<source>:<id>` — scraped labels such as `16a_hyp_jones:8741`.
//!
//! The crossing-number bucket is the label's leading numeral run; the knot
//! identifier is the trailing numeral segment after the last `:` or `_`, with
//! any stray suffix letters stripped. Anything that does not fit yields
//! `None`, which callers count and skip.

/// A parsed knot label: crossing-number bucket plus numeric identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnotLabel {
    /// Crossing-number bucket, e.g. "14"
    pub crossings: String,
    /// Numeric knot identifier within the bucket
    pub id: u64,
}

/// Parse a corpus label into its (bucket, id) pair.
pub fn parse_label(label: &str) -> Option<KnotLabel> {
    let crossings: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    if crossings.is_empty() {
        return None;
    }

    let tail = match (label.rfind(':'), label.rfind('_')) {
        (Some(c), Some(u)) => &label[c.max(u) + 1..],
        (Some(c), None) => &label[c + 1..],
        (None, Some(u)) => &label[u + 1..],
        (None, None) => return None,
    };
    let digits = tail.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id = digits.parse().ok()?;
    Some(KnotLabel { crossings, id })
}
