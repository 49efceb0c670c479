//! Hop line parsing.
//!
//! A `traceroute -q 1` hop line takes one of two shapes:
//!
//! ```text
//!  3  206.72.211.148.any2ix.coresite.com (206.72.211.148)  0.742 ms
//!  4  206.72.211.148  0.742 ms
//! ```
//!
//! The parser only has to find the address candidate; validating it is left
//! to [`crate::classify`].

/// Marker traceroute prints for a probe that got no answer.
pub const WILDCARD: char = '*';

/// Result of parsing one raw hop line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HopLine<'a> {
    /// Empty line or a line with an unanswered probe. Emitted unchanged.
    Passthrough,
    /// Fewer than three whitespace separated fields.
    Unparseable,
    /// A hop carrying an address candidate, not yet validated.
    Hop { addr: &'a str },
}

/// Parse a trimmed hop line into its address candidate.
///
/// The candidate is the third field when it is wrapped in parentheses (the
/// `hostname (ip)` form), otherwise the second field. Any trailing fields,
/// such as the `[AS15169]` annotation of `traceroute -A`, are ignored.
pub fn parse_line(line: &str) -> HopLine<'_> {
    if line.is_empty() || line.contains(WILDCARD) {
        return HopLine::Passthrough;
    }

    let mut fields = line.split_whitespace();
    let (second, third) = match (fields.next(), fields.next(), fields.next()) {
        (Some(_), Some(second), Some(third)) => (second, third),
        _ => return HopLine::Unparseable,
    };

    let addr = third
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(second);

    HopLine::Hop { addr }
}
