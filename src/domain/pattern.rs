//! Hierarchical topic patterns.
//!
//! A pattern is a dot-delimited sequence of segments:
//! - `*` matches exactly one segment
//! - `**` matches zero or more segments
//! - anything else matches itself literally
//!
//! Patterns compile to an anchored regular expression once and are then
//! matched against event types. No pattern is rejected: wildcards embedded
//! inside a segment (`ta*k`, `a**b`) act within that position, with `*`
//! matching any run of non-dot characters and `**` matching anything.

use regex::Regex;

/// One position of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    /// A single segment, already translated to regex syntax
    Segment(String),
    /// A `**` segment spanning zero or more whole segments
    Multi,
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    // Only used if the generated expression exceeds the regex size limit
    Exact,
}

/// A compiled wildcard pattern.
///
/// # Example
/// ```
/// use request_governor::TopicPattern;
///
/// let one = TopicPattern::compile("task.*.completed");
/// assert!(one.matches("task.123.completed"));
/// assert!(!one.matches("task.123.456.completed"));
///
/// let many = TopicPattern::compile("task.**");
/// assert!(many.matches("task.completed"));
/// assert!(many.matches("task.123.456.completed"));
/// ```
#[derive(Debug, Clone)]
pub struct TopicPattern {
    raw: String,
    matcher: Matcher,
}

impl TopicPattern {
    /// Compile a pattern.
    pub fn compile(pattern: &str) -> Self {
        let source = to_regex_source(pattern);
        let matcher = match Regex::new(&source) {
            Ok(regex) => Matcher::Regex(regex),
            Err(e) => {
                tracing::warn!(
                    pattern,
                    error = %e,
                    "pattern too large to compile, falling back to exact match"
                );
                Matcher::Exact
            }
        };

        Self {
            raw: pattern.to_string(),
            matcher,
        }
    }

    /// Whether `event_type` matches this pattern.
    pub fn matches(&self, event_type: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(event_type),
            Matcher::Exact => self.raw == event_type,
        }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The compiled regular expression, if one was built.
    pub fn regex(&self) -> Option<&Regex> {
        match &self.matcher {
            Matcher::Regex(regex) => Some(regex),
            Matcher::Exact => None,
        }
    }

    /// Whether the pattern contains any wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.raw.contains('*')
    }
}

impl PartialEq for TopicPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for TopicPattern {}

impl std::fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse(pattern: &str) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = Vec::new();
    for segment in pattern.split('.') {
        let piece = match segment {
            "**" => Piece::Multi,
            "*" => Piece::Segment("[^.]+".to_string()),
            _ => Piece::Segment(translate_segment(segment)),
        };
        // `a.**.**.b` is the same as `a.**.b`
        if piece == Piece::Multi && pieces.last() == Some(&Piece::Multi) {
            continue;
        }
        pieces.push(piece);
    }
    pieces
}

fn translate_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() * 2);
    let mut literal = String::new();
    let mut chars = segment.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '*' {
            literal.push(c);
            continue;
        }
        out.push_str(&regex::escape(&literal));
        literal.clear();
        if chars.peek() == Some(&'*') {
            chars.next();
            out.push_str(".*");
        } else {
            out.push_str("[^.]*");
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}

fn to_regex_source(pattern: &str) -> String {
    let pieces = parse(pattern);
    let last = pieces.len().saturating_sub(1);
    let mut out = String::from("^");

    for (i, piece) in pieces.iter().enumerate() {
        match piece {
            Piece::Segment(segment) => {
                if i > 0 && pieces[i - 1] != Piece::Multi {
                    out.push_str(r"\.");
                }
                out.push_str(segment);
            }
            Piece::Multi => {
                let fragment = match (i > 0, i < last) {
                    (false, false) => ".*",
                    (false, true) => r"(?:.*\.)?",
                    (true, false) => r"(?:\..*)?",
                    (true, true) => r"(?:\..*)?\.",
                };
                out.push_str(fragment);
            }
        }
    }

    out.push('$');
    out
}
