//! Text annotation extractor.
//!
//! Separates display text from the structured data a backend embeds in an
//! answer:
//! - citations: `[ref]` (stripped, `ref` collected)
//! - inline follow-up questions: `<<question?>>` (stripped, collected)
//! - follow-up section: everything after the next-question indicator
//!   (default `Next Questions:`, ASCII case-insensitive)
//! - reasoning steps: numbered lines (`1. ...`) of the body, collected only
//!   when the answer has a follow-up section
//!
//! Markers eat the spaces/tabs right before them. A marker body holds
//! 1..=[`MAX_MARKER_LEN`] characters and no newline; anything else is kept
//! as literal text. Extraction never fails.
//!
//! # Example
//! ```
//! use answer_parser::AnnotationExtractor;
//!
//! let out = AnnotationExtractor::default()
//!     .extract("Diet tips [DOC1] Next Questions: How much water should I drink?");
//! assert_eq!(out.display, "Diet tips");
//! assert_eq!(out.annotations.citations[0].as_str(), "DOC1");
//! assert_eq!(out.annotations.followup_questions, ["How much water should I drink?"]);
//! ```

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::Citation;

/// Default indicator that opens the follow-up section of an answer.
pub const DEFAULT_NEXT_QUESTION_INDICATOR: &str = "Next Questions:";

/// Longest marker body (in characters) still treated as a marker.
pub const MAX_MARKER_LEN: usize = 200;

static INLINE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]*(?:\[([^\[\]\n]{1,200})\]|<<([^<>\n]{1,200})>>)")
        .expect("inline marker pattern")
});

static FOLLOWUP_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<([^<>\n]{1,200})>>").expect("follow-up marker pattern"));

static STEP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\d+[.)][ \t]+(.+?)[ \t\r]*$").expect("step line pattern")
});

static LIST_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+[.)]|[-*•])\s*").expect("list prefix pattern"));

/// Values collected from marker syntax, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    pub citations: Vec<Citation>,
    pub following_steps: Vec<String>,
    pub followup_questions: Vec<String>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
            && self.following_steps.is_empty()
            && self.followup_questions.is_empty()
    }

    /// Appends `other`, skipping citations that are already known.
    ///
    /// Returns `true` when anything was added.
    pub fn merge(&mut self, other: Annotations) -> bool {
        let before = self.len();
        for citation in other.citations {
            if !self.citations.contains(&citation) {
                self.citations.push(citation);
            }
        }
        self.following_steps.extend(other.following_steps);
        self.followup_questions.extend(other.followup_questions);
        self.len() != before
    }

    fn len(&self) -> usize {
        self.citations.len() + self.following_steps.len() + self.followup_questions.len()
    }
}

/// Result of a one-shot extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub display: String,
    pub annotations: Annotations,
}

/// Marker extractor, parameterized by the follow-up section indicator.
#[derive(Debug, Clone)]
pub struct AnnotationExtractor {
    indicator: String,
}

impl Default for AnnotationExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_NEXT_QUESTION_INDICATOR)
    }
}

impl AnnotationExtractor {
    pub fn new(indicator: impl Into<String>) -> Self {
        Self {
            indicator: indicator.into(),
        }
    }

    pub fn indicator(&self) -> &str {
        &self.indicator
    }

    /// Extracts a complete answer into fresh annotations.
    pub fn extract(&self, text: &str) -> Extraction {
        let (display, annotations) = self.extract_into(text, Annotations::default());
        Extraction {
            display,
            annotations,
        }
    }

    /// Extracts a complete answer, appending into `acc`.
    ///
    /// Returns the display text and the accumulator so callers can merge it
    /// into per-segment state.
    pub fn extract_into(&self, text: &str, acc: Annotations) -> (String, Annotations) {
        let Some(at) = self.find_indicator(text) else {
            let (body, acc) = self.clean_inline(text, acc);
            return (body.trim().to_string(), acc);
        };

        let (body, mut acc) = self.clean_inline(&text[..at], acc);
        let body = body.trim();
        collect_steps(body, &mut acc);
        for line in text[at + self.indicator.len()..].lines() {
            parse_followup_line(line, &mut acc);
        }
        (body.to_string(), acc)
    }

    /// Strips citation and inline follow-up markers from a body slice.
    ///
    /// Does not look for the follow-up indicator and does not trim.
    pub fn clean_inline(&self, text: &str, mut acc: Annotations) -> (String, Annotations) {
        let cleaned = INLINE_MARKER.replace_all(text, |caps: &Captures<'_>| {
            if let Some(reference) = caps.get(1) {
                let reference = reference.as_str().trim();
                if reference.is_empty() {
                    return caps[0].to_string();
                }
                acc.citations.push(Citation::new(reference));
            } else if let Some(question) = caps.get(2) {
                let question = question.as_str().trim();
                if question.is_empty() {
                    return caps[0].to_string();
                }
                acc.followup_questions.push(question.to_string());
            }
            String::new()
        });
        (cleaned.into_owned(), acc)
    }

    /// Byte offset of the first follow-up indicator in `text`.
    pub fn find_indicator(&self, text: &str) -> Option<usize> {
        let needle = self.indicator.as_bytes();
        if needle.is_empty() || text.len() < needle.len() {
            return None;
        }
        text.as_bytes()
            .windows(needle.len())
            .position(|w| w.eq_ignore_ascii_case(needle))
    }

    /// Length of the prefix of `pending` that no later input can change.
    ///
    /// Walks the markers the way [`clean_inline`](Self::clean_inline) finds
    /// them and stops at the first marker start that later input could
    /// still complete (an open `[` or `<<`, a trailing `<`). Complete markers
    /// are never split. A trailing partial indicator and trailing whitespace
    /// are held back as well.
    pub fn stable_prefix_len(&self, pending: &str) -> usize {
        let mut cut = pending.len();
        let mut complete = Vec::new();
        let mut pos = 0;
        loop {
            let next = INLINE_MARKER.find_at(pending, pos);
            let limit = next.map_or(pending.len(), |m| m.start());
            if let Some(at) = first_open_marker(pending, pos, limit) {
                cut = at;
                break;
            }
            match next {
                Some(m) => {
                    complete.push(m.range());
                    pos = m.end();
                }
                None => break,
            }
        }
        if let Some(k) = self.partial_indicator_len(pending) {
            cut = cut.min(pending.len() - k);
        }
        if let Some(span) = complete.iter().find(|s| s.start < cut && cut < s.end) {
            cut = span.start;
        }
        pending[..cut].trim_end().len()
    }

    /// Longest suffix of `text` that is a proper prefix of the indicator.
    fn partial_indicator_len(&self, text: &str) -> Option<usize> {
        let needle = self.indicator.as_bytes();
        let hay = text.as_bytes();
        (1..needle.len()).rev().find(|&k| {
            k <= hay.len()
                && text.is_char_boundary(hay.len() - k)
                && hay[hay.len() - k..].eq_ignore_ascii_case(&needle[..k])
        })
    }
}

/// Appends the numbered lines of `body` as reasoning steps.
pub fn collect_steps(body: &str, acc: &mut Annotations) {
    acc.following_steps.extend(
        STEP_LINE
            .captures_iter(body)
            .map(|caps| caps[1].trim().to_string())
            .filter(|step| !step.is_empty()),
    );
}

/// Parses one line of the follow-up section.
///
/// `<<...>>` markers win; otherwise the line (list numbering and bullets
/// removed) is split after every `?`.
pub fn parse_followup_line(line: &str, acc: &mut Annotations) {
    let before = acc.followup_questions.len();
    for caps in FOLLOWUP_MARKER.captures_iter(line) {
        let question = caps[1].trim();
        if !question.is_empty() {
            acc.followup_questions.push(question.to_string());
        }
    }
    if acc.followup_questions.len() != before {
        return;
    }

    let mut rest = line.trim();
    while !rest.is_empty() {
        let (piece, tail) = match rest.find('?') {
            Some(idx) => rest.split_at(idx + 1),
            None => (rest, ""),
        };
        let question = LIST_PREFIX.replace(piece.trim(), "");
        let question = question.trim();
        if !question.is_empty() && question != "?" {
            acc.followup_questions.push(question.to_string());
        }
        rest = tail.trim_start();
    }
}

/// First position in `text[from..to]` where a marker starts that is neither
/// complete nor ruled out by the text seen so far.
fn first_open_marker(text: &str, from: usize, to: usize) -> Option<usize> {
    text[from..to]
        .char_indices()
        .map(|(i, c)| (from + i, c))
        .find(|&(at, c)| match c {
            '[' => open_citation_at(text, at),
            '<' => at + 1 == text.len() || open_followup_at(text, at),
            _ => false,
        })
        .map(|(at, _)| at)
}

fn open_citation_at(text: &str, at: usize) -> bool {
    let rest = &text[at + 1..];
    rest.chars().count() <= MAX_MARKER_LEN && !rest.contains(['[', ']', '\n'])
}

fn open_followup_at(text: &str, at: usize) -> bool {
    let Some(rest) = text[at + 1..].strip_prefix('<') else {
        return false;
    };
    let body = rest.strip_suffix('>').unwrap_or(rest);
    body.chars().count() <= MAX_MARKER_LEN && !body.contains(['<', '>', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Extraction {
        AnnotationExtractor::default().extract(text)
    }

    #[test]
    fn diet_tips_example() {
        let out = extract("Diet tips [DOC1] Next Questions: How much water should I drink?");
        assert_eq!(out.display, "Diet tips");
        assert_eq!(out.annotations.citations, vec![Citation::new("DOC1")]);
        assert_eq!(
            out.annotations.followup_questions,
            vec!["How much water should I drink?".to_string()]
        );
        assert!(out.annotations.following_steps.is_empty());
    }

    #[test]
    fn clean_text_is_unchanged() {
        let text = "Drink water, sleep well and walk daily.";
        let out = extract(text);
        assert_eq!(out.display, text);
        assert!(out.annotations.is_empty());

        let again = extract(&out.display);
        assert_eq!(again, out);
    }

    #[test]
    fn citations_strip_preceding_spaces() {
        let out = extract("Eat fiber [a.pdf][b.pdf]. Walk more [a.pdf] daily.");
        assert_eq!(out.display, "Eat fiber. Walk more daily.");
        assert_eq!(
            out.annotations.citations,
            vec![Citation::new("a.pdf"), Citation::new("b.pdf"), Citation::new("a.pdf")]
        );
    }

    #[test]
    fn malformed_markers_stay_literal() {
        let out = extract("Ranges like [1, 2 and a[ ] box or <<open question");
        assert_eq!(out.display, "Ranges like [1, 2 and a[ ] box or <<open question");
        assert!(out.annotations.is_empty());

        let out = extract("line one [broken\n] line two");
        assert_eq!(out.display, "line one [broken\n] line two");
        assert!(out.annotations.citations.is_empty());
    }

    #[test]
    fn nested_bracket_keeps_outer_literal() {
        let out = extract("see [a [b] c]");
        assert_eq!(out.display, "see [a c]");
        assert_eq!(out.annotations.citations, vec![Citation::new("b")]);
    }

    #[test]
    fn overlong_marker_is_literal() {
        let long = "x".repeat(MAX_MARKER_LEN + 1);
        let text = format!("a [{long}] b");
        assert_eq!(extract(&text).display, text);
    }

    #[test]
    fn inline_followups_are_collected() {
        let out = extract("Sleep 8 hours. <<Why is sleep important?>> <<How to nap?>>");
        assert_eq!(out.display, "Sleep 8 hours.");
        assert_eq!(
            out.annotations.followup_questions,
            vec!["Why is sleep important?", "How to nap?"]
        );
    }

    #[test]
    fn steps_need_a_followup_section() {
        let body = "Try this:\n1. Drink water [w.pdf]\n2) Sleep early\n";
        let without = extract(body);
        assert!(without.annotations.following_steps.is_empty());
        assert_eq!(without.display, "Try this:\n1. Drink water\n2) Sleep early");

        let with = extract(&format!("{body}next questions:\n1. What else?\n- Is tea ok?"));
        assert_eq!(with.annotations.following_steps, vec!["Drink water", "Sleep early"]);
        assert_eq!(
            with.annotations.followup_questions,
            vec!["What else?", "Is tea ok?"]
        );
        assert_eq!(with.display, "Try this:\n1. Drink water\n2) Sleep early");
    }

    #[test]
    fn followup_line_splits_on_question_marks() {
        let mut acc = Annotations::default();
        parse_followup_line(" 1. Is coffee bad? 2. What about tea?", &mut acc);
        parse_followup_line("", &mut acc);
        parse_followup_line("<<A?>> ignored text <<B?>>", &mut acc);
        assert_eq!(acc.followup_questions, vec!["Is coffee bad?", "What about tea?", "A?", "B?"]);
    }

    #[test]
    fn extract_into_appends_to_existing_accumulator() {
        let extractor = AnnotationExtractor::default();
        let seed = Annotations {
            citations: vec![Citation::new("old")],
            ..Annotations::default()
        };
        let (text, acc) = extractor.extract_into("new [fresh]", seed);
        assert_eq!(text, "new");
        assert_eq!(acc.citations, vec![Citation::new("old"), Citation::new("fresh")]);
    }

    #[test]
    fn merge_skips_known_citations() {
        let mut acc = Annotations {
            citations: vec![Citation::new("a")],
            ..Annotations::default()
        };
        let added = acc.merge(Annotations {
            citations: vec![Citation::new("a")],
            ..Annotations::default()
        });
        assert!(!added);
        assert!(acc.merge(Annotations {
            followup_questions: vec!["q?".into()],
            ..Annotations::default()
        }));
    }

    #[test]
    fn custom_indicator() {
        let out = AnnotationExtractor::new("Follow-up:").extract("Answer FOLLOW-UP: More?");
        assert_eq!(out.display, "Answer");
        assert_eq!(out.annotations.followup_questions, vec!["More?"]);
    }

    #[test]
    fn stable_prefix_holds_back_open_constructs() {
        let x = AnnotationExtractor::default();
        assert_eq!(x.stable_prefix_len("Diet tips [DO"), "Diet tips".len());
        assert_eq!(x.stable_prefix_len("Diet tips [DOC1]"), "Diet tips [DOC1]".len());
        assert_eq!(x.stable_prefix_len("ask <<why"), "ask".len());
        assert_eq!(x.stable_prefix_len("ask <<why?>"), "ask".len());
        assert_eq!(x.stable_prefix_len("a <"), "a".len());
        assert_eq!(x.stable_prefix_len("tips Next Qu"), "tips".len());
        assert_eq!(x.stable_prefix_len("tips next"), "tips".len());
        assert_eq!(x.stable_prefix_len("tips  \n"), "tips".len());
        assert_eq!(x.stable_prefix_len("line [x\n more"), "line [x\n more".len());
    }

    #[test]
    fn stable_prefix_never_splits_a_complete_marker() {
        let x = AnnotationExtractor::default();
        // `[` inside a finished follow-up is plain marker content.
        assert_eq!(x.stable_prefix_len("a<<a[>>"), "a<<a[>>".len());
        assert_eq!(x.stable_prefix_len("a<<a[>><?<<q"), "a<<a[>><?".len());
        // An open citation may still swallow a follow-up that looks finished.
        assert_eq!(x.stable_prefix_len("x [a <<q>>"), "x".len());
        assert_eq!(x.stable_prefix_len("?[d1][<<<Ne"), "?[d1]".len());
        assert_eq!(x.stable_prefix_len("[d1] [<<<Ne]"), "[d1] [<<<Ne]".len());
    }

    #[test]
    fn indicator_search_is_ascii_case_insensitive() {
        let x = AnnotationExtractor::default();
        assert_eq!(x.find_indicator("héllo NEXT QUESTIONS: a"), Some(7));
        assert_eq!(x.find_indicator("Next Question"), None);
    }
}
