//! Incremental reassembly of a streamed answer.
//!
//! The body arrives as newline-delimited JSON units (optionally SSE framed).
//! Content fragments are concatenated and run through the same marker grammar
//! as [`AnnotationExtractor::extract`]; text is only appended to the entry once
//! no later fragment can turn it into (part of) a marker. The final entry is
//! therefore the same no matter how the body was chunked.

use std::pin::pin;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::extractor::{AnnotationExtractor, Annotations, collect_steps, parse_followup_line};
use crate::model::ChatThreadEntry;
use crate::wire::StreamUnit;

/// How a streamed answer ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The body was read to the end.
    Completed(ChatThreadEntry),
    /// Cancellation was observed; holds the entry as far as it was built.
    Cancelled(ChatThreadEntry),
}

impl StreamOutcome {
    pub fn entry(&self) -> &ChatThreadEntry {
        match self {
            Self::Completed(entry) | Self::Cancelled(entry) => entry,
        }
    }

    pub fn into_entry(self) -> ChatThreadEntry {
        match self {
            Self::Completed(entry) | Self::Cancelled(entry) => entry,
        }
    }
}

/// Builds one bot entry out of a streamed body.
#[derive(Debug)]
pub struct StreamReassembler {
    extractor: AnnotationExtractor,
    entry: ChatThreadEntry,
    line_buf: Vec<u8>,
    pending: String,
    deferred_ws: String,
    in_followups: bool,
    annotations: Annotations,
}

impl StreamReassembler {
    pub fn new(entry: ChatThreadEntry, extractor: AnnotationExtractor) -> Self {
        Self {
            extractor,
            entry,
            line_buf: Vec::new(),
            pending: String::new(),
            deferred_ws: String::new(),
            in_followups: false,
            annotations: Annotations::default(),
        }
    }

    pub fn entry(&self) -> &ChatThreadEntry {
        &self.entry
    }

    /// Feeds raw body bytes. Returns `true` when the entry changed.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> bool {
        self.line_buf.extend_from_slice(bytes);
        let mut changed = false;
        while let Some(pos) = self.line_buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.line_buf.drain(..=pos).collect();
            changed |= self.apply_line(&line);
        }
        changed
    }

    /// Flushes the unterminated last line and everything still held back.
    pub fn finish(&mut self) -> bool {
        let mut changed = false;
        if !self.line_buf.is_empty() {
            let line = std::mem::take(&mut self.line_buf);
            changed |= self.apply_line(&line);
        }
        changed |= self.drain_pending(true);
        self.deferred_ws.clear();
        changed
    }

    /// Drives the reassembler over `stream` until it ends or `cancel` fires.
    ///
    /// `on_chunk_read` sees the entry after every read that changed it and
    /// once more after the end of the body. `on_cancel` runs once when
    /// cancellation is observed; nothing else runs afterwards.
    pub async fn run<S, B, E>(
        mut self,
        stream: S,
        cancel: &CancellationToken,
        mut on_chunk_read: impl FnMut(&ChatThreadEntry),
        on_cancel: impl FnOnce(),
    ) -> Result<StreamOutcome, E>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
    {
        let mut stream = pin!(stream);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = stream.next() => Some(next),
            };
            let Some(next) = next else {
                debug!(id = %self.entry.id, "stream cancelled");
                on_cancel();
                return Ok(StreamOutcome::Cancelled(self.entry));
            };
            match next {
                Some(Ok(chunk)) => {
                    if self.push_bytes(chunk.as_ref()) {
                        on_chunk_read(&self.entry);
                    }
                }
                Some(Err(err)) => return Err(err),
                None => break,
            }
        }

        self.finish();
        on_chunk_read(&self.entry);
        debug!(
            id = %self.entry.id,
            citations = self.entry.citations.len(),
            followups = self.entry.followup_questions.len(),
            "stream completed"
        );
        Ok(StreamOutcome::Completed(self.entry))
    }

    fn apply_line(&mut self, raw: &[u8]) -> bool {
        let line = String::from_utf8_lossy(raw);
        match StreamUnit::parse(&line) {
            None => false,
            Some(Err(err)) => {
                warn!(error = %err, "skipping undecodable stream unit");
                false
            }
            Some(Ok(unit)) => self.apply_unit(unit),
        }
    }

    fn apply_unit(&mut self, mut unit: StreamUnit) -> bool {
        let mut changed = false;
        if let Some(context) = unit.take_context() {
            self.entry.apply_context(context);
            changed = true;
        }
        if let Some(content) = unit.content().filter(|c| !c.is_empty()) {
            self.pending.push_str(content);
            changed |= self.drain_pending(false);
        }
        changed
    }

    fn drain_pending(&mut self, at_end: bool) -> bool {
        let mut changed = false;

        if !self.in_followups {
            if let Some(at) = self.extractor.find_indicator(&self.pending) {
                let rest = self.pending.split_off(at + self.extractor.indicator().len());
                let mut body = std::mem::replace(&mut self.pending, rest);
                body.truncate(at);
                self.emit_body(&body);
                self.deferred_ws.clear();

                let mut steps = Annotations::default();
                if let Some(segment) = self.entry.text.last() {
                    collect_steps(&segment.value, &mut steps);
                }
                self.annotations.following_steps = steps.following_steps;
                self.in_followups = true;
                changed = true;
            } else {
                let cut = if at_end {
                    self.pending.len()
                } else {
                    self.extractor.stable_prefix_len(&self.pending)
                };
                if cut > 0 {
                    let piece: String = self.pending.drain(..cut).collect();
                    changed |= self.emit_body(&piece);
                }
            }
        }

        if self.in_followups {
            let end = if at_end {
                self.pending.len()
            } else {
                self.pending.rfind('\n').map_or(0, |i| i + 1)
            };
            if end > 0 {
                let section: String = self.pending.drain(..end).collect();
                let before = self.annotations.followup_questions.len();
                for line in section.lines() {
                    parse_followup_line(line, &mut self.annotations);
                }
                changed |= self.annotations.followup_questions.len() != before;
            }
        }

        if changed {
            self.entry.apply_annotations(&self.annotations);
        }
        changed
    }

    fn emit_body(&mut self, piece: &str) -> bool {
        let (cleaned, fresh) = self.extractor.clean_inline(piece, Annotations::default());
        let mut changed = self.annotations.merge(fresh);

        let mut text = std::mem::take(&mut self.deferred_ws);
        text.push_str(&cleaned);

        if self.entry.text.is_empty() {
            self.entry.text.push(Default::default());
        }
        let Some(segment) = self.entry.text.last_mut() else {
            return changed;
        };
        let text = if segment.value.is_empty() {
            text.trim_start()
        } else {
            text.as_str()
        };
        let keep = text.trim_end().len();
        if keep > 0 {
            segment.value.push_str(&text[..keep]);
            changed = true;
        }
        self.deferred_ws = text[keep..].to_string();
        changed
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::convert::Infallible;

    use futures::stream;
    use serde_json::json;

    use super::*;

    fn ndjson(fragments: &[&str]) -> String {
        fragments
            .iter()
            .map(|f| format!("{}\n", json!({ "choices": [{ "delta": { "content": f } }] })))
            .collect()
    }

    fn chunks(body: &str, size: usize) -> Vec<Result<Vec<u8>, Infallible>> {
        body.as_bytes().chunks(size).map(|c| Ok(c.to_vec())).collect()
    }

    async fn reassemble(body: &str, size: usize) -> ChatThreadEntry {
        let reassembler =
            StreamReassembler::new(ChatThreadEntry::bot(""), AnnotationExtractor::default());
        let token = CancellationToken::new();
        reassembler
            .run(stream::iter(chunks(body, size)), &token, |_| {}, || {})
            .await
            .unwrap()
            .into_entry()
    }

    const FRAGMENTS: &[&str] = &[
        "Try ",
        "this [do",
        "c1]:\n1",
        ". Drink wat",
        "er [doc2]\n2) Sleep é",
        "arly <<Why",
        " sleep?>> ",
        "\nNext Ques",
        "tions: Is tea ok? 2. Is",
        " coffee ok?\n- More?",
    ];

    #[tokio::test]
    async fn chunking_does_not_change_the_result() {
        let full: String = FRAGMENTS.concat();
        let expected = AnnotationExtractor::default().extract(&full);
        let mut want = ChatThreadEntry::bot(expected.display.clone());
        want.apply_annotations(&expected.annotations);

        let per_char: Vec<String> = full.chars().map(String::from).collect();
        let per_char: Vec<&str> = per_char.iter().map(String::as_str).collect();

        for body in [ndjson(FRAGMENTS), ndjson(&per_char), ndjson(&[full.as_str()])] {
            for size in [1, 3, 7, 4096] {
                let got = reassemble(&body, size).await;
                assert_eq!(got.text, want.text, "chunk size {size}");
                assert_eq!(got.citations, want.citations);
                assert_eq!(got.followup_questions, want.followup_questions);
            }
        }

        assert_eq!(want.display_text(), "Try this:\n1. Drink water\n2) Sleep éarly");
        assert_eq!(want.text[0].following_steps, vec!["Drink water", "Sleep éarly"]);
        assert_eq!(
            want.followup_questions,
            vec!["Why sleep?", "Is tea ok?", "Is coffee ok?", "More?"]
        );
    }

    #[tokio::test]
    async fn sse_framing_and_noise_are_tolerated() {
        let body = concat!(
            ": keep-alive\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello [a.pdf]\"}}]}\r\n",
            "garbage line\n",
            "data: {\"choices\":[{\"delta\":{},\"context\":{\"thoughts\":\"t\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n",
            "data: [DONE]",
        );
        let entry = reassemble(body, 5).await;
        assert_eq!(entry.display_text(), "Hello world");
        assert_eq!(entry.citations[0].as_str(), "a.pdf");
        assert_eq!(entry.thoughts.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn display_only_grows() {
        let body = ndjson(FRAGMENTS);
        let reassembler =
            StreamReassembler::new(ChatThreadEntry::bot(""), AnnotationExtractor::default());
        let token = CancellationToken::new();
        let mut seen: Vec<String> = Vec::new();
        reassembler
            .run(
                stream::iter(chunks(&body, 2)),
                &token,
                |entry| seen.push(entry.display_text()),
                || {},
            )
            .await
            .unwrap();

        assert!(seen.len() > 1);
        for pair in seen.windows(2) {
            assert!(pair[1].starts_with(&pair[0]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(seen.iter().all(|s| !s.contains('[') && !s.contains("<<")));
    }

    #[tokio::test]
    async fn cancellation_stops_reading() {
        let body = ndjson(&["partial answer", " never seen"]);
        let lines: Vec<Result<Vec<u8>, Infallible>> =
            body.lines().map(|l| Ok(format!("{l}\n").into_bytes())).collect();
        let token = CancellationToken::new();
        let reassembler =
            StreamReassembler::new(ChatThreadEntry::bot(""), AnnotationExtractor::default());

        let reads_after_cancel = Cell::new(0);
        let mut cancelled = 0;
        let outcome = reassembler
            .run(
                stream::iter(lines).chain(stream::pending()),
                &token,
                |_| {
                    if token.is_cancelled() {
                        reads_after_cancel.set(reads_after_cancel.get() + 1);
                    }
                    token.cancel();
                },
                || cancelled += 1,
            )
            .await
            .unwrap();

        assert_eq!(cancelled, 1);
        assert_eq!(reads_after_cancel.get(), 0);
        match outcome {
            StreamOutcome::Cancelled(entry) => assert_eq!(entry.display_text(), "partial answer"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    /// Splits `text` at pseudo-random char boundaries.
    fn fragment(text: &str, seed: u64) -> Vec<String> {
        let mut state = seed;
        let mut out = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            current.push(ch);
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            if (state >> 33) % 3 == 0 {
                out.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }

    #[tokio::test]
    async fn random_fragmentation_matches_one_shot_extraction() {
        let texts = [
            "a<<a[>><?<<q?>>\t",
            "?[d1][<<<Ne]>> tail Next Questions: a? <<b?>>",
            "x [a <<q>> b] y <<c [d>> [e]",
            "Tips [a.pdf] [b <<c>>] <<why?>>\n1. one [x]\n2) two\nnext questions: 1. more? 2. less?",
            "<< [ < [[a]] <<<b>>> [c\nd] >> [ ]  [f]",
            "Next Question [x]Next Questions:<<q?>> [y]",
        ];
        let extractor = AnnotationExtractor::default();

        for text in texts {
            let expected = extractor.extract(text);
            let mut want = ChatThreadEntry::bot(expected.display.clone());
            want.apply_annotations(&expected.annotations);

            for seed in 0..200u64 {
                let pieces = fragment(text, seed);
                let pieces: Vec<&str> = pieces.iter().map(String::as_str).collect();
                let size = 1 + (seed % 9) as usize;
                let got = reassemble(&ndjson(&pieces), size).await;
                assert_eq!(got.text, want.text, "{text:?} split as {pieces:?}");
                assert_eq!(got.citations, want.citations, "{text:?} split as {pieces:?}");
                assert_eq!(
                    got.followup_questions, want.followup_questions,
                    "{text:?} split as {pieces:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let items: Vec<Result<Vec<u8>, &str>> = vec![Ok(b"{}\n".to_vec()), Err("reset")];
        let reassembler =
            StreamReassembler::new(ChatThreadEntry::bot(""), AnnotationExtractor::default());
        let err = reassembler
            .run(stream::iter(items), &CancellationToken::new(), |_| {}, || {})
            .await
            .unwrap_err();
        assert_eq!(err, "reset");
    }
}
