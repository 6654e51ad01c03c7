//! Answer parsing for retrieval-augmented chat backends.
//!
//! - [`extractor`]: strips citation / follow-up markers out of answer text
//! - [`stream`]: reassembles streamed answers with the same grammar
//! - [`model`]: the thread entry handed to presentation layers
//! - [`wire`]: streamed unit framing

pub mod extractor;
pub mod model;
pub mod stream;
pub mod wire;

pub use extractor::{
    AnnotationExtractor, Annotations, DEFAULT_NEXT_QUESTION_INDICATOR, Extraction, MAX_MARKER_LEN,
};
pub use model::{AnswerContext, ChatThreadEntry, Citation, TextSegment};
pub use stream::{StreamOutcome, StreamReassembler};
pub use wire::StreamUnit;
