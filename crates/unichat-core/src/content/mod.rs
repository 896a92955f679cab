//! Message content normalization
//!
//! Converts caller-side conversation turns into backend-agnostic messages.
//! Blob and file lookups go through an injected `ContentResolver`.

mod mime;
mod normalizer;
mod resolver;

pub use mime::{is_text_file, sniff_image_mime};
pub use normalizer::{
    select_history, MediaPart, MessageNormalizer, NormalizedMessage, NormalizedTurn,
    NormalizerOptions, DEFAULT_LARGE_FILE_THRESHOLD,
};
pub use resolver::{
    ContentError, ContentResolver, ContentResult, DirContentResolver, MemoryContentResolver,
};
