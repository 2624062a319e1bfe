//! Byte-level framing: UTF-8 decoding with carry bytes, line splitting, and
//! line classification.
pub mod classifier;
pub mod decoder;
pub mod framer;

pub use classifier::{Frame, classify};
pub use decoder::{Utf8Decoder, decode_chunk};
pub use framer::{LineFramer, Lines};
