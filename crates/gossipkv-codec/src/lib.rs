//! # gossipkv-codec
//!
//! The textual positional brace/semicolon wire codec: [`encode`]
//! renders a database clock plus per-table rows into the wire grammar,
//! and [`decode`] parses it back.
//!
//! [`tokenizer`] does the structural brace/semicolon parsing with no
//! knowledge of the database grammar; both `encode` and `decode` sit on
//! top of it (encode by construction, decode by walking the resulting
//! [`tokenizer::Node`] tree). [`hex`] handles the codec's hex-encoded
//! numeric atoms.

pub mod decode;
pub mod encode;
pub mod error;
pub mod hex;
pub mod tokenizer;

pub use decode::{deserialize, DecodeOutcome, DecodeTable, DecodedRow, RowWarning};
pub use encode::{serialize, serialize_into, EncodeTable};
pub use error::{CodecError, Result};
pub use tokenizer::Node;
