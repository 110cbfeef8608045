//! AAC audio in ADTS framing.

pub mod parser;
mod stream;
mod types;

pub use parser::parse_adts_header;
pub use stream::AacStream;
pub use types::*;
