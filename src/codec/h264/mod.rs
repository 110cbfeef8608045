//! # H.264/AVC
//!
//! - [`H264Stream`]: splits Annex-B byte streams into NAL units
//! - [`parse_sps`]: profile, level and cropped picture size from an SPS
//!
//! ```rust
//! use hlsmux::codec::h264::NalUnitType;
//!
//! assert_eq!(NalUnitType::from(0x67), NalUnitType::Sps);
//! assert_eq!(NalUnitType::Sps.to_string(), "seq_parameter_set_rbsp");
//! ```

/// SPS parsing and emulation prevention removal
pub mod parser;
mod stream;
mod types;

#[doc(inline)]
pub use parser::{parse_sps, remove_emulation_prevention};
pub use stream::H264Stream;
pub use types::*;
