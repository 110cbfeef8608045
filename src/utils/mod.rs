//! # Utility Functions and Types
//!
//! - [`BitReader`]: bit-level reads and exp-Golomb codes for ADTS headers
//!   and H.264 parameter sets
//! - [`Crc32Mpeg2`]: CRC-32/MPEG-2 for PSI section validation
//!
//! ```rust
//! use hlsmux::utils::BitReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0b10110011u8];
//! let mut reader = BitReader::new(&data);
//! assert_eq!(reader.read_bits(3)?, 0b101);
//! # Ok(())
//! # }
//! ```

/// Bitstream reading utilities
pub mod bits;

/// CRC calculation for PSI sections
pub mod crc;

pub use bits::BitReader;
pub use crc::Crc32Mpeg2;
