use crate::error::{MuxError, Result};

/// A big-endian bit reader over a byte slice.
///
/// Used for the bit-packed syntax in ADTS headers and H.264 parameter
/// sets, including exponential Golomb codes (`ue(v)` / `se(v)`).
///
/// ```
/// use hlsmux::utils::BitReader;
///
/// let data = [0b1011_0011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        let byte = *self
            .data
            .get(self.byte_offset)
            .ok_or_else(|| MuxError::Parser("bit reader exhausted".into()))?;

        let bit = (byte >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;
        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads `n` (at most 32) bits as a big-endian number.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(MuxError::Parser(format!("cannot read {} bits at once", n)));
        }
        if n as usize > self.available_bits() {
            return Err(MuxError::Parser("bit reader exhausted".into()));
        }

        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Ok(value as u32)
    }

    pub fn read_flag(&mut self) -> Result<bool> {
        self.read_bit()
    }

    /// Unsigned exponential Golomb code: `2^M + INFO - 1` where M is the
    /// number of leading zero bits.
    pub fn read_golomb(&mut self) -> Result<u32> {
        let mut leading_zeros = 0u32;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(MuxError::Parser("invalid exp-Golomb code".into()));
            }
        }

        if leading_zeros == 0 {
            return Ok(0);
        }

        let info = self.read_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) + info as u64 - 1) as u32)
    }

    /// Signed exponential Golomb code; odd codes map to positive values.
    pub fn read_signed_golomb(&mut self) -> Result<i32> {
        let k = self.read_golomb()?;
        let magnitude = ((k as u64 + 1) >> 1) as i32;
        Ok(if k & 1 == 1 { magnitude } else { -magnitude })
    }

    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        if n as usize > self.available_bits() {
            return Err(MuxError::Parser("bit reader exhausted".into()));
        }
        let bits = self.bit_offset as usize + n as usize;
        self.byte_offset += bits / 8;
        self.bit_offset = (bits % 8) as u8;
        Ok(())
    }

    pub fn skip_golomb(&mut self) -> Result<()> {
        self.read_golomb().map(|_| ())
    }

    pub fn align_byte(&mut self) {
        if self.bit_offset != 0 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }
    }

    pub fn available_bits(&self) -> usize {
        (self.data.len().saturating_sub(self.byte_offset)) * 8 - self.bit_offset as usize
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::BitWriter;
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_read_bits() {
        let data = [0b1011_0011, 0b1100_1100, 0b1010_1010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(0).unwrap(), 0);
        assert_eq!(reader.read_bits(17).unwrap(), 0b10011_1100_1100_1010);
        assert_eq!(reader.available_bits(), 4);
        assert!(reader.read_bits(5).is_err());
        assert!(reader.read_bits(33).is_err());
    }

    #[test]
    fn test_read_golomb() {
        let cases: [(u8, u32); 9] = [
            (0b1000_0000, 0),
            (0b0100_0000, 1),
            (0b0110_0000, 2),
            (0b0010_0000, 3),
            (0b0010_1000, 4),
            (0b0011_0000, 5),
            (0b0011_1000, 6),
            (0b0001_0000, 7),
            (0b0001_0010, 8),
        ];

        for (byte, expected) in cases {
            let data = [byte];
            let mut reader = BitReader::new(&data);
            assert_eq!(reader.read_golomb().unwrap(), expected, "pattern {:08b}", byte);
        }

        let data = [0u8; 5];
        assert!(BitReader::new(&data).read_golomb().is_err());
    }

    #[test]
    fn test_signed_golomb() {
        let mut writer = BitWriter::new();
        for v in [0, 1, -1, 2, -2, 7, -8] {
            writer.write_signed_golomb(v);
        }
        let data = writer.finish();
        let mut reader = BitReader::new(&data);
        for v in [0, 1, -1, 2, -2, 7, -8] {
            assert_eq!(reader.read_signed_golomb().unwrap(), v);
        }
    }

    #[test]
    fn test_skip_and_align() {
        let data = [0xFF, 0x0F, 0x80];
        let mut reader = BitReader::new(&data);
        reader.skip_bits(3).unwrap();
        reader.align_byte();
        assert_eq!(reader.read_bits(8).unwrap(), 0x0F);
        reader.skip_bits(1).unwrap();
        assert_eq!(reader.available_bits(), 7);
        assert!(reader.skip_bits(8).is_err());
    }

    #[quickcheck]
    fn prop_golomb_round_trip(values: Vec<u16>) -> bool {
        let mut writer = BitWriter::new();
        for &v in &values {
            writer.write_golomb(v as u32);
        }
        let data = writer.finish();
        let mut reader = BitReader::new(&data);
        values
            .iter()
            .all(|&v| reader.read_golomb().ok() == Some(v as u32))
    }

    #[quickcheck]
    fn prop_read_bits_matches_manual(data: Vec<u8>, n: u8) -> bool {
        let n = (n % 33) as u32;
        let mut reader = BitReader::new(&data);
        match reader.read_bits(n) {
            Ok(value) => {
                let mut expected = 0u64;
                for i in 0..n as usize {
                    let bit = (data[i / 8] >> (7 - (i % 8))) & 1;
                    expected = (expected << 1) | bit as u64;
                }
                value as u64 == expected
            }
            Err(_) => (n as usize) > data.len() * 8,
        }
    }
}
