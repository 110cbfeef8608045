//! CRC-32/MPEG-2 as used by PSI sections (ITU-T H.222.0 / ISO/IEC 13818-1).
//!
//! Polynomial 0x04C11DB7, initial value 0xFFFFFFFF, no reflection, no final
//! XOR. Running the CRC over a whole section including its trailing CRC_32
//! field yields zero.

const CRC32_MPEG2_POLY: u32 = 0x04C1_1DB7;

const CRC32_MPEG2_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_MPEG2_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// MPEG-2 CRC32 calculator for PSI table validation.
pub struct Crc32Mpeg2;

impl Crc32Mpeg2 {
    /// ```
    /// use hlsmux::utils::Crc32Mpeg2;
    ///
    /// assert_eq!(Crc32Mpeg2::calculate(&[0x01, 0x01]), 0xD66F_B816);
    /// ```
    pub fn calculate(data: &[u8]) -> u32 {
        data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
            let index = ((crc >> 24) ^ byte as u32) & 0xFF;
            (crc << 8) ^ CRC32_MPEG2_TABLE[index as usize]
        })
    }

    /// Checks a complete section whose last four bytes are its CRC_32.
    pub fn verify_section(section: &[u8]) -> bool {
        section.len() >= 4 && Self::calculate(section) == 0
    }
}
