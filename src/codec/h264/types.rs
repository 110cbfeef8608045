use std::fmt;

use bytes::Bytes;

use crate::av::Timestamp;

/// `nal_unit_type`, the low five bits of the NAL header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// 1: coded slice of a non-IDR picture
    Slice,
    /// 5: coded slice of an IDR picture
    SliceIdr,
    /// 6: supplemental enhancement information
    Sei,
    /// 7: sequence parameter set
    Sps,
    /// 8: picture parameter set
    Pps,
    /// 9: access unit delimiter
    AccessUnitDelimiter,
    Other(u8),
}

impl From<u8> for NalUnitType {
    fn from(header: u8) -> Self {
        match header & 0x1F {
            1 => NalUnitType::Slice,
            5 => NalUnitType::SliceIdr,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::AccessUnitDelimiter,
            other => NalUnitType::Other(other),
        }
    }
}

impl NalUnitType {
    pub fn as_u8(&self) -> u8 {
        match self {
            NalUnitType::Slice => 1,
            NalUnitType::SliceIdr => 5,
            NalUnitType::Sei => 6,
            NalUnitType::Sps => 7,
            NalUnitType::Pps => 8,
            NalUnitType::AccessUnitDelimiter => 9,
            NalUnitType::Other(value) => *value,
        }
    }

    /// RBSP syntax structure name, or `None` for unnamed types.
    pub fn rbsp_name(&self) -> Option<&'static str> {
        match self {
            NalUnitType::Slice => Some("slice_layer_without_partitioning_rbsp"),
            NalUnitType::SliceIdr => Some("slice_layer_without_partitioning_rbsp_idr"),
            NalUnitType::Sei => Some("sei_rbsp"),
            NalUnitType::Sps => Some("seq_parameter_set_rbsp"),
            NalUnitType::Pps => Some("pic_parameter_set_rbsp"),
            NalUnitType::AccessUnitDelimiter => Some("access_unit_delimiter_rbsp"),
            NalUnitType::Other(_) => None,
        }
    }
}

impl fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rbsp_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.as_u8()),
        }
    }
}

/// A NAL unit without its start code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    pub nal_unit_type: NalUnitType,
    /// Header byte followed by the payload, emulation prevention intact.
    pub data: Bytes,
    pub pts: Timestamp,
    pub dts: Timestamp,
}

impl NalUnit {
    pub fn is_keyframe(&self) -> bool {
        self.nal_unit_type == NalUnitType::SliceIdr
    }
}

/// Fields of a sequence parameter set needed for the sample description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpsInfo {
    pub profile_idc: u8,
    /// Constraint flags byte.
    pub profile_compatibility: u8,
    pub level_idc: u8,
    /// Cropped luma width.
    pub width: u32,
    /// Cropped luma height.
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nal_unit_type_names() {
        assert_eq!(
            NalUnitType::from(0x05).to_string(),
            "slice_layer_without_partitioning_rbsp_idr"
        );
        assert_eq!(NalUnitType::from(0x07).to_string(), "seq_parameter_set_rbsp");
        assert_eq!(NalUnitType::from(0x08).to_string(), "pic_parameter_set_rbsp");
        assert_eq!(NalUnitType::from(0x65).to_string(), "slice_layer_without_partitioning_rbsp_idr");
        assert_eq!(NalUnitType::from(0x0C), NalUnitType::Other(12));
        assert_eq!(NalUnitType::from(0x0C).to_string(), "12");
    }
}
