use bytes::{BufMut, BytesMut};

use super::types::SpsInfo;
use crate::error::{MuxError, Result};
use crate::utils::BitReader;

/// Strips `emulation_prevention_three_byte`s, turning a NAL payload into its
/// RBSP.
pub fn remove_emulation_prevention(data: &[u8]) -> BytesMut {
    let mut buffer = BytesMut::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03 {
            buffer.put_u8(0x00);
            buffer.put_u8(0x00);
            i += 3;
            continue;
        }
        buffer.put_u8(data[i]);
        i += 1;
    }

    buffer
}

/// Parses an SPS NAL unit (header byte included) for profile, level and the
/// cropped picture size.
pub fn parse_sps(nal: &[u8]) -> Result<SpsInfo> {
    if nal.len() < 4 {
        return Err(MuxError::Parser("SPS too short".into()));
    }
    let rbsp = remove_emulation_prevention(&nal[1..]);
    let mut reader = BitReader::new(&rbsp);

    let profile_idc = reader.read_bits(8)? as u8;
    let profile_compatibility = reader.read_bits(8)? as u8;
    let level_idc = reader.read_bits(8)? as u8;
    reader.skip_golomb()?; // seq_parameter_set_id

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;
    if matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    ) {
        chroma_format_idc = reader.read_golomb()?;
        if chroma_format_idc == 3 {
            separate_colour_plane = reader.read_flag()?;
        }
        reader.skip_golomb()?; // bit_depth_luma_minus8
        reader.skip_golomb()?; // bit_depth_chroma_minus8
        reader.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

        if reader.read_flag()? {
            // seq_scaling_matrix_present_flag
            let count = if chroma_format_idc != 3 { 8 } else { 12 };
            for i in 0..count {
                if reader.read_flag()? {
                    skip_scaling_list(&mut reader, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    reader.skip_golomb()?; // log2_max_frame_num_minus4
    let pic_order_cnt_type = reader.read_golomb()?;
    if pic_order_cnt_type == 0 {
        reader.skip_golomb()?; // log2_max_pic_order_cnt_lsb_minus4
    } else if pic_order_cnt_type == 1 {
        reader.skip_bits(1)?; // delta_pic_order_always_zero_flag
        reader.read_signed_golomb()?; // offset_for_non_ref_pic
        reader.read_signed_golomb()?; // offset_for_top_to_bottom_field
        let num_ref_frames_in_pic_order_cnt_cycle = reader.read_golomb()?;
        for _ in 0..num_ref_frames_in_pic_order_cnt_cycle {
            reader.read_signed_golomb()?;
        }
    }

    reader.skip_golomb()?; // max_num_ref_frames
    reader.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = reader.read_golomb()? + 1;
    let pic_height_in_map_units = reader.read_golomb()? + 1;
    let frame_mbs_only = reader.read_flag()?;
    if !frame_mbs_only {
        reader.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    reader.skip_bits(1)?; // direct_8x8_inference_flag

    let mut crop = [0u32; 4];
    if reader.read_flag()? {
        for offset in crop.iter_mut() {
            *offset = reader.read_golomb()?;
        }
    }
    let [crop_left, crop_right, crop_top, crop_bottom] = crop;

    let frame_height_factor = if frame_mbs_only { 1 } else { 2 };
    let (crop_unit_x, crop_unit_y) = if chroma_format_idc == 0 || separate_colour_plane {
        (1, frame_height_factor)
    } else {
        let sub_width_c = if chroma_format_idc == 3 { 1 } else { 2 };
        let sub_height_c = if chroma_format_idc == 1 { 2 } else { 1 };
        (sub_width_c, sub_height_c * frame_height_factor)
    };

    let width = (pic_width_in_mbs * 16)
        .checked_sub((crop_left + crop_right) * crop_unit_x)
        .ok_or_else(|| MuxError::Parser("SPS horizontal crop exceeds picture".into()))?;
    let height = (frame_height_factor * pic_height_in_map_units * 16)
        .checked_sub((crop_top + crop_bottom) * crop_unit_y)
        .ok_or_else(|| MuxError::Parser("SPS vertical crop exceeds picture".into()))?;

    Ok(SpsInfo {
        profile_idc,
        profile_compatibility,
        level_idc,
        width,
        height,
    })
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) -> Result<()> {
    let mut last_scale = 8;
    let mut next_scale = 8;

    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = reader.read_signed_golomb()?;
            next_scale = (last_scale + delta_scale + 256) % 256;
        }
        last_scale = if next_scale == 0 { last_scale } else { next_scale };
    }

    Ok(())
}
