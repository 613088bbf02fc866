//! Slice import and export.
//!
//! Host data arrives one z-slice at a time, either as packed
//! little-endian bytes, as samples of the buffer's own native type,
//! or as packed `0x00RRGGBB` pixels from which a single channel is
//! taken. All entry points write the `SizeX * SizeY` samples of one
//! plane in row-major (x fastest) order.

use std::io::{Cursor, Error as IOError, ErrorKind as IOErrorKind};

use binrw::io::{Read, Seek, SeekFrom};
use bytemuck::try_cast_slice;
use ndarray::prelude::*;

use crate::data::voxel::{DimensionsError, Sample};
use crate::VoxelViewError;

/// Where sample `i` of a slice sits in a packed byte stream: its
/// bytes are `offset + i * step + b` for `b in 0..bytes_per_sample`,
/// least significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceLayout {
    pub bytes_per_sample : usize,
    pub step : usize,
    pub offset : usize,
}

impl SliceLayout {
    /// Tightly packed samples starting at byte 0.
    pub fn packed(bytes_per_sample : usize) -> Self {
        SliceLayout { bytes_per_sample, step : bytes_per_sample, offset : 0 }
    }

    /// Bytes the stream must hold for `samples` samples.
    fn required_len(&self, samples : usize) -> usize {
        if samples == 0 { return 0; }
        self.offset + (samples - 1) * self.step + self.bytes_per_sample
    }
}

/// Reads one slice worth of little-endian unsigned samples of
/// `bytes_per_sample` bytes, each `step` bytes apart. Samples are
/// stored through `Sample::from_f64`, so narrow targets clamp.
#[binrw::parser(reader)]
fn load_packed_samples<T : Sample>(
    slice : &mut ArrayViewMut2<T>,
    bytes_per_sample : usize,
    step : usize,
) -> binrw::BinResult<()> {
    let mut word = [0u8; 8];
    let skip = step as i64 - bytes_per_sample as i64;
    let n_samples = slice.len();
    for (idx, px) in slice.iter_mut().enumerate() {
        word.fill(0);
        reader.read_exact(&mut word[..bytes_per_sample])?;
        *px = T::from_f64(u64::from_le_bytes(word) as f64);
        if skip != 0 && idx + 1 < n_samples {
            reader.seek(SeekFrom::Current(skip))?;
        }
    }
    Ok(())
}

pub (crate) fn load_slice_from_bytes<T : Sample>(
    slice : &mut ArrayViewMut2<T>,
    bytes : &[u8],
    layout : SliceLayout,
) -> Result<(), VoxelViewError> {
    if layout.bytes_per_sample == 0 || layout.bytes_per_sample > 8 || layout.step < layout.bytes_per_sample {
        return Err(VoxelViewError::Decode(binrw::Error::Io(IOError::new(
            IOErrorKind::InvalidInput,
            format!("Invalid slice layout {:?}", layout),
        ))));
    }
    let needed = layout.required_len(slice.len());
    if bytes.len() < needed {
        return Err(DimensionsError::ShortInput { needed, got : bytes.len() }.into());
    }
    let mut reader = Cursor::new(bytes);
    reader.seek(SeekFrom::Start(layout.offset as u64))?;
    load_packed_samples(
        &mut reader,
        binrw::Endian::Little,
        (slice, layout.bytes_per_sample, layout.step),
    )?;
    Ok(())
}

/// Native-type samples supplied as bytes. Sample `i` is sample
/// `i * step + offset` of the host array.
pub (crate) fn load_slice_from_similar<T : Sample>(
    slice : &mut ArrayViewMut2<T>,
    bytes : &[u8],
    step : usize,
    offset : usize,
) -> Result<(), VoxelViewError> {
    let step = step.max(1);
    let sample_bytes = std::mem::size_of::<T>();
    let needed = if slice.is_empty() { 0 } else { offset + (slice.len() - 1) * step + 1 };
    if bytes.len() < needed * sample_bytes {
        return Err(DimensionsError::ShortInput { needed : needed * sample_bytes, got : bytes.len() }.into());
    }
    let usable = &bytes[..needed * sample_bytes];

    // Host byte buffers are not always aligned for `T`
    let owned : Vec<T>;
    let samples : &[T] = match try_cast_slice::<u8, T>(usable) {
        Ok(samples) => samples,
        Err(_) => {
            owned = bytemuck::pod_collect_to_vec::<u8, T>(usable);
            &owned
        }
    };

    slice.iter_mut().enumerate().for_each(|(idx, px)| {
        *px = samples[idx * step + offset];
    });
    Ok(())
}

/// Channel 0, 1, 2 = red, green, blue.
pub (crate) fn load_slice_from_rgb<T : Sample>(
    slice : &mut ArrayViewMut2<T>,
    rgb : &[u32],
    step : usize,
    offset : usize,
    channel : usize,
) -> Result<(), VoxelViewError> {
    let shift = match channel {
        0 => 16,
        1 => 8,
        2 => 0,
        _ => return Err(VoxelViewError::Parse(format!("No RGB channel {}", channel))),
    };
    let step = step.max(1);
    let needed = if slice.is_empty() { 0 } else { offset + (slice.len() - 1) * step + 1 };
    if rgb.len() < needed {
        return Err(DimensionsError::ShortInput { needed, got : rgb.len() }.into());
    }
    for (idx, px) in slice.iter_mut().enumerate() {
        let value = ((rgb[idx * step + offset] >> shift) & 0xff) as u8;
        *px = T::from_channel(value).unwrap_or_default();
    }
    Ok(())
}

pub (crate) fn slice_to_bytes<T : Sample>(slice : &ArrayView2<T>) -> Vec<u8> {
    match slice.as_slice() {
        Some(contiguous) => bytemuck::cast_slice::<T, u8>(contiguous).to_vec(),
        None => slice.iter().flat_map(|px| bytemuck::bytes_of(px).to_vec()).collect(),
    }
}
