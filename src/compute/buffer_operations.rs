//! Compute Buffer Operations - Pure DOP Functions
//!
//! Creation, clears, and element access for `AtomicBuffer` and `Texture3D`.
//! Accessors never panic on an out-of-range index: loads return `None` and
//! stores report whether they landed.

use super::buffer_data::{AtomicBuffer, Texture3D};
use crate::error::{SvoError, SvoResult};
use glam::UVec3;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

fn zeroed_words(len: usize) -> Vec<AtomicU32> {
    (0..len).map(|_| AtomicU32::new(0)).collect()
}

/// Create a zero-filled buffer of `len` words
pub fn create_buffer(label: &str, len: usize) -> AtomicBuffer {
    log::debug!("[create_buffer] '{}' with {} words ({} KB)", label, len, len * 4 / 1024);
    AtomicBuffer {
        label: label.to_string(),
        words: zeroed_words(len),
    }
}

/// Create a buffer initialised from `initial`
pub fn create_buffer_init(label: &str, initial: &[u32]) -> AtomicBuffer {
    AtomicBuffer {
        label: label.to_string(),
        words: initial.iter().map(|&w| AtomicU32::new(w)).collect(),
    }
}

/// Fill every word with `value`
pub fn clear_buffer(buffer: &AtomicBuffer, value: u32) {
    buffer
        .words
        .par_iter()
        .for_each(|w| w.store(value, Ordering::Relaxed));
}

/// Overwrite `data.len()` words starting at `offset`
pub fn write_words(buffer: &AtomicBuffer, offset: usize, data: &[u32]) -> SvoResult<()> {
    let end = offset + data.len();
    if end > buffer.words.len() {
        return Err(SvoError::BufferAccess {
            index: end - 1,
            size: buffer.words.len(),
        });
    }

    for (word, &value) in buffer.words[offset..end].iter().zip(data) {
        word.store(value, Ordering::Release);
    }
    Ok(())
}

/// Copy out `len` words starting at `offset`
pub fn read_words(buffer: &AtomicBuffer, offset: usize, len: usize) -> SvoResult<Vec<u32>> {
    let end = offset + len;
    if end > buffer.words.len() {
        return Err(SvoError::BufferAccess {
            index: end.saturating_sub(1),
            size: buffer.words.len(),
        });
    }

    Ok(buffer.words[offset..end]
        .iter()
        .map(|w| w.load(Ordering::Acquire))
        .collect())
}

/// Snapshot of the whole buffer
pub fn read_all(buffer: &AtomicBuffer) -> Vec<u32> {
    buffer
        .words
        .iter()
        .map(|w| w.load(Ordering::Acquire))
        .collect()
}

#[inline]
pub fn load(buffer: &AtomicBuffer, index: usize) -> Option<u32> {
    buffer.words.get(index).map(|w| w.load(Ordering::Acquire))
}

#[inline]
pub fn store(buffer: &AtomicBuffer, index: usize, value: u32) -> bool {
    match buffer.words.get(index) {
        Some(w) => {
            w.store(value, Ordering::Release);
            true
        }
        None => false,
    }
}

/// Borrow one word for atomic read-modify-write
#[inline]
pub fn word(buffer: &AtomicBuffer, index: usize) -> Option<&AtomicU32> {
    buffer.words.get(index)
}

/// Atomically add to a counter word, returning the previous value
#[inline]
pub fn fetch_add(buffer: &AtomicBuffer, index: usize, value: u32) -> Option<u32> {
    buffer
        .words
        .get(index)
        .map(|w| w.fetch_add(value, Ordering::AcqRel))
}

/// Create a zeroed 3D texture
pub fn create_texture_3d(label: &str, dim: UVec3) -> Texture3D {
    let len = dim.x as usize * dim.y as usize * dim.z as usize;
    log::debug!(
        "[create_texture_3d] '{}' {}x{}x{} ({} KB)",
        label,
        dim.x,
        dim.y,
        dim.z,
        len * 4 / 1024
    );
    Texture3D {
        label: label.to_string(),
        dim,
        texels: zeroed_words(len),
    }
}

/// Zero every texel
pub fn clear_texture(texture: &Texture3D) {
    texture
        .texels
        .par_iter()
        .for_each(|t| t.store(0, Ordering::Relaxed));
}

/// Linear texel index, or `None` when `coord` is outside the texture
#[inline]
pub fn texel_index(texture: &Texture3D, coord: UVec3) -> Option<usize> {
    if coord.x >= texture.dim.x || coord.y >= texture.dim.y || coord.z >= texture.dim.z {
        return None;
    }
    Some(
        coord.x as usize
            + coord.y as usize * texture.dim.x as usize
            + coord.z as usize * texture.dim.x as usize * texture.dim.y as usize,
    )
}

#[inline]
pub fn texture_load(texture: &Texture3D, coord: UVec3) -> Option<u32> {
    texel_index(texture, coord).map(|i| texture.texels[i].load(Ordering::Acquire))
}

#[inline]
pub fn texture_store(texture: &Texture3D, coord: UVec3, value: u32) -> bool {
    match texel_index(texture, coord) {
        Some(i) => {
            texture.texels[i].store(value, Ordering::Release);
            true
        }
        None => false,
    }
}

/// Borrow one texel for atomic read-modify-write
#[inline]
pub fn texel(texture: &Texture3D, coord: UVec3) -> Option<&AtomicU32> {
    texel_index(texture, coord).map(|i| &texture.texels[i])
}

/// Count of non-zero texels
pub fn count_nonzero_texels(texture: &Texture3D) -> usize {
    texture
        .texels
        .par_iter()
        .filter(|t| t.load(Ordering::Relaxed) != 0)
        .count()
}
