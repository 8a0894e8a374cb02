//! Packed 32-bit encodings shared by the kernels
//!
//! RGBA8 texels (`r | g << 8 | b << 16 | a << 24`), grid positions
//! (`x | y << 10 | z << 20`) and brick coordinates (10:10:10).

use crate::constants::{brick, core};
use glam::{UVec3, Vec3, Vec4};
use std::sync::atomic::{AtomicU32, Ordering};

/// One RGBA8 texel
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedRgba8(pub u32);

impl PackedRgba8 {
    #[inline]
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(r as u32 | (g as u32) << 8 | (b as u32) << 16 | (a as u32) << 24)
    }

    #[inline]
    pub fn channels(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Channels scaled to [0, 1]
    pub fn to_vec4(&self) -> Vec4 {
        let [r, g, b, a] = self.channels();
        Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
    }

    /// Clamp to [0, 1] and quantize
    pub fn from_vec4(value: Vec4) -> Self {
        let q = (value.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
        Self::new(q.x as u8, q.y as u8, q.z as u8, q.w as u8)
    }
}

/// Map a unit normal into RGB byte range
#[inline]
pub fn encode_normal(normal: Vec3) -> [u8; 3] {
    let q = ((normal.clamp(Vec3::NEG_ONE, Vec3::ONE) * 0.5 + 0.5) * 255.0).round();
    [q.x as u8, q.y as u8, q.z as u8]
}

/// Inverse of `encode_normal`, not renormalised
#[inline]
pub fn decode_normal(texel: PackedRgba8) -> Vec3 {
    let [r, g, b, _] = texel.channels();
    Vec3::new(r as f32, g as f32, b as f32) / 255.0 * 2.0 - Vec3::ONE
}

/// Normal texel with full alpha
pub fn pack_normal(normal: Vec3) -> PackedRgba8 {
    let [r, g, b] = encode_normal(normal);
    PackedRgba8::new(r, g, b, 255)
}

#[inline]
pub fn pack_position(cell: UVec3) -> u32 {
    (cell.x & core::POSITION_MASK)
        | (cell.y & core::POSITION_MASK) << core::POSITION_BITS
        | (cell.z & core::POSITION_MASK) << (2 * core::POSITION_BITS)
}

#[inline]
pub fn unpack_position(packed: u32) -> UVec3 {
    UVec3::new(
        packed & core::POSITION_MASK,
        (packed >> core::POSITION_BITS) & core::POSITION_MASK,
        (packed >> (2 * core::POSITION_BITS)) & core::POSITION_MASK,
    )
}

#[inline]
pub fn pack_brick_coord(coord: UVec3) -> u32 {
    (coord.x & brick::COORD_MASK)
        | (coord.y & brick::COORD_MASK) << brick::COORD_BITS
        | (coord.z & brick::COORD_MASK) << (2 * brick::COORD_BITS)
}

#[inline]
pub fn unpack_brick_coord(packed: u32) -> UVec3 {
    UVec3::new(
        packed & brick::COORD_MASK,
        (packed >> brick::COORD_BITS) & brick::COORD_MASK,
        (packed >> (2 * brick::COORD_BITS)) & brick::COORD_MASK,
    )
}

/// Fold `rgb` into a running average stored in `texel`.
///
/// Alpha counts contributions (saturating at 255), so a written texel is
/// never zero. Returns the value the texel held before this update.
pub fn atomic_rgba8_avg(texel: &AtomicU32, rgb: [u8; 3]) -> u32 {
    let mut current = texel.load(Ordering::Acquire);
    loop {
        let [r, g, b, count] = PackedRgba8(current).channels();
        let n = count as u32;
        let blend = |old: u8, new: u8| ((old as u32 * n + new as u32 + (n + 1) / 2) / (n + 1)) as u8;
        let next = PackedRgba8::new(
            blend(r, rgb[0]),
            blend(g, rgb[1]),
            blend(b, rgb[2]),
            count.saturating_add(1),
        );

        match texel.compare_exchange_weak(current, next.0, Ordering::AcqRel, Ordering::Acquire) {
            Ok(previous) => return previous,
            Err(actual) => current = actual,
        }
    }
}
