//! Direct light injection into leaf bricks

use crate::config::DirectionalLight;
use glam::{Vec3, Vec4};

/// Visibility of the light from a world position.
///
/// Shadow maps live outside this crate; a renderer plugs its lookup in here.
pub trait ShadowQuery: Send + Sync {
    /// 0 fully shadowed, 1 fully lit
    fn visibility(&self, world_position: Vec3, normal: Vec3) -> f32;
}

/// Everything is lit
#[derive(Debug, Default, Clone, Copy)]
pub struct Unshadowed;

impl ShadowQuery for Unshadowed {
    fn visibility(&self, _world_position: Vec3, _normal: Vec3) -> f32 {
        1.0
    }
}

/// Lambert response of `albedo` to `light`, scaled by `visibility`
pub fn inject_irradiance(albedo: Vec4, normal: Vec3, light: &DirectionalLight, visibility: f32) -> Vec4 {
    let to_light = -light.direction.normalize_or_zero();
    let n_dot_l = normal.normalize_or_zero().dot(to_light).max(0.0);
    let radiance = albedo.truncate() * light.color * light.intensity * n_dot_l * visibility.clamp(0.0, 1.0);
    radiance.extend(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overhead() -> DirectionalLight {
        DirectionalLight {
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }

    #[test]
    fn test_facing_surface_receives_albedo() {
        let irradiance = inject_irradiance(Vec4::new(0.5, 0.25, 1.0, 1.0), Vec3::Y, &overhead(), 1.0);
        assert!((irradiance - Vec4::new(0.5, 0.25, 1.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_back_facing_and_shadowed_are_black() {
        let back = inject_irradiance(Vec4::ONE, Vec3::NEG_Y, &overhead(), 1.0);
        assert_eq!(back.truncate(), Vec3::ZERO);
        let shadowed = inject_irradiance(Vec4::ONE, Vec3::Y, &overhead(), 0.0);
        assert_eq!(shadowed.truncate(), Vec3::ZERO);
        assert_eq!(shadowed.w, 1.0);
    }

    #[test]
    fn test_grazing_light_scales_with_cosine() {
        let normal = Vec3::new(1.0, 1.0, 0.0).normalize();
        let irradiance = inject_irradiance(Vec4::ONE, normal, &overhead(), 1.0);
        assert!((irradiance.x - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        assert_eq!(Unshadowed.visibility(Vec3::ZERO, Vec3::Y), 1.0);
    }
}
