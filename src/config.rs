//! Voxelization configuration
//!
//! Loaded from TOML or built in code. `check` reports structural problems as
//! `SvoError::InvalidConfig`; `validate` additionally estimates the memory a
//! build reserves and rejects configurations that exceed the budget.

use crate::constants::{brick, core, lighting};
use crate::error::{invalid_config, SvoResult};
use crate::voxelization::meta_operations::node_capacity;
use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the dense grid resolution is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSizing {
    /// Cells per axis; must be a power of two
    Resolution(u32),
    /// Requested world-space cell edge; cells per axis are rounded up to a
    /// power of two and the cell size re-derived to cover the scene
    CellSize(f32),
}

/// Directional light used for irradiance injection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    /// Direction the light travels
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::from_array(lighting::DEFAULT_LIGHT_DIRECTION),
            color: Vec3::from_array(lighting::DEFAULT_LIGHT_COLOR),
            intensity: lighting::DEFAULT_LIGHT_INTENSITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelizationConfig {
    /// Brick pool edge in texels
    pub brick_pool_resolution: u32,
    pub grid: GridSizing,
    pub light: DirectionalLight,
}

impl Default for VoxelizationConfig {
    fn default() -> Self {
        Self {
            grid: GridSizing::Resolution(core::DEFAULT_GRID_RESOLUTION),
            brick_pool_resolution: brick::DEFAULT_POOL_RESOLUTION,
            light: DirectionalLight::default(),
        }
    }
}

impl VoxelizationConfig {
    pub fn with_resolution(resolution: u32) -> Self {
        Self {
            grid: GridSizing::Resolution(resolution),
            ..Self::default()
        }
    }

    pub fn with_cell_size(cell_size: f32) -> Self {
        Self {
            grid: GridSizing::CellSize(cell_size),
            ..Self::default()
        }
    }

    /// Structural checks that do not depend on the scene
    pub fn check(&self) -> SvoResult<()> {
        match self.grid {
            GridSizing::Resolution(resolution) => check_resolution(resolution)?,
            GridSizing::CellSize(cell_size) => {
                if !cell_size.is_finite() || cell_size <= 0.0 {
                    return Err(invalid_config(
                        "grid.cell_size",
                        cell_size,
                        "must be finite and positive",
                    ));
                }
            }
        }

        let pool = self.brick_pool_resolution;
        if pool == 0 || pool % brick::BRICK_SIZE != 0 {
            return Err(invalid_config(
                "brick_pool_resolution",
                pool,
                "must be a non-zero multiple of 3",
            ));
        }
        if pool / brick::BRICK_SIZE > 1 << brick::COORD_BITS {
            return Err(invalid_config(
                "brick_pool_resolution",
                pool,
                "more than 1024 bricks per axis cannot be addressed",
            ));
        }

        let light = &self.light;
        if !light.direction.is_finite() || light.direction.length_squared() == 0.0 {
            return Err(invalid_config(
                "light.direction",
                format!("{:?}", light.direction),
                "must be finite and non-zero",
            ));
        }
        if !light.color.is_finite() || !light.intensity.is_finite() || light.intensity < 0.0 {
            return Err(invalid_config(
                "light.intensity",
                light.intensity,
                "light color and intensity must be finite and non-negative",
            ));
        }

        Ok(())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.check()?;

        match self.grid {
            GridSizing::Resolution(resolution) => {
                let bytes = estimate_build_memory(resolution, self.brick_pool_resolution);
                log::info!(
                    "[VoxelizationConfig] Validation: resolution={}, total_level={}, pool={}, estimated_memory={}MB",
                    resolution,
                    resolution.trailing_zeros(),
                    self.brick_pool_resolution,
                    bytes / 1024 / 1024
                );

                if bytes > core::MAX_BUILD_MEMORY_BYTES {
                    return Err(anyhow::anyhow!(
                        "VoxelizationConfig: resolution {} needs {}MB which exceeds the {}MB budget. {}",
                        resolution,
                        bytes / 1024 / 1024,
                        core::MAX_BUILD_MEMORY_BYTES / 1024 / 1024,
                        self.suggest_safe_config()
                    ));
                }
            }
            GridSizing::CellSize(cell_size) => {
                // Resolution comes from the scene; only the pool can be checked here
                let bytes = estimate_build_memory(core::MIN_GRID_RESOLUTION, self.brick_pool_resolution);
                log::info!(
                    "[VoxelizationConfig] Validation: cell_size={}, pool={}, minimum_memory={}MB",
                    cell_size,
                    self.brick_pool_resolution,
                    bytes / 1024 / 1024
                );

                if bytes > core::MAX_BUILD_MEMORY_BYTES {
                    return Err(anyhow::anyhow!(
                        "VoxelizationConfig: brick pool {} alone needs {}MB which exceeds the {}MB budget",
                        self.brick_pool_resolution,
                        bytes / 1024 / 1024,
                        core::MAX_BUILD_MEMORY_BYTES / 1024 / 1024
                    ));
                }
            }
        }

        log::info!("[VoxelizationConfig] Configuration validated successfully");
        Ok(())
    }

    /// Suggest safe configuration parameters
    pub fn suggest_safe_config(&self) -> String {
        let mut suggestions = vec!["Common safe configurations:".to_string()];
        for resolution in [64u32, 128, 256, 512] {
            suggestions.push(format!(
                "  - resolution={} (total_level={}, {}MB)",
                resolution,
                resolution.trailing_zeros(),
                estimate_build_memory(resolution, self.brick_pool_resolution) / 1024 / 1024
            ));
        }
        suggestions.join("\n")
    }
}

fn check_resolution(resolution: u32) -> SvoResult<()> {
    if resolution == 0 {
        return Err(invalid_config("grid.resolution", resolution, "cannot be 0"));
    }
    if !resolution.is_power_of_two() || resolution < core::MIN_GRID_RESOLUTION {
        return Err(invalid_config(
            "grid.resolution",
            resolution,
            "must be a power of two of at least 2",
        ));
    }
    if resolution > core::MAX_GRID_RESOLUTION {
        return Err(invalid_config(
            "grid.resolution",
            resolution,
            "total level would exceed the maximum of 10",
        ));
    }
    Ok(())
}

/// Bytes reserved by one build at `resolution`
pub fn estimate_build_memory(resolution: u32, brick_pool_resolution: u32) -> u64 {
    let cells = (resolution as u64).pow(3);
    let grid = 2 * cells * 4;
    let fragments = core::FRAGMENT_CAPACITY_FACTOR * cells * 4;
    // next, color, three neighbour links and the tagged queue
    let nodes = node_capacity(resolution.trailing_zeros()) * 4 * 6;
    let pool = 3 * (brick_pool_resolution as u64).pow(3) * 4;
    grid + fragments + nodes + pool
}

/// Read and validate a TOML config file
pub fn load_config(path: impl AsRef<Path>) -> Result<VoxelizationConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading voxelization config {}", path.display()))?;
    let config: VoxelizationConfig = toml::from_str(&text)
        .with_context(|| format!("parsing voxelization config {}", path.display()))?;
    config.validate()?;
    log::info!("[load_config] Loaded {:?} from {}", config.grid, path.display());
    Ok(config)
}

/// Write `config` as TOML
pub fn save_config(config: &VoxelizationConfig, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = toml::to_string_pretty(config).context("serializing voxelization config")?;
    std::fs::write(path, text)
        .with_context(|| format!("writing voxelization config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SvoError;

    #[test]
    fn test_default_config_is_valid() {
        let config = VoxelizationConfig::default();
        assert!(config.check().is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolution_checks() {
        for bad in [0u32, 1, 3, 100, 2048] {
            let config = VoxelizationConfig::with_resolution(bad);
            assert!(
                matches!(config.check(), Err(SvoError::InvalidConfig { .. })),
                "resolution {} should be rejected",
                bad
            );
        }
        assert!(VoxelizationConfig::with_resolution(1024).check().is_ok());
    }

    #[test]
    fn test_memory_budget_rejects_max_resolution() {
        let config = VoxelizationConfig::with_resolution(1024);
        let err = config.validate().expect_err("1024^3 exceeds the budget");
        assert!(err.to_string().contains("Common safe configurations"));
    }

    #[test]
    fn test_memory_budget_rejects_huge_pool_with_cell_size() {
        let mut config = VoxelizationConfig::with_cell_size(0.25);
        config.brick_pool_resolution = 3072;
        assert!(config.check().is_ok());
        let err = config.validate().expect_err("pool exceeds the budget");
        assert!(err.to_string().contains("brick pool 3072"));
    }

    #[test]
    fn test_pool_and_light_checks() {
        let mut config = VoxelizationConfig::default();
        config.brick_pool_resolution = 200;
        assert!(config.check().is_err());

        let mut config = VoxelizationConfig::default();
        config.light.direction = Vec3::ZERO;
        assert!(config.check().is_err());

        assert!(VoxelizationConfig::with_cell_size(0.0).check().is_err());
        assert!(VoxelizationConfig::with_cell_size(f32::NAN).check().is_err());
        assert!(VoxelizationConfig::with_cell_size(0.25).check().is_ok());
    }

    #[test]
    fn test_estimate_grows_with_resolution() {
        assert!(estimate_build_memory(128, 210) > estimate_build_memory(64, 210));
    }

    #[test]
    fn test_load_config_from_toml() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("voxelization.toml");
        std::fs::write(
            &path,
            r#"
brick_pool_resolution = 99

[grid]
resolution = 64

[light]
direction = [0.0, -1.0, 0.0]
intensity = 2.0
"#,
        )
        .expect("write config");

        let config = load_config(&path).expect("valid config");
        assert_eq!(config.grid, GridSizing::Resolution(64));
        assert_eq!(config.brick_pool_resolution, 99);
        assert_eq!(config.light.direction, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(config.light.color, Vec3::ONE);
        assert_eq!(config.light.intensity, 2.0);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("saved.toml");
        let config = VoxelizationConfig::with_cell_size(0.5);
        save_config(&config, &path).expect("save");
        assert_eq!(load_config(&path).expect("load"), config);
    }

    #[test]
    fn test_load_config_reports_bad_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(load_config(dir.path().join("missing.toml")).is_err());

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[grid]\nresolution = 7\n").expect("write config");
        assert!(load_config(&path).is_err());
    }
}
