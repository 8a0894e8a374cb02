//! Constants shared by every pass of the pipeline

/// Octree and grid sizing
pub mod core {
    /// Deepest octree supported; buffers are sized as `Σ 8^i` up to this level.
    pub const MAX_LEVEL: u32 = 10;

    /// Default grid resolution per axis
    pub const DEFAULT_GRID_RESOLUTION: u32 = 256;
    pub const MIN_GRID_RESOLUTION: u32 = 2;
    pub const MAX_GRID_RESOLUTION: u32 = 1 << MAX_LEVEL;

    /// Upper bound on the device memory one build may reserve
    pub const MAX_BUILD_MEMORY_BYTES: u64 = 8 * 1024 * 1024 * 1024;

    /// Fragment buffer capacity is this many entries per grid cell
    pub const FRAGMENT_CAPACITY_FACTOR: u64 = 3;

    /// Bits per axis in a packed grid position (`x | y << 10 | z << 20`)
    pub const POSITION_BITS: u32 = 10;
    pub const POSITION_MASK: u32 = (1 << POSITION_BITS) - 1;
}

/// Node buffer encoding
pub mod node {
    /// `next` entry: node contains at least one fragment
    pub const TAG_BIT: u32 = 1 << 31;
    /// `next` entry: first child address of the node's 8-child tile
    pub const CHILD_MASK: u32 = 0x3FFF_FFFF;
    /// `color` entry: a brick slot has been allocated
    pub const BRICK_BIT: u32 = 1 << 31;
    /// `color` entry: packed brick coordinate
    pub const BRICK_MASK: u32 = 0x3FFF_FFFF;
    /// `color` entry: an allocation for this node is in flight
    pub const BRICK_PENDING: u32 = 1 << 30;
    /// Children per subdivision
    pub const TILE_SIZE: u32 = 8;
    /// Unassigned level address / missing neighbour
    pub const NULL_ADDRESS: u32 = u32::MAX;
}

/// Brick pool layout
pub mod brick {
    /// Texels per brick edge
    pub const BRICK_SIZE: u32 = 3;
    /// Default pool edge in texels (70 bricks per axis)
    pub const DEFAULT_POOL_RESOLUTION: u32 = 70 * BRICK_SIZE;
    /// Brick coordinates are packed 10:10:10 into a color entry
    pub const COORD_BITS: u32 = 10;
    pub const COORD_MASK: u32 = (1 << COORD_BITS) - 1;
}

/// Compute dispatch limits
pub mod dispatch {
    /// Invocations per group for linear kernels
    pub const LINEAR_GROUP_SIZE: u32 = 64;
    /// Largest group count per dimension (matches D3D12/Vulkan minimums)
    pub const MAX_GROUPS_PER_DIMENSION: u32 = 65_535;
}

/// Light injection defaults
pub mod lighting {
    /// Sun direction (pointing from the light towards the scene)
    pub const DEFAULT_LIGHT_DIRECTION: [f32; 3] = [-0.3, -1.0, -0.2];
    pub const DEFAULT_LIGHT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
    pub const DEFAULT_LIGHT_INTENSITY: f32 = 1.0;
}
