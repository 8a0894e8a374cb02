//! CPU compute device
//!
//! Device-style resources (`AtomicBuffer`, `Texture3D`) and a dispatcher that
//! runs kernels over invocation grids, directly or with group counts read
//! from a buffer (indirect dispatch).

pub mod buffer_data;
pub mod buffer_operations;
pub mod dispatch;

pub use buffer_data::{AtomicBuffer, Texture3D};
pub use dispatch::{linear_group_counts, ComputeDevice, DispatchStats, Invocation};
