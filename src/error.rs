//! Error handling for the SVO builder
//!
//! Configuration problems are fatal at construction time. Capacity overflow is
//! detected after a build from the allocation counters, so kernels never write
//! past the end of a buffer.

use std::fmt;

/// Resource class whose preallocated capacity was exceeded during a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityResource {
    Fragments,
    Nodes,
    TaggedQueue,
    Bricks,
}

impl fmt::Display for CapacityResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapacityResource::Fragments => "fragment buffer",
            CapacityResource::Nodes => "svo node buffer",
            CapacityResource::TaggedQueue => "tagged node queue",
            CapacityResource::Bricks => "brick pool",
        };
        f.write_str(name)
    }
}

/// Main error type for the SVO builder
#[derive(Debug, thiserror::Error)]
pub enum SvoError {
    #[error("Invalid config: {field} = {value} ({reason})")]
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid scene: {reason}")]
    InvalidScene { reason: String },

    #[error("Capacity exceeded for {resource}: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        resource: CapacityResource,
        requested: u64,
        capacity: u64,
    },

    #[error("Buffer access out of bounds: index {index} >= size {size}")]
    BufferAccess { index: usize, size: usize },

    #[error("Indirect arguments in '{label}' at offset {offset} are out of range")]
    IndirectArgsOutOfRange { label: String, offset: usize },
}

/// Type alias for results in the SVO builder
pub type SvoResult<T> = Result<T, SvoError>;

/// Convert Option to Result with context
pub trait OptionExt<T> {
    fn ok_or_svo<F>(self, f: F) -> SvoResult<T>
    where
        F: FnOnce() -> SvoError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_svo<F>(self, f: F) -> SvoResult<T>
    where
        F: FnOnce() -> SvoError,
    {
        self.ok_or_else(f)
    }
}

/// Shorthand for an `InvalidConfig` error
pub fn invalid_config(field: &str, value: impl fmt::Display, reason: &str) -> SvoError {
    SvoError::InvalidConfig {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SvoError::BufferAccess { index: 10, size: 5 };
        assert_eq!(
            err.to_string(),
            "Buffer access out of bounds: index 10 >= size 5"
        );
    }

    #[test]
    fn test_capacity_display() {
        let err = SvoError::CapacityExceeded {
            resource: CapacityResource::Bricks,
            requested: 9,
            capacity: 8,
        };
        assert_eq!(
            err.to_string(),
            "Capacity exceeded for brick pool: requested 9, capacity 8"
        );
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_svo(|| SvoError::BufferAccess { index: 3, size: 3 });
        assert!(matches!(result, Err(SvoError::BufferAccess { index: 3, .. })));
    }
}
