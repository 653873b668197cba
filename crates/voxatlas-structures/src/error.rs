// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/// Result type for structure operations
pub type StructureResult<T> = Result<T, StructureError>;

/// Common error type for voxatlas spatial data operations.
///
/// # Examples
/// ```
/// use voxatlas_structures::{BoundingBox, StructureError};
///
/// fn require_volume(bbox: &BoundingBox) -> Result<(), StructureError> {
///     if bbox.volume() <= 0.0 {
///         return Err(StructureError::BadParameters("empty bounding box".into()));
///     }
///     Ok(())
/// }
///
/// let flat = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 0.0], None);
/// assert!(require_volume(&flat).is_err());
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum StructureError {
    /// Invalid parameters provided to a function
    #[error("Bad Parameters: {0}")]
    BadParameters(String),

    /// An affine transform has no inverse
    #[error("Affine transform is singular and cannot be inverted: {0}")]
    SingularTransform(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Internal error indicating a bug (please report)
    #[error("Internal Error, please raise an issue on Github: {0}")]
    InternalError(String),
}
