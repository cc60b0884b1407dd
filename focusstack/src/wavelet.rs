//! Wavelet decomposition size requirements.
//!
//! The merge stage decomposes each image with a complex wavelet transform.
//! The transform halves the image once per decomposition level, so the
//! buffer dimensions must be divisible by `2^levels`. This module computes
//! how many levels an image of a given size gets and the padded size the
//! buffer must be expanded to. The transform itself lives outside this
//! crate; only its size contract is needed by the load stage.

/// Maximum number of decomposition levels.
pub const MAX_LEVELS: u32 = 6;

/// Minimum extent of the smaller dimension at the coarsest level.
///
/// Decomposition stops before the coarsest band would shrink below this.
pub const MIN_LEVEL_EXTENT: u32 = 128;

/// Returns the decomposition depth and padded size for an image.
///
/// The level count is the number of times the smaller dimension can be
/// halved while staying at or above [`MIN_LEVEL_EXTENT`], capped at
/// [`MAX_LEVELS`]. The padded size rounds each dimension up to the next
/// multiple of `2^levels`; a size that is already compatible comes back
/// unchanged.
///
/// # Examples
///
/// ```
/// use focusstack::wavelet::levels_for_size;
///
/// // Already divisible by 2^3, no padding needed.
/// assert_eq!(levels_for_size(1024, 768), (3, (1024, 768)));
///
/// // Height is not divisible by 8 and pads up to 704.
/// assert_eq!(levels_for_size(1000, 700), (3, (1000, 704)));
/// ```
pub fn levels_for_size(width: u32, height: u32) -> (u32, (u32, u32)) {
    let min_dim = width.min(height);

    let mut levels = 0;
    while levels < MAX_LEVELS && (min_dim >> levels) >= MIN_LEVEL_EXTENT {
        levels += 1;
    }

    let step = 1u32 << levels;
    let expanded = (round_up(width, step), round_up(height, step));
    (levels, expanded)
}

/// Rounds `value` up to the next multiple of `step`.
fn round_up(value: u32, step: u32) -> u32 {
    value.div_ceil(step) * step
}
