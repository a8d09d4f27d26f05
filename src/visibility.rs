//! Flat-shaded visibility validation.
//!
//! Delegates to the renderer: each object is drawn as a unique solid
//! color with lighting and antialiasing disabled, and the per-color
//! pixel histogram of the result tells us how many pixels each object
//! actually contributes. A fully occluded object simply has no color in
//! the histogram.

use log::debug;

use crate::error::RenderError;
use crate::renderer::{ObjectHandle, Renderer};

/// True when every object is sufficiently visible: the histogram holds
/// exactly one distinct color per object plus one for the background,
/// and every observed color covers at least `min_pixels` pixels.
///
/// A false result means the scene must be recomposed from scratch — a
/// scene with an invisible object is entirely invalid.
pub fn check_visibility<R: Renderer + ?Sized>(
    renderer: &mut R,
    handles: &[ObjectHandle],
    min_pixels: u64,
) -> Result<bool, RenderError> {
    let histogram = renderer.render_flat(handles)?;
    if histogram.len() != handles.len() + 1 {
        debug!(
            "visibility: {} distinct colors for {} objects",
            histogram.len(),
            handles.len()
        );
        return Ok(false);
    }
    for (color, count) in &histogram {
        if *count < min_pixels {
            debug!("visibility: color {color:?} has only {count} pixels");
            return Ok(false);
        }
    }
    Ok(true)
}
