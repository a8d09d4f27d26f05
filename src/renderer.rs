//! Renderer collaborator interface and a built-in software implementation.
//!
//! The composition engine never reasons about shading, cameras, or pixel
//! formats beyond counting distinct colors; everything visual happens
//! behind this trait. `SoftwareRenderer` is an analytic disc rasterizer
//! that makes the whole pipeline runnable and testable without an
//! external 3D engine.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::RenderError;
use crate::prng::Pcg32;
use crate::types::Vec3;

pub type ObjectHandle = usize;

/// World-space camera basis reported by the renderer: the viewing
/// direction (`behind`, pointing away from the camera into the scene),
/// the camera's left, and the camera's up.
#[derive(Debug, Clone, Copy)]
pub struct CameraFrame {
    pub position: Vec3,
    pub behind: Vec3,
    pub left: Vec3,
    pub up: Vec3,
}

pub trait Renderer {
    /// Reset session state for a fresh scene (clears placed objects,
    /// re-jitters the camera where applicable).
    fn begin_scene(&mut self);

    fn camera_frame(&self) -> CameraFrame;

    fn plane_normal(&self) -> Vec3;

    /// Place an object asset with the given footprint radius at a 2D
    /// position on the ground plane. Failure is fatal mid-scene.
    fn place_object(
        &mut self,
        shape_asset: &str,
        radius: f64,
        position: (f64, f64),
        rotation_deg: f64,
    ) -> Result<ObjectHandle, RenderError>;

    fn delete_object(&mut self, handle: ObjectHandle);

    /// Assign a material asset and base color to a placed object.
    fn set_appearance(
        &mut self,
        handle: ObjectHandle,
        material_asset: &str,
        rgb: [u8; 3],
    ) -> Result<(), RenderError>;

    /// Project a world-space point to (pixel x, pixel y, depth).
    fn project_to_image(&self, position: Vec3) -> (i32, i32, f64);

    /// Render the given objects flat-shaded (each a unique solid color,
    /// no lighting or antialiasing) and return the per-color pixel
    /// histogram of the output, background included.
    fn render_flat(
        &mut self,
        handles: &[ObjectHandle],
    ) -> Result<HashMap<(u8, u8, u8), u64>, RenderError>;

    /// Render the full scene to an image file at `path`.
    fn render_full(&mut self, path: &Path) -> Result<(), RenderError>;
}

// -- Software renderer ----------------------------------------------

const WORLD_UP: Vec3 = Vec3(0.0, 0.0, 1.0);
const FOV_DEG: f64 = 49.9;
const BACKGROUND_FLAT: (u8, u8, u8) = (255, 255, 255);
const BACKGROUND_FULL: (u8, u8, u8) = (180, 180, 180);

#[derive(Debug, Clone)]
struct RasterObject {
    radius: f64,
    x: f64,
    y: f64,
    rgb: [u8; 3],
}

/// Disc-footprint rasterizer with a fixed look-at camera above the
/// plane. Shape and material assets are accepted but not interpreted;
/// every object renders as the projected disc of its footprint, which
/// is all the visibility validator needs.
pub struct SoftwareRenderer {
    width: usize,
    height: usize,
    base_eye: Vec3,
    eye: Vec3,
    target: Vec3,
    camera_jitter: f64,
    jitter_rng: Pcg32,
    slots: Vec<Option<RasterObject>>,
}

impl SoftwareRenderer {
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        // Camera pose mirrors the usual elevated three-quarter view of
        // the ground plane.
        let base_eye = Vec3(7.48, -6.51, 5.34);
        SoftwareRenderer {
            width,
            height,
            base_eye,
            eye: base_eye,
            target: Vec3::ZERO,
            camera_jitter: 0.5,
            jitter_rng: Pcg32::new(seed, 1),
            slots: Vec::new(),
        }
    }

    pub fn with_camera_jitter(mut self, jitter: f64) -> Self {
        self.camera_jitter = jitter;
        self
    }

    fn focal_px(&self) -> f64 {
        (self.width as f64 / 2.0) / (FOV_DEG.to_radians() / 2.0).tan()
    }

    /// Orthonormal camera basis (right, up, forward). The base pose
    /// never looks along the world up axis, so normalization holds.
    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.target - self.eye)
            .normalized()
            .unwrap_or(Vec3(0.0, 1.0, 0.0));
        let right = forward
            .cross(WORLD_UP)
            .normalized()
            .unwrap_or(Vec3(1.0, 0.0, 0.0));
        let up = right.cross(forward);
        (right, up, forward)
    }

    fn live_handles(&self) -> Vec<ObjectHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect()
    }

    /// Painter's rasterization of the given objects as projected discs,
    /// nearest object winning each pixel. Color is chosen per object by
    /// the `color_of` callback.
    fn rasterize<F>(&self, handles: &[ObjectHandle], background: (u8, u8, u8), color_of: F) -> Vec<(u8, u8, u8)>
    where
        F: Fn(ObjectHandle, &RasterObject) -> (u8, u8, u8),
    {
        let mut colors = vec![background; self.width * self.height];
        let mut depths = vec![f64::INFINITY; self.width * self.height];
        let focal = self.focal_px();
        for &handle in handles {
            let Some(obj) = self.slots.get(handle).and_then(Option::as_ref) else {
                continue;
            };
            let center = Vec3(obj.x, obj.y, obj.radius);
            let (px, py, depth) = self.project_to_image(center);
            if depth <= 0.0 {
                continue;
            }
            let pixel_radius = focal * obj.radius / depth;
            let rgb = color_of(handle, obj);
            let r_ceil = pixel_radius.ceil() as i64;
            for dy in -r_ceil..=r_ceil {
                for dx in -r_ceil..=r_ceil {
                    if (dx * dx + dy * dy) as f64 > pixel_radius * pixel_radius {
                        continue;
                    }
                    let (ix, iy) = (px as i64 + dx, py as i64 + dy);
                    if ix < 0 || iy < 0 || ix >= self.width as i64 || iy >= self.height as i64 {
                        continue;
                    }
                    let idx = iy as usize * self.width + ix as usize;
                    if depth < depths[idx] {
                        depths[idx] = depth;
                        colors[idx] = rgb;
                    }
                }
            }
        }
        colors
    }
}

/// Distinct flat-shading color for the i-th object in a render pass.
/// Unique for any realistic object count and never the background.
fn flat_color(index: usize) -> (u8, u8, u8) {
    let v = index as u32 + 1;
    ((v & 0xff) as u8, ((v >> 8) & 0xff) as u8, ((v >> 16) & 0x7f) as u8)
}

impl Renderer for SoftwareRenderer {
    fn begin_scene(&mut self) {
        self.slots.clear();
        let jitter = |rng: &mut Pcg32, l: f64| 2.0 * l * (rng.next_float() - 0.5);
        self.eye = Vec3(
            self.base_eye.0 + jitter(&mut self.jitter_rng, self.camera_jitter),
            self.base_eye.1 + jitter(&mut self.jitter_rng, self.camera_jitter),
            self.base_eye.2 + jitter(&mut self.jitter_rng, self.camera_jitter),
        );
    }

    fn camera_frame(&self) -> CameraFrame {
        let (right, up, forward) = self.basis();
        CameraFrame {
            position: self.eye,
            behind: forward,
            left: -right,
            up,
        }
    }

    fn plane_normal(&self) -> Vec3 {
        WORLD_UP
    }

    fn place_object(
        &mut self,
        _shape_asset: &str,
        radius: f64,
        position: (f64, f64),
        _rotation_deg: f64,
    ) -> Result<ObjectHandle, RenderError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(RenderError::Fatal(format!(
                "cannot place object with radius {radius}"
            )));
        }
        self.slots.push(Some(RasterObject {
            radius,
            x: position.0,
            y: position.1,
            rgb: [128, 128, 128],
        }));
        Ok(self.slots.len() - 1)
    }

    fn delete_object(&mut self, handle: ObjectHandle) {
        if let Some(slot) = self.slots.get_mut(handle) {
            *slot = None;
        }
    }

    fn set_appearance(
        &mut self,
        handle: ObjectHandle,
        _material_asset: &str,
        rgb: [u8; 3],
    ) -> Result<(), RenderError> {
        match self.slots.get_mut(handle).and_then(Option::as_mut) {
            Some(obj) => {
                obj.rgb = rgb;
                Ok(())
            }
            None => Err(RenderError::Fatal(format!(
                "set_appearance on dead handle {handle}"
            ))),
        }
    }

    fn project_to_image(&self, position: Vec3) -> (i32, i32, f64) {
        let (right, up, forward) = self.basis();
        let v = position - self.eye;
        let depth = v.dot(forward);
        let safe_depth = depth.max(1e-6);
        let focal = self.focal_px();
        let px = self.width as f64 / 2.0 + focal * v.dot(right) / safe_depth;
        let py = self.height as f64 / 2.0 - focal * v.dot(up) / safe_depth;
        (px.round() as i32, py.round() as i32, depth)
    }

    fn render_flat(
        &mut self,
        handles: &[ObjectHandle],
    ) -> Result<HashMap<(u8, u8, u8), u64>, RenderError> {
        let palette: HashMap<ObjectHandle, (u8, u8, u8)> = handles
            .iter()
            .enumerate()
            .map(|(i, &h)| (h, flat_color(i)))
            .collect();
        let colors = self.rasterize(handles, BACKGROUND_FLAT, |h, _| palette[&h]);
        let mut histogram = HashMap::new();
        for c in colors {
            *histogram.entry(c).or_insert(0u64) += 1;
        }
        Ok(histogram)
    }

    fn render_full(&mut self, path: &Path) -> Result<(), RenderError> {
        let handles = self.live_handles();
        let colors = self.rasterize(&handles, BACKGROUND_FULL, |_, obj| {
            (obj.rgb[0], obj.rgb[1], obj.rgb[2])
        });
        write_ppm(path, self.width, self.height, &colors)
            .map_err(|e| RenderError::Fatal(format!("writing {}: {e}", path.display())))
    }
}

/// Binary PPM (P6) writer; dependency-free image output.
fn write_ppm(
    path: &Path,
    width: usize,
    height: usize,
    colors: &[(u8, u8, u8)],
) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    write!(file, "P6\n{width} {height}\n255\n")?;
    let mut bytes = Vec::with_capacity(colors.len() * 3);
    for &(r, g, b) in colors {
        bytes.extend_from_slice(&[r, g, b]);
    }
    file.write_all(&bytes)
}

// -- Test double -----------------------------------------------------
