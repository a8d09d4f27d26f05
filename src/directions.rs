//! Direction frame derivation.
//!
//! Projects the camera's back, left, and up axes onto the ground plane
//! to obtain the six cardinal directions all placement and relationship
//! logic works in. Pure geometry; computed once per scene.

use crate::error::SceneGenError;
use crate::renderer::CameraFrame;
use crate::types::{DirectionFrame, Vec3};

/// Derive the scene's direction frame from the renderer-reported camera
/// orientation and ground-plane normal.
///
/// `behind` and `left` are the camera back/left axes with their
/// plane-normal component removed; `above` is the camera up axis
/// projected onto the normal. Fails if any projection has near-zero
/// magnitude (camera looking straight along the normal) — that is a
/// configuration error, not something a restart fixes.
pub fn derive_frame(camera: &CameraFrame, plane_normal: Vec3) -> Result<DirectionFrame, SceneGenError> {
    let behind = camera
        .behind
        .reject_from(plane_normal)
        .normalized()
        .ok_or(SceneGenError::DegenerateFrame { axis: "behind" })?;
    let left = camera
        .left
        .reject_from(plane_normal)
        .normalized()
        .ok_or(SceneGenError::DegenerateFrame { axis: "left" })?;
    let above = camera
        .up
        .project_onto(plane_normal)
        .normalized()
        .ok_or(SceneGenError::DegenerateFrame { axis: "up" })?;

    Ok(DirectionFrame {
        behind,
        front: -behind,
        left,
        right: -left,
        above,
        below: -above,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(behind: Vec3, left: Vec3, up: Vec3) -> CameraFrame {
        CameraFrame {
            position: Vec3(0.0, -10.0, 5.0),
            behind,
            left,
            up,
        }
    }

    #[test]
    fn axis_aligned_camera() {
        let cam = camera(Vec3(0.0, 1.0, 0.0), Vec3(-1.0, 0.0, 0.0), Vec3(0.0, 0.0, 1.0));
        let frame = derive_frame(&cam, Vec3(0.0, 0.0, 1.0)).unwrap();
        assert_eq!(frame.behind, Vec3(0.0, 1.0, 0.0));
        assert_eq!(frame.front, Vec3(0.0, -1.0, 0.0));
        assert_eq!(frame.left, Vec3(-1.0, 0.0, 0.0));
        assert_eq!(frame.right, Vec3(1.0, 0.0, 0.0));
        assert_eq!(frame.above, Vec3(0.0, 0.0, 1.0));
        assert_eq!(frame.below, Vec3(0.0, 0.0, -1.0));
    }

    #[test]
    fn tilted_camera_axes_flatten_onto_plane() {
        // Camera pitched down: its back axis has a -z component that
        // must be projected out and the remainder renormalized.
        let cam = camera(
            Vec3(0.0, 0.8, -0.6),
            Vec3(-1.0, 0.0, 0.0),
            Vec3(0.0, 0.6, 0.8),
        );
        let frame = derive_frame(&cam, Vec3(0.0, 0.0, 1.0)).unwrap();
        assert!((frame.behind.length() - 1.0).abs() < 1e-12);
        assert_eq!(frame.behind, Vec3(0.0, 1.0, 0.0));
        assert!((frame.above.length() - 1.0).abs() < 1e-12);
        assert_eq!(frame.above, Vec3(0.0, 0.0, 1.0));
    }

    #[test]
    fn pairs_are_negations_and_orthogonal() {
        let cam = camera(
            Vec3(0.6, 0.64, -0.48),
            Vec3(-0.73, 0.68, 0.0),
            Vec3(0.2, 0.3, 0.93),
        );
        let n = Vec3(0.0, 0.0, 1.0);
        let frame = derive_frame(&cam, n).unwrap();
        assert_eq!(frame.front, -frame.behind);
        assert_eq!(frame.right, -frame.left);
        assert_eq!(frame.below, -frame.above);
        // Horizontal axes are in-plane, vertical along the normal.
        assert!(frame.behind.dot(n).abs() < 1e-12);
        assert!(frame.left.dot(n).abs() < 1e-12);
        assert!(frame.above.cross(n).length() < 1e-12);
    }

    #[test]
    fn straight_down_camera_is_degenerate() {
        let cam = camera(Vec3(0.0, 0.0, -1.0), Vec3(0.0, 0.0, -1.0), Vec3(1.0, 0.0, 0.0));
        let err = derive_frame(&cam, Vec3(0.0, 0.0, 1.0)).unwrap_err();
        assert!(matches!(err, SceneGenError::DegenerateFrame { axis: "behind" }));
    }
}
