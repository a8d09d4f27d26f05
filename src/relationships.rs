//! Pairwise directional relationship inference.
//!
//! For every ordered pair of objects and every horizontal direction,
//! membership is decided by an independent dot-product threshold. Near
//! the perpendicular bisector of a pair this creates a dead zone where
//! an object may belong to neither (or, just past a tie, both) of two
//! opposing relations. That asymmetry is intentional: it is exactly the
//! threshold the downstream consumers were built against, so it must
//! not be "corrected" into strict antisymmetry.

use crate::types::{Direction, DirectionFrame, RelationshipGraph, SceneObject};

/// Dot-product threshold, in scene length units, above which object `j`
/// counts as lying in a direction from object `i`.
pub const RELATIONSHIP_EPS: f64 = 0.2;

/// Compute the full directed relationship graph: `get(d)[i]` holds the
/// sorted indices `j` with `dot(pos(j) - pos(i), d) > eps`. Self-pairs
/// are excluded. O(n² · 4); no caching needed at dataset scales.
pub fn compute_relationships(
    objects: &[SceneObject],
    frame: &DirectionFrame,
) -> RelationshipGraph {
    let mut graph = RelationshipGraph::default();
    for direction in Direction::HORIZONTAL {
        let vec = frame.horizontal(direction);
        let rows = graph.get_mut(direction);
        for (i, obj1) in objects.iter().enumerate() {
            let mut related: Vec<usize> = Vec::new();
            for (j, obj2) in objects.iter().enumerate() {
                if i == j {
                    continue;
                }
                let diff = obj2.coords_3d - obj1.coords_3d;
                if diff.dot(vec) > RELATIONSHIP_EPS {
                    related.push(j);
                }
            }
            related.sort_unstable();
            rows.push(related);
        }
    }
    graph
}

/// Relationship graph over the union of a scene's pre- and post-mutation
/// object sets: originals keep their indices, mutated objects follow at
/// `original.len() + i`. Lets the diff read off how an object's
/// after-state relates to its before-state (and to everything else).
pub fn compute_cross_scene(
    original: &[SceneObject],
    mutated: &[SceneObject],
    frame: &DirectionFrame,
) -> RelationshipGraph {
    let mut union = Vec::with_capacity(original.len() + mutated.len());
    union.extend_from_slice(original);
    union.extend_from_slice(mutated);
    compute_relationships(&union, frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directions::derive_frame;
    use crate::renderer::testing::StubRenderer;
    use crate::renderer::Renderer;
    use crate::types::Vec3;

    fn axis_frame() -> DirectionFrame {
        let stub = StubRenderer::new();
        derive_frame(&stub.camera_frame(), stub.plane_normal()).unwrap()
    }

    fn object_at(x: f64, y: f64) -> SceneObject {
        SceneObject {
            shape: "sphere".into(),
            size: "small".into(),
            material: "rubber".into(),
            coords_3d: Vec3(x, y, 0.35),
            rotation: 0.0,
            pixel_coords: (0, 0, 0.0),
            color: "red".into(),
        }
    }

    #[test]
    fn hand_checked_membership() {
        // right = (1, 0, 0): the object at x=1 is right of the origin
        // object, and the origin object is left of it.
        let frame = axis_frame();
        let objects = [object_at(0.0, 0.0), object_at(1.0, 0.0)];
        let graph = compute_relationships(&objects, &frame);
        assert_eq!(graph.right, vec![vec![1], vec![]]);
        assert_eq!(graph.left, vec![vec![], vec![0]]);
        assert_eq!(graph.front, vec![Vec::<usize>::new(), vec![]]);
        assert_eq!(graph.behind, vec![Vec::<usize>::new(), vec![]]);
    }

    #[test]
    fn dead_zone_excludes_both_directions() {
        // Offset 0.1 along x is under eps = 0.2: the pair is a member
        // of neither left nor right — intentional dead-zone behavior.
        let frame = axis_frame();
        let objects = [object_at(0.0, 0.0), object_at(0.1, 0.0)];
        let graph = compute_relationships(&objects, &frame);
        assert_eq!(graph.right, vec![Vec::<usize>::new(), vec![]]);
        assert_eq!(graph.left, vec![Vec::<usize>::new(), vec![]]);
    }

    #[test]
    fn threshold_is_strict() {
        let frame = axis_frame();
        let objects = [object_at(0.0, 0.0), object_at(RELATIONSHIP_EPS, 0.0)];
        let graph = compute_relationships(&objects, &frame);
        assert_eq!(graph.right, vec![Vec::<usize>::new(), vec![]]);

        let objects = [object_at(0.0, 0.0), object_at(RELATIONSHIP_EPS + 1e-9, 0.0)];
        let graph = compute_relationships(&objects, &frame);
        assert_eq!(graph.right, vec![vec![1], vec![]]);
    }

    #[test]
    fn behind_uses_the_frame_not_world_axes() {
        // behind = (0, 1, 0): larger y is deeper into the scene.
        let frame = axis_frame();
        let objects = [object_at(0.0, 0.0), object_at(0.0, 2.0)];
        let graph = compute_relationships(&objects, &frame);
        assert_eq!(graph.behind, vec![vec![1], vec![]]);
        assert_eq!(graph.front, vec![vec![], vec![0]]);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let frame = axis_frame();
        let objects = [
            object_at(-1.5, 0.3),
            object_at(0.7, -2.0),
            object_at(2.4, 1.9),
        ];
        let g1 = compute_relationships(&objects, &frame);
        let g2 = compute_relationships(&objects, &frame);
        assert_eq!(g1, g2);
    }

    #[test]
    fn cross_scene_indexing() {
        let frame = axis_frame();
        let original = [object_at(0.0, 0.0), object_at(2.0, 0.0)];
        let mut mutated = original.to_vec();
        mutated[0].coords_3d = Vec3(-2.0, 0.0, 0.35);
        let graph = compute_cross_scene(&original, &mutated, &frame);
        // Four rows: two originals then the two mutated copies.
        assert_eq!(graph.left.len(), 4);
        // The moved copy (index 2) sits left of its before-state (index 0).
        assert!(graph.left[0].contains(&2));
        assert!(graph.right[2].contains(&0));
        // The untouched object's copy (index 3) is in the dead zone of
        // its own before-state (index 1) — identical position.
        assert!(!graph.left[1].contains(&3));
        assert!(!graph.right[1].contains(&3));
    }
}
