//! Scene mutation and change-diff construction.
//!
//! In action mode a composed scene gets exactly one property of one
//! object mutated (position, material, or color), producing a sibling
//! scene plus a machine-readable record of what changed. Same-value
//! draws and failed relocations are recorded as `*_unchanged` — those
//! no-change scenes are deliberate negative examples for the downstream
//! task, not failures.

use log::debug;

use crate::error::SceneGenError;
use crate::placement::{self, Footprint};
use crate::prng::Pcg32;
use crate::renderer::Renderer;
use crate::types::{
    ChangeCounts, ChangeKind, Changes, Direction, DirectionFrame, GenerationParams,
    ObjectSnapshot, PlacedObject, PropertyCatalog, RelationshipGraph, SceneChangeCounts,
    SceneObject,
};
use crate::visibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutableProperty {
    Position,
    Material,
    Color,
}

pub const PROPERTY_POOL: [MutableProperty; 3] = [
    MutableProperty::Position,
    MutableProperty::Material,
    MutableProperty::Color,
];

/// Mutate up to `params.max_changes` (target, property) pairs, both
/// drawn uniformly with replacement. Outcomes are tallied per target in
/// the returned record and folded into the run-wide accumulator.
pub fn mutate_scene<R: Renderer + ?Sized>(
    rng: &mut Pcg32,
    placed: &mut [PlacedObject],
    catalog: &PropertyCatalog,
    frame: &DirectionFrame,
    params: &GenerationParams,
    renderer: &mut R,
    tally: &mut ChangeCounts,
) -> Result<SceneChangeCounts, SceneGenError> {
    if placed.is_empty() {
        return Err(SceneGenError::Configuration(
            "cannot mutate an empty scene".into(),
        ));
    }
    let targets: Vec<usize> = (0..params.max_changes)
        .map(|_| rng.next_int(0, placed.len() as u32 - 1) as usize)
        .collect();
    let properties: Vec<MutableProperty> = (0..params.max_changes)
        .map(|_| PROPERTY_POOL[rng.next_int(0, PROPERTY_POOL.len() as u32 - 1) as usize])
        .collect();

    let mut record = SceneChangeCounts::default();
    for &index in &targets {
        let mut counts = ChangeCounts::default();
        for &property in &properties {
            let kind = match property {
                MutableProperty::Color => apply_color_change(rng, placed, index, catalog, renderer)?,
                MutableProperty::Material => {
                    apply_material_change(rng, placed, index, catalog, renderer)?
                }
                MutableProperty::Position => {
                    apply_position_change(rng, placed, index, catalog, frame, params, renderer)?
                }
            };
            counts.bump(kind);
        }
        tally.merge(&counts);
        record.obj_id.push(index);
        record.counts.push(counts);
    }
    Ok(record)
}

/// Draw a replacement color uniformly from the object's allowed
/// palette. A same-value draw is a valid `unchanged` outcome; there is
/// no retry.
pub(crate) fn apply_color_change<R: Renderer + ?Sized>(
    rng: &mut Pcg32,
    placed: &mut [PlacedObject],
    index: usize,
    catalog: &PropertyCatalog,
    renderer: &mut R,
) -> Result<ChangeKind, SceneGenError> {
    let palette = catalog.allowed_colors(&placed[index].record.shape);
    let drawn = rng
        .choose(&palette)
        .ok_or_else(|| SceneGenError::Configuration("empty color palette".into()))?
        .to_string();
    if drawn == placed[index].record.color {
        return Ok(ChangeKind::ColorUnchanged);
    }
    let rgb = catalog.color_rgb(&drawn)?;
    let material = catalog.material_asset(&placed[index].record.material)?.to_string();
    renderer.set_appearance(placed[index].handle, &material, rgb)?;
    placed[index].record.color = drawn;
    Ok(ChangeKind::ColorChanged)
}

/// Draw a replacement material uniformly; same-draw semantics as color.
pub(crate) fn apply_material_change<R: Renderer + ?Sized>(
    rng: &mut Pcg32,
    placed: &mut [PlacedObject],
    index: usize,
    catalog: &PropertyCatalog,
    renderer: &mut R,
) -> Result<ChangeKind, SceneGenError> {
    let names: Vec<&str> = catalog.materials.keys().map(String::as_str).collect();
    let drawn = rng
        .choose(&names)
        .ok_or_else(|| SceneGenError::Configuration("empty material palette".into()))?
        .to_string();
    if drawn == placed[index].record.material {
        return Ok(ChangeKind::MatUnchanged);
    }
    let rgb = catalog.color_rgb(&placed[index].record.color)?;
    let material = catalog.material_asset(&drawn)?.to_string();
    renderer.set_appearance(placed[index].handle, &material, rgb)?;
    placed[index].record.material = drawn;
    Ok(ChangeKind::MatChanged)
}

/// Attempt to relocate the object (probability `relocation_prob`; the
/// rest of the time the scene is deliberately left unchanged). The
/// candidate loop reuses the placement solver's constraint check with
/// the object's own old position removed from the constraint set, but
/// without whole-scene restart: exhaustion keeps the old position. A
/// relocation that passes placement but fails the visibility check is
/// reverted to the exact pre-mutation snapshot.
///
/// Position outcomes are tallied under the `size_*` keys.
pub(crate) fn apply_position_change<R: Renderer + ?Sized>(
    rng: &mut Pcg32,
    placed: &mut [PlacedObject],
    index: usize,
    catalog: &PropertyCatalog,
    frame: &DirectionFrame,
    params: &GenerationParams,
    renderer: &mut R,
) -> Result<ChangeKind, SceneGenError> {
    if !rng.next_bool(params.relocation_prob) {
        return Ok(ChangeKind::SizeUnchanged);
    }

    let others: Vec<Footprint> = placed
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, p)| p.record.footprint())
        .collect();
    let radius = placed[index].record.coords_3d.2;
    let Some((x, y)) = placement::find_position(rng, radius, &others, frame, params) else {
        debug!("relocation retries exhausted for object {index}; keeping old position");
        return Ok(ChangeKind::SizeUnchanged);
    };

    let snapshot = placed[index].clone();
    let shape = catalog.shape_asset(&snapshot.record.shape)?.to_string();
    let material = catalog.material_asset(&snapshot.record.material)?.to_string();
    let rgb = catalog.color_rgb(&snapshot.record.color)?;

    renderer.delete_object(snapshot.handle);
    let handle = renderer.place_object(&shape, radius, (x, y), snapshot.record.rotation)?;
    renderer.set_appearance(handle, &material, rgb)?;
    placed[index].handle = handle;
    placed[index].record.coords_3d = crate::types::Vec3(x, y, radius);
    placed[index].record.pixel_coords = renderer.project_to_image(placed[index].record.coords_3d);

    let handles: Vec<_> = placed.iter().map(|p| p.handle).collect();
    if visibility::check_visibility(renderer, &handles, params.min_pixels_per_object)? {
        return Ok(ChangeKind::SizeChanged);
    }

    // Occluded after the move: put the original object back, bit for bit.
    debug!("relocated object {index} failed visibility; reverting");
    renderer.delete_object(handle);
    let restored = renderer.place_object(
        &shape,
        snapshot.record.coords_3d.2,
        (snapshot.record.coords_3d.0, snapshot.record.coords_3d.1),
        snapshot.record.rotation,
    )?;
    renderer.set_appearance(restored, &material, rgb)?;
    placed[index] = PlacedObject {
        record: snapshot.record,
        handle: restored,
    };
    Ok(ChangeKind::SizeUnchanged)
}

/// Build the emitted `changes` record from the per-scene tallies and
/// the cross-scene relationship graph.
///
/// For a changed outcome, each snapshot carries four 0/1 flags: the
/// pre-mutation snapshot's flag for direction `d` says whether the
/// post-mutation copy lies in direction `d` from it, and vice versa.
/// `behind` is emitted under the key `back`. Unchanged outcomes carry
/// only the change type.
pub fn build_changes(
    original: &[SceneObject],
    mutated: &[SceneObject],
    record: &SceneChangeCounts,
    union_graph: &RelationshipGraph,
) -> Changes {
    let mut changes = Changes::default();
    for (&obj_id, counts) in record.obj_id.iter().zip(&record.counts) {
        let Some(kind) = counts.dominant_kind() else {
            continue;
        };
        changes.kind = Some(kind);
        if !kind.is_changed() {
            continue;
        }
        let cobj_id = original.len() + obj_id;
        let flag = |direction: Direction, from: usize, to: usize| -> u8 {
            u8::from(union_graph.get(direction)[from].contains(&to))
        };
        changes.id = Some(obj_id);
        changes.obj = Some(ObjectSnapshot {
            object: original[obj_id].clone(),
            left: flag(Direction::Left, obj_id, cobj_id),
            right: flag(Direction::Right, obj_id, cobj_id),
            front: flag(Direction::Front, obj_id, cobj_id),
            back: flag(Direction::Behind, obj_id, cobj_id),
        });
        changes.cobj = Some(ObjectSnapshot {
            object: mutated[obj_id].clone(),
            left: flag(Direction::Left, cobj_id, obj_id),
            right: flag(Direction::Right, cobj_id, obj_id),
            front: flag(Direction::Front, cobj_id, obj_id),
            back: flag(Direction::Behind, cobj_id, obj_id),
        });
    }
    changes
}
