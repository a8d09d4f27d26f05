//! Scene composition and the dataset run driver.
//!
//! Composition is rejection sampling at two levels: per-object placement
//! retries inside the solver, and whole-scene restarts when the placed
//! scene fails the visibility check. Both levels are bounded, so a
//! configuration that cannot be satisfied surfaces as an error instead
//! of spinning forever.

use std::f64::consts::SQRT_2;
use std::path::Path;

use log::{debug, info, warn};

use crate::directions::derive_frame;
use crate::error::{RenderError, SceneGenError};
use crate::mutation::{build_changes, mutate_scene};
use crate::output::{stem, write_counts, write_json_pretty, DatasetFile, DatasetInfo, OutputLayout};
use crate::placement::{find_position, Footprint};
use crate::prng::Pcg32;
use crate::relationships::{compute_cross_scene, compute_relationships};
use crate::renderer::Renderer;
use crate::types::{
    ChangeCounts, CombinedScene, DirectionFrame, GenerationParams, PlacedObject,
    PropertyCatalog, Scene, SceneObject, Vec3,
};
use crate::visibility::check_visibility;

/// Compose one scene: draw properties for `num_objects` objects, place
/// them subject to the distance and margin constraints, and accept the
/// result only if every object passes the visibility check. Placement
/// exhaustion or a visibility failure discards the whole scene and
/// starts over, up to `max_restarts` times.
pub fn compose_scene<R: Renderer + ?Sized>(
    rng: &mut Pcg32,
    catalog: &PropertyCatalog,
    params: &GenerationParams,
    renderer: &mut R,
    num_objects: u32,
) -> Result<(Vec<PlacedObject>, DirectionFrame), SceneGenError> {
    renderer.begin_scene();
    let frame = derive_frame(&renderer.camera_frame(), renderer.plane_normal())?;

    let sizes: Vec<(&String, f64)> = catalog.sizes.iter().map(|(k, &v)| (k, v)).collect();
    let shapes: Vec<&String> = catalog.shapes.keys().collect();
    let materials: Vec<&String> = catalog.materials.keys().collect();
    let empty = || SceneGenError::Configuration("property catalog has an empty table".into());

    'restart: for attempt in 0..params.max_restarts {
        let mut placed: Vec<PlacedObject> = Vec::with_capacity(num_objects as usize);
        for _ in 0..num_objects {
            let &(size, size_radius) = rng.choose(&sizes).ok_or_else(empty)?;
            let shape = rng.choose(&shapes).ok_or_else(empty)?.to_string();
            let palette = catalog.allowed_colors(&shape);
            let color = rng.choose(&palette).ok_or_else(empty)?.to_string();
            let material = rng.choose(&materials).ok_or_else(empty)?.to_string();
            let rotation = 360.0 * rng.next_float();

            // Diagonal extent governs collisions for square footprints,
            // so cubes shrink their effective radius before placement.
            let mut radius = size_radius;
            if shape == "cube" {
                radius /= SQRT_2;
            }

            let footprints: Vec<Footprint> =
                placed.iter().map(|p| p.record.footprint()).collect();
            let Some((x, y)) = find_position(rng, radius, &footprints, &frame, params) else {
                debug!(
                    "placement exhausted with {} of {num_objects} objects placed; restart {attempt}",
                    placed.len()
                );
                for p in &placed {
                    renderer.delete_object(p.handle);
                }
                continue 'restart;
            };

            let handle =
                renderer.place_object(catalog.shape_asset(&shape)?, radius, (x, y), rotation)?;
            renderer.set_appearance(
                handle,
                catalog.material_asset(&material)?,
                catalog.color_rgb(&color)?,
            )?;
            let coords = Vec3(x, y, radius);
            placed.push(PlacedObject {
                record: SceneObject {
                    shape,
                    size: size.clone(),
                    material,
                    coords_3d: coords,
                    rotation,
                    pixel_coords: renderer.project_to_image(coords),
                    color,
                },
                handle,
            });
        }

        let handles: Vec<_> = placed.iter().map(|p| p.handle).collect();
        if check_visibility(renderer, &handles, params.min_pixels_per_object)? {
            return Ok((placed, frame));
        }
        debug!("scene failed visibility; restart {attempt}");
        for p in &placed {
            renderer.delete_object(p.handle);
        }
    }

    Err(SceneGenError::Configuration(format!(
        "could not compose a valid scene of {num_objects} objects within {} restarts",
        params.max_restarts
    )))
}

/// Retry the final full render while failures are transient. A fatal
/// renderer error aborts the run.
pub(crate) fn render_with_retry<R: Renderer + ?Sized>(
    renderer: &mut R,
    path: &Path,
) -> Result<(), SceneGenError> {
    loop {
        match renderer.render_full(path) {
            Ok(()) => return Ok(()),
            Err(RenderError::Transient(msg)) => {
                warn!("transient failure rendering {}: {msg}; retrying", path.display());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Action-mode products for one image: the mutated sibling scene and
/// the paired before/after document.
#[derive(Debug, Clone)]
pub struct ActionOutput {
    pub scene: Scene,
    pub combined: CombinedScene,
}

#[derive(Debug, Clone)]
pub struct GeneratedScene {
    pub scene: Scene,
    pub action: Option<ActionOutput>,
}

/// Generate one image (plus its action sibling when enabled): compose,
/// render, record ground truth, mutate, render again, diff.
pub fn generate_image<R: Renderer + ?Sized>(
    rng: &mut Pcg32,
    catalog: &PropertyCatalog,
    params: &GenerationParams,
    renderer: &mut R,
    layout: &OutputLayout,
    image_index: usize,
    tally: &mut ChangeCounts,
) -> Result<GeneratedScene, SceneGenError> {
    let num_objects = rng.next_int(params.min_objects, params.max_objects);
    let (mut placed, frame) = compose_scene(rng, catalog, params, renderer, num_objects)?;

    let objects: Vec<SceneObject> = placed.iter().map(|p| p.record.clone()).collect();
    let image_filename = format!(
        "{}.{}",
        stem(&params.filename_prefix, &params.split, image_index),
        params.image_ext
    );
    render_with_retry(renderer, &layout.image_path(params, &params.split, image_index))?;
    let scene = Scene {
        split: params.split.clone(),
        image_index,
        image_filename: image_filename.clone(),
        objects: objects.clone(),
        directions: frame.clone(),
        relationships: compute_relationships(&objects, &frame),
    };

    if !params.action {
        return Ok(GeneratedScene { scene, action: None });
    }

    let record = mutate_scene(rng, &mut placed, catalog, &frame, params, renderer, tally)?;
    let cor_objects: Vec<SceneObject> = placed.iter().map(|p| p.record.clone()).collect();
    let cor_filename = format!(
        "{}.{}",
        stem(&params.filename_prefix, &params.action_split, image_index),
        params.image_ext
    );
    render_with_retry(
        renderer,
        &layout.image_path(params, &params.action_split, image_index),
    )?;
    let cor_scene = Scene {
        split: params.action_split.clone(),
        image_index,
        image_filename: cor_filename.clone(),
        objects: cor_objects.clone(),
        directions: frame.clone(),
        relationships: compute_relationships(&cor_objects, &frame),
    };

    let union = compute_cross_scene(&objects, &cor_objects, &frame);
    let changes = build_changes(&objects, &cor_objects, &record, &union);
    let combined = CombinedScene {
        split: params.split.clone(),
        image_index,
        image_filename,
        objects,
        directions: frame.clone(),
        cor_split: params.action_split.clone(),
        cor_image_filename: cor_filename,
        cor_objects,
        cor_directions: frame,
        scene_change_counts: record,
        relationships: union,
        changes,
    };

    Ok(GeneratedScene {
        scene,
        action: Some(ActionOutput {
            scene: cor_scene,
            combined,
        }),
    })
}

#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub scenes: usize,
    pub counts: ChangeCounts,
}

/// Run a full dataset generation: all images and their ground-truth
/// files, then the aggregate scene file(s) and the change-count summary.
/// The run owns the generator and the change accumulator; nothing here
/// is process-global.
pub fn generate_dataset<R: Renderer + ?Sized>(
    catalog: &PropertyCatalog,
    params: &GenerationParams,
    renderer: &mut R,
    layout: &OutputLayout,
) -> Result<DatasetSummary, SceneGenError> {
    params.validate()?;
    catalog.validate()?;
    layout.create_dirs()?;

    let mut rng = Pcg32::new(params.seed, 0);
    let mut tally = ChangeCounts::default();
    let mut scenes = Vec::with_capacity(params.num_images);
    let mut combined_scenes = Vec::new();

    for i in 0..params.num_images {
        let index = params.start_idx + i;
        info!("generating image {index} ({}/{})", i + 1, params.num_images);
        let generated =
            generate_image(&mut rng, catalog, params, renderer, layout, index, &mut tally)?;
        write_json_pretty(
            &layout.scene_path(params, &params.split, index),
            &generated.scene,
        )?;
        if let Some(action) = generated.action {
            write_json_pretty(
                &layout.scene_path(params, &params.action_split, index),
                &action.scene,
            )?;
            write_json_pretty(
                &layout.scene_path(params, &params.combined_split, index),
                &action.combined,
            )?;
            combined_scenes.push(action.combined);
        }
        scenes.push(generated.scene);
    }

    let total = scenes.len();
    write_json_pretty(
        &layout.scene_file,
        &DatasetFile {
            info: DatasetInfo::new(params, &params.split),
            scenes,
        },
    )?;
    if params.action {
        write_json_pretty(
            &layout.combined_scene_file,
            &DatasetFile {
                info: DatasetInfo::new(params, &params.combined_split),
                scenes: combined_scenes,
            },
        )?;
        write_counts(&layout.count_file, &tally)?;
    }
    info!("wrote {total} scenes; change tallies: {tally:?}");

    Ok(DatasetSummary {
        scenes: total,
        counts: tally,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::satisfies_constraints;
    use crate::renderer::testing::StubRenderer;
    use crate::renderer::SoftwareRenderer;
    use std::fs;

    fn catalog() -> PropertyCatalog {
        serde_json::from_str(
            r#"{
                "colors": {"red": [173, 35, 35], "blue": [42, 75, 215], "green": [29, 105, 20]},
                "materials": {"rubber": "Rubber", "metal": "MyMetal"},
                "shapes": {"cube": "SmoothCube_v2", "sphere": "Sphere", "cylinder": "SmoothCylinder"},
                "sizes": {"large": 0.7, "small": 0.5}
            }"#,
        )
        .expect("valid catalog")
    }

    #[test]
    fn composed_scene_satisfies_all_invariants() {
        let mut stub = StubRenderer::new();
        let params = GenerationParams::with_seed(3);
        let mut rng = Pcg32::new(3, 0);
        let (placed, frame) = compose_scene(&mut rng, &catalog(), &params, &mut stub, 5).unwrap();
        assert_eq!(placed.len(), 5);
        let cat = catalog();
        for (i, p) in placed.iter().enumerate() {
            assert!(cat.shapes.contains_key(&p.record.shape));
            assert!(cat.colors.contains_key(&p.record.color));
            assert!(cat.materials.contains_key(&p.record.material));
            assert!((0.0..360.0).contains(&p.record.rotation));
            let expected = if p.record.shape == "cube" {
                cat.sizes[&p.record.size] / SQRT_2
            } else {
                cat.sizes[&p.record.size]
            };
            assert_eq!(p.record.coords_3d.2, expected);
            // Every prefix of the placement order was checked against
            // the earlier objects; recheck it here.
            let earlier: Vec<Footprint> =
                placed[..i].iter().map(|q| q.record.footprint()).collect();
            assert!(satisfies_constraints(
                p.record.coords_3d.0,
                p.record.coords_3d.1,
                p.record.coords_3d.2,
                &earlier,
                &frame,
                params.min_dist,
                params.margin,
            ));
        }
    }

    #[test]
    fn visibility_failure_triggers_restart() {
        let mut stub = StubRenderer::new();
        // The first composition uses handles 0..3; occluding handle 0
        // fails it and forces a second pass with fresh handles.
        stub.occluded.insert(0);
        let params = GenerationParams::with_seed(3);
        let mut rng = Pcg32::new(3, 0);
        let (placed, _) = compose_scene(&mut rng, &catalog(), &params, &mut stub, 3).unwrap();
        assert_eq!(stub.flat_calls, 2);
        assert_eq!(
            placed.iter().map(|p| p.handle).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
    }

    #[test]
    fn restart_ceiling_is_an_error() {
        let mut stub = StubRenderer::new();
        stub.pixels_per_object = 10; // every scene fails visibility
        let mut params = GenerationParams::with_seed(3);
        params.max_restarts = 3;
        let mut rng = Pcg32::new(3, 0);
        let err = compose_scene(&mut rng, &catalog(), &params, &mut stub, 3).unwrap_err();
        assert!(matches!(err, SceneGenError::Configuration(_)));
        assert_eq!(stub.flat_calls, 3);
    }

    #[test]
    fn degenerate_camera_is_fatal_before_placement() {
        let mut stub = StubRenderer::new();
        stub.degenerate_camera = true;
        let params = GenerationParams::with_seed(3);
        let mut rng = Pcg32::new(3, 0);
        let err = compose_scene(&mut rng, &catalog(), &params, &mut stub, 3).unwrap_err();
        assert!(matches!(err, SceneGenError::DegenerateFrame { .. }));
        // Frame derivation fails before anything is placed or rendered.
        assert!(stub.live.is_empty());
        assert_eq!(stub.flat_calls, 0);
    }

    #[test]
    fn transient_render_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        let mut stub = StubRenderer::new();
        stub.full_failures = 2;
        render_with_retry(&mut stub, &path).unwrap();
        assert_eq!(stub.full_calls, 3);
        assert!(path.exists());
    }

    #[test]
    fn action_dataset_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::under_root(dir.path());
        let mut params = GenerationParams::with_seed(42);
        params.num_images = 2;
        params.min_objects = 3;
        params.max_objects = 5;
        params.date = Some("08/23/2026".into());
        let mut renderer = SoftwareRenderer::new(320, 240, params.seed);

        let summary = generate_dataset(&catalog(), &params, &mut renderer, &layout).unwrap();
        assert_eq!(summary.scenes, 2);
        assert_eq!(summary.counts.total(), 2);

        for index in 0..2 {
            assert!(layout.image_path(&params, "new", index).exists());
            assert!(layout.image_path(&params, "cor", index).exists());
            assert!(layout.scene_path(&params, "new", index).exists());
            assert!(layout.scene_path(&params, "cor", index).exists());
            assert!(layout.scene_path(&params, "cb", index).exists());
        }

        let aggregate: DatasetFile<Scene> =
            serde_json::from_str(&fs::read_to_string(&layout.scene_file).unwrap()).unwrap();
        assert_eq!(aggregate.info.split, "new");
        assert_eq!(aggregate.scenes.len(), 2);
        for scene in &aggregate.scenes {
            let n = scene.objects.len();
            assert!((3..=5).contains(&n));
            assert_eq!(scene.relationships.left.len(), n);
            assert!(scene.image_filename.starts_with("CLEVR_new_"));
        }

        let combined: DatasetFile<CombinedScene> =
            serde_json::from_str(&fs::read_to_string(&layout.combined_scene_file).unwrap())
                .unwrap();
        assert_eq!(combined.scenes.len(), 2);
        for cb in &combined.scenes {
            assert_eq!(cb.objects.len(), cb.cor_objects.len());
            // Union graph covers both object sets.
            assert_eq!(cb.relationships.left.len(), cb.objects.len() * 2);
            assert!(cb.changes.kind.is_some());
            assert_eq!(cb.scene_change_counts.obj_id.len(), 1);
        }

        let counts: ChangeCounts =
            serde_json::from_str(&fs::read_to_string(&layout.count_file).unwrap()).unwrap();
        assert_eq!(counts, summary.counts);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let mut params = GenerationParams::with_seed(7);
        params.num_images = 2;
        params.min_objects = 3;
        params.max_objects = 4;
        params.date = Some("08/23/2026".into());

        let run = |dir: &Path| -> String {
            let layout = OutputLayout::under_root(dir);
            let mut renderer = SoftwareRenderer::new(320, 240, params.seed);
            generate_dataset(&catalog(), &params, &mut renderer, &layout).unwrap();
            fs::read_to_string(&layout.scene_file).unwrap()
        };

        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        assert_eq!(run(a.path()), run(b.path()));
    }

    #[test]
    fn non_action_run_emits_no_change_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::under_root(dir.path());
        let mut params = GenerationParams::with_seed(9);
        params.num_images = 1;
        params.min_objects = 3;
        params.max_objects = 3;
        params.action = false;
        params.date = Some("08/23/2026".into());
        let mut renderer = SoftwareRenderer::new(320, 240, params.seed);

        let summary = generate_dataset(&catalog(), &params, &mut renderer, &layout).unwrap();
        assert_eq!(summary.scenes, 1);
        assert_eq!(summary.counts.total(), 0);
        assert!(layout.scene_file.exists());
        assert!(!layout.combined_scene_file.exists());
        assert!(!layout.count_file.exists());
        assert!(!layout.image_path(&params, "cor", 0).exists());
    }
}
