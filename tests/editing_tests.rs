mod support;

use facetgeom::{
    BooleanOp, CancellationToken, ClipOrder, CollapseOptions, EditContext, KernelError, NeverReset,
    Plane, Selection,
};
use nalgebra::{Point3, Vector3};
use support::*;

fn plane_x(x: f64) -> Plane {
    Plane::from_point_normal(Point3::new(x, 0.0, 0.0), Vector3::x()).unwrap()
}

#[test]
fn test_split_square_into_two_halves() {
    let mut geometry = unit_square();
    let mut ctx = EditContext::new();
    let outcome = geometry
        .split_selected_facets(&mut ctx, &Selection::of_facets([0]), &plane_x(0.5))
        .unwrap();

    assert_eq!(geometry.facet_count(), 2);
    assert_eq!(outcome.created.len(), 2);
    assert!(outcome.skipped.is_empty());
    for &id in &outcome.created {
        let g = geometry.facet_geometry(id).unwrap();
        assert!(approx_eq(g.area, 0.5, 1e-12), "piece {id} has area {}", g.area);
        assert!(g.normal().z > 0.0);
    }
}

#[test]
fn test_split_then_merge_restores_area() {
    let mut geometry = u_shape();
    let mut ctx = EditContext::new();
    let plane = Plane::from_point_normal(Point3::new(0.0, 1.5, 0.0), Vector3::y()).unwrap();
    let outcome = geometry
        .split_selected_facets(&mut ctx, &Selection::of_facets([0]), &plane)
        .unwrap();
    assert_eq!(outcome.created.len(), 3);
    assert!(approx_eq(total_area(&geometry, &outcome.created), 5.0, 5e-9));

    let merges = geometry.merge_coplanar_facets(&mut ctx, 1e-3, None).unwrap();
    assert_eq!(merges, 2);
    assert_eq!(geometry.facet_count(), 1);
    assert!(approx_eq(total_area(&geometry, &[0]), 5.0, 5e-9));
}

#[test]
fn test_undo_split_brings_back_the_original() {
    let mut geometry = unit_square();
    let before = geometry.facet(0).unwrap().indices().to_vec();
    let mut ctx = EditContext::new();
    let outcome = geometry
        .split_selected_facets(&mut ctx, &Selection::of_facets([0]), &plane_x(0.5))
        .unwrap();

    geometry.undo_outcome(&mut ctx, outcome).unwrap();
    assert_eq!(geometry.facet_count(), 1);
    assert_eq!(geometry.facet(0).unwrap().indices(), before.as_slice());
    assert!(approx_eq(total_area(&geometry, &[0]), 1.0, 1e-12));
}

#[test]
fn test_declined_gate_leaves_geometry_untouched() {
    let mut geometry = unit_square();
    let snapshot = geometry.clone();
    let mut ctx = EditContext::new().with_gate(NeverReset);

    let result = geometry.split_selected_facets(&mut ctx, &Selection::of_facets([0]), &plane_x(0.5));
    assert_eq!(result.err(), Some(KernelError::ResetDeclined));
    let result = geometry.collapse_vertices(&mut ctx, 1e-3, None);
    assert_eq!(result.err(), Some(KernelError::ResetDeclined));
    assert_eq!(geometry, snapshot);
}

#[test]
fn test_intersection_of_offset_squares() {
    let mut geometry = two_squares(0.5);
    let mut ctx = EditContext::new();
    let outcome = geometry
        .clip_selected_polygons(
            &mut ctx,
            &Selection::of_facets([0, 1]),
            BooleanOp::Intersection,
            ClipOrder::Auto,
        )
        .unwrap();

    assert_eq!(outcome.created.len(), 1);
    assert_eq!(geometry.facet_count(), 3);
    let g = geometry.facet_geometry(outcome.created[0]).unwrap();
    assert!(approx_eq(g.area, 0.5, 1e-5), "intersection area {}", g.area);
    assert!(g.normal().z > 0.0);
}

#[test]
fn test_union_then_difference_gives_back_the_subject_remainder() {
    let mut geometry = two_squares(0.5);
    let mut ctx = EditContext::new();
    let union = geometry
        .clip_selected_polygons(
            &mut ctx,
            &Selection::of_facets([0, 1]),
            BooleanOp::Union,
            ClipOrder::Forward,
        )
        .unwrap();
    let merged = union.created[0];
    assert!(approx_eq(total_area(&geometry, &[merged]), 1.5, 1e-5));

    let clip_loop = geometry.facet(1).unwrap().indices().to_vec();
    let difference = geometry
        .clip(&mut ctx, merged, &[clip_loop], BooleanOp::Difference)
        .unwrap();
    assert_eq!(difference.created.len(), 1);
    let g = geometry.facet_geometry(difference.created[0]).unwrap();
    assert!(approx_eq(g.area, 0.5, 1e-5), "remainder area {}", g.area);
    assert!(g.bounding_box.maxs.x < 0.5 + 1e-5);
}

#[test]
fn test_clip_needs_two_facets() {
    let mut geometry = two_squares(0.5);
    let mut ctx = EditContext::new();
    let result = geometry.clip_selected_polygons(
        &mut ctx,
        &Selection::of_facets([0]),
        BooleanOp::Union,
        ClipOrder::Auto,
    );
    assert_eq!(
        result.err(),
        Some(KernelError::FacetSelection { expected: 2, found: 1 })
    );
}

fn square_with_close_vertex(gap: f64) -> facetgeom::Geometry<()> {
    let mut geometry = unit_square();
    geometry.add_vertex(Point3::new(1.0, 1.0, gap)).unwrap();
    geometry
}

#[test]
fn test_collapse_respects_tolerance() {
    let mut ctx = EditContext::new();

    let mut merged = square_with_close_vertex(1e-7);
    merged.collapse_vertices(&mut ctx, 1e-6, None).unwrap();
    assert_eq!(merged.vertex_count(), 4);

    let mut kept = square_with_close_vertex(1e-7);
    kept.collapse_vertices(&mut ctx, 1e-8, None).unwrap();
    assert_eq!(kept.vertex_count(), 5);
}

#[test]
fn test_collapse_is_idempotent() {
    let mut geometry = two_squares(1.0);
    let mut ctx = EditContext::new();
    geometry.collapse_vertices(&mut ctx, 1e-6, None).unwrap();
    let once = geometry.vertex_count();
    assert_eq!(once, 6);
    geometry.collapse_vertices(&mut ctx, 1e-6, None).unwrap();
    assert_eq!(geometry.vertex_count(), once);
}

#[test]
fn test_full_collapse_merges_touching_squares() {
    let mut geometry = two_squares(1.0);
    let mut ctx = EditContext::new();
    let report = geometry.collapse(&mut ctx, &CollapseOptions::default()).unwrap();
    assert_eq!(report.vertices_removed, 2);
    assert_eq!(geometry.facet_count(), 1);
    assert_eq!(geometry.facet(0).unwrap().len(), 4);
    assert!(approx_eq(total_area(&geometry, &[0]), 2.0, 1e-9));
}

#[test]
fn test_cancelled_collapse_restores_geometry() {
    let mut geometry = two_squares(1.0);
    let snapshot = geometry.clone();
    let token = CancellationToken::new();
    token.cancel();
    let mut ctx = EditContext::new().with_cancellation(token);
    let result = geometry.collapse(&mut ctx, &CollapseOptions::default());
    assert_eq!(result.err(), Some(KernelError::Cancelled));
    assert_eq!(geometry, snapshot);
}

#[test]
fn test_cube_connectivity_by_angle() {
    let mut geometry = cube();
    let mut ctx = EditContext::new();
    let pairs = geometry.analyze_neighbors(&mut ctx).unwrap();
    assert_eq!(pairs, 12);

    assert_eq!(geometry.connected_facets(0, 0.0).unwrap(), vec![0]);
    assert_eq!(
        geometry.connected_facets(0, 91f64.to_radians()).unwrap(),
        vec![0, 1, 2, 3, 4, 5]
    );
}

#[test]
fn test_move_top_face_stretches_the_cube() {
    let mut geometry = cube();
    let mut ctx = EditContext::new();
    let outcome = geometry
        .move_selected_facets(&mut ctx, &Selection::of_facets([1]), Vector3::new(0.0, 0.0, 1.0), false)
        .unwrap();
    assert_eq!(outcome.undo.len(), 4);
    for side in 2..6 {
        assert!(approx_eq(total_area(&geometry, &[side]), 2.0, 1e-12));
    }

    geometry.revert_points(&mut ctx, &outcome.undo).unwrap();
    assert!(approx_eq(total_area(&geometry, &[2]), 1.0, 1e-12));
}

#[test]
fn test_loft_between_opposite_faces_closes_the_tube() {
    let mut geometry = cube();
    let mut ctx = EditContext::new();
    geometry
        .remove_facets(&mut ctx, &[2, 3, 4, 5])
        .unwrap();
    let outcome = geometry.create_loft(&mut ctx, &Selection::of_facets([0, 1])).unwrap();
    assert_eq!(outcome.created.len(), 4);
    assert!(approx_eq(total_area(&geometry, &outcome.created), 4.0, 1e-9));
}
