#[allow(dead_code)]
mod common;

use ndarray::Array2;

use common::{gaussian_spot, window_mean};
use flowalign_core::compute::{create_flow_engine, DevicePreference};
use flowalign_core::error::ErrorKind;
use flowalign_core::flow::{normalize_unit_range, FlowEngine, FlowParams, LucasKanadeEngine};
use flowalign_core::frame::DisplacementField;

fn engine(device: DevicePreference) -> LucasKanadeEngine {
    LucasKanadeEngine::new(
        FlowParams {
            window_size: 15,
            levels: 6,
            iterations: 3,
        },
        device,
    )
}

fn spot(cx: f32, cy: f32) -> Array2<f32> {
    normalize_unit_range(&gaussian_spot(64, 64, cx, cy, 3.0, 1.0, 0.1))
}

#[test]
fn test_identical_inputs_give_exact_zero_field() {
    let image = spot(30.0, 33.0);
    let field = engine(DevicePreference::Sequential)
        .estimate(&image, &image, None)
        .unwrap();
    assert_eq!(field.dim(), (64, 64));
    assert!(field.dx.iter().all(|&v| v == 0.0));
    assert!(field.dy.iter().all(|&v| v == 0.0));
}

#[test]
fn test_recovers_subpixel_translation() {
    let reference = spot(32.0, 32.0);
    // reference(r, c) ~ target(r + dy, c + dx)
    let target = spot(33.0, 31.5);
    let field = engine(DevicePreference::Sequential)
        .estimate(&reference, &target, None)
        .unwrap();

    let dx = window_mean(&field.dx, 32, 32, 2);
    let dy = window_mean(&field.dy, 32, 32, 2);
    assert!((dx - 1.0).abs() < 0.3, "dx={dx}");
    assert!((dy + 0.5).abs() < 0.3, "dy={dy}");
}

#[test]
fn test_parallel_rows_update_both_components() {
    let reference = spot(32.0, 32.0);
    let target = spot(31.0, 33.5);
    let field = engine(DevicePreference::Parallel)
        .estimate(&reference, &target, None)
        .unwrap();

    let dx = window_mean(&field.dx, 32, 32, 2);
    let dy = window_mean(&field.dy, 32, 32, 2);
    assert!((dx + 1.0).abs() < 0.3, "dx={dx}");
    assert!((dy - 1.5).abs() < 0.4, "dy={dy}");
}

#[test]
fn test_correct_seed_is_kept() {
    let reference = spot(32.0, 32.0);
    let target = spot(34.0, 32.0);
    let seed = DisplacementField::uniform(64, 64, 2.0, 0.0);
    let field = engine(DevicePreference::Sequential)
        .estimate(&reference, &target, Some(&seed))
        .unwrap();

    let dx = window_mean(&field.dx, 32, 32, 2);
    let dy = window_mean(&field.dy, 32, 32, 2);
    assert!((dx - 2.0).abs() < 0.2, "dx={dx}");
    assert!(dy.abs() < 0.2, "dy={dy}");
}

#[test]
fn test_flat_regions_keep_seed() {
    let flat = Array2::<f32>::zeros((32, 32));
    let seed = DisplacementField::uniform(32, 32, 0.75, -0.25);
    let field = engine(DevicePreference::Sequential)
        .estimate(&flat, &flat, Some(&seed))
        .unwrap();
    assert!(field.dx.iter().all(|&v| (v - 0.75).abs() < 1e-5));
    assert!(field.dy.iter().all(|&v| (v + 0.25).abs() < 1e-5));
}

#[test]
fn test_backends_agree() {
    let reference = spot(32.0, 32.0);
    let target = spot(33.5, 30.5);
    let seq = engine(DevicePreference::Sequential)
        .estimate(&reference, &target, None)
        .unwrap();
    let par = engine(DevicePreference::Parallel)
        .estimate(&reference, &target, None)
        .unwrap();
    assert_eq!(seq, par);
}

#[test]
fn test_shape_mismatches_are_dimension_errors() {
    let lk = engine(DevicePreference::Sequential);
    let a = Array2::<f32>::zeros((16, 16));
    let b = Array2::<f32>::zeros((16, 12));
    assert_eq!(
        lk.estimate(&a, &b, None).unwrap_err().kind(),
        ErrorKind::Dimension
    );

    let seed = DisplacementField::zeros(8, 8);
    assert_eq!(
        lk.estimate(&a, &a, Some(&seed)).unwrap_err().kind(),
        ErrorKind::Dimension
    );
}

#[test]
fn test_zero_window_is_estimation_error() {
    let lk = LucasKanadeEngine::new(
        FlowParams {
            window_size: 0,
            ..Default::default()
        },
        DevicePreference::Sequential,
    );
    let a = Array2::<f32>::zeros((16, 16));
    assert_eq!(
        lk.estimate(&a, &a, None).unwrap_err().kind(),
        ErrorKind::Estimation
    );
}

#[test]
fn test_factory_builds_lucas_kanade() {
    let engine = create_flow_engine(&FlowParams::default(), DevicePreference::Auto);
    assert_eq!(engine.name(), "pyramidal Lucas-Kanade");
}

#[test]
fn test_default_params() {
    let params = FlowParams::default();
    assert_eq!(params.window_size, 150);
    assert_eq!(params.levels, 6);
    assert_eq!(params.iterations, 1);
}

#[test]
fn test_normalize_stretches_to_unit_range() {
    let data = Array2::from_shape_fn((4, 4), |(r, c)| 2.0 + (r * 4 + c) as f32);
    let out = normalize_unit_range(&data);
    assert_eq!(out[[0, 0]], 0.0);
    assert_eq!(out[[3, 3]], 1.0);
    assert!((out[[1, 2]] - 6.0 / 15.0).abs() < 1e-6);

    let flat = Array2::from_elem((4, 4), 0.3);
    assert!(normalize_unit_range(&flat).iter().all(|&v| v == 0.0));
}
