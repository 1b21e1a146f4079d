#[allow(dead_code)]
mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use common::{pattern, PanickingStore};
use flowalign_core::error::ErrorKind;
use flowalign_core::frame::CoarseShift;
use flowalign_core::io::crop::{CropCorners, CropRect};
use flowalign_core::io::sequence::{FrameStore, MemorySequence};
use flowalign_core::io::source::{Correction, FrameSource, ReadFrame};

fn crop(x0: usize, y0: usize, x1: usize, y1: usize) -> CropRect {
    CropRect::from_corners(&CropCorners {
        top_left: (x0, y0),
        bottom_right: (x1, y1),
    })
    .unwrap()
}

#[test]
fn test_zero_gain_fails_before_any_frame_is_read() {
    let store = PanickingStore {
        dims: (8, 8),
        count: 4,
    };
    let mut gain = Array2::<f32>::ones((8, 8));
    gain[[3, 3]] = 0.0;

    let err = Correction::new(None, None, Some(gain), store.dimensions()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_nan_gain_is_config_error() {
    let mut gain = Array2::<f32>::ones((6, 6));
    gain[[0, 5]] = f32::NAN;
    let err = Correction::new(None, None, Some(gain), (6, 6)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_source_construction_does_not_read_frames() {
    let store = PanickingStore {
        dims: (8, 8),
        count: 4,
    };
    let source = FrameSource::new(Box::new(store), Correction::identity((8, 8))).unwrap();
    assert_eq!(source.frame_count(), 4);
    assert_eq!(source.dimensions(), (8, 8));
}

#[test]
fn test_dark_and_gain_are_applied() {
    let store = MemorySequence::new(vec![Array2::from_elem((4, 5), 0.5)]).unwrap();
    let dark = Array2::from_elem((4, 5), 0.1);
    let gain = Array2::from_elem((4, 5), 2.0);
    let correction = Correction::new(None, Some(dark), Some(gain), (4, 5)).unwrap();
    let source = FrameSource::new(Box::new(store), correction).unwrap();

    let frame = source.read(1).unwrap();
    assert_eq!(frame.index, 1);
    for &v in frame.data.iter() {
        assert_abs_diff_eq!(v, 0.2, epsilon = 1e-6);
    }
}

#[test]
fn test_full_size_dark_is_cropped_with_frames() {
    let raw = pattern(10, 12, 1);
    let dark = Array2::from_shape_fn((10, 12), |(r, c)| (r * 12 + c) as f32 * 1e-3);
    let rect = crop(2, 1, 6, 4);

    let store = MemorySequence::new(vec![raw.clone()]).unwrap();
    let correction = Correction::new(Some(rect), Some(dark.clone()), None, (10, 12)).unwrap();
    assert_eq!(correction.output_dims(), (4, 5));
    let source = FrameSource::new(Box::new(store), correction).unwrap();

    let frame = source.read(1).unwrap();
    assert_eq!(frame.data.dim(), (4, 5));
    for r in 0..4 {
        for c in 0..5 {
            let expected = raw[[r + 1, c + 2]] - dark[[r + 1, c + 2]];
            assert_abs_diff_eq!(frame.data[[r, c]], expected, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_cropped_size_gain_is_accepted() {
    let rect = crop(0, 0, 3, 3);
    let gain = Array2::from_elem((4, 4), 4.0);
    let correction = Correction::new(Some(rect), None, Some(gain), (8, 8)).unwrap();
    let out = correction.apply(&Array2::from_elem((8, 8), 1.0)).unwrap();
    assert_eq!(out.dim(), (4, 4));
    assert_abs_diff_eq!(out[[2, 2]], 0.25, epsilon = 1e-6);
}

#[test]
fn test_mismatched_dark_is_dimension_error() {
    let dark = Array2::<f32>::zeros((5, 5));
    let err = Correction::new(None, Some(dark), None, (8, 8)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dimension);
}

#[test]
fn test_out_of_bounds_crop_is_config_error() {
    let err = Correction::new(Some(crop(4, 4, 9, 9)), None, None, (8, 8)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = CropRect::from_corners(&CropCorners {
        top_left: (5, 5),
        bottom_right: (2, 7),
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_indices_are_one_based() {
    let store = MemorySequence::new(vec![pattern(4, 4, 0), pattern(4, 4, 1)]).unwrap();
    let source = FrameSource::new(Box::new(store), Correction::identity((4, 4))).unwrap();

    assert_eq!(source.read(2).unwrap().data, pattern(4, 4, 1));
    assert_eq!(source.read(0).unwrap_err().kind(), ErrorKind::Io);
    assert_eq!(source.read(3).unwrap_err().kind(), ErrorKind::Io);
}

#[test]
fn test_coarse_shifts_attach_per_frame() {
    let store = MemorySequence::new(vec![pattern(4, 4, 0); 3]).unwrap();
    let source = FrameSource::new(Box::new(store), Correction::identity((4, 4))).unwrap();
    assert!(!source.has_coarse_shifts());
    assert_eq!(source.coarse_shift(1), None);

    let shifts = vec![
        CoarseShift { x: 0.0, y: 0.0 },
        CoarseShift { x: 1.5, y: -2.0 },
        CoarseShift { x: -3.0, y: 0.5 },
    ];
    let source = source.with_shifts(shifts).unwrap();
    assert!(source.has_coarse_shifts());
    assert_eq!(source.coarse_shift(2), Some(CoarseShift { x: 1.5, y: -2.0 }));
    assert_eq!(source.coarse_shift(4), None);
}

#[test]
fn test_shift_count_mismatch_is_config_error() {
    let store = MemorySequence::new(vec![pattern(4, 4, 0); 3]).unwrap();
    let source = FrameSource::new(Box::new(store), Correction::identity((4, 4))).unwrap();
    let err = source
        .with_shifts(vec![CoarseShift::default(); 2])
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_unusable_shifts_are_config_errors() {
    let bad_shifts = [
        CoarseShift { x: f64::NAN, y: 0.0 },
        CoarseShift { x: 0.0, y: f64::INFINITY },
        CoarseShift { x: 1e20, y: 0.0 },
        CoarseShift { x: 0.0, y: -4.5 },
    ];
    for bad in bad_shifts {
        let store = MemorySequence::new(vec![pattern(4, 6, 0); 2]).unwrap();
        let source = FrameSource::new(Box::new(store), Correction::identity((4, 6))).unwrap();
        let err = source
            .with_shifts(vec![CoarseShift::default(), bad])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config, "shift {bad:?}");
    }
}
