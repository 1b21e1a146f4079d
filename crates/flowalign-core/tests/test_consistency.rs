use approx::assert_abs_diff_eq;
use ndarray::array;

use flowalign_core::error::ErrorKind;
use flowalign_core::frame::DisplacementField;
use flowalign_core::output::{flow_consistency, load_records, write_records, FlowConsistencyRecord};

#[test]
fn test_identical_fields_are_fully_consistent() {
    let field = DisplacementField::uniform(6, 6, 0.7, -0.2);
    let record = flow_consistency(3, &field, &field).unwrap();
    assert_eq!(record.frame, 3);
    assert_eq!(record.mean_abs_x, 0.0);
    assert_eq!(record.std_x, 0.0);
    assert_eq!(record.mean_abs_y, 0.0);
    assert_eq!(record.std_y, 0.0);
}

#[test]
fn test_uniform_difference_has_zero_spread() {
    let previous = DisplacementField::zeros(4, 4);
    let current = DisplacementField::uniform(4, 4, 1.5, -0.5);
    let record = flow_consistency(2, &previous, &current).unwrap();
    assert_abs_diff_eq!(record.mean_abs_x, 1.5, epsilon = 1e-12);
    assert_abs_diff_eq!(record.mean_abs_y, 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(record.std_x, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(record.std_y, 0.0, epsilon = 1e-12);
}

#[test]
fn test_spread_is_population_std_of_difference() {
    let previous = DisplacementField::zeros(2, 2);
    let current = DisplacementField {
        dx: array![[0.0, 2.0], [2.0, 0.0]],
        dy: array![[-1.0, 1.0], [-1.0, 1.0]],
    };
    let record = flow_consistency(5, &previous, &current).unwrap();
    assert_abs_diff_eq!(record.mean_abs_x, 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(record.std_x, 1.0, epsilon = 1e-12);
    // Signed differences cancel in the mean but not in the spread.
    assert_abs_diff_eq!(record.mean_abs_y, 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(record.std_y, 1.0, epsilon = 1e-12);
}

#[test]
fn test_mismatched_fields_are_dimension_error() {
    let err = flow_consistency(
        2,
        &DisplacementField::zeros(4, 4),
        &DisplacementField::zeros(4, 5),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dimension);
}

#[test]
fn test_records_table_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.toml");
    let records = vec![
        FlowConsistencyRecord {
            frame: 2,
            mean_abs_x: 0.25,
            std_x: 0.5,
            mean_abs_y: 0.125,
            std_y: 0.0625,
        },
        FlowConsistencyRecord {
            frame: 3,
            mean_abs_x: 1.0,
            std_x: 2.0,
            mean_abs_y: 3.0,
            std_y: 4.0,
        },
    ];

    write_records(&path, &records).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.matches("[[records]]").count(), 2);
    assert_eq!(load_records(&path).unwrap(), records);
}
