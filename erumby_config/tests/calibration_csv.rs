use std::fs::File;
use std::io::Write;

use erumby_config::{CalibrationRow, EncoderCalibration, load_calibration_csv};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("encoder.csv");
    let mut f = File::create(&path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
    (dir, path)
}

#[rstest]
fn from_rows_keeps_points_in_order() {
    let rows = [
        CalibrationRow {
            pulses: 0.0,
            speed_mps: 0.0,
        },
        CalibrationRow {
            pulses: 12.0,
            speed_mps: 3.1,
        },
        CalibrationRow {
            pulses: 30.0,
            speed_mps: 7.0,
        },
    ];
    let c = EncoderCalibration::from_rows(&rows).unwrap();
    assert_eq!(c.points, vec![(0.0, 0.0), (12.0, 3.1), (30.0, 7.0)]);
}

#[rstest]
fn from_rows_rejects_single_row() {
    let rows = [CalibrationRow {
        pulses: 0.0,
        speed_mps: 0.0,
    }];
    let err = EncoderCalibration::from_rows(&rows).expect_err("one row is not a curve");
    assert!(format!("{err}").contains("at least two rows"));
}

#[rstest]
#[case(10.0)]
#[case(5.0)]
fn from_rows_rejects_non_increasing_pulses(#[case] second: f32) {
    let rows = vec![
        CalibrationRow {
            pulses: 10.0,
            speed_mps: 1.0,
        },
        CalibrationRow {
            pulses: second,
            speed_mps: 2.0,
        },
    ];
    let err = EncoderCalibration::try_from(rows).expect_err("should fail");
    assert!(format!("{err}").contains("strictly increasing (rows 2 and 3)"));
}

#[rstest]
fn csv_loads_with_whitespace() {
    let (_dir, path) = write_csv(&["pulses, speed_mps", "0, 0.0", " 20 ,2.5", "40,5.25"]);
    let c = load_calibration_csv(&path).unwrap();
    assert_eq!(c.points, vec![(0.0, 0.0), (20.0, 2.5), (40.0, 5.25)]);
}

#[rstest]
fn csv_with_wrong_headers_errors() {
    let (_dir, path) = write_csv(&["raw,value", "0,0.0", "10,1.0"]);
    let err = load_calibration_csv(&path).expect_err("should error on bad headers");
    assert!(format!("{err}").contains("headers 'pulses,speed_mps'"));
}

#[rstest]
fn csv_with_non_numeric_errors() {
    let (_dir, path) = write_csv(&["pulses,speed_mps", "abc,xyz"]);
    let err = load_calibration_csv(&path).expect_err("should error on non-numeric");
    assert!(format!("{err}").contains("invalid CSV row 2"));
}

#[rstest]
fn missing_file_errors() {
    let dir = tempdir().unwrap();
    let err = load_calibration_csv(&dir.path().join("nope.csv")).expect_err("no file");
    assert!(format!("{err}").contains("open calibration CSV"));
}
