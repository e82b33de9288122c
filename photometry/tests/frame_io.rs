//! FITS frame loading, total error and table output.

use approx::assert_relative_eq;
use photometry::io::{read_positions_csv, ScienceFrame};
use photometry::synthetic::{StarField, SyntheticSource};
use photometry::{LocalBackgroundPipeline, PhotometryError, PipelineConfig, PixelPosition};
use tempfile::TempDir;
use test_helpers::{init_test_logging, output_path};

fn noisy_field() -> StarField {
    StarField {
        shape: (128, 128),
        background: 20.0,
        noise_sigma: 0.5,
        exptime: 30.0,
        seed: 1234,
        sources: vec![
            SyntheticSource {
                position: PixelPosition::new(40.0, 40.0),
                flux: 5000.0,
            },
            SyntheticSource {
                position: PixelPosition::new(90.5, 70.2),
                flux: 3000.0,
            },
        ],
        ..Default::default()
    }
}

#[test]
fn test_fits_frame_matches_in_memory_frame() {
    init_test_logging();
    let temp_dir = TempDir::new().unwrap();
    let sci = temp_dir.path().join("sci.fits");
    let rms = temp_dir.path().join("rms.fits");

    let field = noisy_field();
    field.write_fits(&sci, &rms).unwrap();

    let loaded = ScienceFrame::load(&sci, &rms).unwrap();
    let in_memory = field.frame().unwrap();
    assert_eq!(loaded.science, in_memory.science);
    assert_eq!(loaded.header.exptime, Some(30.0));

    let pipeline = LocalBackgroundPipeline::new(PipelineConfig::default()).unwrap();
    let from_disk = pipeline.run_frame(&loaded, &field.positions()).unwrap();
    let from_memory = pipeline.run_frame(&in_memory, &field.positions()).unwrap();

    for (a, b) in from_disk.rows().iter().zip(from_memory.rows()) {
        assert_eq!(a.aperture_sum, b.aperture_sum);
        assert_eq!(a.aperture_sum_err, b.aperture_sum_err);
        assert_eq!(a.correction, b.correction);
    }
}

#[test]
fn test_total_error_includes_shot_noise() {
    let field = noisy_field();
    let frame = field.frame().unwrap();
    let config = PipelineConfig {
        aperture_radius: 6.0,
        ..Default::default()
    };
    let table = LocalBackgroundPipeline::new(config)
        .unwrap()
        .run_frame(&frame, &field.positions())
        .unwrap();

    let row = &table.rows()[0];
    let err = row.aperture_sum_err.unwrap();
    // RMS alone over the aperture area
    let rms_only = (0.5f64 * 0.5 * 36.0 * std::f64::consts::PI).sqrt();
    assert!(err > rms_only);
    // Poisson term ~ sqrt(sum / gain)
    let expected = (rms_only * rms_only + row.aperture_sum / 30.0).sqrt();
    assert_relative_eq!(err, expected, max_relative = 0.02);
}

#[test]
fn test_gain_override_and_missing_exptime() {
    let field = noisy_field();
    let mut frame = field.frame().unwrap();
    frame.header.exptime = None;

    let pipeline = LocalBackgroundPipeline::new(PipelineConfig::default()).unwrap();
    assert!(matches!(
        pipeline.run_frame(&frame, &field.positions()),
        Err(PhotometryError::InvalidGain(_))
    ));

    let config = PipelineConfig {
        effective_gain: Some(30.0),
        ..Default::default()
    };
    let table = LocalBackgroundPipeline::new(config)
        .unwrap()
        .run_frame(&frame, &field.positions())
        .unwrap();
    assert_eq!(table.len(), 2);
}

#[test]
fn test_table_written_as_csv_and_json() {
    init_test_logging();
    let field = noisy_field();
    let table = LocalBackgroundPipeline::new(PipelineConfig::default())
        .unwrap()
        .run_frame(&field.frame().unwrap(), &field.positions())
        .unwrap();

    let csv_path = output_path("photometry/frame_io.csv");
    table.write(&csv_path).unwrap();
    let csv_text = std::fs::read_to_string(&csv_path).unwrap();
    let header = csv_text.lines().next().unwrap();
    assert!(header.starts_with("id,xcenter,ycenter,aperture_sum,aperture_sum_err"));
    assert!(header.contains("annulus_sigclip_median"));
    assert_eq!(csv_text.lines().count(), 3);

    let json_path = output_path("photometry/frame_io.json");
    table.write(&json_path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["id"], 2);
    assert!(rows[0]["aperture_sum_bkgsub"].as_f64().unwrap() > 4000.0);
}

#[test]
fn test_positions_csv_feeds_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("positions.csv");
    std::fs::write(&path, "x,y\n40.0,40.0\n90.5,70.2\n").unwrap();

    let positions = read_positions_csv(&path).unwrap();
    assert_eq!(positions, noisy_field().positions());
}
