//! Final per-source photometry table.
//!
//! Rows are built once per source from the stage results and kept in input
//! order. A row whose background could not be measured keeps its raw sums,
//! has NaN in the derived columns and carries [`RecordFlags::BACKGROUND_FAILED`]
//! plus a message.

use bitflags::bitflags;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::io::Write;
use std::path::Path;

use crate::aperture::PixelPosition;
use crate::error::PhotometryError;
use crate::flux::FluxCorrection;

bitflags! {
    /// Quality flags of one photometry row, written as an integer column.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct RecordFlags: u8 {
        /// Source aperture extends past the image edge
        const APERTURE_EDGE = 1 << 0;
        /// Background annulus extends past the image edge
        const ANNULUS_EDGE = 1 << 1;
        /// Source aperture sum is NaN
        const NAN_IN_APERTURE = 1 << 2;
        /// Background could not be estimated
        const BACKGROUND_FAILED = 1 << 3;
    }
}

/// Photometry of one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotometryRecord {
    /// 1-based id in input order
    pub id: usize,
    pub position: PixelPosition,
    pub aperture_sum: f64,
    pub aperture_sum_err: Option<f64>,
    pub annulus_sum: f64,
    /// Annulus pixels used for the background statistic
    pub annulus_npix: usize,
    pub correction: FluxCorrection,
    pub flags: RecordFlags,
    /// Why the background failed, if it did
    pub message: Option<String>,
}

impl PhotometryRecord {
    pub fn is_ok(&self) -> bool {
        !self.flags.contains(RecordFlags::BACKGROUND_FAILED)
    }
}

/// Ordered photometry rows plus the name of the background column.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotometryTable {
    background_column: String,
    rows: Vec<PhotometryRecord>,
}

impl PhotometryTable {
    pub fn new(background_column: impl Into<String>, rows: Vec<PhotometryRecord>) -> Self {
        Self {
            background_column: background_column.into(),
            rows,
        }
    }

    pub fn rows(&self) -> &[PhotometryRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose background estimate failed
    pub fn n_failed(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_ok()).count()
    }

    /// Name of the per-pixel background column, e.g. `annulus_median`
    pub fn background_column(&self) -> &str {
        &self.background_column
    }

    pub fn column_names(&self) -> Vec<String> {
        [
            "id",
            "xcenter",
            "ycenter",
            "aperture_sum",
            "aperture_sum_err",
            "annulus_sum",
            "annulus_npix",
            self.background_column.as_str(),
            "aperture_bkg",
            "aperture_sum_bkgsub",
            "flags",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Write the table as CSV to any writer.
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<(), PhotometryError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.column_names())?;
        for row in &self.rows {
            wtr.write_record(&[
                row.id.to_string(),
                format!("{:.6}", row.position.x),
                format!("{:.6}", row.position.y),
                format!("{:.6}", row.aperture_sum),
                row.aperture_sum_err
                    .map(|e| format!("{e:.6}"))
                    .unwrap_or_default(),
                format!("{:.6}", row.annulus_sum),
                row.annulus_npix.to_string(),
                format!("{:.6}", row.correction.bkg_per_pixel),
                format!("{:.6}", row.correction.total_background),
                format!("{:.6}", row.correction.flux),
                row.flags.bits().to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), PhotometryError> {
        let file = std::fs::File::create(path)?;
        self.write_csv_to(file)
    }

    /// Rows as JSON objects keyed by column name; NaN becomes `null`.
    pub fn to_json(&self) -> Value {
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                obj.insert("id".into(), json!(row.id));
                obj.insert("xcenter".into(), json!(row.position.x));
                obj.insert("ycenter".into(), json!(row.position.y));
                obj.insert("aperture_sum".into(), json!(row.aperture_sum));
                obj.insert("aperture_sum_err".into(), json!(row.aperture_sum_err));
                obj.insert("annulus_sum".into(), json!(row.annulus_sum));
                obj.insert("annulus_npix".into(), json!(row.annulus_npix));
                obj.insert(
                    self.background_column.clone(),
                    json!(row.correction.bkg_per_pixel),
                );
                obj.insert("aperture_bkg".into(), json!(row.correction.total_background));
                obj.insert("aperture_sum_bkgsub".into(), json!(row.correction.flux));
                obj.insert("flags".into(), json!(row.flags.bits()));
                if let Some(message) = &row.message {
                    obj.insert("message".into(), json!(message));
                }
                Value::Object(obj)
            })
            .collect();
        Value::Array(rows)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), PhotometryError> {
        let json = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Write CSV or JSON depending on the file extension (CSV by default).
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), PhotometryError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => self.write_json(path),
            _ => self.write_csv(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flux::correct_flux;

    fn record(id: usize, failed: bool) -> PhotometryRecord {
        let mut flags = RecordFlags::empty();
        let (correction, message) = if failed {
            flags.insert(RecordFlags::BACKGROUND_FAILED);
            (
                correct_flux(100.0, f64::NAN, 10.0),
                Some("no pixels".to_string()),
            )
        } else {
            (correct_flux(100.0, 2.0, 10.0), None)
        };
        PhotometryRecord {
            id,
            position: PixelPosition::new(id as f64, 2.0 * id as f64),
            aperture_sum: 100.0,
            aperture_sum_err: Some(5.0),
            annulus_sum: 400.0,
            annulus_npix: 200,
            correction,
            flags,
            message,
        }
    }

    #[test]
    fn test_flags() {
        let mut flags = RecordFlags::empty();
        assert!(flags.is_empty());
        flags.insert(RecordFlags::APERTURE_EDGE);
        flags.insert(RecordFlags::BACKGROUND_FAILED);
        assert!(flags.contains(RecordFlags::APERTURE_EDGE));
        assert!(!flags.contains(RecordFlags::ANNULUS_EDGE));
        assert_eq!(flags.bits(), 9);
    }

    #[test]
    fn test_csv_output() {
        let table = PhotometryTable::new("annulus_median", vec![record(1, false), record(2, true)]);
        let mut buffer = Vec::new();
        table.write_csv_to(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "id,xcenter,ycenter,aperture_sum,aperture_sum_err,annulus_sum,annulus_npix,\
             annulus_median,aperture_bkg,aperture_sum_bkgsub,flags"
        );
        assert!(lines[1].starts_with("1,1.000000,2.000000,100.000000,5.000000"));
        assert!(lines[1].ends_with("20.000000,80.000000,0"));
        assert!(lines[2].contains("NaN"));
        assert!(lines[2].ends_with(",8"));
        assert_eq!(table.n_failed(), 1);
    }

    #[test]
    fn test_json_output() {
        let table = PhotometryTable::new("annulus_mean", vec![record(1, false), record(2, true)]);
        let json = table.to_json();
        assert_eq!(json[0]["annulus_mean"], json!(2.0));
        assert_eq!(json[0]["aperture_sum_bkgsub"], json!(80.0));
        assert!(json[1]["aperture_sum_bkgsub"].is_null());
        assert_eq!(json[1]["message"], json!("no pixels"));
        assert!(json[0].get("message").is_none());
    }
}
