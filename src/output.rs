//! Tabular report writers for both pipelines.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::{
    interference::InterferenceReport,
    reflect::PathRecord,
    sweep::{HeightSummary, SweepSink},
};

/// File-writing sweep sink: one best-path detail table per height plus the
/// accumulated summary written by `write_height_summary`.
pub struct SweepWriter {
    directory: PathBuf,
    tx_names: Vec<String>,
    reflector_names: Vec<String>,
}

impl SweepWriter {
    pub fn new(
        directory: &str,
        tx_names: Vec<String>,
        reflector_names: Vec<String>,
    ) -> Result<Self> {
        fs::create_dir_all(directory)?;
        Ok(Self {
            directory: PathBuf::from(directory),
            tx_names,
            reflector_names,
        })
    }

    fn name(names: &[String], index: usize) -> &str {
        names.get(index).map(String::as_str).unwrap_or("?")
    }
}

impl SweepSink for SweepWriter {
    fn on_height(&mut self, summary: &HeightSummary, records: &[PathRecord]) -> Result<()> {
        let path = self.directory.join(format!("best_paths_{:.2}", summary.height));
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "tx rx reflector tx_x tx_y tx_z rx_x rx_y rx_z refl_x refl_y refl_z \
             incidence reflection steering error class d_in d_out d_total"
        )?;
        for record in records {
            writeln!(
                writer,
                "{} {} {} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} \
                 {:.4} {:.4} {:.4} {:.4} {} {:.4} {:.4} {:.4}",
                Self::name(&self.tx_names, record.tx),
                Self::name(&self.tx_names, record.rx),
                Self::name(&self.reflector_names, record.reflector),
                record.tx_pos.x,
                record.tx_pos.y,
                record.tx_pos.z,
                record.rx_pos.x,
                record.rx_pos.y,
                record.rx_pos.z,
                record.reflector_pos.x,
                record.reflector_pos.y,
                record.reflector_pos.z,
                record.incidence,
                record.reflection,
                record.steering,
                record.reflection_error,
                record.class,
                record.dist_in,
                record.dist_out,
                record.dist_total,
            )?;
        }
        Ok(())
    }
}

/// Writes one summary row per evaluated height, in sweep order.
pub fn write_height_summary(summaries: &[HeightSummary], directory: &str) -> Result<()> {
    fs::create_dir_all(directory)?;
    let file = File::create(Path::new(directory).join("height_summary"))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# generated {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(writer, "height ratio_15 ratio_20 ratio_25 mean_distance")?;
    for summary in summaries {
        writeln!(
            writer,
            "{:.2} {:.2} {:.2} {:.2} {:.4}",
            summary.height,
            summary.ratio_15,
            summary.ratio_20,
            summary.ratio_25,
            summary.mean_distance,
        )?;
    }
    Ok(())
}

/// Writes the interference totals and top-K ranking as text, and the full
/// report as JSON.
pub fn write_interference(
    report: &InterferenceReport,
    top_k: usize,
    directory: &str,
) -> Result<()> {
    fs::create_dir_all(directory)?;

    let file = File::create(Path::new(directory).join("interference"))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# generated {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(writer, "total_links {}", report.total_links)?;
    writeln!(writer, "interfered_links {}", report.interfered_links)?;
    writeln!(writer, "ratio {:.4}", report.ratio())?;
    for (name, count) in report.top(top_k) {
        writeln!(writer, "{} {}", name, count)?;
    }

    let json = File::create(Path::new(directory).join("interference.json"))?;
    serde_json::to_writer_pretty(BufWriter::new(json), report)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn scratch_dir(tag: &str) -> String {
        let dir = std::env::temp_dir().join(format!("beamlink_{}_{}", tag, std::process::id()));
        dir.to_string_lossy().into_owned()
    }

    #[test]
    fn summary_and_detail_files_round_trip() {
        let dir = scratch_dir("sweep");
        let summary = HeightSummary {
            height: 1.5,
            ratio_15: 50.0,
            ratio_20: 100.0,
            ratio_25: 100.0,
            mean_distance: 12.345,
        };
        let record = crate::reflect::evaluate(
            0,
            1,
            0,
            &Point3::new(-1.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.5, 0.0),
            &nalgebra::Vector3::y(),
            5.0,
        );

        let mut writer = SweepWriter::new(
            &dir,
            vec!["tx-a".to_string(), "tx-b".to_string()],
            vec!["panel-0".to_string()],
        )
        .unwrap();
        writer.on_height(&summary, &[record]).unwrap();
        write_height_summary(std::slice::from_ref(&summary), &dir).unwrap();

        let detail = fs::read_to_string(Path::new(&dir).join("best_paths_1.50")).unwrap();
        assert!(detail.contains("tx-a tx-b panel-0"));
        assert!(detail.contains("specular"));

        let table = fs::read_to_string(Path::new(&dir).join("height_summary")).unwrap();
        assert!(table.contains("1.50 50.00 100.00 100.00 12.3450"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn interference_files_round_trip() {
        let dir = scratch_dir("interference");
        let mut report = InterferenceReport {
            total_links: 4,
            interfered_links: 1,
            ..Default::default()
        };
        report.interferers.insert("tx-c".to_string(), 1);

        write_interference(&report, 10, &dir).unwrap();

        let text = fs::read_to_string(Path::new(&dir).join("interference")).unwrap();
        assert!(text.contains("total_links 4"));
        assert!(text.contains("ratio 0.2500"));
        assert!(text.contains("tx-c 1"));

        let json = fs::read_to_string(Path::new(&dir).join("interference.json")).unwrap();
        assert!(json.contains("\"interfered_links\": 1"));

        fs::remove_dir_all(&dir).ok();
    }
}
