//! Height-sweep orchestration and per-height summary reduction.
//!
//! Repeats evaluation and best-path aggregation across a list of target
//! structural heights, translating the reflecting assembly for each one.
//! The sweep is strictly sequential because each iteration mutates shared
//! assembly position state that must be settled before geometry evaluation
//! reads it. The pre-sweep assembly position is restored on every exit
//! path, including sink errors and panics.

use std::fmt;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::Point3;
use serde::Serialize;

use crate::{
    best::BestPathTable,
    geom::{Assembly, Reflector, Transceiver},
    reflect::{evaluate, PathRecord},
    settings::{Settings, STEERING_THRESHOLDS},
};

/// Receives each height's summary and surviving best-path records.
/// Report emission is a collaborator concern; the file-writing sink lives
/// in `output.rs`.
pub trait SweepSink {
    fn on_height(&mut self, summary: &HeightSummary, records: &[PathRecord]) -> Result<()>;
}

/// Sink that discards all rows.
impl SweepSink for () {
    fn on_height(&mut self, _summary: &HeightSummary, _records: &[PathRecord]) -> Result<()> {
        Ok(())
    }
}

/// One row per evaluated height, appended in sweep order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeightSummary {
    pub height: f32,
    pub ratio_15: f32,
    pub ratio_20: f32,
    pub ratio_25: f32,
    pub mean_distance: f32,
}

impl HeightSummary {
    /// Reduces a snapshot of best-path records into the summary row.
    /// An empty snapshot yields zeros for all ratios and the mean.
    pub fn reduce(height: f32, records: &[PathRecord]) -> Self {
        if records.is_empty() {
            return Self {
                height,
                ratio_15: 0.0,
                ratio_20: 0.0,
                ratio_25: 0.0,
                mean_distance: 0.0,
            };
        }
        let total = records.len() as f32;
        let ratio = |threshold: f32| {
            100.0 * records.iter().filter(|r| r.steering <= threshold).count() as f32 / total
        };
        let [ratio_15, ratio_20, ratio_25] = STEERING_THRESHOLDS.map(ratio);
        let mean_distance = records.iter().map(|r| r.dist_total).sum::<f32>() / total;

        Self {
            height,
            ratio_15,
            ratio_20,
            ratio_25,
            mean_distance,
        }
    }
}

impl fmt::Display for HeightSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "h = {:.2}: <=15 deg {:.2}%, <=20 deg {:.2}%, <=25 deg {:.2}%, mean distance {:.3}",
            self.height, self.ratio_15, self.ratio_20, self.ratio_25, self.mean_distance
        )
    }
}

/// Summary rows of a completed sweep, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub summaries: Vec<HeightSummary>,
}

/// Restores the exact pre-sweep assembly position when dropped.
/// Restoration writes back the snapshot verbatim, so it holds bit-exactly
/// on success, error, and panic paths alike.
pub struct AssemblyGuard<'a> {
    assembly: &'a mut Assembly,
    saved_height: f32,
    saved_positions: Vec<Point3<f32>>,
}

impl<'a> AssemblyGuard<'a> {
    pub fn new(assembly: &'a mut Assembly) -> Self {
        let saved_height = assembly.height;
        let saved_positions = assembly.positions();
        Self {
            assembly,
            saved_height,
            saved_positions,
        }
    }

    pub fn assembly(&mut self) -> &mut Assembly {
        self.assembly
    }

    pub fn reflectors(&self) -> &[Reflector] {
        &self.assembly.reflectors
    }

    pub fn height(&self) -> f32 {
        self.assembly.height
    }
}

impl Drop for AssemblyGuard<'_> {
    fn drop(&mut self) {
        let positions = std::mem::take(&mut self.saved_positions);
        self.assembly.restore(self.saved_height, &positions);
    }
}

/// Orchestrates evaluation and aggregation across target heights.
pub struct HeightSweep<'a> {
    transceivers: &'a [Transceiver],
    assembly: &'a mut Assembly,
    heights: Vec<f32>,
    tolerance: f32,
    table: BestPathTable,
}

impl<'a> HeightSweep<'a> {
    pub fn new(
        transceivers: &'a [Transceiver],
        assembly: &'a mut Assembly,
        settings: &Settings,
    ) -> Result<Self> {
        if transceivers.len() < 2 {
            bail!(
                "height sweep requires at least 2 transceivers, got {}",
                transceivers.len()
            );
        }
        if assembly.reflectors.is_empty() {
            bail!("height sweep requires at least 1 reflector");
        }

        Ok(Self {
            transceivers,
            assembly,
            heights: settings.heights.clone(),
            tolerance: settings.steering_tolerance,
            table: BestPathTable::new(),
        })
    }

    /// Runs the sweep. With an empty height list the single current height
    /// is evaluated without translation.
    pub fn run(&mut self, sink: &mut dyn SweepSink) -> Result<SweepReport> {
        let mut guard = AssemblyGuard::new(self.assembly);

        let targets = if self.heights.is_empty() {
            vec![guard.height()]
        } else {
            self.heights.clone()
        };

        let pb = ProgressBar::new(targets.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
            )
            .unwrap()
            .progress_chars("█▇▆▅▄▃▂▁"),
        );
        pb.set_message("height".to_string());

        let mut summaries = Vec::with_capacity(targets.len());
        for &height in &targets {
            guard.assembly().set_height(height);
            self.table.reset();

            for (i, tx) in self.transceivers.iter().enumerate() {
                for (j, rx) in self.transceivers.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    for (k, reflector) in guard.reflectors().iter().enumerate() {
                        let record = evaluate(
                            i,
                            j,
                            k,
                            &tx.position,
                            &rx.position,
                            &reflector.position,
                            &reflector.world_normal(),
                            self.tolerance,
                        );
                        self.table.offer(record);
                    }
                }
            }

            let records: Vec<PathRecord> = self.table.snapshot().cloned().collect();
            let summary = HeightSummary::reduce(height, &records);
            sink.on_height(&summary, &records)?;
            summaries.push(summary);
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(SweepReport { summaries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Gimbal;
    use anyhow::anyhow;
    use nalgebra::{UnitQuaternion, Vector3};

    fn transceiver(name: &str, position: Point3<f32>) -> Transceiver {
        Transceiver {
            name: name.to_string(),
            position,
            aperture: position,
            gimbal: Gimbal::default(),
            shapes: Vec::new(),
        }
    }

    fn test_scene() -> (Vec<Transceiver>, Assembly) {
        // Off-centre reflector with a vertical normal: the steering angle
        // is atan(h / 0.4) - atan(h / 1.6), which grows from ~10.5 deg at
        // h = 0.1 to ~23.1 deg at h = 0.25.
        let transceivers = vec![
            transceiver("tx-a", Point3::new(-1.0, 0.0, 0.0)),
            transceiver("tx-b", Point3::new(1.0, 0.0, 0.0)),
        ];
        let assembly = Assembly {
            reflectors: vec![Reflector {
                name: "panel-0".to_string(),
                position: Point3::new(0.6, 0.1, 0.0),
                normal: Vector3::y(),
                orientation: UnitQuaternion::identity(),
            }],
            height: 0.1,
        };
        (transceivers, assembly)
    }

    fn test_settings(heights: Vec<f32>) -> Settings {
        Settings {
            wavelength: 1.55e-6,
            beam_waist: 0.01,
            steering_tolerance: 5.0,
            heights,
            link_count: 5,
            unique_links: true,
            seed: Some(1),
            aperture_filter: None,
            category_mask: u32::MAX,
            early_exit: false,
            top_k: 10,
            scene_name: String::new(),
            directory: ".".to_string(),
        }
    }

    #[test]
    fn two_height_sweep_summary() {
        let (transceivers, mut assembly) = test_scene();
        let settings = test_settings(vec![0.1, 0.25]);

        let mut sweep = HeightSweep::new(&transceivers, &mut assembly, &settings).unwrap();
        let report = sweep.run(&mut ()).unwrap();

        assert_eq!(report.summaries.len(), 2);

        let first = &report.summaries[0];
        assert_eq!(first.height, 0.1);
        assert_eq!(first.ratio_15, 100.0);
        assert_eq!(first.ratio_20, 100.0);
        assert_eq!(first.ratio_25, 100.0);
        assert!(first.mean_distance > 0.0);

        let second = &report.summaries[1];
        assert_eq!(second.height, 0.25);
        assert_eq!(second.ratio_15, 0.0);
        assert_eq!(second.ratio_20, 0.0);
        assert_eq!(second.ratio_25, 100.0);
        assert!(second.mean_distance > first.mean_distance);
    }

    #[test]
    fn empty_height_list_evaluates_current_height() {
        let (transceivers, mut assembly) = test_scene();
        let settings = test_settings(vec![]);

        let mut sweep = HeightSweep::new(&transceivers, &mut assembly, &settings).unwrap();
        let report = sweep.run(&mut ()).unwrap();

        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].height, 0.1);
    }

    #[test]
    fn position_restored_after_success() {
        let (transceivers, mut assembly) = test_scene();
        let before = assembly.positions();
        let settings = test_settings(vec![0.7, 2.3, 0.4]);

        let mut sweep = HeightSweep::new(&transceivers, &mut assembly, &settings).unwrap();
        sweep.run(&mut ()).unwrap();

        assert_eq!(assembly.positions(), before);
        assert_eq!(assembly.height, 0.1);
    }

    struct FailingSink {
        remaining: usize,
    }

    impl SweepSink for FailingSink {
        fn on_height(&mut self, _: &HeightSummary, _: &[PathRecord]) -> Result<()> {
            if self.remaining == 0 {
                return Err(anyhow!("sink failed"));
            }
            self.remaining -= 1;
            Ok(())
        }
    }

    #[test]
    fn position_restored_after_fault() {
        let (transceivers, mut assembly) = test_scene();
        let before = assembly.positions();
        let settings = test_settings(vec![0.7, 2.3, 0.4]);

        let mut sweep = HeightSweep::new(&transceivers, &mut assembly, &settings).unwrap();
        let result = sweep.run(&mut FailingSink { remaining: 1 });

        assert!(result.is_err());
        assert_eq!(assembly.positions(), before);
        assert_eq!(assembly.height, 0.1);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let (transceivers, mut assembly) = test_scene();
        let settings = test_settings(vec![]);

        let one = &transceivers[..1];
        assert!(HeightSweep::new(one, &mut assembly, &settings).is_err());

        let mut empty = Assembly {
            reflectors: Vec::new(),
            height: 0.0,
        };
        assert!(HeightSweep::new(&transceivers, &mut empty, &settings).is_err());
    }

    #[test]
    fn summary_reduction_handles_empty_snapshot() {
        let summary = HeightSummary::reduce(1.5, &[]);
        assert_eq!(summary.ratio_15, 0.0);
        assert_eq!(summary.ratio_20, 0.0);
        assert_eq!(summary.ratio_25, 0.0);
        assert_eq!(summary.mean_distance, 0.0);
    }
}
