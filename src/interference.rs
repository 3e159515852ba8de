//! Beam-volume interference detection.
//!
//! For each generated link the two beam segments are realized as collision
//! volumes by the injected beam model, then tested against a pruned
//! candidate set of obstacle shapes. Pruning runs cheapest-first: disabled
//! shapes, category mask, bounding boxes, endpoint exclusion, and only then
//! the exact overlap query. Results aggregate per link and per run.

use std::collections::BTreeMap;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use nalgebra::Point3;
use serde::Serialize;

use crate::{
    aiming::aim,
    geom::{Scene, Transceiver},
    links::{generate_links, LinkDefinition, LinkRequest},
    settings::Settings,
    shapes::{BeamModel, BeamParams, OverlapQuery, ShapeHandle},
};

/// One leg of a reflected link, realized as a directed collision volume.
/// The exclusion pair holds the two transceivers the owning link connects;
/// a link must never flag interference against its own transmitter or
/// receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamSegment {
    pub start: Point3<f32>,
    pub end: Point3<f32>,
    pub excluded: (usize, usize),
    pub shape: Option<ShapeHandle>,
}

/// Both segment volumes of one link.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkVolumes {
    pub link: LinkDefinition,
    pub segments: [BeamSegment; 2],
}

/// A candidate obstacle shape, indexed to its owning transceiver root for
/// endpoint exclusion and interferer attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub shape: ShapeHandle,
    pub owner: usize,
}

/// The set of collision shapes eligible as interferers, built once per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    pub items: Vec<Candidate>,
}

impl CandidateSet {
    /// Collects candidate shapes from every transceiver root. With an
    /// aperture filter only shapes in the named sub-group qualify; a root
    /// with no matching shapes is excluded with a warning.
    pub fn build(transceivers: &[Transceiver], aperture_filter: Option<&str>) -> Self {
        let mut items = Vec::new();
        for (owner, transceiver) in transceivers.iter().enumerate() {
            match aperture_filter {
                Some(group) => {
                    let selected: Vec<&ShapeHandle> = transceiver
                        .shapes
                        .iter()
                        .filter(|s| s.group == group)
                        .collect();
                    if selected.is_empty() {
                        eprintln!(
                            "Warning: transceiver {} has no shapes in group '{}'; excluded from candidates",
                            transceiver.name, group
                        );
                        continue;
                    }
                    for shape in selected {
                        items.push(Candidate {
                            shape: shape.clone(),
                            owner,
                        });
                    }
                }
                None => {
                    for shape in &transceiver.shapes {
                        items.push(Candidate {
                            shape: shape.clone(),
                            owner,
                        });
                    }
                }
            }
        }
        Self { items }
    }
}

/// Interference outcome for one link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkOutcome {
    pub name: String,
    pub interferers: Vec<String>,
}

/// Corpus-wide interference statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterferenceReport {
    pub total_links: usize,
    pub interfered_links: usize,
    /// Interferer name -> number of flagged links it appears in.
    pub interferers: BTreeMap<String, usize>,
    pub links: Vec<LinkOutcome>,
}

impl InterferenceReport {
    pub fn ratio(&self) -> f32 {
        if self.total_links == 0 {
            0.0
        } else {
            self.interfered_links as f32 / self.total_links as f32
        }
    }

    /// Interferers ranked by hit count (descending), names breaking ties.
    pub fn top(&self, k: usize) -> Vec<(String, usize)> {
        self.interferers
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)))
            .take(k)
            .map(|(name, count)| (name.clone(), *count))
            .collect()
    }
}

/// Orchestrates one interference run: link generation, gimbal aiming,
/// volume construction, the shape-finalization fence, candidate-set
/// construction, and detection. Strictly sequential.
pub struct InterferenceRun<'a, M: BeamModel, Q: OverlapQuery> {
    pub scene: &'a mut Scene,
    pub settings: &'a Settings,
    pub model: M,
    pub query: Q,
    pub links: Vec<LinkDefinition>,
    pub volumes: Vec<LinkVolumes>,
    pub candidates: CandidateSet,
    pub report: InterferenceReport,
}

impl<'a, M: BeamModel, Q: OverlapQuery> InterferenceRun<'a, M, Q> {
    pub fn new(scene: &'a mut Scene, settings: &'a Settings, model: M, query: Q) -> Self {
        Self {
            scene,
            settings,
            model,
            query,
            links: Vec::new(),
            volumes: Vec::new(),
            candidates: CandidateSet::default(),
            report: InterferenceReport::default(),
        }
    }

    /// Runs all phases in order and returns the aggregated report.
    pub fn run(&mut self) -> Result<&InterferenceReport> {
        self.generate()?;
        self.aim_links();
        self.build_volumes()?;
        // Newly built shapes may finalize deferred; the fence must complete
        // before the candidate set is built and any overlap query runs.
        self.model.settle();
        self.build_candidates();
        self.detect();
        Ok(&self.report)
    }

    pub fn generate(&mut self) -> Result<()> {
        self.links = generate_links(&LinkRequest {
            transceivers: self.scene.transceivers.len(),
            reflectors: self.scene.assembly.reflectors.len(),
            count: self.settings.link_count,
            seed: self.settings.seed,
            unique_segments: self.settings.unique_links,
        })?;
        Ok(())
    }

    /// Points both endpoint gimbals of every link at its reflector.
    pub fn aim_links(&mut self) {
        let Scene {
            transceivers,
            assembly,
        } = &mut *self.scene;

        for link in &self.links {
            let Some(reflector) = assembly.reflectors.get(link.reflector) else {
                continue;
            };
            let target = reflector.position;
            aim(&mut transceivers[link.tx].gimbal, &target);
            aim(&mut transceivers[link.rx].gimbal, &target);
        }
    }

    /// Builds the two segment volumes per link through the beam model.
    /// Links whose reflector index does not resolve are warned about and
    /// dropped from the run totals.
    pub fn build_volumes(&mut self) -> Result<()> {
        let params = BeamParams {
            waist: self.settings.beam_waist,
            wavelength: self.settings.wavelength,
        };

        self.volumes.clear();
        for link in &self.links {
            let Some(reflector) = self.scene.assembly.reflectors.get(link.reflector) else {
                eprintln!(
                    "Warning: link {} references missing reflector {}; skipped",
                    link.name, link.reflector
                );
                continue;
            };

            let start = self.scene.transceivers[link.tx].aperture;
            let mid = reflector.position;
            let end = self.scene.transceivers[link.rx].aperture;
            let excluded = (link.tx, link.rx);

            let up = BeamSegment {
                start,
                end: mid,
                excluded,
                shape: Some(self.model.build(&start, &mid, &params)?),
            };
            let down = BeamSegment {
                start: mid,
                end,
                excluded,
                shape: Some(self.model.build(&mid, &end, &params)?),
            };

            self.volumes.push(LinkVolumes {
                link: link.clone(),
                segments: [up, down],
            });
        }
        Ok(())
    }

    pub fn build_candidates(&mut self) {
        self.candidates = CandidateSet::build(
            &self.scene.transceivers,
            self.settings.aperture_filter.as_deref(),
        );
    }

    /// Tests one segment against the candidate set and returns the owning
    /// roots of confirmed interferers.
    pub fn check_segment(&self, segment: &BeamSegment) -> Vec<usize> {
        let Some(shape) = &segment.shape else {
            return Vec::new();
        };
        if !shape.enabled {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for candidate in &self.candidates.items {
            if !candidate.shape.enabled {
                continue;
            }
            if candidate.shape.category & self.settings.category_mask == 0 {
                continue;
            }
            if !shape.aabb.intersects(&candidate.shape.aabb) {
                continue;
            }
            if candidate.owner == segment.excluded.0 || candidate.owner == segment.excluded.1 {
                continue;
            }
            if hits.contains(&candidate.owner) {
                continue;
            }
            if self.query.overlaps(shape, &candidate.shape) {
                hits.push(candidate.owner);
                if self.settings.early_exit {
                    break;
                }
            }
        }
        hits
    }

    /// Checks every link volume and aggregates the run report.
    pub fn detect(&mut self) {
        let pb = ProgressBar::new(self.volumes.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
            )
            .unwrap()
            .progress_chars("█▇▆▅▄▃▂▁"),
        );
        pb.set_message("link".to_string());

        let mut report = InterferenceReport {
            total_links: self.volumes.len(),
            ..Default::default()
        };

        for volume in &self.volumes {
            let mut owners: Vec<usize> = Vec::new();
            for segment in &volume.segments {
                for owner in self.check_segment(segment) {
                    if !owners.contains(&owner) {
                        owners.push(owner);
                    }
                }
            }

            if !owners.is_empty() {
                report.interfered_links += 1;
                let names: Vec<String> = owners
                    .iter()
                    .map(|&owner| self.scene.transceivers[owner].name.clone())
                    .collect();
                for name in &names {
                    *report.interferers.entry(name.clone()).or_insert(0) += 1;
                }
                report.links.push(LinkOutcome {
                    name: volume.link.name.clone(),
                    interferers: names,
                });
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        self.report = report;
    }
}
