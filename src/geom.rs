use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::shapes::ShapeHandle;


/// A steerable gimbal pivot with a world position and a rotation command.
/// For the yaw stage the rotation is a world orientation; for the pitch
/// stage it is a local rotation beneath the yaw frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub position: Point3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Pivot {
    pub fn new(position: Point3<f32>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// A two-stage gimbal: a yaw pivot and, beneath it, a pitch pivot.
/// Either pivot may be absent; aiming skips the missing stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gimbal {
    pub yaw: Option<Pivot>,
    pub pitch: Option<Pivot>,
}

/// A transceiver root: a positioned node with an aperture reference point
/// used for beam endpoints, an aiming gimbal, and the collision shapes
/// resolved beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transceiver {
    pub name: String,
    pub position: Point3<f32>,
    pub aperture: Point3<f32>,
    pub gimbal: Gimbal,
    pub shapes: Vec<ShapeHandle>,
}

/// A reflecting element with a local-space normal carried into world space
/// by the node's orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflector {
    pub name: String,
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl Reflector {
    pub fn world_normal(&self) -> Vector3<f32> {
        self.orientation * self.normal
    }
}

/// The reflecting assembly: all reflectors move together as a rigid body
/// when the structural height changes. Relative geometry and normals are
/// unchanged by translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub reflectors: Vec<Reflector>,
    pub height: f32,
}

impl Assembly {
    /// Translates the whole assembly vertically so that its structural
    /// height becomes `target`.
    pub fn set_height(&mut self, target: f32) {
        let delta = target - self.height;
        if delta != 0.0 {
            for reflector in &mut self.reflectors {
                reflector.position.y += delta;
            }
        }
        self.height = target;
    }

    /// Snapshot of the current reflector positions, used for exact
    /// restoration after a sweep.
    pub fn positions(&self) -> Vec<Point3<f32>> {
        self.reflectors.iter().map(|r| r.position).collect()
    }

    /// Writes back a position snapshot verbatim. Translation deltas are not
    /// reversed arithmetically because repeated float adds need not
    /// round-trip.
    pub fn restore(&mut self, height: f32, positions: &[Point3<f32>]) {
        for (reflector, position) in self.reflectors.iter_mut().zip(positions) {
            reflector.position = *position;
        }
        self.height = height;
    }
}

/// A resolved scene: transceiver roots and the reflecting assembly.
/// Scene-graph discovery happens outside the core; this type only holds
/// already-resolved nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub transceivers: Vec<Transceiver>,
    pub assembly: Assembly,
}

impl Scene {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Scene> {
        let raw = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read scene layout {:?}", path.as_ref())
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Scene> {
        let layout: SceneLayout =
            toml::from_str(raw).context("Failed to parse scene layout")?;

        let transceivers = layout
            .transceivers
            .into_iter()
            .map(|t| Transceiver {
                name: t.name,
                position: t.position,
                aperture: t.aperture,
                gimbal: Gimbal {
                    yaw: t.yaw_pivot.map(Pivot::new),
                    pitch: t.pitch_pivot.map(Pivot::new),
                },
                shapes: t.shapes,
            })
            .collect();

        let reflectors = layout
            .assembly
            .reflectors
            .into_iter()
            .map(|r| {
                let [rx, ry, rz] = r.orientation_deg;
                Reflector {
                    name: r.name,
                    position: r.position,
                    normal: r.normal,
                    orientation: UnitQuaternion::from_euler_angles(
                        rx.to_radians(),
                        ry.to_radians(),
                        rz.to_radians(),
                    ),
                }
            })
            .collect();

        Ok(Scene {
            transceivers,
            assembly: Assembly {
                reflectors,
                height: layout.assembly.height,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct SceneLayout {
    transceivers: Vec<TransceiverLayout>,
    assembly: AssemblyLayout,
}

#[derive(Debug, Deserialize)]
struct TransceiverLayout {
    name: String,
    position: Point3<f32>,
    aperture: Point3<f32>,
    yaw_pivot: Option<Point3<f32>>,
    pitch_pivot: Option<Point3<f32>>,
    #[serde(default)]
    shapes: Vec<ShapeHandle>,
}

#[derive(Debug, Deserialize)]
struct AssemblyLayout {
    height: f32,
    reflectors: Vec<ReflectorLayout>,
}

#[derive(Debug, Deserialize)]
struct ReflectorLayout {
    name: String,
    position: Point3<f32>,
    normal: Vector3<f32>,
    #[serde(default)]
    orientation_deg: [f32; 3],
}
