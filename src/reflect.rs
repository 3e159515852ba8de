//! Reflection geometry for a single (transmitter, reflector, receiver) triple.

use std::fmt;

use nalgebra::{Point3, Vector3};

use crate::settings::VEC_LENGTH_THRESHOLD;

/// Classification of a path by its steering angle against the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Specular,
    Steering,
}

impl fmt::Display for PathClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathClass::Specular => write!(f, "specular"),
            PathClass::Steering => write!(f, "steering"),
        }
    }
}

/// Result of evaluating one (transmitter, reflector, receiver) triple.
/// Angles are in degrees and lie in [0, 180]; distances are Euclidean.
/// Created once per evaluation and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PathRecord {
    pub tx: usize,
    pub rx: usize,
    pub reflector: usize,
    pub tx_pos: Point3<f32>,
    pub rx_pos: Point3<f32>,
    pub reflector_pos: Point3<f32>,
    pub incidence: f32,
    pub reflection: f32,
    pub steering: f32,
    pub reflection_error: f32,
    pub class: PathClass,
    pub dist_in: f32,
    pub dist_out: f32,
    pub dist_total: f32,
}

/// Evaluates the reflection geometry of one triple.
///
/// The ideal outgoing direction is the mirror of the *un-negated* incoming
/// direction about the reflector normal, so it represents the direction a
/// specularly reflected ray continues along. The formula `d - 2(d.n)n` is
/// invariant under `n -> -n`, so the sign of the supplied normal does not
/// matter.
///
/// Coincident nodes make a direction degenerate; angles then clamp to zero
/// with a warning rather than propagating NaN.
pub fn evaluate(
    tx: usize,
    rx: usize,
    reflector: usize,
    tx_pos: &Point3<f32>,
    rx_pos: &Point3<f32>,
    reflector_pos: &Point3<f32>,
    normal: &Vector3<f32>,
    tolerance: f32,
) -> PathRecord {
    let incoming = reflector_pos - tx_pos;
    let outgoing = rx_pos - reflector_pos;
    let dist_in = incoming.norm();
    let dist_out = outgoing.norm();

    let (incidence, reflection, steering) =
        if dist_in < VEC_LENGTH_THRESHOLD || dist_out < VEC_LENGTH_THRESHOLD {
            eprintln!(
                "Warning: degenerate path geometry for ({}, {}, {}); angles clamped to zero",
                tx, reflector, rx
            );
            (0.0, 0.0, 0.0)
        } else {
            let incoming = incoming / dist_in;
            let outgoing = outgoing / dist_out;
            let incidence = (-incoming).angle(normal).to_degrees();
            let reflection = outgoing.angle(normal).to_degrees();
            let ideal = incoming - 2.0 * incoming.dot(normal) * normal;
            let steering = ideal.angle(&outgoing).to_degrees();
            (incidence, reflection, steering)
        };

    let class = if steering <= tolerance {
        PathClass::Specular
    } else {
        PathClass::Steering
    };

    PathRecord {
        tx,
        rx,
        reflector,
        tx_pos: *tx_pos,
        rx_pos: *rx_pos,
        reflector_pos: *reflector_pos,
        incidence,
        reflection,
        steering,
        reflection_error: (incidence - reflection).abs(),
        class,
        dist_in,
        dist_out,
        dist_total: dist_in + dist_out,
    }
}
