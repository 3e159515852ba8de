//! Collision-shape handles and the injected physics capabilities.
//!
//! The core never builds or interprets collision geometry. It sees opaque
//! shape handles with world-space bounds and delegates both beam-volume
//! construction and the exact overlap test to collaborator traits. The
//! shipped stand-ins let the binary and the tests run without a physics
//! engine behind them.

use std::f32::consts::PI;

use anyhow::{ensure, Result};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box used for cheap rejection before exact
/// overlap queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    /// Smallest box containing both points, grown by `margin` on all sides.
    pub fn around(a: &Point3<f32>, b: &Point3<f32>, margin: f32) -> Self {
        let min = Point3::new(
            a.x.min(b.x) - margin,
            a.y.min(b.y) - margin,
            a.z.min(b.z) - margin,
        );
        let max = Point3::new(
            a.x.max(b.x) + margin,
            a.y.max(b.y) + margin,
            a.z.max(b.z) + margin,
        );
        Self { min, max }
    }

    /// Inclusive intersection test; touching boxes count as intersecting.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Opaque handle to an engine-side collision shape at its current world
/// transform. The underlying geometry stays with the engine; the core only
/// reads the flags and bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeHandle {
    pub id: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_category")]
    pub category: u32,
    /// Sub-node label beneath the owning root, used by the aperture-only
    /// candidate filter.
    #[serde(default)]
    pub group: String,
    pub aabb: Aabb,
}

fn default_enabled() -> bool {
    true
}

fn default_category() -> u32 {
    1
}

/// Exact shape-overlap primitive, injected from the physics engine.
/// Implementations must test true intersection at the current world
/// transforms, not a bounding-volume approximation.
pub trait OverlapQuery {
    fn overlaps(&self, a: &ShapeHandle, b: &ShapeHandle) -> bool;
}

impl<F> OverlapQuery for F
where
    F: Fn(&ShapeHandle, &ShapeHandle) -> bool,
{
    fn overlaps(&self, a: &ShapeHandle, b: &ShapeHandle) -> bool {
        self(a, b)
    }
}

/// Overlap stand-in that is exact for axis-aligned boxes.
#[derive(Debug, Default)]
pub struct BoxOverlap;

impl OverlapQuery for BoxOverlap {
    fn overlaps(&self, a: &ShapeHandle, b: &ShapeHandle) -> bool {
        a.aabb.intersects(&b.aabb)
    }
}

/// Physical beam parameters passed through to the beam model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamParams {
    pub waist: f32,
    pub wavelength: f32,
}

/// Builds beam collision volumes from segment endpoints. Engines may
/// finalize newly created shapes asynchronously; `settle` is the barrier
/// that must complete before any overlap query touches the new shapes.
pub trait BeamModel {
    fn build(
        &mut self,
        start: &Point3<f32>,
        end: &Point3<f32>,
        params: &BeamParams,
    ) -> Result<ShapeHandle>;

    /// Flushes deferred shape finalization. Synchronous stand-ins have
    /// nothing to wait for.
    fn settle(&mut self);
}

/// Gaussian beam radius after propagating `distance` from the waist.
pub fn beam_radius(distance: f32, params: &BeamParams) -> f32 {
    let spread = distance * params.wavelength / (PI * params.waist * params.waist);
    params.waist * (1.0 + spread * spread).sqrt()
}

/// Beam-model stand-in producing the axis-aligned envelope of the segment,
/// inflated by the far-end Gaussian beam radius.
#[derive(Debug, Default)]
pub struct EnvelopeBeamModel {
    next_id: u64,
}

impl BeamModel for EnvelopeBeamModel {
    fn build(
        &mut self,
        start: &Point3<f32>,
        end: &Point3<f32>,
        params: &BeamParams,
    ) -> Result<ShapeHandle> {
        ensure!(params.waist > 0.0, "beam waist must be positive");
        ensure!(params.wavelength > 0.0, "wavelength must be positive");

        let length = (end - start).norm();
        let radius = beam_radius(length, params);
        self.next_id += 1;

        Ok(ShapeHandle {
            id: self.next_id,
            enabled: true,
            category: 0,
            group: "beam".to_string(),
            aabb: Aabb::around(start, end, radius),
        })
    }

    fn settle(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_intersection() {
        let a = Aabb::around(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0), 0.0);
        let b = Aabb::around(&Point3::new(0.5, 0.5, 0.5), &Point3::new(2.0, 2.0, 2.0), 0.0);
        let c = Aabb::around(&Point3::new(3.0, 3.0, 3.0), &Point3::new(4.0, 4.0, 4.0), 0.0);

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));

        // touching faces intersect
        let d = Aabb::around(&Point3::new(1.0, 0.0, 0.0), &Point3::new(2.0, 1.0, 1.0), 0.0);
        assert!(a.intersects(&d));
    }

    #[test]
    fn beam_radius_grows_with_distance() {
        let params = BeamParams {
            waist: 0.01,
            wavelength: 1.55e-6,
        };
        let near = beam_radius(0.0, &params);
        let far = beam_radius(500.0, &params);

        assert_eq!(near, params.waist);
        assert!(far > near);
    }

    #[test]
    fn envelope_model_covers_both_endpoints() {
        let mut model = EnvelopeBeamModel::default();
        let params = BeamParams {
            waist: 0.01,
            wavelength: 1.55e-6,
        };
        let start = Point3::new(-1.0, 2.0, 0.0);
        let end = Point3::new(4.0, 0.5, 3.0);

        let shape = model.build(&start, &end, &params).unwrap();

        assert!(shape.enabled);
        assert!(shape.aabb.min.x < -1.0 && shape.aabb.max.x > 4.0);
        assert!(shape.aabb.min.y < 0.5 && shape.aabb.max.y > 2.0);

        let second = model.build(&start, &end, &params).unwrap();
        assert_ne!(shape.id, second.id);
    }

    #[test]
    fn invalid_beam_parameters_are_rejected() {
        let mut model = EnvelopeBeamModel::default();
        let bad = BeamParams {
            waist: 0.0,
            wavelength: 1.55e-6,
        };
        assert!(model
            .build(&Point3::origin(), &Point3::new(1.0, 0.0, 0.0), &bad)
            .is_err());
    }
}
