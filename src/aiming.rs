//! Orientation commands pointing a two-stage gimbal at a target position.

use nalgebra::{Point3, UnitQuaternion, Vector3};

use crate::geom::Gimbal;
use crate::settings::HORIZONTAL_EPSILON;

/// Aims a gimbal at a world-space target.
///
/// The yaw pivot is oriented to look along the horizontal (y-zeroed)
/// direction to the target with world up as the reference axis; below
/// `HORIZONTAL_EPSILON` the yaw stage is left unchanged. The pitch pivot
/// receives the local rotation `(-pitch, 0, 0)` where
/// `pitch = atan2(local.y, local.z)` in degrees and `local` is the
/// pivot-to-target direction expressed in the yaw frame. A missing pivot
/// skips its stage; aiming is never an error.
pub fn aim(gimbal: &mut Gimbal, target: &Point3<f32>) {
    if let Some(yaw) = gimbal.yaw.as_mut() {
        let mut horizontal = target - yaw.position;
        horizontal.y = 0.0;
        if horizontal.norm() > HORIZONTAL_EPSILON {
            yaw.rotation = UnitQuaternion::face_towards(&horizontal, &Vector3::y());
        }
    }

    let yaw_frame = gimbal
        .yaw
        .as_ref()
        .map(|p| p.rotation)
        .unwrap_or_else(UnitQuaternion::identity);

    if let Some(pitch) = gimbal.pitch.as_mut() {
        let direction = target - pitch.position;
        let local = yaw_frame.inverse_transform_vector(&direction);
        let pitch_deg = local.y.atan2(local.z).to_degrees();
        pitch.rotation =
            UnitQuaternion::from_euler_angles((-pitch_deg).to_radians(), 0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Pivot;

    fn gimbal_at_origin() -> Gimbal {
        Gimbal {
            yaw: Some(Pivot::new(Point3::origin())),
            pitch: Some(Pivot::new(Point3::origin())),
        }
    }

    #[test]
    fn yaw_faces_horizontal_direction() {
        let mut gimbal = gimbal_at_origin();
        aim(&mut gimbal, &Point3::new(3.0, 4.0, 0.0));

        // yaw ignores the vertical component: local forward maps to +x
        let forward = gimbal.yaw.as_ref().unwrap().rotation * Vector3::z();
        assert!((forward - Vector3::x()).norm() < 1e-5, "forward: {:?}", forward);
    }

    #[test]
    fn pitch_matches_target_elevation() {
        let mut gimbal = gimbal_at_origin();
        aim(&mut gimbal, &Point3::new(3.0, 4.0, 0.0));

        // in the yaw frame the target sits at (0, 4, 3): 53.13 deg up
        let (roll, _, _) = gimbal.pitch.as_ref().unwrap().rotation.euler_angles();
        let expected = -(4.0_f32.atan2(3.0));
        assert!((roll - expected).abs() < 1e-4, "roll: {}", roll);
    }

    #[test]
    fn vertical_target_leaves_yaw_unchanged() {
        let mut gimbal = gimbal_at_origin();
        let before = gimbal.yaw.as_ref().unwrap().rotation;
        aim(&mut gimbal, &Point3::new(0.0, 5.0, 0.0));

        assert_eq!(gimbal.yaw.as_ref().unwrap().rotation, before);
        // pitch still aims straight up
        let (roll, _, _) = gimbal.pitch.as_ref().unwrap().rotation.euler_angles();
        assert!((roll - (-std::f32::consts::FRAC_PI_2)).abs() < 1e-4);
    }

    #[test]
    fn missing_pivots_soft_skip() {
        let mut none = Gimbal::default();
        aim(&mut none, &Point3::new(1.0, 2.0, 3.0));
        assert_eq!(none, Gimbal::default());

        let mut yaw_only = Gimbal {
            yaw: Some(Pivot::new(Point3::origin())),
            pitch: None,
        };
        aim(&mut yaw_only, &Point3::new(1.0, 0.0, 0.0));
        assert!(yaw_only.pitch.is_none());
        let forward = yaw_only.yaw.as_ref().unwrap().rotation * Vector3::z();
        assert!((forward - Vector3::x()).norm() < 1e-5);
    }
}
