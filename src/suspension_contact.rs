// ==============================================================================
// suspension_contact.rs - RAYCAST SUSPENSION + CONTACT PATCH KINEMATICS
// ------------------------------------------------------------------------------
// Per-wheel raycasts against the scene. Each grounded wheel yields a
// SuspensionContact:
// - geometry: hit_point, ground_normal, application point
// - suspension state: compression (m and 0..1), velocity, spring+damper load
// - kinematics: contact point velocity (linvel + w x r)
// - wheel basis (forward/side) rotated by the last steer command
// - slip components (v_long, v_lat) for the tire pass in physics.rs
//
// This file does NOT apply impulses. It only measures and builds the
// WheelSensor / BodySensor the drivetrain core reads each tick.
// ==============================================================================

use rapier3d::na::{Unit, UnitQuaternion};
use rapier3d::prelude::*;

use crate::drivetrain::config::VehicleConfig;
use crate::drivetrain::types::{BodySensor, WheelId, WheelSensor, GRAVITY};

/// Ray origin sits this far above the mount point.
const RAY_CLEARANCE: Real = 0.02;
/// Suspension velocities below this are treated as zero.
const DAMPER_DEADZONE: f32 = 0.05;
/// Static sag as a fraction of suspension travel.
const STATIC_SAG_FRACTION: f32 = 0.35;
const DAMPING_RATIO: f32 = 0.45;

/// Chassis-mounted wheel plus the host-side spin state the core reads back.
#[derive(Debug, Clone)]
pub struct WheelMount {
    pub id: WheelId,
    pub offset: Point<Real>,     // chassis local
    pub rest_length: Real,
    pub max_length: Real,
    pub radius: Real,
    pub stiffness: Real,
    pub damping: Real,

    // integrated by the host between ticks
    pub spin_rpm: f32,
    pub forward_slip: f32,
    pub sideways_slip: f32,
    pub steer_angle: f32,
}

#[derive(Debug, Clone)]
pub struct SuspensionContact {
    pub id: WheelId,

    // geometry
    pub hit_point: Point<Real>,
    pub apply_point: Point<Real>,
    pub ground_normal: Vector<Real>,

    // suspension state
    pub compression: f32,
    pub compression_ratio: f32,
    pub suspension_vel: f32,
    pub normal_force: f32,

    // kinematics
    pub point_vel: Vector<Real>,

    // wheel basis (world)
    pub forward: Vector<Real>,
    pub side: Vector<Real>,

    // slip
    pub v_long: f32,
    pub v_lat: f32,
}

/// Spring + clamped damper, never pulling the chassis down.
pub(crate) fn compute_suspension_force(compression: f32, suspension_vel: f32, k: f32, c: f32) -> f32 {
    let v = if suspension_vel.abs() < DAMPER_DEADZONE { 0.0 } else { suspension_vel };

    // soften rebound
    let v = if v > 0.0 { v * 0.4 } else { v };

    let spring = k * compression;
    let damper = (-c * v).clamp(-spring * 0.6, spring * 0.6);

    (spring + damper).max(0.0)
}

/// Spring rate and damper from a target static sag; returns (k, c) per wheel.
pub fn suspension_from_sag(mass: f32, wheels: f32, sag: f32, zeta: f32) -> (f32, f32) {
    let m_corner = mass / wheels.max(1.0);
    let k = m_corner * GRAVITY / sag.max(1e-3);
    let c = 2.0 * zeta * (k * m_corner).sqrt();
    (k, c)
}

/// Lays the four wheels out under the chassis box described by `config`.
pub fn build_wheel_mounts(config: &VehicleConfig) -> [WheelMount; 4] {
    let [hx, hy, hz] = config.chassis.half_extents;
    let track = (hx - 0.1).max(0.3);
    let axle = hz * 0.7;

    WheelId::ALL.map(|id| {
        let (radius, travel) = config
            .wheel(id)
            .map(|w| (w.radius, w.suspension_distance))
            .unwrap_or((
                crate::drivetrain::config::DEFAULT_WHEEL_RADIUS,
                crate::drivetrain::config::DEFAULT_SUSPENSION_DISTANCE,
            ));
        let (k, c) = suspension_from_sag(config.chassis.mass, 4.0, travel * STATIC_SAG_FRACTION, DAMPING_RATIO);
        let x = if id.is_left() { track } else { -track };
        let z = if id.is_front() { axle } else { -axle };

        WheelMount {
            id,
            offset: point![x, -hy, z],
            rest_length: travel,
            max_length: travel,
            radius,
            stiffness: k,
            damping: c,
            spin_rpm: 0.0,
            forward_slip: 0.0,
            sideways_slip: 0.0,
            steer_angle: 0.0,
        }
    })
}

/// v(p) = v_com + w x (p - com)
#[inline]
pub fn point_velocity(linvel: Vector<Real>, angvel: Vector<Real>, com: Point<Real>, p: Point<Real>) -> Vector<Real> {
    linvel + angvel.cross(&(p.coords - com.coords))
}

/// (forward, side) of a wheel in world space. Positive steer turns right.
pub fn wheel_basis_world(rot: &UnitQuaternion<Real>, steer_angle: f32) -> (Vector<Real>, Vector<Real>) {
    let up = rot * Vector::y();
    let chassis_fwd = rot * Vector::z();
    let steer = UnitQuaternion::from_axis_angle(&Unit::new_normalize(up), -steer_angle);
    let forward = steer * chassis_fwd;
    let side = up.cross(&forward).normalize();
    (forward, side)
}

#[inline]
pub fn slip_components(point_vel: Vector<Real>, forward: Vector<Real>, side: Vector<Real>) -> (f32, f32) {
    (point_vel.dot(&forward), point_vel.dot(&side))
}

pub fn build_suspension_contact(
    wheel: &WheelMount,
    body_ro: &RigidBody,
    query: &QueryPipeline,
    bodies: &RigidBodySet,
    colliders: &ColliderSet,
    handle: RigidBodyHandle,
) -> Option<SuspensionContact> {
    let pos = body_ro.position();
    let rot = pos.rotation;
    let linvel = *body_ro.linvel();
    let angvel = *body_ro.angvel();
    let com = *body_ro.center_of_mass();

    let ground_n = vector![0.0, 1.0, 0.0];
    let dir = -(rot * Vector::y());
    let origin = pos * (wheel.offset + vector![0.0, RAY_CLEARANCE, 0.0]);

    let ray = Ray::new(origin, dir);
    let max_dist = wheel.rest_length + wheel.radius + RAY_CLEARANCE;
    let filter = QueryFilter::default().exclude_rigid_body(handle);

    let (_hit, toi) = query.cast_ray(bodies, colliders, &ray, max_dist, true, filter)?;
    if toi <= RAY_CLEARANCE {
        return None;
    }

    let hit_point = origin + dir * toi;
    let suspension_length = toi - wheel.radius - RAY_CLEARANCE;
    let compression = (wheel.rest_length - suspension_length).clamp(0.0, wheel.max_length);
    if compression <= 0.0 {
        return None;
    }

    let point_vel = point_velocity(linvel, angvel, com, hit_point);
    let suspension_vel = point_vel.dot(&ground_n);
    let normal_force = compute_suspension_force(compression, suspension_vel, wheel.stiffness, wheel.damping);

    let (forward, side) = wheel_basis_world(&rot, wheel.steer_angle);
    let (v_long, v_lat) = slip_components(point_vel, forward, side);

    Some(SuspensionContact {
        id: wheel.id,
        hit_point,
        apply_point: hit_point + ground_n * (wheel.radius * 0.25),
        ground_normal: ground_n,
        compression,
        compression_ratio: compression / wheel.max_length,
        suspension_vel,
        normal_force,
        point_vel,
        forward,
        side,
        v_long,
        v_lat,
    })
}

/// What the drivetrain core sees of one wheel.
pub fn wheel_sensor(wheel: &WheelMount, contact: Option<&SuspensionContact>) -> WheelSensor {
    match contact {
        Some(c) => WheelSensor {
            grounded: true,
            normal_load: c.normal_force,
            forward_slip: wheel.forward_slip,
            sideways_slip: wheel.sideways_slip,
            angular_speed_rpm: wheel.spin_rpm,
            radius: wheel.radius,
            compression: c.compression_ratio,
            contact_point: c.hit_point,
        },
        None => WheelSensor {
            angular_speed_rpm: wheel.spin_rpm,
            ..WheelSensor::airborne(wheel.radius)
        },
    }
}

pub fn body_sensor(body: &RigidBody) -> BodySensor {
    let rot = body.position().rotation;
    BodySensor {
        linear_velocity: *body.linvel(),
        angular_velocity: *body.angvel(),
        forward: rot * Vector::z(),
        up: rot * Vector::y(),
        center_of_mass: *body.center_of_mass(),
    }
}
