// ==============================================================================
// physics.rs - RAPIER HOST FOR THE DRIVETRAIN CORE
// ------------------------------------------------------------------------------
// Owns the rapier world and one chassis body per connected player. Per step:
//
//   1) sense     raycast suspension -> WheelSensor x4, BodySensor
//   2) tick      drivetrain::Vehicle::tick (engine, gearbox, torque split)
//   3) actuate   suspension + tire impulses, body forces (anti-roll, aero)
//   4) integrate pipeline.step, then the runaway-body guard
//
// Forces are applied as impulses (F * dt). The tire pass is a slip-curve
// solver: motor/brake torque becomes a longitudinal demand, capped by the
// forward curve peak * Fz; whatever the tire cannot carry shows up as wheel
// slip in the next tick's sensors.
// ==============================================================================

use std::collections::HashMap;

use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::*;

use crate::drivetrain::config::VehicleConfig;
use crate::drivetrain::engine::{RAD_S_TO_RPM, RPM_TO_RAD_S};
use crate::drivetrain::types::{BodyForce, DriveInput, FrictionOverride, WheelCommand, WheelSensor};
use crate::drivetrain::{TelemetrySnapshot, Vehicle};
use crate::suspension_contact::{
    body_sensor, build_suspension_contact, build_wheel_mounts, wheel_sensor, SuspensionContact, WheelMount,
};

const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);

/// Spawn slots are spread along x so players don't stack.
const SPAWN_SPACING: f32 = 6.0;
const SPAWN_DROP: f32 = 0.3;
const WORLD_LIMIT: f32 = 1_000.0;

/// Tire slip ratio never reported past this.
const MAX_FORWARD_SLIP: f32 = 1.5;
/// Free-spinning wheel: rotational inertia and bearing drag.
const WHEEL_INERTIA: f32 = 1.2;
const WHEEL_SPIN_DECAY: f32 = 0.5;
const MAX_FREE_SPIN_RPM: f32 = 4_000.0;
/// |v_long| floor used when normalizing slip at crawl speeds.
const SLIP_SPEED_FLOOR: f32 = 1.0;

/// One player's car: the rapier body, its wheel mounts and the drivetrain core.
pub struct HostedVehicle {
    pub body: RigidBodyHandle,
    pub vehicle: Vehicle,
    pub mounts: [WheelMount; 4],
    pub spawn: Vector<Real>,
}

/// Position + orientation, ready for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehiclePose {
    pub position: [f32; 3],
    pub rotation: [f32; 4], // x, y, z, w
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline,

    pub vehicles: HashMap<String, HostedVehicle>,
    spawned: usize,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let gravity = vector![0.0, -crate::drivetrain::GRAVITY, 0.0];

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // big static ground box, top surface at y = 0
        let ground_rb = RigidBodyBuilder::fixed().translation(vector![0.0, -1.0, 0.0]).build();
        let ground_handle = bodies.insert(ground_rb);

        let ground_collider = ColliderBuilder::cuboid(500.0, 1.0, 500.0)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.2)
            .restitution(0.0)
            .build();
        colliders.insert_with_parent(ground_collider, ground_handle, &mut bodies);

        tracing::debug!(bodies = bodies.len(), colliders = colliders.len(), "ground inserted");

        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            vehicles: HashMap::new(),
            spawned: 0,
        }
    }

    /// Drops a chassis for `id` just above the ground and lets it settle on its springs.
    /// Replaces any car the player already had.
    pub fn spawn_vehicle(&mut self, id: &str, config: VehicleConfig) -> RigidBodyHandle {
        self.remove_vehicle(id);

        let vehicle = Vehicle::new(config);
        let config = vehicle.config();
        let mounts = build_wheel_mounts(config);
        let [hx, hy, hz] = config.chassis.half_extents;
        let mass = config.chassis.mass;

        let ride_height = mounts
            .iter()
            .map(|m| m.radius + m.rest_length)
            .fold(0.0, f32::max);
        let slot = self.spawned as f32;
        self.spawned += 1;
        let spawn = vector![slot * SPAWN_SPACING, ride_height + hy + SPAWN_DROP, 0.0];

        let rb = RigidBodyBuilder::dynamic()
            .translation(spawn)
            .linear_damping(0.05)
            .angular_damping(0.5)
            .ccd_enabled(true)
            .build();

        // box inertia about a lowered centre of mass
        let inertia = vector![
            mass / 12.0 * (4.0 * hy * hy + 4.0 * hz * hz),
            mass / 12.0 * (4.0 * hx * hx + 4.0 * hz * hz),
            mass / 12.0 * (4.0 * hx * hx + 4.0 * hy * hy)
        ];
        let mprops = MassProperties::new(point![0.0, config.chassis.center_of_mass_offset, 0.0], mass, inertia);

        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND | GROUP_CHASSIS))
            .active_events(ActiveEvents::empty())
            .mass_properties(mprops)
            .friction(0.0)
            .restitution(0.0)
            .build();

        let handle = self.bodies.insert(rb);
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);

        tracing::info!(player = id, vehicle = %config.name, x = spawn.x, y = spawn.y, "vehicle spawned");

        self.vehicles.insert(id.to_string(), HostedVehicle { body: handle, vehicle, mounts, spawn });
        handle
    }

    pub fn remove_vehicle(&mut self, id: &str) -> bool {
        let Some(hosted) = self.vehicles.remove(id) else {
            return false;
        };
        self.bodies.remove(
            hosted.body,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            true,
        );
        tracing::info!(player = id, "vehicle removed");
        true
    }

    /// Stores the latest input; consumed by the next `step`.
    pub fn set_input(&mut self, id: &str, input: DriveInput) -> bool {
        match self.vehicles.get_mut(id) {
            Some(v) => {
                v.vehicle.set_input(input);
                true
            }
            None => false,
        }
    }

    /// Manual gear request; false when refused or the player has no car.
    pub fn shift(&mut self, id: &str, up: bool) -> bool {
        let Some(v) = self.vehicles.get_mut(id) else {
            return false;
        };
        if up { v.vehicle.shift_up() } else { v.vehicle.shift_down() }
    }

    pub fn telemetry(&self, id: &str) -> Option<&TelemetrySnapshot> {
        self.vehicles.get(id).map(|v| v.vehicle.telemetry())
    }

    pub fn pose(&self, id: &str) -> Option<VehiclePose> {
        let hosted = self.vehicles.get(id)?;
        let body = self.bodies.get(hosted.body)?;
        let t = body.translation();
        let q = body.rotation();
        Some(VehiclePose {
            position: [t.x, t.y, t.z],
            rotation: [q.i, q.j, q.k, q.w],
        })
    }

    pub fn step(&mut self, dt: Real) {
        let hooks = ();
        let events = ();

        // 1-3) sense, tick, actuate
        self.query_pipeline.update(&self.colliders);
        self.drive_vehicles(dt);

        // 4) integrate
        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters { dt, ..IntegrationParameters::default() },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &hooks,
            &events,
        );

        self.reset_runaway_bodies();
    }

    fn drive_vehicles(&mut self, dt: Real) {
        for (id, hosted) in self.vehicles.iter_mut() {
            let Some(body_ro) = self.bodies.get(hosted.body) else {
                tracing::warn!(player = %id, "vehicle has no rigid body");
                continue;
            };

            // --- 1) sense ---
            let contacts: [Option<SuspensionContact>; 4] = std::array::from_fn(|i| {
                build_suspension_contact(
                    &hosted.mounts[i],
                    body_ro,
                    &self.query_pipeline,
                    &self.bodies,
                    &self.colliders,
                    hosted.body,
                )
            });
            let sensors: [WheelSensor; 4] =
                std::array::from_fn(|i| wheel_sensor(&hosted.mounts[i], contacts[i].as_ref()));
            let body_sensor = body_sensor(body_ro);
            let corner_mass = body_ro.mass() / 4.0;

            // --- 2) tick ---
            let out = hosted.vehicle.tick(&body_sensor, &sensors, dt);

            // --- 3) actuate ---
            let fallback = {
                let tires = &hosted.vehicle.config().tires;
                FrictionOverride { forward: tires.forward, sideways: tires.sideways }
            };

            let mut impulses: Vec<(Vector<Real>, Option<Point<Real>>)> = Vec::with_capacity(12);
            for ((mount, contact), cmd) in hosted.mounts.iter_mut().zip(contacts.iter()).zip(out.commands.iter()) {
                mount.steer_angle = cmd.steer_angle;
                match contact {
                    Some(c) => {
                        let friction = cmd.friction.unwrap_or(fallback);
                        impulses.push((c.ground_normal * (c.normal_force * dt), Some(c.hit_point)));
                        let tire = solve_tire(mount, cmd, &friction, c, corner_mass, dt);
                        impulses.push((tire * dt, Some(c.apply_point)));
                    }
                    None => spin_free_wheel(mount, cmd, dt),
                }
            }
            impulses.extend(out.body_forces.iter().map(|f: &BodyForce| (f.force * dt, f.at_point)));

            if let Some(body) = self.bodies.get_mut(hosted.body) {
                for (impulse, at) in impulses {
                    match at {
                        Some(p) => body.apply_impulse_at_point(impulse, p, true),
                        None => body.apply_impulse(impulse, true),
                    }
                }
            }
        }
    }

    /// Puts any body with a non-finite or far-out position back at its spawn point.
    fn reset_runaway_bodies(&mut self) {
        for (id, hosted) in self.vehicles.iter() {
            let Some(body) = self.bodies.get_mut(hosted.body) else {
                continue;
            };
            let pos = *body.translation();
            let bad = !(pos.x.is_finite() && pos.y.is_finite() && pos.z.is_finite())
                || pos.x.abs() > WORLD_LIMIT
                || pos.y.abs() > WORLD_LIMIT
                || pos.z.abs() > WORLD_LIMIT;

            if bad {
                body.set_translation(hosted.spawn, true);
                body.set_rotation(UnitQuaternion::identity(), true);
                body.set_linvel(Vector::zeros(), true);
                body.set_angvel(Vector::zeros(), true);
                tracing::warn!(player = %id, "reset runaway body to spawn");
            }
        }
    }
}

/// Longitudinal + lateral tire force (world, N) for one grounded wheel.
/// Updates the mount's spin and slip state for the next tick's sensor.
fn solve_tire(
    mount: &mut WheelMount,
    cmd: &WheelCommand,
    friction: &FrictionOverride,
    contact: &SuspensionContact,
    corner_mass: f32,
    dt: f32,
) -> Vector<Real> {
    let fz = contact.normal_force.max(0.0);
    let r = mount.radius.max(0.05);
    let v_long = contact.v_long;
    let v_lat = contact.v_lat;
    let stop_force = if dt > 0.0 { corner_mass / dt } else { 0.0 };

    // --- longitudinal ---
    let drive = cmd.motor_torque / r;
    let brake_max = cmd.brake_torque / r;
    let brake = -v_long.signum() * brake_max.min(stop_force * v_long.abs());
    let demand = if v_long.abs() < 0.1 && drive.abs() <= brake_max {
        // held: brakes cancel whatever drive there is and stop the creep
        -stop_force * v_long
    } else {
        drive + brake
    };

    let capacity = friction.forward.peak() * fz;
    let (f_long, slip) = if capacity <= 0.0 {
        (0.0, 0.0)
    } else if demand.abs() <= capacity {
        (demand, friction.forward.extremum_slip * demand / capacity)
    } else {
        let excess = demand.abs() / capacity - 1.0;
        let span = (friction.forward.asymptote_slip - friction.forward.extremum_slip).max(0.0);
        let slip = (friction.forward.extremum_slip + excess * span).min(MAX_FORWARD_SLIP) * demand.signum();
        (friction.forward.evaluate(slip) * fz, slip)
    };
    mount.forward_slip = slip;

    let surface = v_long + slip * v_long.abs().max(SLIP_SPEED_FLOOR);
    mount.spin_rpm = surface / r * RAD_S_TO_RPM;

    // --- lateral ---
    let lat_slip = v_lat / v_long.abs().max(SLIP_SPEED_FLOOR);
    mount.sideways_slip = lat_slip;
    let lat_capacity = friction.sideways.evaluate(lat_slip).abs() * fz;
    let f_lat = -v_lat.signum() * lat_capacity.min(stop_force * v_lat.abs());

    contact.forward * f_long + contact.side * f_lat
}

/// Airborne wheel: motor torque spins it up, brakes and bearings slow it down.
fn spin_free_wheel(mount: &mut WheelMount, cmd: &WheelCommand, dt: f32) {
    let mut omega = mount.spin_rpm * RPM_TO_RAD_S;
    omega += cmd.motor_torque / WHEEL_INERTIA * dt;

    let brake_dw = cmd.brake_torque / WHEEL_INERTIA * dt;
    omega = if omega.abs() <= brake_dw { 0.0 } else { omega - omega.signum() * brake_dw };
    omega *= (1.0 - WHEEL_SPIN_DECAY * dt).max(0.0);

    mount.spin_rpm = (omega * RAD_S_TO_RPM).clamp(-MAX_FREE_SPIN_RPM, MAX_FREE_SPIN_RPM);
    mount.forward_slip = 0.0;
    mount.sideways_slip = 0.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivetrain::{VehiclePreset, WheelId};

    const DT: f32 = 1.0 / 60.0;

    fn settle(world: &mut PhysicsWorld, steps: usize) {
        for _ in 0..steps {
            world.step(DT);
        }
    }

    #[test]
    fn spawned_car_settles_on_its_wheels() {
        let mut world = PhysicsWorld::new();
        world.spawn_vehicle("p1", VehiclePreset::FamilySedan.config());
        settle(&mut world, 180);

        let t = world.telemetry("p1").cloned().unwrap_or_default();
        assert!(t.all_grounded);
        assert!(t.speed < 0.5, "speed {}", t.speed);
        let pose = world.pose("p1").unwrap();
        assert!(pose.position[1] > 0.0 && pose.position[1] < 2.0);
    }

    #[test]
    fn throttle_moves_the_car_forward() {
        let mut world = PhysicsWorld::new();
        world.spawn_vehicle("p1", VehiclePreset::Sportscar.config());
        settle(&mut world, 120);
        let z0 = world.pose("p1").unwrap().position[2];

        world.set_input("p1", DriveInput::new(0.0, 1.0));
        settle(&mut world, 180);

        let pose = world.pose("p1").unwrap();
        let t = world.telemetry("p1").unwrap();
        assert!(pose.position[2] > z0 + 1.0, "z {} -> {}", z0, pose.position[2]);
        assert!(t.forward_speed > 1.0);
    }

    #[test]
    fn unknown_players_are_ignored() {
        let mut world = PhysicsWorld::new();
        assert!(!world.set_input("ghost", DriveInput::new(0.0, 1.0)));
        assert!(!world.shift("ghost", true));
        assert!(!world.remove_vehicle("ghost"));
        assert!(world.pose("ghost").is_none());
    }

    #[test]
    fn respawn_replaces_the_old_body() {
        let mut world = PhysicsWorld::new();
        let a = world.spawn_vehicle("p1", VehiclePreset::FamilySedan.config());
        let b = world.spawn_vehicle("p1", VehiclePreset::FamilySedan.config());
        assert_ne!(a, b);
        assert!(world.bodies.get(a).is_none());
        assert_eq!(world.vehicles.len(), 1);
        assert!(world.remove_vehicle("p1"));
        assert!(world.bodies.get(b).is_none());
    }

    #[test]
    fn free_wheel_spins_up_and_brakes_to_zero() {
        let cfg = VehiclePreset::Sportscar.config();
        let mut mount = build_wheel_mounts(&cfg)[WheelId::RL.index()].clone();
        let drive = WheelCommand { motor_torque: 200.0, ..WheelCommand::default() };
        for _ in 0..30 {
            spin_free_wheel(&mut mount, &drive, DT);
        }
        assert!(mount.spin_rpm > 0.0);

        // 5000 N*m takes ~69 rad/s off per tick
        let brake = WheelCommand { brake_torque: 5_000.0, ..WheelCommand::default() };
        let mut last = mount.spin_rpm;
        for _ in 0..5 {
            spin_free_wheel(&mut mount, &brake, DT);
            assert!(mount.spin_rpm >= 0.0 && mount.spin_rpm <= last);
            last = mount.spin_rpm;
        }
        assert_eq!(mount.spin_rpm, 0.0);
    }
}
