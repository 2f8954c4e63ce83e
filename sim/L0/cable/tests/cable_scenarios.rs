//! End-to-end cable scenarios.
//!
//! Run with: cargo test -p sim-cable --test cable_scenarios

use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use sim_cable::{
    Cable, CableBody, CableConfig, ColliderSet, CollisionQuery, LineSegment, NoCollisions,
};

const DT: f64 = 0.02;

fn horizontal(length: f64) -> LineSegment {
    LineSegment::new(Point3::origin(), Point3::new(length, 0.0, 0.0))
}

fn lowest_y(cable: &Cable) -> f64 {
    cable
        .particles()
        .iter()
        .map(|p| p.y)
        .fold(f64::INFINITY, f64::min)
}

// =============================================================================
// Hanging chains
// =============================================================================

#[test]
fn chain_pinned_at_both_ends_sags() {
    // Visible sag needs a compliant stretch constraint; stiffer presets hang nearly straight.
    let config = CableConfig::default()
        .with_resolution(10)
        .with_gravity(Vector3::new(0.0, -9.8, 0.0))
        .with_stiffness(0.1)
        .with_damping(0.02)
        .with_solver_iterations(20);
    let mut cable = Cable::new(&horizontal(10.0), config, Arc::new(NoCollisions)).unwrap();
    assert_eq!(cable.num_particles(), 11);
    assert_relative_eq!(cable.rest_distance(), 1.0, epsilon = 1e-12);

    cable.set_grab(0, Point3::new(0.0, 0.0, 0.0), false).unwrap();
    cable.set_grab(10, Point3::new(10.0, 0.0, 0.0), false).unwrap();

    for _ in 0..500 {
        cable.step(DT);
    }

    let sag = lowest_y(&cable);
    assert!((-3.0..=-0.5).contains(&sag), "lowest point {sag}");
    assert!(cable.current_length() <= 1.05 * 10.0);
    assert!(cable.is_grabbed(0) && cable.is_grabbed(10));

    // Symmetric load: the lowest particle is in the middle.
    let middle = cable.particles()[5];
    assert_relative_eq!(middle.y, sag, epsilon = 1e-2);
}

#[test]
fn xpbd_result_does_not_depend_on_iterations() {
    let hang = |iterations: u32| {
        let config = CableConfig::default()
            .with_gravity(Vector3::new(0.0, -9.8, 0.0))
            .with_stiffness(0.3)
            .with_damping(0.05)
            .with_solver_iterations(iterations);
        let curve = LineSegment::new(Point3::origin(), Point3::new(0.0, -1.0, 0.0));
        let mut cable =
            Cable::new(&curve, config.with_resolution(1), Arc::new(NoCollisions)).unwrap();
        cable.set_grab(0, Point3::origin(), false).unwrap();

        for _ in 0..300 {
            cable.step(DT);
        }
        let p = cable.particles();
        (p[1] - p[0]).norm()
    };

    let coarse = hang(10);
    let fine = hang(40);
    assert_relative_eq!(coarse, fine, epsilon = 1e-4);
    assert_relative_eq!(fine, 1.0, epsilon = 1e-2);
}

#[test]
fn grabbed_end_can_be_dragged() {
    let config = CableConfig::default()
        .with_gravity(Vector3::zeros())
        .with_damping(0.05)
        .with_solver_iterations(10);
    let mut cable = Cable::new(&horizontal(4.0), config, Arc::new(NoCollisions)).unwrap();

    // Move the target in small increments so the soft pin holds.
    for step in 1..=50 {
        let target = Point3::new(0.0, 0.02 * f64::from(step), 0.0);
        cable.set_grab(0, target, true).unwrap();
        cable.step(DT);
    }
    assert!(cable.is_grabbed(0));
    assert!(cable.particles()[0].y > 0.5);

    // Yank it far away: the pin breaks.
    cable.set_grab(0, Point3::new(0.0, 50.0, 0.0), true).unwrap();
    let stats = *cable.step(DT);
    assert_eq!(stats.released_pins, 1);
    assert!(!cable.is_grabbed(0));
    assert!(cable.particles()[0].y < 2.0);
}

#[test]
fn end_grab_lets_cable_fall() {
    let mut cable = Cable::new(
        &horizontal(4.0),
        CableConfig::default(),
        Arc::new(NoCollisions),
    )
    .unwrap();
    cable.set_grab(0, Point3::origin(), false).unwrap();
    for _ in 0..20 {
        cable.step(DT);
    }
    let held = cable.particles()[0].y;

    cable.end_grab(0).unwrap();
    for _ in 0..20 {
        cable.step(DT);
    }
    assert!(cable.particles()[0].y < held - 0.1);
}

// =============================================================================
// Collisions
// =============================================================================

#[test]
fn cable_drapes_over_sphere() {
    let center = Point3::new(5.0, -2.0, 0.0);
    let sphere_radius = 1.5;
    let world: Arc<dyn CollisionQuery> =
        Arc::new(ColliderSet::new().with_sphere(center, sphere_radius));

    let config = CableConfig::rope()
        .with_gravity(Vector3::new(0.0, -9.8, 0.0))
        .with_radius(0.05);
    let mut cable = Cable::new(&horizontal(10.0), config, world).unwrap();

    for _ in 0..120 {
        cable.step(1.0 / 60.0);
    }

    let contact = sphere_radius + cable.radius();
    let mut touching = false;
    for p in cable.particles() {
        let distance = (p - center).norm();
        assert!(distance > contact - 0.1, "particle inside sphere: {p}");
        touching |= distance < contact + 0.1;
    }
    assert!(touching);
    // Held up by the sphere instead of falling freely.
    assert!(lowest_y(&cable) > -15.0);
    assert!(cable.particles()[10].y > center.y);
}

#[test]
fn cable_rests_on_ground_plane() {
    let world = ColliderSet::new().with_half_space(Vector3::y_axis(), -1.0);
    let config = CableConfig::default().with_damping(0.02);
    let mut cable = Cable::new(&horizontal(5.0), config, Arc::new(world)).unwrap();

    for _ in 0..200 {
        cable.step(DT);
    }

    let rest_height = -1.0 + cable.radius();
    for p in cable.particles() {
        assert!(p.y > rest_height - 0.05, "particle below ground: {p}");
        assert!(p.y < rest_height + 0.05, "particle floating: {p}");
    }
    // Static friction keeps it from drifting.
    assert_relative_eq!(cable.particles()[0].x, 0.0, epsilon = 1e-3);
}
