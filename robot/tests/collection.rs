//! End-to-end collection runs against the bench rig

use common::types::{Degrees, FruitColor, GripperStatus, Millimeters, NewtonMeters, Rpm};
use robot::config::RobotConfig;
use robot::cycle::ControlLoop;
use robot::input::{Axis, Buttons};
use robot::machine::{Mode, State};
use robot::peripheral::bench::BenchRig;
use robot::peripheral::{Blob, Imu, Motor};

/// Nominal cycle time
const DT: u64 = 20_000;

struct Harness {
    control: ControlLoop,
    rig: BenchRig,
}

impl Harness {
    fn new() -> Self {
        let config = RobotConfig::default();
        let rig = BenchRig::new();
        let control = ControlLoop::new(config.clone(), rig.robot(&config));
        Harness { control, rig }
    }

    fn step(&mut self) {
        self.control.step(DT).expect("cycle");
    }

    /// Holds the buttons for exactly one cycle
    fn press(&mut self, buttons: Buttons) {
        self.rig.gamepad.hold(buttons);
        self.step();
        self.rig.gamepad.release_all();
    }

    /// Drives the lift homing stall and the gripper reference search
    fn settle_arm(&mut self) {
        self.rig.lift.feed_velocity(Rpm(-30.0));
        self.step();
        self.step();
        self.rig.lift.feed_velocity(Rpm(0.0));
        self.step();
        assert!(self.control.robot.arm.zeroed);

        self.rig.gripper.feed_torque(NewtonMeters(0.4));
        self.step();
        assert_eq!(self.rig.gripper.position(), Degrees(2.0));
        self.rig.gripper.feed_torque(NewtonMeters(0.0));
    }

    /// Brings a fresh harness into collection mode on the chosen wall,
    /// holding the wall offset
    fn enter_collection_on_wall_one(&mut self) {
        self.settle_arm();
        self.press(Buttons::X);
        assert_eq!(self.control.mode, Mode::Collection);

        // the lift parks at the rest position before initialization
        self.step();
        self.rig.lift.finish_motion();
        self.step();
        self.step();
        assert_eq!(self.control.state, State::CollectionInit);

        self.press(Buttons::RIGHT);
        assert_eq!(self.control.collect.current_wall, 1);
        // wall 1 re-references the gyro to its heading
        assert_eq!(self.rig.imu.heading(), Degrees(0.0));

        self.step();
        assert_eq!(self.control.state, State::WallReturn);
    }

    /// A narrow blob close enough to divert wall following
    fn near_fruit(&self, color: FruitColor) {
        self.rig.camera.feed_blobs(
            color,
            vec![Blob {
                center_x: 158,
                center_y: 120,
                width: 40,
                height: 80,
            }],
        );
    }
}

#[test]
fn collection_init_reaches_wall_following_with_empty_tray() {
    let mut h = Harness::new();
    h.enter_collection_on_wall_one();

    // still too far off the wall
    h.rig.wall_sonar.feed_distance(Millimeters(500.0));
    h.step();
    assert_eq!(h.control.state, State::WallReturn);

    // inside setpoint + tolerance with an empty tray: straight back to
    // following, no basket detour
    h.rig.wall_sonar.feed_distance(Millimeters(160.0));
    h.step();
    h.step();
    assert_eq!(h.control.state, State::WallFollowing);
    assert!(!h.control.collect.returning_to_baskets);
}

#[test]
fn full_tray_at_wall_one_starts_the_basket_detour() {
    let mut h = Harness::new();
    h.enter_collection_on_wall_one();
    h.control.collect.tray_count = 2;

    h.rig.wall_sonar.feed_distance(Millimeters(160.0));
    h.step();
    h.step();
    assert_eq!(h.control.state, State::Turning);
    assert!(h.control.collect.returning_to_baskets);
    assert_eq!(h.control.return_state, Some(State::WallFollowingReverse));
    // the staged turn is 90 degrees past the wall heading
    assert!((h.control.pids.turn.setpoint - 90.0).abs() < 1e-9);
}

#[test]
fn grab_sequence_closes_on_wide_blob_and_counts_the_fruit() {
    let mut h = Harness::new();
    h.enter_collection_on_wall_one();
    h.rig.wall_sonar.feed_distance(Millimeters(160.0));
    h.step();
    h.step();
    assert_eq!(h.control.state, State::WallFollowing);

    // a close-by fruit pulls the robot off the wall
    h.near_fruit(FruitColor::Green);
    h.step();
    h.step();
    assert_eq!(h.control.state, State::FruitFollowing);

    // blob passes the grab width: close fires on that exact cycle even
    // though the approach controllers have not converged
    h.rig.camera.feed_blobs(
        FruitColor::Green,
        vec![Blob {
            center_x: 158,
            center_y: 120,
            width: 301,
            height: 320,
        }],
    );
    h.step();
    assert_eq!(h.rig.gripper.last_command(), Some(-100.0));
    h.step();
    assert_eq!(h.control.state, State::Closing);

    // jaws reach the closed threshold
    h.rig.gripper.feed_position(Degrees(-141.0));
    h.step();
    assert_eq!(h.control.robot.arm.status, GripperStatus::Closed);
    h.step();
    h.step();
    assert_eq!(h.control.state, State::DropFruit);
    // the lift is already at rest, so the drop completes in one cycle
    assert_eq!(h.control.collect.tray_count, 1);
    assert_eq!(h.control.collect.color, Some(FruitColor::Green));
    h.step();
    assert_eq!(h.control.state, State::BackAway);

    // a second of reversing, then the turn back toward the wall
    h.rig.camera.clear();
    h.rig.imu.feed_heading(Degrees(40.0));
    for _ in 0..52 {
        h.step();
    }
    assert_eq!(h.control.state, State::Turning);
    assert_eq!(h.control.return_state, Some(State::WallReturn));

    // the heading settles on the wall setpoint and the turn resumes
    h.rig.imu.feed_heading(Degrees(0.0));
    h.step();
    h.step();
    assert_eq!(h.control.state, State::WallReturn);
    assert_eq!(h.control.return_state, None);
}

#[test]
fn wrong_color_fruit_reroutes_to_turning() {
    let mut h = Harness::new();
    h.enter_collection_on_wall_one();
    h.control.collect.color = Some(FruitColor::Orange);
    h.control.state = State::FruitFollowing;

    h.near_fruit(FruitColor::Green);
    h.step();
    h.step();
    assert_eq!(h.control.state, State::Turning);
}

#[test]
fn lost_average_aborts_the_approach() {
    let mut h = Harness::new();
    h.enter_collection_on_wall_one();
    h.control.state = State::FruitFollowing;

    h.near_fruit(FruitColor::Green);
    h.step();

    // the average outlives the raw detection by a second, then the
    // approach bails out backwards
    h.rig.camera.clear();
    for _ in 0..49 {
        h.step();
    }
    assert_eq!(h.control.state, State::FruitFollowing);
    for _ in 0..4 {
        h.step();
    }
    assert_eq!(h.control.state, State::BackAway);
}

#[test]
fn corner_stages_a_turn_and_advances_the_wall() {
    let mut h = Harness::new();
    h.enter_collection_on_wall_one();
    h.rig.wall_sonar.feed_distance(Millimeters(160.0));
    h.step();
    h.step();
    assert_eq!(h.control.state, State::WallFollowing);

    // holding the offset and something ahead on the side sonar: corner
    h.rig.side_sonar.feed_distance(Millimeters(150.0));
    h.step();
    h.step();
    assert_eq!(h.control.state, State::Turning);
    assert_eq!(h.control.collect.current_wall, 2);
    assert_eq!(h.control.return_state, Some(State::WallFollowing));
    assert!((h.control.pids.turn.setpoint - -90.0).abs() < 1e-9);
}

#[test]
fn tilt_aborts_to_default_mode() {
    let mut h = Harness::new();
    h.enter_collection_on_wall_one();
    h.rig.wall_sonar.feed_distance(Millimeters(160.0));
    h.step();
    h.step();
    assert_eq!(h.control.state, State::WallFollowing);

    h.rig.imu.feed_attitude(Degrees(9.0), Degrees(0.0));
    h.step();
    assert_eq!(h.control.mode, Mode::Default);
    h.step();
    h.step();
    assert_eq!(h.control.state, State::Default);
}

#[test]
fn emergency_button_overrides_everything_immediately() {
    let mut h = Harness::new();
    h.enter_collection_on_wall_one();
    assert_eq!(h.control.state, State::WallReturn);

    h.press(Buttons::B);
    assert_eq!(h.control.mode, Mode::Default);
    assert_eq!(h.control.state, State::Default);
}

#[test]
fn basket_run_unloads_at_the_held_colors_slot() {
    let mut h = Harness::new();
    h.enter_collection_on_wall_one();
    h.control.state = State::BasketFollowing;
    // orange is second in the delivery order
    h.control.collect.color = Some(FruitColor::Orange);
    h.control.collect.tray_count = 2;

    // tracking the line toward the baskets
    h.rig.line_left.feed_reflectance(60.0);
    h.rig.line_right.feed_reflectance(60.0);
    h.step();
    assert_eq!(h.control.state, State::BasketFollowing);
    assert_eq!(h.control.collect.box_count, 0);

    // right sensor runs off the line: the first slot edge
    h.rig.line_right.feed_reflectance(85.0);
    h.step();
    assert_eq!(h.control.collect.box_count, 1);
    assert!(h.control.collect.in_space);

    // slot matches the held color: the settle delay arms once, despite
    // being requested every cycle
    assert_eq!(h.control.delays.pending(), 1);
    h.step();
    assert_eq!(h.control.delays.pending(), 1);

    // a second later the delayed transition fires
    for _ in 0..51 {
        h.step();
    }
    assert_eq!(h.control.state, State::Unload);

    // six tray half-cycles, then bookkeeping resets and the robot turns
    // back toward the basket wall
    let mut guard = 0;
    while h.control.state != State::Turning && guard < 20 {
        h.step();
        h.rig.tray.finish_motion();
        guard += 1;
    }
    assert_eq!(h.control.state, State::Turning);
    assert_eq!(h.control.collect.tray_count, 0);
    assert_eq!(h.control.collect.color, None);
    assert_eq!(h.control.return_state, Some(State::WallFollowing));
    assert!(!h.control.collect.returning_to_baskets);
    assert!((h.control.pids.turn.setpoint - 90.0).abs() < 1e-9);
}

#[test]
fn teleop_round_trip_from_default() {
    let mut h = Harness::new();
    h.settle_arm();

    h.press(Buttons::A);
    assert_eq!(h.control.mode, Mode::Teleop);

    // sticks drive the wheels
    h.rig.gamepad.deflect(Axis::LeftY, 80.0);
    h.step();
    assert!(h.rig.front_left.last_command().is_some());

    h.rig.gamepad.deflect(Axis::LeftY, 0.0);
    h.press(Buttons::A);
    assert_eq!(h.control.mode, Mode::Default);
    h.step();
    assert_eq!(h.control.state, State::Default);
}
