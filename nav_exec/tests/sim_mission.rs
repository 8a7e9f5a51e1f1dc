//! Closed loop tests of odometry, motion and localisation against the
//! simulated robot.
//!
//! The simulation runs in real time, so these take a few seconds each.

use approx::assert_abs_diff_eq;
use std::thread;
use std::time::Duration;

use nav_lib::{
    field::{Corner, Field},
    geometry::RobotGeometry,
    hal::Side,
    loc::{
        DistanceScanLocalizer, LineCrossingLocalizer, LineParams, Localization, ScanMode,
        ScanParams, TravelAxis,
    },
    nav::{self, heading_error_deg, MotionController},
    odom::{self, OdomHandle, OdometryIntegrator},
    pose::{Pose, PoseStore},
    sim::{self, SimLineSensor, SimMotors, SimRangeSensor, SimRobot},
};

// ---------------------------------------------------------------------------
// FIXTURES
// ---------------------------------------------------------------------------

const FIELD: Field = Field {
    tile_size_cm: 30.48,
    size_tiles: 12,
};

const GEOM: RobotGeometry = RobotGeometry {
    wheel_radius_cm: 2.1,
    wheel_base_cm: 13.8,
};

struct Rig {
    robot: SimRobot,
    nav: MotionController<SimMotors>,
    odom: Option<OdomHandle>,
}

impl Rig {
    /// A robot truly at `truth` whose estimate starts at `estimate`.
    fn new(truth: Pose, estimate: Pose) -> Self {
        let robot = SimRobot::new(sim_params(), FIELD, GEOM, truth);
        let store = PoseStore::new(estimate);

        let odom = OdometryIntegrator::new(store.clone(), robot.encoders(), GEOM)
            .spawn(&odom::Params {
                period_ms: 5,
                max_consec_read_errors: 5,
                archive_poses: false,
            })
            .unwrap();

        let nav = MotionController::new(nav_params(), GEOM, store, robot.motors());

        Self {
            robot,
            nav,
            odom: Some(odom),
        }
    }

    fn localization(&self) -> Localization<SimRangeSensor, SimLineSensor> {
        Localization::new(
            DistanceScanLocalizer::new(scan_params(), self.robot.range_sensor()),
            LineCrossingLocalizer::new(
                line_params(),
                FIELD,
                self.robot.line_sensor(Side::Left),
                self.robot.line_sensor(Side::Right),
            ),
        )
    }

    /// True pose once odometry has caught up with the last motion.
    fn settled_truth(&self) -> Pose {
        thread::sleep(Duration::from_millis(20));
        self.robot.true_pose().unwrap()
    }

    fn finish(mut self) {
        self.nav.stop().unwrap();
        if let Some(odom) = self.odom.take() {
            odom.stop().unwrap();
        }
    }
}

fn sim_params() -> sim::Params {
    sim::Params {
        start_x_cm: 15.0,
        start_y_cm: 15.0,
        start_heading_deg: 45.0,
        range_max_cm: 255.0,
        line_width_cm: 1.0,
        line_reflectance: 20.0,
        floor_reflectance: 60.0,
        sensor_track_cm: 11.6,
        sensor_offset_cm: 5.35,
    }
}

fn nav_params() -> nav::Params {
    nav::Params {
        forward_speed_degs: 300.0,
        rotate_speed_degs: 150.0,
        heading_tolerance_deg: 1.0,
        position_tolerance_cm: 1.0,
        heading_correction_deg: 5.0,
        poll_interval_ms: 1,
        settle_ms: 20,
    }
}

fn scan_params() -> ScanParams {
    ScanParams {
        mode: ScanMode::FallingEdge,
        rotate_speed_degs: 150.0,
        band_centre_cm: 50.0,
        bandwidth_cm: 5.0,
        max_range_cm: 60.0,
        confirm_samples: 3,
        pre_turn_deg: -45.0,
        poll_interval_ms: 2,
        edge_timeout_ms: Some(20_000),
    }
}

fn line_params() -> LineParams {
    LineParams {
        black_line_threshold: 40.0,
        sensor_track_cm: 11.6,
        sensor_offset_cm: 5.35,
        forward_speed_degs: 300.0,
        poll_interval_ms: 1,
        line_timeout_ms: Some(10_000),
    }
}

fn assert_heading_near(actual_deg: f64, expected_deg: f64, tol_deg: f64) {
    let err = heading_error_deg(actual_deg, expected_deg);
    assert!(
        err.abs() <= tol_deg,
        "heading {:.3} deg is {:.3} deg from {:.3} deg",
        actual_deg,
        err,
        expected_deg
    );
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[test]
fn test_rotate_to_both_directions() {
    // From a heading of zero the short way round is counter-clockwise to 10 and
    // 170, clockwise to 190 and 350
    for &target in [10.0, 170.0, 190.0, 350.0].iter() {
        let start = Pose::from_deg(100.0, 100.0, 0.0);
        let mut rig = Rig::new(start, start);

        rig.nav.rotate_to(target).unwrap();

        assert_heading_near(rig.nav.pose().heading_deg(), target, 1.0);
        assert_heading_near(rig.settled_truth().heading_deg(), target, 1.5);

        // Rotation in place leaves the position alone
        let truth = rig.settled_truth();
        assert_abs_diff_eq!(truth.x_cm, 100.0, epsilon = 0.1);
        assert_abs_diff_eq!(truth.y_cm, 100.0, epsilon = 0.1);

        rig.finish();
    }
}

#[test]
fn test_rotate_to_across_zero() {
    let start = Pose::from_deg(100.0, 100.0, 350.0);
    let mut rig = Rig::new(start, start);

    rig.nav.rotate_to(10.0).unwrap();
    assert_heading_near(rig.settled_truth().heading_deg(), 10.0, 1.5);

    rig.nav.rotate_to(350.0).unwrap();
    assert_heading_near(rig.settled_truth().heading_deg(), 350.0, 1.5);

    rig.finish();
}

#[test]
fn test_drive_path() {
    let start = Pose::from_deg(50.0, 50.0, 0.0);
    let mut rig = Rig::new(start, start);

    rig.nav
        .drive_path(&[(110.0, 50.0), (110.0, 100.0), (60.0, 100.0)])
        .unwrap();

    let est = rig.nav.pose();
    assert_abs_diff_eq!(est.x_cm, 60.0, epsilon = 1.0);
    assert_abs_diff_eq!(est.y_cm, 100.0, epsilon = 1.0);

    let truth = rig.settled_truth();
    assert_abs_diff_eq!(truth.x_cm, 60.0, epsilon = 1.5);
    assert_abs_diff_eq!(truth.y_cm, 100.0, epsilon = 1.5);

    rig.finish();
}

#[test]
fn test_drive_distance_backwards() {
    let start = Pose::from_deg(100.0, 100.0, 90.0);
    let mut rig = Rig::new(start, start);

    rig.nav.drive_distance(-20.0).unwrap();

    let truth = rig.settled_truth();
    assert_abs_diff_eq!(truth.x_cm, 100.0, epsilon = 0.1);
    assert_abs_diff_eq!(truth.y_cm, 80.0, epsilon = 0.1);

    // Odometry follows the open loop motion
    assert_abs_diff_eq!(rig.nav.pose().y_cm, 80.0, epsilon = 0.1);

    rig.finish();
}

#[test]
fn test_localize_from_corner() {
    // The robot knows nothing of where it is, odometry starts at the origin
    let truth = FIELD
        .corner_origin(Corner::One)
        .compose(&sim_params().start_pose_local());
    let mut rig = Rig::new(truth, Pose::default());
    let mut loc = rig.localization();

    let report = loc
        .localize(&mut rig.nav, Some(FIELD.corner_pose(Corner::One)))
        .unwrap();

    // The scan measured the 45 degree start heading
    assert_abs_diff_eq!(report.scan.bisector_deg, 45.0, epsilon = 2.0);
    assert_eq!(report.line.x_pass.axis, TravelAxis::X);
    assert_eq!(report.line.y_pass.axis, TravelAxis::Y);

    // Finished on the intersection one tile in from both walls, facing X
    let est = rig.nav.pose();
    assert_abs_diff_eq!(est.x_cm, 30.48, epsilon = 1.0);
    assert_abs_diff_eq!(est.y_cm, 30.48, epsilon = 1.0);
    assert_heading_near(est.heading_deg(), 0.0, 1.0);

    let truth = rig.settled_truth();
    assert_abs_diff_eq!(truth.x_cm, est.x_cm, epsilon = 1.5);
    assert_abs_diff_eq!(truth.y_cm, est.y_cm, epsilon = 1.5);
    assert_heading_near(truth.heading_deg(), est.heading_deg(), 2.0);

    rig.finish();
}

#[test]
fn test_localize_from_far_corner() {
    // Corner three faces the opposite way, the estimate must still come out
    // in the field frame
    let truth = FIELD
        .corner_origin(Corner::Three)
        .compose(&Pose::from_deg(12.0, 18.0, 40.0));
    let mut rig = Rig::new(truth, Pose::default());
    let mut loc = rig.localization();

    loc.localize(&mut rig.nav, Some(FIELD.corner_pose(Corner::Three)))
        .unwrap();

    let far_line = FIELD.size_cm() - FIELD.tile_size_cm;

    let est = rig.nav.pose();
    assert_abs_diff_eq!(est.x_cm, far_line, epsilon = 1.0);
    assert_abs_diff_eq!(est.y_cm, far_line, epsilon = 1.0);
    assert_heading_near(est.heading_deg(), 180.0, 1.0);

    let truth = rig.settled_truth();
    assert_abs_diff_eq!(truth.x_cm, far_line, epsilon = 1.5);
    assert_abs_diff_eq!(truth.y_cm, far_line, epsilon = 1.5);
    assert_heading_near(truth.heading_deg(), 180.0, 2.0);

    rig.finish();
}

#[test]
fn test_correct_at_line() {
    // The estimate has drifted by 4 cm and 3 degrees from the truth
    let truth = Pose::from_deg(40.0, 45.72, 3.0);
    let mut rig = Rig::new(truth, Pose::from_deg(44.0, 45.72, 0.0));
    let mut loc = rig.localization();

    let pass = loc.correct_at_line(&mut rig.nav).unwrap();

    assert_eq!(pass.axis, TravelAxis::X);
    assert_abs_diff_eq!(pass.angle_error_deg, 3.0, epsilon = 1.0);

    // Squared up on the x = 2 tiles line
    let est = rig.nav.pose();
    assert_abs_diff_eq!(est.x_cm, 60.96, epsilon = 0.5);
    assert_heading_near(est.heading_deg(), 0.0, 0.5);

    let truth = rig.settled_truth();
    assert_abs_diff_eq!(truth.x_cm, 60.96, epsilon = 1.5);
    assert_heading_near(truth.heading_deg(), 0.0, 1.5);

    rig.finish();
}
