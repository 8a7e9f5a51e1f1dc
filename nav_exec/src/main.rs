//! Main navigation executable entry point.
//!
//! # Architecture
//!
//! The execution consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Place the simulated robot in the chosen starting corner
//!     - Start odometry in its own thread
//!     - Mission:
//!         - Wall scan, giving the heading relative to the corner
//!         - Line crossing onto the corner's grid intersection, giving the
//!           position
//!         - Drive the waypoints given on the command line
//!         - Optionally square up on the next line ahead
//!     - Stop odometry and close the session
//!
//! Parameters are loaded from the `params` directory under the software root,
//! given by the `DIFFBOT_SW_ROOT` environment variable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::str::FromStr;
use structopt::StructOpt;

// Internal
use nav_lib::{
    field::{Corner, Field},
    geometry::RobotGeometry,
    hal::Side,
    loc::{
        DistanceScanLocalizer, LineCrossingLocalizer, LineParams, Localization, ScanMode,
        ScanParams,
    },
    nav::{self, MotionController},
    odom::{self, OdometryIntegrator},
    pose::PoseStore,
    sim::{self, SimLineSensor, SimMotors, SimRangeSensor, SimRobot},
};
use util::{
    logger::{logger_init, LevelFilter},
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Localise in a corner of the field, then drive through a list of waypoints.
#[derive(Debug, StructOpt)]
#[structopt(name = "nav_exec")]
struct Opt {
    /// Starting corner, 1 to 4 counter-clockwise from the field origin
    #[structopt(short, long, default_value = "1")]
    corner: Corner,

    /// Wall scan mode (falling_edge or rising_edge), overriding scan_loc.toml
    #[structopt(long)]
    scan_mode: Option<ScanMode>,

    /// Waypoint to drive to after localising, either as `x,y` in centimeters
    /// in the field frame or as `t:i,j` in grid intersections counted from
    /// the one nearest corner 1. May be given multiple times.
    #[structopt(short, long = "waypoint")]
    waypoints: Vec<Waypoint>,

    /// Square up on the next grid line ahead after the last waypoint
    #[structopt(long)]
    correct_at_line: bool,

    /// Minimum level of messages written to the log (info, debug or trace)
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Waypoint {
    /// Field frame coordinates.
    Cm { x_cm: f64, y_cm: f64 },

    /// Grid intersection indices, see [`Field::tile_to_cm`].
    Tile { x_tile: i32, y_tile: i32 },
}

type SimLocalization = Localization<SimRangeSensor, SimLineSensor>;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Differential Robot Navigation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("Options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let geometry: RobotGeometry =
        params::load("geometry.toml").wrap_err("Could not load geometry params")?;
    let field: Field = params::load("field.toml").wrap_err("Could not load field params")?;
    let odom_params: odom::Params =
        params::load("odom.toml").wrap_err("Could not load odometry params")?;
    let nav_params: nav::Params =
        params::load("motion.toml").wrap_err("Could not load motion params")?;
    let mut scan_params: ScanParams =
        params::load("scan_loc.toml").wrap_err("Could not load wall scan params")?;
    let line_params: LineParams =
        params::load("line_loc.toml").wrap_err("Could not load line crossing params")?;
    let sim_params: sim::Params =
        params::load("sim.toml").wrap_err("Could not load simulation params")?;

    if let Some(mode) = opt.scan_mode {
        scan_params.mode = mode;
    }

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    let true_start = field
        .corner_origin(opt.corner)
        .compose(&sim_params.start_pose_local());
    let robot = SimRobot::new(sim_params, field, geometry, true_start);

    info!("Simulated robot placed in {} at {}", opt.corner, true_start);

    let store = PoseStore::default();

    let mut odom = OdometryIntegrator::new(store.clone(), robot.encoders(), geometry);
    if odom_params.archive_poses {
        odom = odom
            .with_archive(&session, "odom/poses.csv")
            .wrap_err("Failed to create the odometry archive")?;
    }
    let odom_handle = odom
        .spawn(&odom_params)
        .wrap_err("Failed to start odometry")?;

    let mut nav = MotionController::new(nav_params, geometry, store, robot.motors());

    let mut loc = Localization::new(
        DistanceScanLocalizer::new(scan_params, robot.range_sensor()),
        LineCrossingLocalizer::new(
            line_params,
            field,
            robot.line_sensor(Side::Left),
            robot.line_sensor(Side::Right),
        ),
    );

    info!("Initialisation complete\n");

    // ---- MISSION ----

    let mission_res = run_mission(&opt, &field, &robot, &session, &mut nav, &mut loc);

    // ---- SHUTDOWN ----

    if let Err(e) = nav.stop() {
        warn!("Could not stop the motors: {}", e);
    }

    let odom_res = odom_handle.stop();

    session.exit();

    mission_res?;
    odom_res.wrap_err("Odometry exited with an error")?;

    info!("End of execution");

    Ok(())
}

/// Localise, then drive the waypoints.
fn run_mission(
    opt: &Opt,
    field: &Field,
    robot: &SimRobot,
    session: &Session,
    nav: &mut MotionController<SimMotors>,
    loc: &mut SimLocalization,
) -> Result<(), Report> {
    let start = field.corner_pose(opt.corner);

    let report = loc
        .localize(nav, Some(start))
        .wrap_err("Localisation failed")?;

    info!(
        "Localised at {}, true pose {}",
        report.final_pose,
        robot.true_pose()?
    );
    session.save("loc/report.json", report);

    let waypoints: Vec<(f64, f64)> = opt.waypoints.iter().map(|w| w.to_cm(field)).collect();
    nav.drive_path(&waypoints)
        .wrap_err("Failed to drive the waypoints")?;

    if opt.correct_at_line {
        let pass = loc
            .correct_at_line(nav)
            .wrap_err("Line correction failed")?;
        session.save("loc/line_correction.json", pass);
    }

    info!(
        "Mission complete, pose {}, true pose {}",
        nav.pose(),
        robot.true_pose()?
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoint {
    /// Position of the waypoint in the field frame.
    fn to_cm(&self, field: &Field) -> (f64, f64) {
        match *self {
            Waypoint::Cm { x_cm, y_cm } => (x_cm, y_cm),
            Waypoint::Tile { x_tile, y_tile } => {
                (field.tile_to_cm(x_tile), field.tile_to_cm(y_tile))
            }
        }
    }
}

impl FromStr for Waypoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || format!("Expected a waypoint as x,y or t:i,j, got \"{}\"", s);

        match s.trim().strip_prefix("t:") {
            Some(tiles) => {
                let (x_tile, y_tile) = parse_pair::<i32>(tiles).ok_or_else(err)?;
                Ok(Waypoint::Tile { x_tile, y_tile })
            }
            None => {
                let (x_cm, y_cm) = parse_pair::<f64>(s).ok_or_else(err)?;
                Ok(Waypoint::Cm { x_cm, y_cm })
            }
        }
    }
}

/// Parse exactly two comma separated values.
fn parse_pair<T: FromStr>(s: &str) -> Option<(T, T)> {
    let mut parts = s.split(',').map(|p| p.trim().parse::<T>());

    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(a)), Some(Ok(b)), None) => Some((a, b)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
