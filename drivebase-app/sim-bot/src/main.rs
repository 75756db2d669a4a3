use clap::Parser;
use core::cell::RefCell;
use drivebase_core::mk_static;
use drivebase_core::utils::controllers::{parse_command, DriveCommand, DriveController, DRIVE_CHANNEL};
use drivebase_core::utils::hardware::sim::{SimHardware, SimState};
use drivebase_core::utils::RobotMap;
use embassy_executor::Executor;
use embassy_time::{Duration, Ticker, Timer};
use static_cell::StaticCell;
use std::io::Read;
use std::path::PathBuf;
use tracing::{error, info};

/// Encoder pulses per second at full applied output.
const PULSES_PER_SECOND: f64 = 4000.0;
/// Yaw rate with one side full forward and the other full reverse.
const DEGREES_PER_SECOND: f64 = 270.0;

#[derive(Parser)]
#[command(version = "1.0")]
struct Opts {
    /// JSON wiring map; built-in defaults when omitted
    #[arg(long)]
    map: Option<PathBuf>,
    /// newline-delimited drive commands; stdin when omitted
    #[arg(long)]
    script: Option<PathBuf>,
    /// control loop period in milliseconds, at least 1
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
    period_ms: u64,
}

#[embassy_executor::task]
async fn drive_task(mut ctrl: DriveController<SimHardware<'static>>) -> ! {
    ctrl.drive_ch().await
}

/// Turns applied motor output into encoder pulses and heading change.
///
/// The left gearbox is mounted mirrored, so its wheel turns against its
/// motor.
#[embassy_executor::task]
async fn plant_task(
    bus: &'static RefCell<SimState>,
    map: &'static RobotMap,
    period: Duration,
) -> ! {
    let dt = period.as_micros() as f64 / 1_000_000.0;
    let mut ticker = Ticker::every(period);
    let (mut left_acc, mut right_acc) = (0.0_f64, 0.0_f64);
    loop {
        ticker.next().await;
        let mut state = bus.borrow_mut();
        let left = state.applied_output(map.drive_left[0]).unwrap_or(0.0);
        let right = state.applied_output(map.drive_right[0]).unwrap_or(0.0);

        left_acc += left * PULSES_PER_SECOND * dt;
        right_acc += right * PULSES_PER_SECOND * dt;
        let (left_pulses, right_pulses) = (left_acc.trunc(), right_acc.trunc());
        left_acc -= left_pulses;
        right_acc -= right_pulses;
        state.add_pulses(map.encoder_left.0, left_pulses as i64);
        state.add_pulses(map.encoder_right.0, right_pulses as i64);

        let (left_wheel, right_wheel) = (-left, right);
        state.rotate(
            map.imu_port,
            (left_wheel - right_wheel) / 2.0 * DEGREES_PER_SECOND * dt,
        );
    }
}

#[embassy_executor::task]
async fn script_task(
    commands: Vec<DriveCommand>,
    period: Duration,
) {
    for command in commands {
        DRIVE_CHANNEL.send(command).await;
        Timer::after(period).await;
    }
    // let the last command land before exiting
    Timer::after(period * 2).await;
    info!("script finished");
    std::process::exit(0);
}

fn load_map(path: Option<&PathBuf>) -> Result<RobotMap, String> {
    let Some(path) = path else {
        return Ok(RobotMap::default());
    };
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    RobotMap::from_json(&bytes).map_err(|e| format!("{}: {}", path.display(), e))
}

fn load_script(path: Option<&PathBuf>) -> Result<Vec<DriveCommand>, String> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("stdin: {}", e))?;
            text
        }
    };

    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            parse_command(line.as_bytes()).map_err(|e| format!("line {}: {}", n, e))
        })
        .collect()
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let opts: Opts = Opts::parse();
    let period = Duration::from_millis(opts.period_ms);

    let map: &'static RobotMap = match load_map(opts.map.as_ref()) {
        Ok(map) => mk_static!(RobotMap, map),
        Err(e) => {
            error!("wiring map rejected: {}", e);
            std::process::exit(1);
        }
    };
    let commands = match load_script(opts.script.as_ref()) {
        Ok(commands) => commands,
        Err(e) => {
            error!("bad command script: {}", e);
            std::process::exit(1);
        }
    };

    let bus: &'static RefCell<SimState> = mk_static!(RefCell<SimState>, RefCell::new(SimState::new()));
    let ctrl = match DriveController::new(&SimHardware::new(bus), map) {
        Ok(ctrl) => ctrl,
        Err(e) => {
            error!("drive base construction failed: {}", e);
            std::process::exit(1);
        }
    };
    info!(commands = commands.len(), period_ms = opts.period_ms, "starting simulation");

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(drive_task(ctrl)).unwrap();
        spawner.spawn(plant_task(bus, map, period)).unwrap();
        spawner.spawn(script_task(commands, period)).unwrap();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_defaults_to_20ms() {
        let opts = Opts::try_parse_from(["sim-bot"]).unwrap();
        assert_eq!(opts.period_ms, 20);
        assert!(opts.map.is_none());
        assert!(opts.script.is_none());
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(Opts::try_parse_from(["sim-bot", "--period-ms", "0"]).is_err());
        let opts = Opts::try_parse_from(["sim-bot", "--period-ms", "1"]).unwrap();
        assert_eq!(opts.period_ms, 1);
    }
}
