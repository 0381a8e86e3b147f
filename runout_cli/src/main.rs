//! `runout`: filament runout monitor.

mod bridge;
mod cli;
mod error_fmt;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use runout_config::{Config, Numbering, PinSetting};
use runout_core::error::RunoutError;
use runout_core::hw_error::map_sensor_error;
use runout_core::{PinFactory, Runtime, SensorConfig, sample_presence};
use runout_hardware::SimHandle;
use runout_traits::{Level, MonotonicClock, SensorPin};

use crate::bridge::JsonLines;
use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.log_level.as_deref(), cli.json, &cfg.logging);
    tracing::debug!(path = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run { sim_level } => run_monitor(cli.config, cfg, sim_level),
        Commands::TestSensor {
            pin,
            power,
            trigger,
            numbering,
            sim_level,
        } => {
            let mut cfg = cfg;
            if let Some(p) = pin {
                cfg.sensor.pin = PinSetting::Number(p);
            }
            if let Some(p) = power {
                cfg.sensor.power = p.into();
            }
            if let Some(t) = trigger {
                cfg.sensor.trigger = t.into();
            }
            if let Some(n) = numbering {
                cfg.sensor.numbering = n.into();
            }
            cfg.validate()
                .map_err(|e| RunoutError::Config(e.to_string()))?;
            test_sensor(&cfg, sim_level, cli.json)
        }
        Commands::CheckConfig => check_config(&cfg, cli.json),
    }
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| RunoutError::Config(format!("read {}: {e}", path.display())))?;
    let cfg = runout_config::load_toml(&text)
        .map_err(|e| RunoutError::Config(format!("parse {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| RunoutError::Config(e.to_string()))?;
    Ok(cfg)
}

fn init_tracing(cli_level: Option<&str>, json: bool, logging: &runout_config::Logging) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = cli_level
        .or(logging.level.as_deref())
        .unwrap_or("info")
        .to_string();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = logging.file.as_ref().map(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "runout.log".into());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_writer(writer).with_ansi(false)
    });
    let to_stderr = file_layer.is_none();
    let stderr_json = (to_stderr && json).then(|| fmt::layer().json().with_writer(std::io::stderr));
    let stderr_text = (to_stderr && !json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_json)
        .with(stderr_text)
        .try_init();
}

/// Simulated line when asked for, or when built without GPIO support.
fn sim_line(sim_level: Option<u8>) -> Option<SimHandle> {
    let level = match sim_level {
        Some(l) => Some(l),
        None if cfg!(all(feature = "hardware", target_os = "linux")) => None,
        None => Some(0),
    };
    level.map(|l| SimHandle::new(Level::from_bit(l)))
}

fn pin_factory(sim: Option<SimHandle>) -> PinFactory {
    match sim {
        Some(line) => {
            tracing::info!(level = ?line.level(), "using simulated sensor line");
            Box::new(move |bcm, _pull| Ok(Box::new(line.open(bcm)) as Box<dyn SensorPin + Send>))
        }
        None => gpio_factory(),
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn gpio_factory() -> PinFactory {
    Box::new(runout_hardware::gpio::open_sensor_pin)
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn gpio_factory() -> PinFactory {
    Box::new(|_, _| Err("built without GPIO support; pass --sim-level".into()))
}

fn run_monitor(config_path: PathBuf, cfg: Config, sim_level: Option<u8>) -> eyre::Result<()> {
    for w in cfg.warnings() {
        tracing::warn!("{w}");
    }
    let sensor = SensorConfig::from(&cfg);
    match sensor.pin {
        Some(pin) => tracing::info!(pin = pin.number, bcm = pin.bcm, "monitor starting"),
        None => tracing::info!("monitor starting without a sensor pin"),
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .wrap_err("install Ctrl-C handler")?;

    let sim = sim_line(sim_level);
    let out = JsonLines::new(std::io::stdout());
    let rt = Runtime::spawn(
        sensor,
        out.clone(),
        out.clone(),
        pin_factory(sim.clone()),
        MonotonicClock::new(),
    )?;
    let served = bridge::serve(&rt, &config_path, sim.as_ref(), &out, &shutdown);
    rt.shutdown();
    tracing::info!("monitor stopped");
    served
}

fn test_sensor(cfg: &Config, sim_level: Option<u8>, json: bool) -> eyre::Result<()> {
    let sensor = SensorConfig::from(cfg);
    let Some(pin_id) = sensor.pin else {
        return Err(RunoutError::Config("sensor.pin is not configured".into()).into());
    };
    let mut factory = pin_factory(sim_line(sim_level));
    let mut pin = factory(pin_id.bcm, sensor.pull()).map_err(|e| map_sensor_error(e.as_ref()))?;
    let present = sample_presence(pin.as_mut(), &sensor, MonotonicClock::new())?;
    let triggered = u8::from(!present);
    tracing::info!(pin = pin_id.number, present, "sensor test");
    if json {
        println!(
            "{}",
            serde_json::json!({ "triggered": triggered, "pin": pin_id.number, "bcm": pin_id.bcm })
        );
    } else {
        println!("triggered: {triggered}");
    }
    Ok(())
}

/// Refuse pins a peripheral (I2C, SPI, UART) has claimed.
#[cfg(all(feature = "hardware", target_os = "linux"))]
fn check_pin_free(bcm: u8) -> eyre::Result<()> {
    use runout_hardware::gpio::{PinFunction, query_pin_function};
    match query_pin_function(bcm) {
        Ok(PinFunction::Alternate(alt)) => Err(RunoutError::PinBusy(format!(
            "gpio {bcm} is assigned to peripheral function ALT{alt}"
        ))
        .into()),
        Ok(function) => {
            tracing::debug!(bcm, ?function, "pin function");
            Ok(())
        }
        Err(e) => Err(map_sensor_error(&e).into()),
    }
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn check_pin_free(_bcm: u8) -> eyre::Result<()> {
    Ok(())
}

fn check_config(cfg: &Config, json: bool) -> eyre::Result<()> {
    if let Some(bcm) = cfg.bcm_pin() {
        check_pin_free(bcm)?;
    }
    let numbering = match cfg.sensor.numbering {
        Numbering::Board => "board",
        Numbering::Bcm => "bcm",
    };
    let warnings = cfg.warnings();
    if json {
        let pin = match cfg.sensor.pin {
            PinSetting::Number(n) => serde_json::json!(n),
            PinSetting::Disabled => serde_json::Value::Null,
        };
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "pin": pin,
                "numbering": numbering,
                "bcm": cfg.bcm_pin(),
                "command": cfg.change.command,
                "warnings": warnings,
            })
        );
        return Ok(());
    }
    match (cfg.sensor.pin, cfg.bcm_pin()) {
        (PinSetting::Number(n), Some(bcm)) => {
            println!("config ok: sensor on pin {n} ({numbering} numbering, BCM {bcm})");
        }
        _ => println!("config ok: sensor disabled"),
    }
    println!(
        "power: {:?}, trigger: {:?}, on runout: {:?} `{}`",
        cfg.sensor.power, cfg.sensor.trigger, cfg.change.action, cfg.change.command
    );
    for w in warnings {
        println!("warning: {w}");
    }
    Ok(())
}
