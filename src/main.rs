use anyhow::{bail, Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use pi30_lib::inverter::Inverter;
use pi30_lib::serialport::SerialLineTransport;
use std::{ops::Deref, panic};

mod commandline;
mod config;
mod daemon;

use commandline::{CliArgs, CliCommands};

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

macro_rules! print_status {
    ($inverter:expr) => {{
        if $inverter.refresh_status() {
            warn!("Some status registers could not be read");
        }
        println!("Status: {:?}", daemon::status_snapshot(&$inverter));
    }};
}
macro_rules! print_identity {
    ($inverter:expr) => {{
        if $inverter.refresh_identity() {
            warn!("Some identity registers could not be read");
        }
        println!("Identity: {:?}", $inverter.identity());
    }};
}
macro_rules! print_settings {
    ($inverter:expr) => {{
        if $inverter.refresh_settings() {
            warn!("Some setting registers could not be read");
        }
        println!("Settings: {:?}", daemon::settings_snapshot(&$inverter));
    }};
}
macro_rules! apply_setting {
    ($inverter:expr, $call:ident($($arg:expr),*), $what:expr) => {{
        if !$inverter.$call($($arg),*) {
            bail!("Inverter did not accept {}", $what);
        }
        println!("OK");
    }};
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    let mut transport = SerialLineTransport::new(&args.device, args.baud_rate)
        .with_context(|| format!("Cannot open serial port '{}'", args.device))?;
    transport
        .set_timeout(args.timeout)
        .with_context(|| "Cannot set serial timeout")?;
    transport.set_delay(args.delay);

    let mut inverter = Inverter::new(transport, args.revision);

    match args.command {
        CliCommands::Status => print_status!(inverter),
        CliCommands::Identity => print_identity!(inverter),
        CliCommands::Settings => print_settings!(inverter),
        CliCommands::All => {
            print_identity!(inverter);
            print_status!(inverter);
            print_settings!(inverter);
        }
        CliCommands::SetOutputPriority { priority } => apply_setting!(
            inverter,
            set_output_priority(priority),
            format!("output priority '{priority}'")
        ),
        CliCommands::SetChargePriority { priority } => apply_setting!(
            inverter,
            set_charge_priority(priority),
            format!("charge priority '{priority}'")
        ),
        CliCommands::SetBatteryType { battery_type } => apply_setting!(
            inverter,
            set_battery_type(battery_type),
            format!("battery type '{battery_type}'")
        ),
        CliCommands::SetRechargeVoltage { voltage } => apply_setting!(
            inverter,
            set_battery_recharge_voltage(voltage),
            format!("recharge voltage '{voltage}'")
        ),
        CliCommands::SetRedischargeVoltage { voltage } => apply_setting!(
            inverter,
            set_battery_redischarge_voltage(voltage),
            format!("re-discharge voltage '{voltage}'")
        ),
        CliCommands::SetOutputFrequency { frequency } => apply_setting!(
            inverter,
            set_output_frequency(frequency),
            format!("output frequency '{frequency}'")
        ),
        CliCommands::EnableFlag { flag } => apply_setting!(
            inverter,
            set_flag(flag, true),
            format!("enabling flag '{}'", flag.label())
        ),
        CliCommands::DisableFlag { flag } => apply_setting!(
            inverter,
            set_flag(flag, false),
            format!("disabling flag '{}'", flag.label())
        ),
        CliCommands::Daemon {
            config_file,
            interval,
            metrics,
            format,
        } => {
            let config = match config_file {
                Some(path) => config::DaemonConfig::load(&path)
                    .with_context(|| format!("Failed to open daemon config file at '{path}'"))?,
                None => config::DaemonConfig {
                    interval,
                    metrics,
                    format,
                },
            };
            daemon::run(inverter, config)?;
        }
    }

    Ok(())
}
