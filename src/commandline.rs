use crate::config::OutputFormat;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use pi30_lib::protocol::{
    BatteryRechargeVoltage, BatteryRedischargeVoltage, BatteryType, ChargerSourcePriority,
    OutputFrequency, OutputSourcePriority, ProtocolRevision,
};
use pi30_lib::registers::Flag;
use std::time::Duration;

fn default_device_name() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Show general status, operating mode and active warnings
    Status,
    /// Show serial number and firmware versions
    Identity,
    /// Show rating information and enabled/disabled flags
    Settings,
    /// Show all available inverter information
    All,
    /// Set the output source priority (utility-first, solar-first, sbu-first)
    SetOutputPriority { priority: OutputSourcePriority },
    /// Set the charger source priority (utility-first, solar-first, solar-and-utility, only-solar)
    SetChargePriority { priority: ChargerSourcePriority },
    /// Set the battery type (agm, flooded, user)
    SetBatteryType { battery_type: BatteryType },
    /// Set the voltage at which the inverter goes back to utility (e.g. 22.5)
    SetRechargeVoltage { voltage: BatteryRechargeVoltage },
    /// Set the voltage at which the inverter goes back to battery (e.g. 27.0 or full)
    SetRedischargeVoltage { voltage: BatteryRedischargeVoltage },
    /// Set the output frequency in Hz (50, 60)
    SetOutputFrequency { frequency: OutputFrequency },
    /// Enable a flag (e.g. buzzer, backlight, or its protocol letter)
    EnableFlag { flag: Flag },
    /// Disable a flag (e.g. buzzer, backlight, or its protocol letter)
    DisableFlag { flag: Flag },
    /// Run in daemon mode, periodically refreshing and printing registers
    Daemon {
        /// YAML file with interval, metrics and format; replaces the defaults below
        #[arg(long)]
        config_file: Option<String>,
        /// Interval for refreshing registers (e.g., "10s", "1m")
        #[arg(long, short, value_parser = humantime::parse_duration, default_value = "10s")]
        interval: Duration,
        /// Comma-separated list of register groups to refresh (status,identity,settings or all)
        #[arg(long, short, use_value_delimiter = true, default_value = "status")]
        metrics: Vec<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Debug)]
        format: OutputFormat,
    },
}

const fn about_text() -> &'static str {
    "PI30 solar inverter command line tool"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Serial port device path (e.g., /dev/ttyUSB0 on Linux, COM1 on Windows)
    #[arg(short, long, default_value_t = default_device_name())]
    pub device: String,

    /// Serial line speed
    #[arg(short, long, default_value_t = pi30_lib::serialport::DEFAULT_BAUD_RATE)]
    pub baud_rate: u32,

    #[command(subcommand)]
    pub command: CliCommands,

    /// Timeout for reading one response line (e.g., "500ms", "1s", "2s 500ms")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "1s")]
    pub timeout: Duration,

    /// Minimum delay between two commands (e.g., "50ms", "100ms")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "50ms")]
    pub delay: Duration,

    /// Protocol revision of the inverter firmware (legacy, extended)
    #[arg(long, default_value = "extended")]
    pub revision: ProtocolRevision,
}
