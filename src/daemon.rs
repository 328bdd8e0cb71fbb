use anyhow::{bail, Result};
use log::{error, info, warn};
use pi30_lib::inverter::Inverter;
use pi30_lib::registers::{DeviceIdentity, Flags, GeneralStatus, Mode, WarningRegister};
use pi30_lib::transport::LineTransport;
use serde::Serialize;

use crate::config::{DaemonConfig, OutputFormat};

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub general_status: GeneralStatus,
    pub mode: Mode,
    pub warnings: WarningRegister,
    pub active_warnings: Vec<String>,
    pub on_battery: bool,
    pub charging: bool,
    pub solar_charging: bool,
    pub grid_charging: bool,
}

#[derive(Debug, Serialize)]
pub struct SettingsSnapshot {
    pub rating: String,
    pub flags: Flags,
}

#[derive(Debug)]
enum FetchedData {
    Status(StatusSnapshot),
    Identity(DeviceIdentity),
    Settings(SettingsSnapshot),
}

impl FetchedData {
    fn to_json_value(&self) -> Result<serde_json::Value> {
        match self {
            FetchedData::Status(s) => serde_json::to_value(s).map_err(Into::into),
            FetchedData::Identity(s) => serde_json::to_value(s).map_err(Into::into),
            FetchedData::Settings(s) => serde_json::to_value(s).map_err(Into::into),
        }
    }

    fn as_debug_string(&self) -> String {
        match self {
            FetchedData::Status(s) => format!("{s:?}"),
            FetchedData::Identity(s) => format!("{s:?}"),
            FetchedData::Settings(s) => format!("{s:?}"),
        }
    }
}

pub fn status_snapshot<T>(inverter: &Inverter<T>) -> StatusSnapshot {
    StatusSnapshot {
        general_status: inverter.general_status().clone(),
        mode: inverter.mode(),
        warnings: inverter.warnings().clone(),
        active_warnings: inverter
            .warnings()
            .active_warnings()
            .iter()
            .map(ToString::to_string)
            .collect(),
        on_battery: inverter.is_on_battery(),
        charging: inverter.is_charging(),
        solar_charging: inverter.is_solar_charging(),
        grid_charging: inverter.is_grid_charging(),
    }
}

pub fn settings_snapshot<T>(inverter: &Inverter<T>) -> SettingsSnapshot {
    SettingsSnapshot {
        rating: inverter.rating().to_string(),
        flags: *inverter.flags(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Status,
    Identity,
    Settings,
}

impl Metric {
    const ALL: [Metric; 3] = [Metric::Status, Metric::Identity, Metric::Settings];

    fn name(self) -> &'static str {
        match self {
            Metric::Status => "status",
            Metric::Identity => "identity",
            Metric::Settings => "settings",
        }
    }

    /// Refreshes the register group; `true` means part of it may be stale.
    fn refresh<T: LineTransport>(self, inverter: &mut Inverter<T>) -> bool {
        match self {
            Metric::Status => inverter.refresh_status(),
            Metric::Identity => inverter.refresh_identity(),
            Metric::Settings => inverter.refresh_settings(),
        }
    }

    fn fetch<T: LineTransport>(self, inverter: &Inverter<T>) -> FetchedData {
        match self {
            Metric::Status => FetchedData::Status(status_snapshot(inverter)),
            Metric::Identity => FetchedData::Identity(inverter.identity().clone()),
            Metric::Settings => FetchedData::Settings(settings_snapshot(inverter)),
        }
    }
}

fn parse_metrics(names: &[String]) -> Result<Vec<Metric>> {
    if names.iter().any(|m| m == "all") {
        info!("Fetching all metrics due to 'all' flag.");
        return Ok(Metric::ALL.to_vec());
    }
    let mut metrics = Vec::with_capacity(names.len());
    for name in names {
        match Metric::ALL.into_iter().find(|m| m.name() == name.as_str()) {
            Some(metric) if !metrics.contains(&metric) => metrics.push(metric),
            Some(_) => {}
            None => bail!("Unknown metric name '{}'", name),
        }
    }
    Ok(metrics)
}

pub fn run<T: LineTransport>(mut inverter: Inverter<T>, config: DaemonConfig) -> Result<()> {
    info!("Starting daemon mode: {config:?}");
    let metrics = parse_metrics(&config.metrics)?;

    loop {
        let mut fetched_data = Vec::with_capacity(metrics.len());
        for metric in &metrics {
            info!("Refreshing metric: {}", metric.name());
            if metric.refresh(&mut inverter) {
                warn!("Metric '{}' is partially stale", metric.name());
            }
            fetched_data.push((metric.name(), metric.fetch(&inverter)));
        }

        match config.format {
            OutputFormat::Debug => {
                println!("--- Data at {} ---", chrono::Local::now().to_rfc3339());
                for (name, data) in &fetched_data {
                    println!("{}: {}", name, data.as_debug_string());
                }
                println!("--------------------------");
            }
            OutputFormat::Json => {
                let mut data_to_print = serde_json::Map::new();
                data_to_print.insert(
                    "timestamp".to_string(),
                    serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
                );
                for (name, data) in &fetched_data {
                    match data.to_json_value() {
                        Ok(val) => {
                            data_to_print.insert(name.to_string(), val);
                        }
                        Err(e) => error!("Failed to serialize '{name}': {e}"),
                    }
                }
                match serde_json::to_string(&data_to_print) {
                    Ok(json) => println!("{json}"),
                    Err(e) => error!("Failed to serialize data to JSON string: {e}"),
                }
            }
        }
        std::thread::sleep(config.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn metric_names() {
        assert_eq!(
            parse_metrics(&names(&["identity", "status", "identity"])).unwrap(),
            vec![Metric::Identity, Metric::Status]
        );
        assert_eq!(
            parse_metrics(&names(&["status", "all"])).unwrap(),
            Metric::ALL.to_vec()
        );
        assert!(parse_metrics(&names(&["soc"])).is_err());
    }
}
