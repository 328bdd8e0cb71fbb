//! Decoded register state and the decoders that fill it from response payloads.
//!
//! Every decoder takes the payload of a validated line (start marker already removed) and
//! never fails: fields that run past the end of a truncated payload come out empty, and
//! numbers that do not parse come out as `0.0`.

use crate::error::ParseSettingError;
use std::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Width of the device status bitfield in QPIGS.
pub const STATUS_BITS: usize = 8;
/// Width of the QPIWS warning bitfield.
pub const WARNING_BITS: usize = 32;
/// Number of characters scanned in a QFLAG response.
pub const FLAGS_LENGTH: usize = 11;

/// Character marking battery mode in a QMOD response.
pub const BATTERY_MODE: u8 = b'B';

macro_rules! read_bit {
    ($word:expr,$position:expr) => {
        ($word >> $position) & 1 != 0
    };
}

/// Walks a space separated run of fixed width fields.
struct FieldCursor<'a> {
    payload: &'a [u8],
    position: usize,
}

impl<'a> FieldCursor<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            position: 0,
        }
    }

    /// Returns the next field, cut short if the payload ends early, and skips its separator.
    fn take(&mut self, width: usize) -> &'a [u8] {
        let start = self.position.min(self.payload.len());
        let end = (self.position + width).min(self.payload.len());
        self.position += width + 1;
        &self.payload[start..end]
    }
}

fn slice_field(payload: &[u8], offset: usize, width: usize) -> &[u8] {
    let start = offset.min(payload.len());
    let end = (offset + width).min(payload.len());
    &payload[start..end]
}

fn field_text(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

/// Interprets a run of `'0'`/`'1'` characters of nominal length `width`.
/// Bit `i` is taken from position `width - 1 - i`; missing or non-`'1'` characters read as 0.
fn decode_bits(text: &[u8], width: usize) -> u32 {
    (0..width).fold(0u32, |bits, i| match text.get(width - 1 - i) {
        Some(b'1') => bits | (1 << i),
        _ => bits,
    })
}

/// An ASCII decimal field and its parsed value.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct NumericRegister {
    pub text: String,
    pub value: f32,
}

impl NumericRegister {
    pub fn decode(field: &[u8]) -> Self {
        let text = field_text(field);
        let value = text.trim().parse::<f32>().unwrap_or_else(|_| {
            log::debug!("Cannot parse numeric field {text:?}, using 0");
            0.0
        });
        Self { text, value }
    }
}

/// QPIGS device status bits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StatusRegister {
    pub text: String,
    pub bits: u8,
}

impl StatusRegister {
    pub fn decode(field: &[u8]) -> Self {
        Self {
            text: field_text(field),
            bits: decode_bits(field, STATUS_BITS) as u8,
        }
    }

    pub fn bit(&self, position: u8) -> bool {
        position < 8 && read_bit!(self.bits, position)
    }

    pub fn ac_charging(&self) -> bool {
        read_bit!(self.bits, 0)
    }

    pub fn scc_charging(&self) -> bool {
        read_bit!(self.bits, 1)
    }

    pub fn charging(&self) -> bool {
        read_bit!(self.bits, 2)
    }

    pub fn load_status(&self) -> bool {
        read_bit!(self.bits, 4)
    }

    pub fn scc_version(&self) -> bool {
        read_bit!(self.bits, 5)
    }

    pub fn config_status(&self) -> bool {
        read_bit!(self.bits, 6)
    }
}

/// Field widths of a QPIGS response in wire order: sixteen numeric fields then the status bits.
pub type GeneralStatusSchedule = [usize; 17];

/// Response to the general status inquiry (QPIGS).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GeneralStatus {
    pub grid_voltage: NumericRegister,
    pub grid_frequency: NumericRegister,
    pub output_voltage: NumericRegister,
    pub output_frequency: NumericRegister,
    pub output_power_apparent: NumericRegister,
    pub output_power_active: NumericRegister,
    pub load_percent: NumericRegister,
    pub bus_voltage: NumericRegister,
    pub battery_voltage: NumericRegister,
    pub battery_current: NumericRegister,
    pub battery_capacity: NumericRegister,
    pub temperature: NumericRegister,
    pub solar_current: NumericRegister,
    pub solar_voltage: NumericRegister,
    pub battery_voltage_scc: NumericRegister,
    pub battery_discharge_current: NumericRegister,
    pub status: StatusRegister,
}

impl GeneralStatus {
    pub fn decode(payload: &[u8], schedule: &GeneralStatusSchedule) -> Self {
        let expected: usize = schedule.iter().map(|width| width + 1).sum::<usize>() - 1;
        if payload.len() < expected {
            log::debug!(
                "General status payload truncated - required={} received={}",
                expected,
                payload.len()
            );
        }
        let mut cursor = FieldCursor::new(payload);
        let mut widths = schedule.iter().copied();
        let mut next = || cursor.take(widths.next().unwrap_or(0));
        // Field initializers run in the order written, which is the wire order.
        Self {
            grid_voltage: NumericRegister::decode(next()),
            grid_frequency: NumericRegister::decode(next()),
            output_voltage: NumericRegister::decode(next()),
            output_frequency: NumericRegister::decode(next()),
            output_power_apparent: NumericRegister::decode(next()),
            output_power_active: NumericRegister::decode(next()),
            load_percent: NumericRegister::decode(next()),
            bus_voltage: NumericRegister::decode(next()),
            battery_voltage: NumericRegister::decode(next()),
            battery_current: NumericRegister::decode(next()),
            battery_capacity: NumericRegister::decode(next()),
            temperature: NumericRegister::decode(next()),
            solar_current: NumericRegister::decode(next()),
            solar_voltage: NumericRegister::decode(next()),
            battery_voltage_scc: NumericRegister::decode(next()),
            battery_discharge_current: NumericRegister::decode(next()),
            status: StatusRegister::decode(next()),
        }
    }
}

/// Operating mode reported by QMOD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Mode {
    PowerOn,
    Standby,
    Line,
    Battery,
    Fault,
    PowerSaving,
    Unknown(char),
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Unknown('\0')
    }
}

impl From<u8> for Mode {
    fn from(c: u8) -> Self {
        match c {
            b'P' => Mode::PowerOn,
            b'S' => Mode::Standby,
            b'L' => Mode::Line,
            BATTERY_MODE => Mode::Battery,
            b'F' => Mode::Fault,
            b'H' => Mode::PowerSaving,
            other => Mode::Unknown(other as char),
        }
    }
}

impl Mode {
    pub fn decode(payload: &[u8]) -> Self {
        payload.first().copied().map(Mode::from).unwrap_or_default()
    }

    pub fn is_battery(&self) -> bool {
        *self == Mode::Battery
    }
}

/// Named bits of the QPIWS warning word. Bits not listed here are reserved and kept as
/// received in [`WarningRegister::bits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Warning {
    InverterFault,
    BusOver,
    BusUnder,
    BusSoftFail,
    LineFail,
    OpvShort,
    InverterVoltageTooLow,
    InverterVoltageTooHigh,
    OverTemperature,
    FanLocked,
    BatteryVoltageHigh,
    BatteryVoltageLow,
    OverLoad,
    EepromFault,
    InverterOverCurrent,
    InverterSoftFail,
    SelfTestFail,
    DcVoltageOver,
    BatteryOpen,
    CurrentSensorFail,
    BatteryShort,
    PowerLimit,
    PvVoltageHigh,
    MpptOverload,
}

impl Warning {
    pub const ALL: [Warning; 24] = [
        Warning::InverterFault,
        Warning::BusOver,
        Warning::BusUnder,
        Warning::BusSoftFail,
        Warning::LineFail,
        Warning::OpvShort,
        Warning::InverterVoltageTooLow,
        Warning::InverterVoltageTooHigh,
        Warning::OverTemperature,
        Warning::FanLocked,
        Warning::BatteryVoltageHigh,
        Warning::BatteryVoltageLow,
        Warning::OverLoad,
        Warning::EepromFault,
        Warning::InverterOverCurrent,
        Warning::InverterSoftFail,
        Warning::SelfTestFail,
        Warning::DcVoltageOver,
        Warning::BatteryOpen,
        Warning::CurrentSensorFail,
        Warning::BatteryShort,
        Warning::PowerLimit,
        Warning::PvVoltageHigh,
        Warning::MpptOverload,
    ];

    /// Bit index inside the decoded warning word.
    pub const fn bit(self) -> u8 {
        match self {
            Warning::InverterFault => 1,
            Warning::BusOver => 2,
            Warning::BusUnder => 3,
            Warning::BusSoftFail => 4,
            Warning::LineFail => 5,
            Warning::OpvShort => 6,
            Warning::InverterVoltageTooLow => 7,
            Warning::InverterVoltageTooHigh => 8,
            Warning::OverTemperature => 9,
            Warning::FanLocked => 10,
            Warning::BatteryVoltageHigh => 11,
            Warning::BatteryVoltageLow => 12,
            // bit 13 reserved
            Warning::OverLoad => 14,
            Warning::EepromFault => 15,
            Warning::InverterOverCurrent => 16,
            Warning::InverterSoftFail => 17,
            Warning::SelfTestFail => 18,
            Warning::DcVoltageOver => 19,
            Warning::BatteryOpen => 20,
            Warning::CurrentSensorFail => 21,
            Warning::BatteryShort => 22,
            Warning::PowerLimit => 23,
            Warning::PvVoltageHigh => 24,
            Warning::MpptOverload => 25,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::InverterFault => write!(f, "Inverter fault"),
            Warning::BusOver => write!(f, "Bus voltage too high"),
            Warning::BusUnder => write!(f, "Bus voltage too low"),
            Warning::BusSoftFail => write!(f, "Bus soft start failed"),
            Warning::LineFail => write!(f, "Line fail"),
            Warning::OpvShort => write!(f, "Output short circuited"),
            Warning::InverterVoltageTooLow => write!(f, "Inverter voltage too low"),
            Warning::InverterVoltageTooHigh => write!(f, "Inverter voltage too high"),
            Warning::OverTemperature => write!(f, "Over temperature"),
            Warning::FanLocked => write!(f, "Fan locked"),
            Warning::BatteryVoltageHigh => write!(f, "Battery voltage too high"),
            Warning::BatteryVoltageLow => write!(f, "Battery voltage too low"),
            Warning::OverLoad => write!(f, "Overload"),
            Warning::EepromFault => write!(f, "EEPROM fault"),
            Warning::InverterOverCurrent => write!(f, "Inverter over current"),
            Warning::InverterSoftFail => write!(f, "Inverter soft start failed"),
            Warning::SelfTestFail => write!(f, "Self test failed"),
            Warning::DcVoltageOver => write!(f, "DC voltage on output too high"),
            Warning::BatteryOpen => write!(f, "Battery open"),
            Warning::CurrentSensorFail => write!(f, "Current sensor failed"),
            Warning::BatteryShort => write!(f, "Battery short circuited"),
            Warning::PowerLimit => write!(f, "Power limit"),
            Warning::PvVoltageHigh => write!(f, "PV voltage too high"),
            Warning::MpptOverload => write!(f, "MPPT overload"),
        }
    }
}

/// QPIWS warning bits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct WarningRegister {
    pub text: String,
    pub bits: u32,
}

impl WarningRegister {
    pub fn decode(payload: &[u8]) -> Self {
        let field = slice_field(payload, 0, WARNING_BITS);
        Self {
            text: field_text(field),
            bits: decode_bits(field, WARNING_BITS),
        }
    }

    pub fn bit(&self, position: u8) -> bool {
        position < 32 && read_bit!(self.bits, position)
    }

    pub fn is_active(&self, warning: Warning) -> bool {
        read_bit!(self.bits, warning.bit())
    }

    pub fn active_warnings(&self) -> Vec<Warning> {
        Warning::ALL
            .into_iter()
            .filter(|warning| self.is_active(*warning))
            .collect()
    }
}

/// Letters of the QFLAG response and the `PE`/`PD` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Flag {
    Buzzer,
    OverloadBypass,
    PowerSaving,
    LcdTimeout,
    OverloadRestart,
    OverTemperatureRestart,
    Backlight,
    Alarm,
    FaultCodeRecord,
}

impl Flag {
    pub const fn letter(self) -> u8 {
        match self {
            Flag::Buzzer => b'a',
            Flag::OverloadBypass => b'b',
            Flag::PowerSaving => b'j',
            Flag::LcdTimeout => b'k',
            Flag::OverloadRestart => b'u',
            Flag::OverTemperatureRestart => b'v',
            Flag::Backlight => b'x',
            Flag::Alarm => b'y',
            Flag::FaultCodeRecord => b'z',
        }
    }

    pub fn from_letter(letter: u8) -> Option<Self> {
        Some(match letter {
            b'a' => Flag::Buzzer,
            b'b' => Flag::OverloadBypass,
            b'j' => Flag::PowerSaving,
            b'k' => Flag::LcdTimeout,
            b'u' => Flag::OverloadRestart,
            b'v' => Flag::OverTemperatureRestart,
            b'x' => Flag::Backlight,
            b'y' => Flag::Alarm,
            b'z' => Flag::FaultCodeRecord,
            _ => return None,
        })
    }

    pub const fn label(self) -> &'static str {
        match self {
            Flag::Buzzer => "buzzer",
            Flag::OverloadBypass => "overload-bypass",
            Flag::PowerSaving => "power-saving",
            Flag::LcdTimeout => "lcd-timeout",
            Flag::OverloadRestart => "overload-restart",
            Flag::OverTemperatureRestart => "over-temperature-restart",
            Flag::Backlight => "backlight",
            Flag::Alarm => "alarm",
            Flag::FaultCodeRecord => "fault-code-record",
        }
    }
}

impl FromStr for Flag {
    type Err = ParseSettingError;

    /// Accepts the label (`buzzer`) or the protocol letter (`a`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [Flag; 9] = [
            Flag::Buzzer,
            Flag::OverloadBypass,
            Flag::PowerSaving,
            Flag::LcdTimeout,
            Flag::OverloadRestart,
            Flag::OverTemperatureRestart,
            Flag::Backlight,
            Flag::Alarm,
            Flag::FaultCodeRecord,
        ];
        ALL.into_iter()
            .find(|flag| {
                flag.label().eq_ignore_ascii_case(s) || s.as_bytes() == &[flag.letter()]
            })
            .ok_or_else(|| ParseSettingError {
                kind: "flag",
                value: s.to_string(),
                expected: ALL.map(Flag::label).join(", "),
            })
    }
}

/// Enable/disable flags from QFLAG.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Flags {
    pub buzzer: bool,
    pub overload_bypass: bool,
    pub power_saving: bool,
    pub lcd_timeout: bool,
    pub overload_restart: bool,
    pub over_temperature_restart: bool,
    pub backlight: bool,
    pub alarm: bool,
    pub fault_code_record: bool,
}

impl Flags {
    /// Scans `E`/`D` runs: every recognised letter takes the state of the last `E` or `D`
    /// seen before it (enabled if none was). Other letters are skipped.
    pub fn decode(payload: &[u8]) -> Self {
        let mut flags = Self::default();
        let mut enabled = true;
        for &c in payload.iter().take(FLAGS_LENGTH) {
            match c {
                b'E' => enabled = true,
                b'D' => enabled = false,
                letter => match Flag::from_letter(letter) {
                    Some(flag) => flags.set(flag, enabled),
                    None => log::trace!("Ignoring flag letter {:?}", letter as char),
                },
            }
        }
        flags
    }

    fn slot(&mut self, flag: Flag) -> &mut bool {
        match flag {
            Flag::Buzzer => &mut self.buzzer,
            Flag::OverloadBypass => &mut self.overload_bypass,
            Flag::PowerSaving => &mut self.power_saving,
            Flag::LcdTimeout => &mut self.lcd_timeout,
            Flag::OverloadRestart => &mut self.overload_restart,
            Flag::OverTemperatureRestart => &mut self.over_temperature_restart,
            Flag::Backlight => &mut self.backlight,
            Flag::Alarm => &mut self.alarm,
            Flag::FaultCodeRecord => &mut self.fault_code_record,
        }
    }

    pub fn set(&mut self, flag: Flag, enabled: bool) {
        *self.slot(flag) = enabled;
    }

    pub fn get(&self, flag: Flag) -> bool {
        let mut copy = *self;
        *copy.slot(flag)
    }
}

/// Position of the serial number in a QID payload.
pub const SERIAL_NUMBER_FIELD: (usize, usize) = (0, 14);
/// Position of the version behind the `VERFW:` header of a QVFW payload.
pub const FIRMWARE_PRIMARY_FIELD: (usize, usize) = (6, 8);
/// Position of the version behind the `VERFW2:` header of a QVFW2 payload.
pub const FIRMWARE_SECONDARY_FIELD: (usize, usize) = (7, 8);

/// Serial number and firmware versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DeviceIdentity {
    pub serial_number: String,
    pub firmware_primary: String,
    pub firmware_secondary: String,
}

impl DeviceIdentity {
    pub fn decode_serial_number(payload: &[u8]) -> String {
        let (offset, width) = SERIAL_NUMBER_FIELD;
        field_text(slice_field(payload, offset, width))
    }

    pub fn decode_firmware_primary(payload: &[u8]) -> String {
        let (offset, width) = FIRMWARE_PRIMARY_FIELD;
        field_text(slice_field(payload, offset, width))
    }

    pub fn decode_firmware_secondary(payload: &[u8]) -> String {
        let (offset, width) = FIRMWARE_SECONDARY_FIELD;
        field_text(slice_field(payload, offset, width))
    }
}
