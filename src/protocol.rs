//! Command vocabulary of the inverter.
//!
//! Inquiries are constant strings sent with a precomputed checksum. Setting commands are
//! assembled from a prefix and the wire token of their value and checksummed when built.

use crate::error::ParseSettingError;
use crate::frame;
use crate::registers::{Flag, GeneralStatusSchedule};
use std::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Receive buffer size for one response line, terminator included.
pub const MAX_LINE_LENGTH: usize = 256;

/// QPIGS field widths, shared by both protocol revisions.
pub const GENERAL_STATUS_SCHEDULE: GeneralStatusSchedule =
    [5, 4, 5, 4, 4, 4, 3, 3, 5, 2, 3, 4, 4, 5, 5, 5, 8];

/// A constant inquiry and the checksum of its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inquiry {
    pub name: &'static str,
    crc: [u8; 2],
}

impl Inquiry {
    const fn new(name: &'static str, crc: [u8; 2]) -> Self {
        Self { name, crc }
    }

    /// Wire bytes: text, checksum, terminator.
    pub fn request(&self) -> Vec<u8> {
        let mut text = Vec::with_capacity(self.name.len() + 2);
        text.extend_from_slice(self.name.as_bytes());
        text.extend_from_slice(&self.crc);
        frame::build_precomputed(&text)
    }
}

/// Device general status parameters inquiry
pub const GENERAL_STATUS: Inquiry = Inquiry::new("QPIGS", [0xB7, 0xA9]);
/// Device mode inquiry
pub const MODE_INQUIRY: Inquiry = Inquiry::new("QMOD", [0x49, 0xC1]);
/// Device warning status inquiry
pub const WARNING_STATUS: Inquiry = Inquiry::new("QPIWS", [0xB4, 0xDA]);
/// Device serial number inquiry
pub const SERIAL_INQUIRY: Inquiry = Inquiry::new("QID", [0xD6, 0xEA]);
/// Main CPU firmware version inquiry
pub const FIRMWARE_PRIMARY_INQUIRY: Inquiry = Inquiry::new("QVFW", [0x62, 0x99]);
/// Secondary CPU firmware version inquiry
pub const FIRMWARE_SECONDARY_INQUIRY: Inquiry = Inquiry::new("QVFW2", [0xC3, 0xF5]);
/// Device rating information inquiry
pub const RATING_INQUIRY: Inquiry = Inquiry::new("QPIRI", [0xF8, 0x54]);
/// Device flag status inquiry
pub const FLAG_INQUIRY: Inquiry = Inquiry::new("QFLAG", [0x98, 0x74]);

/// Protocol revision spoken by the inverter firmware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtocolRevision {
    /// Inquiries only.
    Legacy,
    /// Adds the flag inquiry and all setting commands.
    #[default]
    Extended,
}

impl ProtocolRevision {
    pub fn general_status_schedule(&self) -> &'static GeneralStatusSchedule {
        &GENERAL_STATUS_SCHEDULE
    }

    pub fn supports_inquiry(&self, inquiry: &Inquiry) -> bool {
        match self {
            ProtocolRevision::Legacy => *inquiry != FLAG_INQUIRY,
            ProtocolRevision::Extended => true,
        }
    }

    pub fn supports_settings(&self) -> bool {
        *self == ProtocolRevision::Extended
    }
}

impl FromStr for ProtocolRevision {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(ProtocolRevision::Legacy),
            "extended" => Ok(ProtocolRevision::Extended),
            _ => Err(ParseSettingError {
                kind: "protocol revision",
                value: s.to_string(),
                expected: "legacy, extended".to_string(),
            }),
        }
    }
}

/// Defines a closed set of setting values and their wire tokens.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $token:literal, $label:literal;)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "serde", derive(Serialize))]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// Value as sent behind the command prefix.
            pub const fn token(self) -> &'static str {
                match self {
                    $($name::$variant => $token,)*
                }
            }

            pub const fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = ParseSettingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|value| value.label().eq_ignore_ascii_case(s) || value.token() == s)
                    .ok_or_else(|| ParseSettingError {
                        kind: $kind,
                        value: s.to_string(),
                        expected: $name::ALL
                            .iter()
                            .map(|value| value.label())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

wire_enum!(
    /// Which source feeds the output (`POP`).
    OutputSourcePriority, "output source priority" {
        UtilityFirst => "00", "utility-first";
        SolarFirst => "01", "solar-first";
        SbuFirst => "02", "sbu-first";
    }
);

wire_enum!(
    /// Which source charges the battery (`PCP`).
    ChargerSourcePriority, "charger source priority" {
        UtilityFirst => "00", "utility-first";
        SolarFirst => "01", "solar-first";
        SolarAndUtility => "02", "solar-and-utility";
        OnlySolar => "03", "only-solar";
    }
);

wire_enum!(
    /// Battery chemistry (`PBT`).
    BatteryType, "battery type" {
        Agm => "00", "agm";
        Flooded => "01", "flooded";
        User => "02", "user";
    }
);

wire_enum!(
    /// Voltage at which the inverter returns to utility when on battery (`PBCV`).
    BatteryRechargeVoltage, "battery recharge voltage" {
        V22_0 => "22.0", "22.0";
        V22_5 => "22.5", "22.5";
        V23_0 => "23.0", "23.0";
        V23_5 => "23.5", "23.5";
        V24_0 => "24.0", "24.0";
        V24_5 => "24.5", "24.5";
        V25_0 => "25.0", "25.0";
        V25_5 => "25.5", "25.5";
    }
);

wire_enum!(
    /// Voltage at which the inverter goes back to battery after utility charging (`PBDV`).
    BatteryRedischargeVoltage, "battery re-discharge voltage" {
        Full => "00.0", "full";
        V25_0 => "25.0", "25.0";
        V25_5 => "25.5", "25.5";
        V26_0 => "26.0", "26.0";
        V26_5 => "26.5", "26.5";
        V27_0 => "27.0", "27.0";
        V27_5 => "27.5", "27.5";
        V28_0 => "28.0", "28.0";
        V28_5 => "28.5", "28.5";
        V29_0 => "29.0", "29.0";
    }
);

wire_enum!(
    /// Output frequency (`F`).
    OutputFrequency, "output frequency" {
        Hz50 => "50", "50";
        Hz60 => "60", "60";
    }
);

/// A setting command. Only valid under [`ProtocolRevision::Extended`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    OutputPriority(OutputSourcePriority),
    ChargePriority(ChargerSourcePriority),
    BatteryType(BatteryType),
    BatteryRechargeVoltage(BatteryRechargeVoltage),
    BatteryRedischargeVoltage(BatteryRedischargeVoltage),
    OutputFrequency(OutputFrequency),
    EnableFlag(Flag),
    DisableFlag(Flag),
}

impl Setting {
    pub fn prefix(&self) -> &'static str {
        match self {
            Setting::OutputPriority(_) => "POP",
            Setting::ChargePriority(_) => "PCP",
            Setting::BatteryType(_) => "PBT",
            Setting::BatteryRechargeVoltage(_) => "PBCV",
            Setting::BatteryRedischargeVoltage(_) => "PBDV",
            Setting::OutputFrequency(_) => "F",
            Setting::EnableFlag(_) => "PE",
            Setting::DisableFlag(_) => "PD",
        }
    }

    /// The ASCII command before the checksum is appended.
    pub fn command_text(&self) -> String {
        let prefix = self.prefix();
        match self {
            Setting::OutputPriority(value) => format!("{prefix}{}", value.token()),
            Setting::ChargePriority(value) => format!("{prefix}{}", value.token()),
            Setting::BatteryType(value) => format!("{prefix}{}", value.token()),
            Setting::BatteryRechargeVoltage(value) => format!("{prefix}{}", value.token()),
            Setting::BatteryRedischargeVoltage(value) => format!("{prefix}{}", value.token()),
            Setting::OutputFrequency(value) => format!("{prefix}{}", value.token()),
            Setting::EnableFlag(flag) | Setting::DisableFlag(flag) => {
                format!("{prefix}{}", flag.letter() as char)
            }
        }
    }

    pub fn request(&self) -> Vec<u8> {
        frame::build_command(&self.command_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc;

    #[test]
    fn precomputed_checksums_match() {
        for inquiry in [
            GENERAL_STATUS,
            MODE_INQUIRY,
            WARNING_STATUS,
            SERIAL_INQUIRY,
            FIRMWARE_PRIMARY_INQUIRY,
            FIRMWARE_SECONDARY_INQUIRY,
            RATING_INQUIRY,
            FLAG_INQUIRY,
        ] {
            assert_eq!(
                inquiry.request(),
                frame::build_command(inquiry.name),
                "{}",
                inquiry.name
            );
        }
    }

    #[test]
    fn inquiry_wire_bytes() {
        assert_eq!(MODE_INQUIRY.request(), b"QMOD\x49\xC1\r");
        assert_eq!(SERIAL_INQUIRY.request(), b"QID\xD6\xEA\r");
    }

    #[test]
    fn output_priority_command() {
        let setting = Setting::OutputPriority(OutputSourcePriority::SolarFirst);
        assert_eq!(setting.command_text(), "POP01");
        let request = setting.request();
        assert!(request.starts_with(b"POP01"));
        assert_eq!(request.len(), 8);
        assert!(crc::validate_crc(&request[..request.len() - 1]));
        assert_eq!(request[request.len() - 1], b'\r');
    }

    #[test]
    fn setting_tokens() {
        assert_eq!(
            Setting::ChargePriority(ChargerSourcePriority::OnlySolar).command_text(),
            "PCP03"
        );
        assert_eq!(Setting::BatteryType(BatteryType::User).command_text(), "PBT02");
        assert_eq!(BatteryRechargeVoltage::ALL[1].token(), "22.5");
        assert_eq!(
            Setting::BatteryRechargeVoltage(BatteryRechargeVoltage::V22_5).command_text(),
            "PBCV22.5"
        );
        assert_eq!(
            Setting::BatteryRedischargeVoltage(BatteryRedischargeVoltage::Full).command_text(),
            "PBDV00.0"
        );
        assert_eq!(
            Setting::OutputFrequency(OutputFrequency::Hz60).command_text(),
            "F60"
        );
        assert_eq!(Setting::EnableFlag(Flag::Buzzer).command_text(), "PEa");
        assert_eq!(
            Setting::DisableFlag(Flag::FaultCodeRecord).command_text(),
            "PDz"
        );
    }

    #[test]
    fn parse_setting_values() {
        assert_eq!(
            "SBU-first".parse::<OutputSourcePriority>(),
            Ok(OutputSourcePriority::SbuFirst)
        );
        assert_eq!("02".parse::<BatteryType>(), Ok(BatteryType::User));
        assert_eq!(
            "24.5".parse::<BatteryRechargeVoltage>(),
            Ok(BatteryRechargeVoltage::V24_5)
        );
        let err = "26.1".parse::<BatteryRechargeVoltage>().unwrap_err();
        assert_eq!(err.kind, "battery recharge voltage");
        assert!(err.expected.starts_with("22.0, 22.5"));
        assert_eq!(
            "legacy".parse::<ProtocolRevision>(),
            Ok(ProtocolRevision::Legacy)
        );
    }

    #[test]
    fn legacy_revision_gates_vocabulary() {
        let legacy = ProtocolRevision::Legacy;
        assert!(legacy.supports_inquiry(&GENERAL_STATUS));
        assert!(legacy.supports_inquiry(&RATING_INQUIRY));
        assert!(!legacy.supports_inquiry(&FLAG_INQUIRY));
        assert!(!legacy.supports_settings());
        assert!(ProtocolRevision::Extended.supports_inquiry(&FLAG_INQUIRY));
        assert!(ProtocolRevision::default().supports_settings());
    }
}
