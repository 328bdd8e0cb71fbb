//! Latest known inverter state and the refresh calls that update it.

use crate::connection::Connection;
use crate::frame::ValidatedLine;
use crate::protocol::{self, *};
use crate::registers::*;
use crate::transport::LineTransport;

/// Owns every decoded register of one inverter.
///
/// Registers start out empty and are replaced in place by each successful step of a
/// refresh. A failed step leaves its register as it was, so after a refresh that reported
/// an error some registers may be older than others.
#[derive(Debug)]
pub struct Inverter<T> {
    connection: Connection<T>,
    general_status: GeneralStatus,
    mode: Mode,
    warnings: WarningRegister,
    identity: DeviceIdentity,
    flags: Flags,
    rating: String,
}

impl<T: LineTransport> Inverter<T> {
    pub fn new(transport: T, revision: ProtocolRevision) -> Self {
        Self {
            connection: Connection::new(transport, revision),
            general_status: GeneralStatus::default(),
            mode: Mode::default(),
            warnings: WarningRegister::default(),
            identity: DeviceIdentity::default(),
            flags: Flags::default(),
            rating: String::new(),
        }
    }

    pub fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.connection
    }

    fn step(&self, inquiry: &Inquiry) -> Option<ValidatedLine> {
        match self.connection.query(inquiry) {
            Ok(line) => Some(line),
            Err(err) => {
                log::warn!("{} failed: {err}", inquiry.name);
                None
            }
        }
    }

    /// Refreshes general status, mode and warnings.
    /// Returns `true` if at least one of them could not be updated.
    pub fn refresh_status(&mut self) -> bool {
        let mut error = false;
        let schedule = self.connection.revision().general_status_schedule();

        match self.step(&protocol::GENERAL_STATUS) {
            Some(line) => self.general_status = GeneralStatus::decode(line.payload(), schedule),
            None => error = true,
        }
        match self.step(&protocol::MODE_INQUIRY) {
            Some(line) => self.mode = Mode::decode(line.payload()),
            None => error = true,
        }
        match self.step(&protocol::WARNING_STATUS) {
            Some(line) => self.warnings = WarningRegister::decode(line.payload()),
            None => error = true,
        }
        error
    }

    /// Refreshes serial number and both firmware versions.
    /// Returns `true` if at least one of them could not be updated.
    pub fn refresh_identity(&mut self) -> bool {
        let mut error = false;

        match self.step(&protocol::SERIAL_INQUIRY) {
            Some(line) => {
                self.identity.serial_number = DeviceIdentity::decode_serial_number(line.payload())
            }
            None => error = true,
        }
        match self.step(&protocol::FIRMWARE_PRIMARY_INQUIRY) {
            Some(line) => {
                self.identity.firmware_primary =
                    DeviceIdentity::decode_firmware_primary(line.payload())
            }
            None => error = true,
        }
        match self.step(&protocol::FIRMWARE_SECONDARY_INQUIRY) {
            Some(line) => {
                self.identity.firmware_secondary =
                    DeviceIdentity::decode_firmware_secondary(line.payload())
            }
            None => error = true,
        }
        error
    }

    /// Refreshes the rating information and, where the revision has it, the flags.
    /// Returns `true` if at least one of them could not be updated.
    pub fn refresh_settings(&mut self) -> bool {
        let mut error = false;

        match self.step(&protocol::RATING_INQUIRY) {
            Some(line) => self.rating = String::from_utf8_lossy(line.payload()).into_owned(),
            None => error = true,
        }
        if self
            .connection
            .revision()
            .supports_inquiry(&protocol::FLAG_INQUIRY)
        {
            match self.step(&protocol::FLAG_INQUIRY) {
                Some(line) => self.flags = Flags::decode(line.payload()),
                None => error = true,
            }
        }
        error
    }

    /// Sends a setting and reports whether the inverter acknowledged it. No retry is made.
    pub fn apply(&self, setting: Setting) -> bool {
        match self.connection.apply(&setting) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Cannot apply {}: {err}", setting.command_text());
                false
            }
        }
    }

    pub fn set_output_priority(&self, priority: OutputSourcePriority) -> bool {
        self.apply(Setting::OutputPriority(priority))
    }

    pub fn set_charge_priority(&self, priority: ChargerSourcePriority) -> bool {
        self.apply(Setting::ChargePriority(priority))
    }

    pub fn set_battery_type(&self, battery_type: BatteryType) -> bool {
        self.apply(Setting::BatteryType(battery_type))
    }

    pub fn set_battery_recharge_voltage(&self, voltage: BatteryRechargeVoltage) -> bool {
        self.apply(Setting::BatteryRechargeVoltage(voltage))
    }

    pub fn set_battery_redischarge_voltage(&self, voltage: BatteryRedischargeVoltage) -> bool {
        self.apply(Setting::BatteryRedischargeVoltage(voltage))
    }

    pub fn set_output_frequency(&self, frequency: OutputFrequency) -> bool {
        self.apply(Setting::OutputFrequency(frequency))
    }

    pub fn set_flag(&self, flag: Flag, enabled: bool) -> bool {
        if enabled {
            self.apply(Setting::EnableFlag(flag))
        } else {
            self.apply(Setting::DisableFlag(flag))
        }
    }
}

impl<T> Inverter<T> {
    pub fn general_status(&self) -> &GeneralStatus {
        &self.general_status
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn warnings(&self) -> &WarningRegister {
        &self.warnings
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// Raw QPIRI payload.
    pub fn rating(&self) -> &str {
        &self.rating
    }

    pub fn is_on_battery(&self) -> bool {
        self.mode.is_battery()
    }

    pub fn is_on_grid(&self) -> bool {
        !self.is_on_battery()
    }

    pub fn is_charging(&self) -> bool {
        self.general_status.status.charging()
    }

    pub fn is_solar_charging(&self) -> bool {
        self.general_status.status.scc_charging()
    }

    pub fn is_grid_charging(&self) -> bool {
        self.general_status.status.ac_charging()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc;
    use std::collections::VecDeque;
    use std::io;

    #[derive(Default)]
    struct Scripted {
        replies: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<Vec<u8>>,
        discards: usize,
    }

    impl Scripted {
        fn reply(mut self, body: &[u8]) -> Self {
            let mut line = body.to_vec();
            crc::append_crc(&mut line);
            self.replies.push_back(Ok(line));
            self
        }
    }

    impl LineTransport for Scripted {
        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.push(bytes.to_vec());
            Ok(())
        }

        fn read_line(&mut self, _max_length: usize) -> io::Result<Vec<u8>> {
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(io::ErrorKind::TimedOut.into()))
        }

        fn discard_pending(&mut self) -> io::Result<()> {
            self.discards += 1;
            Ok(())
        }
    }

    #[test]
    fn starts_empty() {
        let inverter = Inverter::new(Scripted::default(), ProtocolRevision::Extended);
        assert_eq!(inverter.general_status(), &GeneralStatus::default());
        assert!(inverter.is_on_grid());
        assert!(!inverter.is_charging());
        assert_eq!(inverter.rating(), "");
    }

    #[test]
    fn mode_predicates() {
        let transport = Scripted::default()
            .reply(b"(B")
            .reply(b"(L");
        let mut inverter = Inverter::new(transport, ProtocolRevision::Extended);
        inverter.mode = Mode::decode(inverter.step(&protocol::MODE_INQUIRY).unwrap().payload());
        assert!(inverter.is_on_battery());
        assert!(!inverter.is_on_grid());
        inverter.mode = Mode::decode(inverter.step(&protocol::MODE_INQUIRY).unwrap().payload());
        assert!(inverter.is_on_grid());
    }

    #[test]
    fn charging_predicates_follow_status_bits() {
        let mut inverter = Inverter::new(Scripted::default(), ProtocolRevision::Extended);
        inverter.general_status.status = StatusRegister::decode(b"00000011");
        assert!(inverter.is_grid_charging());
        assert!(inverter.is_solar_charging());
        assert!(!inverter.is_charging());
    }

    #[test]
    fn every_exchange_discards_stale_input() {
        let transport = Scripted::default()
            .reply(b"(92931701100248")
            .reply(b"(VERFW:00072.70")
            .reply(b"(VERFW2:00041.17");
        let mut inverter = Inverter::new(transport, ProtocolRevision::Extended);
        assert!(!inverter.refresh_identity());
        assert_eq!(inverter.identity().serial_number, "92931701100248");
        assert_eq!(inverter.identity().firmware_primary, "00072.70");
        assert_eq!(inverter.identity().firmware_secondary, "00041.17");

        let transport = inverter.connection_mut().transport_mut();
        assert_eq!(transport.discards, 3);
        assert_eq!(
            transport.written,
            vec![
                b"QID\xD6\xEA\r".to_vec(),
                b"QVFW\x62\x99\r".to_vec(),
                b"QVFW2\xC3\xF5\r".to_vec(),
            ]
        );
    }

    #[test]
    fn legacy_revision_rejects_settings_without_sending() {
        let inverter = Inverter::new(Scripted::default(), ProtocolRevision::Legacy);
        assert!(!inverter.set_output_priority(OutputSourcePriority::SolarFirst));
        assert!(matches!(
            inverter
                .connection()
                .apply(&Setting::BatteryType(BatteryType::Agm)),
            Err(crate::Error::Unsupported("PBT"))
        ));
        assert!(inverter.connection.into_inner().written.is_empty());
    }
}
