use pi30_lib::crc;
use pi30_lib::inverter::Inverter;
use pi30_lib::protocol::*;
use pi30_lib::registers::{Flag, Mode, Warning};
use pi30_lib::transport::LineTransport;
use std::collections::VecDeque;
use std::io;

const QPIGS: &[u8] =
    b"(220.0 50.0 230.0 50.0 0460 0391 011 380 26.30 02 064 0038 01.4 084.4 26.30 00000 00000100";

/// Replays canned reply lines and records every command written.
#[derive(Default)]
struct ScriptedTransport {
    replies: VecDeque<io::Result<Vec<u8>>>,
    written: Vec<Vec<u8>>,
}

impl ScriptedTransport {
    fn reply(mut self, body: &[u8]) -> Self {
        let mut line = body.to_vec();
        crc::append_crc(&mut line);
        self.replies.push_back(Ok(line));
        self
    }

    fn corrupt_reply(mut self, body: &[u8]) -> Self {
        let mut line = body.to_vec();
        crc::append_crc(&mut line);
        let last = line.len() - 1;
        line[last] = line[last].wrapping_add(1);
        self.replies.push_back(Ok(line));
        self
    }

    fn raw_reply(mut self, line: &[u8]) -> Self {
        self.replies.push_back(Ok(line.to_vec()));
        self
    }

    fn failure(mut self) -> Self {
        self.replies
            .push_back(Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
        self
    }
}

impl LineTransport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.written.push(bytes.to_vec());
        Ok(())
    }

    fn read_line(&mut self, max_length: usize) -> io::Result<Vec<u8>> {
        assert_eq!(max_length, MAX_LINE_LENGTH);
        self.replies
            .pop_front()
            .unwrap_or_else(|| Err(io::ErrorKind::TimedOut.into()))
    }

    fn discard_pending(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn warnings_payload(bits: &[u8]) -> Vec<u8> {
    let mut payload = vec![b'('];
    let mut text = [b'0'; 32];
    for bit in bits {
        text[31 - *bit as usize] = b'1';
    }
    payload.extend_from_slice(&text);
    payload
}

#[test]
fn refresh_status_decodes_all_registers() {
    let transport = ScriptedTransport::default()
        .reply(QPIGS)
        .reply(b"(B")
        .reply(&warnings_payload(&[12]));
    let mut inverter = Inverter::new(transport, ProtocolRevision::Extended);

    assert!(!inverter.refresh_status());

    let status = inverter.general_status();
    assert_eq!(status.grid_voltage.value, 220.0);
    assert_eq!(status.battery_capacity.value, 64.0);
    assert_eq!(status.status.text, "00000100");
    assert!(inverter.is_charging());
    assert!(!inverter.is_solar_charging());
    assert!(!inverter.is_grid_charging());
    assert_eq!(inverter.mode(), Mode::Battery);
    assert!(inverter.is_on_battery());
    assert_eq!(
        inverter.warnings().active_warnings(),
        vec![Warning::BatteryVoltageLow]
    );

    let written = &inverter.connection_mut().transport_mut().written;
    assert_eq!(
        written,
        &vec![
            GENERAL_STATUS.request(),
            MODE_INQUIRY.request(),
            WARNING_STATUS.request()
        ]
    );
}

#[test]
fn failed_step_keeps_previous_value() {
    let transport = ScriptedTransport::default()
        .reply(QPIGS)
        .reply(b"(L")
        .reply(&warnings_payload(&[]))
        // second round: status corrupted, mode too short, warnings fine
        .corrupt_reply(b"(999.9 50.0")
        .raw_reply(b"(B")
        .reply(&warnings_payload(&[10]));
    let mut inverter = Inverter::new(transport, ProtocolRevision::Extended);

    assert!(!inverter.refresh_status());
    assert!(inverter.refresh_status());

    assert_eq!(inverter.general_status().grid_voltage.value, 220.0);
    assert_eq!(inverter.mode(), Mode::Line);
    assert!(inverter.warnings().is_active(Warning::FanLocked));
}

#[test]
fn transport_failure_is_reported_as_stale() {
    let transport = ScriptedTransport::default()
        .failure()
        .reply(b"(VERFW:00072.70")
        .reply(b"(VERFW2:00041.17");
    let mut inverter = Inverter::new(transport, ProtocolRevision::Extended);

    assert!(inverter.refresh_identity());
    assert_eq!(inverter.identity().serial_number, "");
    assert_eq!(inverter.identity().firmware_primary, "00072.70");
    assert_eq!(inverter.identity().firmware_secondary, "00041.17");
}

#[test]
fn refresh_settings_reads_rating_and_flags() {
    let transport = ScriptedTransport::default()
        .reply(b"(230.0 21.7 230.0 50.0 21.7 5000 4000 24.0 23.0 21.0 28.2 27.0 0 30 060 0 1 2 1 01 0 0 27.0 0 1")
        .reply(b"(EakxyzDbjuv");
    let mut inverter = Inverter::new(transport, ProtocolRevision::Extended);

    assert!(!inverter.refresh_settings());
    assert!(inverter.rating().starts_with("230.0 21.7"));
    let flags = inverter.flags();
    assert!(flags.buzzer);
    assert!(flags.lcd_timeout);
    assert!(!flags.overload_bypass);
    assert!(!flags.over_temperature_restart);
}

#[test]
fn legacy_revision_skips_flag_inquiry() {
    let transport = ScriptedTransport::default().reply(b"(230.0 21.7");
    let mut inverter = Inverter::new(transport, ProtocolRevision::Legacy);

    assert!(!inverter.refresh_settings());
    assert_eq!(
        inverter.connection_mut().transport_mut().written,
        vec![RATING_INQUIRY.request()]
    );
}

#[test]
fn setters_report_acknowledgement() {
    let transport = ScriptedTransport::default()
        .reply(b"(ACK")
        .reply(b"ACK")
        .reply(b"(NAK")
        .corrupt_reply(b"(ACK");
    let mut inverter = Inverter::new(transport, ProtocolRevision::Extended);

    assert!(inverter.set_output_priority(OutputSourcePriority::SolarFirst));
    assert!(inverter.set_battery_recharge_voltage(BatteryRechargeVoltage::V22_5));
    assert!(!inverter.set_charge_priority(ChargerSourcePriority::OnlySolar));
    assert!(!inverter.set_flag(Flag::Buzzer, false));
    // nothing left to read
    assert!(!inverter.set_output_frequency(OutputFrequency::Hz50));

    let written = &inverter.connection_mut().transport_mut().written;
    assert_eq!(written.len(), 5);
    assert!(written[0].starts_with(b"POP01"));
    assert!(written[1].starts_with(b"PBCV22.5"));
    assert!(written[2].starts_with(b"PCP03"));
    assert!(written[3].starts_with(b"PDa"));
    assert!(written[4].starts_with(b"F50"));
    for command in written {
        assert_eq!(command.last(), Some(&b'\r'));
        assert!(crc::validate_crc(&command[..command.len() - 1]));
    }
}

#[test]
fn setter_errors_are_typed_on_the_connection() {
    let transport = ScriptedTransport::default().reply(b"(NAK").failure();
    let inverter = Inverter::new(transport, ProtocolRevision::Extended);
    let setting = Setting::BatteryType(BatteryType::Flooded);

    assert!(matches!(
        inverter.connection().apply(&setting),
        Err(pi30_lib::Error::Nak)
    ));
    assert!(matches!(
        inverter.connection().apply(&setting),
        Err(pi30_lib::Error::Transport(err)) if err.kind() == io::ErrorKind::BrokenPipe
    ));
}
