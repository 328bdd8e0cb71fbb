//! CRC-CCITT (XModem) as used by the inverter: polynomial `0x1021`, initial value `0`,
//! no reflection. The checksum travels big-endian as two raw bytes.

const POLYNOMIAL: u16 = 0x1021;

pub fn crc16(buffer: &[u8]) -> u16 {
    buffer.iter().fold(0u16, |crc, &byte| {
        let mut crc = crc ^ ((byte as u16) << 8);
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
        crc
    })
}

#[inline]
pub fn high_byte(crc: u16) -> u8 {
    (crc >> 8) as u8
}

#[inline]
pub fn low_byte(crc: u16) -> u8 {
    (crc & 0xFF) as u8
}

/// Appends the checksum of the whole buffer, high byte first. No terminator is added.
pub fn append_crc(buffer: &mut Vec<u8>) {
    let crc = crc16(buffer);
    buffer.push(high_byte(crc));
    buffer.push(low_byte(crc));
}

/// Splits a frame into its body and the received checksum.
/// Returns `None` when the frame has no body in front of the two checksum bytes.
pub(crate) fn split_crc(frame: &[u8]) -> Option<(&[u8], u16)> {
    if frame.len() < 3 {
        return None;
    }
    let (body, crc) = frame.split_at(frame.len() - 2);
    Some((body, u16::from_be_bytes([crc[0], crc[1]])))
}

pub fn validate_crc(frame: &[u8]) -> bool {
    match split_crc(frame) {
        Some((body, received)) => crc16(body) == received,
        None => false,
    }
}
