use crate::frame::TERMINATOR;
use crate::transport::LineTransport;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Default line speed of the inverter's RS232 port.
pub const DEFAULT_BAUD_RATE: u32 = 2400;

// Minimum gap between the end of one exchange and the next command.
pub const MINIMUM_DELAY: Duration = Duration::from_millis(4);

/// [`LineTransport`] over a local serial port, 8 data bits, no parity, one stop bit.
pub struct SerialLineTransport {
    serial: Box<dyn serialport::SerialPort>,
    last_execution: Instant,
    delay: Duration,
}

impl std::fmt::Debug for SerialLineTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLineTransport")
            .field("port", &self.serial.name())
            .field("delay", &self.delay)
            .finish()
    }
}

impl SerialLineTransport {
    pub fn new(port: &str, baud_rate: u32) -> io::Result<Self> {
        let serial = serialport::new(port, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()?;
        log::debug!("Opened serial port '{port}' at {baud_rate} baud");
        Ok(Self {
            serial,
            last_execution: Instant::now(),
            delay: MINIMUM_DELAY,
        })
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.serial.set_timeout(timeout).map_err(io::Error::from)
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = Duration::max(delay, MINIMUM_DELAY);
    }

    fn serial_await_delay(&self) {
        let last_exec_diff = Instant::now().duration_since(self.last_execution);
        if let Some(time_until_delay_reached) = self.delay.checked_sub(last_exec_diff) {
            std::thread::sleep(time_until_delay_reached);
        }
    }
}

impl LineTransport for SerialLineTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.serial_await_delay();
        log::trace!("write: {:02X?}", bytes);
        self.serial.write_all(bytes)?;
        self.serial.flush()
    }

    fn read_line(&mut self, max_length: usize) -> io::Result<Vec<u8>> {
        let limit = max_length.saturating_sub(1);
        let mut rx_buffer = Vec::with_capacity(limit);
        let mut byte = [0u8; 1];
        while rx_buffer.len() < limit {
            match self.serial.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == TERMINATOR => break,
                Ok(_) => rx_buffer.push(byte[0]),
                // An unterminated line is handed back as is and rejected by the frame check.
                Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                    log::trace!("read_line: timeout after {} bytes", rx_buffer.len());
                    break;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        self.last_execution = Instant::now();
        log::trace!("read_line: {:02X?}", rx_buffer);
        Ok(rx_buffer)
    }

    fn discard_pending(&mut self) -> io::Result<()> {
        loop {
            let pending = self.serial.bytes_to_read()?;
            if pending == 0 {
                return Ok(());
            }
            log::trace!("Got {} pending bytes", pending);
            let mut buf: Vec<u8> = vec![0; pending as usize];
            let received = self.serial.read(buf.as_mut_slice())?;
            log::trace!("Discarded {} pending bytes", received);
        }
    }
}
