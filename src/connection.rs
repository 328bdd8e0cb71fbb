use crate::error::Error;
use crate::frame::{self, ValidatedLine};
use crate::protocol::{Inquiry, ProtocolRevision, Setting, MAX_LINE_LENGTH};
use crate::transport::LineTransport;
use std::sync::{Mutex, PoisonError};

type Result<T> = std::result::Result<T, Error>;

/// Sends one command at a time over a [`LineTransport`] and checks the reply.
///
/// The line is half duplex and strictly request/response, so the transport sits behind a
/// single lock held from the write until the reply line is read.
#[derive(Debug)]
pub struct Connection<T> {
    transport: Mutex<T>,
    revision: ProtocolRevision,
}

impl<T: LineTransport> Connection<T> {
    pub fn new(transport: T, revision: ProtocolRevision) -> Self {
        Self {
            transport: Mutex::new(transport),
            revision,
        }
    }

    pub fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.transport
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_inner(self) -> T {
        self.transport
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn exchange(&self, tx_buffer: &[u8]) -> Result<ValidatedLine> {
        let rx_buffer = {
            let mut transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
            // a late reply to an earlier command must not be taken for this one
            transport.discard_pending()?;
            log::trace!("send: {:02X?}", tx_buffer);
            transport.write(tx_buffer)?;
            transport.read_line(MAX_LINE_LENGTH)?
        };
        log::trace!("receive: {:02X?}", rx_buffer);
        Ok(frame::accept_response(&rx_buffer)?)
    }

    /// Sends a constant inquiry and returns its checked reply.
    pub fn query(&self, inquiry: &Inquiry) -> Result<ValidatedLine> {
        if !self.revision.supports_inquiry(inquiry) {
            return Err(Error::Unsupported(inquiry.name));
        }
        let line = self.exchange(&inquiry.request())?;
        log::debug!("{} -> {:?}", inquiry.name, line);
        Ok(line)
    }

    /// Sends a setting command. Anything but an `ACK` reply is reported as [`Error::Nak`].
    pub fn apply(&self, setting: &Setting) -> Result<()> {
        if !self.revision.supports_settings() {
            return Err(Error::Unsupported(setting.prefix()));
        }
        let command = setting.command_text();
        let line = self.exchange(&setting.request())?;
        if line.is_ack() {
            log::debug!("{command} -> ACK");
            Ok(())
        } else {
            log::warn!("{command} rejected: {line:?}");
            Err(Error::Nak)
        }
    }
}
