#![cfg_attr(docsrs, feature(doc_cfg))]
//! # pi30_lib
//!
//! This crate implements the ASCII request/response protocol spoken by PI30 family solar
//! inverters (Voltronic, Axpert, WatchPower and rebrands) over their RS232 port.
//!
//! Commands are plain text followed by a CRC-CCITT (XModem) checksum and `\r`. Responses
//! are fixed width ASCII fields which are decoded into typed registers.
//!
//! ## Features
//!
//! - `default`: Enables `bin-dependencies`, which is intended for compiling the `pi30`
//!   command-line tool and pulls in `serialport` and `serde`.
//!
//! ### Transport Features
//! - `serialport`: Enables [`serialport::SerialLineTransport`], a blocking
//!   [`transport::LineTransport`] using the `serialport` crate.
//!
//! ### Utility Features
//! - `serde`: Enables `Serialize` for all decoded registers.
//! - `bin-dependencies`: Enables all features required by the `pi30` binary executable.
//!
//! ## Example
//!
//! ```no_run
//! # #[cfg(feature = "serialport")]
//! # fn main() -> std::io::Result<()> {
//! use pi30_lib::inverter::Inverter;
//! use pi30_lib::protocol::ProtocolRevision;
//! use pi30_lib::serialport::{SerialLineTransport, DEFAULT_BAUD_RATE};
//!
//! let transport = SerialLineTransport::new("/dev/ttyUSB0", DEFAULT_BAUD_RATE)?;
//! let mut inverter = Inverter::new(transport, ProtocolRevision::Extended);
//! if inverter.refresh_status() {
//!     eprintln!("some registers could not be refreshed");
//! }
//! println!("grid: {} V", inverter.general_status().grid_voltage.value);
//! println!("on battery: {}", inverter.is_on_battery());
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serialport"))]
//! # fn main() {}
//! ```

/// CRC-CCITT (XModem) checksum.
pub mod crc;
/// Contains error types for the library.
mod error;
/// Command and response framing.
pub mod frame;
/// Command vocabulary and setting values.
pub mod protocol;
/// Decoded register types.
pub mod registers;
/// The line transport the protocol runs over.
pub mod transport;

/// Serialised request/response exchanges.
pub mod connection;
pub mod inverter;

pub use error::{Error, FrameError, ParseSettingError};

/// Blocking line transport over a local serial port.
#[cfg_attr(docsrs, doc(cfg(feature = "serialport")))]
#[cfg(feature = "serialport")]
pub mod serialport;
