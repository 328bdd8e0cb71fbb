use std::io;

/// Byte oriented, line delimited link to the inverter.
///
/// Implementations add no framing of their own: [`write`](LineTransport::write) sends the
/// bytes as given and [`read_line`](LineTransport::read_line) returns everything before the
/// `\r` delimiter. How long a read may block is up to the implementation.
pub trait LineTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Blocks until `\r` arrives or `max_length - 1` bytes are collected.
    /// The delimiter is not part of the result.
    fn read_line(&mut self, max_length: usize) -> io::Result<Vec<u8>>;

    /// Drops any received bytes that have not been read yet.
    fn discard_pending(&mut self) -> io::Result<()>;
}

impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read_line(&mut self, max_length: usize) -> io::Result<Vec<u8>> {
        (**self).read_line(max_length)
    }

    fn discard_pending(&mut self) -> io::Result<()> {
        (**self).discard_pending()
    }
}
