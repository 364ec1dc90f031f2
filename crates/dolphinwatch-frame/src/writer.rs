use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use dolphinwatch_transport::{TransportError, WatchStream};

use crate::codec::encode_command;
use crate::error::{FrameError, Result};
use crate::separator::Separator;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes separator-terminated commands to any `Write` stream.
///
/// Commands terminated by [`Separator::Batch`] are held back; the next
/// command terminated by [`Separator::Line`] writes the whole burst in one go.
pub struct CommandWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> CommandWriter<T> {
    /// Create a new command writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode a command with the given separator and send it.
    ///
    /// With the batch separator nothing reaches the stream yet.
    pub fn send(&mut self, command: &str, separator: Separator) -> Result<()> {
        encode_command(command, separator, &mut self.buf);
        if separator.is_batch() {
            return Ok(());
        }

        let payload = self.buf.split();
        let mut offset = 0usize;
        while offset < payload.len() {
            match self.inner.write(&payload[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Bytes of an open batch not yet written.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop an open batch without sending it.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl CommandWriter<WatchStream> {
    /// Create a command writer for `WatchStream` and apply a write timeout.
    pub fn with_write_timeout(
        inner: WatchStream,
        timeout: Option<std::time::Duration>,
    ) -> Result<Self> {
        inner
            .set_write_timeout(timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::new(inner))
    }
}

fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) => FrameError::Io(io),
        TransportError::Resolve { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn write_single_command() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send("PAUSE", Separator::Line).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"PAUSE\n");
    }

    #[test]
    fn write_multiple_commands() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send("PAUSE", Separator::Line).unwrap();
        writer.send("SAVE slot1.sav", Separator::Line).unwrap();
        writer.send("RESUME", Separator::Line).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"PAUSE\nSAVE slot1.sav\nRESUME\n");
    }

    #[test]
    fn batch_is_held_until_line_terminated_command() {
        let sink = CountingWriter::default();
        let mut writer = CommandWriter::new(sink);

        writer.send("WRITE 8 16 1", Separator::Batch).unwrap();
        writer.send("WRITE 8 20 2", Separator::Batch).unwrap();
        assert_eq!(writer.get_ref().writes, 0);
        assert_eq!(writer.pending_len(), "WRITE 8 16 1;WRITE 8 20 2;".len());

        writer.send("", Separator::Line).unwrap();
        assert_eq!(writer.pending_len(), 0);

        let inner = writer.into_inner();
        assert_eq!(inner.writes, 1);
        assert_eq!(inner.data, b"WRITE 8 16 1;WRITE 8 20 2;\n");
    }

    #[test]
    fn discard_pending_drops_open_batch() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send("PAUSE", Separator::Batch).unwrap();
        assert_eq!(writer.discard_pending(), 6);

        writer.send("RESUME", Separator::Line).unwrap();
        assert_eq!(writer.into_inner().into_inner(), b"RESUME\n");
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = CommandWriter::new(sink);

        writer.send("STOP", Separator::Line).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = CommandWriter::new(writer_impl);
        writer.send("RESET", Separator::Line).unwrap();

        assert_eq!(writer.into_inner().data, b"RESET\n");
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = CommandWriter::new(ZeroWriter);
        let err = writer.send("PAUSE", Separator::Line).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn failed_write_does_not_leak_into_next_send() {
        let mut writer = CommandWriter::new(ZeroWriter);
        let _ = writer.send("PAUSE", Separator::Line);
        assert_eq!(writer.pending_len(), 0);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::<u8>::new()));

        let _ = writer.get_ref();
        let _ = writer.get_mut();
        let _inner = writer.into_inner();
    }

    #[test]
    fn applies_write_timeout_for_watch_stream() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let stream = dolphinwatch_transport::TcpTransport::connect("127.0.0.1", port, None).unwrap();
        let (_server, _) = listener.accept().unwrap();

        let writer = CommandWriter::with_write_timeout(
            stream,
            Some(std::time::Duration::from_millis(10)),
        );
        assert!(writer.is_ok());
    }

    #[derive(Default)]
    struct CountingWriter {
        writes: usize,
        data: Vec<u8>,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.writes += 1;
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
