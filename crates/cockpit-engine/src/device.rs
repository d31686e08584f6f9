//! Panel transport
//!
//! The panel is reached through a [`DevicePort`]: a serial port in
//! production, an in-memory duplex stream in tests. Once opened, the stream is
//! split; a [`DeviceReader`] turns incoming bytes into lines and
//! [`write_lines`] drains the outgoing queue.

use std::io::{self, ErrorKind};
use std::time::Duration;

use cockpit_protocol::{LineCodec, LINE_DELIMITER};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, StopBits};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{Direction, EngineEvent};

/// Baud rate of the panel firmware
pub const DEFAULT_BAUD_RATE: u32 = 2400;

/// Byte stream to the panel
pub trait DeviceIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> DeviceIo for T {}

pub type BoxedDeviceIo = Box<dyn DeviceIo>;

/// Something the panel can be reached through
pub trait DevicePort: Send + Sync {
    /// Name shown to the operator
    fn name(&self) -> &str;

    fn open(&self) -> io::Result<BoxedDeviceIo>;
}

/// Serial port running 8N1 with DTR and RTS asserted
#[derive(Debug, Clone)]
pub struct SerialDevicePort {
    path: String,
    baud_rate: u32,
}

impl SerialDevicePort {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

impl DevicePort for SerialDevicePort {
    fn name(&self) -> &str {
        &self.path
    }

    fn open(&self) -> io::Result<BoxedDeviceIo> {
        let mut stream = tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(500))
            .open_native_async()?;
        stream.write_data_terminal_ready(true)?;
        stream.write_request_to_send(true)?;
        info!("Opened {} at {} baud", self.path, self.baud_rate);
        Ok(Box::new(stream))
    }
}

/// Line reader over the receiving half of the panel stream
pub struct DeviceReader<R> {
    port_name: String,
    io: R,
    codec: LineCodec,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> DeviceReader<R> {
    pub fn new(port_name: impl Into<String>, io: R) -> Self {
        Self {
            port_name: port_name.into(),
            io,
            codec: LineCodec::new(),
            buffer: vec![0u8; 256],
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Next complete line, or `None` once the stream has closed
    ///
    /// Cancel-safe: bytes already read stay buffered in the codec.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.codec.next_line() {
                return Ok(Some(line));
            }
            match self.io.read(&mut self.buffer).await {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    debug!("Read {} bytes from {}", n, self.port_name);
                    self.codec.push_bytes(&self.buffer[..n]);
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) if e.kind() == ErrorKind::ConnectionAborted => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Write queued lines to the panel until the queue closes or `cancel` fires
///
/// Each line is terminated with the line delimiter and reported as outgoing
/// traffic once flushed.
pub async fn write_lines<W: AsyncWrite + Unpin>(
    mut io: W,
    mut lines: mpsc::Receiver<String>,
    events: &mpsc::Sender<EngineEvent>,
    cancel: &CancellationToken,
) -> io::Result<()> {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            break;
        };

        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(LINE_DELIMITER as u8);
        io.write_all(&bytes).await?;
        io.flush().await?;

        let _ = events
            .send(EngineEvent::DeviceTraffic {
                direction: Direction::Out,
                line,
            })
            .await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_splits_lines_across_reads() {
        let (mut near, far) = tokio::io::duplex(64);
        let mut reader = DeviceReader::new("test", far);

        near.write_all(b"MSFS").await.unwrap();
        near.write_all(b"CP0\r\nK01").await.unwrap();
        near.write_all(b"23\n").await.unwrap();
        drop(near);

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("MSFSCP0"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("K0123"));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writer_terminates_lines_and_reports_traffic() {
        let (near, mut far) = tokio::io::duplex(64);
        let (line_tx, line_rx) = mpsc::channel(4);
        let (event_tx, mut event_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        line_tx.send("P".to_string()).await.unwrap();
        line_tx.send("C01".to_string()).await.unwrap();
        drop(line_tx);
        write_lines(near, line_rx, &event_tx, &cancel).await.unwrap();

        let mut received = vec![0u8; 6];
        far.read_exact(&mut received).await.unwrap();
        assert_eq!(received, b"P\nC01\n");
        assert_eq!(
            event_rx.recv().await,
            Some(EngineEvent::DeviceTraffic {
                direction: Direction::Out,
                line: "P".into()
            })
        );
    }
}
