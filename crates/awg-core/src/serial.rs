//! Serial transport types shared by the driver crates.
//!
//! The drivers never talk to a concrete serial type. Everything goes through
//! [`SharedPort`], a mutex-guarded, buffered, type-erased byte stream, so the
//! same driver code runs against real hardware (`tokio_serial::SerialStream`)
//! and against in-memory `tokio::io::duplex` pairs in tests.
//!
//! The mutex doubles as the concurrency contract: at most one request may be
//! in flight per transport, and a query holds the lock for its entire
//! write/settle/read sequence.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::sync::Mutex;

/// Trait alias for byte streams usable as an instrument transport.
///
/// Satisfied by `tokio_serial::SerialStream` (hardware) and
/// `tokio::io::DuplexStream` (tests), among others.
pub trait SerialIO: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialIO for T {}

/// Type-erased boxed transport.
pub type DynSerial = Box<dyn SerialIO>;

/// Shared, exclusively-locked transport with buffered reading.
///
/// `BufReader` provides `read_line`/`read_until` for the newline-terminated
/// instruments; the unterminated ones read through the same buffer via
/// [`read_available`].
pub type SharedPort = Arc<Mutex<BufReader<DynSerial>>>;

/// Wrap a type-erased transport into a [`SharedPort`].
pub fn wrap_shared(port: DynSerial) -> SharedPort {
    Arc::new(Mutex::new(BufReader::new(port)))
}

/// Open a serial port asynchronously, 8N1 with no flow control.
///
/// Port opening is a blocking syscall, so it runs under `spawn_blocking`.
/// `device_name` is only used to label error messages.
pub async fn open_serial(
    port_path: &str,
    baud_rate: u32,
    device_name: &str,
) -> anyhow::Result<tokio_serial::SerialStream> {
    use anyhow::Context;
    use tokio::task::spawn_blocking;
    use tokio_serial::SerialPortBuilderExt;

    let port_path_owned = port_path.to_string();
    let device_name_owned = device_name.to_string();

    spawn_blocking(move || {
        tokio_serial::new(&port_path_owned, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .context(format!(
                "Failed to open {} serial port: {}",
                device_name_owned, port_path_owned
            ))
    })
    .await
    .context("spawn_blocking for serial port opening failed")?
}

/// Read and discard whatever is currently buffered on the transport.
///
/// Instruments without a reply terminator can leave a stale, half-read answer
/// in the receive buffer when a previous command took too long; it has to be
/// discarded before the next query or it would be returned as that query's
/// reply. Returns the number of bytes thrown away.
pub async fn drain_stale<R: AsyncRead + Unpin>(port: &mut R, window: Duration) -> usize {
    let mut discard = [0u8; 256];
    let deadline = tokio::time::Instant::now() + window;
    let mut total = 0usize;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, port.read(&mut discard)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => total += n,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Ok(Err(_)) => break,
            Err(_) => break,
        }
    }

    total
}

/// Collect a reply from an instrument that sends no terminator.
///
/// Waits up to `first_byte_timeout` for the first chunk, then keeps reading
/// until the line goes quiet for `idle`. Returns an empty buffer if nothing
/// arrived at all; the caller decides whether that is a timeout.
pub async fn read_available<R: AsyncRead + Unpin>(
    port: &mut R,
    first_byte_timeout: Duration,
    idle: Duration,
) -> std::io::Result<Vec<u8>> {
    let mut buf = [0u8; 256];
    let mut out = Vec::new();

    match tokio::time::timeout(first_byte_timeout, port.read(&mut buf)).await {
        Ok(Ok(0)) => return Ok(out),
        Ok(Ok(n)) => out.extend_from_slice(&buf[..n]),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(out),
        Ok(Err(e)) => return Err(e),
        Err(_) => return Ok(out),
    }

    loop {
        match tokio::time::timeout(idle, port.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => out.extend_from_slice(&buf[..n]),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn shared_port_reads_lines_from_duplex() {
        let (mut host, device) = tokio::io::duplex(64);
        let port: SharedPort = wrap_shared(Box::new(device));

        host.write_all(b"IDN-REPLY\n").await.unwrap();

        let mut guard = port.lock().await;
        let mut line = String::new();
        guard.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "IDN-REPLY");
    }

    #[tokio::test]
    async fn drain_stale_discards_buffered_bytes() {
        let (mut host, device) = tokio::io::duplex(64);
        let port: SharedPort = wrap_shared(Box::new(device));

        host.write_all(b"half a stale reply").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut guard = port.lock().await;
        let discarded = drain_stale(&mut *guard, Duration::from_millis(50)).await;
        assert_eq!(discarded, 18);
    }

    #[tokio::test]
    async fn drain_stale_on_quiet_line_discards_nothing() {
        let (_host, device) = tokio::io::duplex(64);
        let port: SharedPort = wrap_shared(Box::new(device));

        let mut guard = port.lock().await;
        let discarded = drain_stale(&mut *guard, Duration::from_millis(20)).await;
        assert_eq!(discarded, 0);
    }

    #[tokio::test]
    async fn read_available_collects_unterminated_reply() {
        let (mut host, device) = tokio::io::duplex(64);
        let port: SharedPort = wrap_shared(Box::new(device));

        host.write_all(b"NORM").await.unwrap();

        let mut guard = port.lock().await;
        let bytes = read_available(
            &mut *guard,
            Duration::from_millis(200),
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        assert_eq!(bytes, b"NORM");
    }

    #[tokio::test]
    async fn read_available_returns_empty_when_nothing_arrives() {
        let (_host, device) = tokio::io::duplex(64);
        let port: SharedPort = wrap_shared(Box::new(device));

        let mut guard = port.lock().await;
        let bytes = read_available(
            &mut *guard,
            Duration::from_millis(20),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
        assert!(bytes.is_empty());
    }
}
