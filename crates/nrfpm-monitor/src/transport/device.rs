//! Character-device transport for the nRF24L01 kernel driver.
//!
//! The driver exposes the radio as `/dev/nrf24l01`: every `write()` sends one
//! payload, every `read()` returns one received payload. A reader thread owns
//! a non-blocking read handle and forwards payloads over a bounded channel;
//! `read_frame` then becomes a bounded channel receive. When the channel is
//! full the oldest payload is dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use nrfpm_protocol::{FRAME_SIZE, READ_CHUNK};
use tracing::{debug, trace, warn};

use super::Transport;

/// Back-off when no payload is pending.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Received payloads kept while no exchange is reading.
const QUEUE_DEPTH: usize = 64;

/// Transport backed by the radio character device.
pub struct DeviceTransport {
    path: PathBuf,
    frames: Receiver<Vec<u8>>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl DeviceTransport {
    /// Open the device and start the reader thread.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_nonblocking(&path)?;
        let (tx, rx) = crossbeam_channel::bounded(QUEUE_DEPTH);
        let stop = Arc::new(AtomicBool::new(false));

        let reader_stop = Arc::clone(&stop);
        let reader_rx = rx.clone();
        let reader_path = path.clone();
        let reader = thread::Builder::new()
            .name("nrfpm-reader".to_string())
            .spawn(move || read_loop(file, tx, reader_rx, reader_stop, reader_path))?;

        debug!("Opened radio device {}", path.display());
        Ok(DeviceTransport {
            path,
            frames: rx,
            stop,
            reader: Some(reader),
        })
    }

    /// Device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader_stopped(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("reader for {} stopped", self.path.display()),
        )
    }
}

impl Transport for DeviceTransport {
    fn write_frame(&mut self, frame: &[u8; FRAME_SIZE]) -> io::Result<()> {
        // The driver sends one payload per open/write cycle.
        let mut device = OpenOptions::new().write(true).open(&self.path)?;
        device.write_all(frame)?;
        device.flush()
    }

    fn read_frame(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        if timeout.is_zero() {
            match self.frames.try_recv() {
                Ok(frame) => Ok(Some(frame)),
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(self.reader_stopped()),
            }
        } else {
            match self.frames.recv_timeout(timeout) {
                Ok(frame) => Ok(Some(frame)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(self.reader_stopped()),
            }
        }
    }
}

impl Drop for DeviceTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Reads never block, so the reader sees the flag within one back-off.
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("Reader for {} panicked", self.path.display());
            }
        }
    }
}

#[cfg(unix)]
fn open_nonblocking(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

#[cfg(not(unix))]
fn open_nonblocking(path: &Path) -> io::Result<File> {
    File::open(path)
}

/// Queue `frame`, dropping the oldest queued frame when full. Returns `false`
/// once the channel is disconnected.
fn enqueue(tx: &Sender<Vec<u8>>, rx: &Receiver<Vec<u8>>, mut frame: Vec<u8>) -> bool {
    loop {
        match tx.try_send(frame) {
            Ok(()) => return true,
            Err(TrySendError::Full(rejected)) => {
                if let Ok(oldest) = rx.try_recv() {
                    trace!("Queue full, dropping frame: {}", hex::encode(&oldest));
                }
                frame = rejected;
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

fn read_loop(
    mut file: File,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    stop: Arc<AtomicBool>,
    path: PathBuf,
) {
    let mut buf = [0u8; READ_CHUNK];
    while !stop.load(Ordering::Relaxed) {
        match file.read(&mut buf) {
            Ok(0) => thread::sleep(IDLE_BACKOFF),
            Ok(n) => {
                trace!("Device read {} bytes", n);
                if !enqueue(&tx, &rx, buf[..n].to_vec()) {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(IDLE_BACKOFF),
            Err(e) => {
                warn!("Reading {} failed: {}", path.display(), e);
                break;
            }
        }
    }
    debug!("Reader for {} stopped", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_device(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("nrfpm-{}-{}", name, std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_open_missing_device() {
        let path = std::env::temp_dir().join("nrfpm-does-not-exist");
        assert!(DeviceTransport::open(&path).is_err());
    }

    #[test]
    fn test_reads_pending_payload() {
        let payload = [0x5Au8; FRAME_SIZE];
        let path = temp_device("read", &payload);
        let mut transport = DeviceTransport::open(&path).unwrap();

        let frame = transport.read_frame(Duration::from_secs(2)).unwrap();
        assert_eq!(frame, Some(payload.to_vec()));
        assert_eq!(transport.read_frame(Duration::ZERO).unwrap(), None);

        drop(transport);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_frame_reaches_device() {
        let path = temp_device("write", &[]);
        let mut transport = DeviceTransport::open(&path).unwrap();

        let mut frame = [0u8; FRAME_SIZE];
        frame[..5].copy_from_slice(&[0xAA, 0x04, 0x01, 0x02, 0xB1]);
        transport.write_frame(&frame).unwrap();
        assert_eq!(fs::read(&path).unwrap(), frame.to_vec());

        drop(transport);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let (tx, rx) = crossbeam_channel::bounded(2);
        for tag in 1..=3u8 {
            assert!(enqueue(&tx, &rx, vec![tag]));
        }
        assert_eq!(rx.try_recv().unwrap(), vec![2]);
        assert_eq!(rx.try_recv().unwrap(), vec![3]);
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_drop_releases_idle_device() {
        use std::process::Command;
        use std::sync::mpsc;

        let path = std::env::temp_dir().join(format!("nrfpm-fifo-{}", std::process::id()));
        let _ = fs::remove_file(&path);
        let status = Command::new("mkfifo").arg(&path).status().unwrap();
        assert!(status.success());

        // A writer that never sends keeps the reader idle with the device open.
        let transport = DeviceTransport::open(&path).unwrap();
        let mut writer = OpenOptions::new().write(true).open(&path).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            drop(transport);
            done_tx.send(()).unwrap();
        });
        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("drop did not stop the reader");

        // With the reader gone the fifo has no readers left.
        let err = writer.write_all(&[0u8; FRAME_SIZE]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        drop(writer);
        fs::remove_file(&path).unwrap();
    }
}
