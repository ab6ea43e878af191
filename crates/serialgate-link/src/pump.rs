use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serialgate_frame::{is_timeout, Frame, FrameError, FrameReader, OutboundMessage};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Something the I/O threads report to the gateway worker.
#[derive(Debug)]
pub enum LinkEvent {
    Frame(Frame),
    /// A notifying message reached the device.
    Sent(OutboundMessage),
    /// The stream ended or failed; the link is gone.
    Closed(String),
}

/// Owns the blocking reader thread.
#[derive(Debug)]
pub struct ReaderHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    /// Stop the reader. Returns within one read timeout.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("reader thread panicked");
            }
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read frames on a dedicated thread and forward them in arrival order.
///
/// Read timeouts only serve to re-check the running flag. An overflowing
/// buffer is discarded and reading continues.
pub fn spawn_reader<R>(mut reader: FrameReader<R>, events: UnboundedSender<LinkEvent>) -> ReaderHandle
where
    R: Read + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);

    let thread = thread::spawn(move || {
        while flag.load(Ordering::SeqCst) {
            match reader.read_frame() {
                Ok(frame) => {
                    if events.send(LinkEvent::Frame(frame)).is_err() {
                        break;
                    }
                }
                Err(err) if is_timeout(&err) => continue,
                Err(FrameError::BufferOverflow { size, max }) => {
                    warn!(size, max, "undelimited input discarded");
                }
                Err(err) => {
                    if flag.load(Ordering::SeqCst) {
                        let _ = events.send(LinkEvent::Closed(err.to_string()));
                    }
                    break;
                }
            }
        }
        debug!("reader thread exiting");
    });

    ReaderHandle {
        running,
        thread: Some(thread),
    }
}
