use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::error::{FrameError, Result};
use crate::message::OutboundMessage;
use crate::writer::FrameWriter;

/// Producer side of the outbound FIFO. Enqueueing never blocks.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<OutboundMessage>,
}

impl OutboundQueue {
    /// Append a message to the FIFO.
    ///
    /// Fails only once the writer has stopped, i.e. the link is closed.
    pub fn enqueue(&self, message: OutboundMessage) -> Result<()> {
        self.tx.send(message).map_err(|_| FrameError::QueueClosed)
    }
}

/// Owns the paced writer thread. Dropping it stops the thread and discards
/// whatever is still queued.
#[derive(Debug)]
pub struct WriterHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WriterHandle {
    /// Stop the writer and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("outbound writer thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for WriterHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the paced writer.
///
/// At most one message is written per `tx_interval` tick regardless of queue
/// depth. A failed write is logged and the message dropped; it is never
/// retried. `on_written` sees every message that reached the link.
pub fn spawn_writer<W, F>(mut writer: FrameWriter<W>, mut on_written: F) -> (OutboundQueue, WriterHandle)
where
    W: Write + Send + 'static,
    F: FnMut(&OutboundMessage) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<OutboundMessage>();
    let running = Arc::new(AtomicBool::new(true));
    let interval = writer.config().tx_interval;

    let flag = Arc::clone(&running);
    let thread = thread::spawn(move || {
        while flag.load(Ordering::SeqCst) {
            match rx.try_recv() {
                Ok(message) => match writer.send(&message) {
                    Ok(()) => {
                        trace!(destination = %message.destination, len = message.payload.len(), "wrote outbound message");
                        on_written(&message);
                    }
                    Err(err) => {
                        warn!(error = %err, destination = %message.destination, "write failed, message dropped");
                    }
                },
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break,
            }
            thread::sleep(interval);
        }

        let discarded = rx.try_iter().count();
        if discarded > 0 {
            debug!(discarded, "outbound queue discarded on close");
        }
        flag.store(false, Ordering::SeqCst);
    });

    (
        OutboundQueue { tx },
        WriterHandle {
            running,
            thread: Some(thread),
        },
    )
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::codec::FrameConfig;

    #[derive(Clone, Default)]
    struct SharedWire(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedWire {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn config(interval_ms: u64) -> FrameConfig {
        FrameConfig {
            tx_length: 4,
            tx_interval: Duration::from_millis(interval_ms),
            ..FrameConfig::default()
        }
    }

    #[test]
    fn preserves_fifo_order() {
        let wire = SharedWire::default();
        let writer = FrameWriter::with_config(wire.clone(), config(1));
        let (done_tx, done_rx) = mpsc::channel();
        let (queue, mut handle) = spawn_writer(writer, move |msg| {
            done_tx.send(msg.payload.clone()).unwrap();
        });

        queue.enqueue(OutboundMessage::broadcast("A")).unwrap();
        queue.enqueue(OutboundMessage::broadcast("B")).unwrap();
        queue.enqueue(OutboundMessage::broadcast("C")).unwrap();

        let order: Vec<_> = (0..3)
            .map(|_| done_rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        handle.stop();

        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(wire.0.lock().unwrap().as_slice(), b"A\0\0\0B\0\0\0C\0\0\0");
    }

    #[test]
    fn spacing_is_fixed_regardless_of_depth() {
        let writer = FrameWriter::with_config(SharedWire::default(), config(20));
        let (done_tx, done_rx) = mpsc::channel();
        let (queue, mut handle) = spawn_writer(writer, move |_| {
            done_tx.send(Instant::now()).unwrap();
        });

        for _ in 0..4 {
            queue.enqueue(OutboundMessage::broadcast("x")).unwrap();
        }

        let stamps: Vec<Instant> = (0..4)
            .map(|_| done_rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        handle.stop();

        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(20));
        }
    }

    #[test]
    fn failed_write_is_dropped_not_retried() {
        let attempts = Arc::new(Mutex::new(0usize));
        let writer = FrameWriter::with_config(
            FailingWire {
                attempts: Arc::clone(&attempts),
            },
            config(1),
        );
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let (queue, mut handle) = spawn_writer(writer, move |_| {
            let _ = done_tx.send(());
        });

        queue.enqueue(OutboundMessage::broadcast("x")).unwrap();
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        handle.stop();

        assert_eq!(*attempts.lock().unwrap(), 1);
    }

    #[test]
    fn enqueue_after_stop_reports_closed() {
        let writer = FrameWriter::with_config(SharedWire::default(), config(1));
        let (queue, mut handle) = spawn_writer(writer, |_| {});
        handle.stop();

        assert!(!handle.is_running());
        let err = queue.enqueue(OutboundMessage::broadcast("late")).unwrap_err();
        assert!(matches!(err, FrameError::QueueClosed));
    }

    struct FailingWire {
        attempts: Arc<Mutex<usize>>,
    }

    impl Write for FailingWire {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            *self.attempts.lock().unwrap() += 1;
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
