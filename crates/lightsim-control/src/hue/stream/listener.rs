//! UDP receive loop for entertainment streaming

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::Result;

/// Largest datagram we accept (header + id + 256 full entries fits easily)
const RECV_BUFFER_LEN: usize = 2048;

/// Receives raw datagrams from the listener thread
pub trait DatagramSink: Send + Sync + 'static {
    fn handle_datagram(&self, data: &[u8]);
}

/// Background thread bound to a UDP port.
///
/// The loop wakes every `poll_interval` to check its shutdown flag and
/// whether the sink still exists, so it exits promptly once either goes away.
pub struct StreamListener {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StreamListener {
    /// Bind `addr` and start receiving into `sink`
    pub fn spawn<S: DatagramSink>(
        addr: SocketAddr,
        poll_interval: Duration,
        sink: Weak<S>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(poll_interval))?;
        let local_addr = socket.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();

        let handle = thread::Builder::new()
            .name("hue-stream-rx".to_string())
            .spawn(move || receive_loop(socket, flag, sink))?;

        tracing::info!("Entertainment stream listener bound to {}", local_addr);

        Ok(Self {
            local_addr,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread and wait for it to exit
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            // The last bridge handle can be dropped on this very thread
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for StreamListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop<S: DatagramSink>(socket: UdpSocket, shutdown: Arc<AtomicBool>, sink: Weak<S>) {
    let mut buf = [0u8; RECV_BUFFER_LEN];

    while !shutdown.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                let Some(sink) = sink.upgrade() else {
                    break;
                };
                tracing::trace!("Stream datagram: {} bytes from {}", len, from);
                sink.handle_datagram(&buf[..len]);
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                if sink.strong_count() == 0 {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Entertainment stream receive error: {}", e);
            }
        }
    }

    tracing::info!("Entertainment stream listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<Vec<u8>>>,
    }

    impl DatagramSink for Recorder {
        fn handle_datagram(&self, data: &[u8]) {
            self.received.lock().push(data.to_vec());
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_delivers_datagrams() {
        let recorder = Arc::new(Recorder::default());
        let listener = StreamListener::spawn(
            "127.0.0.1:0".parse().unwrap(),
            Duration::from_millis(20),
            Arc::downgrade(&recorder),
        )
        .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"hello", listener.local_addr()).unwrap();

        assert!(wait_for(|| recorder.received.lock().len() == 1));
        assert_eq!(recorder.received.lock()[0], b"hello");
    }

    #[test]
    fn test_stop_joins_thread() {
        let recorder = Arc::new(Recorder::default());
        let mut listener = StreamListener::spawn(
            "127.0.0.1:0".parse().unwrap(),
            Duration::from_millis(20),
            Arc::downgrade(&recorder),
        )
        .unwrap();

        assert!(listener.is_running());
        listener.stop();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_exits_when_sink_dropped() {
        let recorder = Arc::new(Recorder::default());
        let listener = StreamListener::spawn(
            "127.0.0.1:0".parse().unwrap(),
            Duration::from_millis(20),
            Arc::downgrade(&recorder),
        )
        .unwrap();

        drop(recorder);
        assert!(wait_for(|| !listener.is_running()));
    }
}
