use uuid::Uuid;

pub mod connection;
pub mod heartbeat;
pub mod message;
pub mod registry;
pub mod rooms;
pub mod router;

pub use connection::{CloseReason, ConnectionHandle, SendError};
pub use heartbeat::{HeartbeatConfig, HeartbeatMonitor};
pub use registry::SessionRegistry;
pub use rooms::{RoomDirectory, RoomError};
pub use router::MessageRouter;

/// Short random suffix appended to participant keys and room ids.
/// Collision probability is treated as negligible, not eliminated.
pub(crate) fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{CloseReason, ConnectionHandle, SendError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory ConnectionHandle capturing everything the relay sends.
    #[derive(Default)]
    pub struct MockConnection {
        frames: Mutex<Vec<String>>,
        binary_frames: Mutex<Vec<Vec<u8>>>,
        probes: AtomicUsize,
        open: AtomicBool,
        fail_sends: AtomicBool,
        closed_with: Mutex<Option<CloseReason>>,
    }

    impl MockConnection {
        pub fn open() -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(true),
                ..Self::default()
            })
        }

        pub fn closed() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Open, but every write fails.
        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(true),
                fail_sends: AtomicBool::new(true),
                ..Self::default()
            })
        }

        pub fn sent(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }

        pub fn sent_binary(&self) -> Vec<Vec<u8>> {
            self.binary_frames.lock().unwrap().clone()
        }

        pub fn probe_count(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }

        pub fn close_reason(&self) -> Option<CloseReason> {
            *self.closed_with.lock().unwrap()
        }
    }

    impl ConnectionHandle for MockConnection {
        fn send_text(&self, frame: String) -> Result<(), SendError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(SendError("mock send failure".into()));
            }
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }

        fn send_binary(&self, payload: Vec<u8>) -> Result<(), SendError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(SendError("mock send failure".into()));
            }
            self.binary_frames.lock().unwrap().push(payload);
            Ok(())
        }

        fn send_probe(&self) -> Result<(), SendError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(SendError("mock probe failure".into()));
            }
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn close(&self, reason: CloseReason) {
            *self.closed_with.lock().unwrap() = Some(reason);
            self.open.store(false, Ordering::SeqCst);
        }
    }
}
