//! Test doubles for transports.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Transport, TransportError};
use crate::protocol::{Message, decode};

/// Transport that records every delivered text and can be switched off.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    delivered: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    /// Delivered texts decoded back into Messages.
    pub(crate) fn messages(&self) -> Vec<Message> {
        self.delivered()
            .iter()
            .map(|text| decode(text).expect("recorded text should decode"))
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn deliver(&self, encoded: String) -> Result<(), TransportError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("switched off".to_string()));
        }
        self.delivered.lock().unwrap().push(encoded);
        Ok(())
    }
}
