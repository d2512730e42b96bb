//! Per-call record of every client-side operation.

use std::sync::{Arc, Mutex, PoisonError};

/// One client-side operation on a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Start,
    Request(usize),
    SendMessage,
    HalfClose,
    Cancel(String),
}

/// The operations invoked on one call, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub id: u64,
    pub method: String,
    pub events: Vec<CallEvent>,
}

impl CallRecord {
    /// True if the non-cancel operations follow
    /// `start < request < send_message* < half_close`.
    ///
    /// Additional `request` calls may appear anywhere after the first one.
    /// `cancel` may appear anywhere.
    pub fn is_well_ordered(&self) -> bool {
        let mut started = false;
        let mut requested = false;
        let mut half_closed = false;

        for event in &self.events {
            match event {
                CallEvent::Cancel(_) => {}
                CallEvent::Start => {
                    if started {
                        return false;
                    }
                    started = true;
                }
                CallEvent::Request(_) => {
                    if !started {
                        return false;
                    }
                    requested = true;
                }
                CallEvent::SendMessage => {
                    if !requested || half_closed {
                        return false;
                    }
                }
                CallEvent::HalfClose => {
                    if !requested || half_closed {
                        return false;
                    }
                    half_closed = true;
                }
            }
        }
        true
    }

    pub fn cancel_count(&self) -> usize {
        self.count(|event| matches!(event, CallEvent::Cancel(_)))
    }

    pub fn send_count(&self) -> usize {
        self.count(|event| *event == CallEvent::SendMessage)
    }

    pub fn half_closed(&self) -> bool {
        self.events.contains(&CallEvent::HalfClose)
    }

    pub fn count(&self, mut predicate: impl FnMut(&CallEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }
}

/// Shared, append-only log of call records.
///
/// Clones share the same underlying log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    records: Arc<Mutex<Vec<CallRecord>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every call recorded so far.
    pub fn records(&self) -> Vec<CallRecord> {
        self.lock().clone()
    }

    pub fn record(&self, id: u64) -> Option<CallRecord> {
        self.lock().iter().find(|record| record.id == id).cloned()
    }

    /// The most recently opened call.
    pub fn last(&self) -> Option<CallRecord> {
        self.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn open(&self, id: u64, method: &str) {
        self.lock().push(CallRecord {
            id,
            method: method.to_string(),
            events: Vec::new(),
        });
    }

    pub(crate) fn push(&self, id: u64, event: CallEvent) {
        if let Some(record) = self.lock().iter_mut().rev().find(|record| record.id == id) {
            record.events.push(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CallRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
