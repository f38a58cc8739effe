use core::cell::RefCell;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    signal::Signal,
};
use heapless::Vec;

use crate::Error;

/// Largest payload of a single send/receive exchange.
pub const SEND_RECV_MAX: usize = 1024;

pub type Payload = Vec<u8, SEND_RECV_MAX>;

/// One application exchange: send `send`, then optionally read up to `recv_size` bytes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRecvRequest {
    pub id: u32,
    pub send: Payload,
    pub recv_size: usize,
    pub rai: bool,
}

impl SendRecvRequest {
    pub fn expects_response(&self) -> bool {
        self.recv_size > 0
    }
}

struct Completion {
    id: u32,
    result: Result<Payload, Error>,
}

struct SlotState {
    next_id: u32,
    pending: Option<SendRecvRequest>,
    /// The request the caller is still waiting for.
    live: Option<u32>,
}

/// Hands a request from the API caller to the state machine, and the result back.
///
/// Every request carries an id. A caller that gives up abandons its id, after which the state
/// machine can no longer complete it and a late result is discarded.
pub struct RequestSlot {
    state: Mutex<CriticalSectionRawMutex, RefCell<SlotState>>,
    done: Signal<CriticalSectionRawMutex, Completion>,
}

impl RequestSlot {
    pub const fn new() -> Self {
        RequestSlot {
            state: Mutex::new(RefCell::new(SlotState {
                next_id: 0,
                pending: None,
                live: None,
            })),
            done: Signal::new(),
        }
    }

    /// Queue a request for the state machine, replacing any request that was never picked up.
    pub fn publish(&self, send: &[u8], recv_size: usize, rai: bool) -> Result<u32, Error> {
        let send = Payload::from_slice(send).map_err(|_| Error::BufferOverflow)?;
        if recv_size > SEND_RECV_MAX {
            return Err(Error::BufferOverflow);
        }

        Ok(self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let id = s.next_id;
            s.next_id = s.next_id.wrapping_add(1);
            s.pending = Some(SendRecvRequest {
                id,
                send,
                recv_size,
                rai,
            });
            s.live = Some(id);
            id
        }))
    }

    pub fn take(&self) -> Option<SendRecvRequest> {
        self.state.lock(|s| s.borrow_mut().pending.take())
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock(|s| s.borrow().pending.is_some())
    }

    pub fn is_live(&self, id: u32) -> bool {
        self.state.lock(|s| s.borrow().live == Some(id))
    }

    /// Deliver the result of request `id`. Returns false if the caller already gave up.
    pub fn complete(&self, id: u32, result: Result<Payload, Error>) -> bool {
        let live = self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.live == Some(id) {
                s.live = None;
                true
            } else {
                false
            }
        });

        if live {
            self.done.signal(Completion { id, result });
        }
        live
    }

    pub fn abandon(&self, id: u32) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.live == Some(id) {
                s.live = None;
            }
            if s.pending.as_ref().map(|r| r.id) == Some(id) {
                s.pending = None;
            }
        });
    }

    /// Wait for the result of request `id`, skipping stale completions.
    pub async fn wait(&self, id: u32) -> Result<Payload, Error> {
        loop {
            let completion = self.done.wait().await;
            if completion.id == id {
                return completion.result;
            }
        }
    }
}

impl Default for RequestSlot {
    fn default() -> Self {
        Self::new()
    }
}
