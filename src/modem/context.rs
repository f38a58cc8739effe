use core::{
    cell::{Cell, RefCell},
    sync::atomic::{AtomicBool, Ordering},
};

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex as BlockingMutex},
    channel::Channel,
    mutex::Mutex,
};
use embassy_time::Instant;
use heapless::Vec;

use super::{MetricsStore, RequestSlot, StateStore};
use crate::{
    config::SocketConfig,
    fsm::{policy::AttachTimeout, FsmEvent, FsmState},
    log,
    lte::{LteEvent, LteObserver},
    Error, StateSignal,
};

/// Capacity of the state machine event queue. Events beyond this are dropped.
pub const EVENT_QUEUE_LEN: usize = 8;
pub const MAX_OBSERVERS: usize = 4;

pub type EventChannel = Channel<CriticalSectionRawMutex, FsmEvent, EVENT_QUEUE_LEN>;

/// Everything shared between the API handle, the state machine and the URC pump.
///
/// Meant to be allocated in a `static`, see [crate::spawn_lte].
pub struct LteContext {
    pub(crate) events: EventChannel,
    /// Whether the radio is in RRC connected mode.
    pub(crate) cscon: AtomicBool,
    pub(crate) connected: StateSignal<CriticalSectionRawMutex, bool>,
    pub(crate) enabled: AtomicBool,
    pub(crate) ncellmeas_requested: AtomicBool,
    pub(crate) fsm_state: BlockingMutex<CriticalSectionRawMutex, Cell<FsmState>>,
    pub(crate) attach_timeout: BlockingMutex<CriticalSectionRawMutex, Cell<Option<AttachTimeout>>>,
    pub(crate) socket_config: BlockingMutex<CriticalSectionRawMutex, Cell<Option<SocketConfig>>>,
    observers: BlockingMutex<
        CriticalSectionRawMutex,
        RefCell<Vec<&'static dyn LteObserver, MAX_OBSERVERS>>,
    >,
    pub(crate) state: StateStore,
    pub(crate) metrics: MetricsStore,
    pub(crate) request: RequestSlot,
    /// Serializes [crate::Lte::send_recv] callers.
    pub(crate) send_recv_lock: Mutex<CriticalSectionRawMutex, ()>,
}

fn same_observer(a: &dyn LteObserver, b: &dyn LteObserver) -> bool {
    core::ptr::eq(
        a as *const dyn LteObserver as *const (),
        b as *const dyn LteObserver as *const (),
    )
}

impl LteContext {
    pub const fn new() -> Self {
        LteContext {
            events: Channel::new(),
            cscon: AtomicBool::new(false),
            connected: StateSignal::new(false),
            enabled: AtomicBool::new(false),
            ncellmeas_requested: AtomicBool::new(false),
            fsm_state: BlockingMutex::new(Cell::new(FsmState::Disabled)),
            attach_timeout: BlockingMutex::new(Cell::new(None)),
            socket_config: BlockingMutex::new(Cell::new(None)),
            observers: BlockingMutex::new(RefCell::new(Vec::new())),
            state: StateStore::new(),
            metrics: MetricsStore::new(),
            request: RequestSlot::new(),
            send_recv_lock: Mutex::new(()),
        }
    }

    /// Queue an event for the state machine.
    ///
    /// Signalling connection changes are applied to the context right away, so that the
    /// connection flag and the connected time metrics don't lag behind a full queue.
    pub fn delegate(&self, event: FsmEvent) {
        match event {
            FsmEvent::Cscon1 => {
                self.cscon.store(true, Ordering::Relaxed);
                self.metrics.cscon(true, Instant::now());
            }
            FsmEvent::Cscon0 => {
                self.cscon.store(false, Ordering::Relaxed);
                self.metrics.cscon(false, Instant::now());
            }
            _ => {}
        }

        if self.events.try_send(event).is_err() {
            log::warn!("event queue full, dropping {}", event.as_str());
        }
    }

    pub fn is_cscon(&self) -> bool {
        self.cscon.load(Ordering::Relaxed)
    }

    pub fn fsm_state(&self) -> FsmState {
        self.fsm_state.lock(Cell::get)
    }

    pub(crate) fn set_fsm_state(&self, state: FsmState) {
        self.fsm_state.lock(|s| s.set(state));
    }

    pub fn attach_timeout(&self) -> Option<AttachTimeout> {
        self.attach_timeout.lock(Cell::get)
    }

    pub(crate) fn set_attach_timeout(&self, timeout: AttachTimeout) {
        self.attach_timeout.lock(|t| t.set(Some(timeout)));
    }

    pub fn socket_config(&self) -> Option<SocketConfig> {
        self.socket_config.lock(Cell::get)
    }

    pub(crate) fn set_socket_config(&self, config: SocketConfig) {
        self.socket_config.lock(|c| c.set(Some(config)));
    }

    pub(crate) fn add_observer(&self, observer: &'static dyn LteObserver) -> Result<(), Error> {
        self.observers.lock(|o| {
            let mut observers = o.borrow_mut();
            if observers.iter().any(|o| same_observer(*o, observer)) {
                return Err(Error::CallbackExists);
            }
            observers
                .push(observer)
                .map_err(|_| Error::CallbackListFull)
        })
    }

    pub(crate) fn remove_observer(&self, observer: &'static dyn LteObserver) -> Result<(), Error> {
        self.observers.lock(|o| {
            let mut observers = o.borrow_mut();
            let index = observers
                .iter()
                .position(|o| same_observer(*o, observer))
                .ok_or(Error::CallbackNotFound)?;
            observers.swap_remove(index);
            Ok(())
        })
    }

    /// Call every registered observer. Observers are called outside of the lock, so they may
    /// register or remove observers themselves.
    pub(crate) fn notify(&self, event: LteEvent) {
        let observers = self.observers.lock(|o| o.borrow().clone());
        for observer in observers {
            observer.on_event(event);
        }
    }
}

impl Default for LteContext {
    fn default() -> Self {
        Self::new()
    }
}
