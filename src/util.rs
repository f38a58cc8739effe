use core::{
    cell::RefCell,
    future::{poll_fn, Future},
    task::Poll,
};

use embassy_sync::{blocking_mutex, blocking_mutex::raw::RawMutex, waitqueue::WakerRegistration};

/// A signal that keeps track of the last value signaled.
///
/// Unlike [embassy_sync::signal::Signal], reading the value does not consume it, so any number
/// of tasks can wait for the same condition.
pub struct StateSignal<M: RawMutex, T> {
    inner: blocking_mutex::Mutex<M, RefCell<StateSignalInner<T>>>,
}

struct StateSignalInner<T> {
    item: T,
    waker: WakerRegistration,
}

impl<M: RawMutex, T: Clone + PartialEq> StateSignal<M, T> {
    pub const fn new(item: T) -> Self {
        StateSignal {
            inner: blocking_mutex::Mutex::new(RefCell::new(StateSignalInner {
                item,
                waker: WakerRegistration::new(),
            })),
        }
    }

    /// Set the state of the signal and wake anyone calling [StateSignal::compare_wait].
    ///
    /// Returns whether the state changed.
    pub fn signal(&self, item: T) -> bool {
        self.inner.lock(|s| {
            let mut s = s.borrow_mut();
            let changed = s.item != item;
            s.item = item;
            s.waker.wake();
            changed
        })
    }

    /// Get the current state.
    pub fn current(&self) -> T {
        self.inner.lock(|s| s.borrow().item.clone())
    }

    /// Call `f` with the current state, and whenever the state changes, until `f` returns `true`.
    ///
    /// Returns the current state at which `f` returned true.
    pub fn compare_wait<'a>(
        &'a self,
        mut f: impl FnMut(&T) -> bool + 'a,
    ) -> impl Future<Output = T> + 'a {
        poll_fn(move |cx| {
            self.inner.lock(|s| {
                let mut s = s.borrow_mut();
                if f(&s.item) {
                    Poll::Ready(s.item.clone())
                } else {
                    s.waker.register(cx.waker());
                    Poll::Pending
                }
            })
        })
    }
}
