//! Per-thread event loops.
//!
//! An [`EventLoop`] owns a FIFO queue of events for the thread that created
//! it. Other threads post through cloneable [`EventLoopHandle`]s; events
//! are delivered in posting order, with no ordering across loops.
//!
//! # Lifecycle
//!
//! Creating a loop makes it the *current* loop of its thread, so objects
//! created afterwards on that thread receive their queued calls through
//! it. Dropping the loop restores the previous current loop, refuses new
//! posts and drops every pending event; dropped events release blocked
//! callers.
//!
//! # Example
//!
//! ```rust
//! use reflecta::runtime::EventLoop;
//! use std::thread;
//!
//! let (tx, rx) = crossbeam::channel::bounded(1);
//! let worker = thread::spawn(move || {
//!     let event_loop = EventLoop::new();
//!     tx.send(event_loop.handle()).unwrap();
//!     event_loop.run();
//! });
//!
//! let handle = rx.recv().unwrap();
//! assert!(handle.is_alive());
//! handle.quit();
//! worker.join().unwrap();
//! ```

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::RwLock;
use reflecta_log::{debug, trace};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

/// A unit of work delivered by an event loop.
pub(crate) trait Event: Send {
    fn dispatch(self: Box<Self>);
}

enum Message {
    Event(Box<dyn Event>),
    Quit,
}

thread_local! {
    static CURRENT: RefCell<Option<EventLoopHandle>> = const { RefCell::new(None) };
}

/// The calling thread's current event loop.
#[must_use]
pub fn current_loop() -> Option<EventLoopHandle> {
    CURRENT.with(|current| current.borrow().clone())
}

/// A FIFO event loop bound to the thread that created it.
pub struct EventLoop {
    handle: EventLoopHandle,
    receiver: Receiver<Message>,
    previous: Option<EventLoopHandle>,
    _not_send: PhantomData<*const ()>,
}

impl EventLoop {
    /// Creates a loop and makes it the calling thread's current loop.
    #[must_use]
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        let (sender, receiver) = channel::unbounded();
        let handle = EventLoopHandle {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            thread: thread::current().id(),
            sender,
            alive: Arc::new(RwLock::new(true)),
        };
        let previous = CURRENT.with(|current| current.borrow_mut().replace(handle.clone()));
        debug!("event loop {} created", handle.id);

        EventLoop {
            handle,
            receiver,
            previous,
            _not_send: PhantomData,
        }
    }

    /// A handle for posting to this loop.
    #[must_use]
    pub fn handle(&self) -> EventLoopHandle {
        self.handle.clone()
    }

    /// Delivers events until [`EventLoopHandle::quit`] is called.
    pub fn run(&self) {
        trace!("event loop {} running", self.handle.id);
        while let Ok(message) = self.receiver.recv() {
            match message {
                Message::Event(event) => event.dispatch(),
                Message::Quit => break,
            }
        }
        trace!("event loop {} left", self.handle.id);
    }

    /// Delivers the events already queued without blocking.
    ///
    /// A pending quit request stops processing; later events stay queued.
    ///
    /// # Returns
    ///
    /// The number of events delivered.
    pub fn process_pending(&self) -> usize {
        let mut delivered = 0;
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                Message::Event(event) => {
                    event.dispatch();
                    delivered += 1;
                }
                Message::Quit => break,
            }
        }
        delivered
    }

    /// Number of queued messages.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        let mut alive = self.handle.alive.write();
        *alive = false;
        let pending: Vec<Message> = self.receiver.try_iter().collect();
        drop(alive);
        let dropped = pending.len();
        drop(pending);

        let previous = self.previous.take();
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            if current.as_ref().is_some_and(|h| h.id == self.handle.id) {
                *current = previous;
            }
        });
        debug!(
            "event loop {} destroyed, {dropped} pending messages dropped",
            self.handle.id
        );
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("id", &self.handle.id)
            .field("pending", &self.receiver.len())
            .finish()
    }
}

/// Cloneable, thread-safe reference to an [`EventLoop`].
#[derive(Clone)]
pub struct EventLoopHandle {
    id: u64,
    thread: ThreadId,
    sender: Sender<Message>,
    alive: Arc<RwLock<bool>>,
}

impl EventLoopHandle {
    /// Loop identity.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Thread that owns the loop.
    #[must_use]
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Returns true until the loop is dropped.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }

    /// Asks the loop to leave [`EventLoop::run`].
    pub fn quit(&self) {
        let alive = self.alive.read();
        if *alive {
            let _ = self.sender.send(Message::Quit);
        }
    }

    /// Queues `event`.
    ///
    /// Returns the event back if the loop is gone.
    pub(crate) fn post(&self, event: Box<dyn Event>) -> Result<(), Box<dyn Event>> {
        let alive = self.alive.read();
        if !*alive {
            return Err(event);
        }
        match self.sender.send(Message::Event(event)) {
            Ok(()) => Ok(()),
            Err(channel::SendError(Message::Event(event))) => Err(event),
            Err(channel::SendError(Message::Quit)) => Ok(()),
        }
    }
}

impl PartialEq for EventLoopHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventLoopHandle {}

impl fmt::Debug for EventLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoopHandle")
            .field("id", &self.id)
            .field("thread", &self.thread)
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Push(Arc<Mutex<Vec<u32>>>, u32);

    impl Event for Push {
        fn dispatch(self: Box<Self>) {
            self.0.lock().unwrap().push(self.1);
        }
    }

    struct Flag(Arc<Mutex<bool>>);

    impl Event for Flag {
        fn dispatch(self: Box<Self>) {}
    }

    impl Drop for Flag {
        fn drop(&mut self) {
            *self.0.lock().unwrap() = true;
        }
    }

    #[test]
    fn test_events_are_fifo() {
        let event_loop = EventLoop::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = event_loop.handle();
        for i in 0..5 {
            assert!(handle.post(Box::new(Push(seen.clone(), i))).is_ok());
        }
        assert_eq!(event_loop.pending(), 5);
        assert_eq!(event_loop.process_pending(), 5);
        assert_eq!(*seen.lock().unwrap(), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_current_loop_is_restored() {
        let outer = EventLoop::new();
        assert_eq!(current_loop(), Some(outer.handle()));
        {
            let inner = EventLoop::new();
            assert_eq!(current_loop(), Some(inner.handle()));
        }
        assert_eq!(current_loop(), Some(outer.handle()));
        drop(outer);
        assert!(current_loop().is_none());
    }

    #[test]
    fn test_dropping_loop_drops_pending_events() {
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let dropped = Arc::new(Mutex::new(false));
        assert!(handle.post(Box::new(Flag(dropped.clone()))).is_ok());
        drop(event_loop);
        assert!(*dropped.lock().unwrap());
        assert!(!handle.is_alive());
        assert!(handle.post(Box::new(Flag(Arc::new(Mutex::new(false))))).is_err());
    }

    #[test]
    fn test_quit_stops_run() {
        let event_loop = EventLoop::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = event_loop.handle();
        handle.post(Box::new(Push(seen.clone(), 1))).ok();
        handle.quit();
        handle.post(Box::new(Push(seen.clone(), 2))).ok();

        event_loop.run();
        assert_eq!(*seen.lock().unwrap(), [1]);
        assert_eq!(event_loop.process_pending(), 1);
        assert_eq!(*seen.lock().unwrap(), [1, 2]);
    }
}
