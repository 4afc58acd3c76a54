//! Packaged method calls.
//!
//! An [`Invocation`] captures a method together with deep copies of its
//! arguments, so the call can be executed later and on another thread.
//! Queued dispatch wraps an invocation in an event holding a `Weak`
//! reference to the target; blocking dispatch additionally pairs it with a
//! one-shot [`Semaphore`] the caller waits on.
//!
//! # Design
//!
//! - Arguments are copied with their type descriptors' copy constructors;
//!   a type without one cannot cross threads.
//! - The event releases the waiting caller exactly once: after running, or
//!   when it is dropped unrun (target destroyed, loop gone).
//!
//! # Safety
//!
//! A blocking call hands the callee a raw pointer to the caller's return
//! slot. The caller stays blocked until the event has run or been dropped,
//! so the pointer outlives every use.
//!
//! # Example
//!
//! ```rust
//! use reflecta::runtime::Semaphore;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let done = Arc::new(Semaphore::new(0));
//! let signal = done.clone();
//! thread::spawn(move || signal.release());
//! done.acquire();
//! assert_eq!(done.available_permits(), 0);
//! ```

use crate::error::InvokeError;
use crate::runtime::args::{Argument, ReturnSlot};
use crate::runtime::event_loop::Event;
use crate::runtime::invoke;
use crate::runtime::method::MetaMethod;
use crate::runtime::object::Reflect;
use crate::runtime::value::MetaValue;
use parking_lot::{Condvar, Mutex};
use reflecta_log::{trace, warn};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

// ============================================================================
// Semaphore
// ============================================================================

/// Counting semaphore.
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Semaphore {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Takes one permit, blocking until one is available.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Takes one permit if available.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Takes one permit, giving up after `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            if self.available.wait_for(&mut permits, timeout).timed_out() {
                break;
            }
        }
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Returns one permit and wakes a waiter.
    pub fn release(&self) {
        *self.permits.lock() += 1;
        self.available.notify_one();
    }

    /// Permits currently available.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        *self.permits.lock()
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("permits", &self.available_permits())
            .finish()
    }
}

/// One-shot rendezvous between a blocked caller and its queued call.
pub(crate) struct Completion {
    result: Mutex<Option<Result<(), InvokeError>>>,
    semaphore: Semaphore,
}

impl Completion {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Completion {
            result: Mutex::new(None),
            semaphore: Semaphore::new(0),
        })
    }

    fn complete(&self, result: Result<(), InvokeError>) {
        *self.result.lock() = Some(result);
        self.semaphore.release();
    }

    /// Blocks until the call ran or was dropped.
    pub(crate) fn wait(&self, signature: &str) -> Result<(), InvokeError> {
        self.semaphore.acquire();
        self.result
            .lock()
            .take()
            .unwrap_or_else(|| {
                Err(InvokeError::TargetDestroyed {
                    signature: signature.to_string(),
                })
            })
    }
}

// ============================================================================
// Invocation
// ============================================================================

/// A method call with owned copies of its arguments.
pub struct Invocation {
    method: MetaMethod,
    args: Vec<MetaValue>,
}

impl Invocation {
    /// Packages a call of `method` with copies of `args`.
    ///
    /// # Errors
    ///
    /// - The not-found family if `args` do not fit the parameters.
    /// - [`InvokeError::CouldNotQueueParameter`] naming the first argument
    ///   whose type cannot be copied.
    pub fn new(method: MetaMethod, args: &[Argument<'_>]) -> Result<Self, InvokeError> {
        method.check_arguments(args)?;
        let args = args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                arg.to_value().ok_or_else(|| InvokeError::CouldNotQueueParameter {
                    signature: method.signature().to_string(),
                    index: i + 1,
                    type_name: arg.meta_type().name().to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Invocation { method, args })
    }

    /// The packaged method.
    #[must_use]
    pub fn method(&self) -> MetaMethod {
        self.method
    }

    /// The copied arguments.
    #[must_use]
    pub fn arguments(&self) -> &[MetaValue] {
        &self.args
    }

    /// Runs the call on the current thread.
    ///
    /// # Errors
    ///
    /// As for a direct [`MetaMethod::invoke`].
    pub fn invoke(&self, target: &dyn Reflect, ret: Option<ReturnSlot<'_>>) -> Result<(), InvokeError> {
        if let Some(slot) = &ret {
            invoke::check_return(self.method, slot)?;
        }
        let ret = ret.map_or(std::ptr::null_mut(), |slot| slot.data());
        self.invoke_raw(target, ret)
    }

    fn invoke_raw(&self, target: &dyn Reflect, ret: *mut u8) -> Result<(), InvokeError> {
        invoke::call_direct(
            self.method,
            target,
            ret,
            self.args.iter().map(MetaValue::data),
        )
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method.signature())
            .field("args", &self.args)
            .finish()
    }
}

// ============================================================================
// Queued delivery
// ============================================================================

/// Return slot pointer of a blocked caller.
struct ReturnPtr(*mut u8);

// SAFETY: the pointer is only dereferenced while its owner is blocked
// waiting on the call's completion (see module docs).
unsafe impl Send for ReturnPtr {}

/// An invocation posted to the target's event loop.
pub(crate) struct QueuedCall {
    target: Weak<dyn Reflect>,
    invocation: Invocation,
    ret: Option<ReturnPtr>,
    completion: Option<Arc<Completion>>,
}

impl QueuedCall {
    pub(crate) fn new(target: &Arc<dyn Reflect>, invocation: Invocation) -> Self {
        QueuedCall {
            target: Arc::downgrade(target),
            invocation,
            ret: None,
            completion: None,
        }
    }

    /// Makes the call blocking: `completion` is released once it ran or
    /// was dropped, and the return value is written to `ret`.
    pub(crate) fn blocking(mut self, ret: *mut u8, completion: Arc<Completion>) -> Self {
        self.ret = (!ret.is_null()).then_some(ReturnPtr(ret));
        self.completion = Some(completion);
        self
    }

    pub(crate) fn signature(&self) -> &'static str {
        self.invocation.method.signature()
    }
}

impl Event for QueuedCall {
    fn dispatch(mut self: Box<Self>) {
        let result = match self.target.upgrade() {
            Some(target) => {
                let ret = self.ret.as_ref().map_or(std::ptr::null_mut(), |p| p.0);
                self.invocation.invoke_raw(&*target, ret)
            }
            None => {
                trace!("queued call to `{}` dropped: target destroyed", self.signature());
                Err(InvokeError::TargetDestroyed {
                    signature: self.signature().to_string(),
                })
            }
        };

        match self.completion.take() {
            Some(completion) => completion.complete(result),
            None => {
                if let Err(err) = result {
                    if !matches!(err, InvokeError::TargetDestroyed { .. }) {
                        warn!("queued call failed: {err}");
                    }
                }
            }
        }
    }
}

impl Drop for QueuedCall {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            trace!("blocking call to `{}` dropped unrun", self.signature());
            completion.complete(Err(InvokeError::TargetDestroyed {
                signature: self.signature().to_string(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_semaphore_counts() {
        let sem = Semaphore::new(2);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release();
        assert_eq!(sem.available_permits(), 1);
    }

    #[test]
    fn test_semaphore_timeout() {
        let sem = Semaphore::new(0);
        assert!(!sem.acquire_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_semaphore_wakes_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || {
                sem.acquire();
                true
            })
        };
        sem.release();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_completion_reports_result() {
        let completion = Completion::new();
        let remote = completion.clone();
        thread::spawn(move || remote.complete(Ok(()))).join().unwrap();
        assert_eq!(completion.wait("f()"), Ok(()));
    }
}
