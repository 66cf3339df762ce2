use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, Thread};

/// The state of a value some thread is computing.
enum State<V> {
  Computing,
  Complete(Arc<V>),
  /// The computing thread failed or panicked. Nothing will be produced.
  Abandoned,
}

struct Inner<V> {
  state: State<V>,
  waiters: Vec<Thread>,
}

/// A value being computed by one thread that other threads may block on.
///
/// Waiters park until the computing thread either completes the flight with a
/// value or abandons it. An abandoned flight yields `None` so the waiter can
/// try again, usually becoming the next computing thread itself.
pub(crate) struct InFlight<V> {
  inner: Mutex<Inner<V>>,
}

impl<V> InFlight<V> {
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Computing,
        waiters: Vec::new(),
      }),
    }
  }

  /// Completes the flight with a value, waking all waiters.
  pub(crate) fn complete(&self, value: Arc<V>) {
    self.settle(State::Complete(value));
  }

  /// Marks the flight as failed, waking all waiters empty-handed.
  pub(crate) fn abandon(&self) {
    self.settle(State::Abandoned);
  }

  fn settle(&self, state: State<V>) {
    let waiters = {
      let mut inner = self.inner.lock();
      inner.state = state;
      std::mem::take(&mut inner.waiters)
    };
    for waiter in waiters {
      waiter.unpark();
    }
  }

  /// Blocks until the flight settles.
  pub(crate) fn wait(&self) -> Option<Arc<V>> {
    loop {
      {
        let mut inner = self.inner.lock();
        match &inner.state {
          State::Complete(value) => return Some(value.clone()),
          State::Abandoned => return None,
          State::Computing => inner.waiters.push(thread::current()),
        }
      }
      // Spurious wakeups just go around the loop again.
      thread::park();
    }
  }
}
