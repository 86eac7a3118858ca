use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A broadcast cancellation signal shared by every background task a cache
/// owns. Cloning yields another handle onto the same signal; once
/// `cancel()` fires, every current and future wait returns immediately.
#[derive(Clone, Default)]
pub struct Shutdown {
  inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
  cancelled: Mutex<bool>,
  condvar: Condvar,
}

impl Shutdown {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fires the signal. Idempotent.
  pub fn cancel(&self) {
    let mut cancelled = self.inner.cancelled.lock();
    if !*cancelled {
      *cancelled = true;
      self.inner.condvar.notify_all();
    }
  }

  pub fn is_cancelled(&self) -> bool {
    *self.inner.cancelled.lock()
  }

  /// Blocks for up to `timeout` or until the signal fires, whichever comes
  /// first. Returns true once the signal has fired.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut cancelled = self.inner.cancelled.lock();
    while !*cancelled {
      if self
        .inner
        .condvar
        .wait_until(&mut cancelled, deadline)
        .timed_out()
      {
        break;
      }
    }
    *cancelled
  }
}

impl fmt::Debug for Shutdown {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Shutdown")
      .field("cancelled", &self.is_cancelled())
      .finish()
  }
}
