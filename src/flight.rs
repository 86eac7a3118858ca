use crate::error::{BoxError, CacheError};

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// What a finished load produced: the value and the loader's TTL hint, or
/// the error every coalesced caller receives.
type Outcome<V> = Result<(V, Duration), CacheError>;

/// A per-key coordination record. The leader writes the outcome and
/// releases the latch; followers block on the latch and read it.
struct Call<V> {
  outcome: Mutex<Option<Outcome<V>>>,
  done: Condvar,
}

impl<V: Clone> Call<V> {
  fn new() -> Self {
    Self {
      outcome: Mutex::new(None),
      done: Condvar::new(),
    }
  }

  fn complete(&self, outcome: Outcome<V>) {
    let mut slot = self.outcome.lock();
    *slot = Some(outcome);
    self.done.notify_all();
  }

  fn wait(&self) -> Outcome<V> {
    let mut slot = self.outcome.lock();
    loop {
      if let Some(outcome) = slot.as_ref() {
        return outcome.clone();
      }
      self.done.wait(&mut slot);
    }
  }
}

/// Collapses concurrent loads of the same key onto one loader invocation.
///
/// This is a coordinator, not a cache: once a call completes and its record
/// is removed, the next caller for the same key executes the loader again.
pub(crate) struct SingleFlight<V> {
  calls: Mutex<HashMap<String, Arc<Call<V>>>>,
}

impl<V: Clone> SingleFlight<V> {
  pub(crate) fn new() -> Self {
    Self {
      calls: Mutex::new(HashMap::new()),
    }
  }

  /// Runs `load` for `key` unless a call is already in flight, in which
  /// case the caller blocks until the leader finishes and shares its
  /// outcome. A panicking loader is captured as an error for every caller
  /// and never poisons the call table.
  pub(crate) fn execute<F>(&self, key: &str, load: F) -> Outcome<V>
  where
    F: FnOnce() -> Result<(V, Duration), BoxError>,
  {
    let call = {
      let mut calls = self.calls.lock();
      if let Some(existing) = calls.get(key) {
        let existing = Arc::clone(existing);
        drop(calls);
        return existing.wait();
      }
      let call = Arc::new(Call::new());
      calls.insert(key.to_owned(), Arc::clone(&call));
      call
    };

    let outcome = match panic::catch_unwind(AssertUnwindSafe(load)) {
      Ok(Ok((value, ttl))) => Ok((value, ttl)),
      Ok(Err(err)) => Err(CacheError::Loader(Arc::new(err))),
      Err(payload) => Err(CacheError::LoaderPanic(panic_message(payload.as_ref()))),
    };

    // Release waiters first, then retire the record. A caller arriving in
    // between observes the completed outcome, which still counts as one
    // execution.
    call.complete(outcome.clone());
    self.calls.lock().remove(key);
    outcome
  }

  #[cfg(test)]
  fn in_flight(&self) -> usize {
    self.calls.lock().len()
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_owned()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "opaque panic payload".to_owned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Barrier;
  use std::thread;

  #[test]
  fn execute_returns_the_loader_outcome() {
    let flight: SingleFlight<String> = SingleFlight::new();
    let result = flight.execute("k", || Ok(("value".to_owned(), Duration::from_secs(5))));
    assert_eq!(result.unwrap(), ("value".to_owned(), Duration::from_secs(5)));
    assert_eq!(flight.in_flight(), 0);
  }

  #[test]
  fn concurrent_callers_share_one_execution() {
    let flight: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(16));

    let mut handles = Vec::new();
    for _ in 0..16 {
      let flight = Arc::clone(&flight);
      let calls = Arc::clone(&calls);
      let barrier = Arc::clone(&barrier);
      handles.push(thread::spawn(move || {
        barrier.wait();
        flight.execute("k", || {
          thread::sleep(Duration::from_millis(50));
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(("shared".to_owned(), Duration::ZERO))
        })
      }));
    }

    for handle in handles {
      let (value, _) = handle.join().unwrap().unwrap();
      assert_eq!(value, "shared");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(flight.in_flight(), 0);
  }

  #[test]
  fn errors_are_shared_with_followers() {
    let flight: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
    let barrier = Arc::new(Barrier::new(4));

    let mut handles = Vec::new();
    for _ in 0..4 {
      let flight = Arc::clone(&flight);
      let barrier = Arc::clone(&barrier);
      handles.push(thread::spawn(move || {
        barrier.wait();
        flight.execute("k", || {
          thread::sleep(Duration::from_millis(30));
          Err("upstream down".into())
        })
      }));
    }

    for handle in handles {
      let err = handle.join().unwrap().unwrap_err();
      assert!(matches!(err, CacheError::Loader(_)));
      assert_eq!(err.to_string(), "loader failed: upstream down");
    }
  }

  #[test]
  fn distinct_keys_do_not_coalesce() {
    let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = Vec::new();
    for i in 0..8 {
      let flight = Arc::clone(&flight);
      let calls = Arc::clone(&calls);
      let barrier = Arc::clone(&barrier);
      handles.push(thread::spawn(move || {
        barrier.wait();
        flight.execute(&format!("key-{i}"), || {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok((i, Duration::ZERO))
        })
      }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
      let (value, _) = handle.join().unwrap().unwrap();
      assert_eq!(value as usize, i);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 8);
  }

  #[test]
  fn sequential_calls_reexecute() {
    let flight: SingleFlight<u32> = SingleFlight::new();
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
      let result = flight.execute("k", || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok((7, Duration::ZERO))
      });
      assert_eq!(result.unwrap().0, 7);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn panicking_loader_becomes_an_error_and_does_not_poison() {
    let flight: SingleFlight<u32> = SingleFlight::new();

    let err = flight
      .execute("k", || panic!("loader exploded"))
      .unwrap_err();
    assert!(matches!(err, CacheError::LoaderPanic(_)));
    assert_eq!(err.to_string(), "loader panicked: loader exploded");
    assert_eq!(flight.in_flight(), 0);

    // The table is usable again afterwards.
    let result = flight.execute("k", || Ok((1, Duration::ZERO)));
    assert_eq!(result.unwrap().0, 1);
  }
}
