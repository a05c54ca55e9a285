//! Per-id de-duplication of concurrent async work.
//!
//! The first caller for an id runs the work; callers arriving while it is
//! running wait for its result instead of starting their own.

use std::{
  collections::HashMap,
  future::Future,
  sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;
use tracing::debug;

type Running<T> = Mutex<HashMap<String, watch::Receiver<Option<T>>>>;

pub(crate) struct Flights<T> {
  running: Running<T>,
}

impl<T> Default for Flights<T> {
  fn default() -> Self { Self { running: Mutex::new(HashMap::new()) } }
}

/// Removes the leader's entry however its work ends.
struct Landing<'a, T> {
  running: &'a Running<T>,
  id:      &'a str,
}

impl<T> Drop for Landing<'_, T> {
  fn drop(&mut self) {
    self
      .running
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(self.id);
  }
}

impl<T: Clone> Flights<T> {
  /// Run `work` for `id`, or join the run already in flight.
  ///
  /// `None` means the leading run was dropped before producing a result.
  pub(crate) async fn run<F>(&self, id: &str, work: F) -> Option<T>
  where
    F: Future<Output = T>,
  {
    let (mut rx, leader) = {
      let mut running = self.lock();
      match running.get(id) {
        Some(rx) => (rx.clone(), None),
        None => {
          let (tx, rx) = watch::channel(None);
          running.insert(id.to_owned(), rx.clone());
          (rx, Some(tx))
        }
      }
    };

    if let Some(tx) = leader {
      let _landing = Landing { running: &self.running, id };
      let out = work.await;
      tx.send_replace(Some(out.clone()));
      return Some(out);
    }

    debug!(id, "joining in-flight sync");
    match rx.wait_for(Option::is_some).await {
      Ok(slot) => slot.clone(),
      Err(_) => None,
    }
  }

  pub(crate) fn is_running(&self, id: &str) -> bool { self.lock().contains_key(id) }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, watch::Receiver<Option<T>>>> {
    self.running.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  use super::*;

  #[tokio::test(start_paused = true)]
  async fn concurrent_callers_share_one_run() {
    let flights = Flights::<usize>::default();
    let counter = AtomicUsize::new(0);
    let runs = &counter;
    let work = move || async move {
      runs.fetch_add(1, Ordering::SeqCst);
      tokio::time::sleep(Duration::from_secs(1)).await;
      7
    };

    let (a, b) = tokio::join!(flights.run("r1", work()), flights.run("r1", work()));
    assert_eq!((a, b), (Some(7), Some(7)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!flights.is_running("r1"));

    assert_eq!(flights.run("r1", work()).await, Some(7));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn dropped_leader_releases_followers() {
    let flights = Flights::<usize>::default();
    let leader = flights.run("p1", async {
      tokio::time::sleep(Duration::from_secs(60)).await;
      1
    });
    let follower = flights.run("p1", async { 2 });

    let (_, joined) = tokio::join!(
      tokio::time::timeout(Duration::from_secs(1), leader),
      follower
    );
    assert_eq!(joined, None);
    assert!(!flights.is_running("p1"));
  }
}
