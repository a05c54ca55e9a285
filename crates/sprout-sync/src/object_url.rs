//! In-process `blob:` URLs handed out for cached resources.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use bytes::Bytes;
use uuid::Uuid;

const SCHEME: &str = "blob:sprout/";

/// Maps live object URLs to the bytes they wrap. Callers revoke URLs they
/// no longer need.
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
  urls: Mutex<HashMap<String, Bytes>>,
}

impl ObjectUrlRegistry {
  pub fn create(&self, bytes: Bytes) -> String {
    let url = format!("{SCHEME}{}", Uuid::new_v4());
    self.lock().insert(url.clone(), bytes);
    url
  }

  pub fn resolve(&self, url: &str) -> Option<Bytes> { self.lock().get(url).cloned() }

  /// Returns whether `url` was live.
  pub fn revoke(&self, url: &str) -> bool { self.lock().remove(url).is_some() }

  pub fn revoke_all(&self) { self.lock().clear() }

  pub fn live_count(&self) -> usize { self.lock().len() }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bytes>> {
    self.urls.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn create_resolve_revoke() {
    let reg = ObjectUrlRegistry::default();
    let url = reg.create(Bytes::from_static(b"img"));
    assert!(url.starts_with("blob:sprout/"));
    assert_eq!(reg.resolve(&url), Some(Bytes::from_static(b"img")));
    assert!(reg.revoke(&url));
    assert!(!reg.revoke(&url));
    assert_eq!(reg.resolve(&url), None);
  }

  #[test]
  fn each_call_mints_a_distinct_url() {
    let reg = ObjectUrlRegistry::default();
    let a = reg.create(Bytes::new());
    let b = reg.create(Bytes::new());
    assert_ne!(a, b);
    assert_eq!(reg.live_count(), 2);
    reg.revoke_all();
    assert_eq!(reg.live_count(), 0);
  }
}
