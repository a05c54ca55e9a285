//! Durable blob cache abstractions.
//!
//! Modelled as a set of named caches: a [`CacheStorage`] opens a cache by
//! name, and each [`BlobCache`] is a key-addressable store of
//! [`CachedResource`] entries keyed by asset URL.

use std::future::Future;

use crate::resource::{CachedEntryMeta, CachedResource};

/// Opens named blob caches.
pub trait CacheStorage: Send + Sync {
  type Cache: BlobCache;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Open (or create) the cache called `name`.
  fn open<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Self::Cache, Self::Error>> + Send + 'a;
}

/// One named, durable, key-addressable blob store.
pub trait BlobCache: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `entry` under `entry.url`, replacing any previous entry.
  fn put(
    &self,
    entry: CachedResource,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Look up the entry stored under `url`.
  fn get<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<Option<CachedResource>, Self::Error>> + Send + 'a;

  /// Remove the entry under `url`; returns whether one existed.
  fn delete<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// All URLs currently stored.
  fn keys(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Metadata of every stored entry; never reads the bodies.
  fn entries(
    &self,
  ) -> impl Future<Output = Result<Vec<CachedEntryMeta>, Self::Error>> + Send + '_;

  fn clear(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
