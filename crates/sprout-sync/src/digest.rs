//! Content digests for cached resources.

use sha2::{Digest, Sha256};
use sprout_core::resource::CachedResource;

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String { hex::encode(Sha256::digest(bytes)) }

/// Whether `entry.bytes` still hash to the digest recorded at download time.
pub fn verify(entry: &CachedResource) -> bool {
  entry.digest == content_digest(&entry.bytes)
}

#[cfg(test)]
mod tests {
  use bytes::Bytes;
  use sprout_core::resource::ResourceType;

  use super::*;

  #[test]
  fn known_vector() {
    assert_eq!(
      content_digest(b"abc"),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }

  #[test]
  fn tampered_bytes_fail_verification() {
    let mut entry = CachedResource {
      key:           "pot_image".into(),
      url:           "/images/pot.png".into(),
      resource_type: ResourceType::Image,
      bytes:         Bytes::from_static(b"png"),
      cached_at:     0,
      size:          3,
      digest:        content_digest(b"png"),
    };
    assert!(verify(&entry));
    entry.bytes = Bytes::from_static(b"gif");
    assert!(!verify(&entry));
  }
}
