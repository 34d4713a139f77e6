//! Secret configuration values.
//!
//! A [`Secret`] wraps a `SecretString`, so the plaintext is zeroed when the
//! last copy is dropped and never shows up through `Debug` or `Display`.
//! Code that needs the plaintext (for example to hand it to the provisioning
//! backend) must call [`Secret::expose`] explicitly.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::consts::REDACTED;

/// A secret string value.
#[derive(Clone)]
pub struct Secret {
  inner: SecretString,
}

impl Secret {
  /// Wraps a plaintext value.
  pub fn new(value: impl Into<String>) -> Self {
    Self {
      inner: SecretString::from(value.into()),
    }
  }

  /// A fresh random value: 32 bytes from the thread-local CSPRNG, hex encoded.
  pub fn generate() -> Self {
    Self::new(hex::encode(rand::random::<[u8; 32]>()))
  }

  /// Exposes the plaintext.
  ///
  /// The returned reference must not be logged or persisted.
  pub fn expose(&self) -> &str {
    self.inner.expose_secret()
  }

  /// Returns true if the secret is the empty string.
  pub fn is_empty(&self) -> bool {
    self.expose().is_empty()
  }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Secret").field(&REDACTED).finish()
  }
}

impl fmt::Display for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(REDACTED)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn formatting_is_redacted() {
    let secret = Secret::new("hunter2!");
    assert_eq!(format!("{secret}"), "[secret]");
    assert!(!format!("{secret:?}").contains("hunter2"));
  }

  #[test]
  fn expose_returns_plaintext() {
    let secret = Secret::new("hunter2!");
    assert_eq!(secret.expose(), "hunter2!");
    assert!(!secret.is_empty());
    assert!(Secret::new("").is_empty());
  }

  #[test]
  fn generated_values_are_distinct() {
    let a = Secret::generate();
    let b = Secret::generate();
    assert_eq!(a.expose().len(), 64);
    assert_ne!(a.expose(), b.expose());
  }
}
