// SPDX-License-Identifier: PMPL-1.0-or-later
//! Password hashing.
//!
//! Hashers are looked up by name in a fixed registry. Stored passwords are
//! opaque strings everywhere else in the crate.

use sha2::{Digest, Sha256, Sha512};

use crate::error::{Result, SecurityError};

/// Turns a clear-text password into the form stored on a [`User`](crate::User).
pub trait PasswordHasher: Send + Sync {
    /// Registry name of this hasher.
    fn name(&self) -> &'static str;

    fn hash(&self, password: &str) -> String;

    /// Check a clear-text password against a stored value.
    fn verify(&self, password: &str, stored: &str) -> bool {
        constant_time_eq(self.hash(password).as_bytes(), stored.as_bytes())
    }
}

/// Stores passwords as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn hash(&self, password: &str) -> String {
        password.to_string()
    }
}

/// Hex-encoded SHA-256 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl PasswordHasher for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn hash(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Hex-encoded SHA-512 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Hasher;

impl PasswordHasher for Sha512Hasher {
    fn name(&self) -> &'static str {
        "sha512"
    }

    fn hash(&self, password: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }
}

type HasherFactory = fn() -> Box<dyn PasswordHasher>;

fn plain() -> Box<dyn PasswordHasher> {
    Box::new(PlainHasher)
}

fn sha256() -> Box<dyn PasswordHasher> {
    Box::new(Sha256Hasher)
}

fn sha512() -> Box<dyn PasswordHasher> {
    Box::new(Sha512Hasher)
}

const REGISTRY: &[(&str, HasherFactory)] = &[
    ("plain", plain),
    ("sha256", sha256),
    ("sha512", sha512),
];

/// Names accepted by [`hasher_for`].
pub fn available_hashers() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

/// Look up a hasher by (case-insensitive) name.
pub fn hasher_for(name: &str) -> Result<Box<dyn PasswordHasher>> {
    REGISTRY
        .iter()
        .find(|(registered, _)| registered.eq_ignore_ascii_case(name))
        .map(|(_, factory)| factory())
        .ok_or_else(|| {
            SecurityError::InvalidConfig(format!(
                "unknown password hasher '{}' (available: {})",
                name,
                available_hashers().join(", ")
            ))
        })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
