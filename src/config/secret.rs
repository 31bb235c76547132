//! Credentials held in memory
//!
//! The PostgreSQL DSN is wrapped in [`secrecy::Secret`], so it is zeroed on
//! drop and redacted from `Debug` output. Reading it takes an explicit
//! `expose_secret()`.

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// String payload of a [`SecretString`]
#[derive(Clone, Zeroize, Serialize, Deserialize)]
#[serde(transparent)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

pub type SecretString = Secret<SecretValue>;

pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue(value))
}
