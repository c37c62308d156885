//! The boundary between the engine and its hosting ledger.
//!
//! Every operation runs inside exactly one unit of work provided by the
//! host. The engine only ever talks to the host through [`TxContext`]:
//!
//! ```text
//! get(key) -> bytes | absent      put(key, bytes)      delete(key)
//! caller() -> (identity, org)     tx_id() -> fresh id  transient(field)
//! set_endorsement(key, org)       set_event(name, payload)
//! ```
//!
//! Conflict detection between concurrent units of work belongs to the
//! host. A host reports a stale read as [`Error::Conflict`], which the
//! engine passes through untouched.

use crate::{Error, Result};
use std::fmt;

/// Separator between composite key components.
const KEY_SEPARATOR: char = '\u{0}';

/// Key-value access inside one unit of work.
pub trait Ledger {
    /// Read a key. Reads observe the state at the start of the unit of work.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a key.
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Delete a key.
    fn delete_state(&mut self, key: &str) -> Result<()>;
}

/// Everything the platform provides to one invocation.
pub trait TxContext: Ledger {
    /// The fresh, platform-supplied identifier of this transaction.
    fn tx_id(&self) -> &str;

    /// The submitting caller.
    fn caller(&self) -> &Caller;

    /// Off-ledger payload visible only to this invocation.
    fn transient(&self, field: &str) -> Option<&[u8]>;

    /// Authorize `org` to co-sign future updates of `key`.
    fn set_endorsement(&mut self, key: &str, org: &str) -> Result<()>;

    /// Attach a notification to the transaction outcome.
    fn set_event(&mut self, name: &str, payload: Vec<u8>) -> Result<()>;
}

/// The submitting caller's identity, as verified by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub org: String,
}

impl Caller {
    pub fn new(id: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            org: org.into(),
        }
    }
}

/// Key namespaces owned by the engine.
///
/// Poll records live at their bare poll id; every other record lives under
/// a composite key whose first component is one of these tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    /// A vote token record.
    Vote,
    /// The per-poll issued-token index.
    IssuedVotes,
    /// One-token-per-recipient marker.
    Recipient,
    /// Consumed commitment slot.
    Commitment,
}

impl Namespace {
    pub fn tag(self) -> &'static str {
        match self {
            Namespace::Vote => "vote",
            Namespace::IssuedVotes => "issued",
            Namespace::Recipient => "recipient",
            Namespace::Commitment => "commit",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Build the composite ledger key `\0tag\0c1\0c2\0...`.
///
/// The leading separator keeps composite keys disjoint from plain poll
/// ids, which may not contain it.
pub fn composite_key(namespace: Namespace, components: &[&str]) -> Result<String> {
    let mut key = String::new();
    key.push(KEY_SEPARATOR);
    key.push_str(namespace.tag());
    key.push(KEY_SEPARATOR);
    for component in components {
        check_component(component)?;
        key.push_str(component);
        key.push(KEY_SEPARATOR);
    }
    Ok(key)
}

/// Validate a user-supplied identifier used in keys.
pub fn check_component(component: &str) -> Result<()> {
    if component.is_empty() {
        return Err(Error::malformed("key component must not be empty"));
    }
    if component.contains(KEY_SEPARATOR) {
        return Err(Error::malformed(format!(
            "key component {:?} contains a NUL character",
            component
        )));
    }
    Ok(())
}
