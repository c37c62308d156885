//! In-memory ledger.
//!
//! Simulates the hosting platform closely enough to exercise the engine:
//!
//! - a unit of work reads from a snapshot taken by [`MemoryLedger::begin`]
//!   and never observes its own writes;
//! - writes, endorsements and events are buffered and applied together by
//!   [`MemoryLedger::commit`];
//! - every read records the version it saw, and commit fails with
//!   [`Error::Conflict`] if any of those keys changed in the meantime.
//!
//! Values are kept in a `BTreeMap`, so [`MemoryLedger::state_hash`] is
//! independent of write order.

use crate::{Caller, Error, Hash, Ledger, Result, TxContext};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Versioned {
    value: Vec<u8>,
    version: u64,
}

/// A buffered write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Set(Vec<u8>),
    Delete,
}

/// An event attached to a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedEvent {
    pub tx_id: String,
    pub name: String,
    pub payload: Vec<u8>,
}

/// Committed world state.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    world: BTreeMap<String, Versioned>,
    endorsements: BTreeMap<String, BTreeSet<String>>,
    events: Vec<EmittedEvent>,
    sequence: u64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a unit of work over the current state.
    pub fn begin(&self, tx_id: impl Into<String>, caller: Caller) -> MemoryTx {
        MemoryTx {
            tx_id: tx_id.into(),
            caller,
            transient: BTreeMap::new(),
            snapshot: self.world.clone(),
            reads: RefCell::new(BTreeMap::new()),
            writes: BTreeMap::new(),
            endorsements: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Validate the read set of `tx` and apply its effects.
    pub fn commit(&mut self, tx: MemoryTx) -> Result<()> {
        for (key, seen) in tx.reads.borrow().iter() {
            let current = self.world.get(key).map(|v| v.version);
            if current != *seen {
                return Err(Error::Conflict(key.clone()));
            }
        }

        self.sequence += 1;
        for (key, mutation) in tx.writes {
            match mutation {
                Mutation::Set(value) => {
                    self.world.insert(
                        key,
                        Versioned {
                            value,
                            version: self.sequence,
                        },
                    );
                }
                Mutation::Delete => {
                    self.world.remove(&key);
                }
            }
        }
        for (key, org) in tx.endorsements {
            self.endorsements.entry(key).or_default().insert(org);
        }
        self.events.extend(tx.events);

        Ok(())
    }

    /// Run `f` inside `tx` and commit only if it succeeds.
    pub fn run<T>(
        &mut self,
        mut tx: MemoryTx,
        f: impl FnOnce(&mut MemoryTx) -> Result<T>,
    ) -> Result<T> {
        let output = f(&mut tx)?;
        self.commit(tx)?;
        Ok(output)
    }

    /// Open, run and commit a unit of work in one go.
    pub fn execute<T>(
        &mut self,
        tx_id: &str,
        caller: Caller,
        f: impl FnOnce(&mut MemoryTx) -> Result<T>,
    ) -> Result<T> {
        let tx = self.begin(tx_id, caller);
        self.run(tx, f)
    }

    /// Events of all committed transactions, oldest first.
    pub fn events(&self) -> &[EmittedEvent] {
        &self.events
    }

    /// Organizations allowed to endorse updates of `key`.
    pub fn endorsers(&self, key: &str) -> Vec<&str> {
        self.endorsements
            .get(key)
            .map(|orgs| orgs.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.world.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    /// Content hash over every key and value (versions excluded).
    pub fn state_hash(&self) -> Result<Hash> {
        let values: BTreeMap<&str, &[u8]> = self
            .world
            .iter()
            .map(|(k, v)| (k.as_str(), v.value.as_slice()))
            .collect();
        Hash::of_value(&values)
    }
}

/// Direct access to committed state, for bootstrapping and inspection.
impl Ledger for MemoryLedger {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.world.get(key).map(|v| v.value.clone()))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.sequence += 1;
        self.world.insert(
            key.to_string(),
            Versioned {
                value,
                version: self.sequence,
            },
        );
        Ok(())
    }

    fn delete_state(&mut self, key: &str) -> Result<()> {
        self.world.remove(key);
        Ok(())
    }
}

/// One open unit of work.
#[derive(Debug)]
pub struct MemoryTx {
    tx_id: String,
    caller: Caller,
    transient: BTreeMap<String, Vec<u8>>,
    snapshot: BTreeMap<String, Versioned>,
    reads: RefCell<BTreeMap<String, Option<u64>>>,
    writes: BTreeMap<String, Mutation>,
    endorsements: Vec<(String, String)>,
    events: Vec<EmittedEvent>,
}

impl MemoryTx {
    /// Attach a transient field.
    pub fn with_transient(mut self, field: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.transient.insert(field.into(), value.into());
        self
    }
}

impl Ledger for MemoryTx {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entry = self.snapshot.get(key);
        self.reads
            .borrow_mut()
            .insert(key.to_string(), entry.map(|v| v.version));
        Ok(entry.map(|v| v.value.clone()))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Ledger("empty key".into()));
        }
        self.writes.insert(key.to_string(), Mutation::Set(value));
        Ok(())
    }

    fn delete_state(&mut self, key: &str) -> Result<()> {
        self.writes.insert(key.to_string(), Mutation::Delete);
        Ok(())
    }
}

impl TxContext for MemoryTx {
    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn caller(&self) -> &Caller {
        &self.caller
    }

    fn transient(&self, field: &str) -> Option<&[u8]> {
        self.transient.get(field).map(Vec::as_slice)
    }

    fn set_endorsement(&mut self, key: &str, org: &str) -> Result<()> {
        self.endorsements.push((key.to_string(), org.to_string()));
        Ok(())
    }

    fn set_event(&mut self, name: &str, payload: Vec<u8>) -> Result<()> {
        self.events.push(EmittedEvent {
            tx_id: self.tx_id.clone(),
            name: name.to_string(),
            payload,
        });
        Ok(())
    }
}
