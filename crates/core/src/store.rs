//! Durable poll records.

use crate::events::{self, PollEvent};
use crate::tokens::VoteTokenLedger;
use crate::{EngineConfig, Error, Ledger, Poll, PollSpec, Result, TxContext};
use tracing::info;

/// Reads and writes poll aggregates at their poll id.
pub struct PollStore;

impl PollStore {
    /// Create a poll owned by the caller.
    ///
    /// The creator's organization is granted endorsement rights on the
    /// poll key. Tokened ballots also get an empty issued-token index.
    pub fn create<C: TxContext>(ctx: &mut C, config: &EngineConfig, spec: &PollSpec) -> Result<Poll> {
        spec.validate()?;

        if Self::exists(&*ctx, &spec.poll_id)? {
            return Err(Error::AlreadyExists(spec.poll_id.clone()));
        }

        let caller = ctx.caller().clone();
        let poll = Poll::new(spec, &caller.id);

        Self::put(ctx, &spec.poll_id, &poll)?;
        ctx.set_endorsement(&spec.poll_id, &caller.org)?;

        if spec.ballot.strategy().token_scheme().indexed() {
            VoteTokenLedger::init_index(ctx, &spec.poll_id)?;
        }

        events::emit(ctx, config, PollEvent::Created, &spec.poll_id, &poll)?;

        info!(
            poll_id = %spec.poll_id,
            ballot = %spec.ballot,
            creator = %caller.id,
            options = poll.options.len(),
            "poll created"
        );

        Ok(poll)
    }

    /// Load a poll.
    pub fn get<L: Ledger + ?Sized>(ledger: &L, poll_id: &str) -> Result<Poll> {
        let bytes = ledger
            .get_state(poll_id)?
            .ok_or_else(|| Error::NotFound(format!("poll {}", poll_id)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn exists<L: Ledger + ?Sized>(ledger: &L, poll_id: &str) -> Result<bool> {
        Ok(ledger.get_state(poll_id)?.is_some())
    }

    /// Overwrite the poll record.
    pub fn put<L: Ledger + ?Sized>(ledger: &mut L, poll_id: &str, poll: &Poll) -> Result<()> {
        let bytes = serde_json::to_vec(poll)?;
        ledger.put_state(poll_id, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BallotKind, Caller, ErrorKind, MemoryLedger};

    fn alice() -> Caller {
        Caller::new("alice", "Org1MSP")
    }

    #[test]
    fn create_then_get() {
        let mut ledger = MemoryLedger::new();
        let config = EngineConfig::default();
        let spec = PollSpec::new("P1", BallotKind::Open, ["A", "B"]);

        ledger
            .execute("tx1", alice(), |ctx| PollStore::create(ctx, &config, &spec))
            .unwrap();

        let poll = PollStore::get(&ledger, "P1").unwrap();
        assert_eq!(poll.creator, "alice");
        assert!(poll.is_open());
        assert_eq!(ledger.endorsers("P1"), vec!["Org1MSP"]);
        assert_eq!(ledger.events()[0].name, "CreatePoll P1");
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut ledger = MemoryLedger::new();
        let config = EngineConfig::default();
        let spec = PollSpec::new("P1", BallotKind::Open, ["A"]);

        ledger
            .execute("tx1", alice(), |ctx| PollStore::create(ctx, &config, &spec))
            .unwrap();
        let err = ledger
            .execute("tx2", alice(), |ctx| PollStore::create(ctx, &config, &spec))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn missing_poll() {
        let ledger = MemoryLedger::new();
        assert_eq!(PollStore::get(&ledger, "nope").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn events_can_be_disabled() {
        let mut ledger = MemoryLedger::new();
        let mut config = EngineConfig::default();
        config.events.enabled = false;
        let spec = PollSpec::new("P1", BallotKind::Open, ["A"]);

        ledger
            .execute("tx1", alice(), |ctx| PollStore::create(ctx, &config, &spec))
            .unwrap();
        assert!(ledger.events().is_empty());
    }
}
