//! Read-only views over stored polls and tokens.

use crate::tokens::{IssuedVotes, VoteTokenLedger};
use crate::{BallotKind, Error, Ledger, Poll, PollStatus, PollStore, Result};
use serde::{Deserialize, Serialize};

/// Votes recorded for one option.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCount {
    pub option: String,
    pub votes: u64,
}

/// Summary of a poll's outcome so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResults {
    pub poll_id: String,
    pub ballot: BallotKind,
    pub status: PollStatus,
    /// In canonical option order.
    pub counts: Vec<OptionCount>,
    pub win_options: Vec<String>,
    pub commitments: usize,
}

pub fn query_poll<L: Ledger + ?Sized>(ledger: &L, poll_id: &str) -> Result<Poll> {
    PollStore::get(ledger, poll_id)
}

pub fn query_results<L: Ledger + ?Sized>(ledger: &L, poll_id: &str) -> Result<PollResults> {
    let poll = PollStore::get(ledger, poll_id)?;
    Ok(PollResults {
        poll_id: poll_id.to_string(),
        ballot: poll.ballot,
        status: poll.status,
        counts: poll
            .tally()
            .iter()
            .map(|(option, votes)| OptionCount {
                option: option.to_string(),
                votes,
            })
            .collect(),
        win_options: poll.win_options.clone(),
        commitments: poll.commitments.len(),
    })
}

/// The issued-token index. Bearer-token polls keep none.
pub fn query_issued<L: Ledger + ?Sized>(ledger: &L, poll_id: &str) -> Result<IssuedVotes> {
    let poll = PollStore::get(ledger, poll_id)?;
    if !poll.ballot.strategy().token_scheme().indexed() {
        return Err(Error::invalid_state(format!(
            "poll {} uses bearer tokens and keeps no token index",
            poll_id
        )));
    }
    VoteTokenLedger::issued(ledger, poll_id)
}

/// Whether the token `handle` was used.
pub fn query_token<L: Ledger + ?Sized>(ledger: &L, poll_id: &str, handle: &str) -> Result<bool> {
    query_issued(ledger, poll_id)?;
    VoteTokenLedger::token_used(ledger, poll_id, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Caller, EngineConfig, ErrorKind, MemoryLedger, PollSpec};

    fn ledger_with(kind: BallotKind) -> MemoryLedger {
        let mut ledger = MemoryLedger::new();
        let config = EngineConfig::default();
        let spec = PollSpec::new("P1", kind, ["B", "A"]);
        ledger
            .execute("tx1", Caller::new("alice", "Org1MSP"), |ctx| {
                PollStore::create(ctx, &config, &spec)
            })
            .unwrap();
        ledger
    }

    #[test]
    fn results_are_in_canonical_order() {
        let ledger = ledger_with(BallotKind::Tokened);
        let results = query_results(&ledger, "P1").unwrap();
        let options: Vec<_> = results.counts.iter().map(|c| c.option.as_str()).collect();
        assert_eq!(options, vec!["A", "B"]);
        assert_eq!(results.status, PollStatus::Open);
        assert!(results.win_options.is_empty());
    }

    #[test]
    fn bearer_polls_have_no_index() {
        let ledger = ledger_with(BallotKind::Open);
        let err = query_issued(&ledger, "P1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn unknown_token() {
        let ledger = ledger_with(BallotKind::Tokened);
        assert!(query_issued(&ledger, "P1").unwrap().votes.is_empty());
        let err = query_token(&ledger, "P1", "tx9").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenNotFound);
    }
}
