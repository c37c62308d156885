//! Commit-reveal tallying for anonymous ballots.
//!
//! A voter commits to `{poll_id, tx_id, option, secret}` by handing the
//! payload to the engine through the transient channel. Only its hash is
//! stored. At close the creator reveals the transaction ids and secrets
//! used during the poll; the engine rebuilds every candidate payload from
//! `tx_ids x secrets x options` and counts the stored commitments that
//! match one.
//!
//! The search is exhaustive because a commitment carries no plaintext
//! label. Candidate hashes are computed once and looked up per commitment,
//! which yields exactly the matches of the pairwise search.

use crate::ballot::VoteRecord;
use crate::config::{DuplicatePolicy, RevealConfig};
use crate::events::{self, PollEvent};
use crate::ledger::{check_component, composite_key, Namespace};
use crate::tokens::VoteTokenLedger;
use crate::{
    resolve_winners, BallotKind, EngineConfig, Error, Hash, Poll, PollSpec, PollStatus, PollStore,
    Result, Tally, TxContext,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Placeholder appended to an option's vote list per recovered vote.
pub const TALLY_MARKER: &str = "vote";

/// The secret content of one anonymous vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentPayload {
    pub poll_id: String,
    pub tx_id: String,
    pub option: String,
    pub secret: String,
}

impl CommitmentPayload {
    /// The hex commitment stored on the poll.
    pub fn commitment(&self) -> Result<String> {
        Ok(Hash::of_value(self)?.to_hex())
    }
}

/// What the creator reveals to close an anonymous poll.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealPayload {
    pub poll_id: String,
    pub secrets: Vec<String>,
    pub transaction_ids: Vec<String>,
}

/// Anonymous ballot operations.
pub struct CommitRevealTally;

impl CommitRevealTally {
    /// Create an anonymous poll.
    pub fn create<C: TxContext>(ctx: &mut C, config: &EngineConfig, spec: &PollSpec) -> Result<Poll> {
        if spec.ballot != BallotKind::Anonymous {
            return Err(Error::malformed(format!(
                "poll {} is declared {} but created as anonymous",
                spec.poll_id, spec.ballot
            )));
        }
        PollStore::create(ctx, config, spec)
    }

    /// Record the caller's sealed vote. Returns the stored commitment.
    ///
    /// The payload's `tx_id` is the caller's vote token handle; redeeming
    /// it and consuming the commitment slot happen in the same unit of work.
    pub fn commit<C: TxContext>(ctx: &mut C, config: &EngineConfig) -> Result<String> {
        let payload: CommitmentPayload = read_transient(&*ctx, &config.transient.vote_field)?;
        check_component(&payload.poll_id)?;
        check_component(&payload.tx_id)?;

        let poll_id = payload.poll_id.clone();
        let mut poll = PollStore::get(&*ctx, &poll_id)?;
        poll.ensure_ballot(&poll_id, BallotKind::Anonymous)?;
        poll.ensure_open(&poll_id)?;
        poll.ensure_option(&poll_id, &payload.option)?;

        let slot_key = composite_key(Namespace::Commitment, &[&poll_id, &payload.tx_id])?;
        if ctx.get_state(&slot_key)?.is_some() {
            return Err(Error::TokenAlreadyUsed {
                poll_id,
                handle: payload.tx_id,
            });
        }

        let voter = ctx.caller().id.clone();
        let redemption =
            VoteTokenLedger::prepare_redeem(&*ctx, &poll_id, &poll, &payload.tx_id, &voter)?;

        let commitment = payload.commitment()?;
        poll.ballot.strategy().record(
            &mut poll,
            VoteRecord::Sealed {
                commitment: commitment.clone(),
            },
        )?;

        redemption.apply(ctx)?;
        ctx.put_state(&slot_key, b"true".to_vec())?;
        PollStore::put(ctx, &poll_id, &poll)?;
        events::emit(ctx, config, PollEvent::Committed, &poll_id, &poll)?;

        debug!(poll_id = %poll_id, commitments = poll.commitments.len(), "commitment recorded");

        Ok(commitment)
    }

    /// Reveal the secrets, recover the tally and close the poll.
    pub fn reveal_and_close<C: TxContext>(ctx: &mut C, config: &EngineConfig) -> Result<Poll> {
        let reveal: RevealPayload = read_transient(&*ctx, &config.transient.reveal_field)?;
        check_component(&reveal.poll_id)?;

        let poll_id = reveal.poll_id.clone();
        let mut poll = PollStore::get(&*ctx, &poll_id)?;
        poll.ensure_ballot(&poll_id, BallotKind::Anonymous)?;
        let caller = ctx.caller().clone();
        poll.ensure_creator(&poll_id, &caller, "close")?;
        poll.ensure_open(&poll_id)?;

        let strategy = poll.ballot.strategy();
        let tally = strategy.recover_tally(&poll_id, &mut poll, Some(&reveal), config)?;

        poll.win_options = resolve_winners(&tally);
        poll.status = PollStatus::Closed;

        PollStore::put(ctx, &poll_id, &poll)?;
        events::emit(ctx, config, PollEvent::Closed, &poll_id, &poll)?;

        info!(
            poll_id = %poll_id,
            revealed = tally.total(),
            commitments = poll.commitments.len(),
            winners = ?poll.win_options,
            "anonymous poll closed"
        );

        Ok(poll)
    }
}

/// Match every stored commitment against the revealed candidates.
pub(crate) fn match_commitments(
    poll_id: &str,
    poll: &Poll,
    reveal: &RevealPayload,
    config: &RevealConfig,
) -> Result<Tally> {
    let tx_ids = reveal_entries(poll_id, "transaction id", &reveal.transaction_ids, config.duplicates)?;
    let secrets = reveal_entries(poll_id, "secret", &reveal.secrets, config.duplicates)?;

    let candidates = [tx_ids.len(), secrets.len(), poll.options.len()]
        .iter()
        .try_fold(1u64, |acc, n| acc.checked_mul(*n as u64))
        .unwrap_or(u64::MAX);
    if candidates > config.max_combinations {
        warn!(poll_id, candidates, limit = config.max_combinations, "reveal over budget");
        return Err(Error::malformed(format!(
            "reveal for poll {} needs {} candidate hashes, limit is {}",
            poll_id, candidates, config.max_combinations
        )));
    }

    let mut tally = Tally::zeroed(poll.labels());
    if poll.commitments.is_empty() {
        return Ok(tally);
    }

    // commitment -> (label, times the candidate was rebuilt)
    let mut hashes: BTreeMap<String, (&str, u64)> = BTreeMap::new();
    for tx_id in &tx_ids {
        for secret in &secrets {
            for label in poll.labels() {
                let candidate = CommitmentPayload {
                    poll_id: poll_id.to_string(),
                    tx_id: tx_id.to_string(),
                    option: label.to_string(),
                    secret: secret.to_string(),
                };
                hashes.entry(candidate.commitment()?).or_insert((label, 0)).1 += 1;
            }
        }
    }

    let mut unmatched = 0usize;
    for commitment in &poll.commitments {
        match hashes.get(commitment) {
            Some((label, times)) => {
                for _ in 0..*times {
                    tally.increment(label);
                }
            }
            None => unmatched += 1,
        }
    }

    if unmatched > 0 {
        warn!(poll_id, unmatched, "commitments left unrevealed");
    }

    Ok(tally)
}

/// Sorted reveal entries with `policy` applied to repeats.
fn reveal_entries<'a>(
    poll_id: &str,
    what: &str,
    entries: &'a [String],
    policy: DuplicatePolicy,
) -> Result<Vec<&'a str>> {
    let mut sorted: Vec<&str> = entries.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    if policy == DuplicatePolicy::CountEach {
        return Ok(sorted);
    }

    let listed = sorted.len();
    sorted.dedup();
    if policy == DuplicatePolicy::Reject && sorted.len() != listed {
        warn!(poll_id, what, repeats = listed - sorted.len(), "duplicate reveal entries");
        return Err(Error::malformed(format!(
            "reveal for poll {} lists a {} more than once",
            poll_id, what
        )));
    }
    Ok(sorted)
}

/// Decode a JSON transient field.
pub(crate) fn read_transient<T: DeserializeOwned, C: TxContext + ?Sized>(ctx: &C, field: &str) -> Result<T> {
    let bytes = ctx
        .transient(field)
        .ok_or_else(|| Error::malformed(format!("transient field {:?} missing", field)))?;
    serde_json::from_slice(bytes)
        .map_err(|e| Error::malformed(format!("transient field {:?}: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn poll_with(commitments: &[&CommitmentPayload]) -> Poll {
        let mut poll = Poll::new(&PollSpec::new("P1", BallotKind::Anonymous, ["A", "B"]), "alice");
        poll.commitments = commitments.iter().map(|p| p.commitment().unwrap()).collect();
        poll
    }

    fn payload(tx: &str, option: &str, secret: &str) -> CommitmentPayload {
        CommitmentPayload {
            poll_id: "P1".into(),
            tx_id: tx.into(),
            option: option.into(),
            secret: secret.into(),
        }
    }

    fn reveal(txs: &[&str], secrets: &[&str]) -> RevealPayload {
        RevealPayload {
            poll_id: "P1".into(),
            secrets: secrets.iter().map(|s| s.to_string()).collect(),
            transaction_ids: txs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn commitment_depends_on_every_field() {
        let base = payload("tx1", "A", "s1").commitment().unwrap();
        assert_eq!(base.len(), 64);
        assert_ne!(base, payload("tx2", "A", "s1").commitment().unwrap());
        assert_ne!(base, payload("tx1", "B", "s1").commitment().unwrap());
        assert_ne!(base, payload("tx1", "A", "s2").commitment().unwrap());
    }

    #[test]
    fn matches_revealed_votes() {
        let v1 = payload("tx1", "A", "s1");
        let v2 = payload("tx2", "B", "s2");
        let v3 = payload("tx3", "A", "s3");
        let poll = poll_with(&[&v1, &v2, &v3]);

        let tally = match_commitments(
            "P1",
            &poll,
            &reveal(&["tx1", "tx2", "tx3"], &["s1", "s2", "s3"]),
            &RevealConfig::default(),
        )
        .unwrap();
        assert_eq!(tally.get("A"), 2);
        assert_eq!(tally.get("B"), 1);
    }

    #[test]
    fn wrong_secret_matches_nothing() {
        let poll = poll_with(&[&payload("tx1", "A", "s1")]);
        let tally = match_commitments("P1", &poll, &reveal(&["tx1"], &["nope"]), &RevealConfig::default())
            .unwrap();
        assert_eq!(tally.total(), 0);
        assert_eq!(tally.len(), 2);
    }

    fn with_duplicates(duplicates: DuplicatePolicy) -> RevealConfig {
        RevealConfig {
            duplicates,
            ..RevealConfig::default()
        }
    }

    #[test]
    fn shared_secret_still_counts_each_vote_once() {
        let poll = poll_with(&[
            &payload("tx1", "A", "s"),
            &payload("tx2", "A", "s"),
            &payload("tx3", "B", "s"),
        ]);
        let tally = match_commitments(
            "P1",
            &poll,
            &reveal(&["tx1", "tx2", "tx3"], &["s"]),
            &RevealConfig::default(),
        )
        .unwrap();
        assert_eq!(tally.get("A"), 2);
        assert_eq!(tally.get("B"), 1);
    }

    #[test]
    fn repeated_entries_rejected_by_default() {
        let poll = poll_with(&[&payload("tx1", "A", "s1")]);
        let repeated_tx = reveal(&["tx1", "tx1"], &["s1"]);
        let err = match_commitments("P1", &poll, &repeated_tx, &RevealConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);

        let repeated_secret = reveal(&["tx1"], &["s1", "s1"]);
        let err = match_commitments("P1", &poll, &repeated_secret, &RevealConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn repeated_entries_collapse() {
        let poll = poll_with(&[&payload("tx1", "A", "s1")]);
        let tally = match_commitments(
            "P1",
            &poll,
            &reveal(&["tx1", "tx1"], &["s1", "s1", "s1"]),
            &with_duplicates(DuplicatePolicy::Collapse),
        )
        .unwrap();
        assert_eq!(tally.get("A"), 1);
    }

    #[test]
    fn repeated_entries_count_each() {
        let poll = poll_with(&[&payload("tx1", "A", "s1"), &payload("tx2", "B", "s2")]);
        let tally = match_commitments(
            "P1",
            &poll,
            &reveal(&["tx1", "tx1", "tx2"], &["s1", "s1", "s1", "s2"]),
            &with_duplicates(DuplicatePolicy::CountEach),
        )
        .unwrap();
        // tx1 listed twice, s1 three times
        assert_eq!(tally.get("A"), 6);
        assert_eq!(tally.get("B"), 1);
    }

    #[test]
    fn combination_budget_enforced() {
        let poll = poll_with(&[&payload("tx1", "A", "s1"), &payload("tx2", "A", "s2")]);
        let config = RevealConfig {
            max_combinations: 3,
            ..RevealConfig::default()
        };
        // 2 txs * 1 secret * 2 options = 4
        let err = match_commitments("P1", &poll, &reveal(&["tx1", "tx2"], &["s1"]), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn budget_applies_without_commitments() {
        let poll = poll_with(&[]);
        let txs: Vec<String> = (0..700).map(|i| format!("tx{}", i)).collect();
        let secrets: Vec<String> = (0..700).map(|i| format!("s{}", i)).collect();
        let large = RevealPayload {
            poll_id: "P1".into(),
            secrets,
            transaction_ids: txs,
        };

        let tight = RevealConfig {
            max_combinations: 1,
            ..RevealConfig::default()
        };
        let err = match_commitments("P1", &poll, &large, &tight).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);

        // within budget, an empty poll hashes nothing and tallies zero
        let tally = match_commitments("P1", &poll, &large, &RevealConfig::default()).unwrap();
        assert_eq!(tally.total(), 0);
        assert_eq!(tally.len(), 2);
    }
}
