//! Ballot strategies.
//!
//! The three ballot variants share poll storage and winner resolution and
//! differ only in how a vote is recorded and how the tally is recovered:
//!
//! | kind        | token scheme      | recorded vote          | tally at close          |
//! |-------------|-------------------|------------------------|-------------------------|
//! | `open`      | bearer            | voter id under option  | list lengths            |
//! | `tokened`   | bound + indexed   | voter id under option  | list lengths            |
//! | `anonymous` | bound + indexed   | commitment hash        | brute-force reveal      |

use crate::commit_reveal::{self, RevealPayload};
use crate::{EngineConfig, Error, Poll, Result, Tally};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which ballot variant a poll runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallotKind {
    Open,
    Tokened,
    Anonymous,
}

impl BallotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BallotKind::Open => "open",
            BallotKind::Tokened => "tokened",
            BallotKind::Anonymous => "anonymous",
        }
    }

    /// The strategy implementing this kind.
    pub fn strategy(self) -> &'static dyn BallotStrategy {
        match self {
            BallotKind::Open => &OpenBallot,
            BallotKind::Tokened => &TokenedBallot,
            BallotKind::Anonymous => &AnonymousBallot,
        }
    }
}

impl fmt::Display for BallotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BallotKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(BallotKind::Open),
            "tokened" => Ok(BallotKind::Tokened),
            "anonymous" => Ok(BallotKind::Anonymous),
            other => Err(Error::malformed(format!("unknown ballot kind {:?}", other))),
        }
    }
}

/// How vote tokens are keyed and tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenScheme {
    /// Keyed by (poll, tx, org). Any caller of the issuing organization
    /// holding the handle may redeem it. No per-recipient uniqueness.
    Bearer,
    /// Keyed by (poll, tx, org, recipient), one per recipient, tracked in
    /// the poll's issued-token index.
    Bound,
}

impl TokenScheme {
    pub fn indexed(self) -> bool {
        matches!(self, TokenScheme::Bound)
    }

    pub fn unique_per_recipient(self) -> bool {
        matches!(self, TokenScheme::Bound)
    }
}

/// A validated vote ready to be recorded on a poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteRecord {
    /// A cleartext vote by `voter` for `option`.
    Public { option: String, voter: String },
    /// An opaque commitment hash.
    Sealed { commitment: String },
}

/// The variant-specific part of the poll state machine.
pub trait BallotStrategy: Send + Sync {
    fn kind(&self) -> BallotKind;

    fn token_scheme(&self) -> TokenScheme;

    /// Append a vote to the poll.
    fn record(&self, poll: &mut Poll, vote: VoteRecord) -> Result<()>;

    /// Turn the poll's recorded votes into a tally at close.
    fn recover_tally(
        &self,
        poll_id: &str,
        poll: &mut Poll,
        reveal: Option<&RevealPayload>,
        config: &EngineConfig,
    ) -> Result<Tally>;
}

fn record_public(kind: BallotKind, poll: &mut Poll, vote: VoteRecord) -> Result<()> {
    match vote {
        VoteRecord::Public { option, voter } => {
            let votes = poll.options.get_mut(&option).ok_or_else(|| {
                Error::invalid_state(format!("option {:?} vanished from poll", option))
            })?;
            votes.push(voter);
            Ok(())
        }
        VoteRecord::Sealed { .. } => Err(Error::invalid_state(format!(
            "{} ballots do not take sealed votes",
            kind
        ))),
    }
}

fn public_tally(kind: BallotKind, poll: &Poll, reveal: Option<&RevealPayload>) -> Result<Tally> {
    if reveal.is_some() {
        return Err(Error::invalid_state(format!(
            "{} ballots have nothing to reveal",
            kind
        )));
    }
    Ok(poll.tally())
}

/// Public votes redeemed with bearer tokens.
pub struct OpenBallot;

impl BallotStrategy for OpenBallot {
    fn kind(&self) -> BallotKind {
        BallotKind::Open
    }

    fn token_scheme(&self) -> TokenScheme {
        TokenScheme::Bearer
    }

    fn record(&self, poll: &mut Poll, vote: VoteRecord) -> Result<()> {
        record_public(self.kind(), poll, vote)
    }

    fn recover_tally(
        &self,
        _poll_id: &str,
        poll: &mut Poll,
        reveal: Option<&RevealPayload>,
        _config: &EngineConfig,
    ) -> Result<Tally> {
        public_tally(self.kind(), poll, reveal)
    }
}

/// Public votes redeemed with recipient-bound, indexed tokens.
pub struct TokenedBallot;

impl BallotStrategy for TokenedBallot {
    fn kind(&self) -> BallotKind {
        BallotKind::Tokened
    }

    fn token_scheme(&self) -> TokenScheme {
        TokenScheme::Bound
    }

    fn record(&self, poll: &mut Poll, vote: VoteRecord) -> Result<()> {
        record_public(self.kind(), poll, vote)
    }

    fn recover_tally(
        &self,
        _poll_id: &str,
        poll: &mut Poll,
        reveal: Option<&RevealPayload>,
        _config: &EngineConfig,
    ) -> Result<Tally> {
        public_tally(self.kind(), poll, reveal)
    }
}

/// Commit-reveal votes.
pub struct AnonymousBallot;

impl BallotStrategy for AnonymousBallot {
    fn kind(&self) -> BallotKind {
        BallotKind::Anonymous
    }

    fn token_scheme(&self) -> TokenScheme {
        TokenScheme::Bound
    }

    fn record(&self, poll: &mut Poll, vote: VoteRecord) -> Result<()> {
        match vote {
            VoteRecord::Sealed { commitment } => {
                poll.commitments.push(commitment);
                Ok(())
            }
            VoteRecord::Public { .. } => Err(Error::invalid_state(
                "anonymous ballots only take sealed votes",
            )),
        }
    }

    fn recover_tally(
        &self,
        poll_id: &str,
        poll: &mut Poll,
        reveal: Option<&RevealPayload>,
        config: &EngineConfig,
    ) -> Result<Tally> {
        let reveal = reveal
            .ok_or_else(|| Error::invalid_state("anonymous ballots close through a reveal"))?;
        let recovered = commit_reveal::match_commitments(poll_id, poll, reveal, &config.reveal)?;
        for (label, count) in recovered.iter() {
            if let Some(markers) = poll.options.get_mut(label) {
                markers.extend(std::iter::repeat_n(commit_reveal::TALLY_MARKER.to_string(), count as usize));
            }
        }
        Ok(poll.tally())
    }
}
