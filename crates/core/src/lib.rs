//! ezpoll-core: poll lifecycle and tally state machine.
//!
//! Every operation is a deterministic state transition executed once per
//! submitted transaction against a replicated key-value ledger:
//! - `PollStore`: poll records at their poll id
//! - `VoteTokenLedger`: single-use voting rights
//! - `BallotCaster`: public votes and close
//! - `CommitRevealTally`: anonymous commit-reveal votes
//! - `resolve_winners`: plurality over a canonically ordered tally
//!
//! The ledger, caller identity, transient payloads, endorsement and events
//! are provided by the host through [`TxContext`].

mod error;
mod hash;
mod ledger;
mod config;
mod poll;
mod resolver;
mod ballot;
mod store;
mod tokens;
mod caster;
mod commit_reveal;
mod events;
mod engine;
pub mod memory;
pub mod query;

pub use error::{Error, ErrorKind, Result};
pub use hash::Hash;
pub use ledger::{composite_key, Caller, Ledger, Namespace, TxContext};
pub use config::{DuplicatePolicy, EngineConfig, EventConfig, IssuanceConfig, RevealConfig, TransientConfig};
pub use poll::{Poll, PollSpec, PollStatus};
pub use resolver::{resolve_winners, Tally};
pub use ballot::{AnonymousBallot, BallotKind, BallotStrategy, OpenBallot, TokenScheme, TokenedBallot, VoteRecord};
pub use store::PollStore;
pub use tokens::{IssuedVotes, VoteToken, VoteTokenLedger};
pub use caster::BallotCaster;
pub use commit_reveal::{CommitRevealTally, CommitmentPayload, RevealPayload, TALLY_MARKER};
pub use events::PollEvent;
pub use engine::{Call, Engine, Response};
pub use memory::MemoryLedger;
