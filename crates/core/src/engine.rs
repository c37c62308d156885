//! The ezpoll engine: dispatches one call per transaction.

use crate::query::{self, PollResults};
use crate::tokens::{IssuedVotes, VoteTokenLedger};
use crate::{
    BallotCaster, BallotKind, CommitRevealTally, EngineConfig, Error, Poll, PollSpec, PollStore,
    Result, TxContext,
};
use serde::Serialize;
use tracing::debug;

/// One engine operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreatePoll(PollSpec),
    IssueVote { poll_id: String, recipient: String },
    CastVote { poll_id: String, handle: String, option: String },
    ClosePoll { poll_id: String },
    /// Payload travels in the transient vote field.
    CommitVote,
    /// Payload travels in the transient reveal field.
    RevealAndClose,
    QueryPoll { poll_id: String },
    QueryResults { poll_id: String },
    QueryIssued { poll_id: String },
    QueryToken { poll_id: String, handle: String },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::CreatePoll(_) => "CreatePoll",
            Call::IssueVote { .. } => "IssueVote",
            Call::CastVote { .. } => "CastVote",
            Call::ClosePoll { .. } => "ClosePoll",
            Call::CommitVote => "CommitVote",
            Call::RevealAndClose => "RevealAndClose",
            Call::QueryPoll { .. } => "QueryPoll",
            Call::QueryResults { .. } => "QueryResults",
            Call::QueryIssued { .. } => "QueryIssued",
            Call::QueryToken { .. } => "QueryToken",
        }
    }

    /// Whether the call only reads state.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Call::QueryPoll { .. }
                | Call::QueryResults { .. }
                | Call::QueryIssued { .. }
                | Call::QueryToken { .. }
        )
    }

    /// Parse the positional string form, function name first:
    ///
    /// ```text
    /// CreatePoll <id> <open|tokened|anonymous> <category> <theme> <description> <option>...
    /// IssueVote <id> <recipient>
    /// CastVote <id> <handle> <option>
    /// ClosePoll <id>
    /// CommitVote
    /// RevealAndClose
    /// QueryPoll <id> | QueryResults <id> | QueryIssued <id> | QueryToken <id> <handle>
    /// ```
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let (function, rest) = args
            .split_first()
            .ok_or_else(|| Error::malformed("missing function name"))?;

        let exact = |n: usize| -> Result<()> {
            if rest.len() != n {
                return Err(Error::malformed(format!(
                    "{} takes {} arguments, got {}",
                    function,
                    n,
                    rest.len()
                )));
            }
            Ok(())
        };

        let call = match *function {
            "CreatePoll" => {
                if rest.len() < 6 {
                    return Err(Error::malformed(format!(
                        "CreatePoll takes at least 6 arguments, got {}",
                        rest.len()
                    )));
                }
                let ballot = rest[1].parse::<BallotKind>()?;
                Call::CreatePoll(
                    PollSpec::new(rest[0], ballot, rest[5..].iter().copied())
                        .with_text(rest[2], rest[3], rest[4]),
                )
            }
            "IssueVote" => {
                exact(2)?;
                Call::IssueVote {
                    poll_id: rest[0].to_string(),
                    recipient: rest[1].to_string(),
                }
            }
            "CastVote" => {
                exact(3)?;
                Call::CastVote {
                    poll_id: rest[0].to_string(),
                    handle: rest[1].to_string(),
                    option: rest[2].to_string(),
                }
            }
            "ClosePoll" => {
                exact(1)?;
                Call::ClosePoll {
                    poll_id: rest[0].to_string(),
                }
            }
            "CommitVote" => {
                exact(0)?;
                Call::CommitVote
            }
            "RevealAndClose" => {
                exact(0)?;
                Call::RevealAndClose
            }
            "QueryPoll" | "QueryResults" | "QueryIssued" => {
                exact(1)?;
                let poll_id = rest[0].to_string();
                match *function {
                    "QueryPoll" => Call::QueryPoll { poll_id },
                    "QueryResults" => Call::QueryResults { poll_id },
                    _ => Call::QueryIssued { poll_id },
                }
            }
            "QueryToken" => {
                exact(2)?;
                Call::QueryToken {
                    poll_id: rest[0].to_string(),
                    handle: rest[1].to_string(),
                }
            }
            other => return Err(Error::malformed(format!("unknown function {:?}", other))),
        };

        Ok(call)
    }
}

/// What a call returns to the submitter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// A newly issued token handle.
    Handle(String),
    /// A stored commitment.
    Commitment(String),
    Poll(Poll),
    Results(PollResults),
    Issued(IssuedVotes),
    TokenUsed(bool),
}

impl Response {
    /// JSON payload returned to the submitter. Handles and commitments are
    /// returned as raw strings.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Response::Handle(s) | Response::Commitment(s) => Ok(s.clone().into_bytes()),
            other => Ok(serde_json::to_vec(other)?),
        }
    }
}

/// Runs calls against a transaction context.
#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one call. The host commits the unit of work only on `Ok`.
    pub fn invoke<C: TxContext>(&self, ctx: &mut C, call: Call) -> Result<Response> {
        let span = tracing::debug_span!("invoke", call = call.name(), tx_id = ctx.tx_id());
        let _entered = span.enter();

        let result = self.dispatch(ctx, call);
        if let Err(err) = &result {
            debug!(kind = ?err.kind(), error = %err, "call rejected");
        }
        result
    }

    /// Parse positional arguments and run the call.
    pub fn invoke_args<C: TxContext, S: AsRef<str>>(&self, ctx: &mut C, args: &[S]) -> Result<Response> {
        let call = Call::from_args(args)?;
        self.invoke(ctx, call)
    }

    fn dispatch<C: TxContext>(&self, ctx: &mut C, call: Call) -> Result<Response> {
        let config = &self.config;
        match call {
            Call::CreatePoll(spec) => {
                let poll = if spec.ballot == BallotKind::Anonymous {
                    CommitRevealTally::create(ctx, config, &spec)?
                } else {
                    PollStore::create(ctx, config, &spec)?
                };
                Ok(Response::Poll(poll))
            }
            Call::IssueVote { poll_id, recipient } => {
                VoteTokenLedger::issue(ctx, config, &poll_id, &recipient).map(Response::Handle)
            }
            Call::CastVote {
                poll_id,
                handle,
                option,
            } => BallotCaster::cast(ctx, config, &poll_id, &handle, &option).map(Response::Poll),
            Call::ClosePoll { poll_id } => {
                BallotCaster::close(ctx, config, &poll_id).map(Response::Poll)
            }
            Call::CommitVote => CommitRevealTally::commit(ctx, config).map(Response::Commitment),
            Call::RevealAndClose => {
                CommitRevealTally::reveal_and_close(ctx, config).map(Response::Poll)
            }
            Call::QueryPoll { poll_id } => query::query_poll(&*ctx, &poll_id).map(Response::Poll),
            Call::QueryResults { poll_id } => {
                query::query_results(&*ctx, &poll_id).map(Response::Results)
            }
            Call::QueryIssued { poll_id } => {
                query::query_issued(&*ctx, &poll_id).map(Response::Issued)
            }
            Call::QueryToken { poll_id, handle } => {
                query::query_token(&*ctx, &poll_id, &handle).map(Response::TokenUsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Caller, ErrorKind, MemoryLedger};

    #[test]
    fn parse_create() {
        let call = Call::from_args(&[
            "CreatePoll", "P1", "tokened", "city", "parks", "which park", "north", "south",
        ])
        .unwrap();
        match call {
            Call::CreatePoll(spec) => {
                assert_eq!(spec.poll_id, "P1");
                assert_eq!(spec.ballot, BallotKind::Tokened);
                assert_eq!(spec.description, "which park");
                assert_eq!(spec.options, vec!["north", "south"]);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn parse_errors() {
        let empty: [&str; 0] = [];
        for args in [
            &empty[..],
            &["CreatePoll", "P1", "open", "c", "t", "d"][..],
            &["CreatePoll", "P1", "weird", "c", "t", "d", "A"][..],
            &["CastVote", "P1", "tx1"][..],
            &["Vote", "P1"][..],
        ] {
            let err = Call::from_args(args).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedInput, "{:?}", args);
        }
    }

    #[test]
    fn query_calls_are_flagged() {
        let call = Call::from_args(&["QueryToken", "P1", "tx1"]).unwrap();
        assert!(call.is_query());
        assert!(!Call::CommitVote.is_query());
    }

    #[test]
    fn invoke_args_end_to_end() {
        let engine = Engine::default();
        let mut ledger = MemoryLedger::new();
        let alice = Caller::new("alice", "Org1MSP");

        ledger
            .execute("tx1", alice.clone(), |ctx| {
                engine.invoke_args(ctx, &["CreatePoll", "P1", "tokened", "c", "t", "d", "A", "B"])
            })
            .unwrap();
        let handle = ledger
            .execute("tx2", alice, |ctx| engine.invoke_args(ctx, &["IssueVote", "P1", "bob"]))
            .unwrap();
        assert_eq!(handle.to_bytes().unwrap(), b"tx2".to_vec());

        let bob = Caller::new("bob", "Org1MSP");
        ledger
            .execute("tx3", bob.clone(), |ctx| {
                engine.invoke_args(ctx, &["CastVote", "P1", "tx2", "B"])
            })
            .unwrap();
        let used = ledger
            .execute("tx4", bob, |ctx| engine.invoke_args(ctx, &["QueryToken", "P1", "tx2"]))
            .unwrap();
        assert_eq!(used, Response::TokenUsed(true));
        assert_eq!(used.to_bytes().unwrap(), b"true".to_vec());
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.reveal.max_combinations = 0;
        assert_eq!(Engine::new(config).unwrap_err().kind(), ErrorKind::Config);
    }
}
