//! Casting and closing public ballots.

use crate::ballot::VoteRecord;
use crate::events::{self, PollEvent};
use crate::tokens::VoteTokenLedger;
use crate::{resolve_winners, BallotKind, EngineConfig, Error, Poll, PollStatus, PollStore, Result, TxContext};
use tracing::{debug, info};

/// Applies redeemed votes to open and tokened polls.
pub struct BallotCaster;

impl BallotCaster {
    /// Cast the caller's vote for `option` using token `handle`.
    pub fn cast<C: TxContext>(
        ctx: &mut C,
        config: &EngineConfig,
        poll_id: &str,
        handle: &str,
        option: &str,
    ) -> Result<Poll> {
        let mut poll = PollStore::get(&*ctx, poll_id)?;
        if poll.ballot == BallotKind::Anonymous {
            return Err(Error::invalid_state(format!(
                "poll {} is anonymous and takes commitments only",
                poll_id
            )));
        }
        poll.ensure_open(poll_id)?;
        poll.ensure_option(poll_id, option)?;

        let voter = ctx.caller().id.clone();
        let redemption = VoteTokenLedger::prepare_redeem(&*ctx, poll_id, &poll, handle, &voter)?;

        poll.ballot.strategy().record(
            &mut poll,
            VoteRecord::Public {
                option: option.to_string(),
                voter: voter.clone(),
            },
        )?;

        debug!(poll_id, handle = redemption.handle(), option, voter = %voter, "vote cast");

        redemption.apply(ctx)?;
        PollStore::put(ctx, poll_id, &poll)?;
        events::emit(ctx, config, PollEvent::VoteCast, poll_id, &poll)?;

        Ok(poll)
    }

    /// Close a public poll and record its winners. Creator only.
    pub fn close<C: TxContext>(ctx: &mut C, config: &EngineConfig, poll_id: &str) -> Result<Poll> {
        let mut poll = PollStore::get(&*ctx, poll_id)?;
        let caller = ctx.caller().clone();
        poll.ensure_creator(poll_id, &caller, "close")?;
        poll.ensure_open(poll_id)?;

        let tally = poll
            .ballot
            .strategy()
            .recover_tally(poll_id, &mut poll, None, config)?;

        poll.status = PollStatus::Closed;
        poll.win_options = resolve_winners(&tally);

        PollStore::put(ctx, poll_id, &poll)?;
        events::emit(ctx, config, PollEvent::Closed, poll_id, &poll)?;

        info!(poll_id, votes = tally.total(), winners = ?poll.win_options, "poll closed");

        Ok(poll)
    }
}
