//! Notifications attached to transaction outcomes.

use crate::{EngineConfig, Poll, Result, TxContext};
use std::fmt;

/// State changes broadcast to observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollEvent {
    Created,
    VoteCast,
    Committed,
    Closed,
}

impl PollEvent {
    pub fn prefix(self) -> &'static str {
        match self {
            PollEvent::Created => "CreatePoll",
            PollEvent::VoteCast => "CastVote",
            PollEvent::Committed => "CommitVote",
            PollEvent::Closed => "ClosePoll",
        }
    }

    /// The event name for a poll, e.g. `ClosePoll P1`.
    pub fn name(self, poll_id: &str) -> String {
        format!("{} {}", self.prefix(), poll_id)
    }
}

impl fmt::Display for PollEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Emit `event` for `poll` with its JSON record as payload.
pub(crate) fn emit<C: TxContext>(
    ctx: &mut C,
    config: &EngineConfig,
    event: PollEvent,
    poll_id: &str,
    poll: &Poll,
) -> Result<()> {
    if !config.events.enabled {
        return Ok(());
    }
    let payload = serde_json::to_vec(poll)?;
    ctx.set_event(&event.name(poll_id), payload)
}
