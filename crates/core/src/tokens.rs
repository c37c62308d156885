//! Single-use vote tokens.
//!
//! A token is the right to cast one vote on one poll. The creator issues
//! it inside a transaction whose id becomes the token handle; the voter
//! later redeems the handle exactly once.
//!
//! ```text
//! bearer: vote/<poll>/<tx>/<org>              -> VoteToken
//! bound:  vote/<poll>/<tx>/<org>/<recipient>  -> VoteToken
//!         recipient/<poll>/<recipient>         -> tx
//!         issued/<poll>                        -> IssuedVotes { tx -> used }
//! ```

use crate::ballot::TokenScheme;
use crate::ledger::{check_component, composite_key, Namespace};
use crate::{EngineConfig, Error, Ledger, Poll, PollStore, Result, TxContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A stored voting right.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteToken {
    pub poll_id: String,
    pub tx_id: String,
    pub org: String,
    pub recipient: String,
    pub used: bool,
}

/// Every token issued on a poll and whether it was used.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedVotes {
    pub votes: BTreeMap<String, bool>,
}

impl IssuedVotes {
    pub fn used(&self) -> usize {
        self.votes.values().filter(|used| **used).count()
    }
}

/// A redemption that passed every check and only needs writing.
#[derive(Debug)]
pub(crate) struct Redemption {
    token_key: String,
    token: VoteToken,
    index: Option<(String, IssuedVotes)>,
}

impl Redemption {
    pub(crate) fn handle(&self) -> &str {
        &self.token.tx_id
    }

    /// Persist the used flag.
    pub(crate) fn apply<L: Ledger + ?Sized>(self, ledger: &mut L) -> Result<()> {
        ledger.put_state(&self.token_key, serde_json::to_vec(&self.token)?)?;
        if let Some((key, index)) = self.index {
            ledger.put_state(&key, serde_json::to_vec(&index)?)?;
        }
        Ok(())
    }
}

/// Issues and redeems vote tokens.
pub struct VoteTokenLedger;

impl VoteTokenLedger {
    /// Ledger key of a token under `scheme`.
    pub fn token_key(
        scheme: TokenScheme,
        poll_id: &str,
        handle: &str,
        org: &str,
        recipient: &str,
    ) -> Result<String> {
        match scheme {
            TokenScheme::Bearer => composite_key(Namespace::Vote, &[poll_id, handle, org]),
            TokenScheme::Bound => {
                composite_key(Namespace::Vote, &[poll_id, handle, org, recipient])
            }
        }
    }

    fn index_key(poll_id: &str) -> Result<String> {
        composite_key(Namespace::IssuedVotes, &[poll_id])
    }

    fn recipient_key(poll_id: &str, recipient: &str) -> Result<String> {
        composite_key(Namespace::Recipient, &[poll_id, recipient])
    }

    /// Write an empty issued-token index for a new poll.
    pub(crate) fn init_index<L: Ledger + ?Sized>(ledger: &mut L, poll_id: &str) -> Result<()> {
        let key = Self::index_key(poll_id)?;
        ledger.put_state(&key, serde_json::to_vec(&IssuedVotes::default())?)
    }

    /// Load the issued-token index of a poll.
    pub fn issued<L: Ledger + ?Sized>(ledger: &L, poll_id: &str) -> Result<IssuedVotes> {
        let key = Self::index_key(poll_id)?;
        let bytes = ledger
            .get_state(&key)?
            .ok_or_else(|| Error::NotFound(format!("issued vote index of poll {}", poll_id)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Issue a token for `recipient`. Only the poll creator may do this.
    ///
    /// Returns the handle the recipient redeems, which is the id of this
    /// transaction.
    pub fn issue<C: TxContext>(
        ctx: &mut C,
        config: &EngineConfig,
        poll_id: &str,
        recipient: &str,
    ) -> Result<String> {
        check_component(recipient)?;

        let poll = PollStore::get(&*ctx, poll_id)?;
        let caller = ctx.caller().clone();
        poll.ensure_creator(poll_id, &caller, "issue votes on")?;
        if config.issuance.require_open {
            poll.ensure_open(poll_id)?;
        }

        let scheme = poll.ballot.strategy().token_scheme();
        let handle = ctx.tx_id().to_string();
        check_component(&handle)?;

        let already_issued = || Error::AlreadyIssued {
            poll_id: poll_id.to_string(),
            recipient: recipient.to_string(),
        };

        let recipient_key = if scheme.unique_per_recipient() {
            let key = Self::recipient_key(poll_id, recipient)?;
            if ctx.get_state(&key)?.is_some() {
                return Err(already_issued());
            }
            Some(key)
        } else {
            None
        };

        let token_key = Self::token_key(scheme, poll_id, &handle, &caller.org, recipient)?;
        if ctx.get_state(&token_key)?.is_some() {
            return Err(already_issued());
        }

        let index = if scheme.indexed() {
            let mut index = Self::issued(&*ctx, poll_id)?;
            if index.votes.insert(handle.clone(), false).is_some() {
                return Err(already_issued());
            }
            Some(index)
        } else {
            None
        };

        let token = VoteToken {
            poll_id: poll_id.to_string(),
            tx_id: handle.clone(),
            org: caller.org.clone(),
            recipient: recipient.to_string(),
            used: false,
        };
        ctx.put_state(&token_key, serde_json::to_vec(&token)?)?;
        if let Some(key) = recipient_key {
            ctx.put_state(&key, handle.clone().into_bytes())?;
        }
        if let Some(index) = index {
            ctx.put_state(&Self::index_key(poll_id)?, serde_json::to_vec(&index)?)?;
        }

        debug!(poll_id, handle = %handle, recipient, org = %caller.org, "vote token issued");

        Ok(handle)
    }

    /// Redeem a token on behalf of `voter`.
    pub fn redeem<C: TxContext>(ctx: &mut C, poll_id: &str, handle: &str, voter: &str) -> Result<()> {
        let poll = PollStore::get(&*ctx, poll_id)?;
        let redemption = Self::prepare_redeem(&*ctx, poll_id, &poll, handle, voter)?;
        redemption.apply(ctx)
    }

    /// Check that `voter` may redeem `handle` without writing anything.
    ///
    /// The token key is derived from the caller's organization, so only
    /// members of the issuing organization can redeem.
    pub(crate) fn prepare_redeem<C: TxContext + ?Sized>(
        ctx: &C,
        poll_id: &str,
        poll: &Poll,
        handle: &str,
        voter: &str,
    ) -> Result<Redemption> {
        let not_found = || Error::TokenNotFound {
            poll_id: poll_id.to_string(),
            handle: handle.to_string(),
        };
        let already_used = || Error::TokenAlreadyUsed {
            poll_id: poll_id.to_string(),
            handle: handle.to_string(),
        };

        check_component(handle).map_err(|_| not_found())?;
        check_component(voter)?;

        let scheme = poll.ballot.strategy().token_scheme();

        let index = if scheme.indexed() {
            let mut index = Self::issued(ctx, poll_id)?;
            match index.votes.get_mut(handle) {
                None => return Err(not_found()),
                Some(true) => return Err(already_used()),
                Some(used) => *used = true,
            }
            Some((Self::index_key(poll_id)?, index))
        } else {
            None
        };

        let token_key = Self::token_key(scheme, poll_id, handle, &ctx.caller().org, voter)?;
        let bytes = ctx.get_state(&token_key)?.ok_or_else(not_found)?;
        let mut token: VoteToken = serde_json::from_slice(&bytes)?;
        if token.used {
            return Err(already_used());
        }
        token.used = true;

        Ok(Redemption {
            token_key,
            token,
            index,
        })
    }

    /// Whether an indexed token was used.
    pub fn token_used<L: Ledger + ?Sized>(ledger: &L, poll_id: &str, handle: &str) -> Result<bool> {
        Self::issued(ledger, poll_id)?
            .votes
            .get(handle)
            .copied()
            .ok_or_else(|| Error::TokenNotFound {
                poll_id: poll_id.to_string(),
                handle: handle.to_string(),
            })
    }
}
