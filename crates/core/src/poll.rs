//! The poll aggregate.
//!
//! ```text
//! Poll {
//!   ballot      : open | tokened | anonymous
//!   category, theme, description : String
//!   creator     : String                   // fixed at creation
//!   options     : Map<Label, List<String>> // keys fixed at creation
//!   win_options : List<Label>              // empty while open
//!   status      : open | closed
//!   commitments : List<Hex>                // anonymous ballots only
//! }
//! ```

use crate::ledger::check_component;
use crate::{BallotKind, Caller, Error, Result, Tally};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle status of a poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Open,
    Closed,
}

/// Parameters of a poll to create.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSpec {
    pub poll_id: String,
    pub ballot: BallotKind,
    pub category: String,
    pub theme: String,
    pub description: String,
    pub options: Vec<String>,
}

impl PollSpec {
    pub fn new(
        poll_id: impl Into<String>,
        ballot: BallotKind,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            poll_id: poll_id.into(),
            ballot,
            category: String::new(),
            theme: String::new(),
            description: String::new(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_text(
        mut self,
        category: impl Into<String>,
        theme: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.category = category.into();
        self.theme = theme.into();
        self.description = description.into();
        self
    }

    /// Check ids and option labels before anything touches the ledger.
    pub fn validate(&self) -> Result<()> {
        check_component(&self.poll_id)?;
        if self.options.is_empty() {
            return Err(Error::malformed(format!(
                "poll {} needs at least one option",
                self.poll_id
            )));
        }
        let mut seen = BTreeSet::new();
        for option in &self.options {
            check_component(option)?;
            if !seen.insert(option.as_str()) {
                return Err(Error::malformed(format!(
                    "option {:?} listed twice for poll {}",
                    option, self.poll_id
                )));
            }
        }
        Ok(())
    }
}

/// A stored poll record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub ballot: BallotKind,
    pub category: String,
    pub theme: String,
    pub description: String,
    pub creator: String,
    pub options: BTreeMap<String, Vec<String>>,
    pub win_options: Vec<String>,
    pub status: PollStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commitments: Vec<String>,
}

impl Poll {
    /// A fresh open poll with an empty vote list per option.
    pub fn new(spec: &PollSpec, creator: &str) -> Self {
        Self {
            ballot: spec.ballot,
            category: spec.category.clone(),
            theme: spec.theme.clone(),
            description: spec.description.clone(),
            creator: creator.to_string(),
            options: spec
                .options
                .iter()
                .map(|label| (label.clone(), Vec::new()))
                .collect(),
            win_options: Vec::new(),
            status: PollStatus::Open,
            commitments: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PollStatus::Open
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.contains_key(option)
    }

    /// Option labels in canonical order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    /// Votes per option in canonical order.
    pub fn tally(&self) -> Tally {
        self.options
            .iter()
            .map(|(label, votes)| (label.clone(), votes.len() as u64))
            .collect()
    }

    pub fn ensure_open(&self, poll_id: &str) -> Result<()> {
        if !self.is_open() {
            return Err(Error::invalid_state(format!("poll {} is not open", poll_id)));
        }
        Ok(())
    }

    pub fn ensure_option(&self, poll_id: &str, option: &str) -> Result<()> {
        if !self.has_option(option) {
            return Err(Error::InvalidOption {
                poll_id: poll_id.to_string(),
                option: option.to_string(),
            });
        }
        Ok(())
    }

    pub fn ensure_creator(&self, poll_id: &str, caller: &Caller, action: &'static str) -> Result<()> {
        if self.creator != caller.id {
            return Err(Error::Unauthorized {
                caller: caller.id.clone(),
                action,
                poll_id: poll_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn ensure_ballot(&self, poll_id: &str, expected: BallotKind) -> Result<()> {
        if self.ballot != expected {
            return Err(Error::invalid_state(format!(
                "poll {} uses a {} ballot, not {}",
                poll_id, self.ballot, expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn spec() -> PollSpec {
        PollSpec::new("P1", BallotKind::Tokened, ["B", "A"]).with_text("city", "parks", "")
    }

    #[test]
    fn new_poll_is_open_and_empty() {
        let poll = Poll::new(&spec(), "alice");
        assert!(poll.is_open());
        assert!(poll.win_options.is_empty());
        assert_eq!(poll.labels().collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(poll.options.values().all(Vec::is_empty));
    }

    #[test]
    fn json_shape() {
        let poll = Poll::new(&spec(), "alice");
        let json = serde_json::to_value(&poll).unwrap();
        assert_eq!(json["status"], "open");
        assert_eq!(json["ballot"], "tokened");
        assert_eq!(json["win_options"], serde_json::json!([]));
        assert!(json.get("commitments").is_none());
    }

    #[test]
    fn validation() {
        assert!(spec().validate().is_ok());

        let empty = PollSpec::new("P1", BallotKind::Open, Vec::<String>::new());
        assert_eq!(empty.validate().unwrap_err().kind(), ErrorKind::MalformedInput);

        let dup = PollSpec::new("P1", BallotKind::Open, ["A", "A"]);
        assert_eq!(dup.validate().unwrap_err().kind(), ErrorKind::MalformedInput);

        let no_id = PollSpec::new("", BallotKind::Open, ["A"]);
        assert_eq!(no_id.validate().unwrap_err().kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn guards() {
        let mut poll = Poll::new(&spec(), "alice");
        let bob = Caller::new("bob", "Org1");
        assert_eq!(
            poll.ensure_creator("P1", &bob, "close").unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            poll.ensure_option("P1", "C").unwrap_err().kind(),
            ErrorKind::InvalidOption
        );
        poll.status = PollStatus::Closed;
        assert_eq!(poll.ensure_open("P1").unwrap_err().kind(), ErrorKind::InvalidState);
    }
}
