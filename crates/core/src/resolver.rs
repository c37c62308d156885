//! Plurality winner resolution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vote counts per option, always enumerated in lexicographic label order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally(BTreeMap<String, u64>);

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tally with every label at zero.
    pub fn zeroed<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        labels.into_iter().map(|l| (l.to_string(), 0)).collect()
    }

    pub fn increment(&mut self, label: &str) {
        *self.0.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, label: &str) -> u64 {
        self.0.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(label, count)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(label, count)| (label.as_str(), *count))
    }
}

impl FromIterator<(String, u64)> for Tally {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Compute the winning option(s).
///
/// Scans the tally in canonical order keeping the running maximum: a
/// strictly greater count restarts the winner list, an equal count joins
/// it. The running maximum starts at zero, so a poll without votes is won
/// by every option. Winners come out in lexicographic order.
pub fn resolve_winners(tally: &Tally) -> Vec<String> {
    let mut best = 0u64;
    let mut winners: Vec<String> = Vec::new();

    for (label, count) in tally.iter() {
        if count > best {
            winners.clear();
            winners.push(label.to_string());
            best = count;
        } else if count == best {
            winners.push(label.to_string());
        }
    }

    winners
}
