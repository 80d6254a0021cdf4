//! Budget ledger
//!
//! Claps handed out by one attendee to the other attendees of an event.
//! The sum of all entries never exceeds the budget: a delta that would break
//! this is rejected as a whole and the over-budget flag is raised until the
//! next committed delta.

use crate::{AssessmentError, Result};
use coinosis_types::{Address, TransactionState, TOTAL_BUDGET};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ClapLedger {
    owner: Address,
    budget: i64,
    claps: BTreeMap<Address, i64>,
    over_budget: bool,
}

impl ClapLedger {
    pub fn new(owner: Address) -> Self {
        Self::with_budget(owner, TOTAL_BUDGET)
    }

    pub fn with_budget(owner: Address, budget: i64) -> Self {
        Self {
            owner,
            budget,
            claps: BTreeMap::new(),
            over_budget: false,
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn budget(&self) -> i64 {
        self.budget
    }

    /// Add a zero entry for every attendee not yet known. Returns how many were added.
    pub fn ensure_attendees<'a>(&mut self, attendees: impl IntoIterator<Item = &'a Address>) -> usize {
        let mut added = 0;
        for address in attendees {
            if *address == self.owner || self.claps.contains_key(address) {
                continue;
            }
            self.claps.insert(address.clone(), 0);
            added += 1;
        }
        added
    }

    /// Zero every entry, keeping the known attendees.
    pub fn reset(&mut self) {
        for value in self.claps.values_mut() {
            *value = 0;
        }
        self.over_budget = false;
    }

    /// Replace the whole assessment, e.g. with one recovered from the backend.
    ///
    /// Attendees missing from `assessment` keep a zero entry.
    pub fn replace(&mut self, assessment: BTreeMap<Address, i64>) {
        self.reset();
        for (address, claps) in assessment {
            if address == self.owner {
                debug!(owner = %self.owner.short(), "Dropping self entry from recovered assessment");
                continue;
            }
            self.claps.insert(address, claps);
        }
    }

    pub fn claps_for(&self, address: &Address) -> i64 {
        self.claps.get(address).copied().unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.claps.values().sum()
    }

    pub fn remaining(&self) -> i64 {
        self.budget - self.total()
    }

    pub fn is_over_budget(&self) -> bool {
        self.over_budget
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.claps.contains_key(address)
    }

    /// Apply `delta` to one attendee. On success returns the claps still available.
    ///
    /// A decrement never takes an entry below zero.
    pub fn apply_delta(&mut self, address: &Address, delta: i64) -> Result<i64> {
        if *address == self.owner {
            return Err(AssessmentError::SelfAssessment);
        }
        let current = *self
            .claps
            .get(address)
            .ok_or_else(|| AssessmentError::UnknownAttendee(address.clone()))?;

        let next = current
            .checked_add(delta)
            .ok_or(AssessmentError::InvalidDelta { current, delta })?;
        if delta < 0 && next < 0 {
            return Err(AssessmentError::InvalidDelta { current, delta });
        }

        let remaining = match self.remaining().checked_sub(delta) {
            Some(remaining) if remaining >= 0 => remaining,
            _ => {
                self.over_budget = true;
                return Err(AssessmentError::BudgetExceeded {
                    remaining: self.remaining(),
                    delta,
                });
            }
        };

        self.claps.insert(address.clone(), next);
        self.over_budget = false;
        Ok(remaining)
    }

    pub fn can_increment(&self, address: &Address, state: TransactionState) -> bool {
        !state.freezes_ledger()
            && *address != self.owner
            && self.contains(address)
            && self.remaining() > 0
    }

    pub fn can_decrement(&self, address: &Address, state: TransactionState) -> bool {
        !state.freezes_ledger() && self.claps_for(address) > 0
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Address, i64)> {
        self.claps.iter().map(|(a, c)| (a, *c))
    }

    pub fn non_zero(&self) -> impl Iterator<Item = (&Address, i64)> {
        self.entries().filter(|(_, c)| *c != 0)
    }

    pub fn snapshot(&self) -> BTreeMap<Address, i64> {
        self.claps.clone()
    }

    /// Parallel address and clap arrays in the layout the contract expects.
    pub fn submission(&self) -> (Vec<Address>, Vec<i64>) {
        self.claps.iter().map(|(a, c)| (a.clone(), *c)).unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    fn ledger_with(entries: &[(u8, i64)]) -> ClapLedger {
        let mut ledger = ClapLedger::new(addr(0));
        let map = entries.iter().map(|(n, c)| (addr(*n), *c)).collect();
        ledger.replace(map);
        ledger
    }

    #[test]
    fn test_over_budget_rejected_unchanged() {
        let mut ledger = ledger_with(&[(1, 40), (2, 60)]);

        let err = ledger.apply_delta(&addr(1), 1).unwrap_err();
        assert!(matches!(err, AssessmentError::BudgetExceeded { remaining: 0, delta: 1 }));
        assert!(ledger.is_over_budget());
        assert_eq!(ledger.claps_for(&addr(1)), 40);
        assert_eq!(ledger.claps_for(&addr(2)), 60);

        // the next committed delta clears the flag
        ledger.apply_delta(&addr(2), -1).unwrap();
        assert!(!ledger.is_over_budget());
    }

    #[test]
    fn test_decrement_floor() {
        let mut ledger = ledger_with(&[(1, 0)]);
        assert!(!ledger.can_decrement(&addr(1), TransactionState::Registered));

        let err = ledger.apply_delta(&addr(1), -1).unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidDelta { current: 0, delta: -1 }));
        assert_eq!(ledger.claps_for(&addr(1)), 0);
        assert!(!ledger.is_over_budget());
    }

    #[test]
    fn test_extreme_deltas_rejected() {
        let mut ledger = ledger_with(&[(1, 10), (2, 0)]);

        assert!(matches!(
            ledger.apply_delta(&addr(2), i64::MAX),
            Err(AssessmentError::BudgetExceeded { remaining: 90, .. })
        ));
        assert!(matches!(
            ledger.apply_delta(&addr(1), i64::MAX),
            Err(AssessmentError::InvalidDelta { current: 10, .. })
        ));
        assert!(matches!(
            ledger.apply_delta(&addr(1), i64::MIN),
            Err(AssessmentError::InvalidDelta { .. })
        ));
        assert_eq!(ledger.claps_for(&addr(1)), 10);
        assert_eq!(ledger.remaining(), 90);
    }

    #[test]
    fn test_increment_disabled_when_spent_or_frozen() {
        let ledger = ledger_with(&[(1, 100), (2, 0)]);
        assert!(!ledger.can_increment(&addr(2), TransactionState::Registered));

        let ledger = ledger_with(&[(1, 10), (2, 0)]);
        assert!(ledger.can_increment(&addr(2), TransactionState::Registered));
        assert!(!ledger.can_increment(&addr(2), TransactionState::ClickedSend));
        assert!(!ledger.can_decrement(&addr(1), TransactionState::SentClaps));
    }

    #[test]
    fn test_self_clap_rejected() {
        let mut ledger = ClapLedger::new(addr(0));
        ledger.ensure_attendees(&[addr(0), addr(1)]);
        assert!(!ledger.contains(&addr(0)));
        assert!(matches!(
            ledger.apply_delta(&addr(0), 1),
            Err(AssessmentError::SelfAssessment)
        ));
    }

    #[test]
    fn test_roster_growth_keeps_values() {
        let mut ledger = ClapLedger::new(addr(0));
        assert_eq!(ledger.ensure_attendees(&[addr(1)]), 1);
        ledger.apply_delta(&addr(1), 7).unwrap();
        assert_eq!(ledger.ensure_attendees(&[addr(1), addr(2)]), 1);
        assert_eq!(ledger.claps_for(&addr(1)), 7);
        assert_eq!(ledger.claps_for(&addr(2)), 0);
        assert_eq!(ledger.remaining(), 93);
    }

    #[test]
    fn test_submission_layout() {
        let ledger = ledger_with(&[(2, 30), (1, 20)]);
        let (addresses, claps) = ledger.submission();
        assert_eq!(addresses, vec![addr(1), addr(2)]);
        assert_eq!(claps, vec![20, 30]);
    }
}
