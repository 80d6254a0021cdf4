use coinosis_types::{Address, Attendee};
use tracing::{debug, warn};

/// Attendees of the active event, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    attendees: Vec<Attendee>,
}

/// Live participant entry from the conferencing widget.
#[derive(Debug, Clone)]
pub struct PresenceUpdate {
    pub address: Address,
    pub present: bool,
    pub is_speaker: bool,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a freshly fetched attendee list. Known attendees keep their
    /// live presence flags; returns the addresses that were new.
    pub fn merge(&mut self, fetched: Vec<Attendee>) -> Vec<Address> {
        let mut added = Vec::new();
        for attendee in fetched {
            if self.get(&attendee.address).is_some() {
                continue;
            }
            added.push(attendee.address.clone());
            self.attendees.push(attendee);
        }
        if !added.is_empty() {
            debug!(added = added.len(), total = self.attendees.len(), "Roster grew");
        }
        added
    }

    /// Refresh `present` / `is_speaker` from the conferencing roster.
    ///
    /// An update for an address not on the roster is a stale read: it is
    /// logged and ignored.
    pub fn update_presence(&mut self, update: &PresenceUpdate) -> bool {
        match self
            .attendees
            .iter_mut()
            .find(|a| a.address == update.address)
        {
            Some(attendee) => {
                attendee.present = update.present;
                attendee.is_speaker = update.is_speaker;
                true
            }
            None => {
                warn!(
                    address = %update.address.short(),
                    "Presence update for attendee not on roster"
                );
                false
            }
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Attendee> {
        self.attendees.iter().find(|a| &a.address == address)
    }

    pub fn display_name(&self, address: &Address) -> String {
        self.get(address)
            .map(|a| a.display_name.clone())
            .unwrap_or_else(|| address.to_string())
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.attendees.iter().map(|a| a.address.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.attendees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attendees.is_empty()
    }

    pub fn clear(&mut self) {
        self.attendees.clear();
    }
}
