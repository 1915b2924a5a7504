//! Client and supplier directory, plus the company profile.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use arkpos_events::{EventEnvelope, Projection, ProjectionError, StreamCursors};
use arkpos_parties::{CompanyEvent, CompanyProfile, PartyDetails, PartyEvent, PartyId, PartyKind};

use super::{decode, in_order};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRow {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    /// CI for clients, RUC for suppliers.
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    pub notes: Option<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(skip)]
    removed: bool,
}

impl PartyRow {
    fn set_details(&mut self, details: PartyDetails) {
        self.name = details.name;
        self.tax_id = details.tax_id;
        self.email = details.contact.email;
        self.phone = details.contact.phone;
        self.address = details.contact.address;
        self.contact_person = details.contact_person;
        self.notes = details.notes;
    }

    /// Clients match on name or CI; suppliers also on their contact person.
    fn matches(&self, needle: &str) -> bool {
        let hit = |field: &Option<String>| field.as_deref().is_some_and(|v| v.to_lowercase().contains(needle));
        self.name.to_lowercase().contains(needle)
            || hit(&self.tax_id)
            || (self.kind == PartyKind::Supplier && hit(&self.contact_person))
    }
}

#[derive(Debug, Default)]
pub struct PartyDirectoryProjection {
    parties: InMemoryReadStore<PartyId, PartyRow>,
    company: RwLock<Option<CompanyProfile>>,
    cursors: StreamCursors,
}

impl PartyDirectoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_party(&self, event: PartyEvent) {
        match event {
            PartyEvent::Registered(e) => {
                let mut row = PartyRow {
                    party_id: e.party_id,
                    kind: e.kind,
                    name: String::new(),
                    tax_id: None,
                    email: None,
                    phone: None,
                    address: None,
                    contact_person: None,
                    notes: None,
                    registered_at: e.occurred_at,
                    removed: false,
                };
                row.set_details(e.details);
                self.parties.upsert(e.party_id, row);
            }
            PartyEvent::Updated(e) => {
                self.parties.update(&e.party_id, |row| row.set_details(e.details));
            }
            PartyEvent::Removed(e) => {
                self.parties.update(&e.party_id, |row| row.removed = true);
            }
        }
    }

    /// A live party of any kind. Removed parties are hidden.
    pub fn get(&self, party_id: PartyId) -> Option<PartyRow> {
        self.parties.get(&party_id).filter(|row| !row.removed)
    }

    /// Name of a party even after removal; purchase and sale history still shows it.
    pub fn name_of(&self, party_id: PartyId) -> Option<String> {
        self.parties.get(&party_id).map(|row| row.name)
    }

    fn listing(&self, kind: PartyKind, query: Option<&str>) -> Vec<PartyRow> {
        let needle = query.map(str::trim).filter(|q| !q.is_empty()).map(str::to_lowercase);
        let mut rows: Vec<PartyRow> = self
            .parties
            .list()
            .into_iter()
            .filter(|row| row.kind == kind && !row.removed)
            .filter(|row| needle.as_deref().is_none_or(|n| row.matches(n)))
            .collect();
        rows.sort_by_key(|row| row.name.to_lowercase());
        rows
    }

    pub fn clients(&self, query: Option<&str>) -> Vec<PartyRow> {
        self.listing(PartyKind::Client, query)
    }

    pub fn suppliers(&self, query: Option<&str>) -> Vec<PartyRow> {
        self.listing(PartyKind::Supplier, query)
    }

    pub fn client_count(&self) -> usize {
        self.listing(PartyKind::Client, None).len()
    }

    pub fn company(&self) -> Option<CompanyProfile> {
        self.company.read().ok().and_then(|c| c.clone())
    }
}

impl Projection for PartyDirectoryProjection {
    fn name(&self) -> &'static str {
        "parties.directory"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        matches!(aggregate_type, "parties.party" | "parties.company")
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        in_order(&self.cursors, envelope, || {
            match envelope.aggregate_type() {
                "parties.party" => self.apply_party(decode(envelope)?),
                "parties.company" => {
                    let CompanyEvent::ProfileSaved(e) = decode::<CompanyEvent>(envelope)?;
                    if let Ok(mut company) = self.company.write() {
                        *company = Some(e.profile);
                    }
                }
                _ => {}
            }
            Ok(())
        })
    }

    fn reset(&self) {
        self.parties.clear();
        if let Ok(mut company) = self.company.write() {
            *company = None;
        }
        self.cursors.clear();
    }
}
