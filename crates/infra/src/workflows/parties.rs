use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use arkpos_core::DomainError;
use arkpos_events::{EventBus, EventEnvelope};
use arkpos_parties::{
    COMPANY_ID, Company, CompanyCommand, CompanyProfile, Party, PartyCommand, PartyDetails, PartyId, PartyKind,
    RegisterParty, RemoveParty, SaveCompanyProfile, UpdateDetails,
};

use super::{WorkflowResult, Workflows};
use crate::event_store::EventStore;
use crate::streams;

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    #[instrument(skip(self, details), fields(kind = kind.as_str()))]
    pub fn register_party(&self, kind: PartyKind, details: PartyDetails) -> WorkflowResult<PartyId> {
        let party_id = PartyId::generate();
        self.dispatcher.dispatch(
            party_id.aggregate_id(),
            streams::PARTY,
            PartyCommand::Register(RegisterParty {
                party_id,
                kind,
                details,
                occurred_at: Utc::now(),
            }),
            |id| Party::empty(PartyId::new(id)),
        )?;
        info!(%party_id, "party registered");
        Ok(party_id)
    }

    #[instrument(skip(self, details), fields(kind = kind.as_str()))]
    pub fn update_party(&self, kind: PartyKind, party_id: PartyId, details: PartyDetails) -> WorkflowResult<Party> {
        self.party(kind, party_id)?;
        self.dispatcher.dispatch(
            party_id.aggregate_id(),
            streams::PARTY,
            PartyCommand::UpdateDetails(UpdateDetails {
                party_id,
                details,
                occurred_at: Utc::now(),
            }),
            |id| Party::empty(PartyId::new(id)),
        )?;
        info!(%party_id, "party updated");
        self.party(kind, party_id)
    }

    #[instrument(skip(self))]
    pub fn remove_client(&self, party_id: PartyId) -> WorkflowResult<()> {
        self.remove_party(PartyKind::Client, party_id)
    }

    /// Suppliers that appear on any purchase stay; history must keep resolving them.
    ///
    /// The check reads the purchases projection, so a purchase committed a moment
    /// earlier may not be visible yet.
    #[instrument(skip(self))]
    pub fn remove_supplier(&self, party_id: PartyId) -> WorkflowResult<()> {
        if self.projections.purchases.has_purchases_from(party_id) {
            return Err(DomainError::conflict("supplier has registered purchases and cannot be removed").into());
        }
        self.remove_party(PartyKind::Supplier, party_id)
    }

    fn remove_party(&self, kind: PartyKind, party_id: PartyId) -> WorkflowResult<()> {
        self.party(kind, party_id)?;
        self.dispatcher.dispatch(
            party_id.aggregate_id(),
            streams::PARTY,
            PartyCommand::Remove(RemoveParty {
                party_id,
                occurred_at: Utc::now(),
            }),
            |id| Party::empty(PartyId::new(id)),
        )?;
        info!(%party_id, kind = kind.as_str(), "party removed");
        Ok(())
    }

    #[instrument(skip(self, profile), fields(name = %profile.name))]
    pub fn save_company(&self, profile: CompanyProfile) -> WorkflowResult<CompanyProfile> {
        self.dispatcher.dispatch(
            COMPANY_ID,
            streams::COMPANY,
            CompanyCommand::Save(SaveCompanyProfile {
                profile,
                occurred_at: Utc::now(),
            }),
            Company::empty,
        )?;
        info!("company profile saved");
        self.company()?
            .profile()
            .cloned()
            .ok_or_else(|| DomainError::not_found().into())
    }
}
