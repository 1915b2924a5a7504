use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arkpos_core::{Aggregate, AggregateRoot, DomainError, rules};
use arkpos_events::Event;

arkpos_core::typed_id!(PartyId);

/// Party kind: client or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Client,
    Supplier,
}

impl PartyKind {
    /// Label used in messages ("client not found").
    pub fn as_str(self) -> &'static str {
        match self {
            PartyKind::Client => "client",
            PartyKind::Supplier => "supplier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    #[default]
    Active,
    /// Soft-deleted: hidden from listings.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Everything a client or supplier record carries.
///
/// `tax_id` is the CI for clients and the RUC for suppliers. `contact_person` only
/// applies to suppliers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDetails {
    pub name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PartyDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tax_id: None,
            contact: ContactInfo::default(),
            contact_person: None,
            notes: None,
        }
    }

    fn normalized(&self, kind: PartyKind) -> Result<PartyDetails, DomainError> {
        let name = rules::required("name", &self.name)?;
        let email = match kind {
            PartyKind::Supplier => rules::optional_email("email", self.contact.email.as_deref())?,
            PartyKind::Client => None,
        };
        let contact_person = match kind {
            PartyKind::Supplier => rules::optional(self.contact_person.as_deref()),
            PartyKind::Client => None,
        };

        Ok(PartyDetails {
            name,
            tax_id: rules::optional(self.tax_id.as_deref()),
            contact: ContactInfo {
                email,
                phone: rules::optional_phone("phone", self.contact.phone.as_deref())?,
                address: rules::optional(self.contact.address.as_deref()),
            },
            contact_person,
            notes: rules::optional(self.notes.as_deref()),
        })
    }
}

/// Aggregate root: Party (client or supplier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    kind: PartyKind,
    details: PartyDetails,
    status: PartyStatus,
    version: u64,
    created: bool,
}

impl Party {
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            kind: PartyKind::Client,
            details: PartyDetails::named(""),
            status: PartyStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn details(&self) -> &PartyDetails {
        &self.details
    }

    pub fn status(&self) -> PartyStatus {
        self.status
    }

    /// Removed parties cannot buy or supply.
    pub fn can_transact(&self) -> bool {
        self.created && self.status == PartyStatus::Active
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub details: PartyDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Replaces every descriptive field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub party_id: PartyId,
    pub details: PartyDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveParty {
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    Register(RegisterParty),
    UpdateDetails(UpdateDetails),
    Remove(RemoveParty),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRegistered {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub details: PartyDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyUpdated {
    pub party_id: PartyId,
    pub details: PartyDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRemoved {
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    Registered(PartyRegistered),
    Updated(PartyUpdated),
    Removed(PartyRemoved),
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::Registered(_) => "parties.party.registered",
            PartyEvent::Updated(_) => "parties.party.updated",
            PartyEvent::Removed(_) => "parties.party.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::Registered(e) => e.occurred_at,
            PartyEvent::Updated(e) => e.occurred_at,
            PartyEvent::Removed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::Registered(e) => {
                self.id = e.party_id;
                self.kind = e.kind;
                self.details = e.details.clone();
                self.status = PartyStatus::Active;
                self.created = true;
            }
            PartyEvent::Updated(e) => {
                self.details = e.details.clone();
            }
            PartyEvent::Removed(_) => {
                self.status = PartyStatus::Removed;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartyCommand::Register(cmd) => self.handle_register(cmd),
            PartyCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            PartyCommand::Remove(cmd) => self.handle_remove(cmd),
        }
    }
}

impl Party {
    fn ensure_active(&self, party_id: PartyId) -> Result<(), DomainError> {
        if !self.created || self.status == PartyStatus::Removed {
            return Err(DomainError::not_found());
        }
        if self.id != party_id {
            return Err(DomainError::invariant("party_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterParty) -> Result<Vec<PartyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("party already exists"));
        }

        Ok(vec![PartyEvent::Registered(PartyRegistered {
            party_id: cmd.party_id,
            kind: cmd.kind,
            details: cmd.details.normalized(cmd.kind)?,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_active(cmd.party_id)?;

        let details = cmd.details.normalized(self.kind)?;
        if details == self.details {
            return Ok(vec![]);
        }

        Ok(vec![PartyEvent::Updated(PartyUpdated {
            party_id: cmd.party_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveParty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_active(cmd.party_id)?;

        Ok(vec![PartyEvent::Removed(PartyRemoved {
            party_id: cmd.party_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
