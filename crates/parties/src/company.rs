//! The shop's own company profile (single stream).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arkpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, rules};
use arkpos_events::Event;

/// Fixed stream id of the company profile.
pub const COMPANY_ID: AggregateId = AggregateId::from_uuid(Uuid::from_u128(0x00c0_ffee_0000_7000_8000_0000_0000_0001));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default)]
    pub phones: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl CompanyProfile {
    fn normalized(&self) -> Result<CompanyProfile, DomainError> {
        Ok(CompanyProfile {
            name: rules::required("company name", &self.name)?,
            phones: rules::optional(self.phones.as_deref()),
            address: rules::optional(self.address.as_deref()),
            email: rules::optional_email("email", self.email.as_deref())?,
            website: rules::optional(self.website.as_deref()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    id: AggregateId,
    profile: Option<CompanyProfile>,
    version: u64,
}

impl Company {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            profile: None,
            version: 0,
        }
    }

    pub fn profile(&self) -> Option<&CompanyProfile> {
        self.profile.as_ref()
    }
}

impl AggregateRoot for Company {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveCompanyProfile {
    pub profile: CompanyProfile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanyCommand {
    Save(SaveCompanyProfile),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfileSaved {
    pub profile: CompanyProfile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanyEvent {
    ProfileSaved(CompanyProfileSaved),
}

impl Event for CompanyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CompanyEvent::ProfileSaved(_) => "parties.company.profile_saved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CompanyEvent::ProfileSaved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Company {
    type Command = CompanyCommand;
    type Event = CompanyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CompanyEvent::ProfileSaved(e) => self.profile = Some(e.profile.clone()),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CompanyCommand::Save(cmd) => {
                let profile = cmd.profile.normalized()?;
                if self.profile.as_ref() == Some(&profile) {
                    return Ok(vec![]);
                }
                Ok(vec![CompanyEvent::ProfileSaved(CompanyProfileSaved {
                    profile,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> CompanyProfile {
        CompanyProfile {
            name: name.to_string(),
            phones: Some("4-4256789 / 70711223".to_string()),
            address: Some("Calle Jordán 245, Cochabamba".to_string()),
            email: Some(" Info@Moda.bo".to_string()),
            website: Some(" ".to_string()),
        }
    }

    #[test]
    fn save_normalizes_profile() {
        let mut company = Company::empty(COMPANY_ID);
        let events = company
            .handle(&CompanyCommand::Save(SaveCompanyProfile {
                profile: profile("Moda Andina"),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        company.apply(&events[0]);

        let saved = company.profile().unwrap();
        assert_eq!(saved.email.as_deref(), Some("info@moda.bo"));
        assert_eq!(saved.website, None);
        assert_eq!(company.version(), 1);
    }

    #[test]
    fn save_requires_name() {
        let err = Company::empty(COMPANY_ID)
            .handle(&CompanyCommand::Save(SaveCompanyProfile {
                profile: profile(""),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn saving_identical_profile_is_a_noop() {
        let mut company = Company::empty(COMPANY_ID);
        let cmd = CompanyCommand::Save(SaveCompanyProfile {
            profile: profile("Moda Andina"),
            occurred_at: Utc::now(),
        });
        let events = company.handle(&cmd).unwrap();
        company.apply(&events[0]);
        assert!(company.handle(&cmd).unwrap().is_empty());
    }
}
