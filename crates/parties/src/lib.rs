//! Parties domain module (event-sourced).
//!
//! Clients and suppliers share one aggregate distinguished by `PartyKind`; the shop's
//! own company profile is a singleton stream.

pub mod company;
pub mod party;

pub use company::{COMPANY_ID, CompanyCommand, CompanyEvent, CompanyProfile, CompanyProfileSaved, Company, SaveCompanyProfile};
pub use party::{
    ContactInfo, Party, PartyCommand, PartyDetails, PartyEvent, PartyId, PartyKind,
    PartyRegistered, PartyRemoved, PartyStatus, PartyUpdated, RegisterParty, RemoveParty,
    UpdateDetails,
};
