//! Purchasing domain module (supplier purchases, event-sourced).
//!
//! A purchase records what came in from a supplier and at which prices. Turning
//! its lines into catalog entries and stock receipts is the intake workflow's job.

pub mod purchase;

pub use purchase::{
    Purchase, PurchaseCommand, PurchaseEvent, PurchaseId, PurchaseLine, PurchaseRegistered,
    PurchaseRevised, PurchaseStatus, RegisterPurchase, RevisePurchase,
};
