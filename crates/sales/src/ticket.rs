//! Receipt view of a recorded sale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arkpos_core::{DomainError, Money};
use arkpos_parties::CompanyProfile;

use crate::{PaymentMethod, Sale, SaleId};

/// Header used when the company profile has not been filled in.
pub const DEFAULT_TICKET_TITLE: &str = "Ticket Venta";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketHeader {
    pub company_name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl TicketHeader {
    pub fn from_profile(profile: Option<&CompanyProfile>) -> Self {
        match profile {
            Some(p) => Self {
                company_name: p.name.clone(),
                address: p.address.clone(),
                phone: p.phones.clone(),
            },
            None => Self {
                company_name: DEFAULT_TICKET_TITLE.to_string(),
                address: None,
                phone: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketItem {
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketData {
    pub header: TicketHeader,
    pub sale_id: SaleId,
    pub date: DateTime<Utc>,
    pub client_name: String,
    pub cashier_name: String,
    pub items: Vec<TicketItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub cash_received: Money,
    pub change: Money,
}

impl TicketData {
    pub fn from_sale(sale: &Sale, company: Option<&CompanyProfile>) -> Result<Self, DomainError> {
        let (Some(totals), Some(date)) = (sale.totals(), sale.sold_at()) else {
            return Err(DomainError::not_found());
        };

        Ok(Self {
            header: TicketHeader::from_profile(company),
            sale_id: sale.id_typed(),
            date,
            client_name: sale.client_name().to_string(),
            cashier_name: sale.cashier_name().to_string(),
            items: sale
                .lines()
                .iter()
                .map(|l| TicketItem {
                    name: l.name.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    subtotal: l.subtotal,
                })
                .collect(),
            subtotal: totals.subtotal,
            discount: totals.discount,
            total: totals.total,
            payment_method: sale.payment_method(),
            cash_received: totals.amount_received,
            change: totals.change,
        })
    }
}
