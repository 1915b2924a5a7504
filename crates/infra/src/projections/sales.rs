//! Sales history, plus the per-sale figures the dashboard and cash cut aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use arkpos_auth::UserId;
use arkpos_core::Money;
use arkpos_events::{EventEnvelope, Projection, ProjectionError, StreamCursors};
use arkpos_parties::PartyId;
use arkpos_reporting::{RecentSaleRow, SaleFigure};
use arkpos_sales::{PaymentMethod, SaleEvent, SaleId, SaleLine, SaleStatus, SaleTotals};

use super::{decode, in_order};
use crate::read_model::{InMemoryReadStore, Page, PageRequest, ReadStore};

/// A recorded sale with its detail lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub sale_id: SaleId,
    pub user_id: UserId,
    pub cashier_name: String,
    pub client_id: Option<PartyId>,
    pub client_name: String,
    pub lines: Vec<SaleLine>,
    pub totals: SaleTotals,
    pub cost: Money,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub sold_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

/// History filter. Dates are inclusive UTC days.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesFilter {
    /// Substring of the client name, cashier name or sale id.
    pub query: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SalesFilter {
    fn accepts(&self, sale: &SaleRecord, needle: Option<&str>) -> bool {
        let day = sale.sold_at.date_naive();
        if self.from.is_some_and(|from| day < from) || self.to.is_some_and(|to| day > to) {
            return false;
        }
        needle.is_none_or(|n| {
            sale.client_name.to_lowercase().contains(n)
                || sale.cashier_name.to_lowercase().contains(n)
                || sale.sale_id.to_string().contains(n)
        })
    }
}

#[derive(Debug, Default)]
pub struct SalesProjection {
    sales: InMemoryReadStore<SaleId, SaleRecord>,
    cursors: StreamCursors,
}

impl SalesProjection {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_event(&self, event: SaleEvent) {
        match event {
            SaleEvent::Recorded(e) => {
                let cost = e.cost();
                self.sales.upsert(
                    e.sale_id,
                    SaleRecord {
                        sale_id: e.sale_id,
                        user_id: e.user_id,
                        cashier_name: e.cashier_name,
                        client_id: e.client_id,
                        client_name: e.client_name,
                        lines: e.lines,
                        totals: e.totals,
                        cost,
                        payment_method: e.payment_method,
                        status: SaleStatus::Completed,
                        sold_at: e.occurred_at,
                        voided_at: None,
                        void_reason: None,
                    },
                );
            }
            SaleEvent::Voided(e) => {
                self.sales.update(&e.sale_id, |sale| {
                    sale.status = SaleStatus::Voided;
                    sale.voided_at = Some(e.occurred_at);
                    sale.void_reason = Some(e.reason);
                });
            }
        }
    }

    fn newest_first(&self) -> Vec<SaleRecord> {
        let mut all = self.sales.list();
        all.sort_by(|a, b| b.sold_at.cmp(&a.sold_at).then(b.sale_id.cmp(&a.sale_id)));
        all
    }

    pub fn get(&self, sale_id: SaleId) -> Option<SaleRecord> {
        self.sales.get(&sale_id)
    }

    /// Filtered history, newest first.
    pub fn history(&self, filter: &SalesFilter, page: PageRequest) -> Page<SaleRecord> {
        let needle = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let matching: Vec<SaleRecord> = self
            .newest_first()
            .into_iter()
            .filter(|sale| filter.accepts(sale, needle.as_deref()))
            .collect();
        Page::from_sorted(matching, page)
    }

    /// Every sale, voided ones flagged, for dashboard and cash-cut math.
    pub fn figures(&self) -> Vec<SaleFigure> {
        self.sales
            .list()
            .into_iter()
            .map(|s| SaleFigure {
                sale_id: s.sale_id,
                user_id: s.user_id,
                sold_at: s.sold_at,
                total: s.totals.total,
                cost: s.cost,
                payment_method: s.payment_method,
                voided: s.status == SaleStatus::Voided,
            })
            .collect()
    }

    /// Latest completed sales.
    pub fn recent(&self, limit: usize) -> Vec<RecentSaleRow> {
        self.newest_first()
            .into_iter()
            .filter(|s| s.status == SaleStatus::Completed)
            .take(limit)
            .map(|s| RecentSaleRow {
                sale_id: s.sale_id,
                sold_at: s.sold_at,
                client_name: s.client_name,
                cashier_name: s.cashier_name,
                total: s.totals.total,
            })
            .collect()
    }
}

impl Projection for SalesProjection {
    fn name(&self) -> &'static str {
        "sales.history"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        aggregate_type == "sales.sale"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        in_order(&self.cursors, envelope, || {
            self.apply_event(decode(envelope)?);
            Ok(())
        })
    }

    fn reset(&self) {
        self.sales.clear();
        self.cursors.clear();
    }
}
