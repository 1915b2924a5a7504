//! Cash cut (arqueo): one cashier's takings for one day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use arkpos_auth::UserId;
use arkpos_core::Money;
use arkpos_sales::PaymentMethod;

use crate::SaleFigure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub label: String,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashCut {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub sale_count: usize,
    pub total: Money,
    /// Always one entry per payment method, in a fixed order.
    pub by_method: Vec<MethodTotal>,
}

impl CashCut {
    /// Completed sales by `user_id` on `date` (UTC calendar day).
    pub fn compute(user_id: UserId, date: NaiveDate, sales: &[SaleFigure]) -> Self {
        let mine: Vec<&SaleFigure> = sales
            .iter()
            .filter(|s| !s.voided && s.user_id == user_id && s.sold_at.date_naive() == date)
            .collect();

        let by_method = PaymentMethod::ALL
            .iter()
            .map(|method| MethodTotal {
                method: *method,
                label: method.label().to_string(),
                total: mine
                    .iter()
                    .filter(|s| s.payment_method == *method)
                    .map(|s| s.total)
                    .sum(),
            })
            .collect();

        Self {
            user_id,
            date,
            sale_count: mine.len(),
            total: mine.iter().map(|s| s.total).sum(),
            by_method,
        }
    }

    pub fn total_for(&self, method: PaymentMethod) -> Money {
        self.by_method
            .iter()
            .find(|m| m.method == method)
            .map(|m| m.total)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkpos_sales::SaleId;
    use chrono::{TimeZone, Utc};

    fn sale(user_id: UserId, day: u32, total: i64, method: PaymentMethod, voided: bool) -> SaleFigure {
        SaleFigure {
            sale_id: SaleId::generate(),
            user_id,
            sold_at: Utc.with_ymd_and_hms(2024, 6, day, 11, 30, 0).unwrap(),
            total: Money::from_cents(total),
            cost: Money::zero(),
            payment_method: method,
            voided,
        }
    }

    #[test]
    fn totals_split_by_method() {
        let ana = UserId::generate();
        let luis = UserId::generate();
        let sales = vec![
            sale(ana, 3, 10_000, PaymentMethod::Cash, false),
            sale(ana, 3, 4_500, PaymentMethod::Qr, false),
            sale(ana, 3, 2_000, PaymentMethod::Cash, true),
            sale(ana, 4, 9_000, PaymentMethod::Card, false),
            sale(luis, 3, 7_000, PaymentMethod::Cash, false),
        ];

        let cut = CashCut::compute(ana, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(), &sales);
        assert_eq!(cut.sale_count, 2);
        assert_eq!(cut.total, Money::from_cents(14_500));
        assert_eq!(cut.total_for(PaymentMethod::Cash), Money::from_cents(10_000));
        assert_eq!(cut.total_for(PaymentMethod::Qr), Money::from_cents(4_500));
        assert_eq!(cut.total_for(PaymentMethod::Card), Money::zero());
        assert_eq!(cut.by_method.len(), 4);
    }

    #[test]
    fn empty_day_is_all_zero() {
        let cut = CashCut::compute(UserId::generate(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), &[]);
        assert_eq!(cut.sale_count, 0);
        assert_eq!(cut.total, Money::zero());
        assert_eq!(cut.by_method[0].label, "Efectivo");
    }
}
