//! Home dashboard: daily sales and profit bars plus headline counters.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use arkpos_auth::UserId;
use arkpos_core::Money;
use arkpos_sales::{PaymentMethod, SaleId};

use crate::format;

/// Height of the tallest bar.
pub const BAR_MAX_HEIGHT: f64 = 150.0;

/// Minimal view of a recorded sale used by dashboard and cash-cut figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFigure {
    pub sale_id: SaleId,
    pub user_id: UserId,
    pub sold_at: DateTime<Utc>,
    pub total: Money,
    pub cost: Money,
    pub payment_method: PaymentMethod,
    pub voided: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyFigure {
    pub day: NaiveDate,
    pub sales: Money,
    pub profit: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub label: String,
    pub value: Money,
    pub height: f64,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockRow {
    pub code: String,
    pub name: String,
    pub stock: i64,
    pub min_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSaleRow {
    pub sale_id: SaleId,
    pub sold_at: DateTime<Utc>,
    pub client_name: String,
    pub cashier_name: String,
    pub total: Money,
}

/// Totals per day over the `days` days ending at `today`, oldest first.
///
/// Days without sales are present with zero figures. Voided sales are ignored.
pub fn daily_series(sales: &[SaleFigure], today: NaiveDate, days: u32) -> Vec<DailyFigure> {
    let days = days.max(1);
    let first = today - Duration::days(i64::from(days) - 1);

    let mut by_day: BTreeMap<NaiveDate, (Money, Money)> = (0..days)
        .map(|offset| (first + Duration::days(i64::from(offset)), (Money::zero(), Money::zero())))
        .collect();

    for sale in sales.iter().filter(|s| !s.voided) {
        if let Some((total, profit)) = by_day.get_mut(&sale.sold_at.date_naive()) {
            *total += sale.total;
            *profit += sale.total - sale.cost;
        }
    }

    by_day
        .into_iter()
        .map(|(day, (sales, profit))| DailyFigure { day, sales, profit })
        .collect()
}

/// Bars scaled so the largest value reaches [`BAR_MAX_HEIGHT`].
///
/// The scale never drops below one unit (100 cents).
pub fn chart_bars(values: &[(NaiveDate, Money)], caption: &str) -> Vec<ChartBar> {
    let max = values
        .iter()
        .map(|(_, v)| v.cents())
        .fold(100, i64::max) as f64;

    values
        .iter()
        .map(|(day, value)| {
            let label = format::day_label(*day);
            ChartBar {
                tooltip: format!("{caption} {label}: {}", format::money(*value)),
                label,
                value: *value,
                height: value.cents() as f64 / max * BAR_MAX_HEIGHT,
            }
        })
        .collect()
}

/// Inputs gathered from read models.
#[derive(Debug, Clone)]
pub struct DashboardInput {
    pub today: NaiveDate,
    pub days: u32,
    pub sales: Vec<SaleFigure>,
    pub low_stock: Vec<LowStockRow>,
    pub recent_sales: Vec<RecentSaleRow>,
    pub product_count: usize,
    pub client_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub series: Vec<DailyFigure>,
    pub sales_bars: Vec<ChartBar>,
    pub profit_bars: Vec<ChartBar>,
    pub low_stock: Vec<LowStockRow>,
    pub recent_sales: Vec<RecentSaleRow>,
    pub product_count: usize,
    pub total_sales: Money,
    pub client_count: usize,
}

impl Dashboard {
    pub const RECENT_SALES: usize = 10;

    pub fn build(input: DashboardInput) -> Self {
        let series = daily_series(&input.sales, input.today, input.days);
        let sales_points: Vec<_> = series.iter().map(|d| (d.day, d.sales)).collect();
        let profit_points: Vec<_> = series.iter().map(|d| (d.day, d.profit)).collect();

        let mut recent_sales = input.recent_sales;
        recent_sales.sort_by(|a, b| b.sold_at.cmp(&a.sold_at));
        recent_sales.truncate(Self::RECENT_SALES);

        let mut low_stock = input.low_stock;
        low_stock.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));

        Self {
            sales_bars: chart_bars(&sales_points, "Ventas"),
            profit_bars: chart_bars(&profit_points, "Ganancia"),
            series,
            low_stock,
            recent_sales,
            product_count: input.product_count,
            total_sales: input.sales.iter().filter(|s| !s.voided).map(|s| s.total).sum(),
            client_count: input.client_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    fn figure(day: u32, total: i64, cost: i64, voided: bool) -> SaleFigure {
        SaleFigure {
            sale_id: SaleId::generate(),
            user_id: UserId::generate(),
            sold_at: Utc.with_ymd_and_hms(2024, 5, day, 15, 0, 0).unwrap(),
            total: Money::from_cents(total),
            cost: Money::from_cents(cost),
            payment_method: PaymentMethod::Cash,
            voided,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn series_covers_every_day_and_skips_voided() {
        let sales = vec![
            figure(10, 10_000, 6_000, false),
            figure(10, 5_000, 1_000, true),
            figure(8, 2_000, 500, false),
            figure(1, 9_999, 0, false),
        ];
        let series = daily_series(&sales, today(), 7);

        assert_eq!(series.len(), 7);
        assert_eq!(series[0].day, NaiveDate::from_ymd_opt(2024, 5, 4).unwrap());
        assert_eq!(series[6].sales, Money::from_cents(10_000));
        assert_eq!(series[6].profit, Money::from_cents(4_000));
        assert_eq!(series[4].sales, Money::from_cents(2_000));
        assert_eq!(series[5].sales, Money::zero());
    }

    #[test]
    fn tallest_bar_is_max_height() {
        let d = today();
        let bars = chart_bars(
            &[(d, Money::from_cents(5_000)), (d, Money::from_cents(10_000))],
            "Ventas",
        );
        assert_eq!(bars[1].height, BAR_MAX_HEIGHT);
        assert_eq!(bars[0].height, BAR_MAX_HEIGHT / 2.0);
        assert_eq!(bars[1].tooltip, "Ventas 10/05: Bs. 100.00");
    }

    #[test]
    fn scale_is_floored_at_one_unit() {
        let bars = chart_bars(&[(today(), Money::from_cents(50)), (today(), Money::zero())], "Ganancia");
        assert_eq!(bars[0].height, BAR_MAX_HEIGHT / 2.0);
        assert_eq!(bars[1].height, 0.0);
    }

    #[test]
    fn build_keeps_latest_ten_sales() {
        let recent: Vec<RecentSaleRow> = (1..=12)
            .map(|day| RecentSaleRow {
                sale_id: SaleId::generate(),
                sold_at: Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap(),
                client_name: "Cliente Ocasional".to_string(),
                cashier_name: "Ana".to_string(),
                total: Money::from_cents(1_000),
            })
            .collect();

        let dashboard = Dashboard::build(DashboardInput {
            today: today(),
            days: 7,
            sales: vec![figure(9, 3_000, 1_000, false), figure(9, 7_000, 0, true)],
            low_stock: vec![],
            recent_sales: recent,
            product_count: 4,
            client_count: 2,
        });

        assert_eq!(dashboard.recent_sales.len(), Dashboard::RECENT_SALES);
        assert_eq!(dashboard.recent_sales[0].sold_at.date_naive().day0(), 11);
        assert_eq!(dashboard.total_sales, Money::from_cents(3_000));
        assert_eq!(dashboard.sales_bars.len(), 7);
    }
}
