//! `arkpos-reporting`: figures and printable documents derived from sales data.
//!
//! Pure computations (dashboard series, cash cut) take plain rows so they can be fed
//! from any read model; PDF rendering uses `genpdf` with fonts loaded from disk.

pub mod cash_cut;
pub mod dashboard;
pub mod error;
pub mod fonts;
pub mod format;
pub mod report_pdf;
pub mod ticket_pdf;

pub use cash_cut::{CashCut, MethodTotal};
pub use dashboard::{
    BAR_MAX_HEIGHT, ChartBar, DailyFigure, Dashboard, DashboardInput, LowStockRow, RecentSaleRow,
    SaleFigure, chart_bars, daily_series,
};
pub use error::ReportError;
pub use fonts::FontSource;
pub use report_pdf::{GeneralReport, render_general_report};
pub use ticket_pdf::{render_ticket, ticket_height_mm};
