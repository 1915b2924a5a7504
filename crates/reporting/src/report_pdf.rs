//! A4 landscape general report: low stock and recent sales.

use chrono::{DateTime, Utc};
use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout};
use genpdf::style::Style;
use genpdf::{Alignment, Document, Element, Margins, SimplePageDecorator};

use crate::{FontSource, LowStockRow, RecentSaleRow, ReportError, format};

#[derive(Debug, Clone)]
pub struct GeneralReport {
    pub company_name: String,
    pub generated_at: DateTime<Utc>,
    pub low_stock: Vec<LowStockRow>,
    pub recent_sales: Vec<RecentSaleRow>,
}

fn cell_padding() -> Margins {
    Margins::trbl(1, 1, 1, 2)
}

fn header_row(table: &mut TableLayout, titles: &[&str], style: Style) -> Result<(), ReportError> {
    let mut row = table.row();
    for title in titles {
        row.push_element(Paragraph::new(*title).styled(style).padded(cell_padding()));
    }
    row.push()?;
    Ok(())
}

pub fn render_general_report(report: &GeneralReport, fonts: &FontSource) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::new(fonts.load()?);
    doc.set_title("Reporte General");
    doc.set_paper_size(genpdf::Size::new(297, 210));

    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(Margins::trbl(15, 15, 15, 15));
    decorator.set_header(|page| {
        Paragraph::new(format!("Página {page}"))
            .aligned(Alignment::Right)
            .styled(Style::new().with_font_size(8))
    });
    doc.set_page_decorator(decorator);

    let s_title = Style::new().with_font_size(16).bold();
    let s_subtitle = Style::new().with_font_size(12).bold();
    let s_normal = Style::new().with_font_size(9);
    let s_bold = Style::new().with_font_size(9).bold();

    doc.push(
        Paragraph::new(report.company_name.as_str())
            .aligned(Alignment::Center)
            .styled(s_title),
    );
    doc.push(
        Paragraph::new(format!("Reporte General - {}", format::datetime(report.generated_at)))
            .aligned(Alignment::Center)
            .styled(s_normal),
    );
    doc.push(Break::new(1));

    doc.push(Paragraph::new("Productos con stock bajo").styled(s_subtitle));
    doc.push(Break::new(0.3));
    if report.low_stock.is_empty() {
        doc.push(Paragraph::new("Sin productos con stock bajo.").styled(s_normal));
    } else {
        let mut table = TableLayout::new(vec![1, 3, 1, 1]);
        table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
        header_row(&mut table, &["Código", "Producto", "Stock", "Mínimo"], s_bold)?;
        for row in &report.low_stock {
            table
                .row()
                .element(Paragraph::new(row.code.as_str()).styled(s_normal).padded(cell_padding()))
                .element(Paragraph::new(row.name.as_str()).styled(s_normal).padded(cell_padding()))
                .element(Paragraph::new(row.stock.to_string()).aligned(Alignment::Right).styled(s_normal).padded(cell_padding()))
                .element(Paragraph::new(row.min_stock.to_string()).aligned(Alignment::Right).styled(s_normal).padded(cell_padding()))
                .push()?;
        }
        doc.push(table);
    }

    doc.push(Break::new(1));
    doc.push(Paragraph::new("Ventas recientes").styled(s_subtitle));
    doc.push(Break::new(0.3));
    if report.recent_sales.is_empty() {
        doc.push(Paragraph::new("Sin ventas registradas.").styled(s_normal));
    } else {
        let mut table = TableLayout::new(vec![2, 2, 3, 2, 2]);
        table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
        header_row(&mut table, &["Venta", "Fecha", "Cliente", "Cajero", "Total"], s_bold)?;
        for sale in &report.recent_sales {
            let short_id: String = sale.sale_id.to_string().chars().take(8).collect();
            table
                .row()
                .element(Paragraph::new(short_id).styled(s_normal).padded(cell_padding()))
                .element(Paragraph::new(format::datetime(sale.sold_at)).styled(s_normal).padded(cell_padding()))
                .element(Paragraph::new(sale.client_name.as_str()).styled(s_normal).padded(cell_padding()))
                .element(Paragraph::new(sale.cashier_name.as_str()).styled(s_normal).padded(cell_padding()))
                .element(
                    Paragraph::new(format::money(sale.total))
                        .aligned(Alignment::Right)
                        .styled(s_normal)
                        .padded(cell_padding()),
                )
                .push()?;
        }
        doc.push(table);
    }

    let mut buffer = Vec::new();
    doc.render(&mut buffer)?;
    tracing::debug!(bytes = buffer.len(), "general report rendered");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering_without_fonts_fails_cleanly() {
        let report = GeneralReport {
            company_name: "Moda Andina".to_string(),
            generated_at: Utc::now(),
            low_stock: vec![],
            recent_sales: vec![],
        };
        let err = render_general_report(&report, &FontSource::new("/no/fonts/here")).unwrap_err();
        assert!(matches!(err, ReportError::Fonts(_)));
    }

    #[test]
    fn renders_low_stock_and_recent_sales_tables() {
        let report = GeneralReport {
            company_name: "Moda Andina".to_string(),
            generated_at: Utc::now(),
            low_stock: vec![LowStockRow {
                code: "BUF-1".to_string(),
                name: "Bufanda".to_string(),
                stock: 2,
                min_stock: 5,
            }],
            recent_sales: vec![RecentSaleRow {
                sale_id: arkpos_sales::SaleId::generate(),
                sold_at: Utc::now(),
                client_name: "Ana Quispe".to_string(),
                cashier_name: "Luis Mamani".to_string(),
                total: arkpos_core::Money::from_cents(14_000),
            }],
        };
        let bytes = render_general_report(&report, &crate::fonts::fixture()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_sections_still_render() {
        let report = GeneralReport {
            company_name: "Moda Andina".to_string(),
            generated_at: Utc::now(),
            low_stock: vec![],
            recent_sales: vec![],
        };
        let bytes = render_general_report(&report, &crate::fonts::fixture()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
