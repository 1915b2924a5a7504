//! 80 mm receipt printed after checkout.

use genpdf::elements::{Break, Paragraph, StyledElement, TableLayout};
use genpdf::style::Style;
use genpdf::{Alignment, Document, Element, Margins, SimplePageDecorator};

use arkpos_core::Money;
use arkpos_sales::TicketData;

use crate::{FontSource, ReportError, format};

const TICKET_WIDTH_MM: f64 = 80.0;
const MM_PER_POINT: f64 = 25.4 / 72.0;

/// Page height: 300 pt plus 20 pt per item, in millimetres.
pub fn ticket_height_mm(items: usize) -> f64 {
    (300.0 + 20.0 * items as f64) * MM_PER_POINT
}

fn p(text: impl Into<String>, style: Style) -> StyledElement<Paragraph> {
    Paragraph::new(text.into()).styled(style)
}

fn p_aligned(text: impl Into<String>, style: Style, align: Alignment) -> StyledElement<Paragraph> {
    Paragraph::new(text.into()).aligned(align).styled(style)
}

fn amount_row(table: &mut TableLayout, label: &str, amount: Money, style: Style) -> Result<(), ReportError> {
    table
        .row()
        .element(p(label, style))
        .element(p_aligned(format::money(amount), style, Alignment::Right))
        .push()?;
    Ok(())
}

pub fn render_ticket(ticket: &TicketData, fonts: &FontSource) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::new(fonts.load()?);
    doc.set_title(format!("Ticket {}", ticket.sale_id));
    doc.set_paper_size(genpdf::Size::new(TICKET_WIDTH_MM, ticket_height_mm(ticket.items.len())));

    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(Margins::trbl(3, 3, 3, 3));
    doc.set_page_decorator(decorator);

    let s_title = Style::new().with_font_size(10).bold();
    let s_normal = Style::new().with_font_size(8);
    let s_bold = Style::new().with_font_size(8).bold();
    let s_total = Style::new().with_font_size(9).bold();

    let header = &ticket.header;
    doc.push(p_aligned(header.company_name.as_str(), s_title, Alignment::Center));
    if let Some(address) = header.address.as_deref() {
        doc.push(p_aligned(address, s_normal, Alignment::Center));
    }
    if let Some(phone) = header.phone.as_deref() {
        doc.push(p_aligned(format!("Tel: {phone}"), s_normal, Alignment::Center));
    }

    doc.push(Break::new(0.5));
    doc.push(p_aligned(format!("Venta #{}", ticket.sale_id), s_bold, Alignment::Center));
    doc.push(p_aligned(format::datetime(ticket.date), s_normal, Alignment::Center));
    doc.push(Break::new(0.5));

    doc.push(p(format!("Cliente: {}", ticket.client_name), s_normal));
    doc.push(p(format!("Atendido por: {}", ticket.cashier_name), s_normal));
    doc.push(Break::new(0.5));

    let mut items = TableLayout::new(vec![2, 1, 1]);
    items
        .row()
        .element(p("PROD", s_bold))
        .element(p("CANT x P", s_bold))
        .element(p_aligned("TOTAL", s_bold, Alignment::Right))
        .push()?;
    for item in &ticket.items {
        items
            .row()
            .element(p(item.name.as_str(), s_normal))
            .element(p(format!("{} x {}", item.quantity, format::amount_only(item.unit_price)), s_normal))
            .element(p_aligned(format::amount_only(item.subtotal), s_normal, Alignment::Right))
            .push()?;
    }
    doc.push(items);
    doc.push(Break::new(0.5));

    let mut totals = TableLayout::new(vec![3, 2]);
    amount_row(&mut totals, "Subtotal:", ticket.subtotal, s_normal)?;
    if ticket.discount.is_positive() {
        amount_row(&mut totals, "Descuento:", ticket.discount, s_normal)?;
    }
    amount_row(&mut totals, "TOTAL:", ticket.total, s_total)?;
    doc.push(totals);

    doc.push(Break::new(0.3));
    doc.push(p(format!("Pago: {}", ticket.payment_method.label()), s_normal));
    doc.push(p(format!("Recibido: {}", format::money(ticket.cash_received)), s_normal));
    doc.push(p(format!("Cambio: {}", format::money(ticket.change)), s_normal));

    doc.push(Break::new(1));
    doc.push(p_aligned("¡Gracias por su compra!", s_bold, Alignment::Center));

    let mut buffer = Vec::new();
    doc.render(&mut buffer)?;
    tracing::debug!(sale_id = %ticket.sale_id, bytes = buffer.len(), "ticket rendered");
    Ok(buffer)
}
