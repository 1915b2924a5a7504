//! Sales domain module (point-of-sale, event-sourced).
//!
//! - `cart`: the pure shopping-cart value a cashier builds before checkout.
//! - `sale`: the recorded sale aggregate (totals, payment, voiding).
//! - `ticket`: the receipt view of a recorded sale.

pub mod cart;
pub mod sale;
pub mod ticket;

pub use cart::{Cart, CartItem, ProductSnapshot};
pub use sale::{
    PaymentMethod, RecordSale, Sale, SaleCommand, SaleEvent, SaleId, SaleLine, SaleLineInput,
    SaleRecorded, SaleStatus, SaleTotals, SaleVoided, VoidSale, WALK_IN_CLIENT,
};
pub use ticket::{DEFAULT_TICKET_TITLE, TicketData, TicketHeader, TicketItem};
