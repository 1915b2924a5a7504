//! Display formatting for money and dates.

use chrono::{DateTime, NaiveDate, Utc};

use arkpos_core::Money;

/// "Bs. 1,234.56"
pub fn money(amount: Money) -> String {
    format!("Bs. {}", amount_only(amount))
}

/// "1,234.56", without the currency prefix.
pub fn amount_only(amount: Money) -> String {
    let (units, cents) = amount.split();
    let sign = if amount.is_negative() { "-" } else { "" };
    let digits = units.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}{grouped}.{cents:02}")
}

/// dd/MM/yyyy HH:mm:ss
pub fn datetime(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M:%S").to_string()
}

/// dd/MM, used for chart labels.
pub fn day_label(day: NaiveDate) -> String {
    day.format("%d/%m").to_string()
}
