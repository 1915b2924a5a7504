use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use arkpos_auth::{Role, User, UserId, UserStatus};
use arkpos_catalog::{CategoryId, ProductDetails, ProductId};
use arkpos_core::{Discount, Money};
use arkpos_infra::read_model::PageRequest;
use arkpos_infra::workflows::{CheckoutLine, NewUser, PurchaseLineInput};
use arkpos_parties::{CompanyProfile, ContactInfo, PartyDetails, PartyId};
use arkpos_sales::PaymentMethod;

/// Page size used when a listing does not ask for one.
const LIST_PAGE_SIZE: u32 = 20;

// -------------------------
// Session and users
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "CI is required"))]
    pub ci: String,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[validate(length(min = 6, message = "password must have at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub confirm_password: String,
}

impl From<RegisterRequest> for NewUser {
    fn from(body: RegisterRequest) -> Self {
        NewUser {
            full_name: body.full_name,
            ci: body.ci,
            email: body.email,
            phone: body.phone,
            password: body.password,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email or CI.
    #[validate(length(min = 1, message = "email or CI is required"))]
    pub identifier: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "full name is required"))]
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 6, message = "password must have at least 6 characters"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuspendRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub user_id: UserId,
    pub full_name: String,
    pub ci: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id_typed(),
            full_name: user.full_name().to_string(),
            ci: user.ci().to_string(),
            email: user.email().to_string(),
            phone: user.phone().map(str::to_string),
            role: user.role().clone(),
            status: user.status(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

// -------------------------
// Catalog
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub purchase_price: Money,
    pub sale_price: Money,
    #[validate(range(min = 0, message = "minimum stock cannot be negative"))]
    #[serde(default)]
    pub min_stock: Option<i64>,
    /// Only read on creation.
    #[validate(range(min = 1, message = "opening stock must be at least 1"))]
    #[serde(default)]
    pub opening_stock: Option<i64>,
}

impl ProductRequest {
    pub fn details(&self) -> ProductDetails {
        ProductDetails {
            code: self.code.clone(),
            name: self.name.clone(),
            category_id: self.category_id,
            size: self.size.clone(),
            color: self.color.clone(),
            unit: self.unit.clone(),
            purchase_price: self.purchase_price,
            sale_price: self.sale_price,
            min_stock: self.min_stock.unwrap_or(arkpos_catalog::DEFAULT_MIN_STOCK),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
    /// Products only: also list deactivated ones.
    #[serde(default)]
    pub include_inactive: bool,
}

impl SearchQuery {
    pub fn term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

// -------------------------
// Parties
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct PartyRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    /// CI for clients, RUC for suppliers.
    #[serde(default)]
    pub tax_id: Option<String>,
    #[validate(email(message = "invalid email"))]
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<PartyRequest> for PartyDetails {
    fn from(body: PartyRequest) -> Self {
        PartyDetails {
            name: body.name,
            tax_id: body.tax_id,
            contact: ContactInfo {
                email: body.email.filter(|e| !e.trim().is_empty()),
                phone: body.phone,
                address: body.address,
            },
            contact_person: body.contact_person,
            notes: body.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompanyRequest {
    #[validate(length(min = 1, message = "company name is required"))]
    pub name: String,
    #[serde(default)]
    pub phones: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[validate(email(message = "invalid email"))]
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl From<CompanyRequest> for CompanyProfile {
    fn from(body: CompanyRequest) -> Self {
        CompanyProfile {
            name: body.name,
            phones: body.phones,
            address: body.address,
            email: body.email.filter(|e| !e.trim().is_empty()),
            website: body.website,
        }
    }
}

// -------------------------
// Purchases
// -------------------------

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct PurchaseLineRequest {
    /// Absent for products the catalog does not know yet.
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[validate(range(min = 0, message = "minimum stock cannot be negative"))]
    #[serde(default)]
    pub min_stock: Option<i64>,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i64,
    pub purchase_price: Money,
    pub sale_price: Money,
}

impl From<PurchaseLineRequest> for PurchaseLineInput {
    fn from(line: PurchaseLineRequest) -> Self {
        PurchaseLineInput {
            product_id: line.product_id,
            code: line.code,
            name: line.name,
            category_id: line.category_id,
            size: line.size,
            color: line.color,
            unit: line.unit,
            min_stock: line.min_stock,
            quantity: line.quantity,
            purchase_price: line.purchase_price,
            sale_price: line.sale_price,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PurchaseRequest {
    pub supplier_id: PartyId,
    #[validate(length(min = 1, message = "a purchase needs at least one line"), nested)]
    pub lines: Vec<PurchaseLineRequest>,
}

impl PurchaseRequest {
    pub fn into_lines(self) -> Vec<PurchaseLineInput> {
        self.lines.into_iter().map(Into::into).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::from_query(self.page, self.page_size, LIST_PAGE_SIZE)
    }
}

// -------------------------
// Sales
// -------------------------

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CartLineRequest {
    pub product_id: ProductId,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i64,
    #[serde(default)]
    pub discount: Discount,
}

impl From<&CartLineRequest> for CheckoutLine {
    fn from(line: &CartLineRequest) -> Self {
        CheckoutLine {
            product_id: line.product_id,
            quantity: line.quantity,
            discount: line.discount,
        }
    }
}

/// Body of both `/sales/quote` and `/sales/checkout`.
#[derive(Debug, Deserialize, Validate)]
pub struct CartRequest {
    #[serde(default)]
    pub client_id: Option<PartyId>,
    #[validate(length(min = 1, message = "the cart is empty"), nested)]
    pub lines: Vec<CartLineRequest>,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub cash_received: Money,
}

impl CartRequest {
    pub fn checkout_lines(&self) -> Vec<CheckoutLine> {
        self.lines.iter().map(CheckoutLine::from).collect()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoidRequest {
    #[validate(length(min = 1, message = "a reason is required"))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

// -------------------------
// Inventory and reports
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustmentRequest {
    pub product_id: ProductId,
    pub delta: i64,
    #[validate(length(min = 1, message = "a reason is required"))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CashCutQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Admins may look at another cashier's drawer.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_checks_password_confirmation() {
        let body: RegisterRequest = serde_json::from_value(serde_json::json!({
            "full_name": "Ana Quispe",
            "ci": "1234567",
            "email": "ana@tienda.bo",
            "password": "secreto",
            "confirm_password": "secreta",
        }))
        .unwrap();
        let errs = body.validate().unwrap_err();
        assert!(errs.field_errors().contains_key("confirm_password"));
    }

    #[test]
    fn empty_carts_and_zero_quantities_are_rejected() {
        let empty: CartRequest = serde_json::from_value(serde_json::json!({ "lines": [] })).unwrap();
        assert!(empty.validate().is_err());

        let zero: CartRequest = serde_json::from_value(serde_json::json!({
            "lines": [{ "product_id": ProductId::generate(), "quantity": 0 }],
        }))
        .unwrap();
        assert!(zero.validate().is_err());
    }

    #[test]
    fn cart_defaults_to_cash_without_discount() {
        let cart: CartRequest = serde_json::from_value(serde_json::json!({
            "lines": [{ "product_id": ProductId::generate(), "quantity": 2 }],
        }))
        .unwrap();
        assert!(cart.validate().is_ok());
        assert_eq!(cart.payment_method, PaymentMethod::Cash);
        assert_eq!(cart.discount, Discount::default());
    }

    #[test]
    fn party_email_is_optional_but_checked() {
        let ok: PartyRequest = serde_json::from_value(serde_json::json!({ "name": "Juan" })).unwrap();
        assert!(ok.validate().is_ok());

        let bad: PartyRequest =
            serde_json::from_value(serde_json::json!({ "name": "Juan", "email": "no-arroba" })).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn search_term_ignores_blank_queries() {
        let q = SearchQuery {
            q: Some("  ".to_string()),
            include_inactive: false,
        };
        assert_eq!(q.term(), None);
    }
}
