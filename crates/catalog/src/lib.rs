//! Catalog domain module (event-sourced).
//!
//! Products and the categories they are filed under. Pure business rules: code
//! uniqueness and stock levels are enforced by the infrastructure layer.

pub mod category;
pub mod product;

pub use category::{
    Category, CategoryCommand, CategoryCreated, CategoryEvent, CategoryId, CategoryRemoved,
    CategoryRenamed, CreateCategory, RemoveCategory, RenameCategory,
};
pub use product::{
    DEFAULT_MIN_STOCK, DEFAULT_UNIT, DeactivateProduct, Product, ProductCommand, ProductDeactivated,
    ProductDetails, ProductEvent, ProductId, ProductReactivated, ProductRegistered,
    ProductRepriced, ProductUpdated, ReactivateProduct, RegisterProduct, RepriceProduct,
    UpdateProduct,
};
