//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CheckoutError     - Everything a register action can fail with    │
//! │  │   ├── CatalogError      (lookup timed out / backend failed)         │
//! │  │   ├── PersistenceError  (save timed out / transaction failed)       │
//! │  │   └── ValidationError   (bad input)                                 │
//! │  └── ValidationError   - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError           - converts into CatalogError / PersistenceError │
//! │                                                                         │
//! │  Register app errors                                                    │
//! │  └── AppError          - startup, config, command parsing              │
//! │                                                                         │
//! │  Flow: DbError → PersistenceError → CheckoutError → operator message   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is recoverable: the register shows the message, re-renders
//! the cart, and lets the operator carry on or retry.

use std::time::Duration;
use thiserror::Error;

use crate::money::Money;
use crate::types::{ProductId, TaxRate};

// =============================================================================
// Checkout Error
// =============================================================================

/// Errors returned by cart mutations and by sale finalization.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The catalog has no product with this id.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product exists but is marked inactive.
    #[error("Product is not available for sale: {0}")]
    ProductUnavailable(ProductId),

    /// Tried to remove more units than the cart holds.
    ///
    /// `available` is 0 when the product is not in the cart at all.
    #[error("Cannot remove {requested} of {product_id}: cart holds {available}")]
    InsufficientQuantity {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// The discount would drive the grand total below zero.
    #[error("Invalid discount: {reason}")]
    InvalidDiscount { reason: String },

    /// Checkout was attempted with nothing in the cart.
    #[error("Cannot finalize an empty cart")]
    EmptyCart,

    /// One or more lines no longer match the catalog.
    ///
    /// ## User Workflow
    /// ```text
    /// checkout
    ///      │
    ///      ▼
    /// re-check: COKE was 1.50, catalog now says 1.75
    ///      │
    ///      ▼
    /// PriceChanged([PriceDrift { COKE, 150 → 175 }])
    ///      │
    ///      ▼
    /// Operator removes and re-adds the item, or voids the sale
    /// ```
    #[error("Prices changed for {} item(s) since they were added", .0.len())]
    PriceChanged(Vec<PriceDrift>),

    /// The product is priced in a different currency than the cart.
    #[error("Product {product_id} is priced in {found}, cart is in {expected}")]
    CurrencyMismatch {
        product_id: ProductId,
        expected: String,
        found: String,
    },

    /// Cart has reached the maximum number of distinct lines.
    #[error("Cart cannot have more than {max} items")]
    CartFull { max: usize },

    /// The catalog could not be reached. Retryable.
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(#[from] CatalogError),

    /// The sale could not be stored. The cart is intact. Retryable.
    #[error("Could not save sale: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CheckoutError {
    /// Whether repeating the same action may succeed without operator changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::CatalogUnavailable(_) | CheckoutError::Persistence(_)
        )
    }
}

/// One cart line whose captured price or tax rate disagrees with the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceDrift {
    pub product_id: ProductId,
    pub name: String,
    pub cart_unit_price: Money,
    pub catalog_unit_price: Money,
    pub cart_tax_rate: TaxRate,
    pub catalog_tax_rate: TaxRate,
}

// =============================================================================
// Collaborator Errors
// =============================================================================

/// Failure of a catalog lookup. A missing product is not an error: lookups
/// return `Ok(None)` for that.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Backend(String),
}

/// Failure to durably store a sale.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The transaction was rolled back; nothing was written.
    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("{0}")]
    Backend(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad currency code, bad SKU characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Figures that must agree with each other do not.
    #[error("{field} is inconsistent: {reason}")]
    Inconsistent { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CheckoutError.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

// =============================================================================
// Unit Tests
// =============================================================================
