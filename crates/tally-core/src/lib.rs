//! # tally-core: Sale Transaction Core for Tally POS
//!
//! The cart, the sale finalizer and the money math behind them. Storage and
//! the product catalog are reached only through the [`gateway`] traits.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              apps/register (terminal front end)                 │   │
//! │  │      "add COKE 2" ──► "discount 10%" ──► "checkout"             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ one call per action                    │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ register  │  │   cart    │  │ finalize  │  │  pricing  │  │   │
//! │  │   │ commands  │─►│ LineItem  │─►│   Sale    │  │ rounding  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │          gateway: CatalogLookup / SaleStore (+ Timed)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (SQLite)                            │   │
//! │  │         implements CatalogLookup and SaleStore                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Totals, etc.)
//! - [`money`] - Money and Currency, integer arithmetic only
//! - [`pricing`] - Totals, discount and tax allocation
//! - [`cart`] - The mutable cart
//! - [`finalize`] - Cart → Sale conversion
//! - [`register`] - Command interface for front ends
//! - [`gateway`] - Catalog and sale store traits, timeouts
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::cart::Cart;
//! use tally_core::money::{Currency, Money};
//! use tally_core::types::{Discount, Product, ProductId, TaxRate};
//! use chrono::Utc;
//!
//! let coke = Product {
//!     id: ProductId::from("coke"),
//!     sku: "COKE-330".into(),
//!     name: "Coca-Cola 330ml".into(),
//!     category_id: None,
//!     unit_price: Money::from_minor(1000),
//!     tax_rate: TaxRate::from_bps(1000),
//!     currency_code: "USD".into(),
//!     is_active: true,
//!     created_at: Utc::now(),
//!     updated_at: Utc::now(),
//! };
//!
//! let mut cart = Cart::new(Currency::USD);
//! cart.add_product(&coke, 2).unwrap();
//! cart.apply_discount(Discount::Percent(1000)).unwrap();
//!
//! let totals = cart.totals();
//! assert_eq!(totals.grand_total.minor(), 1980); // 20.00 - 2.00 + 1.80
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod finalize;
pub mod gateway;
pub mod money;
pub mod pricing;
pub mod register;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CheckoutIdentity, LineItem};
pub use error::{CatalogError, CheckoutError, CheckoutResult, PersistenceError, PriceDrift, ValidationError};
pub use finalize::SaleFinalizer;
pub use gateway::{CatalogLookup, SaleStore, Timed};
pub use money::{Currency, Money};
pub use register::{Register, Timeouts};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches typos like 1000 instead of 10 at the till.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest accepted unit price in minor units.
pub const MAX_UNIT_PRICE_MINOR: i64 = 1_000_000_000_000;
