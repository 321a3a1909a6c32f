//! # Domain Types
//!
//! Value types shared by the cart, the finalizer and the persistence layer.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    SaleLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id / sku       │   │  id (UUID)      │   │  product_id     │       │
//! │  │  name           │   │  receipt_number │   │  name (frozen)  │       │
//! │  │  unit_price     │   │  cashier_id     │   │  unit_price     │       │
//! │  │  tax_rate       │   │  lines, totals  │   │  qty, tax, disc │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │    Discount     │   │     Totals      │       │
//! │  │  bps (u32)      │   │  Amount(Money)  │   │  subtotal       │       │
//! │  │  825 = 8.25%    │   │  Percent(bps)   │   │  discount, tax  │       │
//! │  └─────────────────┘   └─────────────────┘   │  grand_total    │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::money::{Currency, Money};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
        #[cfg_attr(feature = "sqlx", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            /// Generates a fresh UUID v4 identifier.
            pub fn generate() -> Self {
                $name(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                $name(id)
            }
        }
    };
}

string_id!(
    /// Catalog identifier of a product.
    ProductId
);
string_id!(
    /// Identifier of a product category.
    CategoryId
);
string_id!(
    /// Identifier of the cashier operating a register.
    CashierId
);
string_id!(
    /// Identity assigned to a sale at checkout.
    SaleId
);

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (1 bps = 0.01%, so 825 = 8.25%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}%", whole)
        } else if frac % 10 == 0 {
            write!(f, "{}.{}%", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

// =============================================================================
// Catalog Entities
// =============================================================================

/// A product as the catalog currently describes it.
///
/// Immutable from the cart's point of view: the cart copies what it needs
/// at add time and asks the catalog again at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    /// Display name shown to the cashier and on the sale record.
    pub name: String,
    pub category_id: Option<CategoryId>,
    /// Price of one unit in minor units of `currency_code`.
    pub unit_price: Money,
    pub tax_rate: TaxRate,
    /// ISO 4217 code the price is denominated in.
    pub currency_code: String,
    /// Inactive products stay in the catalog for history but cannot be sold.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A person allowed to operate a register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cashier {
    pub id: CashierId,
    pub display_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Discount
// =============================================================================

/// A cart-level discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// A fixed amount off the subtotal.
    Amount(Money),
    /// A share of the subtotal in basis points (1000 = 10%).
    Percent(u32),
}

impl Discount {
    pub const fn amount(amount: Money) -> Self {
        Discount::Amount(amount)
    }

    pub const fn percent_bps(bps: u32) -> Self {
        Discount::Percent(bps)
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Monetary summary of a cart or sale.
///
/// ## Invariant
/// `grand_total == subtotal - discount_total + tax_total`, exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of unit price × quantity over all lines, before discount and tax.
    pub subtotal: Money,
    pub discount_total: Money,
    pub tax_total: Money,
    pub grand_total: Money,
}

impl Totals {
    pub const fn zero() -> Self {
        Totals {
            subtotal: Money::zero(),
            discount_total: Money::zero(),
            tax_total: Money::zero(),
            grand_total: Money::zero(),
        }
    }

    /// Checks the grand total identity.
    pub fn is_balanced(&self) -> bool {
        self.grand_total == self.subtotal - self.discount_total + self.tax_total
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A frozen line of a completed sale.
///
/// Owns every value it needs: the product may later be repriced, renamed or
/// deleted without affecting this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    /// Product name at time of sale (frozen).
    pub name: String,
    /// Unit price at time of sale (frozen).
    pub unit_price: Money,
    pub quantity: i64,
    /// unit_price × quantity.
    pub line_total: Money,
    /// This line's share of the cart discount.
    pub discount: Money,
    pub tax_rate: TaxRate,
    /// This line's share of the sale's tax total.
    pub tax: Money,
}

/// Everything needed to rebuild a [`Sale`], e.g. from storage.
#[derive(Debug, Clone)]
pub struct SaleParts {
    pub id: SaleId,
    pub receipt_number: String,
    pub cashier_id: CashierId,
    pub currency: Currency,
    pub lines: Vec<SaleLine>,
    pub totals: Totals,
    pub created_at: DateTime<Utc>,
}

/// An immutable, append-only record of a completed transaction.
///
/// There are no setters: a `Sale` is built once at checkout (or rebuilt from
/// storage) and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sale {
    id: SaleId,
    receipt_number: String,
    cashier_id: CashierId,
    currency: Currency,
    lines: Vec<SaleLine>,
    totals: Totals,
    created_at: DateTime<Utc>,
}

impl Sale {
    /// Builds a sale, checking that its figures are internally consistent.
    ///
    /// ## Checks
    /// - at least one line
    /// - `grand_total == subtotal - discount_total + tax_total`
    /// - line totals, line discounts and line taxes each sum to the
    ///   matching sale-level total
    pub fn from_parts(parts: SaleParts) -> Result<Self, ValidationError> {
        if parts.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "sale lines".to_string(),
            });
        }
        if !parts.totals.is_balanced() {
            return Err(ValidationError::Inconsistent {
                field: "grand_total".to_string(),
                reason: "does not equal subtotal - discount_total + tax_total".to_string(),
            });
        }

        let line_sum: Money = parts.lines.iter().map(|l| l.line_total).sum();
        let discount_sum: Money = parts.lines.iter().map(|l| l.discount).sum();
        let tax_sum: Money = parts.lines.iter().map(|l| l.tax).sum();
        let checks = [
            ("subtotal", line_sum, parts.totals.subtotal),
            ("discount_total", discount_sum, parts.totals.discount_total),
            ("tax_total", tax_sum, parts.totals.tax_total),
        ];
        for (field, lines, total) in checks {
            if lines != total {
                return Err(ValidationError::Inconsistent {
                    field: field.to_string(),
                    reason: format!("lines sum to {}, total is {}", lines.minor(), total.minor()),
                });
            }
        }

        Ok(Sale {
            id: parts.id,
            receipt_number: parts.receipt_number,
            cashier_id: parts.cashier_id,
            currency: parts.currency,
            lines: parts.lines,
            totals: parts.totals,
            created_at: parts.created_at,
        })
    }

    pub fn id(&self) -> &SaleId {
        &self.id
    }

    pub fn receipt_number(&self) -> &str {
        &self.receipt_number
    }

    pub fn cashier_id(&self) -> &CashierId {
        &self.cashier_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn subtotal(&self) -> Money {
        self.totals.subtotal
    }

    pub fn discount_total(&self) -> Money {
        self.totals.discount_total
    }

    pub fn tax_total(&self) -> Money {
        self.totals.tax_total
    }

    pub fn grand_total(&self) -> Money {
        self.totals.grand_total
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Total number of units sold.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
