//! # Validation Module
//!
//! Business-rule checks run before data reaches the cart or the database.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Register command parser                                               │
//! │  └── Syntax only (is "3" a number?)                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Cart / ProductRepository                                              │
//! │  └── THIS MODULE: quantities, prices, tax rates, discounts, SKUs       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  SQLite                                                                │
//! │  └── NOT NULL, UNIQUE, CHECK and foreign key constraints               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_quantity, validate_sku};
//!
//! validate_sku("COKE-330").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Discount, Product};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_UNIT_PRICE_MINOR};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// 100% in basis points.
pub const FULL_BPS: u32 = 10_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only letters, digits, hyphens and underscores
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_sku;
///
/// assert!(validate_sku("COKE-330").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (products, categories, cashiers).
///
/// Must be non-blank and at most 200 characters.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a search query and returns it trimmed.
///
/// Empty is fine (the caller lists everything); longer than 100 is not.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity to add to or remove from the cart.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Register: "add COKE 5"                                                 │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0?  → "quantity must be positive"                     │
/// │       ├── qty > 999? → "quantity must be between 1 and 999"            │
/// │       └── OK → catalog lookup                                          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price.
///
/// ## Rules
/// - Zero is allowed (free items)
/// - Never negative
/// - At most [`MAX_UNIT_PRICE_MINOR`], which keeps every cart computation
///   inside `i64` once rounded
///
/// ## Example
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::validation::validate_unit_price;
///
/// assert!(validate_unit_price(Money::from_minor(1099)).is_ok());
/// assert!(validate_unit_price(Money::zero()).is_ok());
/// assert!(validate_unit_price(Money::from_minor(-100)).is_err());
/// ```
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() || price.minor() > MAX_UNIT_PRICE_MINOR {
        return Err(ValidationError::OutOfRange {
            field: "unit_price".to_string(),
            min: 0,
            max: MAX_UNIT_PRICE_MINOR,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points: 0 to 10000 (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: i64::from(FULL_BPS),
        });
    }

    Ok(())
}

/// Checks the shape of a discount, independent of any cart.
///
/// Whether an amount fits under a particular subtotal is the cart's call.
pub fn validate_discount(discount: &Discount) -> ValidationResult<()> {
    match discount {
        Discount::Amount(amount) if amount.is_negative() => Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: i64::MAX,
        }),
        Discount::Percent(bps) if *bps > FULL_BPS => Err(ValidationError::OutOfRange {
            field: "discount percent".to_string(),
            min: 0,
            max: i64::from(FULL_BPS),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Checks whether one more distinct line fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates a catalog product before it is written.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    if product.id.as_str().trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }
    validate_sku(&product.sku)?;
    validate_name("name", &product.name)?;
    validate_unit_price(product.unit_price)?;
    validate_tax_rate_bps(product.tax_rate.bps())?;
    crate::money::Currency::new(&product.currency_code, 0)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProductId, TaxRate};
    use chrono::Utc;

    fn product() -> Product {
        Product {
            id: ProductId::from("p-1"),
            sku: "COKE-330".to_string(),
            name: "Coca-Cola 330ml".to_string(),
            category_id: None,
            unit_price: Money::from_minor(150),
            tax_rate: TaxRate::from_bps(825),
            currency_code: "USD".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("COKE-330").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Coca-Cola 330ml").is_ok());
        assert!(validate_name("name", "").is_err());
        let err = validate_name("display_name", &"A".repeat(300)).unwrap_err();
        assert_eq!(err.to_string(), "display_name must be at most 200 characters");
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Money::zero()).is_ok());
        assert!(validate_unit_price(Money::from_minor(MAX_UNIT_PRICE_MINOR)).is_ok());
        assert!(validate_unit_price(Money::from_minor(MAX_UNIT_PRICE_MINOR + 1)).is_err());
        assert!(validate_unit_price(Money::from_minor(-1)).is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(825).is_ok());
        assert!(validate_tax_rate_bps(10000).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    #[test]
    fn test_validate_discount() {
        assert!(validate_discount(&Discount::Percent(0)).is_ok());
        assert!(validate_discount(&Discount::Percent(10_000)).is_ok());
        assert!(validate_discount(&Discount::Percent(10_001)).is_err());
        assert!(validate_discount(&Discount::Amount(Money::from_minor(500))).is_ok());
        assert!(validate_discount(&Discount::Amount(Money::from_minor(-1))).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS - 1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_err());
    }

    #[test]
    fn test_validate_product() {
        assert!(validate_product(&product()).is_ok());

        let mut bad = product();
        bad.currency_code = "US".to_string();
        assert!(validate_product(&bad).is_err());

        let mut bad = product();
        bad.tax_rate = TaxRate::from_bps(20_000);
        assert!(validate_product(&bad).is_err());
    }
}
