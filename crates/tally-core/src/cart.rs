//! # Cart
//!
//! The mutable side of a transaction: line items for one open sale and the
//! running totals shown to the operator.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cart Operations                                   │
//! │                                                                         │
//! │  Operator Action        Cart Method             State Change            │
//! │  ───────────────        ───────────             ────────────            │
//! │                                                                         │
//! │  Scan product ────────► add_item() ───────────► catalog lookup,        │
//! │                                                 push or qty += n        │
//! │                                                                         │
//! │  Void units ──────────► remove_item() ────────► qty -= n,              │
//! │                                                 line dropped at 0       │
//! │                                                                         │
//! │  Discount ────────────► apply_discount() ─────► discount = d           │
//! │                                                                         │
//! │  Cancel ──────────────► clear() ──────────────► lines, discount reset  │
//! │                                                                         │
//! │  Every mutation ends in recompute(): totals are cached and             │
//! │  totals() only reads them, and any pending checkout identity is        │
//! │  dropped.                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::CatalogLookup;
use crate::money::{Currency, Money};
use crate::pricing::{self, LineAmount, Priced};
use crate::types::{Discount, Product, ProductId, SaleId, TaxRate, Totals};
use crate::validation::{validate_cart_size, validate_discount, validate_quantity, validate_unit_price};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Line Item
// =============================================================================

/// One product entry in the cart.
///
/// ## Price Freezing
/// Unit price and tax rate are captured when the product is first added and
/// never change afterwards. Adding more of the same product only bumps the
/// quantity. The finalizer compares these captured values with the catalog
/// at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    product_id: ProductId,
    name: String,
    unit_price: Money,
    tax_rate: TaxRate,
    quantity: i64,
    line_discount: Money,
}

impl LineItem {
    fn from_product(product: &Product, quantity: i64) -> Self {
        LineItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            tax_rate: product.tax_rate,
            quantity,
            line_discount: Money::zero(),
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit price captured at add time.
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// Tax rate captured at add time.
    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    /// Always at least 1.
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// unit price × quantity, before discount and tax.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// This line's share of the cart discount.
    pub fn line_discount(&self) -> Money {
        self.line_discount
    }

    fn amount(&self) -> LineAmount {
        LineAmount {
            line_total: self.line_total(),
            tax_rate: self.tax_rate,
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Identity given to a checkout attempt: the sale id and timestamp.
///
/// Kept on the cart until the sale is stored or the cart changes, so a
/// retried checkout submits the same sale again instead of a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutIdentity {
    pub sale_id: SaleId,
    pub created_at: DateTime<Utc>,
}

/// The shopping cart for one in-progress transaction.
///
/// ## Invariants
/// - Lines are unique by product id, in the order first added
/// - Every line has quantity ≥ 1; a line that reaches 0 is removed
/// - At most [`MAX_CART_ITEMS`] lines, at most [`MAX_ITEM_QUANTITY`] per line
/// - Every price in the cart is in the cart's currency
/// - Cached totals always reflect the current lines and discount
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    currency: Currency,
    lines: Vec<LineItem>,
    discount: Option<Discount>,
    #[serde(skip)]
    priced: Priced,
    #[serde(skip)]
    pending: Option<CheckoutIdentity>,
}

impl Cart {
    /// Creates an empty cart priced in `currency`.
    pub fn new(currency: Currency) -> Self {
        Cart {
            currency,
            lines: Vec::new(),
            discount: None,
            priced: Priced::default(),
            pending: None,
        }
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Looks the product up and adds `quantity` units of it.
    ///
    /// The catalog is authoritative: no price is ever taken from the caller.
    /// Wrap the catalog in [`Timed`](crate::gateway::Timed) to bound the
    /// lookup.
    ///
    /// ## Errors
    /// - `Validation` if `quantity` is not in 1..=999 (checked before lookup)
    /// - `ProductNotFound` / `ProductUnavailable`
    /// - `CurrencyMismatch`, `CartFull`
    /// - `CatalogUnavailable` if the lookup failed or timed out
    pub async fn add_item<C>(
        &mut self,
        catalog: &C,
        product_id: &ProductId,
        quantity: i64,
    ) -> CheckoutResult<()>
    where
        C: CatalogLookup + ?Sized,
    {
        validate_quantity(quantity)?;

        let product = catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| CheckoutError::ProductNotFound(product_id.clone()))?;

        self.add_product(&product, quantity)
    }

    /// Adds an already looked-up product.
    ///
    /// Existing lines keep their captured price; only the quantity grows.
    pub fn add_product(&mut self, product: &Product, quantity: i64) -> CheckoutResult<()> {
        validate_quantity(quantity)?;

        if !product.is_active {
            return Err(CheckoutError::ProductUnavailable(product.id.clone()));
        }
        if !product.currency_code.eq_ignore_ascii_case(self.currency.code()) {
            return Err(CheckoutError::CurrencyMismatch {
                product_id: product.id.clone(),
                expected: self.currency.code().to_string(),
                found: product.currency_code.clone(),
            });
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let new_qty = line.quantity + quantity;
            validate_quantity(new_qty)?;
            line.quantity = new_qty;
            debug!(product_id = %product.id, quantity = new_qty, "Increased cart line quantity");
        } else {
            validate_cart_size(self.lines.len())
                .map_err(|_| CheckoutError::CartFull { max: MAX_CART_ITEMS })?;
            validate_unit_price(product.unit_price)?;
            self.lines.push(LineItem::from_product(product, quantity));
            debug!(
                product_id = %product.id,
                quantity,
                unit_price = product.unit_price.minor(),
                "Added cart line"
            );
        }

        self.recompute();
        Ok(())
    }

    /// Removes `quantity` units of a product, dropping the line at zero.
    ///
    /// ## Errors
    /// `InsufficientQuantity` if `quantity` is not positive, exceeds what the
    /// cart holds, or the product is not in the cart (available = 0).
    pub fn remove_item(&mut self, product_id: &ProductId, quantity: i64) -> CheckoutResult<()> {
        let index = self.lines.iter().position(|l| &l.product_id == product_id);
        let available = index.map_or(0, |i| self.lines[i].quantity);

        let index = match index {
            Some(i) if quantity > 0 && quantity <= available => i,
            _ => {
                return Err(CheckoutError::InsufficientQuantity {
                    product_id: product_id.clone(),
                    requested: quantity,
                    available,
                })
            }
        };

        if quantity == available {
            self.lines.remove(index);
            debug!(product_id = %product_id, "Removed cart line");
        } else {
            self.lines[index].quantity -= quantity;
            debug!(product_id = %product_id, quantity = available - quantity, "Decreased cart line quantity");
        }

        self.recompute();
        Ok(())
    }

    /// Sets the cart-level discount, replacing any previous one.
    ///
    /// ## Errors
    /// `InvalidDiscount` for a negative amount, an amount above the current
    /// subtotal, or a percentage above 100%.
    pub fn apply_discount(&mut self, discount: Discount) -> CheckoutResult<()> {
        validate_discount(&discount).map_err(|e| CheckoutError::InvalidDiscount {
            reason: e.to_string(),
        })?;

        if let Discount::Amount(amount) = discount {
            let subtotal = self.totals().subtotal;
            if amount > subtotal {
                return Err(CheckoutError::InvalidDiscount {
                    reason: format!(
                        "{} exceeds subtotal {}",
                        self.currency.format(amount),
                        self.currency.format(subtotal)
                    ),
                });
            }
        }

        self.discount = Some(discount);
        debug!(?discount, "Applied cart discount");
        self.recompute();
        Ok(())
    }

    pub fn clear_discount(&mut self) {
        self.discount = None;
        self.recompute();
    }

    /// Empties the cart and drops the discount.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.discount = None;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.pending = None;
        self.priced = self.price();
        for (line, share) in self.lines.iter_mut().zip(&self.priced.lines) {
            line.line_discount = share.discount;
        }
    }

    /// The identity for checking out the cart as it is now. Repeated calls
    /// return the same identity until the cart is mutated.
    pub(crate) fn checkout_identity(&mut self) -> CheckoutIdentity {
        self.pending
            .get_or_insert_with(|| CheckoutIdentity {
                sale_id: SaleId::generate(),
                created_at: Utc::now(),
            })
            .clone()
    }

    /// Identity of a checkout that was attempted but not confirmed stored.
    pub fn pending_checkout(&self) -> Option<&CheckoutIdentity> {
        self.pending.as_ref()
    }

    /// Prices the current lines from scratch.
    pub(crate) fn price(&self) -> Priced {
        let amounts: Vec<LineAmount> = self.lines.iter().map(LineItem::amount).collect();
        pricing::price(&amounts, self.discount.as_ref())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Current totals. All zero for an empty cart.
    pub fn totals(&self) -> Totals {
        self.priced.totals
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn line(&self, product_id: &ProductId) -> Option<&LineItem> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    /// Units of `product_id` in the cart, 0 if absent.
    pub fn quantity_of(&self, product_id: &ProductId) -> i64 {
        self.line(product_id).map_or(0, LineItem::quantity)
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn discount(&self) -> Option<&Discount> {
        self.discount.as_ref()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{product, InMemoryCatalog};

    fn id(s: &str) -> ProductId {
        ProductId::from(s)
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::with(vec![
            product("A", 1000, 1000),
            product("B", 500, 0),
            product("C", 333, 825),
        ])
    }

    async fn scenario_cart(catalog: &InMemoryCatalog) -> Cart {
        let mut cart = Cart::new(Currency::USD);
        cart.add_item(catalog, &id("A"), 2).await.unwrap();
        cart.add_item(catalog, &id("B"), 1).await.unwrap();
        cart
    }

    #[tokio::test]
    async fn test_scenario_totals_without_discount() {
        let cart = scenario_cart(&catalog()).await;
        let totals = cart.totals();
        assert_eq!(totals.subtotal.minor(), 2500);
        assert_eq!(totals.tax_total.minor(), 200);
        assert_eq!(totals.discount_total.minor(), 0);
        assert_eq!(totals.grand_total.minor(), 2700);
    }

    #[tokio::test]
    async fn test_scenario_totals_with_ten_percent_discount() {
        let mut cart = scenario_cart(&catalog()).await;
        cart.apply_discount(Discount::Percent(1000)).unwrap();

        let totals = cart.totals();
        assert_eq!(totals.discount_total.minor(), 250);
        assert_eq!(totals.tax_total.minor(), 180);
        assert_eq!(totals.grand_total.minor(), 2430);
        assert_eq!(cart.line(&id("A")).unwrap().line_discount().minor(), 200);
        assert_eq!(cart.line(&id("B")).unwrap().line_discount().minor(), 50);
    }

    #[tokio::test]
    async fn test_adding_same_product_merges_line() {
        let catalog = catalog();
        let mut cart = Cart::new(Currency::USD);
        cart.add_item(&catalog, &id("A"), 1).await.unwrap();
        cart.add_item(&catalog, &id("A"), 2).await.unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.quantity_of(&id("A")), 3);
    }

    #[tokio::test]
    async fn test_price_captured_at_add_time() {
        let catalog = catalog();
        let mut cart = Cart::new(Currency::USD);
        cart.add_item(&catalog, &id("A"), 1).await.unwrap();

        catalog.set_price("A", 1200);
        cart.add_item(&catalog, &id("A"), 1).await.unwrap();

        let line = cart.line(&id("A")).unwrap();
        assert_eq!(line.unit_price().minor(), 1000);
        assert_eq!(cart.totals().subtotal.minor(), 2000);
    }

    #[tokio::test]
    async fn test_add_item_errors() {
        let catalog = catalog();
        catalog.insert(Product {
            is_active: false,
            ..product("OLD", 100, 0)
        });
        catalog.insert(Product {
            currency_code: "EUR".to_string(),
            ..product("EURO", 100, 0)
        });
        let mut cart = Cart::new(Currency::USD);

        let err = cart.add_item(&catalog, &id("missing"), 1).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProductNotFound(p) if p == id("missing")));

        let err = cart.add_item(&catalog, &id("OLD"), 1).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProductUnavailable(_)));

        let err = cart.add_item(&catalog, &id("EURO"), 1).await.unwrap_err();
        assert!(matches!(err, CheckoutError::CurrencyMismatch { .. }));

        let err = cart.add_item(&catalog, &id("A"), 0).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));

        assert!(cart.is_empty());
        assert_eq!(cart.totals(), Totals::zero());
    }

    #[tokio::test]
    async fn test_zero_quantity_never_reaches_catalog() {
        let catalog = catalog();
        let mut cart = Cart::new(Currency::USD);
        let _ = cart.add_item(&catalog, &id("A"), -3).await;
        assert_eq!(catalog.lookups(), 0);
    }

    #[tokio::test]
    async fn test_line_quantity_capped() {
        let catalog = catalog();
        let mut cart = Cart::new(Currency::USD);
        cart.add_item(&catalog, &id("A"), MAX_ITEM_QUANTITY).await.unwrap();
        assert!(cart.add_item(&catalog, &id("A"), 1).await.is_err());
        assert_eq!(cart.quantity_of(&id("A")), MAX_ITEM_QUANTITY);
    }

    #[test]
    fn test_cart_full() {
        let mut cart = Cart::new(Currency::USD);
        for i in 0..MAX_CART_ITEMS {
            cart.add_product(&product(&format!("P{}", i), 100, 0), 1).unwrap();
        }
        let err = cart.add_product(&product("ONE-MORE", 100, 0), 1).unwrap_err();
        assert!(matches!(err, CheckoutError::CartFull { max } if max == MAX_CART_ITEMS));
        // existing lines can still grow
        cart.add_product(&product("P0", 100, 0), 1).unwrap();
    }

    #[test]
    fn test_remove_item() {
        let mut cart = Cart::new(Currency::USD);
        cart.add_product(&product("A", 1000, 1000), 3).unwrap();

        cart.remove_item(&id("A"), 1).unwrap();
        assert_eq!(cart.quantity_of(&id("A")), 2);

        cart.remove_item(&id("A"), 2).unwrap();
        assert!(cart.line(&id("A")).is_none());
        assert!(cart.is_empty());
        assert_eq!(cart.totals(), Totals::zero());
    }

    #[test]
    fn test_remove_item_insufficient_quantity() {
        let mut cart = Cart::new(Currency::USD);
        cart.add_product(&product("A", 1000, 1000), 2).unwrap();

        let err = cart.remove_item(&id("A"), 3).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientQuantity { requested: 3, available: 2, .. }
        ));
        assert!(cart.remove_item(&id("A"), 0).is_err());
        assert!(cart.remove_item(&id("A"), -1).is_err());

        let err = cart.remove_item(&id("B"), 1).unwrap_err();
        assert!(matches!(err, CheckoutError::InsufficientQuantity { available: 0, .. }));

        assert_eq!(cart.quantity_of(&id("A")), 2);
    }

    #[test]
    fn test_net_quantity_tracks_adds_and_removes() {
        let mut cart = Cart::new(Currency::USD);
        let a = product("A", 100, 0);
        let ops: [(bool, i64); 8] = [
            (true, 5),
            (false, 2),
            (true, 1),
            (false, 10),
            (false, 4),
            (true, 3),
            (false, 1),
            (false, 5),
        ];
        let mut expected = 0;
        for (add, qty) in ops {
            let result = if add {
                cart.add_product(&a, qty)
            } else {
                cart.remove_item(&a.id, qty)
            };
            if result.is_ok() {
                expected += if add { qty } else { -qty };
            }
            assert_eq!(cart.quantity_of(&a.id), expected);
            assert!(cart.quantity_of(&a.id) >= 0);
            assert!(cart.lines().iter().all(|l| l.quantity() >= 1));
        }
        assert_eq!(expected, 2);
    }

    #[test]
    fn test_totals_idempotent() {
        let mut cart = Cart::new(Currency::USD);
        cart.add_product(&product("C", 333, 825), 7).unwrap();
        cart.apply_discount(Discount::Percent(1250)).unwrap();
        let first = cart.totals();
        for _ in 0..5 {
            assert_eq!(cart.totals(), first);
        }
        assert_eq!(cart.price().totals, first);
    }

    #[test]
    fn test_invalid_discounts_rejected() {
        let mut cart = Cart::new(Currency::USD);
        cart.add_product(&product("A", 1000, 1000), 1).unwrap();

        assert!(matches!(
            cart.apply_discount(Discount::Amount(Money::from_minor(1001))),
            Err(CheckoutError::InvalidDiscount { .. })
        ));
        assert!(cart.apply_discount(Discount::Amount(Money::from_minor(-1))).is_err());
        assert!(cart.apply_discount(Discount::Percent(10_001)).is_err());
        assert!(cart.discount().is_none());

        cart.apply_discount(Discount::Amount(Money::from_minor(1000))).unwrap();
        assert_eq!(cart.totals().grand_total.minor(), 0);
    }

    #[test]
    fn test_fixed_discount_clamped_after_removal() {
        let mut cart = Cart::new(Currency::USD);
        cart.add_product(&product("A", 1000, 1000), 1).unwrap();
        cart.add_product(&product("B", 500, 0), 1).unwrap();
        cart.apply_discount(Discount::Amount(Money::from_minor(1200))).unwrap();

        cart.remove_item(&id("A"), 1).unwrap();
        let totals = cart.totals();
        assert_eq!(totals.discount_total.minor(), 500);
        assert_eq!(totals.grand_total.minor(), 0);
        assert!(totals.is_balanced());
    }

    #[test]
    fn test_clear_and_clear_discount() {
        let mut cart = Cart::new(Currency::USD);
        cart.add_product(&product("A", 1000, 1000), 2).unwrap();
        cart.apply_discount(Discount::Percent(500)).unwrap();

        cart.clear_discount();
        assert_eq!(cart.totals().discount_total, Money::zero());

        cart.apply_discount(Discount::Percent(500)).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.discount().is_none());
        assert_eq!(cart.totals(), Totals::zero());
    }

    #[test]
    fn test_rounding_law_holds_for_discount_range() {
        let mut cart = Cart::new(Currency::USD);
        cart.add_product(&product("A", 1999, 825), 3).unwrap();
        cart.add_product(&product("B", 7, 1300), 11).unwrap();
        cart.add_product(&product("C", 12_345, 0), 1).unwrap();
        for bps in (0..=10_000).step_by(125) {
            cart.apply_discount(Discount::Percent(bps)).unwrap();
            let t = cart.totals();
            assert_eq!(t.grand_total, t.subtotal - t.discount_total + t.tax_total);
            assert!(!t.grand_total.is_negative());
        }
    }
}
