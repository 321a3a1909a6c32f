//! # Sale Finalizer
//!
//! Turns a non-empty cart into an immutable [`Sale`] and hands it to the
//! sale store. All-or-nothing: the cart is cleared only after the store has
//! confirmed the write.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  finalize(cart, cashier)                                                │
//! │       │                                                                 │
//! │       ├── cart empty? ─────────────────► EmptyCart (store untouched)   │
//! │       │                                                                 │
//! │       ├── re-check every line with the catalog                          │
//! │       │     vanished ──────────────────► ProductNotFound               │
//! │       │     inactive ──────────────────► ProductUnavailable            │
//! │       │     price / tax drifted ───────► PriceChanged([...])           │
//! │       │                                                                 │
//! │       ├── snapshot lines, price them, assign id + receipt + time       │
//! │       │     (reused from the last failed attempt if cart unchanged)    │
//! │       │                                                                 │
//! │       ├── store.save_sale(&sale)                                        │
//! │       │     failed / timed out ────────► Persistence (cart intact)     │
//! │       │                                                                 │
//! │       └── cart.clear() ────────────────► Ok(sale)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cart::Cart;
use crate::error::{CheckoutError, CheckoutResult, PriceDrift, ValidationError};
use crate::gateway::{CatalogLookup, SaleStore};
use crate::types::{CashierId, Sale, SaleId, SaleLine, SaleParts};

/// Converts carts into stored sales.
///
/// Owns its collaborators; wrap them in [`Timed`](crate::gateway::Timed)
/// to bound each call.
pub struct SaleFinalizer<C, S> {
    catalog: C,
    store: S,
}

impl<C, S> SaleFinalizer<C, S>
where
    C: CatalogLookup,
    S: SaleStore,
{
    pub fn new(catalog: C, store: S) -> Self {
        SaleFinalizer { catalog, store }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Finalizes the cart into a stored sale.
    ///
    /// On any error the cart is exactly as it was. On success it is empty
    /// and the returned sale is what was stored.
    pub async fn finalize(&self, cart: &mut Cart, cashier_id: &CashierId) -> CheckoutResult<Sale> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.revalidate(cart).await?;

        let identity = cart.checkout_identity();
        let sale = build_sale(cart, cashier_id, identity.sale_id, identity.created_at)?;
        debug!(sale_id = %sale.id(), lines = sale.lines().len(), "Built sale, saving");

        if let Err(e) = self.store.save_sale(&sale).await {
            warn!(sale_id = %sale.id(), error = %e, "Sale not saved, cart kept for retry");
            return Err(e.into());
        }

        info!(
            sale_id = %sale.id(),
            receipt = sale.receipt_number(),
            cashier_id = %cashier_id,
            grand_total = sale.grand_total().minor(),
            "Sale completed"
        );
        cart.clear();
        Ok(sale)
    }

    /// Compares every captured line with what the catalog says now.
    ///
    /// A missing or inactive product fails immediately; price and tax drift
    /// is collected across all lines so the operator sees every change at
    /// once.
    async fn revalidate(&self, cart: &Cart) -> CheckoutResult<()> {
        let mut drifts = Vec::new();

        for line in cart.lines() {
            let product = self
                .catalog
                .get_product(line.product_id())
                .await?
                .ok_or_else(|| CheckoutError::ProductNotFound(line.product_id().clone()))?;

            if !product.is_active {
                return Err(CheckoutError::ProductUnavailable(product.id));
            }
            if !product.currency_code.eq_ignore_ascii_case(cart.currency().code()) {
                return Err(CheckoutError::CurrencyMismatch {
                    product_id: product.id,
                    expected: cart.currency().code().to_string(),
                    found: product.currency_code,
                });
            }

            if product.unit_price != line.unit_price() || product.tax_rate != line.tax_rate() {
                warn!(
                    product_id = %product.id,
                    cart_price = line.unit_price().minor(),
                    catalog_price = product.unit_price.minor(),
                    "Price drift detected at checkout"
                );
                drifts.push(PriceDrift {
                    product_id: product.id,
                    name: line.name().to_string(),
                    cart_unit_price: line.unit_price(),
                    catalog_unit_price: product.unit_price,
                    cart_tax_rate: line.tax_rate(),
                    catalog_tax_rate: product.tax_rate,
                });
            }
        }

        if drifts.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::PriceChanged(drifts))
        }
    }
}

/// Snapshots the cart into a sale.
///
/// Pricing goes through the same function the cart uses for its displayed
/// totals, so the two can never disagree.
pub fn build_sale(
    cart: &Cart,
    cashier_id: &CashierId,
    id: SaleId,
    created_at: DateTime<Utc>,
) -> Result<Sale, ValidationError> {
    let priced = cart.price();

    let lines = cart
        .lines()
        .iter()
        .zip(&priced.lines)
        .map(|(line, share)| SaleLine {
            product_id: line.product_id().clone(),
            name: line.name().to_string(),
            unit_price: line.unit_price(),
            quantity: line.quantity(),
            line_total: line.line_total(),
            discount: share.discount,
            tax_rate: line.tax_rate(),
            tax: share.tax,
        })
        .collect();

    Sale::from_parts(SaleParts {
        receipt_number: receipt_number(&id, created_at),
        id,
        cashier_id: cashier_id.clone(),
        currency: cart.currency(),
        lines,
        totals: priced.totals,
        created_at,
    })
}

/// Human-readable receipt number: `YYYYMMDD-HHMMSS-XXXX`.
///
/// `XXXX` is the first four alphanumerics of the sale id, uppercased, which
/// keeps two sales in the same second apart.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use tally_core::finalize::receipt_number;
/// use tally_core::types::SaleId;
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
/// let id = SaleId::new("3f2a9c1e-0000-4000-8000-000000000000");
/// assert_eq!(receipt_number(&id, at), "20260314-092653-3F2A");
/// ```
pub fn receipt_number(id: &SaleId, at: DateTime<Utc>) -> String {
    let suffix: String = id
        .as_str()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(4)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{}-{}", at.format("%Y%m%d-%H%M%S"), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Timed;
    use crate::money::{Currency, Money};
    use crate::test_support::{product, InMemoryCatalog, RecordingStore};
    use crate::types::{Discount, ProductId};
    use crate::error::PersistenceError;
    use std::sync::Arc;
    use std::time::Duration;

    fn id(s: &str) -> ProductId {
        ProductId::from(s)
    }

    fn cashier() -> CashierId {
        CashierId::from("cashier-1")
    }

    fn setup() -> (Arc<InMemoryCatalog>, Arc<RecordingStore>) {
        let catalog = InMemoryCatalog::with(vec![product("A", 1000, 1000), product("B", 500, 0)]);
        (Arc::new(catalog), Arc::new(RecordingStore::new()))
    }

    async fn filled_cart(catalog: &InMemoryCatalog) -> Cart {
        let mut cart = Cart::new(Currency::USD);
        cart.add_item(catalog, &id("A"), 2).await.unwrap();
        cart.add_item(catalog, &id("B"), 1).await.unwrap();
        cart
    }

    #[tokio::test]
    async fn test_finalize_empty_cart_never_contacts_store() {
        let (catalog, store) = setup();
        let finalizer = SaleFinalizer::new(catalog.clone(), store.clone());
        let mut cart = Cart::new(Currency::USD);

        let err = finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(store.calls(), 0);
        assert_eq!(catalog.lookups(), 0);
    }

    #[tokio::test]
    async fn test_finalize_success_clears_cart_and_stores_sale() {
        let (catalog, store) = setup();
        let finalizer = SaleFinalizer::new(catalog.clone(), store.clone());
        let mut cart = filled_cart(&catalog).await;
        cart.apply_discount(Discount::Percent(1000)).unwrap();
        let shown = cart.totals();

        let sale = finalizer.finalize(&mut cart, &cashier()).await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(sale.totals(), shown);
        assert_eq!(sale.subtotal().minor(), 2500);
        assert_eq!(sale.discount_total().minor(), 250);
        assert_eq!(sale.tax_total().minor(), 180);
        assert_eq!(sale.grand_total().minor(), 2430);
        assert_eq!(sale.cashier_id(), &cashier());
        assert_eq!(sale.lines().len(), 2);
        assert_eq!(sale.lines()[0].line_total.minor(), 2000);
        assert_eq!(sale.lines()[0].tax.minor(), 180);
        assert_eq!(sale.lines()[1].discount.minor(), 50);
        assert_eq!(store.saved(), vec![sale]);
    }

    #[tokio::test]
    async fn test_snapshot_survives_catalog_changes() {
        let (catalog, store) = setup();
        let finalizer = SaleFinalizer::new(catalog.clone(), store.clone());
        let mut cart = filled_cart(&catalog).await;

        let sale = finalizer.finalize(&mut cart, &cashier()).await.unwrap();
        catalog.set_price("A", 9999);
        catalog.remove("B");

        assert_eq!(sale.lines()[0].unit_price.minor(), 1000);
        assert_eq!(sale.lines()[1].name, "Product B");
    }

    #[tokio::test]
    async fn test_price_change_fails_and_leaves_cart_untouched() {
        let (catalog, store) = setup();
        let finalizer = SaleFinalizer::new(catalog.clone(), store.clone());
        let mut cart = filled_cart(&catalog).await;
        let before = (cart.lines().to_vec(), cart.totals());

        catalog.set_price("A", 1100);
        catalog.set_tax_rate("B", 500);

        let err = finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        match err {
            CheckoutError::PriceChanged(drifts) => {
                assert_eq!(drifts.len(), 2);
                assert_eq!(drifts[0].product_id, id("A"));
                assert_eq!(drifts[0].cart_unit_price, Money::from_minor(1000));
                assert_eq!(drifts[0].catalog_unit_price, Money::from_minor(1100));
                assert_eq!(drifts[1].catalog_tax_rate.bps(), 500);
            }
            other => panic!("expected PriceChanged, got {:?}", other),
        }
        assert_eq!((cart.lines().to_vec(), cart.totals()), before);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_vanished_and_inactive_products() {
        let (catalog, store) = setup();
        let finalizer = SaleFinalizer::new(catalog.clone(), store.clone());
        let mut cart = filled_cart(&catalog).await;

        catalog.deactivate("B");
        let err = finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProductUnavailable(p) if p == id("B")));

        catalog.remove("A");
        let err = finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProductNotFound(p) if p == id("A")));

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_cart_then_retry_succeeds() {
        let (catalog, store) = setup();
        let finalizer = SaleFinalizer::new(catalog.clone(), store.clone());
        let mut cart = filled_cart(&catalog).await;
        let before = cart.totals();

        store.set_failing(true);
        let err = finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Persistence(PersistenceError::Transaction(_))));
        assert!(err.is_retryable());
        assert_eq!(cart.totals(), before);
        assert_eq!(cart.total_quantity(), 3);

        store.set_failing(false);
        let sale = finalizer.finalize(&mut cart, &cashier()).await.unwrap();
        assert_eq!(sale.totals(), before);
        assert!(cart.is_empty());
        assert_eq!(store.saved().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_timeout_keeps_cart() {
        let (catalog, store) = setup();
        store.set_delay(Some(Duration::from_secs(60)));
        let finalizer = SaleFinalizer::new(
            catalog.clone(),
            Timed::new(store.clone(), Duration::from_secs(5)),
        );
        let mut cart = filled_cart(&catalog).await;

        let err = finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Persistence(PersistenceError::Timeout(_))));
        assert!(err.is_retryable());
        assert_eq!(cart.total_quantity(), 3);
        assert!(store.saved().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_lost_acknowledgement_stores_one_sale() {
        let (catalog, store) = setup();
        store.set_stall_after_commit(Some(Duration::from_secs(60)));
        let finalizer = SaleFinalizer::new(
            catalog.clone(),
            Timed::new(store.clone(), Duration::from_secs(5)),
        );
        let mut cart = filled_cart(&catalog).await;

        let err = finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Persistence(PersistenceError::Timeout(_))));
        assert_eq!(store.saved().len(), 1);
        let pending = cart.pending_checkout().cloned().unwrap();

        store.set_stall_after_commit(None);
        let sale = finalizer.finalize(&mut cart, &cashier()).await.unwrap();

        assert_eq!(sale.id(), &pending.sale_id);
        assert_eq!(sale.created_at(), pending.created_at);
        assert_eq!(store.calls(), 2);
        assert_eq!(store.saved(), vec![sale]);
        assert!(cart.pending_checkout().is_none());
    }

    #[tokio::test]
    async fn test_changed_cart_gets_new_checkout_identity() {
        let (catalog, store) = setup();
        let finalizer = SaleFinalizer::new(catalog.clone(), store.clone());
        let mut cart = filled_cart(&catalog).await;

        store.set_failing(true);
        finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        let first = cart.pending_checkout().cloned().unwrap();

        finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        assert_eq!(cart.pending_checkout(), Some(&first));

        cart.remove_item(&id("B"), 1).unwrap();
        assert!(cart.pending_checkout().is_none());

        store.set_failing(false);
        let sale = finalizer.finalize(&mut cart, &cashier()).await.unwrap();
        assert_ne!(sale.id(), &first.sale_id);
        assert_eq!(sale.subtotal().minor(), 2000);
    }

    #[tokio::test]
    async fn test_catalog_outage_at_checkout_is_retryable() {
        let (catalog, store) = setup();
        let finalizer = SaleFinalizer::new(catalog.clone(), store.clone());
        let mut cart = filled_cart(&catalog).await;

        catalog.set_offline(true);
        let err = finalizer.finalize(&mut cart, &cashier()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::CatalogUnavailable(_)));
        assert!(err.is_retryable());
        assert!(!cart.is_empty());
    }

    #[tokio::test]
    async fn test_each_sale_gets_unique_identity() {
        let (catalog, store) = setup();
        let finalizer = SaleFinalizer::new(catalog.clone(), store.clone());

        let mut cart = filled_cart(&catalog).await;
        let first = finalizer.finalize(&mut cart, &cashier()).await.unwrap();
        let mut cart = filled_cart(&catalog).await;
        let second = finalizer.finalize(&mut cart, &cashier()).await.unwrap();

        assert_ne!(first.id(), second.id());
        assert!(uuid::Uuid::parse_str(first.id().as_str()).is_ok());
    }

    #[test]
    fn test_build_sale_lines_sum_to_totals() {
        let mut cart = Cart::new(Currency::USD);
        cart.add_product(&product("X", 333, 825), 3).unwrap();
        cart.add_product(&product("Y", 1, 1000), 7).unwrap();
        cart.add_product(&product("Z", 250, 0), 2).unwrap();
        cart.apply_discount(Discount::Percent(1500)).unwrap();

        let sale = build_sale(&cart, &cashier(), SaleId::generate(), Utc::now()).unwrap();
        let tax: Money = sale.lines().iter().map(|l| l.tax).sum();
        let discount: Money = sale.lines().iter().map(|l| l.discount).sum();
        assert_eq!(tax, sale.tax_total());
        assert_eq!(discount, sale.discount_total());
        assert_eq!(sale.totals(), cart.totals());
    }
}
