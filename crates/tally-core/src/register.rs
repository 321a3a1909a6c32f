//! # Register
//!
//! One method per operator action, no UI toolkit in sight. A front end (the
//! terminal app, a GUI, a test) maps its events onto these calls and renders
//! whatever comes back.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Register                                                               │
//! │  ├── cart: Cart                       (one per session)                │
//! │  ├── cashier_id                                                        │
//! │  └── finalizer: SaleFinalizer                                          │
//! │        ├── Timed<CatalogLookup>       catalog_timeout                  │
//! │        └── Timed<SaleStore>           persistence_timeout              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use crate::cart::Cart;
use crate::error::CheckoutResult;
use crate::finalize::SaleFinalizer;
use crate::gateway::{CatalogLookup, SaleStore, Timed};
use crate::money::Currency;
use crate::types::{CashierId, Discount, ProductId, Sale, Totals};

/// Upper bounds for the two external calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub catalog: Duration,
    pub persistence: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            catalog: Duration::from_secs(2),
            persistence: Duration::from_secs(5),
        }
    }
}

/// A cashier's session at the till.
pub struct Register<C, S> {
    cart: Cart,
    cashier_id: CashierId,
    finalizer: SaleFinalizer<Timed<C>, Timed<S>>,
}

impl<C, S> Register<C, S>
where
    C: CatalogLookup,
    S: SaleStore,
{
    pub fn new(catalog: C, store: S, cashier_id: CashierId, currency: Currency, timeouts: Timeouts) -> Self {
        Register {
            cart: Cart::new(currency),
            cashier_id,
            finalizer: SaleFinalizer::new(
                Timed::new(catalog, timeouts.catalog),
                Timed::new(store, timeouts.persistence),
            ),
        }
    }

    pub async fn add_item(&mut self, product_id: &ProductId, quantity: i64) -> CheckoutResult<Totals> {
        self.cart
            .add_item(self.finalizer.catalog(), product_id, quantity)
            .await?;
        Ok(self.cart.totals())
    }

    pub fn remove_item(&mut self, product_id: &ProductId, quantity: i64) -> CheckoutResult<Totals> {
        self.cart.remove_item(product_id, quantity)?;
        Ok(self.cart.totals())
    }

    pub fn apply_discount(&mut self, discount: Discount) -> CheckoutResult<Totals> {
        self.cart.apply_discount(discount)?;
        Ok(self.cart.totals())
    }

    pub fn clear_discount(&mut self) -> Totals {
        self.cart.clear_discount();
        self.cart.totals()
    }

    pub fn totals(&self) -> Totals {
        self.cart.totals()
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cashier_id(&self) -> &CashierId {
        &self.cashier_id
    }

    /// Finalizes the current cart. On error the cart is unchanged.
    pub async fn checkout(&mut self) -> CheckoutResult<Sale> {
        self.finalizer.finalize(&mut self.cart, &self.cashier_id).await
    }

    /// Abandons the current transaction.
    pub fn cancel(&mut self) {
        self.cart.clear();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
