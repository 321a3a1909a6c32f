//! # Gateways
//!
//! The two collaborators the core talks to, and the timeout wrapper that
//! bounds every call to them.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Cart::add_item ─────┐                  ┌──── SaleFinalizer::finalize  │
//! │   SaleFinalizer ──────┤                  │                              │
//! │     (re-check)        ▼                  ▼                              │
//! │              Timed<CatalogLookup>   Timed<SaleStore>                    │
//! │                       │                  │     tokio::time::timeout     │
//! │                       ▼                  ▼                              │
//! │              tally-db Database    tally-db Database                     │
//! │              (or a test fake)     (or a test fake)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! These calls are the only suspension points in the core.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::{CatalogError, PersistenceError};
use crate::types::{Product, ProductId, Sale};

// =============================================================================
// Traits
// =============================================================================

/// Authoritative source of product price, tax rate and availability.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Returns the product as the catalog knows it now, or `None` if there is
    /// no such product.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError>;
}

/// Durable storage for completed sales.
///
/// Implementations must write the sale and all of its lines atomically:
/// either everything is stored or nothing is.
///
/// A retried checkout resubmits the same sale id. Saving a sale that is
/// already stored must succeed without storing it a second time.
#[async_trait]
pub trait SaleStore: Send + Sync {
    async fn save_sale(&self, sale: &Sale) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<T: CatalogLookup + ?Sized> CatalogLookup for Arc<T> {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        (**self).get_product(id).await
    }
}

#[async_trait]
impl<T: SaleStore + ?Sized> SaleStore for Arc<T> {
    async fn save_sale(&self, sale: &Sale) -> Result<(), PersistenceError> {
        (**self).save_sale(sale).await
    }
}

// =============================================================================
// Timeout Decorator
// =============================================================================

/// Bounds every call on the wrapped collaborator by `limit`.
///
/// An elapsed call surfaces as `CatalogError::Timeout` or
/// `PersistenceError::Timeout`, both of which are retryable.
#[derive(Debug, Clone)]
pub struct Timed<T> {
    inner: T,
    limit: Duration,
}

impl<T> Timed<T> {
    pub fn new(inner: T, limit: Duration) -> Self {
        Timed { inner, limit }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl<T: CatalogLookup> CatalogLookup for Timed<T> {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        match tokio::time::timeout(self.limit, self.inner.get_product(id)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(product_id = %id, limit_ms = self.limit.as_millis() as u64, "Catalog lookup timed out");
                Err(CatalogError::Timeout(self.limit))
            }
        }
    }
}

#[async_trait]
impl<T: SaleStore> SaleStore for Timed<T> {
    async fn save_sale(&self, sale: &Sale) -> Result<(), PersistenceError> {
        match tokio::time::timeout(self.limit, self.inner.save_sale(sale)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(sale_id = %sale.id(), limit_ms = self.limit.as_millis() as u64, "Saving sale timed out");
                Err(PersistenceError::Timeout(self.limit))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
