//! In-memory collaborators for core tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{CatalogError, PersistenceError};
use crate::gateway::{CatalogLookup, SaleStore};
use crate::money::Money;
use crate::types::{Product, ProductId, Sale, TaxRate};

/// An active USD product whose id doubles as its SKU.
pub fn product(id: &str, unit_price: i64, tax_bps: u32) -> Product {
    Product {
        id: ProductId::from(id),
        sku: id.to_string(),
        name: format!("Product {}", id),
        category_id: None,
        unit_price: Money::from_minor(unit_price),
        tax_rate: TaxRate::from_bps(tax_bps),
        currency_code: "USD".to_string(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    products: Mutex<HashMap<ProductId, Product>>,
    lookups: AtomicUsize,
    offline: AtomicBool,
}

impl InMemoryCatalog {
    pub fn with(products: Vec<Product>) -> Self {
        let catalog = InMemoryCatalog::default();
        for p in products {
            catalog.insert(p);
        }
        catalog
    }

    pub fn insert(&self, product: Product) {
        self.products.lock().unwrap().insert(product.id.clone(), product);
    }

    pub fn remove(&self, id: &str) {
        self.products.lock().unwrap().remove(&ProductId::from(id));
    }

    pub fn set_price(&self, id: &str, unit_price: i64) {
        self.update(id, |p| p.unit_price = Money::from_minor(unit_price));
    }

    pub fn set_tax_rate(&self, id: &str, bps: u32) {
        self.update(id, |p| p.tax_rate = TaxRate::from_bps(bps));
    }

    pub fn deactivate(&self, id: &str) {
        self.update(id, |p| p.is_active = false);
    }

    /// Makes every lookup fail with a backend error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut Product)) {
        if let Some(p) = self.products.lock().unwrap().get_mut(&ProductId::from(id)) {
            f(p);
        }
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(CatalogError::Backend("catalog offline".to_string()));
        }
        Ok(self.products.lock().unwrap().get(id).cloned())
    }
}

/// A catalog that answers only after `delay`.
pub struct SlowCatalog {
    delay: Duration,
    inner: InMemoryCatalog,
}

impl SlowCatalog {
    pub fn new(delay: Duration, products: Vec<Product>) -> Self {
        SlowCatalog {
            delay,
            inner: InMemoryCatalog::with(products),
        }
    }
}

#[async_trait]
impl CatalogLookup for SlowCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_product(id).await
    }
}

/// Keeps every saved sale; can be told to fail or to stall.
#[derive(Default)]
pub struct RecordingStore {
    saved: Mutex<Vec<Sale>>,
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    stall_after_commit: Mutex<Option<Duration>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        RecordingStore::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Stores the sale, then hangs before acknowledging.
    pub fn set_stall_after_commit(&self, stall: Option<Duration>) {
        *self.stall_after_commit.lock().unwrap() = stall;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Vec<Sale> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SaleStore for RecordingStore {
    async fn save_sale(&self, sale: &Sale) -> Result<(), PersistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError::Transaction("disk full".to_string()));
        }
        {
            let mut saved = self.saved.lock().unwrap();
            if !saved.iter().any(|s| s.id() == sale.id()) {
                saved.push(sale.clone());
            }
        }
        let stall = *self.stall_after_commit.lock().unwrap();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        Ok(())
    }
}
