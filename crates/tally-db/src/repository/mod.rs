//! # Repository Module
//!
//! One repository per table group, each holding a clone of the pool.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Register session                                                       │
//! │       │                                                                 │
//! │       │  db.products().get_by_id(&id)      (scan / re-validate)        │
//! │       │  db.sales().save_sale(&sale)       (checkout)                  │
//! │       ▼                                                                 │
//! │  ProductRepository    get_by_id, get_by_sku, search, insert, update    │
//! │  CategoryRepository   insert, get_by_id, list_active                   │
//! │  CashierRepository    insert, get_by_id                                │
//! │  SaleRepository       save_sale, get_by_id, list_recent, count         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cashier;
pub mod category;
pub mod product;
pub mod sale;
