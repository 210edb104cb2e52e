//! User-curated stock baskets: REST handlers over a [`BasketStore`].

pub mod routes;
pub mod store;

pub use store::{Basket, BasketStore, SqliteBasketStore, StockEntry, StoreError};
