//! Basket persistence.
//!
//! Baskets are never removed: deleting one clears its `active` flag.
//! Stock entries are stored as a JSON column.

use async_trait::async_trait;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DbPool;

/// One holding inside a basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub symbol: String,
    pub shares: f64,
    pub price: f64,
}

/// A user-curated list of stocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    pub basket_id: String,
    pub user_email: String,
    pub name: String,
    pub stocks: Vec<StockEntry>,
    /// RFC 3339 creation time.
    pub created_at: String,
    pub active: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stock list encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("database lock poisoned")]
    Lock,
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait BasketStore: Send + Sync {
    async fn insert(&self, basket: Basket) -> Result<(), StoreError>;

    /// Every basket owned by `user_email`, active or not.
    async fn list_by_owner(&self, user_email: &str) -> Result<Vec<Basket>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Basket>, StoreError>;

    /// Clear the `active` flag. Returns whether a basket with that id exists.
    async fn deactivate(&self, basket_id: &str) -> Result<bool, StoreError>;
}

/// [`BasketStore`] backed by the SQLite database.
#[derive(Clone)]
pub struct SqliteBasketStore {
    db: DbPool,
}

impl SqliteBasketStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::Lock)?;
            f(&conn)
        })
        .await?
    }
}

const SELECT_COLUMNS: &str =
    "SELECT basket_id, user_email, name, stocks, created_at, active FROM baskets";

fn basket_from_row(row: &Row<'_>) -> rusqlite::Result<(Basket, String)> {
    // Stocks are decoded outside the row mapper so JSON errors keep their type.
    let stocks: String = row.get(3)?;
    Ok((
        Basket {
            basket_id: row.get(0)?,
            user_email: row.get(1)?,
            name: row.get(2)?,
            stocks: Vec::new(),
            created_at: row.get(4)?,
            active: row.get(5)?,
        },
        stocks,
    ))
}

fn collect_baskets(
    rows: impl Iterator<Item = rusqlite::Result<(Basket, String)>>,
) -> Result<Vec<Basket>, StoreError> {
    rows.map(|row| {
        let (mut basket, stocks) = row?;
        basket.stocks = serde_json::from_str(&stocks)?;
        Ok(basket)
    })
    .collect()
}

#[async_trait]
impl BasketStore for SqliteBasketStore {
    async fn insert(&self, basket: Basket) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let stocks = serde_json::to_string(&basket.stocks)?;
            conn.execute(
                "INSERT INTO baskets (basket_id, user_email, name, stocks, created_at, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    basket.basket_id,
                    basket.user_email,
                    basket.name,
                    stocks,
                    basket.created_at,
                    basket.active
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_by_owner(&self, user_email: &str) -> Result<Vec<Basket>, StoreError> {
        let user_email = user_email.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE user_email = ?1 ORDER BY created_at ASC",
                SELECT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![user_email], basket_from_row)?;
            collect_baskets(rows)
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<Basket>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY created_at ASC", SELECT_COLUMNS))?;
            let rows = stmt.query_map([], basket_from_row)?;
            collect_baskets(rows)
        })
        .await
    }

    async fn deactivate(&self, basket_id: &str) -> Result<bool, StoreError> {
        let basket_id = basket_id.to_string();
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE baskets SET active = 0 WHERE basket_id = ?1",
                params![basket_id],
            )?;
            Ok(updated > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;

    fn basket(id: &str, owner: &str, created_at: &str) -> Basket {
        Basket {
            basket_id: id.to_string(),
            user_email: owner.to_string(),
            name: format!("basket {}", id),
            stocks: vec![StockEntry {
                symbol: "AAPL".into(),
                shares: 2.0,
                price: 189.5,
            }],
            created_at: created_at.to_string(),
            active: true,
        }
    }

    fn store() -> SqliteBasketStore {
        SqliteBasketStore::new(init_memory_db().unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_list_by_owner() {
        let store = store();
        store
            .insert(basket("1", "alice@example.com", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        store
            .insert(basket("2", "bob@example.com", "2025-01-02T00:00:00Z"))
            .await
            .unwrap();
        store
            .insert(basket("3", "alice@example.com", "2025-01-03T00:00:00Z"))
            .await
            .unwrap();

        let alice = store.list_by_owner("alice@example.com").await.unwrap();
        let ids: Vec<_> = alice.iter().map(|b| b.basket_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(alice[0].stocks, basket("1", "", "").stocks);

        assert_eq!(store.list_all().await.unwrap().len(), 3);
        assert!(store.list_by_owner("nobody@example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_keeps_record() {
        let store = store();
        store
            .insert(basket("1", "alice@example.com", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert!(store.deactivate("1").await.unwrap());

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].active);
    }

    #[tokio::test]
    async fn test_deactivate_unknown_id() {
        let store = store();
        assert!(!store.deactivate("missing").await.unwrap());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = store();
        let b = basket("1", "alice@example.com", "2025-01-01T00:00:00Z");
        store.insert(b.clone()).await.unwrap();
        assert!(matches!(store.insert(b).await, Err(StoreError::Sqlite(_))));
    }
}
