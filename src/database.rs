//! # Database Source
//!
//! Sorgente di target per `resizer-db`: righe `(id, blob)` di una tabella
//! PostgreSQL.
//!
//! ## DSN:
//! `psql:<connection>:<table>:<column>`. Tabella e colonna sono gli ultimi
//! due campi, quindi anche una connection string in forma URL
//! (`postgres://user@host/db`) funziona.
//!
//! ## Transazioni:
//! Ogni riga viene aggiornata nella propria transazione, committata subito
//! (o annullata in dry-run). Non esiste una transazione di batch: un crash
//! a metà lascia le righe precedenti già aggiornate.

use crate::error::MagoError;
use std::collections::BTreeMap;
use std::str::FromStr;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

/// Parsed `psql:` data-source descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    pub connection: String,
    pub table: String,
    pub column: String,
}

impl FromStr for Dsn {
    type Err = MagoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("psql:")
            .ok_or_else(|| MagoError::config(format!("unsupported database source: {}", s)))?;

        let mut fields = rest.rsplitn(3, ':');
        let column = fields.next().unwrap_or_default();
        let table = fields.next().unwrap_or_default();
        let connection = fields.next().unwrap_or_default();

        if connection.is_empty() || table.is_empty() || column.is_empty() {
            return Err(MagoError::config(format!(
                "invalid dsn '{}', expected psql:<connection>:<table>:<column>",
                s
            )));
        }

        Ok(Self {
            connection: connection.to_string(),
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Rows of image blobs keyed by integer id
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Ids to process, in query order, optionally restricted to one row
    async fn row_ids(&mut self, only: Option<i64>) -> Result<Vec<i64>, MagoError>;

    /// Blob of one row, `None` when NULL
    async fn fetch(&mut self, id: i64) -> Result<Option<Vec<u8>>, MagoError>;

    /// Replace a row's blob; `commit = false` rolls the update back
    async fn update(&mut self, id: i64, blob: &[u8], commit: bool) -> Result<(), MagoError>;
}

/// PostgreSQL-backed store
pub struct PgBlobStore {
    client: Client,
    table: String,
    column: String,
}

impl PgBlobStore {
    /// Open the single connection used for the whole batch
    pub async fn connect(dsn: &Dsn) -> Result<Self, MagoError> {
        let (client, connection) = tokio_postgres::connect(&dsn.connection, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Database connection error: {}", e);
            }
        });

        debug!("Connected, using {}.{}", dsn.table, dsn.column);
        Ok(Self {
            client,
            table: quote_ident(&dsn.table),
            column: quote_ident(&dsn.column),
        })
    }
}

impl BlobStore for PgBlobStore {
    async fn row_ids(&mut self, only: Option<i64>) -> Result<Vec<i64>, MagoError> {
        let rows = match only {
            Some(id) => {
                let query = format!("select id::bigint from {} where id = $1::bigint", self.table);
                self.client.query(&query, &[&id]).await?
            }
            None => {
                let query = format!("select id::bigint from {} order by id", self.table);
                self.client.query(&query, &[]).await?
            }
        };
        Ok(rows.iter().map(|row| row.get::<_, i64>(0)).collect())
    }

    async fn fetch(&mut self, id: i64) -> Result<Option<Vec<u8>>, MagoError> {
        let query = format!("select {} from {} where id = $1::bigint", self.column, self.table);
        let row = self.client.query_opt(&query, &[&id]).await?;
        match row {
            Some(row) => Ok(row.try_get::<_, Option<Vec<u8>>>(0)?),
            None => Ok(None),
        }
    }

    async fn update(&mut self, id: i64, blob: &[u8], commit: bool) -> Result<(), MagoError> {
        let query = format!("update {} set {} = $1 where id = $2::bigint", self.table, self.column);
        let transaction = self.client.transaction().await?;
        transaction.execute(&query, &[&blob, &id]).await?;
        if commit {
            transaction.commit().await?;
        } else {
            transaction.rollback().await?;
        }
        Ok(())
    }
}

/// In-memory store, handy for exercising the runner without a server
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    pub rows: BTreeMap<i64, Option<Vec<u8>>>,
    /// Number of committed updates
    pub commits: usize,
    /// Number of rolled back updates
    pub rollbacks: usize,
}

impl MemoryBlobStore {
    pub fn new(rows: impl IntoIterator<Item = (i64, Option<Vec<u8>>)>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            ..Default::default()
        }
    }
}

impl BlobStore for MemoryBlobStore {
    async fn row_ids(&mut self, only: Option<i64>) -> Result<Vec<i64>, MagoError> {
        Ok(self
            .rows
            .keys()
            .copied()
            .filter(|id| only.map_or(true, |only| only == *id))
            .collect())
    }

    async fn fetch(&mut self, id: i64) -> Result<Option<Vec<u8>>, MagoError> {
        Ok(self.rows.get(&id).cloned().flatten())
    }

    async fn update(&mut self, id: i64, blob: &[u8], commit: bool) -> Result<(), MagoError> {
        if commit {
            self.rows.insert(id, Some(blob.to_vec()));
            self.commits += 1;
        } else {
            self.rollbacks += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsn_parsing() {
        let dsn: Dsn = "psql:dbname=shop user=app:products:thumbnail".parse().unwrap();
        assert_eq!(dsn.connection, "dbname=shop user=app");
        assert_eq!(dsn.table, "products");
        assert_eq!(dsn.column, "thumbnail");
    }

    #[test]
    fn test_dsn_with_url_connection() {
        let dsn: Dsn = "psql:postgres://app@localhost:5432/shop:products:image".parse().unwrap();
        assert_eq!(dsn.connection, "postgres://app@localhost:5432/shop");
        assert_eq!(dsn.table, "products");
        assert_eq!(dsn.column, "image");
    }

    #[test]
    fn test_dsn_rejects_incomplete() {
        assert!("psql:products:image".parse::<Dsn>().is_err());
        assert!("mysql:db:t:c".parse::<Dsn>().is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("photos"), "\"photos\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn test_memory_store_rollback_keeps_blob() {
        let mut store = MemoryBlobStore::new([(1, Some(vec![1, 2, 3])), (2, None)]);
        assert_eq!(store.row_ids(None).await.unwrap(), vec![1, 2]);
        assert_eq!(store.row_ids(Some(2)).await.unwrap(), vec![2]);

        store.update(1, &[9], false).await.unwrap();
        assert_eq!(store.fetch(1).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.rollbacks, 1);

        store.update(1, &[9], true).await.unwrap();
        assert_eq!(store.fetch(1).await.unwrap(), Some(vec![9]));
        assert_eq!(store.fetch(2).await.unwrap(), None);
    }
}
