//! # tessera-db
//!
//! PostgreSQL database layer for tessera controlled lists.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for lists, items, values, and image metadata
//! - Reference resolution against stored lists (free text and item IDs)
//! - Transactional bulk reorder/reparent backed by deferred uniqueness
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_db::{Database, ListItemRepository, ListRepository, NewListItem};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/tessera").await?;
//!
//!     let list = db.lists.create("Material", false, false).await?;
//!     let item = db.items.create(NewListItem::new(list.id)).await?;
//!
//!     println!("Created item: {}", item.id);
//!     Ok(())
//! }
//! ```
pub mod items;
pub mod lists;
pub mod pool;
pub mod references;

#[cfg(test)]
mod tests;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use tessera_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// Re-export repository implementations
pub use items::PgListItemRepository;
pub use lists::PgListRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use references::PgReferenceRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// List repository for CRUD, export assembly, and node lookup.
    pub lists: PgListRepository,
    /// Item repository for items, their values, and image metadata.
    pub items: PgListItemRepository,
    /// Reference resolution and validation against stored lists.
    pub references: PgReferenceRepository,
    /// URI configuration for cloning (used by Clone impl to rebuild the
    /// item repository).
    uri_config: UriConfig,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    ///
    /// URI generation settings are read from the environment
    /// (`PUBLIC_SERVER_ADDRESS`, `FORCE_SCRIPT_NAME`); use
    /// [`Database::with_uri_config`] to supply them explicitly.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self::with_uri_config(pool, UriConfig::from_env())
    }

    /// Create a new Database instance with explicit URI configuration.
    pub fn with_uri_config(pool: sqlx::Pool<sqlx::Postgres>, uri_config: UriConfig) -> Self {
        Self {
            lists: PgListRepository::new(pool.clone()),
            items: PgListItemRepository::with_uri_config(pool.clone(), uri_config.clone()),
            references: PgReferenceRepository::new(pool.clone()),
            uri_config,
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Connect to test database (for integration tests).
    #[cfg(test)]
    pub async fn connect_test() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| crate::test_fixtures::DEFAULT_TEST_DATABASE_URL.to_string());
        Self::connect(&database_url).await
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            lists: PgListRepository::new(self.pool.clone()),
            items: PgListItemRepository::with_uri_config(
                self.pool.clone(),
                self.uri_config.clone(),
            ),
            references: PgReferenceRepository::new(self.pool.clone()),
            uri_config: self.uri_config.clone(),
        }
    }
}
