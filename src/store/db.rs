//! Music store database operations
//!
//! Handles all database interactions for the catalog and invoice subagents.

use crate::error::AppError;
use crate::store::models::{AlbumHit, InvoiceLineItem, InvoiceSummary, TrackHit};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

/// Database connection pool for the music store
pub struct StoreDb {
    pool: SqlitePool,
}

impl StoreDb {
    /// Initialize database connection pool and run migrations
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        // Ensure parent directory exists
        if let Some(parent) = PathBuf::from(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create db directory: {}", e))
            })?;
        }

        // SQLite connection string format: sqlite://path/to/db.db
        let connection_string = if db_path.starts_with("sqlite:") {
            db_path.to_string()
        } else {
            format!("sqlite:{}", db_path)
        };

        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid database path: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to connect to database: {}", e))
            })?;

        info!("Connected to SQLite store at: {}", db_path);

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running store migrations...");

        let migration_sql = include_str!("../../migrations/001_create_store.sql");

        // Remove comments (lines starting with --) and normalize whitespace
        let mut cleaned_sql = String::new();
        for line in migration_sql.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("--") {
                continue;
            }
            let without_comments = if let Some(comment_pos) = trimmed.find("--") {
                &trimmed[..comment_pos]
            } else {
                trimmed
            };
            cleaned_sql.push_str(without_comments.trim());
            cleaned_sql.push(' ');
        }

        let statements: Vec<&str> = cleaned_sql
            .split(';')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::Internal(anyhow::anyhow!(
                        "Migration failed: {} - Statement: {}",
                        e,
                        statement.chars().take(100).collect::<String>()
                    ))
                })?;
        }

        info!("Store migrations completed successfully");
        Ok(())
    }

    /// Get all invoices for a customer, most recent first
    pub async fn invoices_for_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<InvoiceSummary>, AppError> {
        let invoices = sqlx::query_as::<_, InvoiceSummary>(
            "SELECT id, invoice_date, billing_city, total FROM invoices \
             WHERE customer_id = ? ORDER BY invoice_date DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to fetch invoices: {}", e)))?;

        debug!(
            customer_id = customer_id,
            count = invoices.len(),
            "Fetched invoices for customer"
        );
        Ok(invoices)
    }

    /// Get the line items of an invoice, joined to track/album/artist names
    pub async fn invoice_line_items(
        &self,
        invoice_id: i64,
    ) -> Result<Vec<InvoiceLineItem>, AppError> {
        let items = sqlx::query_as::<_, InvoiceLineItem>(
            "SELECT t.name AS track, al.title AS album, ar.name AS artist, \
                    il.unit_price, il.quantity \
             FROM invoice_lines il \
             JOIN tracks t ON t.id = il.track_id \
             JOIN albums al ON al.id = t.album_id \
             JOIN artists ar ON ar.id = al.artist_id \
             WHERE il.invoice_id = ? ORDER BY il.id ASC",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to fetch line items: {}", e)))?;

        Ok(items)
    }

    /// Search tracks by track name, album title, or artist name substring
    pub async fn search_tracks(&self, query: &str) -> Result<Vec<TrackHit>, AppError> {
        let pattern = format!("%{}%", query);
        let hits = sqlx::query_as::<_, TrackHit>(
            "SELECT t.name AS track, al.title AS album, ar.name AS artist, \
                    t.genre, t.unit_price \
             FROM tracks t \
             JOIN albums al ON al.id = t.album_id \
             JOIN artists ar ON ar.id = al.artist_id \
             WHERE t.name LIKE ? OR al.title LIKE ? OR ar.name LIKE ? \
             ORDER BY ar.name, al.title, t.id",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to search tracks: {}", e)))?;

        debug!(query = %query, count = hits.len(), "Catalog track search");
        Ok(hits)
    }

    /// List all albums by an artist (name substring match)
    pub async fn albums_by_artist(&self, artist: &str) -> Result<Vec<AlbumHit>, AppError> {
        let pattern = format!("%{}%", artist);
        let albums = sqlx::query_as::<_, AlbumHit>(
            "SELECT al.title AS album, ar.name AS artist \
             FROM albums al \
             JOIN artists ar ON ar.id = al.artist_id \
             WHERE ar.name LIKE ? ORDER BY al.title",
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to fetch albums: {}", e)))?;

        Ok(albums)
    }

    /// Get a customer's saved music preferences, if any
    pub async fn customer_preferences(
        &self,
        customer_id: i64,
    ) -> Result<Option<String>, AppError> {
        let preferences: Option<(Option<String>,)> =
            sqlx::query_as("SELECT favorite_genres FROM customers WHERE id = ?")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("Failed to fetch preferences: {}", e))
                })?;

        Ok(preferences.and_then(|row| row.0))
    }

    /// Check whether a customer exists
    pub async fn customer_exists(&self, customer_id: i64) -> Result<bool, AppError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM customers WHERE id = ?")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to check customer: {}", e)))?;

        Ok(row.is_some())
    }

    /// Get the database pool (for advanced operations if needed)
    #[allow(dead_code)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
