//! Durable baseline storage
//!
//! Key-value collaborator of the calibration store: one baseline document
//! per person identifier.
//!
//! - [`JsonFileRepository`]: `<dir>/<person_id>_baseline.json`
//! - [`SqliteRepository`]: `baselines` table, document stored as JSON text

use super::Baseline;
use crate::error::StorageError;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Persistence for per-person baselines
#[async_trait]
pub trait BaselineRepository: Send + Sync {
    /// Insert or replace the document for `baseline.person_id`
    async fn save(&self, baseline: &Baseline) -> Result<(), StorageError>;

    /// Fetch the document for `person_id`, `None` if absent
    async fn load(&self, person_id: &str) -> Result<Option<Baseline>, StorageError>;

    /// Delete the document for `person_id`; returns whether one existed
    async fn remove(&self, person_id: &str) -> Result<bool, StorageError>;
}

/// Reject identifiers that cannot safely be used as a storage key / file name
pub fn validate_person_id(person_id: &str) -> Result<(), StorageError> {
    let invalid = person_id.trim().is_empty()
        || person_id.contains(['/', '\\', '\0'])
        || person_id.contains("..");
    if invalid {
        return Err(StorageError::InvalidPersonId(person_id.to_string()));
    }
    Ok(())
}

// ============================================================================
// JSON files
// ============================================================================

/// One JSON document per person in a directory
pub struct JsonFileRepository {
    dir: PathBuf,
}

impl JsonFileRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Document path for `person_id`
    pub fn document_path(&self, person_id: &str) -> PathBuf {
        self.dir.join(format!("{}_baseline.json", person_id))
    }
}

#[async_trait]
impl BaselineRepository for JsonFileRepository {
    async fn save(&self, baseline: &Baseline) -> Result<(), StorageError> {
        validate_person_id(&baseline.person_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.document_path(&baseline.person_id);
        let content = serde_json::to_string_pretty(baseline)?;

        // Write-then-rename so readers never observe a partial document
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(e));
        }

        debug!(person_id = %baseline.person_id, path = %path.display(), "Baseline document written");
        Ok(())
    }

    async fn load(&self, person_id: &str) -> Result<Option<Baseline>, StorageError> {
        validate_person_id(person_id)?;
        let path = self.document_path(person_id);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn remove(&self, person_id: &str) -> Result<bool, StorageError> {
        validate_person_id(person_id)?;
        match tokio::fs::remove_file(self.document_path(person_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// Baselines stored in a SQLite table
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `db_path` and ensure the table exists
    pub async fn connect(db_path: &Path) -> Result<Self, StorageError> {
        let newly_created = !db_path.exists();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        Self::from_pool(pool).await
    }

    /// Use an existing pool (e.g. in-memory for tests)
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        create_baselines_table(&pool).await?;
        Ok(Self { pool })
    }
}

/// Create the baselines table
async fn create_baselines_table(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS baselines (
            person_id TEXT PRIMARY KEY,
            document TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl BaselineRepository for SqliteRepository {
    async fn save(&self, baseline: &Baseline) -> Result<(), StorageError> {
        validate_person_id(&baseline.person_id)?;
        let document = serde_json::to_string(baseline)?;

        sqlx::query(
            "INSERT INTO baselines (person_id, document) VALUES (?, ?)
             ON CONFLICT(person_id) DO UPDATE SET
                document = excluded.document,
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&baseline.person_id)
        .bind(document)
        .execute(&self.pool)
        .await?;

        debug!(person_id = %baseline.person_id, "Baseline row written");
        Ok(())
    }

    async fn load(&self, person_id: &str) -> Result<Option<Baseline>, StorageError> {
        validate_person_id(person_id)?;
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM baselines WHERE person_id = ?")
                .bind(person_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((document,)) => Ok(Some(serde_json::from_str(&document)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, person_id: &str) -> Result<bool, StorageError> {
        validate_person_id(person_id)?;
        let result = sqlx::query("DELETE FROM baselines WHERE person_id = ?")
            .bind(person_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
