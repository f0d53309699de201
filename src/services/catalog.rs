use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogEntry, CatalogInput, CatalogKind, Pagination, UploadedFile},
    services::storage::{self, FileStorage},
};

const COLUMNS: &str = "id, title, description, icon, created_at, last_updated";

/// Property categories and amenities, selected by [`CatalogKind`]
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    kind: CatalogKind,
}

impl Catalog {
    pub const fn new(kind: CatalogKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub async fn list(&self, db: &PgPool, page: Pagination) -> AppResult<Vec<CatalogEntry>> {
        let page = page.normalized();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id OFFSET $1 LIMIT $2",
            COLUMNS,
            self.kind.table()
        );

        let entries = sqlx::query_as::<_, CatalogEntry>(&sql)
            .bind(page.skip)
            .bind(page.limit)
            .fetch_all(db)
            .await?;
        Ok(entries)
    }

    pub async fn get(&self, db: &PgPool, id: i32) -> AppResult<CatalogEntry> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", COLUMNS, self.kind.table());

        sqlx::query_as::<_, CatalogEntry>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound(self.kind.not_found_message()))
    }

    /// Titles are unique case-insensitively; `exclude` skips the entry being updated
    async fn ensure_title_free(
        &self,
        db: &PgPool,
        title: &str,
        exclude: Option<i32>,
    ) -> AppResult<()> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} \
             WHERE lower(title) = lower($1) AND ($2::INTEGER IS NULL OR id <> $2))",
            self.kind.table()
        );

        let taken: bool = sqlx::query_scalar(&sql)
            .bind(title)
            .bind(exclude)
            .fetch_one(db)
            .await?;

        if taken {
            return Err(AppError::Conflict(self.kind.duplicate_message()));
        }
        Ok(())
    }

    pub async fn create(
        &self,
        db: &PgPool,
        file_storage: &dyn FileStorage,
        input: CatalogInput,
        icon: Option<UploadedFile>,
    ) -> AppResult<CatalogEntry> {
        self.ensure_title_free(db, &input.title, None).await?;

        let icon_url = self.store_icon(file_storage, icon).await?;

        let sql = format!(
            "INSERT INTO {} (title, description, icon) VALUES ($1, $2, $3) RETURNING {}",
            self.kind.table(),
            COLUMNS
        );

        let inserted = sqlx::query_as::<_, CatalogEntry>(&sql)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&icon_url)
            .fetch_one(db)
            .await;

        let entry = match inserted {
            Ok(entry) => entry,
            Err(e) => {
                storage::discard(file_storage, icon_url.as_slice()).await;
                return Err(e.into());
            }
        };

        tracing::info!(kind = self.kind.label(), id = entry.id, "Catalog entry created");
        Ok(entry)
    }

    /// Replaces title and description; the icon changes only when a new one is sent
    pub async fn update(
        &self,
        db: &PgPool,
        file_storage: &dyn FileStorage,
        id: i32,
        input: CatalogInput,
        icon: Option<UploadedFile>,
    ) -> AppResult<CatalogEntry> {
        let current = self.get(db, id).await?;
        self.ensure_title_free(db, &input.title, Some(id)).await?;

        let icon_url = self.store_icon(file_storage, icon).await?;

        let sql = format!(
            "UPDATE {} SET title = $1, description = $2, icon = COALESCE($3, icon), \
             last_updated = now() WHERE id = $4 RETURNING {}",
            self.kind.table(),
            COLUMNS
        );

        let updated = sqlx::query_as::<_, CatalogEntry>(&sql)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&icon_url)
            .bind(id)
            .fetch_one(db)
            .await;

        let entry = match updated {
            Ok(entry) => entry,
            Err(e) => {
                storage::discard(file_storage, icon_url.as_slice()).await;
                return Err(e.into());
            }
        };

        if icon_url.is_some() {
            storage::discard(file_storage, current.icon.as_slice()).await;
        }

        tracing::info!(kind = self.kind.label(), id = id, "Catalog entry updated");
        Ok(entry)
    }

    async fn store_icon(
        &self,
        file_storage: &dyn FileStorage,
        icon: Option<UploadedFile>,
    ) -> AppResult<Option<String>> {
        match icon {
            Some(file) => Ok(Some(
                storage::store(file_storage, self.kind.icon_folder(), file).await?,
            )),
            None => Ok(None),
        }
    }

    /// Deletes an entry; categories still referenced by listings are kept
    pub async fn delete(
        &self,
        db: &PgPool,
        file_storage: &dyn FileStorage,
        id: i32,
    ) -> AppResult<CatalogEntry> {
        let entry = self.get(db, id).await?;

        if self.kind == CatalogKind::Category {
            let in_use: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM properties WHERE property_category_id = $1)",
            )
            .bind(id)
            .fetch_one(db)
            .await?;

            if in_use {
                return Err(AppError::Conflict(format!(
                    "The {} is still used by some properties",
                    self.kind.label()
                )));
            }
        }

        let sql = format!("DELETE FROM {} WHERE id = $1", self.kind.table());
        sqlx::query(&sql).bind(id).execute(db).await?;

        storage::discard(file_storage, entry.icon.as_slice()).await;

        tracing::info!(kind = self.kind.label(), id = id, "Catalog entry deleted");
        Ok(entry)
    }
}

pub const CATEGORIES: Catalog = Catalog::new(CatalogKind::Category);
pub const AMENITIES: Catalog = Catalog::new(CatalogKind::Amenity);
