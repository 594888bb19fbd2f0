use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    query::{sql, QueryDescriptor},
    tours::repo_types::{NewTour, Tour, TourRow},
};

#[async_trait]
pub trait TourRepo: Send + Sync {
    /// Public tours matching the descriptor, plus the total match count.
    /// Secret tours never appear here.
    async fn list(&self, scope: &QueryDescriptor) -> AppResult<(Vec<Tour>, u64)>;

    /// Any tour, secret or not.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Tour>>;

    /// Fails with `AppError::Conflict` when the name is taken.
    async fn insert(&self, tour: NewTour, created_at: OffsetDateTime) -> AppResult<Tour>;

    async fn update(&self, id: Uuid, tour: NewTour) -> AppResult<Option<Tour>>;

    /// `false` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

const TOUR_COLUMNS: &str = "id, name, slug, duration, max_group_size, difficulty, ratings_average, \
                            ratings_quantity, price, price_discount, summary, description, \
                            image_cover, images, start_dates, secret_tour, created_at";

const PUBLIC_ONLY: &str = "secret_tour = FALSE";

#[derive(Clone)]
pub struct PgTourRepo {
    db: PgPool,
}

impl PgTourRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn name_taken(e: sqlx::Error, what: &'static str) -> AppError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("A tour with this name already exists".into())
        }
        other => AppError::Internal(anyhow::Error::new(other).context(what)),
    }
}

#[async_trait]
impl TourRepo for PgTourRepo {
    async fn list(&self, scope: &QueryDescriptor) -> AppResult<(Vec<Tour>, u64)> {
        let mut page = sql::select_page(&format!("SELECT {TOUR_COLUMNS} FROM tours"), PUBLIC_ONLY, scope);
        let rows = page
            .build_query_as::<TourRow>()
            .fetch_all(&self.db)
            .await
            .context("list tours")?;
        let mut count = sql::count("tours", PUBLIC_ONLY, scope);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .context("count tours")?;

        let tours = rows
            .into_iter()
            .map(Tour::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((tours, total as u64))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Tour>> {
        let row = sqlx::query_as::<_, TourRow>(&format!("SELECT {TOUR_COLUMNS} FROM tours WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find tour")?;
        Ok(row.map(Tour::try_from).transpose()?)
    }

    async fn insert(&self, t: NewTour, created_at: OffsetDateTime) -> AppResult<Tour> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            r#"
            INSERT INTO tours (name, slug, duration, max_group_size, difficulty, ratings_average,
                               ratings_quantity, price, price_discount, summary, description,
                               image_cover, images, start_dates, secret_tour, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {TOUR_COLUMNS}
            "#
        ))
        .bind(&t.name)
        .bind(&t.slug)
        .bind(t.duration)
        .bind(t.max_group_size)
        .bind(t.difficulty.as_str())
        .bind(t.ratings_average)
        .bind(t.ratings_quantity)
        .bind(t.price)
        .bind(t.price_discount)
        .bind(&t.summary)
        .bind(&t.description)
        .bind(&t.image_cover)
        .bind(&t.images)
        .bind(&t.start_dates)
        .bind(t.secret_tour)
        .bind(created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| name_taken(e, "insert tour"))?;
        Ok(Tour::try_from(row)?)
    }

    async fn update(&self, id: Uuid, t: NewTour) -> AppResult<Option<Tour>> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            r#"
            UPDATE tours SET name = $2, slug = $3, duration = $4, max_group_size = $5,
                             difficulty = $6, ratings_average = $7, ratings_quantity = $8,
                             price = $9, price_discount = $10, summary = $11, description = $12,
                             image_cover = $13, images = $14, start_dates = $15, secret_tour = $16
            WHERE id = $1
            RETURNING {TOUR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&t.name)
        .bind(&t.slug)
        .bind(t.duration)
        .bind(t.max_group_size)
        .bind(t.difficulty.as_str())
        .bind(t.ratings_average)
        .bind(t.ratings_quantity)
        .bind(t.price)
        .bind(t.price_discount)
        .bind(&t.summary)
        .bind(&t.description)
        .bind(&t.image_cover)
        .bind(&t.images)
        .bind(&t.start_dates)
        .bind(t.secret_tour)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| name_taken(e, "update tour"))?;
        Ok(row.map(Tour::try_from).transpose()?)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let done = sqlx::query("DELETE FROM tours WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete tour")?;
        Ok(done.rows_affected() > 0)
    }
}
