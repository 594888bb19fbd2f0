use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "difficult" => Some(Difficulty::Difficult),
            _ => None,
        }
    }
}

fn rfc3339_list<S: Serializer>(dates: &[OffsetDateTime], s: S) -> Result<S::Ok, S::Error> {
    let formatted = dates
        .iter()
        .map(|d| d.format(&Rfc3339))
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::ser::Error::custom)?;
    formatted.serialize(s)
}

/// Tour length in weeks, as shown to clients next to `duration` (days).
pub fn duration_weeks(duration_days: i32) -> f64 {
    f64::from(duration_days) / 7.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    /// Derived from `duration`; not stored.
    pub duration_weeks: f64,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    #[serde(serialize_with = "rfc3339_list")]
    pub start_dates: Vec<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub secret_tour: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct TourRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<OffsetDateTime>,
    pub secret_tour: bool,
    pub created_at: OffsetDateTime,
}

impl TryFrom<TourRow> for Tour {
    type Error = anyhow::Error;

    fn try_from(r: TourRow) -> Result<Self, Self::Error> {
        let difficulty = Difficulty::parse(&r.difficulty)
            .ok_or_else(|| anyhow::anyhow!("unknown difficulty {:?}", r.difficulty))?;
        Ok(Self {
            id: r.id,
            name: r.name,
            slug: r.slug,
            duration: r.duration,
            duration_weeks: duration_weeks(r.duration),
            max_group_size: r.max_group_size,
            difficulty,
            ratings_average: r.ratings_average,
            ratings_quantity: r.ratings_quantity,
            price: r.price,
            price_discount: r.price_discount,
            summary: r.summary,
            description: r.description,
            image_cover: r.image_cover,
            images: r.images,
            start_dates: r.start_dates,
            secret_tour: r.secret_tour,
            created_at: r.created_at,
        })
    }
}

/// A validated tour ready to be written. Slug is derived, never client-supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTour {
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<OffsetDateTime>,
    pub secret_tour: bool,
}
