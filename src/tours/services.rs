use std::collections::HashMap;

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    error::{AppError, AppResult},
    query::{Direction, FieldKind, FieldSpec, QueryScope},
    tours::{
        dto::TourDraft,
        repo_types::{NewTour, Tour},
    },
};

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("name", "name", FieldKind::Text),
    FieldSpec::new("slug", "slug", FieldKind::Text),
    FieldSpec::new("duration", "duration", FieldKind::Number),
    FieldSpec::new("maxGroupSize", "max_group_size", FieldKind::Number),
    FieldSpec::new("difficulty", "difficulty", FieldKind::Text),
    FieldSpec::new("ratingsAverage", "ratings_average", FieldKind::Number),
    FieldSpec::new("ratingsQuantity", "ratings_quantity", FieldKind::Number),
    FieldSpec::new("price", "price", FieldKind::Number),
    FieldSpec::new("priceDiscount", "price_discount", FieldKind::Number),
    FieldSpec::new("summary", "summary", FieldKind::Text),
    FieldSpec::new("description", "description", FieldKind::Text),
    FieldSpec::new("imageCover", "image_cover", FieldKind::Text),
    FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp),
];

pub const TOUR_SCOPE: QueryScope = QueryScope::new(
    FIELDS,
    FieldSpec::new("id", "id", FieldKind::Id),
    &[("createdAt", Direction::Desc)],
);

pub const NAME_MIN: usize = 10;
pub const NAME_MAX: usize = 100;
pub const DEFAULT_RATING: f64 = 4.0;

/// Query overrides behind `GET /tours/top-5-cheap`. Client filters still apply.
pub fn top_five_cheap(mut params: HashMap<String, String>) -> HashMap<String, String> {
    params.insert("limit".into(), "5".into());
    params.insert("sort".into(), "-ratingsAverage,price".into());
    params.insert("fields".into(), "name,price,ratingsAverage,summary,difficulty".into());
    params
}

/// Lowercase, alphanumerics kept, every other run of characters becomes one `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn required<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::validation(format!("A tour must have a {field}")))
}

fn non_blank(value: Option<String>, field: &str) -> AppResult<String> {
    let value = required(value, field)?.trim().to_string();
    if value.is_empty() {
        return Err(AppError::validation(format!("A tour must have a {field}")));
    }
    Ok(value)
}

fn round_rating(r: f64) -> f64 {
    (r * 10.0).round() / 10.0
}

pub fn validate(draft: TourDraft) -> AppResult<NewTour> {
    let name = non_blank(draft.name, "name")?;
    let len = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(AppError::validation(format!(
            "A tour name must have between {NAME_MIN} and {NAME_MAX} characters"
        )));
    }

    let duration = required(draft.duration, "duration")?;
    if duration <= 0 {
        return Err(AppError::validation("Duration must be positive"));
    }
    let max_group_size = required(draft.max_group_size, "group size")?;
    if max_group_size <= 0 {
        return Err(AppError::validation("Group size must be positive"));
    }
    let difficulty = required(draft.difficulty, "difficulty")?;

    let ratings_average = draft.ratings_average.unwrap_or(DEFAULT_RATING);
    if !(1.0..=5.0).contains(&ratings_average) {
        return Err(AppError::validation("Rating must be between 1.0 and 5.0"));
    }
    let ratings_quantity = draft.ratings_quantity.unwrap_or(0);
    if ratings_quantity < 0 {
        return Err(AppError::validation("Ratings quantity cannot be negative"));
    }

    let price = required(draft.price, "price")?;
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::validation("Price must be positive"));
    }
    if let Some(discount) = draft.price_discount {
        if !discount.is_finite() || discount < 0.0 || discount >= price {
            return Err(AppError::validation(format!(
                "Discount price ({discount}) should be below regular price"
            )));
        }
    }

    let start_dates = draft
        .start_dates
        .unwrap_or_default()
        .iter()
        .map(|d| {
            OffsetDateTime::parse(d, &Rfc3339)
                .map_err(|_| AppError::validation(format!("Invalid start date: {d}")))
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(NewTour {
        slug: slugify(&name),
        name,
        duration,
        max_group_size,
        difficulty,
        ratings_average: round_rating(ratings_average),
        ratings_quantity,
        price,
        price_discount: draft.price_discount,
        summary: non_blank(draft.summary, "summary")?,
        description: draft.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        image_cover: non_blank(draft.image_cover, "cover image")?,
        images: draft.images.unwrap_or_default(),
        start_dates,
        secret_tour: draft.secret_tour.unwrap_or(false),
    })
}

/// Fills the fields a PATCH body left out from the stored tour.
pub fn merge(existing: &Tour, patch: TourDraft) -> AppResult<TourDraft> {
    let start_dates = match patch.start_dates {
        Some(dates) => dates,
        None => existing
            .start_dates
            .iter()
            .map(|d| d.format(&Rfc3339))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("format start date: {e}"))?,
    };
    Ok(TourDraft {
        name: patch.name.or_else(|| Some(existing.name.clone())),
        duration: patch.duration.or(Some(existing.duration)),
        max_group_size: patch.max_group_size.or(Some(existing.max_group_size)),
        difficulty: patch.difficulty.or(Some(existing.difficulty)),
        ratings_average: patch.ratings_average.or(Some(existing.ratings_average)),
        ratings_quantity: patch.ratings_quantity.or(Some(existing.ratings_quantity)),
        price: patch.price.or(Some(existing.price)),
        price_discount: patch.price_discount.or(existing.price_discount),
        summary: patch.summary.or_else(|| Some(existing.summary.clone())),
        description: patch.description.or_else(|| existing.description.clone()),
        image_cover: patch.image_cover.or_else(|| Some(existing.image_cover.clone())),
        images: patch.images.or_else(|| Some(existing.images.clone())),
        start_dates: Some(start_dates),
        secret_tour: patch.secret_tour.or(Some(existing.secret_tour)),
    })
}
