use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tours::repo_types::{Difficulty, Tour};

/// Create and update body. On create the required fields are checked by
/// `services::validate`; on update missing fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourDraft {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i32>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    /// RFC 3339 timestamps.
    pub start_dates: Option<Vec<String>>,
    pub secret_tour: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TourList {
    pub tours: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct TourOne {
    pub tour: Tour,
}
