//! JSON envelopes shared by the resource handlers.
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub status: &'static str,
    pub results: usize,
    pub total: u64,
    pub data: T,
}

impl<T> ListResponse<T> {
    pub fn success(results: usize, total: u64, data: T) -> Self {
        Self { status: "success", results, total, data }
    }
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn success(data: T) -> Self {
        Self { status: "success", data }
    }
}
