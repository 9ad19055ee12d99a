use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Success envelope `{ statusCode, message, data }`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status_code: u16,
    pub message: String,
    pub data: T,
}

pub type Reply<T> = (StatusCode, Json<Envelope<T>>);

pub fn reply<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> Reply<T> {
    (
        status,
        Json(Envelope {
            status_code: status.as_u16(),
            message: message.into(),
            data,
        }),
    )
}
