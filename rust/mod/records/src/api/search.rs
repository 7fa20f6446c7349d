use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use serde::Serialize;

use pcbtrace_core::ServiceError;

use super::{AppState, blocking};
use crate::model::ManufacturingRecord;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/search", axum::routing::post(search_post))
        .route("/search/{pcb_sr_no}", get(search_get))
        .route("/search-by-lot/{lot_no}", get(search_by_lot))
        .route("/search-by-model/{model}", get(search_by_model))
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub success: bool,
    pub data: Option<ManufacturingRecord>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MultiLookupResponse {
    pub success: bool,
    pub data: Vec<ManufacturingRecord>,
    pub count: usize,
    pub message: String,
}

type Reply<T> = Result<(StatusCode, Json<T>), ServiceError>;

async fn search_get(State(svc): State<AppState>, Path(pcb_sr_no): Path<String>) -> Reply<LookupResponse> {
    lookup(&svc, pcb_sr_no).await
}

async fn search_post(
    State(svc): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Reply<LookupResponse> {
    let pcb_sr_no = body
        .ok()
        .and_then(|Json(v)| v.get("pcb_sr_no").and_then(key_from_json))
        .ok_or_else(|| ServiceError::Validation("Missing pcb_sr_no in request body".into()))?;
    lookup(&svc, pcb_sr_no).await
}

/// Accept the key as a JSON string or number.
fn key_from_json(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn lookup(svc: &AppState, pcb_sr_no: String) -> Reply<LookupResponse> {
    let key = pcb_sr_no.clone();
    let found = blocking(svc, move |s| s.get_by_pcb(&key)).await?;
    Ok(match found {
        Some(record) => (
            StatusCode::OK,
            Json(LookupResponse {
                success: true,
                data: Some(record),
                message: format!("Record found for PCB Serial Number: {}", pcb_sr_no),
            }),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(LookupResponse {
                success: false,
                data: None,
                message: format!("No record found for PCB Serial Number: {}", pcb_sr_no),
            }),
        ),
    })
}

async fn search_by_lot(State(svc): State<AppState>, Path(lot_no): Path<String>) -> Reply<MultiLookupResponse> {
    let key = lot_no.clone();
    let records = blocking(&svc, move |s| s.list_by_lot(&key)).await?;
    Ok(multi_reply(records, "Lot Number", &lot_no))
}

async fn search_by_model(State(svc): State<AppState>, Path(model): Path<String>) -> Reply<MultiLookupResponse> {
    let key = model.clone();
    let records = blocking(&svc, move |s| s.list_by_model(&key)).await?;
    Ok(multi_reply(records, "Model", &model))
}

fn multi_reply(records: Vec<ManufacturingRecord>, label: &str, key: &str) -> (StatusCode, Json<MultiLookupResponse>) {
    if records.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(MultiLookupResponse {
                success: false,
                data: Vec::new(),
                count: 0,
                message: format!("No records found for {}: {}", label, key),
            }),
        );
    }
    let count = records.len();
    (
        StatusCode::OK,
        Json(MultiLookupResponse {
            success: true,
            data: records,
            count,
            message: format!("Found {} records for {}: {}", count, label, key),
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;

    use crate::api::{router, testing::api};
    use crate::service::tests::seeded_service;

    fn app() -> axum::Router {
        router(Arc::new(seeded_service(&[
            ("PCB-1", Some("L1"), Some("Renesa"), Some("P1"), Some("T1"), "2025-01-01 10:00:00"),
            ("PCB-2", Some("L1"), Some("Aris"), Some("P2"), None, "2025-01-02 10:00:00"),
            ("12345", Some("L2"), Some("Renesa"), None, None, "2025-01-03 10:00:00"),
        ])))
    }

    #[tokio::test]
    async fn get_search_found() {
        let (s, body) = api(&app(), "GET", "/api/search/PCB-1", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["pcb_sr_no"], "PCB-1");
        assert_eq!(body["data"]["lot_no"], "L1");
        assert_eq!(body["data"]["sr_no"], serde_json::Value::Null);
        assert_eq!(body["data"]["created_at"], "2025-01-01T10:00:00Z");
    }

    #[tokio::test]
    async fn get_search_missing_is_404() {
        let (s, body) = api(&app(), "GET", "/api/search/NOPE", None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["data"].is_null());
        assert!(body["message"].as_str().unwrap().contains("NOPE"));
    }

    #[tokio::test]
    async fn post_search_string_and_number() {
        let (s, body) = api(&app(), "POST", "/api/search", Some(r#"{"pcb_sr_no":"PCB-2"}"#)).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["data"]["model"], "Aris");

        let (s, body) = api(&app(), "POST", "/api/search", Some(r#"{"pcb_sr_no":12345}"#)).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["data"]["pcb_sr_no"], "12345");
    }

    #[tokio::test]
    async fn post_search_missing_field_is_400() {
        let (s, body) = api(&app(), "POST", "/api/search", Some(r#"{"serial":"PCB-2"}"#)).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing pcb_sr_no in request body");

        let (s, _) = api(&app(), "POST", "/api/search", Some("not json")).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);

        let (s, _) = api(&app(), "POST", "/api/search", None).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn search_by_lot_lists_newest_first() {
        let (s, body) = api(&app(), "GET", "/api/search-by-lot/L1", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][0]["pcb_sr_no"], "PCB-2");
        assert_eq!(body["data"][1]["pcb_sr_no"], "PCB-1");
    }

    #[tokio::test]
    async fn search_by_model_empty_is_404() {
        let (s, body) = api(&app(), "GET", "/api/search-by-model/Renesa", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let (s, body) = api(&app(), "GET", "/api/search-by-model/Unknown", None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["count"], 0);
        assert_eq!(body["data"], serde_json::json!([]));
    }
}
