#![forbid(unsafe_code)]

//! Groups, sources and destinations live in the orchestrator's spreadsheet.
//! These routes only point callers there.

use axum::Json;
use serde_json::{Value, json};

pub async fn list_groups() -> Json<Value> {
    Json(json!({
        "message": "Groups are managed via Google Sheets in n8n",
        "groups": [],
    }))
}

pub async fn create_group() -> Json<Value> {
    Json(json!({"message": "Groups should be created in Google Sheets via n8n"}))
}

pub async fn list_sources() -> Json<Value> {
    Json(json!({
        "message": "Sources are managed via Google Sheets in n8n",
        "sources": [],
    }))
}

pub async fn create_source() -> Json<Value> {
    Json(json!({"message": "Sources should be created in Google Sheets via n8n"}))
}

pub async fn list_destinations() -> Json<Value> {
    Json(json!({
        "message": "Destinations are managed via Google Sheets in n8n",
        "destinations": [],
    }))
}

pub async fn create_destination() -> Json<Value> {
    Json(json!({"message": "Destinations should be created in Google Sheets via n8n"}))
}
