//! Contract tests for the JSON API, driven through the router without a socket.

use std::fs;

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use library_catalog::{
    access::SharedPassword,
    catalog::{Catalog, CatalogOptions},
    clock::FixedClock,
    files::CatalogFiles,
    http::{ADMIN_HEADER, AppState, router},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const PASSWORD: &str = "admin123";

fn app_with(titles: &str) -> Result<(TempDir, Router)> {
    let dir = tempfile::tempdir()?;
    let files = CatalogFiles::in_dir(dir.path());
    fs::write(&files.titles, titles)?;
    let catalog = Catalog::open(files, CatalogOptions::default())?
        .with_clock(FixedClock::new("2024-06-01 09:00:00"));
    let state = AppState::new(catalog, SharedPassword::new(PASSWORD));
    Ok((dir, router(state)))
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

async fn get(app: &Router, uri: &str) -> Result<(StatusCode, Value)> {
    send(app, Request::get(uri).body(Body::empty())?).await
}

async fn post(app: &Router, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?;
    send(app, request).await
}

async fn admin_delete(app: &Router, body: Value, password: &str) -> Result<(StatusCode, Value)> {
    let request = Request::post("/api/delete")
        .header("content-type", "application/json")
        .header(ADMIN_HEADER, password)
        .body(Body::from(body.to_string()))?;
    send(app, request).await
}

#[tokio::test]
async fn lists_books_with_string_ids() -> Result<()> {
    let (_dir, app) = app_with("Ulysses\nDune\n")?;

    let (status, body) = get(&app, "/api/books").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"id": "101", "title": "Ulysses", "borrower": "", "issued_at": "", "status": "Available"},
            {"id": "102", "title": "Dune", "borrower": "", "issued_at": "", "status": "Available"},
        ])
    );

    let (_, sorted) = get(&app, "/api/books?sort=title").await?;
    assert_eq!(sorted[0]["title"], "Dune");
    Ok(())
}

#[tokio::test]
async fn issue_return_and_stats() -> Result<()> {
    let (_dir, app) = app_with("Dune\nEmma\n")?;

    let (status, body) = post(&app, "/api/issue", json!({"book_id": "101", "user_name": "Alice"})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["issued_at"], "2024-06-01 09:00:00");

    let (status, body) = post(&app, "/api/issue", json!({"book_id": "101", "user_name": "Bob"})).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "already_issued");
    assert!(body["message"].as_str().unwrap_or_default().contains("Alice"));

    let (_, stats) = get(&app, "/api/stats").await?;
    assert_eq!(stats, json!({"total": 2, "issued": 1, "available": 1}));

    let (status, body) = post(&app, "/api/return", json!({"book_id": "101"})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = post(&app, "/api/return", json!({"book_id": "101"})).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "not_issued");

    let (_, history) = get(&app, "/api/history").await?;
    assert_eq!(history[0]["action"], "returned");
    assert_eq!(history[1]["action"], "issued");
    assert_eq!(history[1]["user"], "Alice");
    Ok(())
}

#[tokio::test]
async fn rejects_missing_fields_and_unknown_ids() -> Result<()> {
    let (_dir, app) = app_with("Dune\n")?;

    let (status, body) = post(&app, "/api/issue", json!({"book_id": "101"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing user_name");

    let (status, body) = post(&app, "/api/issue", json!({"book_id": "abc", "user_name": "Alice"})).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = post(&app, "/api/return", json!({"book_id": "404"})).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&app, "/api/add", json!({"title": "   "})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn add_then_delete_requires_admin() -> Result<()> {
    let (dir, app) = app_with("Dune\n")?;

    let (status, body) = post(&app, "/api/add", json!({"title": "Emma"})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "102");
    assert_eq!(fs::read_to_string(dir.path().join("books.csv"))?, "Dune\nEmma\n");

    let (status, body) = post(&app, "/api/delete", json!({"book_id": "102"})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Unauthorized");

    let (status, body) = admin_delete(&app, json!({"book_id": "102"}), "nope").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = admin_delete(&app, json!({"book_id": "102", "confirm": false}), PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "delete cancelled");

    let (status, body) = admin_delete(&app, json!({"book_id": "102"}), PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(fs::read_to_string(dir.path().join("books.csv"))?, "Dune\n");
    Ok(())
}

#[tokio::test]
async fn issued_books_cannot_be_deleted() -> Result<()> {
    let (_dir, app) = app_with("Dune\n")?;
    post(&app, "/api/issue", json!({"book_id": "101", "user_name": "Alice"})).await?;

    let (status, body) = admin_delete(&app, json!({"book_id": "101"}), PASSWORD).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "cannot_delete_issued");

    let (_, stats) = get(&app, "/api/stats").await?;
    assert_eq!(stats["total"], 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_issues_of_one_book_have_one_winner() -> Result<()> {
    let (dir, app) = app_with("Dune\n")?;

    let mut tasks = Vec::new();
    for n in 0..16 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            post(&app, "/api/issue", json!({"book_id": "101", "user_name": format!("reader-{n}")}))
                .await
                .map(|(status, _)| status)
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await?? == StatusCode::OK {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    let ledger = fs::read_to_string(dir.path().join("issued_books.csv"))?;
    assert_eq!(ledger.lines().count(), 1);
    Ok(())
}

#[tokio::test]
async fn search_export_and_chat() -> Result<()> {
    let (dir, app) = app_with("Dune\nDuneland\nJurassic Park\n")?;

    let (_, body) = get(&app, "/api/search?q=DUNE").await?;
    assert_eq!(body["matches"].as_array().map(Vec::len), Some(2));

    let (_, body) = get(&app, "/api/search?q=999").await?;
    assert_eq!(body, json!({"matches": []}));

    let (status, body) = post(&app, "/api/export", json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let report = fs::read_to_string(dir.path().join("library_report.txt"))?;
    assert!(report.contains("103 - Jurassic Park [Available]"));

    let (_, body) = post(&app, "/api/chat", json!({"message": "dinosaur"})).await?;
    assert!(
        body["response"]
            .as_str()
            .unwrap_or_default()
            .contains("Jurassic Park (#103)")
    );
    Ok(())
}

#[tokio::test]
async fn accepts_numeric_ids_and_yes_no_confirmation() -> Result<()> {
    let (dir, app) = app_with("Dune\nEmma\n")?;

    let (status, body) = post(&app, "/api/issue", json!({"book_id": 101, "user_name": "Alice"})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "101");

    let (status, body) = admin_delete(&app, json!({"book_id": 102, "confirm": "n"}), PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "delete cancelled");

    let (status, body) = admin_delete(&app, json!({"book_id": "102", "confirm": "y"}), PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(fs::read_to_string(dir.path().join("books.csv"))?, "Dune\n");
    Ok(())
}

#[tokio::test]
async fn malformed_bodies_get_structured_failures() -> Result<()> {
    let (_dir, app) = app_with("Dune\n")?;

    let (status, body) = post(&app, "/api/issue", json!({"book_id": [101], "user_name": "Alice"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "invalid_input");

    let (status, body) = admin_delete(&app, json!({"book_id": "101", "confirm": "maybe"}), PASSWORD).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "confirm must be y or n");

    let request = Request::post("/api/add")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))?;
    let (status, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    let (_, stats) = get(&app, "/api/stats").await?;
    assert_eq!(stats, json!({"total": 1, "issued": 0, "available": 1}));
    Ok(())
}

#[tokio::test]
async fn storage_failures_answer_500_without_details() -> Result<()> {
    let (dir, app) = app_with("Dune\n")?;
    let audit_log = dir.path().join("issue_log.txt");
    fs::remove_file(&audit_log)?;
    fs::create_dir(&audit_log)?;

    let (status, body) = post(&app, "/api/issue", json!({"book_id": "101", "user_name": "Alice"})).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "operation_failed");
    assert_eq!(body["message"], "operation failed");

    let (_, stats) = get(&app, "/api/stats").await?;
    assert_eq!(stats["issued"], 0);
    assert_eq!(fs::read_to_string(dir.path().join("issued_books.csv"))?, "");

    let titles = dir.path().join("books.csv");
    fs::remove_file(&titles)?;
    fs::create_dir(&titles)?;
    let (status, body) = post(&app, "/api/add", json!({"title": "Emma"})).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "operation failed");

    let (_, stats) = get(&app, "/api/stats").await?;
    assert_eq!(stats["total"], 1);
    Ok(())
}
