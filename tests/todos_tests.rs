//! Tests for trip todos.

mod common;

use common::{body_json, request, setup};
use serde_json::json;

#[tokio::test]
async fn test_todo_lifecycle() {
    let ctx = setup().await;
    let guest = ctx.guest();
    let trip_id = ctx
        .create_trip(&guest, json!({ "name": "Paris", "start_date": "2024-06-01" }))
        .await;
    let todos_uri = format!("/api/trips/{trip_id}/todos");

    let response = ctx
        .send(request(
            "POST",
            &todos_uri,
            Some(&guest),
            Some(json!({ "title": "Renew passport", "category": "documents", "priority": 1 })),
        ))
        .await;
    assert_eq!(response.status(), 201);
    let todo = body_json(response).await;
    assert_eq!(todo["completed"], false);
    assert!(todo["completed_at"].is_null());
    let todo_uri = format!("/api/todos/{}", todo["id"].as_str().unwrap());

    let response = ctx
        .send(request("PUT", &todo_uri, Some(&guest), Some(json!({ "completed": true }))))
        .await;
    assert_eq!(response.status(), 200);
    let done = body_json(response).await;
    assert_eq!(done["completed"], true);
    assert_eq!(done["title"], "Renew passport");
    let completed_at = done["completed_at"].as_str().expect("completion time").to_string();

    // Saving again keeps the original completion time
    let response = ctx
        .send(request(
            "PUT",
            &todo_uri,
            Some(&guest),
            Some(json!({ "completed": true, "description": "Post office" })),
        ))
        .await;
    assert_eq!(body_json(response).await["completed_at"], completed_at.as_str());

    let response = ctx
        .send(request("PUT", &todo_uri, Some(&guest), Some(json!({ "completed": false }))))
        .await;
    assert!(body_json(response).await["completed_at"].is_null());

    let response = ctx.send(request("DELETE", &todo_uri, Some(&guest), None)).await;
    assert_eq!(response.status(), 204);

    let response = ctx.send(request("GET", &todos_uri, Some(&guest), None)).await;
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_todo_created_completed() {
    let ctx = setup().await;
    let guest = ctx.guest();
    let trip_id = ctx
        .create_trip(&guest, json!({ "name": "Paris", "start_date": "2024-06-01" }))
        .await;

    let response = ctx
        .send(request(
            "POST",
            &format!("/api/trips/{trip_id}/todos"),
            Some(&guest),
            Some(json!({ "title": "Book train", "completed": true })),
        ))
        .await;
    assert_eq!(response.status(), 201);
    let todo = body_json(response).await;
    assert_eq!(todo["completed"], true);
    assert!(todo["completed_at"].is_string());
}

#[tokio::test]
async fn test_todo_validation_and_access() {
    let ctx = setup().await;
    let guest = ctx.guest();
    let trip_id = ctx
        .create_trip(&guest, json!({ "name": "Paris", "start_date": "2024-06-01" }))
        .await;
    let todos_uri = format!("/api/trips/{trip_id}/todos");

    let response = ctx
        .send(request(
            "POST",
            &todos_uri,
            Some(&guest),
            Some(json!({ "title": "Pack", "priority": 9 })),
        ))
        .await;
    assert_eq!(response.status(), 400);

    let response = ctx
        .send(request("POST", &todos_uri, Some(&guest), Some(json!({ "title": " " }))))
        .await;
    assert_eq!(response.status(), 400);

    let stranger = ctx.guest();
    let response = ctx
        .send(request("POST", &todos_uri, Some(&stranger), Some(json!({ "title": "Pack" }))))
        .await;
    assert_eq!(response.status(), 404);

    let response = ctx.send(request("GET", &todos_uri, Some(&stranger), None)).await;
    assert_eq!(response.status(), 404);

    let response = ctx
        .send(request("POST", &todos_uri, Some(&guest), Some(json!({ "title": "Pack" }))))
        .await;
    let todo = body_json(response).await;
    let todo_uri = format!("/api/todos/{}", todo["id"].as_str().unwrap());

    let response = ctx
        .send(request("PUT", &todo_uri, Some(&guest), Some(json!({ "completed": "yes" }))))
        .await;
    assert_eq!(response.status(), 422);

    let response = ctx
        .send(request("PUT", &todo_uri, Some(&stranger), Some(json!({ "completed": true }))))
        .await;
    assert_eq!(response.status(), 404);
}
