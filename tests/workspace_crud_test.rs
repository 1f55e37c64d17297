//! Customers, projects and tasks through the HTTP surface, including
//! per-account isolation.

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn customer_lifecycle() {
    let app = TestApp::new().await;
    let token = app.register("owner@example.com").await;

    let customer = app
        .create(
            "/api/v1/customers",
            json!({ "name": "Acme Ltd", "email": "ap@acme.test", "phone": "555-0100" }),
            &token,
        )
        .await;
    let id = customer["id"].as_str().unwrap().to_string();

    let (status, updated) = app
        .call(
            Method::PUT,
            &format!("/api/v1/customers/{id}"),
            Some(json!({ "name": "Acme Holdings", "email": "ap@acme.test" })),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["name"], "Acme Holdings");

    let (status, list) = app.call(Method::GET, "/api/v1/customers", None, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"]["total"], 1);
    assert_eq!(list["data"]["items"][0]["id"], id.as_str());

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/v1/customers/{id}"), None, &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(Method::GET, &format!("/api/v1/customers/{id}"), None, &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn customer_validation_reports_fields() {
    let app = TestApp::new().await;
    let token = app.register("owner@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": "  ", "email": "not-an-email" })),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"]["name"].is_array());
    assert!(body["fields"]["email"].is_array());
}

#[tokio::test]
async fn project_with_tasks_and_cascade_delete() {
    let app = TestApp::new().await;
    let token = app.register("owner@example.com").await;

    let project = app
        .create("/api/v1/projects", json!({ "name": "Website" }), &token)
        .await;
    let project_id = project["id"].as_str().unwrap().to_string();

    let task = app
        .create(
            "/api/v1/tasks",
            json!({ "project_id": project_id, "name": "Landing page", "type": "bug_fix" }),
            &token,
        )
        .await;
    assert_eq!(task["status"], "pending");
    assert_eq!(task["type"], "bug_fix");
    let task_id = task["id"].as_str().unwrap().to_string();

    let (status, detail) = app
        .call(Method::GET, &format!("/api/v1/projects/{project_id}"), None, &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["data"]["name"], "Website");
    assert_eq!(detail["data"]["tasks"].as_array().unwrap().len(), 1);

    let (status, fetched) = app
        .call(Method::GET, &format!("/api/v1/tasks/{task_id}"), None, &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["project"]["name"], "Website");

    let (status, tasks) = app
        .call(
            Method::GET,
            &format!("/api/v1/projects/{project_id}/tasks"),
            None,
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks["data"][0]["id"], task_id.as_str());

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/v1/projects/{project_id}"), None, &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(Method::GET, &format!("/api/v1/tasks/{task_id}"), None, &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn task_under_foreign_project_is_a_field_error() {
    let app = TestApp::new().await;
    let owner = app.register("owner@example.com").await;
    let intruder = app.register("intruder@example.com").await;

    let project = app
        .create("/api/v1/projects", json!({ "name": "Private" }), &owner)
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/tasks",
            Some(json!({ "project_id": project["id"], "name": "Sneaky" })),
            &intruder,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"]["project_id"].is_array());
}

#[tokio::test]
async fn other_accounts_records_are_not_found() {
    let app = TestApp::new().await;
    let owner = app.register("owner@example.com").await;
    let intruder = app.register("intruder@example.com").await;

    let customer = app
        .create(
            "/api/v1/customers",
            json!({ "name": "Acme Ltd", "email": "ap@acme.test" }),
            &owner,
        )
        .await;
    let project = app
        .create("/api/v1/projects", json!({ "name": "Website" }), &owner)
        .await;

    for uri in [
        format!("/api/v1/customers/{}", customer["id"].as_str().unwrap()),
        format!("/api/v1/projects/{}", project["id"].as_str().unwrap()),
    ] {
        let (status, _) = app.call(Method::GET, &uri, None, &intruder).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {uri}");
        let (status, _) = app.call(Method::DELETE, &uri, None, &intruder).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "DELETE {uri}");
    }

    let (_, list) = app.call(Method::GET, "/api/v1/customers", None, &intruder).await;
    assert_eq!(list["data"]["total"], 0);
}

#[tokio::test]
async fn pagination_parameters_are_honoured() {
    let app = TestApp::new().await;
    let token = app.register("owner@example.com").await;

    for i in 0..7 {
        app.create("/api/v1/projects", json!({ "name": format!("P{i}") }), &token)
            .await;
    }

    let (status, page) = app
        .call(Method::GET, "/api/v1/projects?page=2&per_page=5", None, &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], 7);
    assert_eq!(page["data"]["page"], 2);
    assert_eq!(page["data"]["total_pages"], 2);
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 2);
}
