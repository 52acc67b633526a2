//! E2E tests for chapter versions and the publication lifecycle

mod common;

use chrono::{Duration, Utc};
use common::{TestServer, novel_version};
use serde_json::json;

#[tokio::test]
async fn test_publish_then_unpublish_round_trip() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, volume_id) = server.create_series_with_volume(&token).await;
    let chapter = server.create_chapter(&token, volume_id, "Chapter One").await;
    let chapter_id = chapter["id"].as_i64().unwrap();
    assert_eq!(chapter["state"], "unpublished");

    // Unpublished chapters are hidden, even from their author on the reader side
    let (status, _) = server.get(&format!("/api/chapters/{chapter_id}"), None).await;
    assert_eq!(status, 404);

    let (status, published) = server
        .post(&format!("/api/chapters/{chapter_id}/publish"), &token, json!({}))
        .await;
    assert_eq!(status, 200, "{published}");
    assert_eq!(published["state"], "published");
    assert_eq!(published["published_version_id"], published["current_version_id"]);

    let (status, readable) = server.get(&format!("/api/chapters/{chapter_id}"), None).await;
    assert_eq!(status, 200);
    assert_eq!(readable["title"], "Chapter One");
    assert_eq!(readable["view_count"], 1);

    let (status, listed) = server
        .get(&format!("/api/volumes/{volume_id}/chapters"), None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, unpublished) = server
        .post(&format!("/api/chapters/{chapter_id}/unpublish"), &token, json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(unpublished["state"], "unpublished");
    assert!(unpublished["published_version_id"].is_null());
    assert!(
        unpublished["versions"]
            .as_array()
            .unwrap()
            .iter()
            .all(|v| v["status"] == "draft")
    );

    let (status, _) = server.get(&format!("/api/chapters/{chapter_id}"), None).await;
    assert_eq!(status, 404);

    let (status, body) = server
        .post(&format!("/api/chapters/{chapter_id}/unpublish"), &token, json!({}))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error_type"], "not_published");
}

#[tokio::test]
async fn test_double_publish_is_rejected() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, volume_id) = server.create_series_with_volume(&token).await;
    let chapter_id = server.create_chapter(&token, volume_id, "C1").await["id"]
        .as_i64()
        .unwrap();
    let publish = format!("/api/chapters/{chapter_id}/publish");

    let (status, _) = server.post(&publish, &token, json!({})).await;
    assert_eq!(status, 200);
    let (status, body) = server.post(&publish, &token, json!({})).await;
    assert_eq!(status, 409);
    assert_eq!(body["error_type"], "already_published");

    // A newer version can be published over the old one
    let (status, _) = server
        .post(
            &format!("/api/chapters/{chapter_id}/versions"),
            &token,
            novel_version("C1 revised", "<p>revised</p>"),
        )
        .await;
    assert_eq!(status, 201);
    let (status, republished) = server.post(&publish, &token, json!({})).await;
    assert_eq!(status, 200);

    let (_, readable) = server.get(&format!("/api/chapters/{chapter_id}"), None).await;
    assert_eq!(readable["title"], "C1 revised");
    let archived = republished["versions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|v| v["status"] == "draft")
        .count();
    assert_eq!(archived, 1);

    let (status, history) = server
        .get(&format!("/api/chapters/{chapter_id}/versions"), Some(&token))
        .await;
    assert_eq!(status, 200);
    assert_eq!(history[0]["title"], "C1 revised");
    assert_eq!(history[0]["is_current"], true);
    assert_eq!(history[0]["is_published"], true);
    assert_eq!(history[1]["is_published"], false);
}

#[tokio::test]
async fn test_scheduled_publication_visibility() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, reader_token) = server.create_user("reader", false).await;
    let (patron, patron_token) = server.create_user("patron", false).await;
    let (series_id, volume_id) = server.create_series_with_volume(&token).await;
    let chapter_id = server.create_chapter(&token, volume_id, "Early").await["id"]
        .as_i64()
        .unwrap();
    let publish = format!("/api/chapters/{chapter_id}/publish");

    let (status, body) = server
        .post(
            &publish,
            &token,
            json!({ "scheduled_at": Utc::now() - Duration::hours(1) }),
        )
        .await;
    assert_eq!(status, 422);
    assert_eq!(body["error_type"], "invalid_date");

    let (status, scheduled) = server
        .post(
            &publish,
            &token,
            json!({ "scheduled_at": Utc::now() + Duration::days(2) }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(scheduled["state"], "scheduled");

    server
        .state
        .db
        .grant_entitlement(patron.id, series_id, None)
        .await
        .unwrap();

    let path = format!("/api/chapters/{chapter_id}");
    assert_eq!(server.get(&path, None).await.0, 404);
    assert_eq!(server.get(&path, Some(&reader_token)).await.0, 404);
    assert_eq!(server.get(&path, Some(&patron_token)).await.0, 200);
    assert_eq!(server.get(&path, Some(&token)).await.0, 200);

    let (_, listed) = server
        .get(&format!("/api/volumes/{volume_id}/chapters"), Some(&reader_token))
        .await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_version_history_operations() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, volume_id) = server.create_series_with_volume(&token).await;
    let chapter = server.create_chapter(&token, volume_id, "Draft one").await;
    let chapter_id = chapter["id"].as_i64().unwrap();
    let first_id = chapter["current_version_id"].as_str().unwrap().to_string();
    let versions = format!("/api/chapters/{chapter_id}/versions");

    let mut autosave = novel_version("Draft two", "<p>two</p>");
    autosave["is_auto_save"] = json!(true);
    let (status, second) = server.post(&versions, &token, autosave).await;
    assert_eq!(status, 201);
    assert!(second["label"].as_str().unwrap().starts_with("Auto-save @ "));
    let second_id = second["id"].as_str().unwrap().to_string();

    let (status, listed) = server.get(&versions, Some(&token)).await;
    assert_eq!(status, 200);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    // The current version cannot be deleted
    let (status, body) = server
        .delete(&format!("{versions}/{second_id}"), &token)
        .await;
    assert_eq!(status, 409, "{body}");

    let (status, renamed) = server
        .request(
            reqwest::Method::PATCH,
            &format!("{versions}/{first_id}"),
            Some(&token),
            Some(json!({ "label": "Original outline" })),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(renamed["label"], "Original outline");

    let (status, restored) = server
        .post(&format!("{versions}/{first_id}/restore"), &token, json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(restored["current_version_id"], first_id.as_str());

    let (status, _) = server
        .delete(&format!("{versions}/{second_id}"), &token)
        .await;
    assert_eq!(status, 204);
    let (_, listed) = server.get(&versions, Some(&token)).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_only_owner_can_author() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, other_token) = server.create_user("intruder", false).await;
    let (series_id, volume_id) = server.create_series_with_volume(&token).await;
    let chapter_id = server.create_chapter(&token, volume_id, "C1").await["id"]
        .as_i64()
        .unwrap();

    let (status, _) = server
        .post(&format!("/api/chapters/{chapter_id}/publish"), &other_token, json!({}))
        .await;
    assert_eq!(status, 403);

    let (status, _) = server
        .request(
            reqwest::Method::PATCH,
            &format!("/api/series/{series_id}"),
            Some(&other_token),
            Some(json!({ "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, 403);

    let (status, _) = server
        .post(
            &format!("/api/volumes/{volume_id}/chapters"),
            &other_token,
            novel_version("Sneaky", "<p>x</p>"),
        )
        .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn test_invalid_content_is_rejected() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, volume_id) = server.create_series_with_volume(&token).await;

    let (status, body) = server
        .post(
            &format!("/api/volumes/{volume_id}/chapters"),
            &token,
            novel_version("", "<p>x</p>"),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error_type"], "validation");

    // Comic pages do not belong in a novel series
    let (status, _) = server
        .post(
            &format!("/api/volumes/{volume_id}/chapters"),
            &token,
            json!({
                "title": "Pages",
                "content": { "kind": "comic", "images": ["p1.png"] },
            }),
        )
        .await;
    assert_eq!(status, 400);
}
