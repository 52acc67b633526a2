//! E2E tests for dense chapter and volume numbering

mod common;

use common::TestServer;
use serde_json::{Value, json};

fn numbers(listing: &Value) -> Vec<(i64, i64)> {
    listing
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| {
            let number = entry
                .get("chapter_number")
                .or_else(|| entry.get("number"))
                .and_then(Value::as_i64)
                .unwrap();
            (entry["id"].as_i64().unwrap(), number)
        })
        .collect()
}

async fn published_chapters(server: &TestServer, token: &str, volume_id: i64, count: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for n in 1..=count {
        let chapter = server
            .create_chapter(token, volume_id, &format!("Chapter {n}"))
            .await;
        assert_eq!(chapter["chapter_number"], n as i64);
        let id = chapter["id"].as_i64().unwrap();
        let (status, _) = server
            .post(&format!("/api/chapters/{id}/publish"), token, json!({}))
            .await;
        assert_eq!(status, 200);
        ids.push(id);
    }
    ids
}

#[tokio::test]
async fn test_remove_closes_gap_and_append_continues() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, volume_id) = server.create_series_with_volume(&token).await;
    let ids = published_chapters(&server, &token, volume_id, 3).await;

    let (status, _) = server
        .delete(&format!("/api/chapters/{}", ids[1]), &token)
        .await;
    assert_eq!(status, 204);

    let (_, listing) = server
        .get(&format!("/api/volumes/{volume_id}/chapters"), None)
        .await;
    assert_eq!(numbers(&listing), vec![(ids[0], 1), (ids[2], 2)]);

    let appended = server.create_chapter(&token, volume_id, "Chapter 4").await;
    assert_eq!(appended["chapter_number"], 3);
}

#[tokio::test]
async fn test_reorder_chapter_to_front_and_after() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, volume_id) = server.create_series_with_volume(&token).await;
    let ids = published_chapters(&server, &token, volume_id, 3).await;

    let (status, order) = server
        .post(
            &format!("/api/chapters/{}/reorder", ids[2]),
            &token,
            json!({ "after": 0 }),
        )
        .await;
    assert_eq!(status, 200, "{order}");
    assert_eq!(numbers(&order), vec![(ids[2], 1), (ids[0], 2), (ids[1], 3)]);

    let (status, order) = server
        .post(
            &format!("/api/chapters/{}/reorder", ids[2]),
            &token,
            json!({ "after": ids[1] }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(numbers(&order), vec![(ids[0], 1), (ids[1], 2), (ids[2], 3)]);

    // Moving a chapter after itself changes nothing
    let (status, order) = server
        .post(
            &format!("/api/chapters/{}/reorder", ids[1]),
            &token,
            json!({ "after": ids[1] }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(numbers(&order), vec![(ids[0], 1), (ids[1], 2), (ids[2], 3)]);

    let (_, listing) = server
        .get(&format!("/api/volumes/{volume_id}/chapters"), None)
        .await;
    assert_eq!(numbers(&listing), vec![(ids[0], 1), (ids[1], 2), (ids[2], 3)]);
}

#[tokio::test]
async fn test_reorder_after_foreign_chapter_is_rejected() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, first_volume) = server.create_series_with_volume(&token).await;
    let (_, second_volume) = server.create_series_with_volume(&token).await;
    let ids = published_chapters(&server, &token, first_volume, 2).await;
    let foreign = published_chapters(&server, &token, second_volume, 1).await;

    let (status, _) = server
        .post(
            &format!("/api/chapters/{}/reorder", ids[0]),
            &token,
            json!({ "after": foreign[0] }),
        )
        .await;
    assert!(status == 400 || status == 404, "unexpected status {status}");
}

#[tokio::test]
async fn test_volume_reorder_and_remove() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (series_id, first) = server.create_series_with_volume(&token).await;

    let mut volumes = vec![first];
    for title in ["Volume Two", "Volume Three"] {
        let (status, volume) = server
            .post(
                &format!("/api/series/{series_id}/volumes"),
                &token,
                json!({ "title": title }),
            )
            .await;
        assert_eq!(status, 201);
        assert_eq!(volume["volume_number"], volumes.len() as i64 + 1);
        volumes.push(volume["id"].as_i64().unwrap());
    }

    let (status, order) = server
        .post(
            &format!("/api/volumes/{}/reorder", volumes[0]),
            &token,
            json!({ "after": volumes[2] }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        numbers(&order),
        vec![(volumes[1], 1), (volumes[2], 2), (volumes[0], 3)]
    );

    let (status, _) = server
        .delete(&format!("/api/volumes/{}", volumes[1]), &token)
        .await;
    assert_eq!(status, 204);

    let (status, order) = server
        .post(
            &format!("/api/volumes/{}/reorder", volumes[2]),
            &token,
            json!({}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(numbers(&order), vec![(volumes[2], 1), (volumes[0], 2)]);
}

#[tokio::test]
async fn test_non_owner_cannot_reorder() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("author", false).await;
    let (_, other_token) = server.create_user("intruder", false).await;
    let (_, volume_id) = server.create_series_with_volume(&token).await;
    let ids = published_chapters(&server, &token, volume_id, 2).await;

    let (status, _) = server
        .post(
            &format!("/api/chapters/{}/reorder", ids[1]),
            &other_token,
            json!({ "after": 0 }),
        )
        .await;
    assert_eq!(status, 403);

    let (status, _) = server
        .delete(&format!("/api/chapters/{}", ids[0]), &other_token)
        .await;
    assert_eq!(status, 403);
}
