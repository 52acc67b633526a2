//! E2E tests for the report ledger and restriction enforcement

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{TestServer, novel_version};
use quillpress::domain::{CategoryScore, ModerationAnalysis, ScanInput};
use quillpress::error::AppError;
use quillpress::service::ContentClassifier;
use serde_json::{Value, json};

/// Flags any text containing "forbidden"
struct KeywordClassifier;

#[async_trait]
impl ContentClassifier for KeywordClassifier {
    async fn scan(&self, input: &ScanInput) -> Result<ModerationAnalysis, AppError> {
        let flagged = input.text.contains("forbidden");
        Ok(ModerationAnalysis {
            flagged,
            categories: vec![CategoryScore {
                category: "violence".to_string(),
                score: if flagged { 0.97 } else { 0.01 },
            }],
            analyzed_at: Utc::now(),
        })
    }
}

/// Poll a ledger entry until it holds `count` reports; scans run after the
/// response is sent.
async fn wait_for_entry(server: &TestServer, token: &str, path: &str, count: usize) -> Value {
    for _ in 0..50 {
        let (status, entry) = server.get(path, Some(token)).await;
        if status == 200 && entry["reports"].as_array().map(Vec::len) == Some(count) {
            return entry;
        }
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }
    panic!("ledger entry {path} never reached {count} reports");
}

async fn published_chapter(server: &TestServer, token: &str, html: &str) -> i64 {
    let (_, volume_id) = server.create_series_with_volume(token).await;
    let (status, chapter) = server
        .post(
            &format!("/api/volumes/{volume_id}/chapters"),
            token,
            novel_version("Chapter", html),
        )
        .await;
    assert_eq!(status, 201);
    let chapter_id = chapter["id"].as_i64().unwrap();
    let (status, _) = server
        .post(&format!("/api/chapters/{chapter_id}/publish"), token, json!({}))
        .await;
    assert_eq!(status, 200);
    chapter_id
}

#[tokio::test]
async fn test_moderation_requires_moderator() {
    let server = TestServer::new().await;
    let (_, token) = server.create_user("reader", false).await;

    let (status, body) = server.get("/api/moderation/reports", Some(&token)).await;
    assert_eq!(status, 403);
    assert_eq!(body["error_type"], "forbidden");

    let (status, _) = server.get("/api/moderation/reports", None).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_system_and_user_reports_share_entry_and_dismiss() {
    let server = TestServer::with_classifier(Arc::new(KeywordClassifier)).await;
    let (_, author_token) = server.create_user("author", false).await;
    let (_, reader_token) = server.create_user("reader", false).await;
    let (_, mod_token) = server.create_user("moderator", true).await;

    let chapter_id = published_chapter(&server, &author_token, "<p>something forbidden</p>").await;
    let entry_path = format!("/api/moderation/reports/content/{chapter_id}");

    let (status, report) = server
        .post(
            "/api/reports",
            &reader_token,
            json!({ "target_type": "content", "target_id": chapter_id, "reason": "graphic" }),
        )
        .await;
    assert_eq!(status, 201, "{report}");
    assert_eq!(report["status"], "pending");

    let entry = wait_for_entry(&server, &mod_token, &entry_path, 2).await;
    assert_eq!(entry["pending_count"], 2);
    assert_eq!(entry["has_system_report"], true);
    let system = entry["reports"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["reporter_id"].is_null())
        .unwrap();
    assert_eq!(system["reason"], "Flagged by automated content moderation");
    assert_eq!(system["analysis"]["flagged"], true);

    let (_, page) = server
        .get("/api/moderation/reports?status=pending", Some(&mod_token))
        .await;
    assert_eq!(page["total"], 1);

    let (status, dismissed) = server
        .post(&format!("{entry_path}/dismiss"), &mod_token, json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(dismissed["affected"], 2);

    let (_, entry) = server.get(&entry_path, Some(&mod_token)).await;
    assert_eq!(entry["pending_count"], 0);
    assert!(
        entry["reports"]
            .as_array()
            .unwrap()
            .iter()
            .all(|r| r["status"] == "dismissed")
    );

    let (_, page) = server
        .get("/api/moderation/reports?status=pending", Some(&mod_token))
        .await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_clean_content_files_no_report() {
    let server = TestServer::with_classifier(Arc::new(KeywordClassifier)).await;
    let (_, author_token) = server.create_user("author", false).await;
    let (_, mod_token) = server.create_user("moderator", true).await;

    let chapter_id = published_chapter(&server, &author_token, "<p>a gentle tale</p>").await;
    tokio::time::sleep(StdDuration::from_millis(200)).await;

    let (status, _) = server
        .get(
            &format!("/api/moderation/reports/content/{chapter_id}"),
            Some(&mod_token),
        )
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_resolve_content_blocks_publishing() {
    let server = TestServer::new().await;
    let (author, author_token) = server.create_user("author", false).await;
    let (_, reader_token) = server.create_user("reader", false).await;
    let (_, mod_token) = server.create_user("moderator", true).await;

    let chapter_id = published_chapter(&server, &author_token, "<p>copied</p>").await;
    let (status, _) = server
        .post(
            "/api/reports",
            &reader_token,
            json!({ "target_type": "content", "target_id": chapter_id, "reason": "plagiarism" }),
        )
        .await;
    assert_eq!(status, 201);

    let entry_path = format!("/api/moderation/reports/content/{chapter_id}");
    let (status, body) = server
        .post(
            &format!("{entry_path}/resolve"),
            &mod_token,
            json!({ "restriction_days": 0 }),
        )
        .await;
    assert_eq!(status, 400, "{body}");

    let (status, resolved) = server
        .post(
            &format!("{entry_path}/resolve"),
            &mod_token,
            json!({ "restriction_days": 7 }),
        )
        .await;
    assert_eq!(status, 200, "{resolved}");
    assert_eq!(resolved["affected"], 1);
    assert_eq!(resolved["restriction"]["user_id"], author.id);
    assert_eq!(resolved["restriction"]["kind"], "publish");

    // A second chapter cannot be published while restricted
    let (_, volume_id) = server.create_series_with_volume(&author_token).await;
    let second = server.create_chapter(&author_token, volume_id, "Next").await;
    let publish = format!("/api/chapters/{}/publish", second["id"]);
    let (status, body) = server.post(&publish, &author_token, json!({})).await;
    assert_eq!(status, 403);
    assert_eq!(body["error_type"], "restricted");
    let until: DateTime<Utc> = body["until"].as_str().unwrap().parse().unwrap();
    assert!(until > Utc::now() + Duration::days(6));
    assert!(until <= Utc::now() + Duration::days(7));

    // Commenting is still allowed
    let (status, _) = server
        .post(
            &format!("/api/chapters/{chapter_id}/comments"),
            &author_token,
            json!({ "content": "thanks for reading" }),
        )
        .await;
    assert_eq!(status, 201);

    let (_, restrictions) = server.get("/api/me/restrictions", Some(&author_token)).await;
    assert_eq!(restrictions["publish"]["allowed"], false);
    assert_eq!(restrictions["mute"]["allowed"], true);

    // Lifting the restriction allows publishing again
    let (status, _) = server
        .delete(
            &format!("/api/moderation/users/{}/restrictions/publish", author.id),
            &mod_token,
        )
        .await;
    assert_eq!(status, 204);
    let (status, _) = server.post(&publish, &author_token, json!({})).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_resolve_comment_mutes_author() {
    let server = TestServer::new().await;
    let (_, author_token) = server.create_user("author", false).await;
    let (commenter, commenter_token) = server.create_user("troll", false).await;
    let (_, mod_token) = server.create_user("moderator", true).await;

    let chapter_id = published_chapter(&server, &author_token, "<p>story</p>").await;
    let comments = format!("/api/chapters/{chapter_id}/comments");
    let (status, comment) = server
        .post(&comments, &commenter_token, json!({ "content": "rude words" }))
        .await;
    assert_eq!(status, 201);
    let comment_id = comment["id"].as_str().unwrap().to_string();

    // Comment ids are UUIDs; a numeric id is a shape mismatch
    let (status, _) = server
        .post(
            "/api/reports",
            &author_token,
            json!({ "target_type": "comment", "target_id": 5, "reason": "abuse" }),
        )
        .await;
    assert_eq!(status, 400);

    let (status, _) = server
        .post(
            "/api/reports",
            &author_token,
            json!({ "target_type": "comment", "target_id": comment_id, "reason": "abuse" }),
        )
        .await;
    assert_eq!(status, 201);

    let (status, resolved) = server
        .post(
            &format!("/api/moderation/reports/comment/{comment_id}/resolve"),
            &mod_token,
            json!({ "restriction_days": 3 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(resolved["restriction"]["user_id"], commenter.id);
    assert_eq!(resolved["restriction"]["kind"], "mute");

    let (status, body) = server
        .post(&comments, &commenter_token, json!({ "content": "again" }))
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["error_type"], "restricted");
}

#[tokio::test]
async fn test_report_validation_and_listing() {
    let server = TestServer::new().await;
    let (_, author_token) = server.create_user("author", false).await;
    let (_, reader_token) = server.create_user("reader", false).await;
    let (_, mod_token) = server.create_user("moderator", true).await;
    let (series_id, _) = server.create_series_with_volume(&author_token).await;

    let (status, _) = server
        .post(
            "/api/reports",
            &reader_token,
            json!({ "target_type": "series", "target_id": series_id + 100, "reason": "spam" }),
        )
        .await;
    assert_eq!(status, 404);

    let (status, _) = server
        .post(
            "/api/reports",
            &reader_token,
            json!({ "target_type": "series", "target_id": series_id, "reason": "" }),
        )
        .await;
    assert_eq!(status, 400);

    let (status, _) = server
        .post(
            "/api/reports",
            &reader_token,
            json!({ "target_type": "series", "target_id": series_id, "reason": "spam" }),
        )
        .await;
    assert_eq!(status, 201);

    let (status, page) = server
        .get("/api/moderation/reports?target_type=series", Some(&mod_token))
        .await;
    assert_eq!(status, 200);
    assert_eq!(page["total"], 1);
    assert_eq!(page["entries"][0]["target_id"], series_id.to_string());

    let (_, page) = server
        .get("/api/moderation/reports?target_type=comment", Some(&mod_token))
        .await;
    assert_eq!(page["total"], 0);

    let (status, _) = server
        .get("/api/moderation/reports?limit=500", Some(&mod_token))
        .await;
    assert_eq!(status, 400);

    let (status, _) = server
        .post(
            &format!("/api/moderation/reports/review/{}/dismiss", uuid_like()),
            &mod_token,
            json!({}),
        )
        .await;
    assert_eq!(status, 404);
}

fn uuid_like() -> &'static str {
    "6f1d3c3e-5b7a-4c1e-9a51-0d2f8e7b9c10"
}
