use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::config::Config;
use crate::db::{
    CreateSharedLink, FeedbackRepository, LinkKind, SharedLinkRepository, UserRepository,
};
use crate::services::approvals::{ApprovalService, ReminderRequest};
use crate::services::init::init_memory_db;
use crate::services::links::LinkService;
use crate::services::speech::SpeechService;
use crate::services::storage::StorageSigner;
use crate::AppState;

async fn test_state(public_app_url: Option<&str>) -> Arc<AppState> {
    let mut config = Config::default();
    config.jwt.secret = "test-secret".to_string();
    config.jwt.bcrypt_cost = 4;
    config.server.public_app_url = public_app_url.map(str::to_string);

    let db = init_memory_db().await.unwrap();
    let speech = SpeechService::new(&config.speech).unwrap();

    Arc::new(AppState {
        db,
        config,
        speech,
        storage: Some(StorageSigner::new("https://cdn.example.com", b"signing-key", 600)),
    })
}

async fn setup() -> (Arc<AppState>, Router) {
    let state = test_state(Some("https://app.example.com")).await;
    let app = crate::app(state.clone());
    (state, app)
}

fn request(method: Method, uri: &str, session: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = session {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

/// Register a user and return `(session token, user id)`.
async fn register(app: &Router, email: &str) -> (String, String) {
    let (status, _, body) = send(
        app,
        request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": "correct horse", "display_name": "Ana" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_artwork(app: &Router, session: &str, project_id: Option<&str>) -> String {
    let (status, _, body) = send(
        app,
        request(
            Method::POST,
            "/api/arte",
            Some(session),
            Some(json!({ "title": "Poster", "project_id": project_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _, body) = send(
        app,
        request(
            Method::POST,
            &format!("/api/arte/{}/versoes", id),
            Some(session),
            Some(json!({ "file_path": format!("artworks/{}/v1.png", id) })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["version_number"], 1);

    id
}

async fn create_link(app: &Router, session: &str, payload: Value) -> String {
    let (status, _, body) = send(
        app,
        request(Method::POST, "/api/links", Some(session), Some(payload)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

fn feedback_uri(artwork_id: &str, token: &str) -> String {
    format!("/api/arte/{}/feedbacks?token={}", artwork_id, token)
}

// ============================================================================
// Link resolution
// ============================================================================

#[tokio::test]
async fn unknown_token_is_not_found_everywhere() {
    let (_state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;

    let (status, _, body) = send(
        &app,
        request(Method::GET, &feedback_uri(&artwork, "nope"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _, _) = send(&app, request(Method::GET, "/l/nope", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, request(Method::GET, "/api/l/nope", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn redirects_to_viewer_for_each_kind() {
    let (_state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;

    let token = create_link(&app, &owner, json!({ "kind": "ARTWORK", "target_id": artwork })).await;
    let (status, headers, _) = send(
        &app,
        request(Method::GET, &format!("/l/{}", token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        headers[header::LOCATION],
        format!("https://app.example.com/view/arte/{}?token={}", artwork, token).as_str()
    );

    let (_, _, project) = send(
        &app,
        request(Method::POST, "/api/projetos", Some(&owner), Some(json!({ "name": "Campanha" }))),
    )
    .await;
    let project_id = project["id"].as_str().unwrap();
    let token = create_link(
        &app,
        &owner,
        json!({ "kind": "project", "target_id": project_id }),
    )
    .await;
    let (status, headers, _) = send(
        &app,
        request(Method::GET, &format!("/l/{}", token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        headers[header::LOCATION],
        format!("https://app.example.com/view/projeto/{}?token={}", project_id, token).as_str()
    );
}

#[tokio::test]
async fn redirect_without_public_url_is_unavailable() {
    let state = test_state(None).await;
    let app = crate::app(state);
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;
    let token = create_link(&app, &owner, json!({ "kind": "ARTWORK", "target_id": artwork })).await;

    let (status, _, _) = send(
        &app,
        request(Method::GET, &format!("/l/{}", token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn resolved_link_includes_target_and_flags() {
    let (_state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;
    let token = create_link(
        &app,
        &owner,
        json!({ "kind": "ARTWORK", "target_id": artwork, "read_only": true }),
    )
    .await;

    let (status, _, body) = send(
        &app,
        request(Method::GET, &format!("/api/l/{}", token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["kind"], "ARTWORK");
    assert_eq!(body["read_only"], true);
    assert_eq!(body["can_comment"], true);
    assert_eq!(body["can_download"], false);
    assert_eq!(body["target"]["id"], artwork.as_str());
    assert_eq!(body["target"]["versions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn revoked_link_stops_resolving() {
    let (state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;
    let token = create_link(&app, &owner, json!({ "kind": "ARTWORK", "target_id": artwork })).await;
    let link = LinkService::resolve(&state, &token).await.unwrap();

    let (status, _, _) = send(
        &app,
        request(Method::DELETE, &format!("/api/links/{}", link.id), Some(&owner), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = send(
        &app,
        request(Method::GET, &feedback_uri(&artwork, &token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Feedback gateway
// ============================================================================

#[tokio::test]
async fn missing_token_without_session_is_bad_request() {
    let (_state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;

    let uri = format!("/api/arte/{}/feedbacks", artwork);
    let (status, _, _) = send(&app, request(Method::GET, &uri, None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        request(Method::GET, &format!("{}?token=", uri), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The owner's session is enough without a token.
    let (status, _, body) = send(&app, request(Method::GET, &uri, Some(&owner), None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (stranger, _) = register(&app, "stranger@studio.com").await;
    let (status, _, _) = send(&app, request(Method::GET, &uri, Some(&stranger), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_link_is_denied_regardless_of_flags() {
    let (state, app) = setup().await;
    let (owner, owner_id) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;

    let link = SharedLinkRepository::create(
        &state.db,
        CreateSharedLink {
            owner_id,
            token: LinkService::generate_token(),
            kind: LinkKind::Artwork,
            target_id: artwork.clone(),
            expires_at: Some(Utc::now().naive_utc() - Duration::minutes(1)),
            read_only: false,
            can_comment: true,
            can_download: true,
        },
    )
    .await
    .unwrap();

    let uri = feedback_uri(&artwork, &link.token);
    let (status, _, _) = send(&app, request(Method::GET, &uri, None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(
        &app,
        request(Method::POST, &uri, None, Some(json!({ "content": "Oi" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(FeedbackRepository::count_by_artwork(&state.db, &artwork).await.unwrap(), 0);

    let (status, _, _) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/arte/{}/download?token={}", artwork, link.token),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(
        &app,
        request(Method::GET, &format!("/l/{}", link.token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn link_without_comment_permission_cannot_write() {
    let (state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;

    for payload in [
        json!({ "kind": "ARTWORK", "target_id": artwork, "can_comment": false }),
        json!({ "kind": "ARTWORK", "target_id": artwork, "can_comment": true, "read_only": true }),
    ] {
        let token = create_link(&app, &owner, payload).await;
        let uri = feedback_uri(&artwork, &token);

        let (status, _, body) = send(
            &app,
            request(Method::POST, &uri, None, Some(json!({ "content": "Mude a cor" }))),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

        // Reads are still allowed.
        let (status, _, body) = send(&app, request(Method::GET, &uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);
    }

    assert_eq!(FeedbackRepository::count_by_artwork(&state.db, &artwork).await.unwrap(), 0);
}

#[tokio::test]
async fn feedback_is_appended_and_listed_oldest_first() {
    let (state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;
    let token = create_link(&app, &owner, json!({ "kind": "ARTWORK", "target_id": artwork })).await;
    let uri = feedback_uri(&artwork, &token);

    for content in ["primeiro", "segundo"] {
        let (status, _, body) = send(
            &app,
            request(
                Method::POST,
                &uri,
                None,
                Some(json!({ "content": content, "author_name": "Cliente" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["kind"], "TEXT");
        assert_eq!(body["status"], "open");
    }

    let (_, _, body) = send(&app, request(Method::GET, &uri, None, None)).await;
    let contents: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["primeiro", "segundo"]);

    // The owner path returns the same order.
    let (_, _, body) = send(
        &app,
        request(Method::GET, &format!("/api/arte/{}/feedbacks", artwork), Some(&owner), None),
    )
    .await;
    assert_eq!(body[0]["content"], "primeiro");
    assert_eq!(FeedbackRepository::count_by_artwork(&state.db, &artwork).await.unwrap(), 2);
}

#[tokio::test]
async fn feedback_validation_rejects_bad_input() {
    let (state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;
    let token = create_link(&app, &owner, json!({ "kind": "ARTWORK", "target_id": artwork })).await;
    let uri = feedback_uri(&artwork, &token);

    for payload in [
        json!({ "content": "   " }),
        json!({ "content": "x".repeat(5001) }),
        json!({ "content": "ok", "kind": "VIDEO" }),
        json!({ "kind": "AUDIO", "attachment_path": "feedback-audio/other/clip.webm" }),
        json!({ "content": "ok", "version_id": "missing" }),
    ] {
        let (status, _, body) = send(&app, request(Method::POST, &uri, None, Some(payload))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
    assert_eq!(FeedbackRepository::count_by_artwork(&state.db, &artwork).await.unwrap(), 0);

    let (status, _, slot) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/arte/{}/feedbacks/upload-url?token={}", artwork, token),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{slot}");
    assert!(slot["url"].as_str().unwrap().starts_with("https://cdn.example.com/feedback-audio/"));

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            &uri,
            None,
            Some(json!({ "kind": "AUDIO", "attachment_path": slot["path"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["kind"], "AUDIO");
}

#[tokio::test]
async fn link_scope_is_enforced() {
    let (_state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;

    let (_, _, project) = send(
        &app,
        request(Method::POST, "/api/projetos", Some(&owner), Some(json!({ "name": "Campanha" }))),
    )
    .await;
    let project_id = project["id"].as_str().unwrap().to_string();

    let in_project = create_artwork(&app, &owner, Some(&project_id)).await;
    let outside = create_artwork(&app, &owner, None).await;

    let artwork_token = create_link(
        &app,
        &owner,
        json!({ "kind": "ARTWORK", "target_id": in_project }),
    )
    .await;
    let (status, _, _) = send(
        &app,
        request(Method::GET, &feedback_uri(&outside, &artwork_token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let project_token = create_link(
        &app,
        &owner,
        json!({ "kind": "PROJECT", "target_id": project_id }),
    )
    .await;
    let (status, _, _) = send(
        &app,
        request(Method::GET, &feedback_uri(&in_project, &project_token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(
        &app,
        request(Method::GET, &feedback_uri(&outside, &project_token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn closed_artwork_rejects_feedback() {
    let (_state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;
    let token = create_link(&app, &owner, json!({ "kind": "ARTWORK", "target_id": artwork })).await;

    let close_uri = format!("/api/arte/{}/fechar", artwork);
    let (status, _, body) = send(&app, request(Method::POST, &close_uri, Some(&owner), None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["artwork"]["status"], "closed");

    let (status, _, _) = send(&app, request(Method::POST, &close_uri, Some(&owner), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            &feedback_uri(&artwork, &token),
            None,
            Some(json!({ "content": "tarde" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn download_requires_permission() {
    let (_state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;

    let no_download = create_link(
        &app,
        &owner,
        json!({ "kind": "ARTWORK", "target_id": artwork }),
    )
    .await;
    let (status, _, _) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/arte/{}/download?token={}", artwork, no_download),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let with_download = create_link(
        &app,
        &owner,
        json!({ "kind": "ARTWORK", "target_id": artwork, "can_download": true }),
    )
    .await;
    let (status, headers, _) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/arte/{}/download?token={}", artwork, with_download),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    let location = headers[header::LOCATION].to_str().unwrap();
    let prefix = format!("https://cdn.example.com/artworks/{}/v1.png?expires=", artwork);
    assert!(location.starts_with(&prefix));
}

#[tokio::test]
async fn replies_and_status_follow_the_same_gate() {
    let (_state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;
    let token = create_link(&app, &owner, json!({ "kind": "ARTWORK", "target_id": artwork })).await;
    let read_only = create_link(
        &app,
        &owner,
        json!({ "kind": "ARTWORK", "target_id": artwork, "read_only": true }),
    )
    .await;

    let (_, _, feedback) = send(
        &app,
        request(
            Method::POST,
            &feedback_uri(&artwork, &token),
            None,
            Some(json!({ "content": "Logo maior" })),
        ),
    )
    .await;
    let feedback_id = feedback["id"].as_str().unwrap();
    let replies_uri = format!("/api/feedbacks/{}/respostas", feedback_id);

    let (status, _, _) = send(
        &app,
        request(Method::POST, &replies_uri, Some(&owner), Some(json!({ "content": "Feito" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            &format!("{}?token={}", replies_uri, read_only),
            None,
            Some(json!({ "content": "Obrigado" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(
        &app,
        request(Method::GET, &format!("{}?token={}", replies_uri, read_only), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["author_name"], "Ana");

    let (status, _, body) = send(
        &app,
        request(
            Method::PATCH,
            &format!("/api/feedbacks/{}/status", feedback_id),
            Some(&owner),
            Some(json!({ "status": "resolved" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "resolved");
}

#[tokio::test]
async fn reply_access_validates_token_before_feedback_lookup() {
    let (state, app) = setup().await;
    let (owner, owner_id) = register(&app, "owner@studio.com").await;
    let artwork = create_artwork(&app, &owner, None).await;
    let token = create_link(&app, &owner, json!({ "kind": "ARTWORK", "target_id": artwork })).await;

    let (_, _, feedback) = send(
        &app,
        request(
            Method::POST,
            &feedback_uri(&artwork, &token),
            None,
            Some(json!({ "content": "Logo maior" })),
        ),
    )
    .await;
    let existing = feedback["id"].as_str().unwrap().to_string();

    let expired = SharedLinkRepository::create(
        &state.db,
        CreateSharedLink {
            owner_id,
            token: LinkService::generate_token(),
            kind: LinkKind::Artwork,
            target_id: artwork.clone(),
            expires_at: Some(Utc::now().naive_utc() - Duration::minutes(1)),
            read_only: false,
            can_comment: true,
            can_download: true,
        },
    )
    .await
    .unwrap();

    for (bad_token, expected) in [
        ("bogus-token", StatusCode::NOT_FOUND),
        (expired.token.as_str(), StatusCode::FORBIDDEN),
    ] {
        let mut responses = Vec::new();
        for feedback_id in [existing.as_str(), "missing-feedback"] {
            let uri = format!("/api/feedbacks/{}/respostas?token={}", feedback_id, bad_token);
            let (status, _, body) = send(&app, request(Method::GET, &uri, None, None)).await;
            assert_eq!(status, expected, "{body}");
            responses.push(body);
        }
        assert_eq!(responses[0], responses[1]);
    }

    // A live link cannot discover feedback outside its artwork either.
    let uri = format!("/api/feedbacks/missing-feedback/respostas?token={}", token);
    let (status, _, _) = send(&app, request(Method::GET, &uri, None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Approvals and reminders
// ============================================================================

async fn approval_fixture(app: &Router) -> (String, String, String, String, String) {
    let (owner, _) = register(app, "owner@studio.com").await;
    let (approver, approver_id) = register(app, "cliente@empresa.com").await;
    let artwork = create_artwork(app, &owner, None).await;

    let (status, _, approval) = send(
        app,
        request(
            Method::POST,
            &format!("/api/arte/{}/aprovacoes", artwork),
            Some(&owner),
            Some(json!({ "approver_id": approver_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{approval}");
    assert_eq!(approval["status"], "pending");

    let approval_id = approval["id"].as_str().unwrap().to_string();
    (owner, approver, approver_id, artwork, approval_id)
}

#[tokio::test]
async fn reminder_respects_cooldown() {
    let (state, app) = setup().await;
    let (owner, _approver, approver_id, artwork, approval_id) = approval_fixture(&app).await;
    let uri = format!("/api/arte/{}/lembrete", artwork);
    let body = json!({ "approval_id": approval_id, "recipient_id": approver_id });

    let (status, _, first) = send(
        &app,
        request(Method::POST, &uri, Some(&owner), Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["reminder"]["recipient_id"], approver_id.as_str());

    let (status, _, second) = send(
        &app,
        request(Method::POST, &uri, Some(&owner), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = second["error"]["message"].as_str().unwrap();
    assert!(message.contains("24h"), "{message}");

    // Once the window has passed the reminder goes through.
    let owner_user = UserRepository::find_by_email(&state.db, "owner@studio.com")
        .await
        .unwrap()
        .unwrap();
    let later = Utc::now().naive_utc() + Duration::hours(25);
    let reminder = ApprovalService::remind_at(
        &state,
        &owner_user,
        &artwork,
        ReminderRequest {
            approval_id: approval_id.clone(),
            recipient_id: approver_id.clone(),
            ..Default::default()
        },
        later,
    )
    .await
    .unwrap();
    assert_eq!(reminder.sent_at, later);
}

#[tokio::test]
async fn reminder_input_is_validated() {
    let (_state, app) = setup().await;
    let (owner, _approver, approver_id, artwork, approval_id) = approval_fixture(&app).await;
    let uri = format!("/api/arte/{}/lembrete", artwork);

    for body in [
        json!({ "recipient_id": approver_id }),
        json!({ "approval_id": approval_id, "recipient_id": "" }),
        json!({ "approval_id": approval_id, "recipient_id": approver_id, "cooldown_hours": -1 }),
        json!({ "approval_id": approval_id, "recipient_id": "someone-else" }),
    ] {
        let (status, _, resp) = send(
            &app,
            request(Method::POST, &uri, Some(&owner), Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{resp}");
    }

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            &uri,
            Some(&owner),
            Some(json!({ "approval_id": "missing", "recipient_id": approver_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A zero cooldown allows back-to-back reminders.
    let body = json!({
        "approval_id": approval_id,
        "recipient_id": approver_id,
        "cooldown_hours": 0
    });
    for _ in 0..2 {
        let (status, _, resp) = send(
            &app,
            request(Method::POST, &uri, Some(&owner), Some(body.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{resp}");
    }
}

#[tokio::test]
async fn approver_decision_settles_the_request() {
    let (_state, app) = setup().await;
    let (owner, approver, approver_id, artwork, approval_id) = approval_fixture(&app).await;
    let decide_uri = format!("/api/aprovacoes/{}/decisao", approval_id);

    let (status, _, _) = send(
        &app,
        request(Method::POST, &decide_uri, Some(&owner), Some(json!({ "approved": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            &decide_uri,
            Some(&approver),
            Some(json!({ "approved": true, "comment": "Aprovado!" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "approved");

    let (status, _, _) = send(
        &app,
        request(Method::POST, &decide_uri, Some(&approver), Some(json!({ "approved": false }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, _, detail) = send(
        &app,
        request(Method::GET, &format!("/api/arte/{}", artwork), Some(&owner), None),
    )
    .await;
    assert_eq!(detail["status"], "approved");

    // Decided approvals can no longer be reminded.
    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/arte/{}/lembrete", artwork),
            Some(&owner),
            Some(json!({ "approval_id": approval_id, "recipient_id": approver_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Auth, health, speech
// ============================================================================

#[tokio::test]
async fn login_sets_session_cookie() {
    let (_state, app) = setup().await;
    register(&app, "owner@studio.com").await;

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "OWNER@studio.com",
                "password": "another one",
                "display_name": "B"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "owner@studio.com", "password": "wrong password" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, headers, _) = send(
        &app,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "owner@studio.com", "password": "correct horse" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let session = cookie.split(';').next().unwrap().to_string();
    let req = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, session)
        .body(Body::empty())
        .unwrap();
    let (status, _, me) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "owner@studio.com");
    assert!(me.get("password_hash").is_none());

    let (status, _, _) = send(&app, request(Method::GET, "/api/auth/me", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_database() {
    let (_state, app) = setup().await;
    let (status, headers, body) = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "ok");
    assert_eq!(headers["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn speech_without_api_key_is_not_configured() {
    let (_state, app) = setup().await;
    let (owner, _) = register(&app, "owner@studio.com").await;

    let (status, _, body) = send(
        &app,
        request(Method::POST, "/api/speech/tts", Some(&owner), Some(json!({ "text": "olá" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["error"]["code"], "NOT_CONFIGURED");

    let (status, _, _) = send(
        &app,
        request(Method::POST, "/api/speech/tts", None, Some(json!({ "text": "olá" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
