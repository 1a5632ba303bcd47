mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{proxy_config, test_state, IDENTITY_HEADER};
use together::config::{BoardScope, Config};
use together::routes;

struct TestApp {
    _temp_dir: tempfile::TempDir,
    app: Router,
}

impl TestApp {
    fn new(config: Config) -> Self {
        Self::build(config, false)
    }

    fn build(config: Config, test_seed: bool) -> Self {
        let (temp_dir, state) = test_state(config);
        Self {
            _temp_dir: temp_dir,
            app: routes::app(state, test_seed),
        }
    }

    fn shared() -> Self {
        Self::new(proxy_config(BoardScope::Shared))
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn call(&self, method: Method, uri: &str, user: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(IDENTITY_HEADER, user);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    async fn get(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, user, None).await
    }

    async fn post(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, user, Some(body)).await
    }

    async fn put(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, user, Some(body)).await
    }

    async fn delete(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, user, None).await
    }
}

// -- Auth --

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let app = TestApp::shared();

    for uri in [
        "/api/notes",
        "/api/memories",
        "/api/preferences",
        "/api/auth/user",
        "/api/dashboard",
    ] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["message"], "Unauthorized");
    }
}

#[tokio::test]
async fn mutations_without_identity_are_rejected() {
    let app = TestApp::shared();

    let cases = [
        (Method::POST, "/api/notes", Some(json!({ "content": "hi" }))),
        (Method::PUT, "/api/notes/1", Some(json!({ "content": "hi" }))),
        (Method::PATCH, "/api/notes/1", Some(json!({ "x": 3 }))),
        (Method::DELETE, "/api/notes/1", None),
        (
            Method::POST,
            "/api/memories",
            Some(json!({ "imageUrl": "https://example.com/a.jpg" })),
        ),
        (Method::DELETE, "/api/memories/1", None),
        (
            Method::PUT,
            "/api/preferences",
            Some(json!({ "partnerName": "Bob" })),
        ),
    ];

    for (method, uri, body) in cases {
        let mut builder = Request::builder().method(method.clone()).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let (status, body) = app.send(builder.body(body).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["message"], "Unauthorized");
    }

    // Nothing was written on the way to the 401s
    let (_, notes) = app.get("/api/notes", "alice").await;
    assert_eq!(notes, json!([]));
    let (_, memories) = app.get("/api/memories", "alice").await;
    assert_eq!(memories, json!([]));
}

#[tokio::test]
async fn seed_endpoint_issues_a_working_session() {
    let app = TestApp::build(proxy_config(BoardScope::Shared), true);

    let request = Request::builder()
        .uri("/test/seed")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("together_session="));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let request = Request::builder()
        .uri("/api/auth/user")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, user) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["id"], "testuser");
}

#[tokio::test]
async fn seed_endpoint_is_not_mounted_by_default() {
    let app = TestApp::shared();
    let request = Request::builder()
        .uri("/test/seed")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn forwarded_identity_is_ignored_unless_configured() {
    let app = TestApp::new(Config::default());
    let (status, _) = app.get("/api/notes", "alice").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_issues_a_session_cookie_that_authenticates() {
    let app = TestApp::shared();

    let request = Request::builder()
        .uri("/api/login")
        .header(IDENTITY_HEADER, "alice")
        .header("x-forwarded-email", "alice@example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("together_session="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    // The cookie alone is enough from now on
    let request = Request::builder()
        .uri("/api/auth/user")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, user) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["id"], "alice");
    assert_eq!(user["email"], "alice@example.com");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/logout")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let request = Request::builder()
        .uri("/api/auth/user")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_without_identity_is_unauthorized() {
    let app = TestApp::shared();
    let request = Request::builder()
        .uri("/api/login")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// -- Notes --

#[tokio::test]
async fn create_note_echoes_fields_with_id_and_timestamp() {
    let app = TestApp::shared();

    let (status, note) = app
        .post(
            "/api/notes",
            "alice",
            json!({ "content": "Buy milk", "color": "pink", "rotation": -2 }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(note["id"].as_i64().unwrap() > 0);
    assert_eq!(note["userId"], "alice");
    assert_eq!(note["content"], "Buy milk");
    assert_eq!(note["color"], "pink");
    assert_eq!(note["rotation"], -2);
    assert_eq!(note["x"], 0);
    assert_eq!(note["isDraft"], false);
    assert!(note["createdAt"].is_string());
}

#[tokio::test]
async fn empty_note_content_is_a_bad_request() {
    let app = TestApp::shared();

    let (status, body) = app
        .post("/api/notes", "alice", json!({ "content": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Content is required");

    let (status, body) = app.post("/api/notes", "alice", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Content is required");

    let (_, notes) = app.get("/api/notes", "alice").await;
    assert_eq!(notes, json!([]));
}

#[tokio::test]
async fn unknown_note_color_is_a_bad_request() {
    let app = TestApp::shared();
    let (status, body) = app
        .post("/api/notes", "alice", json!({ "content": "hi", "color": "plaid" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn notes_list_newest_first() {
    let app = TestApp::shared();
    for content in ["first", "second", "third"] {
        app.post("/api/notes", "alice", json!({ "content": content }))
            .await;
    }

    let (status, notes) = app.get("/api/notes", "alice").await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = notes
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["third", "second", "first"]);
}

#[tokio::test]
async fn update_note_merges_given_fields() {
    let app = TestApp::shared();
    let (_, note) = app
        .post(
            "/api/notes",
            "alice",
            json!({ "content": "draft", "color": "green", "isDraft": true }),
        )
        .await;
    let id = note["id"].as_i64().unwrap();

    let (status, updated) = app
        .put(
            &format!("/api/notes/{id}"),
            "alice",
            json!({ "isDraft": false, "x": 40, "y": 12 }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], "draft");
    assert_eq!(updated["color"], "green");
    assert_eq!(updated["isDraft"], false);
    assert_eq!((updated["x"].as_i64(), updated["y"].as_i64()), (Some(40), Some(12)));
    assert_eq!(updated["createdAt"], note["createdAt"]);
}

#[tokio::test]
async fn update_missing_note_is_not_found() {
    let app = TestApp::shared();
    let (status, body) = app
        .put("/api/notes/9999", "alice", json!({ "content": "ghost" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Note not found");
}

#[tokio::test]
async fn deleted_notes_leave_the_list() {
    let app = TestApp::shared();
    let (_, keep) = app
        .post("/api/notes", "alice", json!({ "content": "keep" }))
        .await;
    let (_, gone) = app
        .post("/api/notes", "alice", json!({ "content": "gone" }))
        .await;

    let (status, body) = app
        .delete(&format!("/api/notes/{}", gone["id"]), "alice")
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (_, notes) = app.get("/api/notes", "alice").await;
    let ids: Vec<i64> = notes
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [keep["id"].as_i64().unwrap()]);
}

#[tokio::test]
async fn deleting_a_missing_note_still_succeeds() {
    let app = TestApp::shared();
    let (status, _) = app.delete("/api/notes/424242", "alice").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn non_numeric_ids_get_a_json_bad_request() {
    let app = TestApp::shared();

    for (method, uri) in [
        (Method::DELETE, "/api/notes/abc"),
        (Method::DELETE, "/api/memories/abc"),
    ] {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(IDENTITY_HEADER, "alice")
            .body(Body::empty())
            .unwrap();
        let response = app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["message"].as_str().unwrap().contains("abc"));
    }

    let (status, body) = app
        .put("/api/notes/abc", "alice", json!({ "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn shared_board_shows_both_partners_notes() {
    let app = TestApp::shared();
    app.post("/api/notes", "alice", json!({ "content": "from alice" }))
        .await;
    app.post("/api/notes", "bob", json!({ "content": "from bob" }))
        .await;

    let (_, notes) = app.get("/api/notes", "alice").await;
    assert_eq!(notes.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn personal_board_shows_only_own_rows() {
    let app = TestApp::new(proxy_config(BoardScope::Personal));
    app.post("/api/notes", "alice", json!({ "content": "from alice" }))
        .await;
    app.post("/api/notes", "bob", json!({ "content": "from bob" }))
        .await;
    app.post(
        "/api/memories",
        "bob",
        json!({ "imageUrl": "https://example.com/bob.jpg" }),
    )
    .await;

    let (_, notes) = app.get("/api/notes", "alice").await;
    let notes = notes.as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["content"], "from alice");

    let (_, memories) = app.get("/api/memories", "alice").await;
    assert_eq!(memories, json!([]));
}

// -- Memories --

#[tokio::test]
async fn memories_list_by_date_not_upload_order() {
    let app = TestApp::shared();
    let uploads = [
        ("https://example.com/a.jpg", "2023-03-01T00:00:00Z"),
        ("https://example.com/b.jpg", "2024-07-15T00:00:00Z"),
        ("https://example.com/c.jpg", "2022-12-25T00:00:00Z"),
    ];
    for (url, date) in uploads {
        let (status, memory) = app
            .post("/api/memories", "alice", json!({ "imageUrl": url, "date": date }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(memory["imageUrl"], url);
    }

    let (_, memories) = app.get("/api/memories", "bob").await;
    let urls: Vec<&str> = memories
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["imageUrl"].as_str().unwrap())
        .collect();
    assert_eq!(
        urls,
        [
            "https://example.com/b.jpg",
            "https://example.com/a.jpg",
            "https://example.com/c.jpg"
        ]
    );
}

#[tokio::test]
async fn memory_without_image_is_a_bad_request() {
    let app = TestApp::shared();
    let (status, body) = app
        .post("/api/memories", "alice", json!({ "caption": "no photo" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Image URL is required");
}

#[tokio::test]
async fn memory_date_defaults_to_now_and_delete_removes_it() {
    let app = TestApp::shared();
    let (_, memory) = app
        .post(
            "/api/memories",
            "alice",
            json!({ "imageUrl": "https://example.com/x.jpg", "caption": "beach" }),
        )
        .await;
    assert_eq!(memory["caption"], "beach");
    assert!(memory["date"].is_string());

    let (status, _) = app
        .delete(&format!("/api/memories/{}", memory["id"]), "alice")
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, memories) = app.get("/api/memories", "alice").await;
    assert_eq!(memories, json!([]));
}

#[tokio::test]
async fn deleting_a_missing_memory_still_succeeds() {
    let app = TestApp::shared();
    let (status, body) = app.delete("/api/memories/424242", "alice").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::shared();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/memories")
        .header(IDENTITY_HEADER, "alice")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

// -- Preferences --

#[tokio::test]
async fn preferences_start_empty() {
    let app = TestApp::shared();
    let (status, prefs) = app.get("/api/preferences", "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prefs, json!({}));
}

#[tokio::test]
async fn preference_upserts_keep_a_single_row() {
    let app = TestApp::shared();

    let (status, first) = app
        .put(
            "/api/preferences",
            "alice",
            json!({ "partnerName": "Bob", "partnerTimezone": "Europe/Paris" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["themeColor"], "blue");

    let (_, second) = app
        .put(
            "/api/preferences",
            "alice",
            json!({ "partnerTimezone": "America/New_York" }),
        )
        .await;
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["partnerName"], "Bob");
    assert_eq!(second["partnerTimezone"], "America/New_York");

    let (_, stored) = app.get("/api/preferences", "alice").await;
    assert_eq!(stored, second);

    // Bob's preferences are his own
    let (_, bobs) = app.get("/api/preferences", "bob").await;
    assert_eq!(bobs, json!({}));
}

#[tokio::test]
async fn explicit_null_clears_a_preference() {
    let app = TestApp::shared();
    app.put(
        "/api/preferences",
        "alice",
        json!({ "partnerName": "Bob", "relationshipStartDate": "2020-02-14T00:00:00Z" }),
    )
    .await;

    let (_, prefs) = app
        .put(
            "/api/preferences",
            "alice",
            json!({ "relationshipStartDate": null }),
        )
        .await;
    assert_eq!(prefs["partnerName"], "Bob");
    assert_eq!(prefs["relationshipStartDate"], Value::Null);
}

#[tokio::test]
async fn invalid_partner_timezone_is_rejected() {
    let app = TestApp::shared();
    let (status, body) = app
        .put(
            "/api/preferences",
            "alice",
            json!({ "partnerTimezone": "Mars/Olympus_Mons" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid timezone: Mars/Olympus_Mons");

    let (_, prefs) = app.get("/api/preferences", "alice").await;
    assert_eq!(prefs, json!({}));
}

// -- Dashboard --

#[tokio::test]
async fn dashboard_snapshot_uses_preferences() {
    let app = TestApp::shared();
    app.put(
        "/api/preferences",
        "alice",
        json!({
            "partnerName": "Bob",
            "partnerTimezone": "America/Los_Angeles",
            "relationshipStartDate": "2020-02-14T00:00:00Z"
        }),
    )
    .await;
    for content in ["one", "two", "three"] {
        app.post("/api/notes", "alice", json!({ "content": content }))
            .await;
    }

    let (status, dash) = app.get("/api/dashboard?tz=Asia/Kolkata", "alice").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(dash["clock"]["mine"]["label"], "My Time");
    assert_eq!(dash["clock"]["mine"]["place"], "Kolkata");
    assert_eq!(dash["clock"]["mine"]["utcOffsetMinutes"], 330);
    assert_eq!(dash["clock"]["partner"]["label"], "Bob's Time");
    assert_eq!(dash["clock"]["partner"]["place"], "Los Angeles");
    assert!(dash["together"]["years"].as_i64().unwrap() >= 6);

    let recent: Vec<&str> = dash["recentNotes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["content"].as_str().unwrap())
        .collect();
    assert_eq!(recent, ["three", "two"]);
    assert_eq!(dash["latestMemory"], Value::Null);
}

#[tokio::test]
async fn dashboard_defaults_without_preferences() {
    let app = TestApp::shared();
    let (status, dash) = app.get("/api/dashboard", "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["clock"]["mine"]["timezone"], "UTC");
    assert_eq!(dash["clock"]["partner"]["timezone"], "Asia/Tokyo");
    assert_eq!(dash["clock"]["partner"]["label"], "Partner's Time");
    assert_eq!(dash["together"], Value::Null);
}

#[tokio::test]
async fn dashboard_rejects_unknown_viewer_timezone() {
    let app = TestApp::shared();
    let (status, body) = app.get("/api/dashboard?tz=Nowhere/Land", "alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid timezone: Nowhere/Land");
}

#[tokio::test]
async fn malformed_dashboard_query_gets_a_json_bad_request() {
    let app = TestApp::shared();
    let (status, body) = app
        .get("/api/dashboard?tz=UTC&tz=Asia/Tokyo", "alice")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn dashboard_stream_sends_tick_events() {
    let app = TestApp::shared();
    let request = Request::builder()
        .uri("/api/dashboard/stream")
        .header(IDENTITY_HEADER, "alice")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let mut body = response.into_body().into_data_stream();
    let chunk = body.next().await.unwrap().unwrap();
    let frame = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(frame.starts_with("event: tick\n"), "{frame}");

    let data = frame
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let tick: Value = serde_json::from_str(data).unwrap();
    assert_eq!(tick["clock"]["partner"]["timezone"], "Asia/Tokyo");
}
