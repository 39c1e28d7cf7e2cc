use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use yamdb::api::AppState;
use yamdb::config::Config;
use yamdb::db::NewUser;
use yamdb::domain::Role;
use yamdb::mail::{Mailer, MemoryMailer};

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    mailer: Arc<MemoryMailer>,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

async fn spawn_app() -> TestApp {
    let db_path = std::env::temp_dir().join(format!("yamdb_test_{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}?mode=rwc", db_path.display());
    config.server.default_page_size = 10;
    config.server.max_page_size = 50;

    let mailer = Arc::new(MemoryMailer::new());
    let state = yamdb::api::create_app_state_from_config(
        config,
        Some(mailer.clone() as Arc<dyn Mailer>),
        None,
    )
    .await
    .expect("Failed to create app state");

    TestApp {
        router: yamdb::api::router(state.clone()),
        state,
        mailer,
        db_path,
    }
}

impl TestApp {
    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Signs up through the API and exchanges the mailed code for a token.
    async fn signup_and_login(&self, username: &str) -> String {
        let email = format!("{username}@example.com");
        let (status, _) = self
            .post(
                "/v1/auth/signup/",
                None,
                json!({"username": username, "email": email}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let code = self.mailer.last_code_for(username).unwrap();
        let (status, body) = self
            .post(
                "/v1/auth/token/",
                None,
                json!({"username": username, "confirmation_code": code}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    /// Creates an account with `role` directly in the store and issues a token.
    async fn user_with_role(&self, username: &str, role: Role) -> String {
        let store = self.state.store();
        let user = store
            .users()
            .create(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                role,
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .tokens()
            .issue(user.id, chrono::Duration::hours(1))
            .await
            .unwrap()
    }

    /// Seeds a category, two genres and one title; returns the title id.
    async fn seed_title(&self, admin: &str) -> i64 {
        self.post(
            "/v1/categories/",
            Some(admin),
            json!({"name": "Films", "slug": "films"}),
        )
        .await;
        self.post(
            "/v1/genres/",
            Some(admin),
            json!({"name": "Drama", "slug": "drama"}),
        )
        .await;
        self.post(
            "/v1/genres/",
            Some(admin),
            json!({"name": "Comedy", "slug": "comedy"}),
        )
        .await;

        let (status, body) = self
            .post(
                "/v1/titles/",
                Some(admin),
                json!({
                    "name": "The Seventh Seal",
                    "year": 1957,
                    "description": "A knight plays chess with Death",
                    "genre": ["drama"],
                    "category": "films"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_signup_and_token_exchange() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"email": "bob@example.com", "username": "bob"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"email": "bob@example.com", "username": "bob"}));

    let code = app.mailer.last_code_for("bob").unwrap();

    let (status, body) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "bob", "confirmation_code": "definitely-wrong"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["confirmation_code"].is_array());

    let (status, body) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "bob", "confirmation_code": code}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    // A code works once
    let (status, _) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "bob", "confirmation_code": code}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/v1/users/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "bob");
    assert_eq!(body["role"], "user");

    let (status, _) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "nobody", "confirmation_code": code}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_repeated_signup_reissues_code() {
    let app = spawn_app().await;
    let body = json!({"email": "bob@example.com", "username": "bob"});

    let (status, _) = app.post("/v1/auth/signup/", None, body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let first = app.mailer.last_code_for("bob").unwrap();

    let (status, _) = app.post("/v1/auth/signup/", None, body).await;
    assert_eq!(status, StatusCode::OK);
    let second = app.mailer.last_code_for("bob").unwrap();

    assert_eq!(app.mailer.sent().len(), 2);
    assert_eq!(app.state.store().users().list(1, 10, None).await.unwrap().total, 1);

    let (status, _) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "bob", "confirmation_code": first}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "bob", "confirmation_code": second}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_signup_validation() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"email": "me@example.com", "username": "me"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());

    let (status, body) = app.post("/v1/auth/signup/", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["username"], json!(["This field is required."]));
    assert_eq!(body["email"], json!(["This field is required."]));

    app.signup_and_login("bob").await;

    // Same email under another username
    let (status, body) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"email": "bob@example.com", "username": "robert"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array());

    let (status, body) = app
        .request(
            Method::POST,
            "/v1/auth/signup/",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["non_field_errors"].is_array());
}

#[tokio::test]
async fn test_bearer_token_handling() {
    let app = spawn_app().await;

    let (status, _) = app.get("/v1/categories/", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/v1/categories/", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token.");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/users/me/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    // Other schemes are treated as anonymous
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/categories/")
                .header(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_catalog_permissions() {
    let app = spawn_app().await;
    let user = app.signup_and_login("alice").await;
    let moderator = app.user_with_role("mod", Role::Moderator).await;
    let admin = app.user_with_role("root", Role::Admin).await;
    let body = json!({"name": "Books", "slug": "books"});

    let (status, body_json) = app.post("/v1/categories/", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json["detail"],
        "Authentication credentials were not provided."
    );

    let (status, body_json) = app.post("/v1/categories/", Some(&user), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body_json["detail"],
        "You do not have permission to perform this action."
    );

    let (status, _) = app
        .post("/v1/categories/", Some(&moderator), body.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/v1/categories/", Some(&admin), body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created, json!({"name": "Books", "slug": "books"}));

    let (status, _) = app.get("/v1/users/", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/v1/users/", Some(&moderator)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/v1/users/", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_category_and_genre_crud() {
    let app = spawn_app().await;
    let admin = app.user_with_role("root", Role::Admin).await;

    let (status, _) = app
        .post(
            "/v1/categories/",
            Some(&admin),
            json!({"name": "Films", "slug": "films"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(
            "/v1/categories/",
            Some(&admin),
            json!({"name": "Movies", "slug": "films"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["slug"], json!(["category with this slug already exists."]));

    let (status, body) = app
        .post(
            "/v1/genres/",
            Some(&admin),
            json!({"name": "Bad", "slug": "not a slug"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["slug"].is_array());

    let (status, body) = app.get("/v1/categories/films/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Films");

    let (status, body) = app
        .patch(
            "/v1/categories/films/",
            Some(&admin),
            json!({"name": "Cinema"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"name": "Cinema", "slug": "films"}));

    let (status, body) = app.get("/v1/categories/?search=cine", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, _) = app.delete("/v1/categories/films/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get("/v1/categories/films/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not found.");
}

#[tokio::test]
async fn test_title_crud_and_filters() {
    let app = spawn_app().await;
    let admin = app.user_with_role("root", Role::Admin).await;
    let title_id = app.seed_title(&admin).await;

    let (status, body) = app.get(&format!("/v1/titles/{title_id}/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "The Seventh Seal");
    assert_eq!(body["rating"], Value::Null);
    assert_eq!(body["genre"], json!([{"name": "Drama", "slug": "drama"}]));
    assert_eq!(body["category"], json!({"name": "Films", "slug": "films"}));

    let (status, body) = app
        .post(
            "/v1/titles/",
            Some(&admin),
            json!({"name": "Future", "year": 3000, "genre": [], "category": "nope"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["year"].is_array());
    assert_eq!(body["genre"], json!(["This list may not be empty."]));
    assert_eq!(body["category"], json!(["Object with slug=nope does not exist."]));

    let (status, body) = app
        .patch(
            &format!("/v1/titles/{title_id}/"),
            Some(&admin),
            json!({"genre": ["drama", "comedy"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["genre"].as_array().unwrap().len(), 2);
    assert_eq!(body["year"], 1957);

    let (_, body) = app.get("/v1/titles/?genre=comedy", None).await;
    assert_eq!(body["count"], 1);
    let (_, body) = app.get("/v1/titles/?category=films&year=1957", None).await;
    assert_eq!(body["count"], 1);
    let (_, body) = app.get("/v1/titles/?year=1958", None).await;
    assert_eq!(body["count"], 0);

    // Removing the category leaves the title uncategorised
    let (status, _) = app.delete("/v1/categories/films/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = app.get(&format!("/v1/titles/{title_id}/"), None).await;
    assert_eq!(body["category"], Value::Null);

    let (status, _) = app.get("/v1/titles/not-a-number/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .delete(&format!("/v1/titles/{title_id}/"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/v1/titles/{title_id}/"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reviews_and_rating() {
    let app = spawn_app().await;
    let admin = app.user_with_role("root", Role::Admin).await;
    let title_id = app.seed_title(&admin).await;
    let alice = app.signup_and_login("alice").await;
    let bob = app.signup_and_login("bob").await;
    let moderator = app.user_with_role("mod", Role::Moderator).await;

    let reviews = format!("/v1/titles/{title_id}/reviews/");

    let (status, _) = app
        .post(&reviews, None, json!({"text": "Great", "score": 9}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post(&reviews, Some(&alice), json!({"text": "Great", "score": 11}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["score"].is_array());

    let (status, alice_review) = app
        .post(&reviews, Some(&alice), json!({"text": "Great", "score": 8}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(alice_review["author"], "alice");
    assert_eq!(alice_review["score"], 8);
    assert!(alice_review["pub_date"].is_string());

    let (status, body) = app
        .post(&reviews, Some(&alice), json!({"text": "Again", "score": 1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["non_field_errors"],
        json!(["You have already reviewed this title."])
    );

    let (status, _) = app
        .post(&reviews, Some(&bob), json!({"text": "Meh", "score": 5}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, title) = app.get(&format!("/v1/titles/{title_id}/"), None).await;
    assert_eq!(title["rating"], json!(6.5));

    let (_, list) = app.get(&reviews, None).await;
    assert_eq!(list["count"], 2);

    let review_url = format!("{reviews}{}/", alice_review["id"]);

    let (status, _) = app
        .patch(&review_url, Some(&bob), json!({"text": "Vandalised"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&review_url, Some(&moderator), json!({"score": 2}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 2);
    assert_eq!(body["author"], "alice");
    assert_eq!(body["text"], "Great");

    let (_, title) = app.get(&format!("/v1/titles/{title_id}/"), None).await;
    assert_eq!(title["rating"], json!(3.5));

    let (status, _) = app.delete(&review_url, Some(&alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, title) = app.get(&format!("/v1/titles/{title_id}/"), None).await;
    assert_eq!(title["rating"], json!(5.0));

    let (status, _) = app.get("/v1/titles/9999/reviews/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comments() {
    let app = spawn_app().await;
    let admin = app.user_with_role("root", Role::Admin).await;
    let title_id = app.seed_title(&admin).await;
    let alice = app.signup_and_login("alice").await;
    let bob = app.signup_and_login("bob").await;

    let (_, review) = app
        .post(
            &format!("/v1/titles/{title_id}/reviews/"),
            Some(&alice),
            json!({"text": "Great", "score": 8}),
        )
        .await;
    let comments = format!("/v1/titles/{title_id}/reviews/{}/comments/", review["id"]);

    let (status, body) = app.post(&comments, Some(&bob), json!({"text": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["text"].is_array());

    let (status, comment) = app
        .post(&comments, Some(&bob), json!({"text": "Agreed"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["author"], "bob");

    let comment_url = format!("{comments}{}/", comment["id"]);

    let (status, _) = app
        .patch(&comment_url, Some(&alice), json!({"text": "Edited"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&comment_url, Some(&admin), json!({"text": "Moderated"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Moderated");

    let (_, list) = app.get(&comments, None).await;
    assert_eq!(list["count"], 1);

    let (status, _) = app
        .get(
            &format!("/v1/titles/{title_id}/reviews/9999/comments/"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&comment_url, Some(&bob)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&comment_url, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_management() {
    let app = spawn_app().await;
    let admin = app.user_with_role("root", Role::Admin).await;

    let (status, body) = app
        .post(
            "/v1/users/",
            Some(&admin),
            json!({"username": "carol", "email": "carol@example.com", "role": "moderator"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "moderator");
    assert_eq!(body["bio"], Value::Null);

    let (status, body) = app
        .post(
            "/v1/users/",
            Some(&admin),
            json!({"username": "carol", "email": "other@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());

    let (status, body) = app
        .patch(
            "/v1/users/carol/",
            Some(&admin),
            json!({"role": "wizard"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["role"], json!(["\"wizard\" is not a valid choice."]));

    let (status, body) = app
        .patch(
            "/v1/users/carol/",
            Some(&admin),
            json!({"bio": "Editor", "role": "admin"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bio"], "Editor");
    assert_eq!(body["role"], "admin");

    let (status, _) = app.delete("/v1/users/carol/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get("/v1/users/carol/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_me_cannot_change_role() {
    let app = spawn_app().await;
    let token = app.signup_and_login("bob").await;

    let (status, body) = app
        .patch(
            "/v1/users/me/",
            Some(&token),
            json!({"role": "admin", "first_name": "Bob"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    assert_eq!(body["first_name"], "Bob");

    let (status, _) = app.post("/v1/categories/", Some(&token), json!({"name": "x", "slug": "x"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_pagination_shape() {
    let app = spawn_app().await;
    let admin = app.user_with_role("root", Role::Admin).await;

    for slug in ["a", "b", "c"] {
        let (status, _) = app
            .post(
                "/v1/genres/",
                Some(&admin),
                json!({"name": format!("Genre {slug}"), "slug": slug}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.get("/v1/genres/?page_size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["previous"], Value::Null);
    let next = body["next"].as_str().unwrap();
    assert!(next.contains("page=2"));
    assert!(next.contains("page_size=2"));

    let (_, body) = app.get("/v1/genres/?page=2&page_size=2", None).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["next"], Value::Null);
    let previous = body["previous"].as_str().unwrap();
    assert!(!previous.contains("page=1"));

    let (status, body) = app.get("/v1/genres/?page=9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Invalid page.");

    let (status, _) = app.get("/v1/genres/?page=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_routing_details() {
    let app = spawn_app().await;

    let (status, _) = app.get("/v1/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/v1/categories/", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::PUT,
            "/v1/categories/films/",
            None,
            Some(json!({"name": "Films", "slug": "films"})),
        )
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/genres/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    // Metrics are disabled in the test config
    let (status, _) = app.get("/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_confirmation_code_is_single_use_under_concurrency() {
    let app = spawn_app().await;

    for _ in 0..5 {
        let (status, _) = app
            .post(
                "/v1/auth/signup/",
                None,
                json!({"username": "bob", "email": "bob@example.com"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let code = app.mailer.last_code_for("bob").unwrap();
        let body = json!({"username": "bob", "confirmation_code": code});

        let ((first, first_body), (second, second_body)) = tokio::join!(
            app.post("/v1/auth/token/", None, body.clone()),
            app.post("/v1/auth/token/", None, body.clone()),
        );

        let mut statuses = [first, second];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

        let rejected = if first == StatusCode::OK {
            second_body
        } else {
            first_body
        };
        assert!(rejected["confirmation_code"].is_array());

        let (status, _) = app.post("/v1/auth/token/", None, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_review_race_is_a_conflict() {
    let app = spawn_app().await;
    let admin = app.user_with_role("root", Role::Admin).await;
    let title_id = app.seed_title(&admin).await;
    let reviews = format!("/v1/titles/{title_id}/reviews/");

    for i in 0..8 {
        let token = app.user_with_role(&format!("critic{i}"), Role::User).await;
        let body = json!({"text": "Bleak and beautiful", "score": 7});

        let ((first, first_body), (second, second_body)) = tokio::join!(
            app.post(&reviews, Some(&token), body.clone()),
            app.post(&reviews, Some(&token), body.clone()),
        );

        let mut statuses = [first, second];
        statuses.sort();
        assert_eq!(
            statuses,
            [StatusCode::CREATED, StatusCode::BAD_REQUEST],
            "critic{i}: {first_body} / {second_body}"
        );

        let rejected = if first == StatusCode::CREATED {
            second_body
        } else {
            first_body
        };
        assert_eq!(
            rejected["non_field_errors"],
            json!(["You have already reviewed this title."])
        );
    }

    let (_, list) = app.get(&reviews, None).await;
    assert_eq!(list["count"], 8);

    let (_, title) = app.get(&format!("/v1/titles/{title_id}/"), None).await;
    assert_eq!(title["rating"], json!(7.0));
}
