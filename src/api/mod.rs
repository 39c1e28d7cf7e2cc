use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{MethodRouter, get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::{CategoryRepository, GenreRepository, Store};
use crate::mail::Mailer;
use crate::services::{AuthService, ReviewService};
use crate::state::SharedState;

pub mod auth;
mod catalog;
mod comments;
mod error;
mod observability;
pub mod permissions;
mod reviews;
mod titles;
pub mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use permissions::Permission;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn review_service(&self) -> &Arc<dyn ReviewService> {
        &self.shared.review_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        prometheus_handle,
    })
}

/// Opens the database and wires the services. `mailer` overrides the one
/// configured in `[mail]`.
pub async fn create_app_state_from_config(
    config: Config,
    mailer: Option<Arc<dyn Mailer>>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = match mailer {
        Some(mailer) => SharedState::with_mailer(config, mailer).await?,
        None => SharedState::new(config).await?,
    };
    Ok(create_app_state(Arc::new(shared), prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let v1 = Router::new()
        .merge(auth_routes())
        .merge(profile_routes())
        .merge(user_admin_routes())
        .merge(catalog_routes())
        .merge(review_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .with_state(state.clone());

    let metrics = Router::new()
        .route("/metrics", get(observability::get_metrics))
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/v1", v1)
        .merge(metrics)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
        .layer(middleware::from_fn(observability::logging_middleware))
}

type ApiRouter = Router<Arc<AppState>>;

/// Registers `path` with and without a trailing slash.
fn route(router: ApiRouter, path: &str, handler: MethodRouter<Arc<AppState>>) -> ApiRouter {
    router
        .route(&format!("{path}/"), handler.clone())
        .route(path, handler)
}

fn guarded(router: ApiRouter, permission: Permission) -> ApiRouter {
    router.route_layer(middleware::from_fn_with_state(
        permission,
        permissions::require_permission,
    ))
}

fn auth_routes() -> ApiRouter {
    let router = route(Router::new(), "/auth/signup", post(auth::signup));
    route(router, "/auth/token", post(auth::token))
}

fn profile_routes() -> ApiRouter {
    let router = route(
        Router::new(),
        "/users/me",
        get(users::get_me).patch(users::update_me),
    );
    guarded(router, Permission::Authenticated)
}

fn user_admin_routes() -> ApiRouter {
    let router = route(
        Router::new(),
        "/users",
        get(users::list_users).post(users::create_user),
    );
    let router = route(
        router,
        "/users/{username}",
        get(users::get_user)
            .patch(users::update_user)
            .delete(users::delete_user),
    );
    guarded(router, Permission::AdminOnly)
}

fn catalog_routes() -> ApiRouter {
    let mut router = Router::new();

    router = route(
        router,
        "/categories",
        get(catalog::list_entries::<CategoryRepository>)
            .post(catalog::create_entry::<CategoryRepository>),
    );
    router = route(
        router,
        "/categories/{slug}",
        get(catalog::get_entry::<CategoryRepository>)
            .patch(catalog::update_entry::<CategoryRepository>)
            .delete(catalog::delete_entry::<CategoryRepository>),
    );

    router = route(
        router,
        "/genres",
        get(catalog::list_entries::<GenreRepository>)
            .post(catalog::create_entry::<GenreRepository>),
    );
    router = route(
        router,
        "/genres/{slug}",
        get(catalog::get_entry::<GenreRepository>)
            .patch(catalog::update_entry::<GenreRepository>)
            .delete(catalog::delete_entry::<GenreRepository>),
    );

    router = route(
        router,
        "/titles",
        get(titles::list_titles).post(titles::create_title),
    );
    router = route(
        router,
        "/titles/{title_id}",
        get(titles::get_title)
            .patch(titles::update_title)
            .delete(titles::delete_title),
    );

    guarded(router, Permission::AdminOrReadOnly)
}

fn review_routes() -> ApiRouter {
    let mut router = Router::new();

    router = route(
        router,
        "/titles/{title_id}/reviews",
        get(reviews::list_reviews).post(reviews::create_review),
    );
    router = route(
        router,
        "/titles/{title_id}/reviews/{review_id}",
        get(reviews::get_review)
            .patch(reviews::update_review)
            .delete(reviews::delete_review),
    );
    router = route(
        router,
        "/titles/{title_id}/reviews/{review_id}/comments",
        get(comments::list_comments).post(comments::create_comment),
    );
    router = route(
        router,
        "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
        get(comments::get_comment)
            .patch(comments::update_comment)
            .delete(comments::delete_comment),
    );

    guarded(router, Permission::AuthorOrStaffOrReadOnly)
}
