use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, Environment};
use crate::database::Stores;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin_middleware};
use crate::services::{AuthService, PositionService};

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub positions: PositionService,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(config: AppConfig, stores: Stores) -> Self {
        let auth = AuthService::new(stores.users, &config.security);
        Self {
            positions: PositionService::new(stores.positions)
                .with_max_tree_depth(config.api.max_tree_depth),
            auth,
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .route("/auth/login", post(public::auth::login))
        .route("/positions/public/list", get(public::positions::public_list))
        .merge(protected_routes(state.clone()))
        .merge(elevated_routes(state.clone()));

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config));
    }
    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::positions;

    Router::new()
        .route("/positions", get(positions::list))
        .route("/positions/tree", get(positions::tree))
        .route("/positions/tree/nested", get(positions::nested_tree))
        .route("/positions/:id", get(positions::get))
        .route("/positions/:id/children", get(positions::children))
        .route("/positions/:id/ancestors", get(positions::ancestors))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn elevated_routes(state: AppState) -> Router<AppState> {
    use axum::routing::patch;
    use elevated::positions;

    Router::new()
        .route("/positions", post(positions::create))
        .route(
            "/positions/:id",
            patch(positions::update).delete(positions::delete),
        )
        // Outermost layer runs first: authenticate, then check the role
        .route_layer(from_fn(require_admin_middleware))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

/// Permissive in development or when no origins (or `*`) are configured,
/// otherwise an allow list
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let security = &config.security;
    if config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    if origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::{generate_jwt, Claims};
    use crate::database::models::User;

    fn state() -> AppState {
        let mut config = AppConfig::development();
        config.api.enable_request_logging = false;
        AppState::new(config, Stores::memory())
    }

    fn token(state: &AppState, roles: &[&str]) -> String {
        let user = User::new("tester", "", roles.iter().map(|r| r.to_string()).collect());
        let claims = Claims::new(&user, 1);
        generate_jwt(&claims, state.auth.jwt_secret()).unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn public_routes_need_no_token() {
        let (status, body) = send(
            app(state()),
            Request::get("/positions/public/list").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn reads_require_a_token() {
        let (status, body) = send(
            app(state()),
            Request::get("/positions/tree").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn writes_require_admin() {
        let state = state();
        let viewer = token(&state, &["user"]);
        let admin = token(&state, &["admin"]);
        let router = app(state);

        let create = |bearer: &str| {
            Request::post("/positions")
                .header("authorization", format!("Bearer {}", bearer))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"University","type":"root"}"#))
                .unwrap()
        };

        let (status, _) = send(router.clone(), create(&viewer)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(router, create(&admin)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["name"], "University");
    }

    #[tokio::test]
    async fn shared_path_keeps_read_and_write_gates_apart() {
        let state = state();
        let viewer = token(&state, &["user"]);
        let router = app(state);
        let id = uuid::Uuid::new_v4();

        let (status, _) = send(
            router.clone(),
            Request::get(format!("/positions/{}", id))
                .header("authorization", format!("Bearer {}", viewer))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            router,
            Request::delete(format!("/positions/{}", id))
                .header("authorization", format!("Bearer {}", viewer))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
