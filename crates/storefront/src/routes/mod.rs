//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! Trailing slashes are trimmed before routing, so `/products/` and
//! `/products` are the same route.
//!
//! ```text
//! GET    /                          - Welcome message
//! GET    /health                    - Liveness
//! GET    /health/ready              - Database readiness
//!
//! # Users
//! POST   /users/register            - Create an account
//! POST   /users/login               - Log in (e-mail or phone + password)
//! POST   /users/admin/login         - Log in as an administrator
//! POST   /users/logout              - End the session
//! GET    /users/me                  - Current profile
//! PUT    /users/me                  - Update profile
//! PUT    /users/me/password         - Change password
//! POST   /users/me/avatar           - Upload avatar (multipart `file`)
//!
//! # Catalog
//! GET    /products                  - Paginated, filtered product list
//! POST   /products                  - Create product (admin)
//! GET    /products/{id}             - Product detail
//! GET    /products/search-history   - Recent searches
//! DELETE /products/search-history   - Forget searches
//! GET    /categories                - Active categories
//! GET    /banners                   - Active banners
//!
//! # Cart, favorites, addresses (login required)
//! GET    /cart                      - Cart lines
//! POST   /cart                      - Add to cart
//! DELETE /cart                      - Empty the cart
//! PUT    /cart/{line_id}            - Set quantity
//! DELETE /cart/{line_id}            - Remove line
//! GET    /favorites                 - Favorites
//! POST   /favorites                 - Add favorite
//! DELETE /favorites/{product_id}    - Remove favorite
//! GET    /addresses                 - Address book
//! POST   /addresses                 - Save address
//! GET    /addresses/{id}            - One address
//! PUT    /addresses/{id}            - Update address
//! DELETE /addresses/{id}            - Delete address
//! POST   /addresses/{id}/default    - Make default
//!
//! # Orders (login required)
//! POST   /orders                    - Check out (cart or direct buy)
//! GET    /orders                    - Order history
//! GET    /orders/{id}               - Order detail
//! POST   /orders/{id}/pay           - Confirm payment
//! POST   /orders/{id}/cancel        - Cancel
//! POST   /orders/{id}/status        - Change status (admin)
//!
//! # Static
//! GET    /uploads/*                 - Uploaded files
//! ```

pub mod addresses;
pub mod cart;
pub mod extract;
pub mod favorites;
pub mod home;
pub mod orders;
pub mod products;
pub mod taxonomy;
pub mod users;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::from_fn,
    routing::{get, post, put},
};
use tower::Layer;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::StorefrontConfig;
use crate::middleware::{create_session_layer, request_id::REQUEST_ID_HEADER, request_id_middleware};
use crate::services::uploads::{MAX_UPLOAD_BYTES, UPLOADS_PREFIX};
use crate::state::AppState;

/// Request body limit for the avatar upload (file plus multipart framing).
const AVATAR_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/admin/login", post(users::admin_login))
        .route("/logout", post(users::logout))
        .route("/me", get(users::me).put(users::update_me))
        .route("/me/password", put(users::change_password))
        .route(
            "/me/avatar",
            post(users::upload_avatar).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/search-history",
            get(products::search_history).delete(products::clear_search_history),
        )
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/{line_id}", put(cart::update).delete(cart::remove))
}

/// Create the favorites routes router.
pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(favorites::index).post(favorites::add))
        .route("/{product_id}", axum::routing::delete(favorites::remove))
}

/// Create the address book routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route(
            "/{id}",
            get(addresses::show)
                .put(addresses::update)
                .delete(addresses::delete),
        )
        .route("/{id}/default", post(addresses::set_default))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/pay", post(orders::pay))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/status", post(orders::set_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::welcome))
        .route("/health", get(home::health))
        .route("/health/ready", get(home::readiness))
        .nest("/users", user_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/favorites", favorite_routes())
        .nest("/addresses", address_routes())
        .nest("/orders", order_routes())
        .route("/categories", get(taxonomy::categories))
        .route("/banners", get(taxonomy::banners))
}

/// CORS for the configured browser origins, with credentials so the session
/// cookie is sent.
fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}

/// The routed application with sessions, CORS, uploads and request tracing.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());
    let cors = cors_layer(state.config());
    let uploads = ServeDir::new(&state.config().upload_dir);

    Router::new()
        .merge(routes())
        .nest_service(UPLOADS_PREFIX, uploads)
        .layer(session_layer)
        .layer(cors)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Wrap a router so trailing slashes are trimmed before routing.
pub fn normalize(router: Router) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router)
}
