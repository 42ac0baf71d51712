//! Route table and middleware layering.
//!
//! Split out of `main` so integration tests can stand up the full
//! application against an in-memory database.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::application::handlers::{self, account, admin, funding, lending, trading};
use crate::application::AppState;
use crate::auth::{require_admin, require_auth};
use crate::rate_limit::{throttle_credentials, CredentialRateLimiter};

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Assemble the full application router.
pub fn build_router(state: AppState, limiter: CredentialRateLimiter) -> Router {
    // Credential endpoints are open but throttled per client.
    let auth_routes = Router::new()
        .route("/auth/signup", post(account::signup))
        .route("/auth/login", post(account::login))
        .layer(middleware::from_fn(
            move |request: axum::extract::Request, next: middleware::Next| {
                let limiter = limiter.clone();
                async move { throttle_credentials(limiter, request, next).await }
            },
        ));

    let customer_routes = Router::new()
        .route(
            "/account",
            get(account::get_profile).put(account::update_profile),
        )
        .route("/dashboard", get(account::dashboard))
        .route("/funding/deposits", post(funding::create_deposit))
        .route("/funding/withdrawals", post(funding::create_withdrawal))
        .route("/funding/transactions", get(funding::list_transactions))
        .route(
            "/orders",
            get(trading::list_orders).post(trading::create_order),
        )
        .route("/orders/:id/sell", post(trading::request_sell))
        .route("/loans", get(lending::get_loan).post(lending::create_loan))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Admin routes check the token first, then the role.
    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route(
            "/admin/users/:id",
            get(admin::get_user)
                .put(admin::update_user)
                .delete(admin::delete_user),
        )
        .route("/admin/users/:id/verify", post(admin::verify_user))
        .route("/admin/deposits/:id/verify", post(admin::verify_deposit))
        .route("/admin/withdrawals/:id", post(admin::decide_withdrawal))
        .route("/admin/orders/:id/close", post(admin::close_order))
        .route("/admin/orders/:id", axum::routing::delete(admin::delete_order))
        .route("/admin/transactions", get(admin::list_transactions))
        .route("/admin/orders", get(admin::list_orders))
        .route("/admin/loans", get(admin::list_loans))
        .route("/admin/loans/:id", post(admin::decide_loan))
        .route("/admin/payments/upi", put(admin::set_payment_info))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/upi", get(funding::get_payment_info))
        .merge(auth_routes)
        .merge(customer_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
