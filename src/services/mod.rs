pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;

pub mod review_service;
pub mod review_service_impl;
pub use review_service::{ReviewError, ReviewService};
pub use review_service_impl::SeaOrmReviewService;
