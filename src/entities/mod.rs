pub mod prelude;

pub mod auth_tokens;
pub mod categories;
pub mod comments;
pub mod genres;
pub mod reviews;
pub mod title_genres;
pub mod titles;
pub mod users;
