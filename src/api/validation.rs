use crate::api::types::{CatalogEntryRequest, UserRequest};
use crate::domain::Role;
use crate::domain::validation::{
    FieldErrors, MAX_FIRST_LAST_NAME_LENGTH, REQUIRED, validate_email, validate_max_length,
    validate_name, validate_slug, validate_username,
};

/// Validated `{name, slug}`; on a partial update absent fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
}

pub fn validate_catalog_entry(
    request: CatalogEntryRequest,
    partial: bool,
) -> Result<CatalogEntryInput, FieldErrors> {
    let mut errors = FieldErrors::new();

    match &request.name {
        Some(name) => errors.check("name", validate_name(name)),
        None if !partial => errors.add("name", REQUIRED),
        None => {}
    }

    match &request.slug {
        Some(slug) => errors.check("slug", validate_slug(slug)),
        None if !partial => errors.add("slug", REQUIRED),
        None => {}
    }

    errors.into_result()?;

    Ok(CatalogEntryInput {
        name: request.name.map(|n| n.trim().to_string()),
        slug: request.slug,
    })
}

/// Validated user fields, with `role` parsed.
#[derive(Debug, Clone, Default)]
pub struct UserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub role: Option<Role>,
}

pub fn validate_user(request: UserRequest, partial: bool) -> Result<UserInput, FieldErrors> {
    let mut errors = FieldErrors::new();

    let username = request.username.map(|u| u.trim().to_string());
    let email = request.email.map(|e| e.trim().to_string());

    match &username {
        Some(username) => errors.check("username", validate_username(username)),
        None if !partial => errors.add("username", REQUIRED),
        None => {}
    }

    match &email {
        Some(email) => errors.check("email", validate_email(email)),
        None if !partial => errors.add("email", REQUIRED),
        None => {}
    }

    for (field, value) in [
        ("first_name", &request.first_name),
        ("last_name", &request.last_name),
    ] {
        if let Some(Some(value)) = value {
            errors.check(field, validate_max_length(value, MAX_FIRST_LAST_NAME_LENGTH));
        }
    }

    let role = match request.role.as_deref() {
        Some(role) => match role.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                errors.add("role", e.to_string());
                None
            }
        },
        None => None,
    };

    errors.into_result()?;

    Ok(UserInput {
        username,
        email,
        first_name: request.first_name,
        last_name: request.last_name,
        bio: request.bio,
        role,
    })
}
