//! Per-resource access rules.
//!
//! Route groups check [`Permission::has_permission`] in middleware before the
//! handler runs; handlers that load an owned object then call
//! [`Permission::has_object_permission`].

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use super::ApiError;
use super::auth::Viewer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Any authenticated user.
    Authenticated,
    AdminOnly,
    /// Anyone may read, only admins may write.
    AdminOrReadOnly,
    /// Anyone may read, authenticated users may create, and the author,
    /// moderators and admins may change an object.
    AuthorOrStaffOrReadOnly,
}

#[must_use]
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

impl Permission {
    pub fn has_permission(self, method: &Method, viewer: &Viewer) -> Result<(), ApiError> {
        match self {
            Self::AdminOrReadOnly | Self::AuthorOrStaffOrReadOnly if is_safe_method(method) => {
                Ok(())
            }
            Self::Authenticated | Self::AuthorOrStaffOrReadOnly => viewer.require().map(|_| ()),
            Self::AdminOnly | Self::AdminOrReadOnly => {
                if viewer.require()?.is_admin() {
                    Ok(())
                } else {
                    Err(ApiError::permission_denied())
                }
            }
        }
    }

    pub fn has_object_permission(
        self,
        method: &Method,
        viewer: &Viewer,
        author_id: i32,
    ) -> Result<(), ApiError> {
        self.has_permission(method, viewer)?;

        match self {
            Self::AuthorOrStaffOrReadOnly if !is_safe_method(method) => {
                if viewer.require()?.can_edit(author_id) {
                    Ok(())
                } else {
                    Err(ApiError::permission_denied())
                }
            }
            _ => Ok(()),
        }
    }
}

/// Route-layer middleware enforcing `permission` for the request method.
pub async fn require_permission(
    State(permission): State<Permission>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let viewer = request
        .extensions()
        .get::<Viewer>()
        .cloned()
        .unwrap_or_default();

    permission.has_permission(request.method(), &viewer)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurrentUser, Role};

    fn viewer(id: i32, role: Role) -> Viewer {
        Viewer(Some(CurrentUser {
            id,
            username: format!("user{id}"),
            role,
            is_superuser: false,
        }))
    }

    fn status(result: Result<(), ApiError>) -> u16 {
        match result {
            Ok(()) => 200,
            Err(ApiError::Unauthorized(_)) => 401,
            Err(ApiError::Forbidden(_)) => 403,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_admin_or_read_only() {
        let p = Permission::AdminOrReadOnly;
        assert_eq!(status(p.has_permission(&Method::GET, &Viewer(None))), 200);
        assert_eq!(status(p.has_permission(&Method::POST, &Viewer(None))), 401);
        assert_eq!(status(p.has_permission(&Method::POST, &viewer(1, Role::Moderator))), 403);
        assert_eq!(status(p.has_permission(&Method::DELETE, &viewer(1, Role::Admin))), 200);
    }

    #[test]
    fn test_admin_only_blocks_reads() {
        let p = Permission::AdminOnly;
        assert_eq!(status(p.has_permission(&Method::GET, &Viewer(None))), 401);
        assert_eq!(status(p.has_permission(&Method::GET, &viewer(1, Role::User))), 403);

        let superuser = Viewer(Some(CurrentUser {
            id: 2,
            username: "root".to_string(),
            role: Role::User,
            is_superuser: true,
        }));
        assert_eq!(status(p.has_permission(&Method::GET, &superuser)), 200);
    }

    #[test]
    fn test_author_or_staff() {
        let p = Permission::AuthorOrStaffOrReadOnly;
        assert_eq!(status(p.has_permission(&Method::POST, &Viewer(None))), 401);
        assert_eq!(status(p.has_permission(&Method::POST, &viewer(3, Role::User))), 200);

        assert_eq!(
            status(p.has_object_permission(&Method::PATCH, &viewer(3, Role::User), 3)),
            200
        );
        assert_eq!(
            status(p.has_object_permission(&Method::PATCH, &viewer(4, Role::User), 3)),
            403
        );
        assert_eq!(
            status(p.has_object_permission(&Method::DELETE, &viewer(4, Role::Moderator), 3)),
            200
        );
        assert_eq!(
            status(p.has_object_permission(&Method::GET, &Viewer(None), 3)),
            200
        );
    }
}
