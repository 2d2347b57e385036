//! OpenAPI documentation for the blog API.
//!
//! The document is served as JSON at `/api-docs/openapi.json` and rendered
//! with Scalar at `/docs`. Paths are relative to the `/api/v1` server.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Cookie security schemes for the access and refresh tokens.
///
/// Cookie names are configurable; the document shows the defaults.
struct CookieSecurityAddon;

impl Modify for CookieSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "AccessCookie".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "accessToken",
                    "Short-lived access token, set by `/login` and `/refresh`.",
                ))),
            );
            components.security_schemes.insert(
                "RefreshCookie".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "refreshToken",
                    "Long-lived refresh token, accepted only by `/refresh`.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "Blog API")
    ),
    modifiers(&CookieSecurityAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::refresh,
        api::handlers::auth::logout,
        api::handlers::auth::get_current_user,
        api::handlers::articles::list_articles,
        api::handlers::articles::get_article,
        api::handlers::articles::create_article,
        api::handlers::articles::edit_article,
        api::handlers::articles::delete_article,
        api::handlers::articles::create_comment,
    ),
    components(
        schemas(
            crate::types::Capability,
            crate::db::models::articles::ArticleType,
            api::models::auth::LoginRequest,
            api::models::auth::RegisterRequest,
            api::models::auth::RegisterResponse,
            api::models::auth::TokenResponse,
            api::models::auth::MessageResponse,
            api::models::users::UserResponse,
            api::models::articles::ArticleCreate,
            api::models::articles::ArticleUpdate,
            api::models::articles::ArticleResponse,
            api::models::articles::ArticleDetailResponse,
            api::models::comments::CommentCreate,
            api::models::comments::CommentResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Login, registration and token refresh. Tokens are delivered as HttpOnly cookies."),
        (name = "users", description = "The authenticated user's profile."),
        (name = "articles", description = "Articles. Reads are public; writes need an access token and the matching permission."),
        (name = "comments", description = "Comments on articles."),
    ),
    info(
        title = "Scribe API",
        version = "1.0.0",
        description = "Blog backend with articles, comments and cookie-based JWT authentication.

## Authentication

`POST /login` sets two HttpOnly cookies:

- `accessToken`: sent with every protected request
- `refreshToken`: sent to `POST /refresh` to obtain a new pair

## Errors

Errors are JSON objects with a machine-readable `error` kind and a human-readable `message`:

```json
{
  \"error\": \"permission_denied\",
  \"message\": \"You do not have permission to update this article\"
}
```",
    ),
)]
pub struct ApiDoc;
