//! Shared-secret authentication for mutating endpoints

use crate::error::ApiError;
use std::sync::Arc;
use warp::{Filter, Rejection};

/// Request header carrying the token
pub const TOKEN_HEADER: &str = "X-API-Token";

/// Configured API token; `None` disables the check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiToken(Option<String>);

impl ApiToken {
    /// Create token; an empty string counts as unset
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }

    /// Token that accepts every request
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self(None)
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Compare a presented header value verbatim
    ///
    /// # Errors
    /// `ApiError::Unauthorized` if a token is configured and `presented` differs
    pub fn check(&self, presented: Option<&str>) -> Result<(), ApiError> {
        match &self.0 {
            None => Ok(()),
            Some(expected) if presented == Some(expected.as_str()) => Ok(()),
            Some(_) => Err(ApiError::Unauthorized),
        }
    }
}

/// Filter that rejects with [`ApiError::Unauthorized`] when the token does not match
pub fn with_token(token: Arc<ApiToken>) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>(TOKEN_HEADER)
        .and_then(move |presented: Option<String>| {
            let token = Arc::clone(&token);
            async move {
                token
                    .check(presented.as_deref())
                    .map_err(warp::reject::custom)
            }
        })
        .untuple_one()
}
