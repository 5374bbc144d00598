//! Caller resolution from request headers
//!
//! `X-Spellbook-Submitter` names the submitter (optional, anonymous when
//! absent). `X-Spellbook-Token` grants privilege when its SHA-256 digest
//! matches the configured admin digest. With no digest configured nobody is
//! privileged.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use spellbook_common::auth::verify_token;
use spellbook_common::{Caller, Submitter};
use std::convert::Infallible;
use tracing::warn;

use crate::AppState;

pub const SUBMITTER_HEADER: &str = "x-spellbook-submitter";
pub const TOKEN_HEADER: &str = "x-spellbook-token";

/// Extractor wrapping the [`Caller`] behind a request
#[derive(Debug, Clone)]
pub struct RequestCaller(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for RequestCaller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_caller(
            &parts.headers,
            state.admin_token_sha256.as_deref(),
        )))
    }
}

/// Derive the caller from headers and the configured admin digest
pub fn resolve_caller(headers: &HeaderMap, admin_token_sha256: Option<&str>) -> Caller {
    let submitter = Submitter::from_optional(header_str(headers, SUBMITTER_HEADER));

    let privileged = match (header_str(headers, TOKEN_HEADER), admin_token_sha256) {
        (Some(token), Some(digest)) => {
            let valid = verify_token(token, digest);
            if !valid {
                warn!("Rejected admin token from {}", submitter);
            }
            valid
        }
        (Some(_), None) => {
            warn!("Admin token supplied but no admin digest is configured");
            false
        }
        (None, _) => false,
    };

    Caller {
        submitter,
        privileged,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
