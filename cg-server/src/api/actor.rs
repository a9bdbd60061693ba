//! Acting user for audit columns
//!
//! Authentication happens in front of this service; the proxy forwards the
//! user id in `x-cardgraph-user`. A missing or malformed header yields no
//! actor rather than an error.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

pub const ACTOR_HEADER: &str = "x-cardgraph-user";

/// User id taken from [`ACTOR_HEADER`], if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actor(pub Option<i64>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0);
        Ok(Actor(id))
    }
}
