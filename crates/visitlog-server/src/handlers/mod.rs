//! Request handlers

pub mod health;
pub mod landing;
pub mod telemetry;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::SocketAddr;
use uuid::Uuid;
use visitlog_core::ip::{self, IpHasher};
use visitlog_core::{EventKind, LogEntryBuilder};

use crate::error::ApiError;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// The parts of a request that end up in its record
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub method: String,
    pub path: String,
    pub client_ip: String,
    pub headers: Vec<(String, String)>,
}

impl RequestContext {
    /// Start a record for this request, tagged with its request id
    pub fn entry(&self, event: EventKind, hasher: &IpHasher) -> LogEntryBuilder {
        LogEntryBuilder::new(event, self.method.as_str(), self.path.as_str())
            .client_ip(&self.client_ip, hasher)
            .headers(self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())))
            .field("requestId", self.request_id.to_string())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get_all(FORWARDED_FOR)
            .iter()
            .filter_map(|value| value.to_str().ok());
        let socket = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr);
        let client_ip = ip::normalize_client_ip(forwarded, socket);

        // Non-UTF-8 header values are skipped
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Ok(Self {
            request_id: Uuid::new_v4(),
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            client_ip,
            headers,
        })
    }
}

/// Fallback for unmatched routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
