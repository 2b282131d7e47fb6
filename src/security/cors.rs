//! CORS response policy.
//!
//! Two modes share one policy:
//! - `Reflect`: echo the caller's `Origin`, or `*` when it sent none.
//! - `Fixed`: echo the caller's `Origin`, or the configured value when it sent
//!   none, advertise allowed methods/headers, and answer preflights locally.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};

use crate::config::CorsConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    Reflect,
    Fixed {
        origin: HeaderValue,
        allow_methods: HeaderValue,
        allow_headers: HeaderValue,
    },
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let Some(origin) = &config.allowed_origin else {
            return CorsPolicy::Reflect;
        };

        let fixed = (
            HeaderValue::from_str(origin.trim()),
            HeaderValue::from_str(&config.allow_methods),
            HeaderValue::from_str(&config.allow_headers),
        );
        match fixed {
            (Ok(origin), Ok(allow_methods), Ok(allow_headers)) => CorsPolicy::Fixed {
                origin,
                allow_methods,
                allow_headers,
            },
            _ => {
                tracing::warn!(origin = %origin, "CORS values are not valid header values, reflecting origins instead");
                CorsPolicy::Reflect
            }
        }
    }

    /// Whether `OPTIONS` requests are answered by the relay itself.
    pub fn answers_preflight(&self) -> bool {
        matches!(self, CorsPolicy::Fixed { .. })
    }

    /// Write the CORS headers for a response to a request carrying `request_origin`.
    pub fn apply(&self, request_origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        match request_origin {
            Some(origin) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
                add_vary_origin(headers);
            }
            None => {
                let fallback = match self {
                    CorsPolicy::Reflect => HeaderValue::from_static("*"),
                    CorsPolicy::Fixed { origin, .. } => origin.clone(),
                };
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, fallback);
            }
        }

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );

        if let CorsPolicy::Fixed {
            allow_methods,
            allow_headers,
            ..
        } = self
        {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, allow_methods.clone());
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers.clone());
        }
    }

    /// The `204 No Content` answer to a preflight, carrying only CORS headers.
    pub fn preflight(&self, request_origin: Option<&HeaderValue>) -> Response<Body> {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        self.apply(request_origin, response.headers_mut());
        response
    }
}

/// Add `Origin` to `Vary` unless it is already listed.
fn add_vary_origin(headers: &mut HeaderMap) {
    let listed = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| {
            let v = v.trim();
            v == "*" || v.eq_ignore_ascii_case("origin")
        });

    if !listed {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}
