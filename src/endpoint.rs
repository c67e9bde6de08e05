//! JSON handler for `GET /media/resize/{id}?size=&format=&crop=`.
//!
//! Transport-agnostic: callers hand in the method and request target and
//! write the returned [`Response`] however their server does. The CLI
//! `request` command drives it directly.
//!
//! | Status | When |
//! |---|---|
//! | 200 | `{"src", "width", "height", "format"}` |
//! | 400 | bad id, missing or malformed `size`, unknown `format` or `crop` |
//! | 404 | unknown route, or no derivative could be produced |
//! | 405 | any method other than `GET`/`HEAD` |

use crate::attachments::AttachmentStore;
use crate::derivatives::MediaEngine;
use crate::formats::{FormatError, FormatRequest};
use crate::imaging::ImageBackend;
use crate::sizes::{Crop, MAX_DIMENSION, SizeSpec, dimensions_in_range};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

pub const ROUTE_PREFIX: &str = "/media/resize/";

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("invalid attachment id: {0}")]
    InvalidId(String),
    #[error("missing size parameter")]
    MissingSize,
    #[error("invalid {param}: {message}")]
    InvalidParam { param: &'static str, message: String },
}

/// A parsed resize request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeRequest {
    pub attachment_id: u64,
    pub size: SizeSpec,
    pub format: FormatRequest,
    pub crop: Option<Crop>,
}

impl ResizeRequest {
    /// Parse the `{id}` path segment and query string.
    pub fn parse(id: &str, query: &str) -> Result<Self, RequestError> {
        let attachment_id = id
            .parse::<u64>()
            .ok()
            .filter(|&id| id > 0)
            .ok_or_else(|| RequestError::InvalidId(id.to_string()))?;

        let mut size = None;
        let mut format = FormatRequest::Best;
        let mut crop = None;
        for (key, value) in parse_query(query) {
            match key.as_str() {
                "size" => {
                    let spec = value.parse::<SizeSpec>().map_err(|e| {
                        RequestError::InvalidParam {
                            param: "size",
                            message: e.to_string(),
                        }
                    })?;
                    if let SizeSpec::Dimensions { width, height } = spec
                        && !dimensions_in_range(width, height)
                    {
                        return Err(RequestError::InvalidParam {
                            param: "size",
                            message: format!(
                                "{width}x{height} is outside 1x1 to {MAX_DIMENSION}x{MAX_DIMENSION}"
                            ),
                        });
                    }
                    size = Some(spec);
                }
                "format" => {
                    format = value.parse().map_err(|e: FormatError| {
                        RequestError::InvalidParam {
                            param: "format",
                            message: e.to_string(),
                        }
                    })?
                }
                "crop" if !value.trim().is_empty() => {
                    crop = Some(value.parse::<Crop>().map_err(|e| {
                        RequestError::InvalidParam {
                            param: "crop",
                            message: e.to_string(),
                        }
                    })?)
                }
                _ => {}
            }
        }

        Ok(Self {
            attachment_id,
            size: size.ok_or(RequestError::MissingSize)?,
            format,
            crop,
        })
    }
}

/// Handle one request against `engine`.
pub fn handle<B: ImageBackend, S: AttachmentStore>(
    engine: &MediaEngine<B, S>,
    method: &str,
    target: &str,
) -> Response {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let Some(id) = path
        .strip_prefix(ROUTE_PREFIX)
        .map(|rest| rest.trim_end_matches('/'))
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
    else {
        return Response::error(404, format!("no route for {path}"));
    };
    if !method.eq_ignore_ascii_case("GET") && !method.eq_ignore_ascii_case("HEAD") {
        return Response::error(405, format!("method {method} not allowed"));
    }

    let request = match ResizeRequest::parse(id, query) {
        Ok(request) => request,
        Err(e) => {
            debug!(request = target, error = %e, "rejected resize request");
            return Response::error(400, e.to_string());
        }
    };

    match engine.get_src_format(
        request.attachment_id,
        &request.size,
        request.format,
        request.crop,
    ) {
        Some(derivative) => Response::ok(json!({
            "src": derivative.src,
            "width": derivative.width,
            "height": derivative.height,
            "format": derivative.format,
        })),
        None => Response::error(
            404,
            format!(
                "no derivative for attachment {} at size {}",
                request.attachment_id, request.size
            ),
        ),
    }
}

/// `a=1&b=two%20words` → `[("a", "1"), ("b", "two words")]`.
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = |b: u8| (b as char).to_digit(16);
                match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi * 16 + lo) as u8);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            byte => out.push(byte),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
