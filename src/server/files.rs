//! Turning a [`Reply`] into an HTTP response, files included.
//!
//! Handlers and static bindings only name a file. Sending goes through
//! [`ServeFile`], which checks the file exists, guesses the MIME type from the
//! extension and streams the body. Range and conditional headers from the
//! original request are honoured. A forced content type replaces the guess.
//! A missing file is answered with `404` and a JSON error body.

use std::path::Path;

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, Request, StatusCode};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, error, warn};

use crate::context::{Reply, ReplyBody};
use crate::error::ServeError;

/// Stream the file at `path`.
///
/// `method` and `headers` come from the request being answered. Any verb
/// other than `HEAD` is sent as a `GET`, so handlers may answer a `POST` with
/// a file.
pub async fn send_file(
    path: &Path,
    content_type: Option<&str>,
    method: &Method,
    headers: &HeaderMap,
) -> Result<Response, ServeError> {
    let mut request = Request::new(Body::empty());
    *request.method_mut() = if method == Method::HEAD {
        Method::HEAD
    } else {
        Method::GET
    };
    *request.headers_mut() = headers.clone();

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    match response.status() {
        StatusCode::NOT_FOUND => return Err(ServeError::NotFound(path.display().to_string())),
        StatusCode::INTERNAL_SERVER_ERROR => {
            return Err(ServeError::Io {
                path: path.display().to_string(),
                message: "file could not be opened".to_string(),
            })
        }
        _ => {}
    }

    let mut response = response.map(Body::new);
    if let Some(content_type) = content_type {
        match HeaderValue::from_str(content_type) {
            Ok(value) => {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            Err(_) => warn!(content_type = content_type, "Ignoring invalid forced content type"),
        }
    }
    Ok(response)
}

/// Convert a handler's reply into a response.
///
/// `method` and `headers` belong to the request being answered; only file
/// replies look at them.
pub async fn reply_into_response(reply: Reply, method: &Method, headers: &HeaderMap) -> Response {
    let (status, reply_headers, body) = reply.into_parts();

    match body {
        ReplyBody::Empty => build(status, reply_headers, Body::empty()),
        ReplyBody::Bytes(bytes) => build(status, reply_headers, Body::from(bytes)),
        ReplyBody::File { path, content_type } => {
            match send_file(&path, content_type.as_deref(), method, headers).await {
                Ok(mut response) => {
                    debug!(file = %path.display(), status = %response.status(), "Sending file");
                    if response.status() == StatusCode::OK {
                        *response.status_mut() = status;
                    }
                    response.headers_mut().extend(reply_headers);
                    response
                }
                Err(e) => {
                    if let ServeError::Io { .. } = e {
                        error!("File sender failed: {}", e);
                    } else {
                        debug!("File sender: {}", e);
                    }
                    e.into_response()
                }
            }
        }
    }
}

fn build(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
