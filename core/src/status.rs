//! Classification of HTTP status codes into success or `ApiError`.

use crate::error::ApiError;
use crate::http::HttpResponse;

/// Map a response to its outcome. 200, 201, 202 and 204 pass through.
pub fn classify(response: HttpResponse) -> Result<HttpResponse, ApiError> {
    let status = response.status;
    if matches!(status, 200 | 201 | 202 | 204) {
        return Ok(response);
    }
    let body = response.text();
    Err(match status {
        401 | 403 => ApiError::NotAuthorized { status, body },
        404 => ApiError::NotFound { status, body },
        409 => ApiError::Duplicate { status, detail: body },
        400 => ApiError::Invalid { status, detail: body },
        500 => ApiError::InternalError { status, detail: body },
        _ => ApiError::UnknownError { status, detail: body },
    })
}
