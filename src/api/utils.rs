//! Stateless helpers for request processing

use crate::api::error::ApiError;

/// Parses a Content-Type header and requires `application/json`
///
/// Parameters such as `charset=utf-8` are allowed; `application/jsonp`,
/// `application/json-patch+json` and `text/json` are not.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {content_type}")))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}
