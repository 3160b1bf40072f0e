use thiserror::Error;

use super::models::ZipRequest;
use crate::config::ApiLimits;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("filenames must contain at most {limit} entries, got {actual}")]
    TooManyMembers { actual: usize, limit: usize },
    #[error("member {index}: {field} exceeds {limit} bytes")]
    FieldTooLong {
        index: usize,
        field: &'static str,
        limit: usize,
    },
    #[error("member {index}: {field} contains a NUL byte")]
    NulByte { index: usize, field: &'static str },
}

/// Shape checks only; whether a member's file exists is decided later, per member
pub fn validate_request(request: &ZipRequest, limits: &ApiLimits) -> Result<(), RequestValidationError> {
    if request.filenames.len() > limits.max_members_per_request {
        return Err(RequestValidationError::TooManyMembers {
            actual: request.filenames.len(),
            limit: limits.max_members_per_request,
        });
    }

    for (index, member) in request.filenames.iter().enumerate() {
        for (field, value) in [
            ("name", &member.name),
            ("ext", &member.ext),
            ("alias", &member.alias),
        ] {
            if value.len() > limits.max_name_bytes {
                return Err(RequestValidationError::FieldTooLong {
                    index,
                    field,
                    limit: limits.max_name_bytes,
                });
            }
            if value.contains('\0') {
                return Err(RequestValidationError::NulByte { index, field });
            }
        }
    }

    Ok(())
}
