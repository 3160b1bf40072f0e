use super::models::Config;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Upper bound for `server.api.max_payload_bytes`
const MAX_PAYLOAD_LIMIT: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("retention.max_age must be greater than zero")]
    ZeroRetention,

    #[error("retention.sweep_interval must be greater than zero")]
    ZeroSweepInterval,

    #[error("max_payload_bytes ({actual}) exceeds limit of 16MB ({limit})")]
    PayloadLimitTooLarge { actual: u64, limit: u64 },

    #[error("max_members_per_request must be at least 1")]
    NoMembersAllowed,

    #[error("max_name_bytes must be at least 1")]
    NoNameBytesAllowed,

    #[error("storage.source_root and storage.output_root overlap ({source_root} / {output_root})")]
    OverlappingRoots {
        source_root: PathBuf,
        output_root: PathBuf,
    },
}

/// Validate a loaded configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_retention(config)?;
    validate_api_limits(config)?;
    validate_roots(config)?;
    Ok(())
}

fn validate_retention(config: &Config) -> Result<(), ValidationError> {
    if config.retention.max_age.is_zero() {
        return Err(ValidationError::ZeroRetention);
    }
    if config.retention.sweep_interval.is_zero() {
        return Err(ValidationError::ZeroSweepInterval);
    }
    Ok(())
}

fn validate_api_limits(config: &Config) -> Result<(), ValidationError> {
    let api = &config.server.api;

    if api.max_payload_bytes.as_u64() > MAX_PAYLOAD_LIMIT {
        return Err(ValidationError::PayloadLimitTooLarge {
            actual: api.max_payload_bytes.as_u64(),
            limit: MAX_PAYLOAD_LIMIT,
        });
    }
    if api.max_members_per_request == 0 {
        return Err(ValidationError::NoMembersAllowed);
    }
    if api.max_name_bytes == 0 {
        return Err(ValidationError::NoNameBytesAllowed);
    }
    Ok(())
}

/// The sweep deletes anything old under `output_root`, so it must never
/// reach into `source_root` (and vice versa).
fn validate_roots(config: &Config) -> Result<(), ValidationError> {
    let source = lexical_normalize(&config.storage.source_root);
    let output = lexical_normalize(&config.storage.output_root);

    if source.starts_with(&output) || output.starts_with(&source) {
        return Err(ValidationError::OverlappingRoots {
            source_root: config.storage.source_root.clone(),
            output_root: config.storage.output_root.clone(),
        });
    }
    Ok(())
}

/// Drops `.` and folds `..` without touching the filesystem; roots may not exist yet.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
