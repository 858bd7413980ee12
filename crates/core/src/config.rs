//! Pipeline configuration.
//!
//! Passed explicitly into every load operation. Nothing in the pipeline
//! reads configuration from process-wide state.

use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

use crate::error::{ConfigErrorCode, Error, Result};
use crate::shape::EventShape;

/// Bulk-load settings for the two source streams.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    /// IAM role the warehouse assumes to read the sources
    #[validate(custom(function = "validate_role_arn"))]
    pub role_arn: String,
    /// Storage location of the event log records
    #[validate(custom(function = "validate_source"))]
    pub event_source: String,
    /// Storage location of the song catalog records
    #[validate(custom(function = "validate_source"))]
    pub song_source: String,
    /// Optional path mapping for event records
    #[serde(default)]
    pub event_shape: Option<EventShape>,
    /// Bucket region used to resolve `s3://` locations
    #[serde(default = "default_region")]
    #[validate(length(min = 1, max = 64))]
    pub region: String,
}

fn default_region() -> String {
    "us-west-2".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            role_arn: String::new(),
            event_source: String::new(),
            song_source: String::new(),
            event_shape: None,
            region: default_region(),
        }
    }
}

fn validate_role_arn(value: &str) -> std::result::Result<(), ValidationError> {
    if value.starts_with("arn:") && value.split(':').count() >= 6 {
        Ok(())
    } else {
        Err(ValidationError::new("role_arn"))
    }
}

fn validate_source(value: &str) -> std::result::Result<(), ValidationError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "s3" | "https" | "http") && url.host_str().is_some() => {
            Ok(())
        }
        _ => Err(ValidationError::new("source")),
    }
}

impl PipelineConfig {
    /// Validate every field, mapping failures onto configuration error codes.
    pub fn check(&self) -> Result<()> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };
        let fields = errors.field_errors();
        let code = if fields.contains_key("role_arn") {
            ConfigErrorCode::MissingCredential
        } else if fields.contains_key("event_source") || fields.contains_key("song_source") {
            ConfigErrorCode::InvalidSource
        } else {
            ConfigErrorCode::Invalid
        };
        Err(Error::config(code, errors.to_string()))
    }

    /// Resolved HTTPS location of the event stream.
    pub fn event_location(&self) -> Result<String> {
        resolve_location(&self.event_source, &self.region)
    }

    /// Resolved HTTPS location of the song stream.
    pub fn song_location(&self) -> Result<String> {
        resolve_location(&self.song_source, &self.region)
    }
}

/// Turn a source location into the URL pattern the warehouse reads.
///
/// `s3://bucket/key` becomes the region-qualified virtual-hosted endpoint.
/// A key without glob characters is a prefix and matches every object
/// beneath it.
pub fn resolve_location(location: &str, region: &str) -> Result<String> {
    let invalid = |reason: &str| {
        Error::config(
            ConfigErrorCode::InvalidSource,
            format!("invalid source location `{}`: {}", location, reason),
        )
    };

    let raw = location.trim();
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("missing bucket or host"))?;

    // Split on the raw text so glob characters survive untouched.
    let authority_start = raw.find("://").map(|i| i + 3).unwrap_or(0);
    let key_start = raw[authority_start..]
        .find('/')
        .map(|p| authority_start + p)
        .unwrap_or(raw.len());

    let base = match url.scheme() {
        "s3" => format!("https://{}.s3.{}.amazonaws.com", host, region),
        "https" | "http" => raw[..key_start].to_string(),
        other => return Err(invalid(&format!("unsupported scheme `{}`", other))),
    };

    let key = raw[key_start..].trim_end_matches('/');
    let is_pattern = key.contains(['*', '?', '{']);
    if key.is_empty() {
        Ok(format!("{}/**", base))
    } else if is_pattern {
        Ok(format!("{}{}", base, key))
    } else if key.ends_with(".json") {
        Ok(format!("{}{}", base, key))
    } else {
        Ok(format!("{}{}/**", base, key))
    }
}
