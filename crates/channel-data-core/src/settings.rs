//! Engine configuration knobs.
//!
//! The engine consumes these settings but does not own their lifecycle:
//! callers load a [`ChannelDataSettings`] once (typically from JSON) and pass
//! references down to the block builder, the delimited row parser, the merge
//! driver and [`QueryContext`](crate::query_context::QueryContext).

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::error::{ChannelDataResult, InvalidSettingsSnafu, SettingsFormatSnafu};

/// What to do with a delimited row whose token count is wrong.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRowPolicy {
    /// Drop the row silently.
    Ignore,
    /// Drop the row and record a validation warning.
    #[default]
    Warn,
    /// Fail with `ChannelDataError::InvalidRowDataCount`.
    Error,
}

/// Configuration shared by the channel data engine components.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ChannelDataSettings {
    /// Number of rows buffered in a block before the persistence layer is
    /// expected to flush it.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds between chunk flushes for streaming writers.
    #[serde(default = "default_chunk_flush_interval_secs")]
    pub chunk_flush_interval_secs: u64,

    /// Delimiter used for delimited rows when the payload does not name one.
    #[serde(default = "default_delimiter")]
    pub default_delimiter: String,

    /// Policy for rows with the wrong number of tokens.
    #[serde(default)]
    pub invalid_row_policy: InvalidRowPolicy,

    /// Default cap on emitted rows per extraction.
    #[serde(default = "default_max_data_nodes")]
    pub max_data_nodes: usize,

    /// Default cap on emitted cells per extraction.
    #[serde(default = "default_max_data_points")]
    pub max_data_points: usize,

    /// Chunk span for depth-indexed records, in index units.
    #[serde(default = "default_depth_chunk_size")]
    pub depth_chunk_size: f64,

    /// Chunk span for time-indexed records, in microseconds.
    #[serde(default = "default_time_chunk_size")]
    pub time_chunk_size: f64,
}

impl Default for ChannelDataSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            chunk_flush_interval_secs: default_chunk_flush_interval_secs(),
            default_delimiter: default_delimiter(),
            invalid_row_policy: InvalidRowPolicy::default(),
            max_data_nodes: default_max_data_nodes(),
            max_data_points: default_max_data_points(),
            depth_chunk_size: default_depth_chunk_size(),
            time_chunk_size: default_time_chunk_size(),
        }
    }
}

impl ChannelDataSettings {
    /// Parse settings from JSON and validate them.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> ChannelDataResult<Self> {
        let settings: ChannelDataSettings = serde_json::from_str(json).context(SettingsFormatSnafu)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the engine cannot operate with.
    pub fn validate(&self) -> ChannelDataResult<()> {
        ensure!(
            self.batch_size > 0,
            InvalidSettingsSnafu {
                msg: "batch_size must be greater than zero"
            }
        );
        ensure!(
            !self.default_delimiter.is_empty(),
            InvalidSettingsSnafu {
                msg: "default_delimiter must not be empty"
            }
        );
        ensure!(
            self.depth_chunk_size > 0.0 && self.time_chunk_size > 0.0,
            InvalidSettingsSnafu {
                msg: "chunk sizes must be positive"
            }
        );
        Ok(())
    }

    /// Chunk span for a primary index of the given kind.
    pub fn chunk_size(&self, is_time: bool) -> f64 {
        if is_time {
            self.time_chunk_size
        } else {
            self.depth_chunk_size
        }
    }
}

fn default_batch_size() -> usize {
    10_000
}

fn default_chunk_flush_interval_secs() -> u64 {
    300
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_max_data_nodes() -> usize {
    10_000
}

fn default_max_data_points() -> usize {
    1_000_000
}

fn default_depth_chunk_size() -> f64 {
    1_000.0
}

// One day in microseconds.
fn default_time_chunk_size() -> f64 {
    86_400_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn missing_fields_use_defaults() {
        let settings = ChannelDataSettings::from_json_str(r#"{"batch_size": 50}"#).unwrap();
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.default_delimiter, ",");
        assert_eq!(settings.invalid_row_policy, InvalidRowPolicy::Warn);
        assert_eq!(settings.chunk_size(false), 1_000.0);
        assert_eq!(settings.chunk_size(true), 86_400_000_000.0);
    }

    #[test]
    fn policy_parses_snake_case() {
        let settings =
            ChannelDataSettings::from_json_str(r#"{"invalid_row_policy": "error"}"#).unwrap();
        assert_eq!(settings.invalid_row_policy, InvalidRowPolicy::Error);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = ChannelDataSettings::from_json_str(r#"{"batch_size": 0}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSettings);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = ChannelDataSettings::from_json_str("{batch_size").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSettings);
    }
}
