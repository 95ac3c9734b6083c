//! Error types and SNAFU context selectors for the channel data engine.
//!
//! Every failure the engine can raise is a [`ChannelDataError`]. Each variant
//! carries a stable numeric [`ErrorCode`] so callers translating errors onto a
//! wire protocol do not need to match on variants, and an [`ErrorClass`] that
//! separates caller misuse from data quality problems.
//!
//! Type coercion failures are not errors: typed reads return `NaN` or a
//! default value, and a malformed cell never aborts a scan.

use snafu::prelude::*;

/// Stable numeric codes reported alongside every [`ChannelDataError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A delimited row did not contain the expected number of tokens.
    InvalidRowDataCount = 1051,
    /// An ordinal outside `[0, FieldCount)` was addressed.
    OrdinalOutOfRange = 1052,
    /// Index columns or chunk size cannot be used for the operation.
    UnsupportedIndexConfiguration = 1053,
    /// Persisted or incoming row JSON could not be decoded.
    InvalidWireFormat = 1054,
    /// Settings failed to load or validate.
    InvalidSettings = 1055,
    /// A value was appended for a channel id that was never registered.
    UnknownChannel = 1056,
    /// Two merge participants disagree on index configuration.
    IncompatibleIndex = 1057,
}

impl ErrorCode {
    /// Numeric value of the code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Broad classification of a [`ChannelDataError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller used the API incorrectly (bad ordinal, unknown channel,
    /// bad settings).
    CallerMisuse,
    /// The data itself is malformed (row shape, wire format, index layout).
    DataQuality,
}

/// Errors raised by the channel data engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChannelDataError {
    /// A delimited row had the wrong number of tokens under the `Error`
    /// invalid-row policy.
    #[snafu(display("Invalid row data count: expected {expected} tokens, found {found} in row {row:?}"))]
    InvalidRowDataCount {
        /// Number of tokens the row was expected to carry.
        expected: usize,
        /// Number of tokens actually found.
        found: usize,
        /// The offending raw row text.
        row: String,
    },

    /// A field ordinal was outside the reader's field range.
    #[snafu(display("Ordinal {ordinal} is out of range; field count is {field_count}"))]
    OrdinalOutOfRange {
        /// Requested ordinal.
        ordinal: usize,
        /// Number of addressable fields.
        field_count: usize,
    },

    /// The index column configuration cannot be used for the operation.
    #[snafu(display("Unsupported index configuration: {msg}"))]
    UnsupportedIndexConfiguration {
        /// Description of what was wrong with the index configuration.
        msg: String,
    },

    /// Row JSON could not be parsed into `[[indexes...],[values...]]` rows.
    #[snafu(display("Invalid channel data wire format: {source}"))]
    InvalidWireFormat {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Settings JSON could not be parsed.
    #[snafu(display("Invalid channel data settings: {source}"))]
    SettingsFormat {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Settings parsed but failed validation.
    #[snafu(display("Invalid channel data settings: {msg}"))]
    InvalidSettings {
        /// Which setting was rejected and why.
        msg: String,
    },

    /// A value was appended for a channel id the block does not know.
    #[snafu(display("Unknown channel id {channel_id}"))]
    UnknownChannel {
        /// The unregistered channel id.
        channel_id: i64,
    },

    /// Merge participants use different primary index directions.
    #[snafu(display(
        "Cannot merge channel data for {uri}: resident index increasing={resident_increasing}, update index increasing={update_increasing}"
    ))]
    IncompatibleIndex {
        /// URI of the resident record set.
        uri: String,
        /// Direction of the resident primary index.
        resident_increasing: bool,
        /// Direction of the update primary index.
        update_increasing: bool,
    },
}

impl ChannelDataError {
    /// Numeric code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ChannelDataError::InvalidRowDataCount { .. } => ErrorCode::InvalidRowDataCount,
            ChannelDataError::OrdinalOutOfRange { .. } => ErrorCode::OrdinalOutOfRange,
            ChannelDataError::UnsupportedIndexConfiguration { .. } => {
                ErrorCode::UnsupportedIndexConfiguration
            }
            ChannelDataError::InvalidWireFormat { .. } => ErrorCode::InvalidWireFormat,
            ChannelDataError::SettingsFormat { .. } | ChannelDataError::InvalidSettings { .. } => {
                ErrorCode::InvalidSettings
            }
            ChannelDataError::UnknownChannel { .. } => ErrorCode::UnknownChannel,
            ChannelDataError::IncompatibleIndex { .. } => ErrorCode::IncompatibleIndex,
        }
    }

    /// Whether the error stems from caller misuse or from the data.
    pub fn class(&self) -> ErrorClass {
        match self {
            ChannelDataError::OrdinalOutOfRange { .. }
            | ChannelDataError::SettingsFormat { .. }
            | ChannelDataError::InvalidSettings { .. }
            | ChannelDataError::UnknownChannel { .. } => ErrorClass::CallerMisuse,
            ChannelDataError::InvalidRowDataCount { .. }
            | ChannelDataError::UnsupportedIndexConfiguration { .. }
            | ChannelDataError::InvalidWireFormat { .. }
            | ChannelDataError::IncompatibleIndex { .. } => ErrorClass::DataQuality,
        }
    }
}

/// Convenience alias for results returned by the engine.
pub type ChannelDataResult<T> = Result<T, ChannelDataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_count_error_is_data_quality_with_code() {
        let err = ChannelDataError::InvalidRowDataCount {
            expected: 3,
            found: 2,
            row: "1,2".to_string(),
        };
        assert_eq!(err.code().as_i32(), 1051);
        assert_eq!(err.class(), ErrorClass::DataQuality);
        assert!(err.to_string().contains("\"1,2\""));
    }

    #[test]
    fn ordinal_error_is_caller_misuse() {
        let err = OrdinalOutOfRangeSnafu {
            ordinal: 9usize,
            field_count: 3usize,
        }
        .build();
        assert_eq!(err.code(), ErrorCode::OrdinalOutOfRange);
        assert_eq!(err.class(), ErrorClass::CallerMisuse);
    }
}
