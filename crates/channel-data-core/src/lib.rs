//! Core engine for channel data: indexed, multi-channel log records.
//!
//! This crate provides the in-memory pieces a channel data store is built on:
//!
//! - A `ChannelDataBlock` builder that collects rows from parsed input,
//!   keyed and deduplicated by primary index (`block` module), fed either
//!   directly or from delimited text rows (`delimited` module).
//! - A `ChannelDataReader` cursor and engine over the rows of one chunk:
//!   typed value reads, sorting, memoized per-channel index ranges, channel
//!   slicing, the three-way merge with an update, bounded extraction with
//!   latest-values requests, and partial deletion (`reader` module).
//! - The `ChannelDataRecord` contract collaborators use to drive merges and
//!   deletes (`record` module).
//! - Direction-aware index ranges and chunk window arithmetic (`range`
//!   module), and the persisted JSON row format (`wire` module).
//!
//! The crate performs no I/O. Persistence layers load a chunk with
//! `ChannelDataReader::from_json`, merge or extract, and store the result of
//! `ChannelDataReader::to_json`.
#![deny(missing_docs)]
pub mod block;
pub mod delimited;
pub mod error;
pub mod index_info;
pub mod query_context;
pub mod range;
pub mod reader;
pub mod record;
pub mod row;
pub mod settings;
pub mod wire;

pub use block::ChannelDataBlock;
pub use error::{ChannelDataError, ChannelDataResult, ErrorClass, ErrorCode};
pub use index_info::ChannelIndexInfo;
pub use query_context::{ChannelSelection, QueryContext};
pub use range::Range;
pub use reader::{ChannelDataPage, ChannelDataReader, PartialDeleteRequest, merge_sequence};
pub use record::{ChannelDataRecord, IndexOrder};
pub use row::{ChannelLayout, ChannelRow};
pub use settings::{ChannelDataSettings, InvalidRowPolicy};
