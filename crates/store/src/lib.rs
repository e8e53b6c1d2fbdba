//! Record store adapter and result bundles.
//!
//! [`RecordStore`] is the capability the persistence layer provides;
//! [`StoreAdapter`] turns list-view request parameters (filter, query, sort,
//! paging) into a [`Collection`] against it and serializes the outcome into a
//! result bundle (`{success, total, records, metaData?, columns?}`).

pub mod adapter;
pub mod bundle;
pub mod collection;
pub mod config;
pub mod error;
pub mod fields;
pub mod memory;
pub mod metadata;
pub mod params;
pub mod record_store;

pub use {
    adapter::{Page, StoreAdapter},
    bundle::QueryOptions,
    collection::{Collection, Direction, SortSpec},
    config::{StoreConfig, StoreKeys},
    error::{Error, FieldErrors, Result},
    fields::{FieldDescriptor, FieldKind, RecordType},
    memory::MemoryRecordStore,
    params::QueryParams,
    record_store::{Record, RecordStore, SavepointId, WriteGuard},
};
