//! Transform implementations for inventory records
//!
//! This module provides the pieces the [`RecordNormalizer`] chains together:
//! flattening, reference resolution, field dropping and pruning.

mod field_dropper;
mod flatten;
mod normalizer;
mod pruner;
mod record;
mod reference;

pub use field_dropper::{DEFAULT_BLACKLIST, FieldDropper};
pub use flatten::{DEFAULT_TIMESTAMP_FIELDS, Flattener, TimestampStyle, parse_timestamp};
pub use normalizer::RecordNormalizer;
pub use pruner::{prune_empty, prune_map};
pub use record::{AttributeBag, Record, Serialized};
pub use reference::{CacheBuild, ReferenceCache, ReferenceTable};
