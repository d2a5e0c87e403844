//! Routing Module
//!
//! Maps a key to the partition that owns it.
//!
//! ## Contract
//! The hash is a fixed interoperability contract shared with every other
//! client of the cluster:
//! ```text
//! hash            = crc64(hash_key)            (sort_key if hash_key is empty)
//! partition_index = hash mod partition_count   (unsigned)
//! ```

mod hash;

pub use hash::{crc64, key_hash, partition_index};
