//! Key hashing
//!
//! CRC-64 with the reflected polynomial `0x9a6c9329ac4bc9b5`, initial value
//! and final xor of all ones, table driven one byte at a time.

const CRC64_POLY: u64 = 0x9a6c_9329_ac4b_c9b5;

const CRC64_TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut k = i as u64;
        let mut bit = 0;
        while bit < 8 {
            k = if k & 1 == 1 { (k >> 1) ^ CRC64_POLY } else { k >> 1 };
            bit += 1;
        }
        table[i] = k;
        i += 1;
    }
    table
}

/// CRC-64 of `data`, continuing from a previous `crc` (0 to start)
pub fn crc64(data: &[u8], crc: u64) -> u64 {
    let mut crc = !crc;
    for &byte in data {
        crc = CRC64_TABLE[((crc as u8) ^ byte) as usize] ^ (crc >> 8);
    }
    !crc
}

/// Routing hash of a key
///
/// The hash key decides placement so that all sort keys under one hash key
/// live in the same partition. Keys without a hash key fall back to the sort key.
pub fn key_hash(hash_key: &[u8], sort_key: &[u8]) -> u64 {
    if hash_key.is_empty() {
        crc64(sort_key, 0)
    } else {
        crc64(hash_key, 0)
    }
}

/// Partition index for a routing hash
///
/// Returns 0 for a table with no partitions so callers never divide by zero;
/// opening such a table is rejected before any request is routed.
pub fn partition_index(hash: u64, partition_count: u32) -> u32 {
    if partition_count == 0 {
        return 0;
    }
    (hash % partition_count as u64) as u32
}
