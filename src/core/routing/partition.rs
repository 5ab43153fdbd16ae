// src/core/routing/partition.rs

//! Key-to-partition hashing, grounded on the CRC16 slot algorithm the
//! underlying cluster codebase uses for its own hash ring.

use crc::{Crc, CRC_16_USB};

const CRC16_ALGO: Crc<u16> = Crc::<u16>::new(&CRC_16_USB);

/// Hashes `key` into a partition index in `[0, num_partitions)`.
pub fn hash_to_partition(key: &[u8], num_partitions: u16) -> u16 {
    if num_partitions == 0 {
        return 0;
    }
    CRC16_ALGO.checksum(key) % num_partitions
}
