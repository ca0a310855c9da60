use std::hash::Hasher;
use twox_hash::XxHash32;

use crate::value::Value;

/// Seed used by the original's `xxhash.xxh32(data).digest()` call (no seed
/// argument given, so the library default of 0 applies).
const SEED: u64 = 0;

/// Computes `etl_row_hash`: xxHash32 over the record's fields joined as
/// `key=value` pairs, sorted lexicographically by key and pipe-joined.
///
/// Matches the original's `create_row_hash`:
/// `"|".join(f"{k}={v}" for k, v in sorted(record.items()))`, hashed with
/// `xxhash.xxh32`. Sorting by key makes the hash independent of column
/// order, which lets the same logical row hash identically whether it came
/// from a CSV, spreadsheet, or JSON reader.
pub fn row_hash(fields: &[(String, Value)]) -> u32 {
    let mut sorted: Vec<&(String, Value)> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical = sorted
        .iter()
        .map(|(k, v)| format!("{k}={}", v.canonical_string()))
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = XxHash32::with_seed(SEED as u32);
    hasher.write(canonical.as_bytes());
    hasher.finish() as u32
}
