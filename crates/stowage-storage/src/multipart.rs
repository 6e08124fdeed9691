//! Part layout and part-list checks shared by providers and the completion coordinator.

use std::collections::BTreeMap;

use stowage_core::constants::{MAX_PART_NUMBER, MIN_PART_SIZE_BYTES};

use crate::traits::{CompletedPart, StorageError, StorageResult};

/// Split `size_bytes` into parts of at least `preferred_part_size`.
///
/// The part size is raised to the backend minimum, then grown until the part
/// count fits under the backend's part-number ceiling. Returns `(part_size, total_parts)`.
pub fn part_layout(size_bytes: u64, preferred_part_size: u64) -> (u64, u32) {
    let mut part_size = preferred_part_size.max(MIN_PART_SIZE_BYTES);
    let min_for_ceiling = size_bytes.div_ceil(u64::from(MAX_PART_NUMBER));
    if part_size < min_for_ceiling {
        // Round up to a whole MiB so every part but the last has the same size.
        part_size = min_for_ceiling.div_ceil(1024 * 1024) * 1024 * 1024;
    }
    let total_parts = size_bytes.div_ceil(part_size).max(1);
    (part_size, total_parts as u32)
}

/// ETags travel quoted in HTTP headers; clients may echo them either way.
pub fn normalize_etag(etag: &str) -> String {
    etag.trim().trim_matches('"').to_string()
}

/// Check that every part number in `1..=total_parts` has exactly one non-empty
/// checksum and nothing else is present. Returns the parts sorted by number.
pub fn validate_parts(total_parts: u32, parts: &[CompletedPart]) -> StorageResult<Vec<CompletedPart>> {
    let mut by_number: BTreeMap<u32, String> = BTreeMap::new();
    for part in parts {
        if part.part_number == 0 || part.part_number > total_parts {
            return Err(StorageError::IncompleteParts(format!(
                "part number {} is outside 1..={}",
                part.part_number, total_parts
            )));
        }
        let etag = normalize_etag(&part.etag);
        if etag.is_empty() {
            return Err(StorageError::IncompleteParts(format!(
                "part {} has an empty etag",
                part.part_number
            )));
        }
        if by_number.insert(part.part_number, etag).is_some() {
            return Err(StorageError::IncompleteParts(format!(
                "part {} was reported more than once",
                part.part_number
            )));
        }
    }

    let missing: Vec<u32> = (1..=total_parts)
        .filter(|n| !by_number.contains_key(n))
        .collect();
    if !missing.is_empty() {
        let listed = missing
            .iter()
            .take(10)
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let suffix = if missing.len() > 10 { ", ..." } else { "" };
        return Err(StorageError::IncompleteParts(format!(
            "missing etag for part(s) {}{}",
            listed, suffix
        )));
    }

    Ok(by_number
        .into_iter()
        .map(|(part_number, etag)| CompletedPart { part_number, etag })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn part(n: u32, etag: &str) -> CompletedPart {
        CompletedPart {
            part_number: n,
            etag: etag.to_string(),
        }
    }

    #[test]
    fn test_part_layout_150mb_in_10mb_parts() {
        let (part_size, total_parts) = part_layout(150 * MIB, 10 * MIB);
        assert_eq!(part_size, 10 * MIB);
        assert_eq!(total_parts, 15);
    }

    #[test]
    fn test_part_layout_last_part_shorter() {
        let (part_size, total_parts) = part_layout(25 * MIB + 1, 10 * MIB);
        assert_eq!(part_size, 10 * MIB);
        assert_eq!(total_parts, 3);
    }

    #[test]
    fn test_part_layout_raises_to_backend_minimum() {
        let (part_size, total_parts) = part_layout(12 * MIB, MIB);
        assert_eq!(part_size, MIN_PART_SIZE_BYTES);
        assert_eq!(total_parts, 3);
    }

    #[test]
    fn test_part_layout_respects_part_number_ceiling() {
        let size = 100_000 * MIB;
        let (part_size, total_parts) = part_layout(size, 5 * MIB);
        assert!(total_parts <= MAX_PART_NUMBER);
        assert!(part_size * u64::from(total_parts) >= size);
    }

    #[test]
    fn test_validate_parts_sorts_and_strips_quotes() {
        let parts = validate_parts(3, &[part(2, "\"b\""), part(1, "a"), part(3, " c ")]).unwrap();
        assert_eq!(parts, vec![part(1, "a"), part(2, "b"), part(3, "c")]);
    }

    #[test]
    fn test_validate_parts_rejects_missing_part() {
        let err = validate_parts(3, &[part(1, "a"), part(3, "c")]).unwrap_err();
        assert!(matches!(err, StorageError::IncompleteParts(ref m) if m.contains("2")));
    }

    #[test]
    fn test_validate_parts_rejects_duplicates() {
        let err = validate_parts(2, &[part(1, "a"), part(1, "a"), part(2, "b")]).unwrap_err();
        assert!(matches!(err, StorageError::IncompleteParts(ref m) if m.contains("more than once")));
    }

    #[test]
    fn test_validate_parts_rejects_out_of_range() {
        assert!(validate_parts(2, &[part(0, "a"), part(1, "b"), part(2, "c")]).is_err());
        assert!(validate_parts(2, &[part(1, "a"), part(2, "b"), part(3, "c")]).is_err());
    }

    #[test]
    fn test_validate_parts_rejects_empty_etag() {
        assert!(validate_parts(1, &[part(1, "\"\"")]).is_err());
    }
}
