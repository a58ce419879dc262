// SPDX-License-Identifier: Apache-2.0

//! Rotation detection: decide whether a scan resumes or starts over.

/// Where the next scan of a logical log starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDecision {
    /// Same file, still at least as long as the stored offset
    Resume(u64),
    /// File was rotated, renamed or truncated; read it from the start
    Reset,
}

impl RotationDecision {
    /// Byte offset the scan should start from
    pub fn offset(&self) -> u64 {
        match self {
            RotationDecision::Resume(offset) => *offset,
            RotationDecision::Reset => 0,
        }
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, RotationDecision::Reset)
    }
}

/// A changed file name means the wildcard now resolves to a different file.
/// A file shorter than the stored offset was truncated or replaced in place.
/// A file exactly as long as the stored offset resumes and reads nothing.
pub fn decide(
    old_filename: &str,
    new_filename: &str,
    file_size_now: u64,
    stored_offset: u64,
) -> RotationDecision {
    if old_filename != new_filename {
        return RotationDecision::Reset;
    }

    if file_size_now < stored_offset {
        return RotationDecision::Reset;
    }

    RotationDecision::Resume(stored_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_file_resets() {
        let decision = decide("a.log", "a.log", 50, 120);
        assert_eq!(decision, RotationDecision::Reset);
        assert_eq!(decision.offset(), 0);
    }

    #[test]
    fn test_renamed_file_resets_regardless_of_size() {
        assert!(decide("a.log", "a.1.log", 500, 120).is_reset());
        assert!(decide("a.log", "a.1.log", 0, 0).is_reset());
    }

    #[test]
    fn test_grown_file_resumes() {
        assert_eq!(
            decide("a.log", "a.log", 200, 120),
            RotationDecision::Resume(120)
        );
    }

    #[test]
    fn test_unchanged_file_resumes_at_end() {
        let decision = decide("a.log", "a.log", 120, 120);
        assert_eq!(decision, RotationDecision::Resume(120));
        assert!(!decision.is_reset());
    }
}
