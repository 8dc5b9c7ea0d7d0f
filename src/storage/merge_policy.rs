use crate::storage::segment::SegmentMeta;

/// Policy for deciding when segments of one map are merged.
///
/// Segments are ordered newest first. Only a run of the newest segments
/// is ever merged, so the result keeps its place in that order.
pub trait MergePolicy: Send + Sync {
    /// How many of the newest segments to merge into one, if any
    fn select_segments_to_merge(&self, segments: &[SegmentMeta]) -> Option<usize>;
}

/// Size-tiered policy: the newest segments merge while no older one
/// dwarfs what has been collected so far, so each byte is rewritten a
/// logarithmic number of times.
#[derive(Debug, Clone)]
pub struct TieredMergePolicy {
    /// An older segment joins the run unless it is larger than this many
    /// times the run's total size
    pub size_ratio: u64,
    pub min_segments_to_merge: usize,
    /// Past this count the newest segments merge regardless of size
    pub max_segments_per_map: usize,
}

impl Default for TieredMergePolicy {
    fn default() -> Self {
        TieredMergePolicy {
            size_ratio: 4,
            min_segments_to_merge: 2,
            max_segments_per_map: 10,
        }
    }
}

impl MergePolicy for TieredMergePolicy {
    fn select_segments_to_merge(&self, segments: &[SegmentMeta]) -> Option<usize> {
        let min = self.min_segments_to_merge.max(2);
        if segments.len() < min {
            return None;
        }

        let mut run_bytes = 0u64;
        let mut run = 0;
        for segment in segments {
            if run > 0 && segment.size_bytes > run_bytes.saturating_mul(self.size_ratio) {
                break;
            }
            run_bytes += segment.size_bytes;
            run += 1;
        }

        if run >= min {
            return Some(run);
        }
        if segments.len() > self.max_segments_per_map {
            return Some(segments.len() - self.max_segments_per_map + 1);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::segment::SegmentId;

    fn sized(sizes: &[u64]) -> Vec<SegmentMeta> {
        sizes
            .iter()
            .map(|size| SegmentMeta { id: SegmentId::new(), entry_count: 1, size_bytes: *size })
            .collect()
    }

    #[test]
    fn small_segment_over_large_one_is_left_alone() {
        let policy = TieredMergePolicy::default();
        assert_eq!(policy.select_segments_to_merge(&sized(&[100, 3_000_000])), None);
    }

    #[test]
    fn similar_newest_segments_merge() {
        let policy = TieredMergePolicy::default();
        assert_eq!(policy.select_segments_to_merge(&sized(&[100, 120, 3_000_000])), Some(2));
        assert_eq!(policy.select_segments_to_merge(&sized(&[100, 120, 800, 3_000_000])), Some(3));
    }

    #[test]
    fn segment_count_is_capped() {
        let policy = TieredMergePolicy {
            size_ratio: 1,
            min_segments_to_merge: 2,
            max_segments_per_map: 3,
        };
        let segments = sized(&[1, 10, 100, 1_000, 10_000]);
        assert_eq!(policy.select_segments_to_merge(&segments), Some(3));
    }

    #[test]
    fn single_segment_never_merges() {
        let policy = TieredMergePolicy::default();
        assert_eq!(policy.select_segments_to_merge(&sized(&[5])), None);
        assert_eq!(policy.select_segments_to_merge(&[]), None);
    }
}
