use super::domain::{SegmentKind, SourceChunk, TimelineSegment};

/// Inter-chunk skew tolerated as recorder jitter before filler is planned.
pub const DEFAULT_GAP_THRESHOLD_SECONDS: f64 = 0.5;

/// Build the merge plan from chunks already sorted by capture instant with
/// known durations.
///
/// The timeline origin is the first chunk's capture instant. Chunks whose
/// start falls at or past the duration budget are dropped along with
/// everything after them; the last surviving chunk (and any gap before it)
/// is clamped so nothing ends past the budget. Chunks with identical
/// instants keep their input order and never get a gap between them.
pub fn build_timeline(
    chunks: &[SourceChunk],
    gap_threshold_seconds: f64,
    budget_seconds: f64,
) -> Vec<TimelineSegment> {
    let mut segments = Vec::new();
    let Some(first) = chunks.first() else {
        return segments;
    };
    let origin_ms = first.capture_instant_ms;

    for (index, chunk) in chunks.iter().enumerate() {
        let start_second = (chunk.capture_instant_ms - origin_ms) as f64 / 1000.0;
        if start_second >= budget_seconds {
            break;
        }
        let effective_duration = chunk.duration_seconds.min(budget_seconds - start_second);

        if index > 0 {
            let prev = &chunks[index - 1];
            let prev_end_ms =
                prev.capture_instant_ms + (prev.duration_seconds * 1000.0).round() as i64;
            let gap_seconds = (chunk.capture_instant_ms - prev_end_ms) as f64 / 1000.0;
            if gap_seconds > gap_threshold_seconds {
                let gap_start = (prev_end_ms - origin_ms) as f64 / 1000.0;
                let gap_duration = gap_seconds.min(budget_seconds - gap_start);
                if gap_duration > 0.0 {
                    segments.push(TimelineSegment {
                        kind: SegmentKind::Gap,
                        source_path: None,
                        start_second: gap_start,
                        duration_seconds: gap_duration,
                    });
                }
            }
        }

        segments.push(TimelineSegment {
            kind: SegmentKind::Chunk,
            source_path: chunk.local_path.clone(),
            start_second,
            duration_seconds: effective_duration,
        });
    }

    segments
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn chunk(instant_ms: i64, duration_seconds: f64) -> SourceChunk {
        SourceChunk {
            key: format!("{instant_ms}.mp4"),
            capture_instant_ms: instant_ms,
            duration_seconds,
            local_path: Some(PathBuf::from(format!("/tmp/{instant_ms}.mp4"))),
        }
    }

    fn assert_ordering_invariants(segments: &[TimelineSegment], budget: f64) {
        for pair in segments.windows(2) {
            assert!(
                pair[1].start_second
                    >= pair[0].start_second + pair[0].duration_seconds - 1e-3,
                "segments overlap beyond tolerance: {pair:?}"
            );
            assert!(pair[1].start_second >= pair[0].start_second);
        }
        for segment in segments {
            assert!(
                segment.start_second + segment.duration_seconds <= budget + 1e-9,
                "segment ends past the budget: {segment:?}"
            );
        }
    }

    #[test]
    fn contiguous_chunks_produce_no_gaps() {
        let chunks = vec![
            chunk(1_000_000, 10.0),
            chunk(1_010_000, 10.0),
            chunk(1_020_000, 10.0),
        ];
        let segments = build_timeline(&chunks, DEFAULT_GAP_THRESHOLD_SECONDS, 3600.0);

        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Chunk));
        let starts: Vec<f64> = segments.iter().map(|s| s.start_second).collect();
        assert_eq!(starts, vec![0.0, 10.0, 20.0]);
        assert_ordering_invariants(&segments, 3600.0);
    }

    #[test]
    fn a_gap_between_chunks_gets_matching_filler() {
        let chunks = vec![chunk(1_000_000, 10.0), chunk(1_020_000, 10.0)];
        let segments = build_timeline(&chunks, DEFAULT_GAP_THRESHOLD_SECONDS, 3600.0);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].kind, SegmentKind::Chunk);
        assert_eq!(segments[1].kind, SegmentKind::Gap);
        assert_eq!(segments[2].kind, SegmentKind::Chunk);
        assert_eq!(segments[1].start_second, 10.0);
        assert!((segments[1].duration_seconds - 10.0).abs() < 1e-3);
        assert_eq!(segments[2].start_second, 20.0);
        assert_ordering_invariants(&segments, 3600.0);
    }

    #[test]
    fn sub_threshold_skew_is_ignored() {
        let chunks = vec![chunk(1_000_000, 10.0), chunk(1_010_200, 10.0)];
        let segments = build_timeline(&chunks, DEFAULT_GAP_THRESHOLD_SECONDS, 3600.0);

        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Chunk));
    }

    #[test]
    fn budget_clamps_the_last_chunk() {
        let chunks = vec![chunk(0, 3500.0), chunk(3_500_000, 300.0)];
        let segments = build_timeline(&chunks, DEFAULT_GAP_THRESHOLD_SECONDS, 3600.0);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start_second, 3500.0);
        assert!((segments[1].duration_seconds - 100.0).abs() < 1e-9);
        assert_ordering_invariants(&segments, 3600.0);
    }

    #[test]
    fn chunks_past_the_budget_are_dropped_without_filler() {
        let chunks = vec![chunk(0, 10.0), chunk(3_700_000, 10.0)];
        let segments = build_timeline(&chunks, DEFAULT_GAP_THRESHOLD_SECONDS, 3600.0);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, SegmentKind::Chunk);
    }

    #[test]
    fn gap_filler_still_appears_before_a_budget_clamped_chunk() {
        let chunks = vec![chunk(0, 3500.0), chunk(3_590_000, 20.0)];
        let segments = build_timeline(&chunks, DEFAULT_GAP_THRESHOLD_SECONDS, 3600.0);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].kind, SegmentKind::Gap);
        assert_eq!(segments[1].start_second, 3500.0);
        assert!((segments[1].duration_seconds - 90.0).abs() < 1e-9);
        // The chunk behind the gap is clamped to the budget.
        assert_eq!(segments[2].start_second, 3590.0);
        assert!((segments[2].duration_seconds - 10.0).abs() < 1e-9);
        assert_ordering_invariants(&segments, 3600.0);
    }

    #[test]
    fn identical_instants_keep_input_order_with_no_gap() {
        let mut first = chunk(1_000_000, 10.0);
        first.key = "a.mp4".to_string();
        let mut second = chunk(1_000_000, 8.0);
        second.key = "b.mp4".to_string();

        let segments = build_timeline(
            &[first, second],
            DEFAULT_GAP_THRESHOLD_SECONDS,
            3600.0,
        );
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Chunk));
        assert_eq!(segments[0].duration_seconds, 10.0);
        assert_eq!(segments[1].duration_seconds, 8.0);
        assert_eq!(segments[1].start_second, 0.0);
    }

    #[test]
    fn zero_length_chunks_are_still_emitted() {
        let chunks = vec![chunk(1_000_000, 0.0), chunk(1_000_000, 10.0)];
        let segments = build_timeline(&chunks, DEFAULT_GAP_THRESHOLD_SECONDS, 3600.0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].duration_seconds, 0.0);
    }

    #[test]
    fn empty_input_yields_an_empty_plan() {
        assert!(build_timeline(&[], DEFAULT_GAP_THRESHOLD_SECONDS, 3600.0).is_empty());
    }

    #[test]
    fn starts_are_non_decreasing_for_jittery_input() {
        // Overlapping capture windows (recorder restarted mid-chunk).
        let chunks = vec![
            chunk(1_000_000, 12.0),
            chunk(1_010_000, 10.0),
            chunk(1_030_000, 4.0),
            chunk(1_033_000, 10.0),
        ];
        let segments = build_timeline(&chunks, DEFAULT_GAP_THRESHOLD_SECONDS, 3600.0);
        for pair in segments.windows(2) {
            assert!(pair[1].start_second >= pair[0].start_second);
        }
    }
}
