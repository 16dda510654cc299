//! Reciprocal Rank Fusion (RRF) for combining ranked lists.

use std::collections::HashMap;

use rag_core::{Document, RankedList, ScoredResult};

/// RRF constant (commonly 60).
/// Higher values flatten the gap between adjacent ranks.
pub const DEFAULT_RRF_K: u32 = 60;

/// Fuse ranked lists using Reciprocal Rank Fusion, keeping the scores.
///
/// RRF score = Σ 1 / (k + rank_i) over every list the document appears in,
/// with `rank_i` the 0-based position in list `i`.
///
/// Documents are merged on their trimmed content; when the same passage
/// shows up more than once, the last occurrence supplies the document
/// (and therefore its metadata). Ties keep first-seen order, so equal
/// inputs always produce the same output. A `k` of zero is treated as 1.
pub fn reciprocal_rank_fusion(lists: &[RankedList], k: u32) -> Vec<ScoredResult> {
    let k = f64::from(k.max(1));

    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut fused: Vec<(&Document, f64)> = Vec::new();

    for list in lists {
        for (rank, doc) in list.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f64);
            match slots.get(doc.fusion_key()) {
                Some(&slot) => {
                    let entry = &mut fused[slot];
                    entry.0 = doc;
                    entry.1 += contribution;
                }
                None => {
                    slots.insert(doc.fusion_key(), fused.len());
                    fused.push((doc, contribution));
                }
            }
        }
    }

    // `sort_by` is stable: equal scores stay in insertion order.
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    fused
        .into_iter()
        .map(|(doc, score)| ScoredResult {
            document: doc.clone(),
            score,
        })
        .collect()
}

/// Fuse ranked lists into a single ranked list.
///
/// See [`reciprocal_rank_fusion`] for the scoring and merge rules.
pub fn fuse(lists: &[RankedList], k: u32) -> RankedList {
    reciprocal_rank_fusion(lists, k)
        .into_iter()
        .map(|r| r.document)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> Document {
        Document::new(format!("passage {}", name), name)
    }

    fn keys(list: &[Document]) -> Vec<&str> {
        list.iter().map(|d| d.source_key.as_str()).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_rrf_single_list_keeps_order() {
        let list = vec![doc("a"), doc("b"), doc("c"), doc("d")];

        for k in [1, 10, 60, 1000] {
            let fused = reciprocal_rank_fusion(&[list.clone()], k);
            let order: Vec<_> = fused.iter().map(|r| r.document.source_key.as_str()).collect();
            assert_eq!(order, ["a", "b", "c", "d"]);
            for pair in fused.windows(2) {
                assert!(pair[0].score > pair[1].score);
            }
        }
    }

    #[test]
    fn test_rrf_dense_sparse_table() {
        // dense [D1, D2, D3], sparse [D3, D1], k = 60
        let dense = vec![doc("D1"), doc("D2"), doc("D3")];
        let sparse = vec![doc("D3"), doc("D1")];

        let fused = reciprocal_rank_fusion(&[dense, sparse], 60);

        let expected = [
            ("D1", 1.0 / 60.0 + 1.0 / 61.0), // 0.0330601...
            ("D3", 1.0 / 62.0 + 1.0 / 60.0), // 0.0327957...
            ("D2", 1.0 / 61.0),              // 0.0163934...
        ];

        assert_eq!(fused.len(), expected.len());
        for (result, (key, score)) in fused.iter().zip(expected) {
            assert_eq!(result.document.source_key, key);
            assert!(close(result.score, score), "{}: {} != {}", key, result.score, score);
        }
    }

    #[test]
    fn test_rrf_shared_document_outranks_single() {
        // "x" sits at rank 1 in both lists; "a" and "b" at rank 0 in one list each.
        let a = vec![doc("a"), doc("x")];
        let b = vec![doc("b"), doc("x")];

        let fused = fuse(&[a, b], 60);
        assert_eq!(fused[0].source_key, "x");
    }

    #[test]
    fn test_rrf_top_everywhere_wins_for_any_k() {
        for k in [1, 2, 60, 10_000] {
            let lists = vec![
                vec![doc("top"), doc("other1")],
                vec![doc("top"), doc("other2")],
                vec![doc("top")],
            ];
            let fused = fuse(&lists, k);
            assert_eq!(fused[0].source_key, "top");
        }
    }

    #[test]
    fn test_rrf_disjoint_lists() {
        let a = vec![doc("a1"), doc("a2"), doc("a3")];
        let b = vec![doc("b1"), doc("b2")];

        let fused = fuse(&[a, b], 60);
        assert_eq!(fused.len(), 5);

        let mut contents: Vec<_> = fused.iter().map(|d| d.content.clone()).collect();
        contents.sort();
        contents.dedup();
        assert_eq!(contents.len(), 5);

        // Equal ranks tie; first-seen list wins the tie.
        assert_eq!(keys(&fused), ["a1", "b1", "a2", "b2", "a3"]);
    }

    #[test]
    fn test_rrf_empty_inputs() {
        assert!(fuse(&[], 60).is_empty());
        assert!(fuse(&[vec![], vec![]], 60).is_empty());

        let only = vec![doc("a"), doc("b")];
        assert_eq!(keys(&fuse(&[vec![], only], 60)), ["a", "b"]);
    }

    #[test]
    fn test_rrf_merges_on_trimmed_content() {
        let dense = vec![Document::new("same text", "file.pdf-0").with_metadata("origin", "dense")];
        let sparse = vec![Document::new("  same text\n", "file.pdf-0").with_metadata("origin", "sparse")];

        let fused = reciprocal_rank_fusion(&[dense, sparse], 60);
        assert_eq!(fused.len(), 1);
        assert!(close(fused[0].score, 2.0 / 60.0));
        // Last occurrence supplies the document.
        assert_eq!(fused[0].document.metadata["origin"], "sparse");
    }

    #[test]
    fn test_rrf_does_not_mutate_inputs() {
        let lists = vec![vec![doc("a"), doc("b")], vec![doc("b")]];
        let before = lists.clone();
        let _ = fuse(&lists, 60);
        assert_eq!(lists, before);
    }

    #[test]
    fn test_rrf_zero_k_is_clamped() {
        let fused = reciprocal_rank_fusion(&[vec![doc("a"), doc("b")]], 0);
        assert!(close(fused[0].score, 1.0));
        assert!(close(fused[1].score, 0.5));
    }
}
