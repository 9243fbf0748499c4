use super::*;
use tempfile::TempDir;

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

fn sample_index() -> VectorIndex {
    let mut index = VectorIndex::new(3);
    index
        .add(&[
            vec![3.0, 0.0, 0.0],
            vec![0.0, 2.0, 0.0],
            vec![1.0, 1.0, 0.0],
            vec![0.0, 0.0, 5.0],
            vec![-1.0, 0.0, 0.0],
        ])
        .expect("should add vectors");
    index
}

#[test]
fn stored_vectors_are_unit_length() {
    let index = sample_index();
    assert_eq!(index.len(), 5);

    for position in 0..index.len() {
        let vector = index.vector(position).expect("position exists");
        assert!(
            (norm(vector) - 1.0).abs() < 1e-5,
            "vector {} has norm {}",
            position,
            norm(vector)
        );
    }
    assert!(index.vector(5).is_none());
}

#[test]
fn positions_are_assigned_consecutively() {
    let mut index = VectorIndex::new(2);
    index.add(&[vec![1.0, 0.0]]).expect("should add");
    index.add(&[vec![0.0, 1.0], vec![1.0, 1.0]]).expect("should add");

    assert_eq!(index.len(), 3);
    let hits = index.search(&[0.0, 7.0], 1).expect("should search");
    assert_eq!(hits[0].position, 1);
}

#[test]
fn search_ranks_by_cosine_similarity() {
    let index = sample_index();

    let hits = index.search(&[10.0, 0.0, 0.0], 3).expect("should search");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].position, 0);
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    assert_eq!(hits[1].position, 2);
    assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);

    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn scores_stay_within_cosine_bounds() {
    let index = sample_index();
    let hits = index.search(&[1.0, 0.0, 0.0], 10).expect("should search");

    assert_eq!(hits.len(), 5);
    let last = hits.last().expect("has hits");
    assert_eq!(last.position, 4);
    assert!((last.score + 1.0).abs() < 1e-5);
    assert!(hits.iter().all(|h| (-1.0..=1.0).contains(&h.score)));
}

#[test]
fn equal_scores_keep_ascending_position() {
    let mut index = VectorIndex::new(2);
    index
        .add(&[
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![2.0, 0.0],
            vec![1.0, 0.0],
        ])
        .expect("should add");

    for _ in 0..10 {
        let hits = index.search(&[1.0, 0.0], 5).expect("should search");
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 3, 4, 0, 2]);
    }
}

#[test]
fn k_larger_than_index_returns_everything() {
    let index = sample_index();
    assert_eq!(index.search(&[0.0, 0.0, 1.0], 50).expect("search").len(), 5);
    assert!(index.search(&[0.0, 0.0, 1.0], 0).expect("search").is_empty());
    assert!(
        VectorIndex::new(3)
            .search(&[0.0, 0.0, 1.0], 3)
            .expect("search")
            .is_empty()
    );
}

#[test]
fn rejects_wrong_dimension_and_degenerate_vectors() {
    let mut index = VectorIndex::new(3);

    assert!(matches!(
        index.add(&[vec![1.0, 0.0]]),
        Err(RagError::Dimension {
            expected: 3,
            actual: 2
        })
    ));
    assert!(matches!(
        index.add(&[vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]]),
        Err(RagError::InvalidVector(_))
    ));
    assert!(index.add(&[vec![f32::NAN, 0.0, 0.0]]).is_err());
    assert!(index.is_empty(), "failed adds must not append anything");

    index.add(&[vec![1.0, 0.0, 0.0]]).expect("should add");
    assert!(index.search(&[1.0, 0.0], 1).is_err());
    assert!(index.search(&[0.0, 0.0, 0.0], 1).is_err());
}

#[test]
fn persist_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("index.bin");
    let index = sample_index();

    index.persist(&path).expect("should persist");
    assert!(!format::temp_path(&path).exists());
    let loaded = VectorIndex::load(&path, 3).expect("should load");

    assert_eq!(loaded, index);

    let queries = [
        vec![1.0, 0.2, 0.0],
        vec![0.0, 1.0, 1.0],
        vec![-0.5, 0.1, 0.3],
        vec![0.3, 0.3, 0.3],
    ];
    for query in &queries {
        assert_eq!(
            loaded.search(query, 3).expect("search loaded"),
            index.search(query, 3).expect("search original")
        );
    }
}

#[test]
fn load_rejects_dimension_mismatch() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("index.bin");
    sample_index().persist(&path).expect("should persist");

    assert!(matches!(
        VectorIndex::load(&path, 1536),
        Err(RagError::CorruptIndex(_))
    ));
}

#[test]
fn load_rejects_corrupted_files() {
    let bytes = sample_index().to_bytes().expect("should encode");

    let truncated = &bytes[..bytes.len() - 3];
    assert!(matches!(
        VectorIndex::from_bytes(truncated, 3),
        Err(RagError::CorruptIndex(_))
    ));

    let mut wrong_magic = bytes.clone();
    wrong_magic[0] = b'X';
    assert!(matches!(
        VectorIndex::from_bytes(&wrong_magic, 3),
        Err(RagError::CorruptIndex(_))
    ));

    let mut extra = bytes.clone();
    extra.extend_from_slice(&[0, 0, 0, 0]);
    assert!(VectorIndex::from_bytes(&extra, 3).is_err());

    let mut non_finite = bytes;
    let last = non_finite.len() - 4;
    non_finite[last..].copy_from_slice(&f32::INFINITY.to_le_bytes());
    assert!(VectorIndex::from_bytes(&non_finite, 3).is_err());

    assert!(VectorIndex::from_bytes(b"PRAG", 3).is_err());
}

#[test]
fn embeddings_file_is_not_an_index() {
    let index = sample_index();
    let bytes = format::encode(format::EMBEDDINGS_MAGIC, 3, index.as_rows())
        .expect("should encode embeddings");

    assert!(VectorIndex::from_bytes(&bytes, 3).is_err());

    let matrix = format::decode(format::EMBEDDINGS_MAGIC, &bytes).expect("should decode");
    assert_eq!(matrix.dimension, 3);
    assert_eq!(matrix.count, 5);
    assert_eq!(matrix.rows, index.as_rows());
}

#[test]
fn header_layout_is_documented_layout() {
    let mut index = VectorIndex::new(2);
    index.add(&[vec![1.0, 0.0]]).expect("should add");
    let bytes = index.to_bytes().expect("should encode");

    assert_eq!(&bytes[..8], b"PRAGIDX1");
    assert_eq!(&bytes[8..12], &2_u32.to_le_bytes());
    assert_eq!(&bytes[12..20], &1_u64.to_le_bytes());
    assert_eq!(&bytes[20..24], &1.0_f32.to_le_bytes());
    assert_eq!(&bytes[24..28], &0.0_f32.to_le_bytes());
    assert_eq!(bytes.len(), 28);
}
