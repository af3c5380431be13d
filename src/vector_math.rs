use ndarray::ArrayView1;

use crate::core::errors::AssistantError;

pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, AssistantError> {
    if query.is_empty() || candidate.is_empty() {
        return Err(AssistantError::InvalidRequest(
            "vectors must not be empty".to_string(),
        ));
    }
    if query.len() != candidate.len() {
        return Err(AssistantError::InvalidRequest(format!(
            "vector length mismatch: {} != {}",
            query.len(),
            candidate.len()
        )));
    }

    let a = ArrayView1::from(query);
    let b = ArrayView1::from(candidate);

    let dot = a.dot(&b);
    let denom = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if denom <= f32::EPSILON {
        return Ok(0.0);
    }

    Ok(dot / denom)
}

/// Score every candidate against the query and return `(index, score)`
/// pairs in descending score order. The sort is stable, so candidates with
/// equal scores keep their input order.
pub fn rank_descending_by_cosine(
    query: &[f32],
    candidates: &[Vec<f32>],
) -> Result<Vec<(usize, f32)>, AssistantError> {
    let mut scores = Vec::with_capacity(candidates.len());
    for (idx, candidate) in candidates.iter().enumerate() {
        scores.push((idx, cosine_similarity(query, candidate)?));
    }

    scores.sort_by(|left, right| {
        right
            .1
            .partial_cmp(&left.1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(scores)
}
