

pub fn cosine_similarity(vec1: &[f32], vec2: &[f32]) -> f64 {
    if vec1.is_empty() || vec2.is_empty() || vec1.len() != vec2.len() {
        return 0.0;
    }

    let dot_product: f32 = vec1.iter().zip(vec2.iter()).map(|(a, b)| a * b).sum();
    let mag1: f32 = vec1.iter().map(|a| a * a).sum::<f32>().sqrt();
    let mag2: f32 = vec2.iter().map(|b| b * b).sum::<f32>().sqrt();

    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    let similarity = f64::from(dot_product / (mag1 * mag2));

    ((similarity + 1.0) / 2.0).clamp(0.0, 1.0)
}


pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}


/// Contribution of one hop to a path score.
pub fn hop_score(decay: f64, edge_weight: f64) -> f64 {
    clamp_unit(decay * edge_weight)
}


/// Min-max normalization to [0, 1]. A flat input (including a single value) maps to all 1.0.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let Some(min) = scores.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = scores.iter().copied().fold(min, f64::max);
    let range = max - min;

    if range <= f64::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| clamp_unit((s - min) / range)).collect()
}


pub fn combine(alpha: f64, graph_score: f64, vector_score: f64) -> f64 {
    clamp_unit(alpha * graph_score + (1.0 - alpha) * vector_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((sim - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!((sim - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_cosine_similarity_mismatched() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_min_max_normalize() {
        let normalized = min_max_normalize(&[0.2, 0.6, 1.0]);
        assert!((normalized[0] - 0.0).abs() < 1e-9);
        assert!((normalized[1] - 0.5).abs() < 1e-9);
        assert!((normalized[2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_max_flat_and_single() {
        assert_eq!(min_max_normalize(&[0.3]), vec![1.0]);
        assert_eq!(min_max_normalize(&[0.4, 0.4]), vec![1.0, 1.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_combine_and_hop() {
        assert!((combine(0.6, 1.0, 0.5) - 0.8).abs() < 1e-9);
        assert!((hop_score(0.7, 0.9) - 0.63).abs() < 1e-9);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(1.3), 1.0);
    }
}
