use std::collections::HashSet;

/// Character bigrams of the lowercased text.
fn bigrams(text: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Jaccard similarity of character bigrams.
///
/// Matches questions with stored facts that share key terms
/// ("what tea do I like" vs "likes green tea"). Returns 0.0 if either
/// string has fewer than two characters.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn keyword_overlap(a: &str, b: &str) -> f64 {
    let bigrams_a = bigrams(a);
    let bigrams_b = bigrams(b);
    if bigrams_a.is_empty() || bigrams_b.is_empty() {
        return 0.0;
    }

    let intersection = bigrams_a.intersection(&bigrams_b).count();
    let union = bigrams_a.union(&bigrams_b).count();
    intersection as f64 / union as f64
}

/// `vector_sim * 0.7 + keyword_overlap * 0.3`
#[must_use]
pub fn hybrid_similarity(vector_sim: f64, keyword_overlap: f64) -> f64 {
    vector_sim.mul_add(0.7, keyword_overlap * 0.3)
}

/// Cosine similarity of two embeddings.
///
/// Returns 0.0 for mismatched lengths or a zero-magnitude vector.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut mag_a = 0.0_f64;
    let mut mag_b = 0.0_f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    dot / denom
}
