//! Softmax-with-temperature sampling used for variant selection.

use rand::Rng;

/// `p_i ∝ exp(score_i / T)`. Temperature is floored to a small epsilon so a caller
/// passing `0.0` doesn't divide by zero; weights always sum to `1.0` (±ε) for any
/// non-empty, finite `scores`.
pub fn softmax_weights(scores: &[f32], temperature: f32) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let t = temperature.max(1e-6);
    let scaled: Vec<f32> = scores.iter().map(|s| s / t).collect();
    let max = scaled.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scaled.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Draws `k` indices into `weights` with replacement, proportional to `weights`.
pub fn sample_indices_with_replacement(weights: &[f32], k: usize, rng: &mut impl Rng) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }

    let mut cumulative = Vec::with_capacity(weights.len());
    let mut running = 0.0;
    for w in weights {
        running += w;
        cumulative.push(running);
    }
    let total = *cumulative.last().unwrap_or(&1.0);

    (0..k)
        .map(|_| {
            let draw: f32 = rng.gen_range(0.0..total.max(f32::MIN_POSITIVE));
            cumulative
                .iter()
                .position(|c| draw <= *c)
                .unwrap_or(weights.len() - 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn weights_sum_to_one() {
        let weights = softmax_weights(&[0.1, 0.5, 0.9], 0.2);
        let sum: f32 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn weights_are_monotone_in_score() {
        let weights = softmax_weights(&[0.1, 0.5, 0.9], 0.2);
        assert!(weights[0] < weights[1]);
        assert!(weights[1] < weights[2]);
    }

    #[test]
    fn zero_temperature_does_not_panic() {
        let weights = softmax_weights(&[0.1, 0.9], 0.0);
        let sum: f32 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn sampling_with_replacement_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let weights = softmax_weights(&[0.2, 0.4, 0.4], 0.5);
        let picks = sample_indices_with_replacement(&weights, 20, &mut rng);
        assert_eq!(picks.len(), 20);
        assert!(picks.iter().all(|&i| i < 3));
    }
}
