use crate::math::matrix::Matrix;

/// Categorical cross-entropy computed from raw logits, mean-reduced over the
/// batch.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// L = -mean_b log softmax(z_b)[y_b]
    ///
    /// `logits`  — shape [batch, n_classes]
    /// `targets` — class index per row
    pub fn loss(logits: &Matrix, targets: &[usize]) -> f64 {
        assert_eq!(logits.rows, targets.len(), "one target per logit row");
        let log_probs = logits.log_softmax_rows();
        let total: f64 = targets.iter()
            .enumerate()
            .map(|(b, &y)| -log_probs.get(b, y))
            .sum();
        total / logits.rows as f64
    }

    /// Loss plus its gradient w.r.t. the logits.
    ///
    /// Softmax and cross-entropy compose to
    ///   ∂L/∂z_bi = (softmax(z_b)_i - onehot(y_b)_i) / batch
    pub fn loss_and_grad(logits: &Matrix, targets: &[usize]) -> (f64, Matrix) {
        assert_eq!(logits.rows, targets.len(), "one target per logit row");
        let log_probs = logits.log_softmax_rows();
        let batch = logits.rows as f64;

        let mut loss = 0.0;
        let mut grad = log_probs.map(f64::exp);
        for (b, &y) in targets.iter().enumerate() {
            loss -= log_probs.get(b, y);
            let v = grad.get(b, y);
            grad.set(b, y, v - 1.0);
        }
        (loss / batch, grad.scale(1.0 / batch))
    }

    /// Number of rows whose argmax equals the target.
    pub fn correct(logits: &Matrix, targets: &[usize]) -> usize {
        logits.argmax_rows()
            .iter()
            .zip(targets)
            .filter(|(p, t)| p == t)
            .count()
    }
}
