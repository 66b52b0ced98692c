use crate::math::matrix::Matrix;

/// Lower clamp applied to the mixture distribution before its log.
pub const MIXTURE_CLAMP_MIN: f64 = 1e-7;

/// Weight of the consistency term relative to cross-entropy.
pub const CONSISTENCY_WEIGHT: f64 = 12.0;

/// Jensen-Shannon style consistency penalty across three views of a batch
/// (clean, aug1, aug2):
///
///   M   = clamp((p_clean + p_aug1 + p_aug2) / 3, 1e-7, 1)
///   L   = 12 * (KL(M‖p_clean) + KL(M‖p_aug1) + KL(M‖p_aug2)) / 3
///   KL(M‖p) = sum_{b,k} p_bk (ln p_bk - ln M_bk) / batch
///
/// The KL follows the `kl_div(log M, p, reduction = "batchmean")` convention.
pub struct JsdConsistencyLoss;

struct ViewStats {
    log_probs: [Matrix; 3],
    probs: [Matrix; 3],
    log_mixture: Matrix,
    /// 1.0 where the clamp was inactive (gradient flows), else 0.0.
    mixture_pass: Matrix,
    /// M / clamp(M); only read where the clamp was inactive.
    mixture_ratio: Matrix,
}

impl JsdConsistencyLoss {
    pub fn loss(views: [&Matrix; 3]) -> f64 {
        let stats = Self::stats(views);
        Self::loss_from(&stats, views[0].rows)
    }

    /// Loss plus the gradient w.r.t. each view's logits.
    pub fn loss_and_grad(views: [&Matrix; 3]) -> (f64, [Matrix; 3]) {
        let stats = Self::stats(views);
        let batch = views[0].rows;
        let loss = Self::loss_from(&stats, batch);
        let scale = CONSISTENCY_WEIGHT / 3.0 / batch as f64;

        let grads = [0, 1, 2].map(|v| {
            let log_p = &stats.log_probs[v];
            let p = &stats.probs[v];
            let mut grad = Matrix::zeros(p.rows, p.cols);
            for b in 0..p.rows {
                // ∂L/∂p_k = ln p_k + 1 - ln M_k - pass_k · M_k / clamp(M_k)
                let g: Vec<f64> = (0..p.cols)
                    .map(|k| {
                        log_p.get(b, k) + 1.0
                            - stats.log_mixture.get(b, k)
                            - stats.mixture_pass.get(b, k) * stats.mixture_ratio.get(b, k)
                    })
                    .collect();
                // Softmax Jacobian: ∂L/∂z_j = p_j (g_j - Σ_k p_k g_k)
                let dot: f64 = p.row(b).iter().zip(&g).map(|(pk, gk)| pk * gk).sum();
                for (j, out) in grad.row_mut(b).iter_mut().enumerate() {
                    *out = scale * p.get(b, j) * (g[j] - dot);
                }
            }
            grad
        });

        (loss, grads)
    }

    fn stats(views: [&Matrix; 3]) -> ViewStats {
        let shape = views[0].shape();
        assert!(views.iter().all(|v| v.shape() == shape), "consistency views must share a shape");

        let log_probs = views.map(|v| v.log_softmax_rows());
        let probs = [
            log_probs[0].map(f64::exp),
            log_probs[1].map(f64::exp),
            log_probs[2].map(f64::exp),
        ];
        let mixture = probs[0]
            .zip_map(&probs[1], |a, b| a + b)
            .zip_map(&probs[2], |ab, c| (ab + c) / 3.0);
        let clamped = mixture.map(|m| m.clamp(MIXTURE_CLAMP_MIN, 1.0));

        ViewStats {
            log_mixture: clamped.map(f64::ln),
            mixture_pass: mixture.map(|m| if (MIXTURE_CLAMP_MIN..=1.0).contains(&m) { 1.0 } else { 0.0 }),
            mixture_ratio: mixture.zip_map(&clamped, |m, c| m / c),
            log_probs,
            probs,
        }
    }

    fn loss_from(stats: &ViewStats, batch: usize) -> f64 {
        let kl_sum: f64 = (0..3)
            .map(|v| {
                let p = &stats.probs[v];
                let log_p = &stats.log_probs[v];
                p.data.iter()
                    .zip(&log_p.data)
                    .zip(&stats.log_mixture.data)
                    .map(|((p, lp), lm)| p * (lp - lm))
                    .sum::<f64>()
                    / batch as f64
            })
            .sum();
        CONSISTENCY_WEIGHT * kl_sum / 3.0
    }
}
