//! The masking primitives of Representation Self-Challenging.
//!
//! Every mask produced here holds only `0.0` (muted) and `1.0` (kept) values.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::arch::ops;

/// Computes the `q`-th percentile of `values` (`q` in `[0, 100]`, clamped), linearly
/// interpolating between the two closest ranks.
///
/// Returns `NaN` for an empty input.
pub fn percentile(values: ArrayView1<f32>, q: f32) -> f32 {
    let mut sorted = values.to_vec();
    if sorted.is_empty() {
        return f32::NAN;
    }

    sorted.sort_by(f32::total_cmp);

    let rank = q.clamp(0., 100.) / 100. * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;

    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f32)
}

/// Builds the per-example channel mask: for each row of `grad`, the channels whose gradient
/// is in the top `drop_f` percent are muted.
///
/// # Arguments
/// * `grad` - The gradient of the true class logits with respect to the features (N x D).
/// * `drop_f` - The percentage of channels to mute per example.
///
/// # Returns
/// An N x D mask, 1 where `grad[i, j]` is below the `100 - drop_f` percentile of row `i`.
pub fn channel_mask(grad: ArrayView2<f32>, drop_f: f32) -> Array2<f32> {
    let mut mask = Array2::zeros(grad.raw_dim());

    for (g, mut m) in grad.axis_iter(Axis(0)).zip(mask.axis_iter_mut(Axis(0))) {
        let threshold = percentile(g, 100. - drop_f);
        m.zip_mut_with(&g, |m, &g| *m = keep(g < threshold));
    }

    mask
}

/// Computes how much the true class probability of each example dropped after muting.
///
/// # Arguments
/// * `pred` - The logits of the untouched features.
/// * `pred_muted` - The logits of the muted features.
/// * `one_hot` - The one-hot encoded labels.
pub fn confidence_drop(
    pred: ArrayView2<f32>,
    pred_muted: ArrayView2<f32>,
    one_hot: ArrayView2<f32>,
) -> Array1<f32> {
    let confidence = (ops::softmax(pred) * &one_hot).sum_axis(Axis(1));
    let muted_confidence = (ops::softmax(pred_muted) * &one_hot).sum_axis(Axis(1));

    confidence - muted_confidence
}

/// Builds the per-batch mask: the `drop_b` percent of examples with the largest confidence
/// drop stay challenged (0), every other example gets its features back (1).
///
/// # Returns
/// An N x 1 mask meant to be broadcast over the feature channels.
pub fn batch_mask(changes: ArrayView1<f32>, drop_b: f32) -> Array2<f32> {
    let threshold = percentile(changes, 100. - drop_b);

    changes
        .mapv(|c| keep(c < threshold))
        .insert_axis(Axis(1))
}

/// Combines both masks with a logical or, broadcasting `mask_b` over the channels.
pub fn combine(mask_f: ArrayView2<f32>, mask_b: ArrayView2<f32>) -> Array2<f32> {
    let mut mask = mask_f.to_owned();
    mask.zip_mut_with(&mask_b, |m, &b| *m = keep(*m > 0. || b > 0.));
    mask
}

fn keep(kept: bool) -> f32 {
    if kept { 1. } else { 0. }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn is_binary(mask: &Array2<f32>) -> bool {
        mask.iter().all(|&m| m == 0. || m == 1.)
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = array![4., 1., 3., 2.];

        assert_eq!(percentile(values.view(), 0.), 1.);
        assert_eq!(percentile(values.view(), 100.), 4.);
        assert_eq!(percentile(values.view(), 50.), 2.5);
        assert_eq!(percentile(values.view(), 75.), 3.25);
        assert_eq!(percentile(values.view(), 150.), 4.);
    }

    #[test]
    fn percentile_of_a_single_value_is_the_value() {
        assert_eq!(percentile(array![7.].view(), 33.), 7.);
        assert!(percentile(Array1::<f32>::zeros(0).view(), 50.).is_nan());
    }

    #[test]
    fn channel_mask_mutes_the_dominant_channel() {
        // Channel 2 has the largest gradient on every row.
        let grad = array![
            [0.1, 0.2, 5.0, 0.3],
            [-0.4, 0.0, 2.0, 0.1],
            [0.3, 0.2, 9.0, -1.0],
        ];

        let mask = channel_mask(grad.view(), 25.);

        for row in mask.axis_iter(Axis(0)) {
            assert_eq!(row, array![1., 1., 0., 1.]);
        }
    }

    #[test]
    fn channel_mask_zero_fraction_follows_drop_f() {
        let d = 100;
        let grad = Array2::from_shape_fn((3, d), |(i, j)| ((j * 37 + i * 11) % d) as f32);

        let mask = channel_mask(grad.view(), 33.);

        assert!(is_binary(&mask));
        for row in mask.axis_iter(Axis(0)) {
            let zeros = row.iter().filter(|&&m| m == 0.).count();
            assert!((zeros as i32 - 33).abs() <= 1, "got {zeros} zeros");
        }
    }

    #[test]
    fn batch_mask_keeps_the_unaffected_example() {
        // Muting hurt the first example a lot and didn't change the second one.
        let changes = array![0.8, 0.0];

        let mask = batch_mask(changes.view(), 50.);

        assert_eq!(mask, array![[0.], [1.]]);
    }

    #[test]
    fn confidence_drop_is_positive_when_muting_hurts() {
        let pred = array![[5., 0.], [0., 0.]];
        let muted = array![[0., 0.], [0., 0.]];
        let one_hot = array![[1., 0.], [0., 1.]];

        let changes = confidence_drop(pred.view(), muted.view(), one_hot.view());

        assert!(changes[0] > 0.4);
        assert_eq!(changes[1], 0.);
    }

    #[test]
    fn combine_is_a_broadcast_or() {
        let mask_f = array![[1., 0., 0.], [0., 1., 0.]];
        let mask_b = array![[0.], [1.]];

        let mask = combine(mask_f.view(), mask_b.view());

        assert_eq!(mask, array![[1., 0., 0.], [1., 1., 1.]]);
        assert!(is_binary(&mask));
    }
}
