// src/layer/tests.rs

use super::*;
use crate::group::{Group, GroupList};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use test_log::test;

fn options(residual: bool) -> LayerOptions {
    LayerOptions {
        hidden_dimension: 8,
        exclude_self: true,
        residual,
    }
}

fn layer(breadth: usize, inputs: Vec<usize>, outputs: Vec<usize>, residual: bool) -> LogicLayer {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    LogicLayer::new(
        breadth,
        &ChannelSpec::from(inputs),
        &ChannelSpec::from(outputs),
        options(residual),
        &mut rng,
    )
    .expect("valid layer")
}

fn groups(batch: usize, objects: usize, channels: &[usize]) -> GroupList {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    GroupList::random(batch, objects, channels, &mut rng)
}

// --- Bookkeeping ---

#[test]
fn bookkeeping_counts_expansion_reduction_and_permutation() {
    let layer = layer(2, vec![2, 3, 4], vec![5, 6, 7], false);
    assert_eq!(layer.output_channels(), &[5, 6, 7]);

    // order 0: 2 own + 2*3 reduced
    assert_eq!(layer.inference(0).unwrap().input_dimension(), 8);
    // order 1: 3 own + 2 expanded + 2*4 reduced
    assert_eq!(layer.inference(1).unwrap().input_dimension(), 13);
    // order 2: (4 own + 3 expanded) * 2!
    assert_eq!(layer.inference(2).unwrap().input_dimension(), 14);
}

#[test]
fn forward_matches_bookkeeping() {
    for (breadth, inputs, outputs, residual) in [
        (1, vec![2, 3], vec![4, 4], false),
        (2, vec![1, 2, 3], vec![2, 3, 4], false),
        (2, vec![1, 2, 3], vec![2, 3, 4], true),
        (3, vec![0, 2, 0, 1], vec![3, 3, 3, 3], false),
        (2, vec![0, 3, 0], vec![0, 2, 2], true),
    ] {
        let layer = layer(breadth, inputs.clone(), outputs, residual);
        let out = layer.forward(&groups(2, 3, &inputs)).unwrap();
        assert_eq!(out.len(), breadth + 1);
        assert_eq!(out.channels(), layer.output_channels());
        assert!(out.validate(layer.output_channels()).is_ok());
    }
}

#[test]
fn single_object_order_scenario() {
    // breadth 1, order 1 input [1, 4, 3], outputs [0, 2].
    let layer = layer(1, vec![0, 3], vec![0, 2], false);
    assert!(layer.is_inert(0));
    assert_eq!(layer.output_channels(), &[0, 2]);

    let out = layer.forward(&groups(1, 4, &[0, 3])).unwrap();
    assert_eq!(out[0], Group::Absent);
    let order_one = out[1].array().unwrap();
    assert_eq!(order_one.shape(), &[1, 4, 2]);
    assert!(order_one.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn orders_without_contributors_stay_inert() {
    let layer = layer(3, vec![0, 0, 0, 2], vec![4, 4, 4, 4], false);
    assert!(layer.is_inert(0));
    assert!(layer.is_inert(1));
    assert!(layer.inference(0).is_none());
    assert!(!layer.is_inert(2));
    assert_eq!(layer.output_channels(), &[0, 0, 4, 4]);

    let out = layer.forward(&groups(1, 3, &[0, 0, 0, 2])).unwrap();
    assert_eq!(out[0], Group::Absent);
    assert_eq!(out[1], Group::Absent);
    assert_eq!(out[3].shape(), Some(&[1, 3, 3, 3, 4][..]));
}

#[test]
fn residual_prepends_the_input() {
    let layer = layer(1, vec![2, 3], vec![4, 5], true);
    assert_eq!(layer.output_channels(), &[6, 8]);

    let inputs = groups(1, 2, &[2, 3]);
    let out = layer.forward(&inputs).unwrap();
    let own = inputs[1].array().unwrap();
    let merged = out[1].array().unwrap();
    for i in 0..2 {
        for c in 0..3 {
            assert_eq!(merged[[0, i, c]], own[[0, i, c]]);
        }
    }
}

#[test]
fn zero_output_request_with_residual_passes_input_through() {
    let layer = layer(1, vec![2, 3], vec![0, 1], true);
    assert!(layer.is_inert(0));
    assert_eq!(layer.output_channels(), &[2, 4]);

    let inputs = groups(1, 2, &[2, 3]);
    let out = layer.forward(&inputs).unwrap();
    assert_eq!(out[0], inputs[0]);
}

#[test]
fn exclude_self_changes_pair_reductions() {
    let mut with = ChaCha8Rng::seed_from_u64(5);
    let mut without = ChaCha8Rng::seed_from_u64(5);
    let spec_in = ChannelSpec::from(vec![0, 0, 1]);
    let spec_out = ChannelSpec::from(vec![0, 1, 0]);
    let excluding = LogicLayer::new(2, &spec_in, &spec_out, options(false), &mut with).unwrap();
    let including = LogicLayer::new(
        2,
        &spec_in,
        &spec_out,
        LayerOptions {
            exclude_self: false,
            ..options(false)
        },
        &mut without,
    )
    .unwrap();

    // Only the diagonal is true: excluded, it looks exactly like all-false.
    let diagonal = ndarray::ArrayD::<f32>::from_shape_fn(ndarray::IxDyn(&[1, 3, 3, 1]), |idx| {
        if idx[1] == idx[2] {
            1.0
        } else {
            0.0
        }
    });
    let zeros = ndarray::ArrayD::<f32>::zeros(ndarray::IxDyn(&[1, 3, 3, 1]));
    let list = |pairs: ndarray::ArrayD<f32>| {
        GroupList::new(vec![Group::Absent, Group::Absent, Group::from_array(pairs)])
    };

    let a = excluding.forward(&list(diagonal.clone())).unwrap();
    let b = excluding.forward(&list(zeros.clone())).unwrap();
    assert_eq!(a[1], b[1]);

    let c = including.forward(&list(diagonal)).unwrap();
    let d = including.forward(&list(zeros)).unwrap();
    assert_ne!(c[1], d[1]);
}

// --- Contract violations ---

#[test]
fn construction_rejects_bad_parameters() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let one = ChannelSpec::from(1);
    assert!(matches!(
        LogicLayer::new(0, &one, &one, options(false), &mut rng),
        Err(LogicError::InvalidBreadth(0))
    ));
    assert!(matches!(
        LogicLayer::new(
            1,
            &one,
            &one,
            LayerOptions {
                hidden_dimension: 0,
                ..options(false)
            },
            &mut rng
        ),
        Err(LogicError::InvalidHidden(0))
    ));
    assert!(matches!(
        LogicLayer::new(2, &ChannelSpec::from(vec![1, 1]), &one, options(false), &mut rng),
        Err(LogicError::ChannelListLength {
            expected: 3,
            found: 2
        })
    ));
}

#[test]
fn forward_rejects_wrong_group_count() {
    let layer = layer(2, vec![1, 1, 1], vec![1, 1, 1], false);
    assert!(matches!(
        layer.forward(&groups(1, 3, &[1, 1])),
        Err(LogicError::GroupCount {
            expected: 3,
            found: 2
        })
    ));
}

#[test]
fn forward_rejects_wrong_channels() {
    let layer = layer(2, vec![1, 1, 1], vec![1, 1, 1], false);
    assert!(matches!(
        layer.forward(&groups(1, 3, &[1, 2, 1])),
        Err(LogicError::ChannelMismatch {
            order: 1,
            expected: 1,
            found: 2
        })
    ));
}

#[test]
fn wide_breadth_only_warns() {
    let layer = layer(4, vec![1, 1, 0, 0, 0], vec![1, 1, 1, 1, 1], false);
    assert_eq!(layer.breadth(), 4);
    assert!(layer.parameter_count() > 0);
}
