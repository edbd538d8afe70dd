use logic_machine::ops::{PermutationExpander, Reducer};
use logic_machine::{ChannelSpec, Group, GroupList, LogicError, MachineConfig};
use ndarray::{ArrayD, IxDyn};
use test_log::test;

fn ramp(shape: &[usize]) -> ArrayD<f32> {
    let total: usize = shape.iter().product();
    let values = (0..total).map(|i| i as f32 / total as f32).collect();
    ArrayD::from_shape_vec(IxDyn(shape), values).unwrap()
}

#[test]
fn single_layer_over_object_predicates() {
    let machine = MachineConfig {
        depth: 1,
        breadth: 1,
        input_channels: ChannelSpec::from(vec![0, 3]),
        output_channels: ChannelSpec::from(vec![0, 2]),
        hidden_dimension: 16,
        ..MachineConfig::default()
    }
    .build()
    .unwrap();
    assert_eq!(machine.output_channels(), &[0, 2]);

    let inputs = GroupList::new(vec![Group::Absent, Group::from_array(ramp(&[1, 4, 3]))]);
    let outputs = machine.forward(&inputs, None).unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0], Group::Absent);
    let objects = outputs[1].array().unwrap();
    assert_eq!(objects.shape(), &[1, 4, 2]);
    assert!(objects.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn recursion_shares_layer_weights() {
    let machine = MachineConfig {
        depth: 5,
        breadth: 2,
        input_channels: ChannelSpec::from(2),
        output_channels: ChannelSpec::from(2),
        hidden_dimension: 8,
        recursion: true,
        ..MachineConfig::default()
    }
    .build()
    .unwrap();
    assert_eq!(machine.layer_count(), 3);

    let at = |level| {
        machine
            .layer(machine.layer_for_level(level).unwrap())
            .unwrap()
    };
    assert!(std::ptr::eq(at(3), at(2)));
    assert!(std::ptr::eq(at(4), at(2)));

    let inputs = GroupList::new(vec![
        Group::from_array(ramp(&[2, 2])),
        Group::from_array(ramp(&[2, 3, 2])),
        Group::from_array(ramp(&[2, 3, 3, 2])),
    ]);
    let outputs = machine.forward(&inputs, None).unwrap();
    assert_eq!(outputs.channels(), machine.output_channels());
}

#[test]
fn recursion_with_absent_global_facts() {
    let machine = MachineConfig {
        depth: 5,
        breadth: 2,
        input_channels: ChannelSpec::from(vec![0, 0, 2]),
        output_channels: ChannelSpec::from(2),
        hidden_dimension: 8,
        recursion: true,
        ..MachineConfig::default()
    }
    .build()
    .unwrap();
    assert_eq!(machine.layer_count(), 3);
    assert_eq!(machine.layer_for_level(3), Some(2));
    assert_eq!(machine.layer_for_level(4), Some(2));

    let inputs = GroupList::new(vec![
        Group::Absent,
        Group::Absent,
        Group::from_array(ramp(&[1, 3, 3, 2])),
    ]);
    let outputs = machine.forward(&inputs, None).unwrap();
    assert_eq!(outputs.channels(), machine.output_channels());

    let deeper = machine.forward(&inputs, Some(7)).unwrap();
    assert_eq!(deeper.channels(), vec![12, 14, 14]);
}

#[test]
fn residual_modes_are_exclusive() {
    for (residual, io_residual) in [(true, true), (false, false)] {
        let result = MachineConfig {
            residual,
            io_residual,
            ..MachineConfig::default()
        }
        .build();
        assert!(matches!(result, Err(LogicError::ResidualConflict { .. })));
    }
}

#[test]
fn diagonal_never_reaches_pair_reductions() {
    let reducer = Reducer::new(2, true);
    let diagonal = ArrayD::from_shape_fn(IxDyn(&[1, 3, 3, 1]), |idx| {
        if idx[1] == idx[2] {
            1.0f32
        } else {
            0.0
        }
    });
    let zeros = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 3, 1]));

    assert_eq!(
        reducer.apply(&diagonal).unwrap(),
        reducer.apply(&zeros).unwrap()
    );
}

#[test]
fn permutation_blocks_cover_every_axis_ordering() {
    let input = ramp(&[1, 2, 2, 2, 1]);
    let expanded = PermutationExpander::new(3).apply(input.clone()).unwrap();
    assert_eq!(expanded.shape(), &[1, 2, 2, 2, 6]);

    let mut blocks: Vec<Vec<f32>> = (0..6)
        .map(|block| {
            expanded
                .index_axis(ndarray::Axis(4), block)
                .iter()
                .copied()
                .collect()
        })
        .collect();
    blocks.sort_by(|a, b| a.partial_cmp(b).unwrap());
    blocks.dedup();
    assert_eq!(blocks.len(), 6);

    let objects = ramp(&[1, 4, 3]);
    assert_eq!(
        PermutationExpander::new(1).apply(objects.clone()).unwrap(),
        objects
    );
}

#[test]
fn empty_orders_stay_empty_across_calls() {
    let machine = MachineConfig {
        depth: 3,
        breadth: 3,
        input_channels: ChannelSpec::from(vec![0, 0, 0, 2]),
        output_channels: ChannelSpec::from(vec![2, 0, 2, 2]),
        hidden_dimension: 8,
        residual: true,
        io_residual: false,
        ..MachineConfig::default()
    }
    .build()
    .unwrap();

    let inputs = GroupList::new(vec![
        Group::Absent,
        Group::Absent,
        Group::Absent,
        Group::from_array(ramp(&[1, 3, 3, 3, 2])),
    ]);
    for _ in 0..3 {
        let outputs = machine.forward(&inputs, None).unwrap();
        assert_eq!(outputs[1], Group::Absent);
        assert_eq!(outputs.channels(), machine.output_channels());
    }
}
