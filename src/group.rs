//! Predicate groups and the per-order group list passed between layers.
//!
//! A group of order `r` is an array shaped `[batch, n, .., n (r times), channels]`.
//! Orders that carry no channels are `Absent` rather than zero-width arrays.

use std::ops::Index;

use ndarray::{concatenate, ArrayD, Axis, IxDyn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LogicError, Result};

/// One predicate group: either a realized array or nothing at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Group {
    Present(ArrayD<f32>),
    #[default]
    Absent,
}

impl Group {
    /// Wraps an array, treating a zero-width feature axis as absent.
    pub fn from_array(array: ArrayD<f32>) -> Self {
        match array.shape().last() {
            Some(&0) | None => Group::Absent,
            Some(_) => Group::Present(array),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Group::Present(_))
    }

    pub fn array(&self) -> Option<&ArrayD<f32>> {
        match self {
            Group::Present(array) => Some(array),
            Group::Absent => None,
        }
    }

    pub fn into_array(self) -> Option<ArrayD<f32>> {
        match self {
            Group::Present(array) => Some(array),
            Group::Absent => None,
        }
    }

    /// Number of channels on the feature axis (0 when absent).
    pub fn channels(&self) -> usize {
        match self {
            Group::Present(array) => array.shape().last().copied().unwrap_or(0),
            Group::Absent => 0,
        }
    }

    /// Shape of the underlying array, if any.
    pub fn shape(&self) -> Option<&[usize]> {
        self.array().map(|array| array.shape())
    }

    /// Concatenates `self` and `other` along the feature axis.
    ///
    /// `Absent` contributes nothing, so merging with it returns the other side.
    pub fn merge(self, other: Group) -> Result<Group> {
        match (self, other) {
            (Group::Absent, other) => Ok(other),
            (this, Group::Absent) => Ok(this),
            (Group::Present(a), Group::Present(b)) => {
                let axis = Axis(a.ndim().saturating_sub(1));
                Ok(Group::Present(concatenate(axis, &[a.view(), b.view()])?))
            }
        }
    }
}

impl From<ArrayD<f32>> for Group {
    fn from(array: ArrayD<f32>) -> Self {
        Group::from_array(array)
    }
}

impl From<Option<ArrayD<f32>>> for Group {
    fn from(array: Option<ArrayD<f32>>) -> Self {
        array.map_or(Group::Absent, Group::from_array)
    }
}

/// Fixed-length list of groups, indexed by order `0..=breadth`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupList {
    groups: Box<[Group]>,
}

impl GroupList {
    pub fn new(groups: Vec<Group>) -> Self {
        GroupList {
            groups: groups.into_boxed_slice(),
        }
    }

    /// A list of `breadth + 1` absent groups.
    pub fn absent(breadth: usize) -> Self {
        GroupList::new(vec![Group::Absent; breadth + 1])
    }

    /// Groups of uniform random truth values in `[0, 1)`, shaped
    /// `[batch, n^order, channels[order]]`; zero-channel orders are absent.
    pub fn random<R: Rng>(batch: usize, objects: usize, channels: &[usize], rng: &mut R) -> Self {
        channels
            .iter()
            .enumerate()
            .map(|(order, &width)| {
                if width == 0 {
                    return Group::Absent;
                }
                let mut shape = Vec::with_capacity(order + 2);
                shape.push(batch);
                shape.extend(std::iter::repeat(objects).take(order));
                shape.push(width);
                Group::from_array(ArrayD::from_shape_fn(IxDyn(&shape), |_| rng.gen::<f32>()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Highest order held by the list.
    pub fn breadth(&self) -> usize {
        self.groups.len().saturating_sub(1)
    }

    pub fn get(&self, order: usize) -> Option<&Group> {
        self.groups.get(order)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Group> {
        self.groups.iter()
    }

    /// Channel count per order.
    pub fn channels(&self) -> Vec<usize> {
        self.groups.iter().map(Group::channels).collect()
    }

    /// Batch size shared by the present groups.
    pub fn batch_size(&self) -> Option<usize> {
        self.groups
            .iter()
            .find_map(|group| group.shape().and_then(|shape| shape.first().copied()))
    }

    /// Object count `n`, read from the first present group of order 1 or above.
    pub fn object_count(&self) -> Option<usize> {
        self.groups
            .iter()
            .skip(1)
            .find_map(|group| group.shape().and_then(|shape| shape.get(1).copied()))
    }

    pub fn into_vec(self) -> Vec<Group> {
        self.groups.into_vec()
    }

    /// Checks the list against a per-order channel prediction.
    ///
    /// Verifies the group count, every order's channel count and rank, and
    /// that batch and object axes agree across all present groups.
    pub fn validate(&self, expected: &[usize]) -> Result<()> {
        if self.len() != expected.len() {
            return Err(LogicError::GroupCount {
                expected: expected.len(),
                found: self.len(),
            });
        }

        let batch = self.batch_size();
        let objects = self.object_count();

        for (order, (group, &channels)) in self.groups.iter().zip(expected).enumerate() {
            if group.channels() != channels {
                return Err(LogicError::ChannelMismatch {
                    order,
                    expected: channels,
                    found: group.channels(),
                });
            }
            let Some(shape) = group.shape() else {
                continue;
            };
            if shape.len() != order + 2 {
                return Err(LogicError::RankMismatch {
                    order,
                    expected: order + 2,
                    found: shape.len(),
                });
            }
            if let Some(batch) = batch {
                if shape[0] != batch {
                    return Err(LogicError::BatchMismatch {
                        order,
                        expected: batch,
                        found: shape[0],
                    });
                }
            }
            if let Some(n) = objects {
                if let Some(&bad) = shape[1..=order].iter().find(|&&axis| axis != n) {
                    return Err(LogicError::ObjectCountMismatch {
                        order,
                        expected: n,
                        found: bad,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Index<usize> for GroupList {
    type Output = Group;

    fn index(&self, order: usize) -> &Group {
        &self.groups[order]
    }
}

impl FromIterator<Group> for GroupList {
    fn from_iter<I: IntoIterator<Item = Group>>(iter: I) -> Self {
        GroupList::new(iter.into_iter().collect())
    }
}

impl IntoIterator for GroupList {
    type Item = Group;
    type IntoIter = std::vec::IntoIter<Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_vec().into_iter()
    }
}

impl<'a> IntoIterator for &'a GroupList {
    type Item = &'a Group;
    type IntoIter = std::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Per-order channel counts: one value for every order, or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelSpec {
    Uniform(usize),
    PerOrder(Vec<usize>),
}

impl ChannelSpec {
    /// Expands the spec to exactly `breadth + 1` entries.
    pub fn resolve(&self, breadth: usize) -> Result<Vec<usize>> {
        match self {
            ChannelSpec::Uniform(channels) => Ok(vec![*channels; breadth + 1]),
            ChannelSpec::PerOrder(channels) if channels.len() == breadth + 1 => {
                Ok(channels.clone())
            }
            ChannelSpec::PerOrder(channels) => Err(LogicError::ChannelListLength {
                expected: breadth + 1,
                found: channels.len(),
            }),
        }
    }
}

impl Default for ChannelSpec {
    fn default() -> Self {
        ChannelSpec::Uniform(0)
    }
}

impl From<usize> for ChannelSpec {
    fn from(channels: usize) -> Self {
        ChannelSpec::Uniform(channels)
    }
}

impl From<Vec<usize>> for ChannelSpec {
    fn from(channels: Vec<usize>) -> Self {
        ChannelSpec::PerOrder(channels)
    }
}

impl From<&[usize]> for ChannelSpec {
    fn from(channels: &[usize]) -> Self {
        ChannelSpec::PerOrder(channels.to_vec())
    }
}
