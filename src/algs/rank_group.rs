//! Rank groups: the two sides of a coupling, expressed in global (world) ranks.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, expect_exact_len};
use crate::mesh_error::MeshCouplingError;
use bytemuck::Zeroable;
use std::collections::BTreeSet;

/// Tag reserved for the world-rank all-gather.
const WORLD_RANKS_TAG: CommTag = CommTag::new(0x3F00);

/// Set of global process ranks forming one side of a coupling.
///
/// Iteration is in ascending rank order, so every process derives the same
/// group-local numbering.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RankGroup {
    ranks: BTreeSet<usize>,
}

impl RankGroup {
    /// Build a group from global ranks; duplicates collapse.
    pub fn new<I: IntoIterator<Item = usize>>(ranks: I) -> Result<Self, MeshCouplingError> {
        let ranks: BTreeSet<usize> = ranks.into_iter().collect();
        if ranks.is_empty() {
            return Err(MeshCouplingError::EmptyRankGroup);
        }
        Ok(Self { ranks })
    }

    pub fn contains(&self, rank: usize) -> bool {
        self.ranks.contains(&rank)
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Global ranks in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranks.iter().copied()
    }

    /// Group-local index of a global rank.
    pub fn position(&self, rank: usize) -> Option<usize> {
        self.ranks
            .contains(&rank)
            .then(|| self.ranks.range(..rank).count())
    }

    /// First rank present in both groups, if any.
    pub fn first_shared(&self, other: &RankGroup) -> Option<usize> {
        self.ranks.intersection(&other.ranks).next().copied()
    }
}

/// Which side of a coupling a rank group (or a process) is on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupSide {
    First,
    Second,
}

impl GroupSide {
    pub fn index(self) -> usize {
        match self {
            GroupSide::First => 0,
            GroupSide::Second => 1,
        }
    }
}

/// Classify a global rank against the two groups of a coupling.
pub fn classify(rank: usize, group1: &RankGroup, group2: &RankGroup) -> Option<GroupSide> {
    if group1.contains(rank) {
        Some(GroupSide::First)
    } else if group2.contains(rank) {
        Some(GroupSide::Second)
    } else {
        None
    }
}

/// Source and target groups of one exchange channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelGroups {
    pub source: RankGroup,
    pub target: RankGroup,
}

impl ChannelGroups {
    /// Which coupling group acts as source; both sides of a channel agree on it.
    pub fn orientation(&self, group1: &RankGroup) -> GroupSide {
        if &self.source == group1 {
            GroupSide::First
        } else {
            GroupSide::Second
        }
    }
}

/// Send/receive channel groups as seen from `my_rank`.
///
/// "Send" always flows from the caller's group outward and "receive" into it.
/// A rank in neither group gets the layout of a group-2 member.
pub fn channel_groups(
    my_rank: usize,
    group1: &RankGroup,
    group2: &RankGroup,
) -> (ChannelGroups, ChannelGroups) {
    let outward = ChannelGroups {
        source: group1.clone(),
        target: group2.clone(),
    };
    let inward = ChannelGroups {
        source: group2.clone(),
        target: group1.clone(),
    };
    if group1.contains(my_rank) {
        (outward, inward)
    } else {
        (inward, outward)
    }
}

/// For every rank of `local`, its rank in `world`, indexed by local rank.
///
/// Collective over `local`.
pub fn global_ranks_of_local_group<W, L>(
    world: &W,
    local: &L,
) -> Result<Vec<usize>, MeshCouplingError>
where
    W: Communicator,
    L: Communicator,
{
    if !cfg!(feature = "coupling") {
        log::error!("global_ranks_of_local_group: coupling support is not compiled in");
        return Err(MeshCouplingError::CapabilityUnavailable);
    }

    let me = local.rank();
    let mine = [WireCount::new(world.rank())?];
    for peer in (0..local.size()).filter(|&p| p != me) {
        local
            .isend(peer, WORLD_RANKS_TAG.base(), bytemuck::cast_slice(&mine))
            .wait();
    }

    let mut out = Vec::with_capacity(local.size());
    for peer in 0..local.size() {
        if peer == me {
            out.push(world.rank());
            continue;
        }
        let mut slot = [WireCount::zeroed()];
        let raw = local
            .irecv(peer, WORLD_RANKS_TAG.base(), bytemuck::cast_slice_mut(&mut slot))
            .wait()
            .ok_or_else(|| {
                MeshCouplingError::Communication(format!("no world rank from local rank {peer}"))
            })?;
        expect_exact_len(raw.len(), size_of::<WireCount>())?;
        bytemuck::cast_slice_mut(&mut slot).copy_from_slice(&raw);
        out.push(slot[0].get());
    }
    Ok(out)
}
