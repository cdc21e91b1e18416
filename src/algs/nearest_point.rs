//! Reference parallel interpolation channel: nearest-location matching.
//!
//! Synchronization ships the source partitions' location coordinates to every
//! target rank, which then pairs each of its own locations with the closest
//! source location (over all source ranks). Data exchange copies the matched
//! source values, which preserves intensive quantities and is the identity on
//! matching meshes.
//!
//! Wire protocol per (source rank, target rank) pair, on the channel's tags:
//!
//! ```text
//! sync:  count(supports), { counted(key), counted(points) }*
//! data:  count(fields),   { counted(name), counted(key), counted(values) }*
//! ```

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::rank_group::{ChannelGroups, GroupSide, RankGroup};
use crate::algs::wire::{
    decode_f64s, decode_points, encode_f64s, encode_points, recv_count, recv_counted, send_count,
    send_counted,
};
use crate::coupling::channel::{ChannelId, CouplingBackend, InterpolationChannel};
use crate::coupling::field::AttachedField;
use crate::mesh_error::MeshCouplingError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

/// Tags used by one channel: synchronization and data.
const TAGS_PER_CHANNEL: usize = 2;

/// Configuration of the nearest-point engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NearestPointConfig {
    /// First message tag used by coupling channels.
    pub tag_base: u16,
    /// Locations farther than this from every source location stay unmatched.
    pub max_distance: Option<f64>,
    /// Value written to unmatched locations on receive.
    pub default_value: f64,
}

impl Default for NearestPointConfig {
    fn default() -> Self {
        Self {
            tag_base: 0x4000,
            max_distance: None,
            default_value: 0.0,
        }
    }
}

/// Backend opening [`NearestPointChannel`]s over a world communicator.
#[derive(Debug)]
pub struct NearestPointBackend<C> {
    comm: Rc<C>,
    config: NearestPointConfig,
}

impl<C: Communicator> NearestPointBackend<C> {
    pub fn new(comm: C) -> Self {
        Self::with_config(comm, NearestPointConfig::default())
    }

    pub fn with_config(comm: C, config: NearestPointConfig) -> Self {
        Self {
            comm: Rc::new(comm),
            config,
        }
    }

    pub fn config(&self) -> &NearestPointConfig {
        &self.config
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }
}

/// First tag of the channel `id`, or an error if the tag space is exhausted.
pub fn channel_tag(tag_base: u16, id: ChannelId) -> Result<CommTag, MeshCouplingError> {
    let slot = 2 * id.coupling + id.orientation.index();
    let first = usize::from(tag_base) + slot * TAGS_PER_CHANNEL;
    if first + TAGS_PER_CHANNEL - 1 > usize::from(u16::MAX) {
        return Err(MeshCouplingError::TagSpaceExhausted {
            coupling: id.coupling,
            tag_base,
        });
    }
    Ok(CommTag::new(first as u16))
}

impl<C: Communicator> CouplingBackend for NearestPointBackend<C> {
    type Channel = NearestPointChannel<C>;

    fn world_rank(&self) -> usize {
        self.comm.rank()
    }

    fn is_available(&self) -> bool {
        self.comm.size() > 0
    }

    fn open_channel(
        &self,
        id: ChannelId,
        groups: &ChannelGroups,
    ) -> Result<Self::Channel, MeshCouplingError> {
        Ok(NearestPointChannel {
            comm: Rc::clone(&self.comm),
            source: groups.source.clone(),
            target: groups.target.clone(),
            tag: channel_tag(self.config.tag_base, id)?,
            config: self.config.clone(),
            patterns: HashMap::new(),
        })
    }
}

/// For each target location, the matched `(source group index, source location)`.
#[derive(Clone, Debug, Default)]
struct Pattern {
    matches: Vec<Option<(usize, usize)>>,
    source_sizes: Vec<usize>,
}

/// One directional channel between a source and a target group.
#[derive(Debug)]
pub struct NearestPointChannel<C> {
    comm: Rc<C>,
    source: RankGroup,
    target: RankGroup,
    tag: CommTag,
    config: NearestPointConfig,
    /// Target side only: pattern per support key.
    patterns: HashMap<String, Pattern>,
}

impl<C: Communicator> NearestPointChannel<C> {
    pub fn tag(&self) -> CommTag {
        self.tag
    }

    /// Support keys with a computed pattern (target ranks only).
    pub fn synchronized_supports(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.patterns.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn sync_tag(&self) -> CommTag {
        self.tag
    }

    fn data_tag(&self) -> CommTag {
        self.tag.offset(1)
    }

    fn role(&self) -> Option<GroupSide> {
        let me = self.comm.rank();
        if self.source.contains(me) {
            Some(GroupSide::First)
        } else if self.target.contains(me) {
            Some(GroupSide::Second)
        } else {
            None
        }
    }

    fn publish_supports(&self, fields: &[AttachedField]) -> Result<(), MeshCouplingError> {
        let supports = unique_supports(fields);
        for peer in self.target.iter() {
            send_count(&*self.comm, peer, self.sync_tag(), supports.len())?;
            for (key, field) in &supports {
                send_counted(&*self.comm, peer, self.sync_tag(), key.as_bytes())?;
                let points = field.partition.mesh().positions(field.location);
                send_counted(&*self.comm, peer, self.sync_tag(), &encode_points(points))?;
            }
        }
        Ok(())
    }

    fn build_patterns(&mut self, fields: &[AttachedField]) -> Result<(), MeshCouplingError> {
        // support key -> per source rank (group order) points
        let mut remote: HashMap<String, Vec<Vec<[f64; 3]>>> = HashMap::new();
        let n_sources = self.source.len();
        for (src_idx, peer) in self.source.iter().enumerate() {
            let n = recv_count(&*self.comm, peer, self.sync_tag())?;
            for _ in 0..n {
                let key = decode_key(recv_counted(&*self.comm, peer, self.sync_tag())?)?;
                let points = decode_points(&recv_counted(&*self.comm, peer, self.sync_tag())?)?;
                remote
                    .entry(key)
                    .or_insert_with(|| vec![Vec::new(); n_sources])[src_idx] = points;
            }
        }

        for (key, field) in unique_supports(fields) {
            let local = field.partition.mesh().positions(field.location);
            let Some(by_source) = remote.get(&key) else {
                log::warn!("no source rank publishes support `{key}`; its locations stay unmatched");
                self.patterns.insert(
                    key,
                    Pattern {
                        matches: vec![None; local.len()],
                        source_sizes: vec![0; n_sources],
                    },
                );
                continue;
            };
            let pattern = nearest_pattern(local, by_source, self.config.max_distance);
            let unmatched = pattern.matches.iter().filter(|m| m.is_none()).count();
            if unmatched > 0 {
                log::warn!("support `{key}`: {unmatched} location(s) without a source match");
            }
            self.patterns.insert(key, pattern);
        }
        Ok(())
    }
}

impl<C: Communicator> InterpolationChannel for NearestPointChannel<C> {
    fn synchronize(&mut self, fields: &[AttachedField]) -> Result<(), MeshCouplingError> {
        match self.role() {
            Some(GroupSide::First) => self.publish_supports(fields)?,
            Some(GroupSide::Second) => self.build_patterns(fields)?,
            None => {}
        }
        Ok(())
    }

    fn send(&mut self, fields: &[AttachedField]) -> Result<(), MeshCouplingError> {
        if self.role() != Some(GroupSide::First) {
            return Ok(());
        }
        for peer in self.target.iter() {
            send_count(&*self.comm, peer, self.data_tag(), fields.len())?;
            for field in fields {
                let values = encode_f64s(field.values.read().as_slice());
                send_counted(&*self.comm, peer, self.data_tag(), field.name.as_bytes())?;
                send_counted(&*self.comm, peer, self.data_tag(), field.support_key().as_bytes())?;
                send_counted(&*self.comm, peer, self.data_tag(), &values)?;
            }
        }
        log::debug!(
            "sent {} field(s) to {} target rank(s)",
            fields.len(),
            self.target.len()
        );
        Ok(())
    }

    fn receive(&mut self, fields: &[AttachedField]) -> Result<(), MeshCouplingError> {
        if self.role() != Some(GroupSide::Second) {
            return Ok(());
        }
        // (field name, support key) -> values per source rank
        let mut incoming: HashMap<(String, String), Vec<Vec<f64>>> = HashMap::new();
        let n_sources = self.source.len();
        for (src_idx, peer) in self.source.iter().enumerate() {
            let n = recv_count(&*self.comm, peer, self.data_tag())?;
            for _ in 0..n {
                let name = decode_key(recv_counted(&*self.comm, peer, self.data_tag())?)?;
                let key = decode_key(recv_counted(&*self.comm, peer, self.data_tag())?)?;
                let values = decode_f64s(&recv_counted(&*self.comm, peer, self.data_tag())?)?;
                incoming
                    .entry((name, key))
                    .or_insert_with(|| vec![Vec::new(); n_sources])[src_idx] = values;
            }
        }

        // every field is checked before any buffer is written
        let mut updates = Vec::with_capacity(fields.len());
        for field in fields {
            let key = field.support_key();
            let Some(by_source) = incoming.get(&(field.name.clone(), key.clone())) else {
                log::warn!("no incoming values for field `{}` on `{key}`", field.name);
                continue;
            };
            let pattern = self.patterns.get(&key).ok_or_else(|| {
                MeshCouplingError::Interpolation(format!(
                    "no pattern for support `{key}`; attach field `{}` before synchronizing",
                    field.name
                ))
            })?;
            check_pattern(field, pattern, by_source)?;
            updates.push((field, pattern, by_source));
        }
        for (field, pattern, by_source) in updates {
            apply_pattern(field, pattern, by_source, self.config.default_value);
        }

        for (name, key) in incoming.keys() {
            if !fields
                .iter()
                .any(|f| &f.name == name && f.support_key() == *key)
            {
                log::warn!("incoming field `{name}` on `{key}` has no local counterpart");
            }
        }
        Ok(())
    }
}

/// First field of each distinct support, in attachment order.
fn unique_supports(fields: &[AttachedField]) -> Vec<(String, &AttachedField)> {
    let mut out: Vec<(String, &AttachedField)> = Vec::new();
    for field in fields {
        let key = field.support_key();
        if !out.iter().any(|(k, _)| *k == key) {
            out.push((key, field));
        }
    }
    out
}

fn decode_key(raw: Vec<u8>) -> Result<String, MeshCouplingError> {
    String::from_utf8(raw)
        .map_err(|e| MeshCouplingError::Communication(format!("malformed name: {e}")))
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest source location for each target location; ties go to the lowest
/// source rank, then the lowest index.
fn nearest_pattern(
    local: &[[f64; 3]],
    by_source: &[Vec<[f64; 3]>],
    max_distance: Option<f64>,
) -> Pattern {
    let limit = max_distance.map(|d| d * d);
    let matches = local
        .iter()
        .map(|target| {
            let mut best: Option<(f64, (usize, usize))> = None;
            for (src_idx, points) in by_source.iter().enumerate() {
                for (i, p) in points.iter().enumerate() {
                    let dist = squared_distance(target, p);
                    match best {
                        Some((best_dist, _)) if dist >= best_dist => {}
                        _ => best = Some((dist, (src_idx, i))),
                    }
                }
            }
            match (best, limit) {
                (Some((dist, _)), Some(limit)) if dist > limit => None,
                (found, _) => found.map(|(_, m)| m),
            }
        })
        .collect();
    Pattern {
        matches,
        source_sizes: by_source.iter().map(Vec::len).collect(),
    }
}

/// Whether `by_source` and the buffer of `field` have the sizes `pattern` expects.
fn check_pattern(
    field: &AttachedField,
    pattern: &Pattern,
    by_source: &[Vec<f64>],
) -> Result<(), MeshCouplingError> {
    let dim = field.n_components;
    for (src_idx, values) in by_source.iter().enumerate() {
        let expected = pattern.source_sizes.get(src_idx).copied().unwrap_or(0) * dim;
        if values.len() != expected {
            return Err(MeshCouplingError::Interpolation(format!(
                "field `{}`: source rank #{src_idx} sent {} values, pattern expects {expected}",
                field.name,
                values.len()
            )));
        }
    }
    let len = field.values.read().len();
    if len != pattern.matches.len() * dim {
        return Err(MeshCouplingError::Interpolation(format!(
            "field `{}`: buffer holds {len} values for {} locations",
            field.name,
            pattern.matches.len()
        )));
    }
    Ok(())
}

/// Copy matched values into `field`; sizes were validated by [`check_pattern`].
fn apply_pattern(
    field: &AttachedField,
    pattern: &Pattern,
    by_source: &[Vec<f64>],
    default_value: f64,
) {
    let dim = field.n_components;
    let mut buffer = field.values.write();
    let out = buffer.as_mut_slice();
    for (t, m) in pattern.matches.iter().enumerate() {
        let dst = &mut out[t * dim..(t + 1) * dim];
        match *m {
            Some((src_idx, s)) => {
                dst.copy_from_slice(&by_source[src_idx][s * dim..(s + 1) * dim]);
            }
            None => dst.fill(default_value),
        }
    }
    buffer.declare_as_new();
}
