//! Communication plumbing and the reference interpolation engine.

pub mod communicator;
pub mod nearest_point;
pub mod rank_group;
pub mod wire;

pub use nearest_point::{NearestPointBackend, NearestPointConfig};
pub use rank_group::{RankGroup, global_ranks_of_local_group};
