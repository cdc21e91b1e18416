#![allow(dead_code)]
use mesh_coupling::{
    algs::rank_group::ChannelGroups,
    coupling::{AttachedField, ChannelId, CouplingBackend, InterpolationChannel},
    mesh_error::MeshCouplingError,
    topology::InMemoryParentMesh,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// `n` unit segments along x sharing end vertices (dimension 1).
pub fn line_parent(n: usize) -> InMemoryParentMesh {
    let mut mesh = InMemoryParentMesh::new();
    for i in 0..=n {
        mesh.add_vertex([i as f64, 0.0, 0.0]);
    }
    for i in 0..n {
        mesh.add_element(1, &[i, i + 1]).unwrap();
    }
    mesh
}

/// Disjoint unit segments `[s, s + 1]`, one per start (dimension 1).
pub fn segments(starts: &[f64]) -> InMemoryParentMesh {
    let mut mesh = InMemoryParentMesh::new();
    for &s in starts {
        let a = mesh.add_vertex([s, 0.0, 0.0]);
        let b = mesh.add_vertex([s + 1.0, 0.0, 0.0]);
        mesh.add_element(1, &[a, b]).unwrap();
    }
    mesh
}

/// Run `f` once per item, each on its own thread; results in item order.
pub fn run_each<I, T, F>(items: Vec<I>, f: F) -> Vec<T>
where
    I: Send,
    T: Send,
    F: Fn(I) -> T + Sync,
{
    std::thread::scope(|s| {
        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let f = &f;
                s.spawn(move || f(item))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Call counters shared by a [`ProbeBackend`] and all channels it opens.
#[derive(Clone, Debug, Default)]
pub struct Calls {
    pub opened: Rc<RefCell<Vec<ChannelId>>>,
    pub syncs: Rc<Cell<usize>>,
    pub sends: Rc<Cell<usize>>,
    pub receives: Rc<Cell<usize>>,
    /// Field names seen by each send/receive, in call order.
    pub exchanged: Rc<RefCell<Vec<Vec<String>>>>,
}

/// Backend whose channels only count calls; `receive` fills buffers with [`PROBE_VALUE`].
#[derive(Debug)]
pub struct ProbeBackend {
    pub rank: usize,
    pub available: bool,
    pub calls: Calls,
}

pub const PROBE_VALUE: f64 = 7.0;

impl ProbeBackend {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            available: true,
            calls: Calls::default(),
        }
    }
}

#[derive(Debug)]
pub struct ProbeChannel {
    calls: Calls,
}

fn names(fields: &[AttachedField]) -> Vec<String> {
    fields.iter().map(|f| f.name.clone()).collect()
}

impl InterpolationChannel for ProbeChannel {
    fn synchronize(&mut self, _fields: &[AttachedField]) -> Result<(), MeshCouplingError> {
        self.calls.syncs.set(self.calls.syncs.get() + 1);
        Ok(())
    }

    fn send(&mut self, fields: &[AttachedField]) -> Result<(), MeshCouplingError> {
        self.calls.sends.set(self.calls.sends.get() + 1);
        self.calls.exchanged.borrow_mut().push(names(fields));
        Ok(())
    }

    fn receive(&mut self, fields: &[AttachedField]) -> Result<(), MeshCouplingError> {
        self.calls.receives.set(self.calls.receives.get() + 1);
        self.calls.exchanged.borrow_mut().push(names(fields));
        for f in fields {
            let mut values = f.values.write();
            values.as_mut_slice().fill(PROBE_VALUE);
            values.declare_as_new();
        }
        Ok(())
    }
}

impl CouplingBackend for ProbeBackend {
    type Channel = ProbeChannel;

    fn world_rank(&self) -> usize {
        self.rank
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn open_channel(
        &self,
        id: ChannelId,
        _groups: &ChannelGroups,
    ) -> Result<ProbeChannel, MeshCouplingError> {
        self.calls.opened.borrow_mut().push(id);
        Ok(ProbeChannel {
            calls: self.calls.clone(),
        })
    }
}
