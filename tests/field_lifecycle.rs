mod util;
use mesh_coupling::coupling::{
    ChannelDirection, Coupling, CouplingRegistry, FieldNature, TimeDiscretization,
};
use mesh_coupling::mesh_error::MeshCouplingError;
use mesh_coupling::topology::FieldLocation;
use std::sync::Arc;
use util::{PROBE_VALUE, ProbeBackend, ProbeChannel, line_parent};

const SEND: Option<ChannelDirection> = Some(ChannelDirection::Send);
const RECV: Option<ChannelDirection> = Some(ChannelDirection::Receive);

fn with_coupling<T>(n_cells: usize, body: impl FnOnce(&mut Coupling<ProbeChannel>, usize) -> T) -> T {
    let mut reg = CouplingRegistry::new(ProbeBackend::new(0)).unwrap();
    let id = reg.create("C", &[0], &[1]).unwrap();
    let c = reg.get_mut(id).unwrap();
    let m = c.define_mesh("m", "all[]", 1, true, true);
    c.init_meshes(&line_parent(n_cells)).unwrap();
    body(c, m)
}

fn add(
    c: &mut Coupling<ProbeChannel>,
    name: &str,
    mesh: usize,
    dim: usize,
    location: FieldLocation,
    direction: Option<ChannelDirection>,
) -> usize {
    c.add_field(name, mesh, dim, location, TimeDiscretization::NoTime, direction)
        .unwrap()
}

#[test]
fn buffer_is_elements_times_components() {
    with_coupling(4, |c, m| {
        let f = add(c, "velocity", m, 3, FieldLocation::Cells, SEND);
        let field = c.field(f).unwrap();
        assert_eq!(field.len(), 12);
        assert_eq!(field.nature(), FieldNature::IntensiveConservation);
        assert_eq!(field.partition().unwrap().role(), "source mesh");

        let input: Vec<f64> = (0..12).map(f64::from).collect();
        c.export_field(f, false, &input).unwrap();
        let mut out = vec![0.0; 12];
        c.import_field(f, false, &mut out).unwrap();
        assert_eq!(out, input);

        assert_eq!(
            c.export_field(f, false, &input[..11]),
            Err(MeshCouplingError::LengthMismatch {
                field: "velocity".into(),
                expected: 12,
                actual: 11
            })
        );
        let mut long = vec![0.0; 13];
        assert!(c.import_field(f, false, &mut long).is_err());
        assert!(long.iter().all(|&v| v == 0.0));
    });
}

#[test]
fn node_fields_use_the_vertex_count() {
    with_coupling(4, |c, m| {
        let f = add(c, "p", m, 2, FieldLocation::Nodes, RECV);
        assert_eq!(c.field(f).unwrap().len(), 10);
        assert_eq!(c.field(f).unwrap().partition().unwrap().role(), "target mesh");
    });
}

#[test]
fn export_declares_values_new() {
    with_coupling(2, |c, m| {
        let f = add(c, "T", m, 1, FieldLocation::Cells, SEND);
        let values = Arc::clone(c.field(f).unwrap().values());
        c.export_field(f, false, &[1.0, 2.0]).unwrap();
        c.export_field(f, true, &[3.0, 4.0]).unwrap();
        assert_eq!(values.read().revision(), 2);
        assert_eq!(values.read().as_slice(), &[3.0, 4.0]);
    });
}

#[test]
fn directionless_fields_stay_out_of_channels() {
    let backend = ProbeBackend::new(0);
    let calls = backend.calls.clone();
    let mut reg = CouplingRegistry::new(backend).unwrap();
    let id = reg.create("C", &[0], &[1]).unwrap();
    let c = reg.get_mut(id).unwrap();
    let m = c.define_mesh("m", "all[]", 1, true, true);
    c.init_meshes(&line_parent(3)).unwrap();

    let scratch = add(c, "scratch", m, 1, FieldLocation::Cells, None);
    let inbound = add(c, "T", m, 1, FieldLocation::Cells, RECV);
    assert_eq!(c.field(scratch).unwrap().len(), 3);
    assert!(c.field(scratch).unwrap().partition().is_none());
    c.export_field(scratch, false, &[1.0, 2.0, 3.0]).unwrap();

    c.synchronize(ChannelDirection::Send).unwrap();
    c.synchronize(ChannelDirection::Receive).unwrap();
    c.send_data().unwrap();
    c.receive_data().unwrap();

    assert_eq!(*calls.exchanged.borrow(), vec![vec![], vec!["T".to_string()]]);
    let mut out = vec![0.0; 3];
    c.import_field(scratch, false, &mut out).unwrap();
    assert_eq!(out, vec![1.0, 2.0, 3.0]);
    c.import_field(inbound, false, &mut out).unwrap();
    assert_eq!(out, vec![PROBE_VALUE; 3]);

    // reattaching a field without direction is a silent no-op
    c.reattach_field(scratch).unwrap();
    assert!(c.channel(ChannelDirection::Send).pattern_fields().is_empty());
}

#[test]
fn lookups_and_invalid_ids() {
    with_coupling(3, |c, m| {
        let a = add(c, "T", m, 1, FieldLocation::Cells, SEND);
        let _b = add(c, "T", m, 1, FieldLocation::Cells, RECV);
        assert_eq!(c.field_id(m, "T"), Some(a));
        assert_eq!(c.field_id(m, "missing"), None);
        assert_eq!(c.field_id(m + 1, "T"), None);
        assert_eq!(c.mesh_id("m"), Some(m));
        assert_eq!(c.mesh_id("other"), None);
        assert_eq!(c.mesh_element_count(m), 3);
        assert_eq!(c.mesh_element_list(m), &[0, 1, 2]);
        assert_eq!(c.mesh_element_count(99), 0);
        assert!(c.mesh_element_list(99).is_empty());

        assert_eq!(
            c.add_field("v", m, 0, FieldLocation::Cells, TimeDiscretization::NoTime, SEND),
            Err(MeshCouplingError::ZeroComponents("v".into()))
        );
        assert!(matches!(
            c.add_field("v", 42, 1, FieldLocation::Cells, TimeDiscretization::OneTime, SEND),
            Err(MeshCouplingError::InvalidMeshId { mesh: 42, .. })
        ));
        assert!(matches!(
            c.export_field(9, false, &[]),
            Err(MeshCouplingError::InvalidFieldId { field: 9, .. })
        ));
        assert!(c.import_field(9, true, &mut []).is_err());
        assert!(c.reattach_field(9).is_err());
        assert_eq!(c.n_fields(), 2);
    });
}

#[test]
fn meshes_initialize_once() {
    with_coupling(3, |c, _| {
        assert_eq!(
            c.init_meshes(&line_parent(3)),
            Err(MeshCouplingError::MeshesAlreadyInitialized("C".into()))
        );
    });
}

#[test]
fn late_fields_join_after_reattach() {
    let backend = ProbeBackend::new(0);
    let calls = backend.calls.clone();
    let mut reg = CouplingRegistry::new(backend).unwrap();
    let id = reg.create("C", &[0], &[1]).unwrap();
    let c = reg.get_mut(id).unwrap();
    let m = c.define_mesh("m", "all[]", 1, true, false);
    c.init_meshes(&line_parent(2)).unwrap();

    add(c, "early", m, 1, FieldLocation::Cells, SEND);
    c.synchronize(ChannelDirection::Send).unwrap();
    let late = add(c, "late", m, 1, FieldLocation::Cells, SEND);
    c.send_data().unwrap();
    assert_eq!(c.channel(ChannelDirection::Send).pending_fields().len(), 1);

    c.reattach_field(late).unwrap();
    c.send_data().unwrap();
    assert_eq!(
        *calls.exchanged.borrow(),
        vec![vec!["early".to_string()], vec!["early".to_string(), "late".to_string()]]
    );
    assert_eq!(calls.syncs.get(), 1);
}

#[test]
fn replaced_buffers_need_reattach() {
    with_coupling(2, |c, m| {
        let f = add(c, "T", m, 1, FieldLocation::Cells, SEND);
        let fresh = c.replace_field_values(f, vec![5.0, 6.0]).unwrap();
        let channel = c.channel(ChannelDirection::Send);
        assert!(!channel.pattern_fields()[0].shares_buffer(&fresh));

        c.reattach_field(f).unwrap();
        let channel = c.channel(ChannelDirection::Send);
        assert_eq!(channel.pattern_fields().len(), 1);
        assert!(channel.pattern_fields()[0].shares_buffer(&fresh));

        assert!(matches!(
            c.replace_field_values(f, vec![1.0]),
            Err(MeshCouplingError::LengthMismatch { expected: 2, .. })
        ));
    });
}
