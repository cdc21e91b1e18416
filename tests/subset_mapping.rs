mod util;
use mesh_coupling::coupling::{
    ChannelDirection, Coupling, CouplingRegistry, TimeDiscretization,
};
use mesh_coupling::mesh_error::MeshCouplingError;
use mesh_coupling::topology::{FieldLocation, InMemoryParentMesh};
use proptest::prelude::*;
use util::{ProbeBackend, ProbeChannel, line_parent};

/// `line_parent(n)` with the given elements in group `wall`.
fn parent_with_wall(n: usize, wall: &[usize]) -> InMemoryParentMesh {
    let mut parent = line_parent(n);
    for &e in wall {
        parent.add_to_group("wall", 1, e).unwrap();
    }
    parent
}

fn coupling_on(
    parent: &InMemoryParentMesh,
    criterion: &str,
) -> Result<(CouplingRegistry<ProbeBackend>, usize), MeshCouplingError> {
    let mut reg = CouplingRegistry::new(ProbeBackend::new(0))?;
    let id = reg.create("C", &[0], &[1])?;
    let c = reg.get_mut(id)?;
    c.define_mesh("wall", criterion, 1, true, false);
    c.init_meshes(parent)?;
    Ok((reg, id))
}

fn field(c: &mut Coupling<ProbeChannel>, dim: usize, location: FieldLocation) -> usize {
    c.add_field(
        "f",
        0,
        dim,
        location,
        TimeDiscretization::NoTime,
        Some(ChannelDirection::Send),
    )
    .unwrap()
}

#[test]
fn parent_round_trip_touches_only_selected_elements() {
    let parent = parent_with_wall(10, &[2, 5, 7]);
    let (mut reg, id) = coupling_on(&parent, "wall").unwrap();
    let c = reg.get_mut(id).unwrap();
    assert_eq!(c.mesh_element_list(0), &[2, 5, 7]);
    let f = field(c, 1, FieldLocation::Cells);

    let parent_values: Vec<f64> = (0..10).map(|i| 1.5 * i as f64).collect();
    c.export_field(f, true, &parent_values).unwrap();
    let mut subset = vec![0.0; 3];
    c.import_field(f, false, &mut subset).unwrap();
    assert_eq!(subset, vec![3.0, 7.5, 10.5]);

    let mut out = vec![-1.0; 10];
    c.import_field(f, true, &mut out).unwrap();
    for i in 0..10 {
        let expected = if [2, 5, 7].contains(&i) { parent_values[i] } else { -1.0 };
        assert_eq!(out[i], expected, "parent element {i}");
    }
}

#[test]
fn parent_round_trip_with_components_and_nodes() {
    let parent = parent_with_wall(10, &[2, 5, 7]);
    let (mut reg, id) = coupling_on(&parent, "wall").unwrap();
    let c = reg.get_mut(id).unwrap();

    let cells = field(c, 2, FieldLocation::Cells);
    let input: Vec<f64> = (0..20).map(f64::from).collect();
    c.export_field(cells, true, &input).unwrap();
    let mut out = vec![0.0; 20];
    c.import_field(cells, true, &mut out).unwrap();
    assert_eq!(&out[4..6], &input[4..6]);
    assert_eq!(&out[10..12], &input[10..12]);
    assert_eq!(&out[0..4], &[0.0; 4]);

    // cells {2, 5, 7} of the line use vertices {2, 3, 5, 6, 7, 8} of 11
    let nodes = field(c, 1, FieldLocation::Nodes);
    assert_eq!(c.field(nodes).unwrap().len(), 6);
    let input: Vec<f64> = (0..11).map(|v| 10.0 + v as f64).collect();
    c.export_field(nodes, true, &input).unwrap();
    let mut out = vec![0.0; 11];
    c.import_field(nodes, true, &mut out).unwrap();
    let touched: Vec<usize> = (0..11).filter(|&v| out[v] != 0.0).collect();
    assert_eq!(touched, vec![2, 3, 5, 6, 7, 8]);
    assert!(touched.iter().all(|&v| out[v] == input[v]));
}

#[test]
fn parent_arrays_must_cover_the_parent() {
    let parent = parent_with_wall(10, &[2, 5, 7]);
    let (mut reg, id) = coupling_on(&parent, "wall").unwrap();
    let c = reg.get_mut(id).unwrap();
    let f = field(c, 1, FieldLocation::Cells);
    assert_eq!(
        c.export_field(f, true, &[0.0; 8]),
        Err(MeshCouplingError::LengthMismatch {
            field: "f".into(),
            expected: 10,
            actual: 8
        })
    );
    assert!(c.import_field(f, true, &mut [0.0; 3]).is_err());
}

#[test]
fn export_and_import_maps_agree() {
    let mut parent = parent_with_wall(12, &[9, 1, 4]);
    parent.add_to_group("inlet", 1, 0).unwrap();
    parent.add_to_group("inlet", 1, 4).unwrap();
    let (reg, id) = coupling_on(&parent, "wall or inlet").unwrap();
    let mesh = reg.get(id).unwrap().mesh(0).unwrap();
    assert_eq!(mesh.element_list(), &[0, 1, 4, 9]);

    for location in [FieldLocation::Cells, FieldLocation::Nodes] {
        let map = mesh.subset().map(location);
        for (sub, &p) in map.sub_to_parent().iter().enumerate() {
            assert_eq!(map.sub_of(p), Some(sub));
            assert_eq!(map.parent_of(sub), Some(p));
        }
        let mut pairs: Vec<_> = map.parent_to_sub().collect();
        pairs.sort_unstable();
        let mut expected: Vec<_> = map
            .sub_to_parent()
            .iter()
            .enumerate()
            .map(|(s, &p)| (p, s))
            .collect();
        expected.sort_unstable();
        assert_eq!(pairs, expected);
    }
}

#[test]
fn malformed_selection_fails_initialization() {
    let parent = line_parent(3);
    for bad in ["", "wall or", "a[1]"] {
        assert!(matches!(
            coupling_on(&parent, bad),
            Err(MeshCouplingError::InvalidSelection { .. })
        ));
    }
    // an unknown group selects nothing
    let (reg, id) = coupling_on(&parent, "nowhere").unwrap();
    assert_eq!(reg.get(id).unwrap().mesh_element_count(0), 0);
}

proptest! {
    #[test]
    fn random_selection_round_trips(mask in prop::collection::vec(any::<bool>(), 1..30)) {
        let n = mask.len();
        let picked: Vec<usize> = (0..n).filter(|&i| mask[i]).collect();
        let parent = parent_with_wall(n, &picked);
        let (mut reg, id) = coupling_on(&parent, "wall").unwrap();
        let c = reg.get_mut(id).unwrap();
        let f = field(c, 1, FieldLocation::Cells);

        let input: Vec<f64> = (0..n).map(|i| i as f64 + 0.25).collect();
        c.export_field(f, true, &input).unwrap();
        let mut out = vec![-7.0; n];
        c.import_field(f, true, &mut out).unwrap();
        for i in 0..n {
            let expected = if picked.contains(&i) { input[i] } else { -7.0 };
            prop_assert_eq!(out[i], expected);
        }
    }
}
