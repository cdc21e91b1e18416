use mesh_coupling::algs::communicator::{CommTag, Communicator, NoComm, RayonComm, Wait};
use serial_test::serial;

// `RayonComm::new` ranks share the default mailbox context.

#[test]
#[serial]
fn rayon_round_trip() {
    let tag = CommTag(0x1000);
    let c0 = RayonComm::new(0, 2);
    let c1 = RayonComm::new(1, 2);

    let msg = b"hello";
    let _s = c0.isend(1, tag.base(), msg);

    let mut buf = [0u8; 5];
    let got = c1.irecv(0, tag.base(), &mut buf).wait().unwrap();
    assert_eq!(&got, msg);
}

#[test]
#[serial]
fn rayon_fifo_order() {
    let tag = CommTag(0x1001);
    let c0 = RayonComm::new(0, 2);
    let c1 = RayonComm::new(1, 2);

    for i in 0..10u8 {
        c0.isend(1, tag.base(), &[i]);
    }
    let out: Vec<u8> = (0..10)
        .map(|_| {
            let mut b = [0u8; 1];
            c1.irecv(0, tag.base(), &mut b).wait().unwrap()[0]
        })
        .collect();
    assert_eq!(out, (0u8..10).collect::<Vec<_>>());
}

#[test]
#[serial]
fn truncation_is_ok() {
    let tag = CommTag(0x1002);
    let c0 = RayonComm::new(0, 2);
    let c1 = RayonComm::new(1, 2);

    c0.isend(1, tag.base(), &[1, 2, 3, 4, 5, 6]);
    let mut buf = [0u8; 4];
    assert_eq!(c1.irecv(0, tag.base(), &mut buf).wait(), Some(vec![1, 2, 3, 4]));
}

#[test]
fn tags_keep_streams_apart() {
    let ranks = RayonComm::universe(2);
    ranks[0].isend(1, 1, &[10]);
    ranks[0].isend(1, 2, &[20]);
    let mut b = [0u8; 1];
    assert_eq!(ranks[1].irecv(0, 2, &mut b).wait(), Some(vec![20]));
    assert_eq!(ranks[1].irecv(0, 1, &mut b).wait(), Some(vec![10]));
}

#[test]
fn no_comm_is_single_rank() {
    let c = NoComm;
    assert!(c.is_no_comm());
    assert_eq!((c.rank(), c.size()), (0, 1));
    let mut b = [0u8; 2];
    assert_eq!(c.irecv(0, 0, &mut b).wait(), None);
}
