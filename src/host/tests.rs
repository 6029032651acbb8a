use crate::att::{ErrorCode, ErrorRsp};
use crate::gap::Characteristic;
use crate::gatt::{hdl, Req};
use crate::le::RawAddr;
use crate::nvram::{MemNvram, RecordId};
use crate::smp::{IoCap, IoCapReply, LinkKeys, LocalKeys, State, Transport};

use super::*;

const PEER: Addr = Addr::Public(RawAddr::from_le_bytes([1, 2, 3, 4, 5, 6]));
const C: ConnId = ConnId(0x40);

#[derive(Debug, Default)]
struct Recorder {
    confirms: Vec<(Addr, bool)>,
    grants: Vec<Addr>,
    att: Vec<(ConnId, Opcode, RspResult<Rsp>)>,
    enc: Vec<(Addr, bool)>,
}

impl Stack for Recorder {
    fn confirm_reply(&mut self, peer: Addr, accept: bool) {
        self.confirms.push((peer, accept));
    }

    fn security_grant(&mut self, peer: Addr) {
        self.grants.push(peer);
    }

    fn send_att(&mut self, conn: ConnId, req: Opcode, rsp: RspResult<Rsp>) {
        self.att.push((conn, req, rsp));
    }

    fn encryption_changed(&mut self, peer: Addr, ok: bool) {
        self.enc.push((peer, ok));
    }
}

fn host(cfg: Config) -> Host<Recorder> {
    Host::new(cfg, Recorder::default(), Box::<MemNvram>::default())
}

fn connect(h: &mut Host<Recorder>) {
    let evt = Event::ConnectionStatus {
        conn: C,
        peer: PEER,
        connected: true,
        reason: 0,
    };
    assert!(matches!(h.handle(evt), Ok(Reply::Done)));
}

fn last_payload(h: &Host<Recorder>) -> Vec<u8> {
    match h.stack().att.last() {
        Some((_, _, Ok(rsp))) => rsp.payload().to_vec(),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[test]
fn session() {
    let mut h = host(Config::default());
    assert!(matches!(h.handle(Event::Enabled { ok: true }), Ok(Reply::Done)));
    assert!(h.is_enabled());
    connect(&mut h);
    assert_eq!(h.sessions().mtu(C), 23);

    h.handle(Event::Att(Req::mtu(C, 517))).unwrap();
    assert!(matches!(
        h.stack().att.last(),
        Some((C, Opcode::ExchangeMtuReq, Ok(Rsp::Mtu(365))))
    ));
    assert_eq!(h.sessions().mtu(C), 365);

    for i in [0_u8, 1, 2, 3, 4, 5, 0] {
        h.handle(Event::Att(Req::read(C, hdl::BATTERY_LEVEL, 0xFFFF)))
            .unwrap();
        assert_eq!(last_payload(&h), [i]);
    }
    h.handle(Event::Att(Req::read(C, hdl::DEVICE_NAME, 0xFFFF)))
        .unwrap();
    assert_eq!(last_payload(&h), b"HSPK LE\0");

    h.handle(Event::EncryptionStatus { peer: PEER, ok: true })
        .unwrap();
    assert!(h.sessions().get(C).unwrap().encrypted);
    assert_eq!(h.stack().enc, [(PEER, true)]);

    h.handle(Event::ConnectionStatus {
        conn: C,
        peer: PEER,
        connected: false,
        reason: 0x13,
    })
    .unwrap();
    assert!(h.sessions().is_empty());
    h.stack_mut().att.clear();
    assert_eq!(h.server().pool().in_use(), 0);
}

#[test]
fn response_limited_by_mtu() {
    let cfg = Config {
        device_name: "A headset with a rather long device name".to_owned(),
        ..Config::default()
    };
    let mut h = host(cfg);
    connect(&mut h);
    h.handle(Event::Att(Req::read(C, hdl::DEVICE_NAME, 0xFFFF)))
        .unwrap();
    assert_eq!(last_payload(&h), b"A headset with a rathe");

    h.handle(Event::Att(Req::mtu(C, 100))).unwrap();
    h.handle(Event::Att(Req::read(C, hdl::DEVICE_NAME, 0xFFFF)))
        .unwrap();
    assert_eq!(last_payload(&h).len(), 41);
}

#[test]
fn read_by_type_limited_by_mtu() {
    let cfg = Config {
        device_name: "A headset with a rather long device name".to_owned(),
        ..Config::default()
    };
    let mut h = host(cfg);
    connect(&mut h);
    let typ = Characteristic::DeviceName.uuid();
    for mtu in [23, 40] {
        h.handle(Event::Att(Req::mtu(C, mtu))).unwrap();
        h.handle(Event::Att(Req::read_by_type(C, 0x0001, 0xFFFF, typ, 0xFFFF)))
            .unwrap();
        let Some((C, Opcode::ReadByTypeReq, Ok(Rsp::ReadByType { pair_len, buf }))) =
            h.stack().att.last()
        else {
            panic!("unexpected response: {:?}", h.stack().att.last());
        };
        // Opcode and pair length precede the pairs
        assert_eq!(2 + buf.len(), usize::from(mtu));
        assert_eq!(usize::from(*pair_len), buf.len());
        assert_eq!(last_payload(&h)[..2], hdl::DEVICE_NAME.to_le_bytes());
    }
}

#[test]
fn att_errors() {
    let mut h = host(Config::default());
    connect(&mut h);
    h.handle(Event::Att(Req::read(C, 0x0FFF, 22))).unwrap();
    assert!(matches!(
        h.stack().att.last(),
        Some((C, Opcode::ReadReq, Err(e))) if *e == ErrorRsp::new(Opcode::ReadReq, 0x0FFF, ErrorCode::InvalidHandle)
    ));
}

#[test]
fn no_response_to_commands() {
    let mut h = host(Config::default());
    connect(&mut h);
    h.handle(Event::Att(Req::write_cmd(C, 0x0FFF, vec![1])))
        .unwrap();
    h.handle(Event::Att(Req::confirm(C, hdl::BATTERY_LEVEL)))
        .unwrap();
    assert!(h.stack().att.is_empty());
    h.handle(Event::Att(Req::write(C, 0x0FFF, vec![1]))).unwrap();
    assert!(matches!(
        h.stack().att.last(),
        Some((C, Opcode::WriteReq, Ok(Rsp::Write(_))))
    ));
}

#[test]
fn security_request() {
    let mut h = host(Config::default());
    let r = h.handle(Event::SecurityRequest { peer: PEER });
    assert_eq!(
        r.unwrap_err(),
        Error::Smp(smp::Error::AuthenticationRejected)
    );
    assert!(h.stack().grants.is_empty());

    h.set_pairing_allowed(true);
    assert!(h.handle(Event::SecurityRequest { peer: PEER }).is_ok());
    assert_eq!(h.stack().grants, [PEER]);

    let mut h = host(Config {
        pairing_allowed: true,
        ..Config::default()
    });
    assert!(h.pairing_allowed());
    assert!(h.handle(Event::SecurityRequest { peer: PEER }).is_ok());
}

#[test]
fn pairing() {
    let mut h = host(Config::default());
    let r = h.handle(Event::IoCapRequest {
        peer: PEER,
        transport: Transport::Le,
    });
    let Ok(Reply::IoCap(rep @ IoCapReply::Le { .. })) = r else {
        panic!("unexpected reply: {r:?}");
    };
    assert_eq!(rep.io_cap(), IoCap::NoInputNoOutput);
    assert_eq!(h.security().state(), State::IoCapRequested);

    let confirm = |h: &mut Host<Recorder>, just_works| {
        h.handle(Event::UserConfirmRequest {
            peer: PEER,
            value: 123_456,
            just_works,
        })
        .unwrap();
        h.stack().confirms.last().copied()
    };
    assert_eq!(confirm(&mut h, true), Some((PEER, true)));
    assert_eq!(confirm(&mut h, false), Some((PEER, true)));
    h.handle(Event::PairingComplete {
        peer: PEER,
        transport: Transport::Le,
        status: 0,
    })
    .unwrap();
    assert_eq!(h.security().state(), State::Idle);

    let mut h = host(Config {
        auto_accept_numeric_comparison: false,
        ..Config::default()
    });
    assert_eq!(confirm(&mut h, false), Some((PEER, false)));
    assert_eq!(confirm(&mut h, true), Some((PEER, true)));
}

#[test]
fn local_keys() {
    let k = LocalKeys::new([0xA5; LocalKeys::LEN]);
    let mut h = host(Config::default());
    assert!(!h.identity_keys().is_valid());
    assert_eq!(
        h.handle(Event::LocalKeysRequest).unwrap_err(),
        Error::Smp(smp::Error::NoResources)
    );
    h.handle(Event::LocalKeysUpdate(k.clone())).unwrap();
    assert!(matches!(h.handle(Event::LocalKeysRequest), Ok(Reply::LocalKeys(v)) if v == k));

    // Restored at startup
    let nv = MemNvram::new();
    nv.write(RecordId::LocalIdentityKeys, k.as_bytes()).unwrap();
    let mut h = Host::new(Config::default(), Recorder::default(), Box::new(nv));
    assert!(matches!(h.handle(Event::LocalKeysRequest), Ok(Reply::LocalKeys(v)) if v == k));
}

#[test]
fn local_keys_write_failure() {
    let nv = MemNvram::new();
    nv.fail_writes(Some(crate::nvram::Error::NoResources));
    let mut h = Host::new(Config::default(), Recorder::default(), Box::new(nv));
    let k = LocalKeys::new([1; LocalKeys::LEN]);
    assert!(matches!(h.handle(Event::LocalKeysUpdate(k)), Ok(Reply::Done)));
    assert!(!h.identity_keys().is_valid());
    assert!(h.handle(Event::LocalKeysRequest).is_err());
}

#[test]
fn link_keys() {
    let mut h = host(Config::default());
    assert_eq!(
        h.handle(Event::LinkKeysRequest { peer: PEER }).unwrap_err(),
        Error::Smp(smp::Error::LinkKeyRejected)
    );
    let keys = LinkKeys {
        peer: PEER,
        data: vec![7; 16],
    };
    h.handle(Event::LinkKeysUpdate(keys.clone())).unwrap();
    assert!(matches!(
        h.handle(Event::LinkKeysRequest { peer: PEER }),
        Ok(Reply::LinkKeys(v)) if v == keys
    ));
}

#[test]
fn disabled() {
    let mut h = host(Config::default());
    h.handle(Event::Enabled { ok: true }).unwrap();
    connect(&mut h);
    h.handle(Event::Disabled { reason: 0 }).unwrap();
    assert!(!h.is_enabled());
    assert!(h.sessions().is_empty());
}

#[tokio::test]
async fn run() {
    let (tx, rx) = mpsc::channel(4);
    let mut h = host(Config::default());
    let task = tokio::spawn(async move {
        h.run(rx).await;
        h
    });

    let (rtx, rrx) = oneshot::channel();
    tx.send((Event::LocalKeysRequest, rtx)).await.unwrap();
    assert!(rrx.await.unwrap().is_err());

    let (rtx, rrx) = oneshot::channel();
    let evt = Event::IoCapRequest {
        peer: PEER,
        transport: Transport::BrEdr,
    };
    tx.send((evt, rtx)).await.unwrap();
    assert!(matches!(
        rrx.await.unwrap(),
        Ok(Reply::IoCap(IoCapReply::BrEdr { oob: false, .. }))
    ));

    drop(tx);
    let h = task.await.unwrap();
    assert_eq!(h.security().state(), State::IoCapRequested);
}
