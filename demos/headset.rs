#![allow(unused_crate_dependencies)]
#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use hsctl::att::{Opcode, RspResult};
use hsctl::conn::ConnId;
use hsctl::fs::{load_config, NvramDir};
use hsctl::gatt::{hdl, Req, Rsp};
use hsctl::host::{Request, Stack};
use hsctl::le::{Addr, RawAddr};
use hsctl::smp::{LocalKeys, Transport};
use hsctl::*;

#[derive(Clone, Debug, clap::Parser)]
struct Args {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for persistent records (defaults to the user data directory).
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Grant peer security requests.
    #[arg(short, long)]
    allow_pairing: bool,
}

/// Stack that prints everything sent to it.
#[derive(Debug)]
struct PrintStack;

impl Stack for PrintStack {
    fn confirm_reply(&mut self, peer: Addr, accept: bool) {
        println!("{peer}: confirm {accept}");
    }

    fn security_grant(&mut self, peer: Addr) {
        println!("{peer}: security granted");
    }

    fn send_att(&mut self, conn: ConnId, req: Opcode, rsp: RspResult<Rsp>) {
        match rsp {
            Ok(Rsp::Mtu(mtu)) => println!("{conn}: {req} -> MTU {mtu}"),
            Ok(rsp) => println!("{conn}: {req} -> {:02X?}", rsp.payload()),
            Err(e) => println!("{conn}: {e}"),
        }
    }

    fn encryption_changed(&mut self, peer: Addr, ok: bool) {
        println!("{peer}: encrypted {ok}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let mut cfg = match args.config {
        Some(ref path) => load_config(path)?,
        None => Config::default(),
    };
    cfg.pairing_allowed |= args.allow_pairing;
    let nv = match args.data {
        Some(ref root) => NvramDir::open(root),
        None => NvramDir::per_user("hsctl"),
    };
    info!("Starting with {cfg:?}");
    let mut host = Host::new(cfg, PrintStack, Box::new(nv));
    let (tx, rx) = mpsc::channel(8);
    let task = tokio::spawn(async move { host.run(rx).await });
    let r = script(&tx).await;
    drop(tx);
    task.await?;
    r
}

async fn send(tx: &mpsc::Sender<Request>, evt: Event) -> Result<()> {
    let (rtx, rrx) = oneshot::channel();
    (tx.send((evt, rtx)).await).map_err(|_| anyhow::anyhow!("host stopped"))?;
    match rrx.await? {
        Ok(Reply::Done) => {}
        Ok(r) => println!("{r:?}"),
        Err(e) => println!("Rejected: {e}"),
    }
    Ok(())
}

async fn script(tx: &mpsc::Sender<Request>) -> Result<()> {
    const PEER: Addr = Addr::Random(RawAddr::from_le_bytes([0x11, 0x22, 0x33, 0x44, 0x55, 0xC6]));
    const C: ConnId = ConnId(0x40);
    send(tx, Event::Enabled { ok: true }).await?;
    send(tx, Event::LocalKeysRequest).await?;
    send(tx, Event::LocalKeysUpdate(LocalKeys::new([0x5A; LocalKeys::LEN]))).await?;
    let evt = Event::ConnectionStatus {
        conn: C,
        peer: PEER,
        connected: true,
        reason: 0,
    };
    send(tx, evt).await?;
    send(tx, Event::Att(Req::mtu(C, 247))).await?;
    send(tx, Event::Att(Req::read(C, hdl::DEVICE_NAME, 0xFFFF))).await?;
    for _ in 0..3 {
        send(tx, Event::Att(Req::read(C, hdl::BATTERY_LEVEL, 0xFFFF))).await?;
    }
    send(tx, Event::SecurityRequest { peer: PEER }).await?;
    let evt = Event::IoCapRequest {
        peer: PEER,
        transport: Transport::Le,
    };
    send(tx, evt).await?;
    let evt = Event::UserConfirmRequest {
        peer: PEER,
        value: 314_159,
        just_works: false,
    };
    send(tx, evt).await?;
    let evt = Event::PairingComplete {
        peer: PEER,
        transport: Transport::Le,
        status: 0,
    };
    send(tx, evt).await?;
    send(tx, Event::EncryptionStatus { peer: PEER, ok: true }).await?;
    let evt = Event::ConnectionStatus {
        conn: C,
        peer: PEER,
        connected: false,
        reason: 0x13,
    };
    send(tx, evt).await
}
