//! UDP front end: parses `<port> <image-path>`, opens or initializes the
//! image, and serves requests one datagram at a time (§5, §6 — no
//! concurrency, a reply is sent for every request before the next is
//! read).

use std::net::UdpSocket;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use mfsd_server::dispatch::handle_datagram;
use mfsd_server::FileSystem;

/// Maximum size of a request or reply datagram (§5).
const MAX_DATAGRAM: usize = 8192;

struct Args {
    port: u16,
    image_path: String,
}

/// Hand-rolled rather than `clap`-based: the contract here is a fixed
/// two-positional-argument CLI with a specific usage message and exit
/// code on misuse, not a general-purpose flag surface (see
/// `SPEC_FULL.md` §A.3).
fn parse_args() -> Result<Args> {
    let argv: Vec<String> = std::env::args().collect();
    if argv.len() != 3 {
        bail!("usage: {} <port> <image-path>", argv.first().map(String::as_str).unwrap_or("mfsd-server"));
    }
    let port: u16 = argv[1]
        .parse()
        .with_context(|| format!("invalid port: {}", argv[1]))?;
    Ok(Args {
        port,
        image_path: argv[2].clone(),
    })
}

fn main() -> Result<()> {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let mut fs = FileSystem::open(&args.image_path)
        .with_context(|| format!("opening image {}", args.image_path))?;

    let socket = UdpSocket::bind(("0.0.0.0", args.port))
        .with_context(|| format!("binding UDP port {}", args.port))?;
    info!("mfsd-server listening on {} serving {}", args.port, fs.path().display());

    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(v) => v,
            Err(e) => {
                warn!("recv_from failed: {}", e);
                continue;
            }
        };

        let reply = handle_datagram(&mut fs, &buf[..len]);

        if let Err(e) = fs.flush() {
            warn!("flush failed: {}", e);
        }

        if let Err(e) = socket.send_to(&reply, from) {
            warn!("send_to {} failed: {}", from, e);
        }
    }
}
