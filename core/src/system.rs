use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use anyhow::{Context, bail, ensure};
use tracing::debug;

/// Any routable address works; no packet is sent by a UDP connect.
const ROUTE_PROBE: (Ipv4Addr, u16) = (Ipv4Addr::new(114, 114, 114, 114), 53);

/// Local IPv4 address the kernel would use to reach the public Internet.
pub fn detect_source_addr() -> anyhow::Result<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).context("failed to bind UDP socket")?;
    socket
        .connect(ROUTE_PROBE)
        .context("no route to the public Internet, pass a source address explicitly")?;

    match socket.local_addr().context("failed to read local address")?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => {
            debug!("detected source address {ip}");
            Ok(ip)
        }
        other => bail!("kernel picked an unusable source address {other}"),
    }
}

/// Raw sockets need root (or CAP_NET_RAW); fail before opening any.
pub fn ensure_privileged() -> anyhow::Result<()> {
    ensure!(
        is_root::is_root(),
        "raw sockets require root privileges, rerun with sudo"
    );
    Ok(())
}
