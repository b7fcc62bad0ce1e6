//! Classic BPF program attached to send-only raw sockets.
//!
//! A raw socket receives a copy of every inbound packet of its protocol. On the
//! send path nobody reads those copies, so they would only fill the socket's
//! receive buffer. `ret #0` makes the kernel drop them before queueing.

use std::io;

use socket2::Socket;

#[cfg(target_os = "linux")]
const BPF_RET_K: u16 = 0x06; // BPF_RET | BPF_K

#[cfg(target_os = "linux")]
fn drop_all_program() -> [libc::sock_filter; 1] {
    [libc::sock_filter {
        code: BPF_RET_K,
        jt: 0,
        jf: 0,
        k: 0,
    }]
}

#[cfg(target_os = "linux")]
pub fn attach_drop_all(socket: &Socket) -> io::Result<()> {
    socket.attach_filter(&drop_all_program())
}

#[cfg(not(target_os = "linux"))]
pub fn attach_drop_all(_socket: &Socket) -> io::Result<()> {
    tracing::debug!("socket filters are not supported on this platform, send socket stays unfiltered");
    Ok(())
}
