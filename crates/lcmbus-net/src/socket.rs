use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};

use socket2::{Domain, InterfaceIndexOrAddress, Protocol, Socket, Type};

use crate::error::{NetError, Result};
use crate::token::CancelToken;

/// Wildcard prefix for administratively-scoped multicast groups. Binding
/// here receives every locally-scoped group datagram on the port while
/// leaving the port shareable with other processes.
const MULTICAST_WILDCARD: Ipv4Addr = Ipv4Addr::new(239, 0, 0, 0);

pub(crate) fn udp_socket() -> io::Result<Socket> {
    Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
}

/// Bind the receive socket to the multicast wildcard on `port`.
pub(crate) fn bind_listener(port: u16, buffer_size: usize) -> io::Result<Socket> {
    let socket = udp_socket()?;
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(buffer_size)?;
    socket.bind(&SocketAddrV4::new(MULTICAST_WILDCARD, port).into())?;
    Ok(socket)
}

/// Bind the transmit socket to an ephemeral local port.
pub(crate) fn bind_ephemeral() -> io::Result<Socket> {
    let socket = udp_socket()?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())?;
    Ok(socket)
}

pub(crate) fn join_group(socket: &Socket, group: Ipv4Addr, if_index: u32) -> io::Result<()> {
    socket.join_multicast_v4_n(&group, &InterfaceIndexOrAddress::Index(if_index))
}

pub(crate) fn leave_group(socket: &Socket, group: Ipv4Addr, if_index: u32) -> io::Result<()> {
    socket.leave_multicast_v4_n(&group, &InterfaceIndexOrAddress::Index(if_index))
}

/// Ask the kernel for per-packet destination and interface metadata.
#[cfg(target_os = "linux")]
pub(crate) fn enable_packet_info(socket: &Socket) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let on: libc::c_int = 1;
    // SAFETY: the fd is owned by `socket` and the option value is a valid
    // int for the duration of the call.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_PKTINFO,
            (&on as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Per-packet metadata is only available through the Linux control-message
/// path; elsewhere the receiver reports source addresses only.
#[cfg(not(target_os = "linux"))]
pub(crate) fn enable_packet_info(_socket: &Socket) -> io::Result<()> {
    Ok(())
}

/// Install an assembled filter program on the socket.
#[cfg(target_os = "linux")]
pub(crate) fn attach_filter(
    socket: &Socket,
    program: &[lcmbus_filter::RawInstruction],
) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let insns: Vec<libc::sock_filter> = program
        .iter()
        .map(|i| libc::sock_filter {
            code: i.op,
            jt: i.jt,
            jf: i.jf,
            k: i.k,
        })
        .collect();
    let prog = libc::sock_fprog {
        len: insns.len() as libc::c_ushort,
        filter: insns.as_ptr() as *mut libc::sock_filter,
    };
    // SAFETY: `prog` points at `insns`, which outlives the call; the
    // kernel copies the program before returning.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_ATTACH_FILTER,
            (&prog as *const libc::sock_fprog).cast::<libc::c_void>(),
            std::mem::size_of::<libc::sock_fprog>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Kernel packet filtering is Linux-only; the program is accepted and
/// discarded, and filtering happens in user space after decode.
#[cfg(not(target_os = "linux"))]
pub(crate) fn attach_filter(
    _socket: &Socket,
    _program: &[lcmbus_filter::RawInstruction],
) -> io::Result<()> {
    Ok(())
}

/// Propagate the token's deadline to the socket read timeout.
pub(crate) fn set_read_deadline(socket: &Socket, token: &CancelToken) -> Result<()> {
    socket
        .set_read_timeout(nonzero_remaining(token)?)
        .map_err(NetError::Io)
}

/// Propagate the token's deadline to the socket write timeout.
pub(crate) fn set_write_deadline(socket: &Socket, token: &CancelToken) -> Result<()> {
    socket
        .set_write_timeout(nonzero_remaining(token)?)
        .map_err(NetError::Io)
}

fn nonzero_remaining(token: &CancelToken) -> Result<Option<std::time::Duration>> {
    match token.remaining() {
        Some(d) if d.is_zero() => Err(NetError::Cancelled),
        other => Ok(other),
    }
}
