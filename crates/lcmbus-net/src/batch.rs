//! Batched datagram I/O over raw system calls.
//!
//! On Linux, `recvmmsg`/`sendmmsg` move several datagrams per syscall and
//! `IP_PKTINFO` control messages carry the destination address and arrival
//! interface of each packet. Elsewhere a single-datagram fallback keeps the
//! same interface with a batch of one.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};

use socket2::Socket;

use lcmbus_wire::MAX_DATAGRAM_LEN;

/// Room for the `IP_PKTINFO` control message plus slack.
const CONTROL_SIZE: usize = 256;

/// One pre-allocated receive slot: a full-size payload buffer, a
/// control-message buffer, and the per-packet metadata of the last fill.
pub(crate) struct RecvSlot {
    pub payload: Vec<u8>,
    pub control: Vec<u8>,
    pub len: usize,
    pub src: Option<SocketAddrV4>,
    pub dst: Option<Ipv4Addr>,
    pub if_index: u32,
}

impl RecvSlot {
    pub(crate) fn new() -> Self {
        Self {
            payload: vec![0; MAX_DATAGRAM_LEN],
            control: vec![0; CONTROL_SIZE],
            len: 0,
            src: None,
            dst: None,
            if_index: 0,
        }
    }

    pub(crate) fn datagram(&self) -> &[u8] {
        &self.payload[..self.len]
    }
}

#[cfg(target_os = "linux")]
fn to_sockaddr_in(addr: SocketAddrV4) -> libc::sockaddr_in {
    // SAFETY: sockaddr_in is plain old data; all-zero is a valid value.
    let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_port = addr.port().to_be();
    sa.sin_addr = libc::in_addr {
        s_addr: u32::from(*addr.ip()).to_be(),
    };
    sa
}

fn from_sockaddr_in(sa: &libc::sockaddr_in) -> SocketAddrV4 {
    SocketAddrV4::new(
        Ipv4Addr::from(u32::from_be(sa.sin_addr.s_addr)),
        u16::from_be(sa.sin_port),
    )
}

/// Fill `slots` with up to `slots.len()` datagrams, blocking for the
/// first. Returns the number of slots filled.
#[cfg(target_os = "linux")]
pub(crate) fn recv_batch(socket: &Socket, slots: &mut [RecvSlot]) -> io::Result<usize> {
    use std::os::fd::AsRawFd;

    let count = slots.len();
    // SAFETY: sockaddr_in and mmsghdr are plain old data.
    let mut names: Vec<libc::sockaddr_in> = vec![unsafe { std::mem::zeroed() }; count];
    let mut iovecs: Vec<libc::iovec> = slots
        .iter_mut()
        .map(|slot| libc::iovec {
            iov_base: slot.payload.as_mut_ptr().cast::<libc::c_void>(),
            iov_len: slot.payload.len(),
        })
        .collect();
    let mut headers: Vec<libc::mmsghdr> = vec![unsafe { std::mem::zeroed() }; count];
    for i in 0..count {
        headers[i].msg_hdr.msg_name = (&mut names[i] as *mut libc::sockaddr_in).cast();
        headers[i].msg_hdr.msg_namelen = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        headers[i].msg_hdr.msg_iov = &mut iovecs[i];
        headers[i].msg_hdr.msg_iovlen = 1;
        headers[i].msg_hdr.msg_control = slots[i].control.as_mut_ptr().cast();
        headers[i].msg_hdr.msg_controllen = slots[i].control.len();
    }
    // SAFETY: every pointer in `headers` refers to memory owned by
    // `slots`, `names` or `iovecs`, all of which outlive the call.
    let rc = unsafe {
        libc::recvmmsg(
            socket.as_raw_fd(),
            headers.as_mut_ptr(),
            count as libc::c_uint,
            0,
            std::ptr::null_mut(),
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    let filled = rc as usize;
    for i in 0..filled {
        slots[i].len = headers[i].msg_len as usize;
        slots[i].src = Some(from_sockaddr_in(&names[i]));
        // SAFETY: msg_hdr still points at live buffers and the kernel has
        // updated msg_controllen to the bytes it wrote.
        let (dst, if_index) = unsafe { parse_packet_info(&headers[i].msg_hdr) };
        slots[i].dst = dst;
        slots[i].if_index = if_index;
    }
    Ok(filled)
}

/// Walk the control messages for the packet's `IP_PKTINFO`.
#[cfg(target_os = "linux")]
unsafe fn parse_packet_info(header: &libc::msghdr) -> (Option<Ipv4Addr>, u32) {
    let mut cmsg = libc::CMSG_FIRSTHDR(header as *const libc::msghdr);
    while !cmsg.is_null() {
        let c = &*cmsg;
        if c.cmsg_level == libc::IPPROTO_IP && c.cmsg_type == libc::IP_PKTINFO {
            let info: libc::in_pktinfo =
                std::ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<libc::in_pktinfo>());
            return (
                Some(Ipv4Addr::from(u32::from_be(info.ipi_addr.s_addr))),
                info.ipi_ifindex as u32,
            );
        }
        cmsg = libc::CMSG_NXTHDR(header as *const libc::msghdr as *mut libc::msghdr, cmsg);
    }
    (None, 0)
}

/// Single-datagram fallback: fills the first slot only. Destination and
/// interface metadata are unavailable without the Linux control path.
#[cfg(not(target_os = "linux"))]
pub(crate) fn recv_batch(socket: &Socket, slots: &mut [RecvSlot]) -> io::Result<usize> {
    use std::os::fd::AsRawFd;

    let slot = &mut slots[0];
    // SAFETY: sockaddr_in is plain old data.
    let mut name: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    let mut name_len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    // SAFETY: the payload buffer and name out-parameters are valid for
    // the advertised lengths.
    let rc = unsafe {
        libc::recvfrom(
            socket.as_raw_fd(),
            slot.payload.as_mut_ptr().cast::<libc::c_void>(),
            slot.payload.len(),
            0,
            (&mut name as *mut libc::sockaddr_in).cast(),
            &mut name_len,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    slot.len = rc as usize;
    slot.src = Some(from_sockaddr_in(&name));
    slot.dst = None;
    slot.if_index = 0;
    Ok(1)
}

/// Send `payload` to a batch of destinations, returning how many sends
/// the kernel accepted. Partial progress is legal; the caller advances by
/// the returned count and retries the rest.
#[cfg(target_os = "linux")]
pub(crate) fn send_batch(
    socket: &Socket,
    dests: &[SocketAddrV4],
    payload: &[u8],
) -> io::Result<usize> {
    use std::os::fd::AsRawFd;

    let count = dests.len();
    let mut names: Vec<libc::sockaddr_in> = dests.iter().map(|d| to_sockaddr_in(*d)).collect();
    let mut iovecs: Vec<libc::iovec> = (0..count)
        .map(|_| libc::iovec {
            // The kernel does not write through the send iovec.
            iov_base: payload.as_ptr() as *mut libc::c_void,
            iov_len: payload.len(),
        })
        .collect();
    // SAFETY: mmsghdr is plain old data.
    let mut headers: Vec<libc::mmsghdr> = vec![unsafe { std::mem::zeroed() }; count];
    for i in 0..count {
        headers[i].msg_hdr.msg_name = (&mut names[i] as *mut libc::sockaddr_in).cast();
        headers[i].msg_hdr.msg_namelen = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        headers[i].msg_hdr.msg_iov = &mut iovecs[i];
        headers[i].msg_hdr.msg_iovlen = 1;
    }
    // SAFETY: every pointer in `headers` refers to memory owned by
    // `names`, `iovecs` or `payload`, all of which outlive the call.
    let rc = unsafe {
        libc::sendmmsg(
            socket.as_raw_fd(),
            headers.as_mut_ptr(),
            count as libc::c_uint,
            0,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rc as usize)
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn send_batch(
    socket: &Socket,
    dests: &[SocketAddrV4],
    payload: &[u8],
) -> io::Result<usize> {
    for dest in dests {
        socket.send_to(payload, &(*dest).into())?;
    }
    Ok(dests.len())
}
