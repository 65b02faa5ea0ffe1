use std::ffi::CStr;
use std::io;
use std::net::Ipv4Addr;

use crate::error::{NetError, Result};

/// A resolved IPv4-capable network interface.
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub index: u32,
    flags: u32,
    /// First IPv4 address, if the interface has one.
    pub addr: Option<Ipv4Addr>,
}

impl Interface {
    pub fn is_up(&self) -> bool {
        self.flags & libc::IFF_UP as u32 != 0
    }

    pub fn is_multicast(&self) -> bool {
        self.flags & libc::IFF_MULTICAST as u32 != 0
    }

    pub fn is_loopback(&self) -> bool {
        self.flags & libc::IFF_LOOPBACK as u32 != 0
    }
}

/// Enumerate the host's network interfaces.
pub fn interfaces() -> io::Result<Vec<Interface>> {
    let mut list: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: `list` is a valid out-pointer; the returned list is freed
    // exactly once below.
    if unsafe { libc::getifaddrs(&mut list) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let mut out: Vec<Interface> = Vec::new();
    let mut cursor = list;
    while !cursor.is_null() {
        // SAFETY: `cursor` walks the linked list returned by getifaddrs,
        // which stays alive until freeifaddrs.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        // SAFETY: ifa_name is a NUL-terminated string owned by the list.
        let name = unsafe { CStr::from_ptr(entry.ifa_name) }
            .to_string_lossy()
            .into_owned();
        let addr = if entry.ifa_addr.is_null() {
            None
        } else {
            // SAFETY: ifa_addr points at a sockaddr; reading the family
            // field is valid for any address family.
            let family = unsafe { (*entry.ifa_addr).sa_family };
            if family == libc::AF_INET as libc::sa_family_t {
                // SAFETY: family AF_INET guarantees sockaddr_in layout.
                let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
                Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)))
            } else {
                None
            }
        };

        // getifaddrs yields one entry per address family; merge by name.
        match out.iter_mut().find(|i| i.name == name) {
            Some(existing) => {
                if existing.addr.is_none() {
                    existing.addr = addr;
                }
            }
            None => {
                // SAFETY: ifa_name is valid for the duration of the call.
                let index = unsafe { libc::if_nametoindex(entry.ifa_name) };
                out.push(Interface {
                    name,
                    index,
                    flags: entry.ifa_flags as u32,
                    addr,
                });
            }
        }
    }
    // SAFETY: `list` came from getifaddrs and has not been freed.
    unsafe { libc::freeifaddrs(list) };
    Ok(out)
}

/// Resolve an interface by name.
pub fn by_name(name: &str) -> Result<Interface> {
    interfaces()?
        .into_iter()
        .find(|i| i.name == name)
        .ok_or_else(|| NetError::InterfaceNotFound {
            name: name.to_string(),
        })
}

/// The interface multicast transmissions go out on when none is named:
/// the first up multicast interface that also loops back, or failing
/// that any up multicast interface with an IPv4 address.
pub fn default_multicast_interface() -> Result<Interface> {
    let all = interfaces()?;
    all.iter()
        .find(|i| i.is_up() && i.is_multicast() && i.is_loopback() && i.addr.is_some())
        .or_else(|| all.iter().find(|i| i.is_up() && i.is_multicast() && i.addr.is_some()))
        .cloned()
        .ok_or(NetError::NoMulticastInterface)
}
