use std::io;
use std::mem;
use std::os::fd::{AsRawFd, OwnedFd};
use std::ptr;
use std::time::Duration;

use nix::errno::Errno;
use nix::net::if_::if_nametoindex;
use nix::sys::socket::{
    bind, recv, setsockopt, socket, sockopt, AddressFamily, LinkAddr, MsgFlags, SockFlag,
    SockProtocol, SockType, SockaddrLike,
};
use nix::sys::time::{TimeVal, TimeValLike};
use thiserror::Error;

use crate::capture::FrameSource;
use crate::interfaces::list_interfaces;

/// Longest interface name the kernel accepts (`IFNAMSIZ` minus the trailing NUL).
pub const MAX_INTERFACE_NAME_LEN: usize = libc::IFNAMSIZ - 1;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid interface name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("socket: cannot open link-layer capture socket: {0}")]
    Socket(#[source] Errno),
    #[error("SIOCGIFINDEX: cannot resolve interface {name:?}: {source}{}", available_hint(.available))]
    ResolveInterface {
        name: String,
        source: Errno,
        available: Vec<String>,
    },
    #[error("bind: cannot bind capture socket to {name:?} (index {index}): {source}")]
    Bind {
        name: String,
        index: u32,
        source: Errno,
    },
    #[error("PACKET_ADD_MEMBERSHIP: cannot enable promiscuous mode on {name:?}: {source}")]
    Promiscuous { name: String, source: Errno },
    #[error("SO_RCVTIMEO: cannot set receive timeout: {0}")]
    ReceiveTimeout(#[source] Errno),
}

fn available_hint(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(" (available: {})", available.join(", "))
    }
}

/// Options applied to the capture socket after it is bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Join promiscuous membership on the interface.
    pub promiscuous: bool,
    /// Upper bound on how long a single receive blocks before returning `WouldBlock`.
    pub recv_timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            promiscuous: false,
            recv_timeout: Duration::from_millis(250),
        }
    }
}

/// A raw `AF_PACKET` socket receiving every protocol on exactly one interface.
#[derive(Debug)]
pub struct CaptureHandle {
    fd: OwnedFd,
    name: String,
    index: u32,
}

impl CaptureHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl FrameSource for CaptureHandle {
    fn recv_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        recv(self.fd.as_raw_fd(), buf, MsgFlags::empty()).map_err(io::Error::from)
    }
}

/// Checks that `name` can be handed to the kernel as an interface name.
pub fn validate_interface_name(name: &str) -> Result<(), BindError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > MAX_INTERFACE_NAME_LEN {
        "name is longer than 15 bytes"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else if name.contains('/') {
        "name contains '/'"
    } else if name.chars().any(char::is_whitespace) {
        "name contains whitespace"
    } else {
        return Ok(());
    };
    Err(BindError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Opens a link-layer capture socket and binds it to the interface called `name`.
pub fn bind_interface(name: &str, options: &CaptureOptions) -> Result<CaptureHandle, BindError> {
    validate_interface_name(name)?;

    let fd = socket(
        AddressFamily::Packet,
        SockType::Raw,
        SockFlag::SOCK_CLOEXEC,
        SockProtocol::EthAll,
    )
    .map_err(BindError::Socket)?;

    let index = if_nametoindex(name).map_err(|source| BindError::ResolveInterface {
        name: name.to_string(),
        source,
        available: list_interfaces(),
    })?;

    let addr = link_layer_address(index).ok_or_else(|| BindError::Bind {
        name: name.to_string(),
        index,
        source: Errno::EINVAL,
    })?;
    bind(fd.as_raw_fd(), &addr).map_err(|source| BindError::Bind {
        name: name.to_string(),
        index,
        source,
    })?;

    if options.promiscuous {
        join_promiscuous(&fd, index).map_err(|source| BindError::Promiscuous {
            name: name.to_string(),
            source,
        })?;
    }

    let timeout = i64::try_from(options.recv_timeout.as_millis()).unwrap_or(i64::MAX);
    setsockopt(&fd, sockopt::ReceiveTimeout, &TimeVal::milliseconds(timeout))
        .map_err(BindError::ReceiveTimeout)?;

    tracing::info!(
        interface = name,
        index,
        promiscuous = options.promiscuous,
        "capture socket bound"
    );

    Ok(CaptureHandle {
        fd,
        name: name.to_string(),
        index,
    })
}

/// Binding descriptor selecting every protocol on the interface with the given index.
fn link_layer_address(index: u32) -> Option<LinkAddr> {
    // SAFETY: sockaddr_ll is plain old data, all-zero is a valid value.
    let mut sll: libc::sockaddr_ll = unsafe { mem::zeroed() };
    sll.sll_family = libc::AF_PACKET as libc::sa_family_t;
    sll.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
    sll.sll_ifindex = i32::try_from(index).ok()?;

    // SAFETY: the pointer refers to a fully initialised sockaddr_ll of the given length.
    unsafe {
        LinkAddr::from_raw(
            ptr::addr_of!(sll).cast::<libc::sockaddr>(),
            Some(mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t),
        )
    }
}

fn join_promiscuous(fd: &OwnedFd, index: u32) -> Result<(), Errno> {
    let mreq = libc::packet_mreq {
        mr_ifindex: i32::try_from(index).map_err(|_| Errno::EINVAL)?,
        mr_type: libc::PACKET_MR_PROMISC as libc::c_ushort,
        mr_alen: 0,
        mr_address: [0; 8],
    };
    // SAFETY: mreq outlives the call and its size is passed alongside.
    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_PACKET,
            libc::PACKET_ADD_MEMBERSHIP,
            ptr::addr_of!(mreq).cast::<libc::c_void>(),
            mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
        )
    };
    Errno::result(ret).map(drop)
}
