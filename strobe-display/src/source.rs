//! UDP packet source.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use strobe_core::{CoreError, PacketSource};

/// Non-blocking UDP socket feeding the ingestion loop.
pub struct UdpPacketSource {
    socket: UdpSocket,
}

impl UdpPacketSource {
    /// Bind to `addr`. A non-zero `recv_buffer` resizes the kernel
    /// receive buffer.
    pub fn bind(addr: SocketAddr, recv_buffer: usize) -> Result<Self, CoreError> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        if recv_buffer > 0 {
            socket.set_recv_buffer_size(recv_buffer)?;
        }
        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;

        let socket: UdpSocket = socket.into();
        info!(
            local = %socket.local_addr()?,
            recv_buffer,
            "UDP packet source bound"
        );
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CoreError> {
        Ok(self.socket.local_addr()?)
    }
}

impl PacketSource for UdpPacketSource {
    fn try_read_packet(&mut self, buf: &mut [u8]) -> usize {
        match self.socket.recv_from(buf) {
            Ok((n, _peer)) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => 0,
            Err(e) => {
                debug!("UDP receive error: {e}");
                0
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
