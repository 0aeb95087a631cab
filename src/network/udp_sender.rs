use log::error;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

/// One socket per local interface.
///
/// Multicast datagrams go out on every interface since the peers that joined
/// the group may be reachable through any of them.
pub struct UdpSender {
    multicast_sockets: Vec<UdpSocket>,
}

impl UdpSender {
    pub fn new(interfaces: &[Ipv4Addr]) -> io::Result<Self> {
        let mut multicast_sockets = Vec::with_capacity(interfaces.len());
        for addr in interfaces {
            let raw_socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
            raw_socket.set_multicast_if_v4(addr)?;
            raw_socket.bind(&SockAddr::from(SocketAddr::new((*addr).into(), 0)))?;
            let mc_socket = UdpSocket::from(raw_socket);
            mc_socket.set_multicast_loop_v4(true)?;
            multicast_sockets.push(mc_socket);
        }
        Ok(Self { multicast_sockets })
    }

    pub fn send_to_multicast(&self, data: &[u8], multicast_group: Ipv4Addr, port: u16) {
        for msocket in &self.multicast_sockets {
            if let Err(e) = msocket.send_to(data, (multicast_group, port)) {
                error!(
                    "failed send data to {}:{} because '{:?}'",
                    multicast_group, port, e
                );
            }
        }
    }
}
