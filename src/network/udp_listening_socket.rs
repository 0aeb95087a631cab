use mio_v06::net::UdpSocket;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};

/// Binds `0.0.0.0:port` with address reuse so that every participant of the
/// host can listen on the same port, and joins `multicast_group` on each interface.
pub fn new_multicast(
    port: u16,
    multicast_group: Ipv4Addr,
    interfaces: &[Ipv4Addr],
) -> io::Result<UdpSocket> {
    let raw_socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    raw_socket.set_reuse_address(true)?;
    raw_socket.bind(&SockAddr::from(SocketAddr::new(
        Ipv4Addr::UNSPECIFIED.into(),
        port,
    )))?;

    let udp_socket = std::net::UdpSocket::from(raw_socket);
    udp_socket.set_nonblocking(true)?;
    let socket = UdpSocket::from_socket(udp_socket)?;
    for interface in interfaces {
        socket.join_multicast_v4(&multicast_group, interface)?;
    }
    Ok(socket)
}
