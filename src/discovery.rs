//! UDP broadcast discovery of the sensor's address.
//!
//! The client binds a reusable, broadcast-capable socket, sends the probe
//! payload to the broadcast address and treats the sender of the first reply
//! as the sensor. There is no attempt cap.

use std::{
    fmt, io,
    net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
    sync::Arc,
};

use rustix::net::{self, sockopt, AddressFamily, SocketType};

use crate::{
    app::Logger,
    clock::Sleeper,
    config::DiscoveryConfig,
    display::{write_line, CharDisplay},
};

const SEARCH_ROW: u8 = 1;
const ADDRESS_ROW: u8 = 2;
const RECV_BUFFER: usize = 1024;

/// Address of the sensor being polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorEndpoint {
    ip: IpAddr,
}

impl SensorEndpoint {
    pub const fn new(ip: IpAddr) -> Self {
        Self { ip }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Host part of a URL; IPv6 addresses are bracketed.
    pub fn host(&self) -> String {
        match self.ip {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{v6}]"),
        }
    }

    pub fn url(&self, port: u16, path: &str) -> String {
        if port == 80 {
            format!("http://{}{path}", self.host())
        } else {
            format!("http://{}:{port}{path}", self.host())
        }
    }
}

impl fmt::Display for SensorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)
    }
}

/// The reply that ended a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryResult {
    pub endpoint: SensorEndpoint,
    pub origin: SocketAddr,
    pub reply: String,
}

/// Finds the sensor, blocking until it answers.
pub trait SensorLocator {
    fn locate<D: CharDisplay>(&mut self, display: &mut D) -> SensorEndpoint;
}

/// Broadcast locator over a real UDP socket.
pub struct UdpLocator<S: Sleeper> {
    settings: DiscoveryConfig,
    sleeper: S,
    logger: Arc<Logger>,
}

impl<S: Sleeper> UdpLocator<S> {
    pub fn new(settings: DiscoveryConfig, sleeper: S, logger: Arc<Logger>) -> Self {
        Self {
            settings,
            sleeper,
            logger,
        }
    }

    pub fn settings(&self) -> &DiscoveryConfig {
        &self.settings
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Probe until any datagram arrives on the listen port.
    pub fn search(&mut self) -> io::Result<DiscoveryResult> {
        let socket = open_discovery_socket(&self.settings)?;
        let target = SocketAddrV4::new(self.settings.broadcast_addr, self.settings.probe_port);
        let mut buf = [0u8; RECV_BUFFER];
        loop {
            socket.send_to(self.settings.probe_payload.as_bytes(), target)?;
            self.logger
                .debug(format!("sent {} broadcast to {target}", self.settings.probe_payload));
            match socket.recv_from(&mut buf) {
                Ok((len, origin)) => match std::str::from_utf8(&buf[..len]) {
                    Ok(reply) => {
                        return Ok(DiscoveryResult {
                            endpoint: SensorEndpoint::new(origin.ip()),
                            origin,
                            reply: reply.to_string(),
                        })
                    }
                    Err(_) => self
                        .logger
                        .warn(format!("ignoring non-UTF-8 discovery reply from {origin}")),
                },
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    self.logger.debug("no discovery reply before timeout");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<S: Sleeper> SensorLocator for UdpLocator<S> {
    fn locate<D: CharDisplay>(&mut self, display: &mut D) -> SensorEndpoint {
        self.logger.info("Searching for Sensor...");
        if let Err(err) = write_line(display, SEARCH_ROW, "Searching for Sensor", true) {
            self.logger.warn(format!("display: {err}"));
        }
        let found = loop {
            match self.search() {
                Ok(found) => break found,
                Err(err) => {
                    self.logger.error(format!("discovery failed: {err}; retrying"));
                    self.sleeper.sleep(self.settings.probe_timeout);
                }
            }
        };
        self.logger
            .info(format!("Found sensor: {} from {}", found.reply, found.origin.ip()));
        for (row, text) in [
            (SEARCH_ROW, "Found Sensor".to_string()),
            (ADDRESS_ROW, found.endpoint.to_string()),
        ] {
            if let Err(err) = write_line(display, row, &text, false) {
                self.logger.warn(format!("display: {err}"));
            }
        }
        self.sleeper.sleep(self.settings.found_pause);
        found.endpoint
    }
}

/// Bind the listen port with address/port reuse and broadcast enabled.
pub fn open_discovery_socket(settings: &DiscoveryConfig) -> io::Result<UdpSocket> {
    let fd = net::socket(
        AddressFamily::INET,
        SocketType::DGRAM,
        Some(net::ipproto::UDP),
    )?;
    sockopt::set_socket_reuseaddr(&fd, true)?;
    sockopt::set_socket_reuseport(&fd, true)?;
    sockopt::set_socket_broadcast(&fd, true)?;
    let local = SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::UNSPECIFIED,
        settings.listen_port,
    ));
    net::bind(&fd, &local)?;
    let socket = UdpSocket::from(fd);
    socket.set_read_timeout(Some(settings.probe_timeout))?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_omits_default_port() {
        let ep = SensorEndpoint::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40)));
        assert_eq!(ep.url(80, "/data"), "http://192.168.1.40/data");
        assert_eq!(ep.url(8080, "/data"), "http://192.168.1.40:8080/data");
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let ep = SensorEndpoint::new("fe80::1".parse().unwrap());
        assert_eq!(ep.host(), "[fe80::1]");
        assert_eq!(ep.to_string(), "fe80::1");
        assert_eq!(ep.url(80, "/data"), "http://[fe80::1]/data");
    }

    #[test]
    fn socket_binds_ephemeral_port_with_timeout() {
        let settings = DiscoveryConfig {
            listen_port: 0,
            probe_timeout: std::time::Duration::from_millis(50),
            ..DiscoveryConfig::default()
        };
        let socket = open_discovery_socket(&settings).unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
        // the kernel stores SO_RCVTIMEO in ticks
        let timeout = socket.read_timeout().unwrap().unwrap();
        assert!(
            timeout >= std::time::Duration::from_millis(50)
                && timeout < std::time::Duration::from_millis(100),
            "{timeout:?}"
        );
        assert!(socket.broadcast().unwrap());
    }
}
