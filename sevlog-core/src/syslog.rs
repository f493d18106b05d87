// Syslog transport: datagrams to the local daemon socket or to a remote host.
// Daemons that expose their socket as a stream get the same frames over it.
//
// Messages use the BSD framing `<PRI>text` followed by a NUL byte, with the
// `user` facility. The text is the fully formatted line, so the receiving
// daemon keeps the same columns as every other sink.

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::{
    io::Write,
    os::unix::net::{UnixDatagram, UnixStream},
};

use crate::log_writer::{LogWriter, Record};

#[cfg(target_os = "macos")]
pub const LOCAL_SOCKET: &str = "/var/run/syslog";
#[cfg(not(target_os = "macos"))]
pub const LOCAL_SOCKET: &str = "/dev/log";

/// Host used when no local syslog socket exists.
pub const FALLBACK_HOST: &str = "localhost";

/// The platform syslog socket, if present on this machine.
pub fn local_socket_path() -> Option<PathBuf> {
    let path = Path::new(LOCAL_SOCKET);
    path.exists().then(|| path.to_path_buf())
}

/// Resolves `host:port`, failing when the name yields no address at all.
pub fn resolve(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {host}"),
        ));
    }
    Ok(addrs)
}

#[derive(Debug)]
enum Transport {
    #[cfg(unix)]
    Unix(UnixDatagram),
    #[cfg(unix)]
    UnixStream(UnixStream),
    Udp(UdpSocket),
}

#[derive(Debug)]
pub struct SyslogWriter {
    transport: Transport,
}

impl SyslogWriter {
    /// Connects to a local daemon on a Unix socket, datagram first, then stream.
    #[cfg(unix)]
    pub fn unix<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let datagram = UnixDatagram::unbound().and_then(|socket| {
            socket.connect(path)?;
            Ok(socket)
        });
        let transport = match datagram {
            Ok(socket) => Transport::Unix(socket),
            // the datagram error is the meaningful one when nothing listens at all
            Err(e) => Transport::UnixStream(UnixStream::connect(path).map_err(|_| e)?),
        };
        Ok(Self { transport })
    }

    /// Connects a UDP socket to the first of `addrs` that accepts it.
    pub fn udp(addrs: &[SocketAddr]) -> io::Result<Self> {
        let mut last_error = None;
        for addr in addrs {
            let bind: SocketAddr = if addr.is_ipv4() {
                ([0, 0, 0, 0], 0).into()
            } else {
                ([0u16; 8], 0).into()
            };
            match UdpSocket::bind(bind).and_then(|socket| {
                socket.connect(addr)?;
                Ok(socket)
            }) {
                Ok(socket) => {
                    return Ok(Self {
                        transport: Transport::Udp(socket),
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "no syslog address to connect to")
        }))
    }

    pub fn is_local_socket(&self) -> bool {
        match self.transport {
            #[cfg(unix)]
            Transport::Unix(_) | Transport::UnixStream(_) => true,
            Transport::Udp(_) => false,
        }
    }
}

/// Frames a record as a syslog datagram.
pub fn encode(record: &Record<'_>) -> Vec<u8> {
    let mut datagram = format!(
        "<{}>{}",
        record.severity.syslog_priority(),
        record.formatted()
    )
    .into_bytes();
    datagram.push(0);
    datagram
}

impl LogWriter for SyslogWriter {
    fn write(&mut self, record: &Record<'_>) -> io::Result<()> {
        let datagram = encode(record);
        match &mut self.transport {
            #[cfg(unix)]
            Transport::Unix(socket) => socket.send(&datagram).map(|_| ()),
            #[cfg(unix)]
            Transport::UnixStream(stream) => stream.write_all(&datagram),
            Transport::Udp(socket) => socket.send(&datagram).map(|_| ()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.transport {
            #[cfg(unix)]
            Transport::UnixStream(stream) => stream.flush(),
            _ => Ok(()),
        }
    }
}
