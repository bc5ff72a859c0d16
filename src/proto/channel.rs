use super::packet::MAX_PACKET_SIZE;
use anyhow::{Context, Error, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::rc::Rc;
use std::time::Duration;

/// A connectionless datagram transport used by both engines.
pub trait DatagramChannel {
    /// Sends one datagram to the current peer.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receives one datagram. Returns `Ok(None)` when nothing arrived
    /// within the timeout; a `None` timeout blocks until data arrives.
    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>>;
}

/// UDP socket transport. The peer is either fixed up front (sender side)
/// or learned from the origin of the most recent datagram, so replies
/// return to whichever peer is actively transmitting (receiver side).
pub struct UdpChannel {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    read_timeout: Option<Duration>,
}

impl UdpChannel {
    pub fn bind(port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .with_context(|| format!("cannot bind udp socket on port {}", port))?;

        Ok(Self {
            socket,
            peer: None,
            read_timeout: None,
        })
    }

    pub fn connect(mut self, host: &str, port: u16) -> Result<Self> {
        let peer = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("invalid receiver host: {}:{}", host, port))?
            .next()
            .ok_or_else(|| Error::msg(format!("invalid receiver host: {}:{}", host, port)))?;

        self.peer = Some(peer);

        Ok(self)
    }

    pub fn local_port(&self) -> Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }
}

impl DatagramChannel for UdpChannel {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let peer = self
            .peer
            .ok_or_else(|| Error::msg("no peer address to send to"))?;

        self.socket.send_to(data, peer)?;

        Ok(())
    }

    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>> {
        if self.read_timeout != timeout {
            self.socket.set_read_timeout(timeout)?;
            self.read_timeout = timeout;
        }

        let mut buff = [0u8; MAX_PACKET_SIZE];

        match self.socket.recv_from(&mut buff) {
            Ok((len, origin)) => {
                self.peer = Some(origin);
                Ok(Some(buff[..len].to_vec()))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process link joining two endpoints, used to drive the engines
/// deterministically in tests. Clones share the same queues so a test
/// can observe or inject traffic beside an engine that owns an endpoint.
#[derive(Clone)]
pub struct MemoryChannel {
    inbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
    outbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
}

impl MemoryChannel {
    /// Creates both endpoints of a lossless bidirectional link.
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let towards_a = Rc::new(RefCell::new(VecDeque::new()));
        let towards_b = Rc::new(RefCell::new(VecDeque::new()));

        (
            MemoryChannel {
                inbox: Rc::clone(&towards_a),
                outbox: Rc::clone(&towards_b),
            },
            MemoryChannel {
                inbox: towards_b,
                outbox: towards_a,
            },
        )
    }

    /// The number of datagrams waiting to be received at this endpoint.
    pub fn pending(&self) -> usize {
        self.inbox.borrow().len()
    }
}

impl DatagramChannel for MemoryChannel {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.outbox.borrow_mut().push_back(data.to_vec());

        Ok(())
    }

    /// Never blocks: an empty queue is indistinguishable from a timeout.
    fn recv(&mut self, _timeout: Option<Duration>) -> Result<Option<Vec<u8>>> {
        Ok(self.inbox.borrow_mut().pop_front())
    }
}
