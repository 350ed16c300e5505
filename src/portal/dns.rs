//! Captive DNS responder.
//!
//! Answers every standard query with a single A record pointing at the portal.
//! Phones and laptops that join the setup network resolve their
//! connectivity-check hosts to us, which opens their sign-in UI.
//!
//! # Response Layout
//!
//! ```text
//! Header    ID (copied) | flags QR AA [RD] RA | QD=1 AN=1 NS=0 AR=0
//! Question  first question of the query, verbatim
//! Answer    C0 0C | TYPE A | CLASS IN | TTL 60 | RDLENGTH 4 | portal IPv4
//! ```

use log::{debug, info, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Length of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// TTL of the synthesized A record, in seconds.
pub const ANSWER_TTL: u32 = 60;

/// Largest datagram we read. Queries from stub resolvers are far smaller.
const MAX_DATAGRAM_LEN: usize = 512;

/// Wire limits on a domain name (RFC 1035 section 2.3.4).
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

const FLAG_QR: u8 = 0x80;
const FLAG_AA: u8 = 0x04;
const FLAG_RD: u8 = 0x01;
const FLAG_RA: u8 = 0x80;

/// Why a datagram was dropped instead of answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsError {
    /// Shorter than the 12-byte header.
    TooShort,
    /// QR bit set: the datagram is a response, not a query.
    NotAQuery,
    /// QDCOUNT is zero.
    NoQuestion,
    /// First question name is malformed or runs past the datagram.
    MalformedQuestion,
}

impl std::fmt::Display for DnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort => write!(f, "datagram shorter than DNS header"),
            Self::NotAQuery => write!(f, "datagram is a response"),
            Self::NoQuestion => write!(f, "query has no question"),
            Self::MalformedQuestion => write!(f, "malformed question section"),
        }
    }
}

impl std::error::Error for DnsError {}

/// Synthesize the captive answer for a query.
pub fn build_response(query: &[u8], answer_ip: Ipv4Addr) -> Result<Vec<u8>, DnsError> {
    if query.len() < HEADER_LEN {
        return Err(DnsError::TooShort);
    }
    if query[2] & FLAG_QR != 0 {
        return Err(DnsError::NotAQuery);
    }
    if u16::from_be_bytes([query[4], query[5]]) == 0 {
        return Err(DnsError::NoQuestion);
    }
    let question_end = HEADER_LEN + question_len(&query[HEADER_LEN..])?;

    let mut packet = Vec::with_capacity(question_end + 16);
    packet.extend_from_slice(&query[..2]);
    packet.push(FLAG_QR | FLAG_AA | (query[2] & FLAG_RD));
    packet.push(FLAG_RA);
    packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
    packet.extend_from_slice(&query[HEADER_LEN..question_end]);

    packet.extend_from_slice(&[0xC0, 0x0C]); // Pointer to the question name
    packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // TYPE A, CLASS IN
    packet.extend_from_slice(&ANSWER_TTL.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x04]);
    packet.extend_from_slice(&answer_ip.octets());
    Ok(packet)
}

/// Length of the first question (name + QTYPE + QCLASS).
fn question_len(section: &[u8]) -> Result<usize, DnsError> {
    let mut pos = 0;
    loop {
        let len = *section.get(pos).ok_or(DnsError::MalformedQuestion)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        // Queries never compress their first name; a pointer here is bogus.
        if len > MAX_LABEL_LEN {
            return Err(DnsError::MalformedQuestion);
        }
        pos += len;
        if pos > MAX_NAME_LEN {
            return Err(DnsError::MalformedQuestion);
        }
    }
    let end = pos + 4;
    if end > section.len() {
        return Err(DnsError::MalformedQuestion);
    }
    Ok(end)
}

/// DNS responder bound to its UDP socket.
pub struct DnsServer {
    socket: UdpSocket,
    answer_ip: Ipv4Addr,
    retry_delay: Duration,
}

impl DnsServer {
    /// Bind the responder.
    pub async fn bind(
        addr: SocketAddr,
        answer_ip: Ipv4Addr,
        retry_delay: Duration,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            answer_ip,
            retry_delay,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve queries until `shutdown` is cancelled.
    ///
    /// Receive errors are transient: the loop backs off briefly and retries.
    pub async fn run(self, shutdown: CancellationToken) {
        match self.local_addr() {
            Ok(addr) => info!("DNS server listening on {}, answering {}", addr, self.answer_ip),
            Err(_) => info!("DNS server started, answering {}", self.answer_ip),
        }

        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            let (len, peer) = match received {
                Ok(r) => r,
                Err(e) => {
                    debug!("DNS receive failed: {}", e);
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };

            match build_response(&buf[..len], self.answer_ip) {
                Ok(response) => {
                    if let Err(e) = self.socket.send_to(&response, peer).await {
                        warn!("DNS send to {} failed: {}", peer, e);
                    } else {
                        debug!("DNS query from {} answered with {}", peer, self.answer_ip);
                    }
                }
                Err(e) => warn!("Dropping {}-byte datagram from {}: {}", len, peer, e),
            }
        }

        info!("DNS server shutting down");
    }
}
