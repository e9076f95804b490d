//! Wake-on-LAN magic packets.
//!
//! A magic packet is six `0xFF` bytes followed by the target's hardware
//! address repeated sixteen times, sent as a UDP broadcast.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::str::FromStr;

use tracing::debug;

/// Conventional discard port used for magic packets.
const WOL_PORT: u16 = 9;

const PACKET_LEN: usize = 6 + 16 * 6;

#[derive(Debug, thiserror::Error)]
pub enum WakeError {
    #[error("invalid MAC address `{0}`")]
    InvalidMac(String),

    #[error("cannot send magic packet: {0}")]
    Io(#[from] std::io::Error),
}

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Build the 102-byte magic packet for this address.
    pub fn magic_packet(&self) -> [u8; PACKET_LEN] {
        let mut packet = [0xFF; PACKET_LEN];
        for chunk in packet[6..].chunks_exact_mut(6) {
            chunk.copy_from_slice(&self.0);
        }
        packet
    }
}

impl FromStr for MacAddress {
    type Err = WakeError;

    /// Accepts `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WakeError::InvalidMac(s.to_string());

        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (octet, part) in octets.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Sends magic packets for one target address.
#[derive(Debug, Clone)]
pub struct WakeOnLan {
    mac: MacAddress,
    target: SocketAddr,
}

impl WakeOnLan {
    pub fn new(mac: MacAddress) -> Self {
        Self {
            mac,
            target: SocketAddr::from((Ipv4Addr::BROADCAST, WOL_PORT)),
        }
    }

    /// Send to a specific address instead of the limited broadcast.
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    /// Send a single magic packet.
    pub fn send(&self) -> Result<(), WakeError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;
        let packet = self.mac.magic_packet();
        socket.send_to(&packet, self.target)?;
        debug!("Sent wake-on-LAN packet for {} to {}", self.mac, self.target);
        Ok(())
    }
}
