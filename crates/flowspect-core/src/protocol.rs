//! Application protocol tags produced by detection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Application-layer protocol identified for a packet.
///
/// `Tcp`/`Udp` are the transport fallbacks when no application protocol
/// matched; `Unknown` means not even the transport type was available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// No protocol identified.
    #[default]
    Unknown,
    /// DNS, matched by destination port.
    Dns,
    /// HTTP/1.x request or response.
    Http,
    /// TLS record layer (any handshake or application data).
    Tls,
    /// HTTP over TLS. Reserved for hosts that post-classify TLS flows by
    /// port; the detector itself reports [`Protocol::Tls`].
    Https,
    /// QUIC long-header packet.
    Quic,
    /// SSH identification banner.
    Ssh,
    /// FTP command or server banner.
    Ftp,
    /// SMTP command or server banner.
    Smtp,
    /// IMAP greeting or tagged command.
    Imap,
    /// POP3 greeting or command.
    Pop3,
    /// Unrecognized payload on a TCP flow.
    Tcp,
    /// Unrecognized payload on a UDP flow.
    Udp,
}

impl Protocol {
    /// Returns the protocol tag as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Dns => "dns",
            Self::Http => "http",
            Self::Tls => "tls",
            Self::Https => "https",
            Self::Quic => "quic",
            Self::Ssh => "ssh",
            Self::Ftp => "ftp",
            Self::Smtp => "smtp",
            Self::Imap => "imap",
            Self::Pop3 => "pop3",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }

    /// Returns true if this tag can carry a server name the extractors
    /// understand (HTTP `Host:`, TLS SNI).
    pub fn carries_domain(&self) -> bool {
        matches!(self, Self::Http | Self::Tls | Self::Https)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_as_str() {
        assert_eq!(Protocol::Dns.as_str(), "dns");
        assert_eq!(Protocol::Tls.as_str(), "tls");
        assert_eq!(Protocol::Pop3.as_str(), "pop3");
        assert_eq!(Protocol::Unknown.as_str(), "unknown");
    }

    #[test]
    fn protocol_display_matches_as_str() {
        assert_eq!(format!("{}", Protocol::Quic), "quic");
        assert_eq!(format!("{}", Protocol::Http), "http");
    }

    #[test]
    fn protocol_domain_carriers() {
        assert!(Protocol::Http.carries_domain());
        assert!(Protocol::Tls.carries_domain());
        assert!(!Protocol::Ssh.carries_domain());
        assert!(!Protocol::Dns.carries_domain());
    }

    #[test]
    fn protocol_serialization() {
        assert_eq!(serde_json::to_string(&Protocol::Tls).unwrap(), "\"tls\"");
        let back: Protocol = serde_json::from_str("\"quic\"").unwrap();
        assert_eq!(back, Protocol::Quic);
    }
}
