//! RFC 1035 wire-format decoder.
//!
//! # DNS Packet Format (RFC 1035)
//!
//! ```text
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! |                      ID                         |  2 bytes
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE    |  2 bytes (flags)
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! |                    QDCOUNT                       |  2 bytes
//! |                    ANCOUNT                       |  2 bytes
//! |                    NSCOUNT                       |  2 bytes
//! |                    ARCOUNT                       |  2 bytes
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! |                   Questions ...                  |
//! |                   Answers ...                    |
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! ```
//!
//! Names use label compression: a length byte with the top two bits clear
//! prefixes a label, a byte with both top bits set starts a two-byte pointer
//! whose low 14 bits are an offset from the start of the message. The decoder
//! guards against pointer cycles by refusing to revisit an offset, so it
//! terminates on every input.
//!
//! The decoder is strict: any structural violation fails the whole parse and
//! no partial message is returned. A syntactically valid query decodes fine;
//! callers that only want responses check [`DnsHeader::is_response`].

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;

/// Size of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// Maximum length of a reassembled name, in wire octets.
const MAX_NAME_LEN: usize = 255;

/// DNS record type: A (IPv4 address).
pub const TYPE_A: u16 = 1;
/// DNS record type: NS.
pub const TYPE_NS: u16 = 2;
/// DNS record type: CNAME.
pub const TYPE_CNAME: u16 = 5;
/// DNS record type: SOA.
pub const TYPE_SOA: u16 = 6;
/// DNS record type: PTR.
pub const TYPE_PTR: u16 = 12;
/// DNS record type: MX.
pub const TYPE_MX: u16 = 15;
/// DNS record type: TXT.
pub const TYPE_TXT: u16 = 16;
/// DNS record type: AAAA (IPv6 address).
pub const TYPE_AAAA: u16 = 28;
/// DNS record type: SRV.
pub const TYPE_SRV: u16 = 33;
/// DNS record class: IN (Internet).
pub const CLASS_IN: u16 = 1;

/// Returns a human-readable name for a record type code.
pub fn record_type_name(rtype: u16) -> String {
    match rtype {
        TYPE_A => "A".to_string(),
        TYPE_NS => "NS".to_string(),
        TYPE_CNAME => "CNAME".to_string(),
        TYPE_SOA => "SOA".to_string(),
        TYPE_PTR => "PTR".to_string(),
        TYPE_MX => "MX".to_string(),
        TYPE_TXT => "TXT".to_string(),
        TYPE_AAAA => "AAAA".to_string(),
        TYPE_SRV => "SRV".to_string(),
        n => format!("TYPE{n}"),
    }
}

/// Decoding failure. Callers on the ingest path treat any variant as
/// "not a DNS message".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DnsParseError {
    /// Packet shorter than the fixed header.
    #[error("packet shorter than the 12-byte header")]
    ShortHeader,

    /// A section or field extends past the end of the packet.
    #[error("message truncated mid-field")]
    Truncated,

    /// A label length byte uses the reserved 01/10 tags.
    #[error("invalid label tag byte {0:#04x}")]
    BadLabel(u8),

    /// A compression pointer targets an offset outside the packet.
    #[error("compression pointer target {0} out of bounds")]
    BadPointer(usize),

    /// A compression pointer chain revisited an offset.
    #[error("compression pointer loop")]
    PointerLoop,

    /// A reassembled name exceeds 255 octets.
    #[error("name longer than 255 octets")]
    NameTooLong,

    /// Rdata length is inconsistent with the record type.
    #[error("rdata length does not match record type {0}")]
    BadRdata(u16),
}

/// Fixed 12-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    /// Transaction id.
    pub id: u16,
    /// Flags word (QR, opcode, AA, TC, RD, RA, RCODE).
    pub flags: u16,
    /// Question count.
    pub qdcount: u16,
    /// Answer record count.
    pub ancount: u16,
    /// Authority record count.
    pub nscount: u16,
    /// Additional record count.
    pub arcount: u16,
}

impl DnsHeader {
    /// True when the QR bit marks this message as a response.
    pub fn is_response(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    /// True when the QR bit marks this message as a query.
    pub fn is_query(&self) -> bool {
        !self.is_response()
    }

    /// True when the TC bit marks this message as truncated.
    pub fn is_truncated(&self) -> bool {
        self.flags & 0x0200 != 0
    }

    /// Opcode field (0 = standard query).
    pub fn opcode(&self) -> u8 {
        ((self.flags >> 11) & 0x0F) as u8
    }

    /// Response code (0 = no error, 3 = NXDOMAIN).
    pub fn rcode(&self) -> u8 {
        (self.flags & 0x000F) as u8
    }
}

/// One entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    /// Queried name, lowercased, labels joined with dots.
    pub name: String,
    /// Query type.
    pub qtype: u16,
    /// Query class.
    pub qclass: u16,
}

/// Typed rdata payload of a resource record.
///
/// Types the inspection pipeline does not interpret are preserved opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    /// IPv4 address.
    A(Ipv4Addr),
    /// IPv6 address.
    Aaaa(Ipv6Addr),
    /// Canonical name target.
    Cname(String),
    /// Pointer target.
    Ptr(String),
    /// Mail exchange.
    Mx {
        /// Exchange preference, lower wins.
        preference: u16,
        /// Exchange host name.
        exchange: String,
    },
    /// Service locator.
    Srv {
        /// Target selection priority.
        priority: u16,
        /// Weight among same-priority targets.
        weight: u16,
        /// Service port.
        port: u16,
        /// Target host name.
        target: String,
    },
    /// Unparsed rdata for any other record type.
    Other(Vec<u8>),
}

impl RData {
    /// Returns the host name this rdata refers to, if any
    /// (CNAME/PTR target, MX exchange, SRV target).
    pub fn referenced_name(&self) -> Option<&str> {
        match self {
            RData::Cname(name) | RData::Ptr(name) => Some(name),
            RData::Mx { exchange, .. } => Some(exchange),
            RData::Srv { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// A resource record from the answer, authority or additional section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Owner name, lowercased.
    pub name: String,
    /// Record type code.
    pub rtype: u16,
    /// Record class.
    pub class: u16,
    /// Time to live in seconds.
    pub ttl: u32,
    /// Typed payload.
    pub rdata: RData,
}

impl DnsRecord {
    /// IPv4 address for an A record.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match self.rdata {
            RData::A(addr) => Some(addr),
            _ => None,
        }
    }

    /// IPv6 address for an AAAA record.
    pub fn ipv6(&self) -> Option<Ipv6Addr> {
        match self.rdata {
            RData::Aaaa(addr) => Some(addr),
            _ => None,
        }
    }
}

/// A fully decoded DNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    /// Fixed header.
    pub header: DnsHeader,
    /// Question section.
    pub questions: Vec<DnsQuestion>,
    /// Answer section.
    pub answers: Vec<DnsRecord>,
    /// Authority section.
    pub authorities: Vec<DnsRecord>,
    /// Additional section.
    pub additionals: Vec<DnsRecord>,
}

impl DnsMessage {
    /// Decodes a message from wire format.
    ///
    /// All four section counts must be backed by bytes; short buffers, bad
    /// compression and rdata/type mismatches fail the whole parse.
    pub fn parse(packet: &[u8]) -> Result<Self, DnsParseError> {
        if packet.len() < HEADER_LEN {
            return Err(DnsParseError::ShortHeader);
        }

        let header = DnsHeader {
            id: read_u16(packet, 0)?,
            flags: read_u16(packet, 2)?,
            qdcount: read_u16(packet, 4)?,
            ancount: read_u16(packet, 6)?,
            nscount: read_u16(packet, 8)?,
            arcount: read_u16(packet, 10)?,
        };

        let mut pos = HEADER_LEN;

        let mut questions = Vec::new();
        for _ in 0..header.qdcount {
            let (question, next) = read_question(packet, pos)?;
            questions.push(question);
            pos = next;
        }

        let answers = read_records(packet, &mut pos, header.ancount)?;
        let authorities = read_records(packet, &mut pos, header.nscount)?;
        let additionals = read_records(packet, &mut pos, header.arcount)?;

        Ok(DnsMessage {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// First question of the message, the one resolvers key caches on.
    pub fn first_question(&self) -> Option<&DnsQuestion> {
        self.questions.first()
    }

    /// Smallest TTL across the answer section.
    pub fn min_answer_ttl(&self) -> Option<u32> {
        self.answers.iter().map(|r| r.ttl).min()
    }

    /// True when the answer section carries at least one A or AAAA record.
    pub fn has_address_answer(&self) -> bool {
        self.answers
            .iter()
            .any(|r| matches!(r.rdata, RData::A(_) | RData::Aaaa(_)))
    }
}

fn read_u16(packet: &[u8], pos: usize) -> Result<u16, DnsParseError> {
    packet
        .get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(DnsParseError::Truncated)
}

fn read_u32(packet: &[u8], pos: usize) -> Result<u32, DnsParseError> {
    packet
        .get(pos..pos + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(DnsParseError::Truncated)
}

/// Reads a possibly-compressed name starting at `start`.
///
/// Returns the lowercased dotted name and the offset just past the name's
/// in-place bytes (after the first pointer, or after the root label).
fn read_name(packet: &[u8], start: usize) -> Result<(String, usize), DnsParseError> {
    let mut name = String::new();
    let mut wire_len = 0usize;
    let mut pos = start;
    // Offset to resume at once the first pointer has been followed.
    let mut resume: Option<usize> = None;
    let mut visited: Vec<usize> = Vec::new();

    loop {
        let tag = *packet.get(pos).ok_or(DnsParseError::Truncated)?;
        match tag & 0xC0 {
            0x00 => {
                let len = tag as usize;
                if len == 0 {
                    pos += 1;
                    break;
                }
                wire_len += len + 1;
                if wire_len > MAX_NAME_LEN {
                    return Err(DnsParseError::NameTooLong);
                }
                let label = packet
                    .get(pos + 1..pos + 1 + len)
                    .ok_or(DnsParseError::Truncated)?;
                if !name.is_empty() {
                    name.push('.');
                }
                for &byte in label {
                    name.push(byte.to_ascii_lowercase() as char);
                }
                pos += 1 + len;
            }
            0xC0 => {
                let low = *packet.get(pos + 1).ok_or(DnsParseError::Truncated)?;
                let target = (((tag & 0x3F) as usize) << 8) | low as usize;
                if target >= packet.len() {
                    return Err(DnsParseError::BadPointer(target));
                }
                if visited.contains(&target) {
                    return Err(DnsParseError::PointerLoop);
                }
                visited.push(target);
                if resume.is_none() {
                    resume = Some(pos + 2);
                }
                pos = target;
            }
            _ => return Err(DnsParseError::BadLabel(tag)),
        }
    }

    Ok((name, resume.unwrap_or(pos)))
}

fn read_records(
    packet: &[u8],
    pos: &mut usize,
    count: u16,
) -> Result<Vec<DnsRecord>, DnsParseError> {
    let mut records = Vec::new();
    for _ in 0..count {
        let (record, next) = read_record(packet, *pos)?;
        records.push(record);
        *pos = next;
    }
    Ok(records)
}

fn read_question(packet: &[u8], pos: usize) -> Result<(DnsQuestion, usize), DnsParseError> {
    let (name, pos) = read_name(packet, pos)?;
    let qtype = read_u16(packet, pos)?;
    let qclass = read_u16(packet, pos + 2)?;
    Ok((
        DnsQuestion {
            name,
            qtype,
            qclass,
        },
        pos + 4,
    ))
}

fn read_record(packet: &[u8], pos: usize) -> Result<(DnsRecord, usize), DnsParseError> {
    let (name, pos) = read_name(packet, pos)?;
    let rtype = read_u16(packet, pos)?;
    let class = read_u16(packet, pos + 2)?;
    let ttl = read_u32(packet, pos + 4)?;
    let rdlength = read_u16(packet, pos + 8)? as usize;
    let rdata_start = pos + 10;
    let rdata_end = rdata_start + rdlength;
    if rdata_end > packet.len() {
        return Err(DnsParseError::Truncated);
    }

    let rdata = match rtype {
        TYPE_A => {
            if rdlength != 4 {
                return Err(DnsParseError::BadRdata(rtype));
            }
            let b = &packet[rdata_start..rdata_end];
            RData::A(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
        }
        TYPE_AAAA => {
            if rdlength != 16 {
                return Err(DnsParseError::BadRdata(rtype));
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&packet[rdata_start..rdata_end]);
            RData::Aaaa(Ipv6Addr::from(octets))
        }
        TYPE_CNAME | TYPE_PTR => {
            let (target, end) = read_name(packet, rdata_start)?;
            if end != rdata_end {
                return Err(DnsParseError::BadRdata(rtype));
            }
            if rtype == TYPE_CNAME {
                RData::Cname(target)
            } else {
                RData::Ptr(target)
            }
        }
        TYPE_MX => {
            if rdlength < 3 {
                return Err(DnsParseError::BadRdata(rtype));
            }
            let preference = read_u16(packet, rdata_start)?;
            let (exchange, end) = read_name(packet, rdata_start + 2)?;
            if end != rdata_end {
                return Err(DnsParseError::BadRdata(rtype));
            }
            RData::Mx {
                preference,
                exchange,
            }
        }
        TYPE_SRV => {
            if rdlength < 7 {
                return Err(DnsParseError::BadRdata(rtype));
            }
            let priority = read_u16(packet, rdata_start)?;
            let weight = read_u16(packet, rdata_start + 2)?;
            let port = read_u16(packet, rdata_start + 4)?;
            let (target, end) = read_name(packet, rdata_start + 6)?;
            if end != rdata_end {
                return Err(DnsParseError::BadRdata(rtype));
            }
            RData::Srv {
                priority,
                weight,
                port,
                target,
            }
        }
        _ => RData::Other(packet[rdata_start..rdata_end].to_vec()),
    };

    Ok((
        DnsRecord {
            name,
            rtype,
            class,
            ttl,
            rdata,
        },
        rdata_end,
    ))
}

// =============================================================================
// Tests
// =============================================================================
