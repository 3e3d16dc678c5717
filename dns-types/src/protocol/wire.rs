//! Serialisation and deserialisation of [`Message`]s. Grounded on the
//! reference resolver's hand-written wire codec (no `trust-dns`/`hickory`
//! dependency is pulled in there, and none is pulled in here either) —
//! reduced to what this crawler's Non-goals leave in scope: no EDNS, no
//! compression on write (outbound messages are always one question, far
//! under any realistic UDP MTU), but full pointer-following decompression on
//! read, since authoritative referral responses lean on it heavily for NS
//! and glue A records.

use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

use super::types::*;
use crate::name::Name;

const MAX_POINTER_HOPS: usize = 32;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum WireError {
    TooShort,
    BadPointer,
    BadLabel,
    UnexpectedEnd,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::TooShort => write!(f, "message too short"),
            WireError::BadPointer => write!(f, "name compression pointer out of range or looping"),
            WireError::BadLabel => write!(f, "malformed label"),
            WireError::UnexpectedEnd => write!(f, "truncated record or section"),
        }
    }
}

impl std::error::Error for WireError {}

pub fn serialise_query(message: &Message) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(64);
    let h = &message.header;
    buf.put_u16(h.id);

    let mut flags: u16 = 0;
    if h.recursion_desired {
        flags |= 0x0100;
    }
    buf.put_u16(flags);

    buf.put_u16(u16::from(message.question.is_some())); // qdcount
    buf.put_u16(0); // ancount
    buf.put_u16(0); // nscount
    buf.put_u16(0); // arcount

    if let Some(q) = &message.question {
        write_name_uncompressed(&mut buf, &q.name);
        buf.put_u16(q.qtype.to_u16());
        buf.put_u16(1); // IN
    }

    buf.to_vec()
}

fn write_name_uncompressed(buf: &mut BytesMut, name: &Name) {
    for label in name.labels() {
        let bytes = label.as_bytes();
        buf.put_u8(bytes.len() as u8);
        buf.put_slice(bytes);
    }
    buf.put_u8(0);
}

pub fn parse_message(data: &[u8]) -> Result<Message, WireError> {
    if data.len() < 12 {
        return Err(WireError::TooShort);
    }
    let id = u16::from_be_bytes([data[0], data[1]]);
    let flags1 = data[2];
    let flags2 = data[3];
    let is_response = flags1 & 0x80 != 0;
    let recursion_desired = flags1 & 0x01 != 0;
    let recursion_available = flags2 & 0x80 != 0;
    let truncated = flags1 & 0x02 != 0;
    let rcode = Rcode::from_u8(flags2 & 0x0f);

    let qdcount = u16::from_be_bytes([data[4], data[5]]) as usize;
    let ancount = u16::from_be_bytes([data[6], data[7]]) as usize;
    let nscount = u16::from_be_bytes([data[8], data[9]]) as usize;
    let arcount = u16::from_be_bytes([data[10], data[11]]) as usize;

    let mut pos = 12usize;
    let mut question = None;
    for _ in 0..qdcount {
        let (name, next) = read_name(data, pos)?;
        pos = next;
        if pos + 4 > data.len() {
            return Err(WireError::UnexpectedEnd);
        }
        let qtype = RecordType::from_u16(u16::from_be_bytes([data[pos], data[pos + 1]]));
        pos += 4; // qtype + qclass
        question = Some(Question { name, qtype });
    }

    let mut answer = Vec::with_capacity(ancount);
    for _ in 0..ancount {
        let (rr, next) = read_rr(data, pos)?;
        pos = next;
        answer.push(rr);
    }
    let mut authority = Vec::with_capacity(nscount);
    for _ in 0..nscount {
        let (rr, next) = read_rr(data, pos)?;
        pos = next;
        authority.push(rr);
    }
    let mut additional = Vec::with_capacity(arcount);
    for _ in 0..arcount {
        let (rr, next) = read_rr(data, pos)?;
        pos = next;
        additional.push(rr);
    }

    Ok(Message {
        header: Header {
            id,
            recursion_desired,
            recursion_available,
            truncated,
            rcode,
            is_response,
        },
        question,
        answer,
        authority,
        additional,
    })
}

fn read_rr(data: &[u8], pos: usize) -> Result<(ResourceRecord, usize), WireError> {
    let (name, pos) = read_name(data, pos)?;
    if pos + 10 > data.len() {
        return Err(WireError::UnexpectedEnd);
    }
    let rtype = RecordType::from_u16(u16::from_be_bytes([data[pos], data[pos + 1]]));
    let ttl = u32::from_be_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
    let rdlength = u16::from_be_bytes([data[pos + 8], data[pos + 9]]) as usize;
    let rdata_start = pos + 10;
    if rdata_start + rdlength > data.len() {
        return Err(WireError::UnexpectedEnd);
    }
    let rdata = &data[rdata_start..rdata_start + rdlength];

    let rtype_with_data = match rtype {
        RecordType::A => {
            if rdata.len() != 4 {
                return Err(WireError::UnexpectedEnd);
            }
            RecordTypeWithData::A {
                address: Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]),
            }
        }
        RecordType::Ns => {
            let (nsdname, _) = read_name(data, rdata_start)?;
            RecordTypeWithData::Ns { nsdname }
        }
        RecordType::Soa => {
            let (mname, next) = read_name(data, rdata_start)?;
            let (rname, _) = read_name(data, next)?;
            RecordTypeWithData::Soa { mname, rname }
        }
        RecordType::Unknown(v) => RecordTypeWithData::Unknown {
            rtype: v,
            octets: rdata.to_vec(),
        },
    };

    Ok((
        ResourceRecord {
            name,
            ttl,
            rtype_with_data,
        },
        rdata_start + rdlength,
    ))
}

/// Reads a (possibly compressed) name starting at `pos`, returning the name
/// and the position just past it in the *original* buffer (pointer targets
/// don't advance this).
fn read_name(data: &[u8], pos: usize) -> Result<(Name, usize), WireError> {
    let mut labels = Vec::new();
    let mut cursor = pos;
    let mut end_of_name: Option<usize> = None;
    let mut hops = 0;

    loop {
        if cursor >= data.len() {
            return Err(WireError::UnexpectedEnd);
        }
        let len = data[cursor];
        if len == 0 {
            cursor += 1;
            if end_of_name.is_none() {
                end_of_name = Some(cursor);
            }
            break;
        } else if len & 0xc0 == 0xc0 {
            if cursor + 1 >= data.len() {
                return Err(WireError::UnexpectedEnd);
            }
            let offset = (((len & 0x3f) as usize) << 8) | data[cursor + 1] as usize;
            if end_of_name.is_none() {
                end_of_name = Some(cursor + 2);
            }
            hops += 1;
            if hops > MAX_POINTER_HOPS || offset >= cursor {
                return Err(WireError::BadPointer);
            }
            cursor = offset;
        } else {
            let len = len as usize;
            let start = cursor + 1;
            let end = start + len;
            if end > data.len() {
                return Err(WireError::BadLabel);
            }
            let label =
                String::from_utf8_lossy(&data[start..end]).to_lowercase();
            labels.push(label);
            cursor = end;
        }
    }

    let joined = if labels.is_empty() {
        ".".to_string()
    } else {
        format!("{}.", labels.join("."))
    };

    Ok((Name::normalize(&joined), end_of_name.unwrap_or(cursor)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_name_uncompressed(buf: &mut Vec<u8>, labels: &[&str]) {
        for label in labels {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0);
    }

    #[test]
    fn query_roundtrips_question_name_and_type() {
        let q = Message::query(
            1234,
            Question {
                name: Name::normalize("example.com."),
                qtype: RecordType::Ns,
            },
        );
        let bytes = serialise_query(&q);
        let parsed = parse_message(&bytes).unwrap();
        assert_eq!(parsed.header.id, 1234);
        assert!(!parsed.header.recursion_desired);
        let question = parsed.question.unwrap();
        assert_eq!(question.name, Name::normalize("example.com."));
        assert_eq!(question.qtype, RecordType::Ns);
    }

    #[test]
    fn read_name_follows_compression_pointer() {
        let mut buf = vec![0u8; 12];
        let base_offset = buf.len();
        encode_name_uncompressed(&mut buf, &["example", "com"]);
        let pointer_offset = buf.len();
        buf.push(0xc0);
        buf.push(base_offset as u8);

        let (name, next) = read_name(&buf, pointer_offset).unwrap();
        assert_eq!(name, Name::normalize("example.com."));
        assert_eq!(next, pointer_offset + 2);
    }

    #[test]
    fn read_name_rejects_self_referential_pointer() {
        let mut buf = vec![0u8; 12];
        let pointer_offset = buf.len();
        buf.push(0xc0);
        buf.push(pointer_offset as u8);
        assert_eq!(read_name(&buf, pointer_offset), Err(WireError::BadPointer));
    }

    #[test]
    fn too_short_message_is_an_error() {
        assert_eq!(parse_message(&[0, 1, 2]), Err(WireError::TooShort));
    }
}
