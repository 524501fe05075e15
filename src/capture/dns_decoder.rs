use crate::capture::packet::DnsInfo;

pub const DNS_PORT: u16 = 53;

const HEADER_LEN: usize = 12;
const MAX_POINTER_JUMPS: usize = 16;
const MAX_RECORDS: usize = 256;

/// Decode a DNS message carried over UDP.
///
/// Returns `None` for anything that does not parse as a DNS header plus its
/// question section. Answer records that fail to parse are dropped, the
/// questions decoded so far are kept.
pub fn decode_udp(payload: &[u8]) -> Option<DnsInfo> {
    decode_message(payload)
}

/// Decode a DNS message carried over TCP (two byte length prefix).
pub fn decode_tcp(payload: &[u8]) -> Option<DnsInfo> {
    if payload.len() < 2 {
        return None;
    }
    let declared = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let body = &payload[2..];
    decode_message(&body[..declared.min(body.len())])
}

fn decode_message(msg: &[u8]) -> Option<DnsInfo> {
    if msg.len() < HEADER_LEN {
        return None;
    }

    let flags = read_u16(msg, 2)?;
    let qdcount = read_u16(msg, 4)? as usize;
    let ancount = read_u16(msg, 6)? as usize;

    let mut info = DnsInfo {
        is_response: flags & 0x8000 != 0,
        opcode: opcode_name((flags >> 11) & 0x0f),
        questions: Vec::new(),
        answers: Vec::new(),
        response_code: response_code_name(flags & 0x0f),
    };

    let mut offset = HEADER_LEN;
    for _ in 0..qdcount.min(MAX_RECORDS) {
        let (name, next) = read_name(msg, offset)?;
        // qtype + qclass
        offset = next.checked_add(4).filter(|end| *end <= msg.len())?;
        info.questions.push(name);
    }

    for _ in 0..ancount.min(MAX_RECORDS) {
        let Some((name, next)) = read_name(msg, offset) else {
            break;
        };
        // type, class, ttl, rdlength
        let Some(rdlength) = read_u16(msg, next + 8) else {
            break;
        };
        let end = next + 10 + rdlength as usize;
        if end > msg.len() {
            break;
        }
        info.answers.push(name);
        offset = end;
    }

    Some(info)
}

fn read_u16(buf: &[u8], at: usize) -> Option<u16> {
    let bytes = buf.get(at..at + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a possibly compressed domain name. Returns the dotted name and the
/// offset just past the name in the original position.
fn read_name(msg: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = start;
    let mut resume_at = None;
    let mut jumps = 0;

    loop {
        let len = *msg.get(pos)? as usize;
        match len & 0xc0 {
            0x00 => {
                if len == 0 {
                    pos += 1;
                    break;
                }
                let label = msg.get(pos + 1..pos + 1 + len)?;
                labels.push(String::from_utf8_lossy(label).into_owned());
                pos += 1 + len;
            }
            0xc0 => {
                let low = *msg.get(pos + 1)? as usize;
                if resume_at.is_none() {
                    resume_at = Some(pos + 2);
                }
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return None;
                }
                pos = ((len & 0x3f) << 8) | low;
            }
            _ => return None,
        }
    }

    Some((labels.join("."), resume_at.unwrap_or(pos)))
}

fn opcode_name(code: u16) -> String {
    match code {
        0 => "Query".to_string(),
        1 => "IQuery".to_string(),
        2 => "Status".to_string(),
        4 => "Notify".to_string(),
        5 => "Update".to_string(),
        other => format!("Unknown({})", other),
    }
}

fn response_code_name(code: u16) -> String {
    match code {
        0 => "No Error".to_string(),
        1 => "Format Error".to_string(),
        2 => "Server Failure".to_string(),
        3 => "Non-Existent Domain".to_string(),
        4 => "Not Implemented".to_string(),
        5 => "Query Refused".to_string(),
        other => format!("Unknown({})", other),
    }
}
