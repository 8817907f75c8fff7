use nom::number::complete::be_u32;

use crate::util::{u16_prefixed, u8_prefixed};
use crate::Error;

/// NewSessionTicket.
///
/// TLS 1.3: `lifetime(4) || age_add(4) || nonce<1> || ticket<2> || extensions<2>`.
/// TLS 1.2 (RFC 5077): `lifetime(4) || ticket<2>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    /// Lifetime hint in seconds.
    pub lifetime: u32,
    pub age_add: u32,
    pub nonce: Vec<u8>,
    pub ticket: Vec<u8>,
    pub extensions: Vec<u8>,
}

impl NewSessionTicket {
    pub fn parse_tls13(body: &[u8]) -> Result<Self, Error> {
        let (rest, lifetime) = be_u32(body)?;
        let (rest, age_add) = be_u32(rest)?;
        let (rest, nonce) = u8_prefixed(rest)?;
        let (rest, ticket) = u16_prefixed(rest)?;
        let (rest, extensions) = u16_prefixed(rest)?;
        if !rest.is_empty() {
            return Err(Error::Malformed(
                "Trailing bytes after NewSessionTicket".to_string(),
            ));
        }
        if ticket.is_empty() {
            return Err(Error::Malformed("Empty session ticket".to_string()));
        }
        Ok(NewSessionTicket {
            lifetime,
            age_add,
            nonce: nonce.to_vec(),
            ticket: ticket.to_vec(),
            extensions: extensions.to_vec(),
        })
    }

    pub fn parse_tls12(body: &[u8]) -> Result<Self, Error> {
        let (rest, lifetime) = be_u32(body)?;
        let (_, ticket) = u16_prefixed(rest)?;
        Ok(NewSessionTicket {
            lifetime,
            age_add: 0,
            nonce: Vec::new(),
            ticket: ticket.to_vec(),
            extensions: Vec::new(),
        })
    }
}
