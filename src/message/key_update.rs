use crate::buffer::Buf;
use crate::types::HandshakeType;
use crate::Error;

/// KeyUpdate: `type=0x18 || length(3)=1 || request_update(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUpdate {
    pub update_requested: bool,
}

impl KeyUpdate {
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        match body {
            [0] => Ok(KeyUpdate {
                update_requested: false,
            }),
            [1] => Ok(KeyUpdate {
                update_requested: true,
            }),
            _ => Err(Error::Malformed(format!("Bad KeyUpdate: {:?}", body))),
        }
    }

    /// Full handshake message.
    pub fn to_message(&self) -> Buf {
        Buf::from_slice(&[
            HandshakeType::KeyUpdate.as_u8(),
            0,
            0,
            1,
            self.update_requested as u8,
        ])
    }
}
