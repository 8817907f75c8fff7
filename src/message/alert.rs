use crate::buffer::Buf;
use crate::types::{AlertDescription, AlertLevel};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn fatal(description: AlertDescription) -> Self {
        Alert {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn close_notify() -> Self {
        Alert {
            level: AlertLevel::Warning,
            description: AlertDescription::CloseNotify,
        }
    }

    pub fn parse(content: &[u8]) -> Result<Self, Error> {
        match content {
            [level, description] => Ok(Alert {
                level: AlertLevel::from_u8(*level),
                description: AlertDescription::from_u8(*description),
            }),
            _ => Err(Error::Malformed(format!(
                "Alert of {} bytes",
                content.len()
            ))),
        }
    }

    pub fn to_bytes(&self) -> Buf {
        Buf::from_slice(&[self.level.as_u8(), self.description.as_u8()])
    }

    /// Whether the alert ends the connection.
    ///
    /// close_notify ends it cleanly, any other warning is only logged.
    pub fn is_terminal(&self) -> bool {
        self.level != AlertLevel::Warning || self.description == AlertDescription::CloseNotify
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_classify() {
        let a = Alert::parse(&[2, 40]).unwrap();
        assert_eq!(a, Alert::fatal(AlertDescription::HandshakeFailure));
        assert!(a.is_terminal());

        let a = Alert::parse(&[1, 0]).unwrap();
        assert_eq!(a, Alert::close_notify());
        assert!(a.is_terminal());

        let a = Alert::parse(&[1, 112]).unwrap();
        assert!(!a.is_terminal());

        assert!(Alert::parse(&[1]).is_err());
        assert_eq!(&*Alert::close_notify().to_bytes(), &[1, 0]);
    }
}
