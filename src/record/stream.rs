use super::{RecordHeader, TlsRecord, MAX_CIPHERTEXT_LEN, RECORD_HEADER_LEN};
use crate::buffer::Buf;
use crate::Error;

/// Reassembles a byte stream into complete records.
///
/// Input may be split anywhere. Partial headers and partial fragments are kept
/// until more bytes arrive.
#[derive(Debug, Default)]
pub struct RecordStream {
    pending: Buf,
}

impl RecordStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `bytes` and dispatch every complete record to `f`, in order.
    ///
    /// Stops at the first error from `f`. The record that failed is consumed,
    /// later records stay buffered.
    pub fn feed<F>(&mut self, bytes: &[u8], mut f: F) -> Result<(), Error>
    where
        F: FnMut(TlsRecord) -> Result<(), Error>,
    {
        self.pending.extend_from_slice(bytes);

        let mut offset = 0;
        let result = loop {
            let available = &self.pending[offset..];
            if available.len() < RECORD_HEADER_LEN {
                break Ok(());
            }

            let header = match RecordHeader::parse(available) {
                Ok((_, h)) => h,
                Err(e) => break Err(e.into()),
            };
            let length = header.length as usize;
            if length > MAX_CIPHERTEXT_LEN {
                break Err(Error::Malformed(format!("Record too large: {}", length)));
            }

            let total = RECORD_HEADER_LEN + length;
            if available.len() < total {
                break Ok(());
            }

            let mut h = [0; RECORD_HEADER_LEN];
            h.copy_from_slice(&available[..RECORD_HEADER_LEN]);
            let record = TlsRecord {
                header: h,
                content: Buf::from_slice(&available[RECORD_HEADER_LEN..total]),
            };
            offset += total;

            trace!("Record: {:?}", record);
            if let Err(e) = f(record) {
                break Err(e);
            }
        };

        self.pending.drain_front(offset);
        result
    }

    /// Number of buffered bytes not yet forming a complete record.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Drop everything buffered.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentType;

    fn stream_bytes() -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&[22, 3, 3, 0, 3, 1, 2, 3]);
        v.extend_from_slice(&[23, 3, 3, 0, 0]);
        v.extend_from_slice(&[21, 3, 3, 0, 2, 1, 0]);
        v.extend_from_slice(&[23, 3, 3, 0, 5, 9, 9, 9, 9, 9]);
        v
    }

    fn collect(chunks: &[&[u8]]) -> Vec<TlsRecord> {
        let mut s = RecordStream::new();
        let mut out = Vec::new();
        for c in chunks {
            s.feed(c, |r| {
                out.push(r);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(s.buffered(), 0);
        out
    }

    #[test]
    fn chunking_does_not_change_dispatch() {
        let bytes = stream_bytes();

        let all = collect(&[&bytes[..]]);
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].content_type(), ContentType::Handshake);
        assert_eq!(&*all[3].content, &[9; 5]);

        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(collect(&singles), all);

        let sevens: Vec<&[u8]> = bytes.chunks(7).collect();
        assert_eq!(collect(&sevens), all);

        let split = bytes.split_at(6);
        assert_eq!(collect(&[split.0, split.1]), all);
    }

    #[test]
    fn partial_waits() {
        let mut s = RecordStream::new();
        let mut n = 0;
        s.feed(&[22, 3], |_| {
            n += 1;
            Ok(())
        })
        .unwrap();
        s.feed(&[3, 0, 2, 1], |_| {
            n += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(n, 0);
        assert_eq!(s.buffered(), 6);

        s.reset();
        assert_eq!(s.buffered(), 0);
    }

    #[test]
    fn oversize_record_is_malformed() {
        let mut s = RecordStream::new();
        let res = s.feed(&[23, 3, 3, 0xff, 0xff], |_| Ok(()));
        assert!(matches!(res, Err(Error::Malformed(_))));
    }

    #[test]
    fn callback_error_keeps_rest() {
        let bytes = stream_bytes();
        let mut s = RecordStream::new();
        let mut seen = 0;
        let res = s.feed(&bytes, |_| {
            seen += 1;
            if seen == 2 {
                return Err(Error::ConnectionEnded);
            }
            Ok(())
        });
        assert_eq!(res, Err(Error::ConnectionEnded));
        assert_eq!(s.buffered(), 7 + 10);
    }
}
