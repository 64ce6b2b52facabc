//! Minimal DER tag-length-value reader.
//!
//! Only what is needed to walk an X.509 certificate down to its
//! `SubjectPublicKeyInfo`: single-byte tags and definite lengths in short or
//! long form. Every length is checked against the bytes actually present, so
//! a truncated or lying length surfaces as
//! [`Error::InvalidCertificateStructure`] instead of a wrong-offset read.

use crate::error::Error;

/// Universal `SEQUENCE` (constructed).
pub const TAG_SEQUENCE: u8 = 0x30;
/// Context-specific constructed `[0]`, used for the explicit X.509 version.
pub const TAG_CONTEXT_0: u8 = 0xA0;

/// One complete TLV element borrowed from the underlying buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    raw: &'a [u8],
    header_len: usize,
}

impl<'a> Tlv<'a> {
    /// The value bytes (without tag and length).
    pub fn value(&self) -> &'a [u8] {
        &self.raw[self.header_len..]
    }

    /// The complete encoding: tag, length and value bytes.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// Number of bytes taken by the tag and length octets.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Reader over the value bytes, for descending into constructed types.
    pub fn contents(&self) -> DerReader<'a> {
        DerReader::new(self.value())
    }
}

/// Forward-only cursor over DER bytes.
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Read the next TLV and advance past it.
    pub fn read_tlv(&mut self) -> Result<Tlv<'a>, Error> {
        let start = self.pos;
        let tag = *self
            .buf
            .get(start)
            .ok_or_else(|| structure(format!("unexpected end of input at offset {}", start)))?;
        if tag & 0x1f == 0x1f {
            return Err(structure(format!(
                "multi-byte tag 0x{:02x} at offset {} is not supported",
                tag, start
            )));
        }

        let first = *self
            .buf
            .get(start + 1)
            .ok_or_else(|| structure(format!("missing length octet at offset {}", start + 1)))?;

        let (length, header_len) = if first & 0x80 == 0 {
            (first as usize, 2)
        } else {
            let count = (first & 0x7f) as usize;
            if count == 0 {
                return Err(structure(format!(
                    "indefinite length at offset {} is not valid DER",
                    start + 1
                )));
            }
            if count > std::mem::size_of::<usize>() {
                return Err(structure(format!(
                    "length uses {} octets at offset {}",
                    count,
                    start + 1
                )));
            }
            let octets = self.buf.get(start + 2..start + 2 + count).ok_or_else(|| {
                structure(format!("truncated long-form length at offset {}", start + 1))
            })?;
            // Big-endian accumulation; `count` is bounded so this cannot overflow.
            let length = octets
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | b as usize);
            (length, 2 + count)
        };

        let end = start
            .checked_add(header_len)
            .and_then(|v| v.checked_add(length))
            .ok_or_else(|| structure(format!("length overflow at offset {}", start)))?;
        if end > self.buf.len() {
            return Err(structure(format!(
                "element at offset {} claims {} bytes but only {} remain",
                start,
                length,
                self.buf.len().saturating_sub(start + header_len)
            )));
        }

        self.pos = end;
        Ok(Tlv {
            tag,
            raw: &self.buf[start..end],
            header_len,
        })
    }

    /// Read the next TLV and require its tag to be `tag`.
    pub fn expect_tag(&mut self, tag: u8, what: &str) -> Result<Tlv<'a>, Error> {
        let tlv = self.read_tlv().map_err(|e| context(e, what))?;
        if tlv.tag != tag {
            return Err(structure(format!(
                "expected tag 0x{:02x} for {}, got 0x{:02x}",
                tag, what, tlv.tag
            )));
        }
        Ok(tlv)
    }

    /// Skip the next TLV without interpreting it.
    pub fn skip(&mut self, what: &str) -> Result<(), Error> {
        self.read_tlv().map(|_| ()).map_err(|e| context(e, what))
    }

    /// Skip the next TLV only if it carries `tag`. Returns whether it did.
    pub fn skip_if(&mut self, tag: u8, what: &str) -> Result<bool, Error> {
        if self.peek_tag() == Some(tag) {
            self.skip(what)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

fn structure(message: String) -> Error {
    Error::InvalidCertificateStructure(message)
}

fn context(err: Error, what: &str) -> Error {
    match err {
        Error::InvalidCertificateStructure(msg) => structure(format!("{}: {}", what, msg)),
        other => other,
    }
}
