//! SMTP reply model and the multi-line group codec.

use super::token::{self, CRLF, CRLF_STR};
use super::{ProtoError, MAX_REPLY_LENGTH};
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

/// First digit of a reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 2yz: the requested action completed.
    PositiveCompletion,
    /// 3yz: more input is expected.
    PositiveIntermediate,
    /// 4yz: transient failure, retry later.
    TransientNegative,
    /// 5yz: permanent failure.
    PermanentNegative,
}

impl Severity {
    fn from_digit(byte: u8) -> Option<Self> {
        match byte {
            b'2' => Some(Self::PositiveCompletion),
            b'3' => Some(Self::PositiveIntermediate),
            b'4' => Some(Self::TransientNegative),
            b'5' => Some(Self::PermanentNegative),
            _ => None,
        }
    }

    const fn digit(self) -> u8 {
        match self {
            Self::PositiveCompletion => 2,
            Self::PositiveIntermediate => 3,
            Self::TransientNegative => 4,
            Self::PermanentNegative => 5,
        }
    }
}

/// Second digit of a reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// x0z: syntax.
    Syntax,
    /// x1z: informational replies.
    Information,
    /// x2z: the transmission channel.
    Connections,
    /// x3z: unassigned.
    Unspecified3,
    /// x4z: unassigned.
    Unspecified4,
    /// x5z: the mail system.
    MailSystem,
}

impl Category {
    fn from_digit(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(Self::Syntax),
            b'1' => Some(Self::Information),
            b'2' => Some(Self::Connections),
            b'3' => Some(Self::Unspecified3),
            b'4' => Some(Self::Unspecified4),
            b'5' => Some(Self::MailSystem),
            _ => None,
        }
    }

    const fn digit(self) -> u8 {
        match self {
            Self::Syntax => 0,
            Self::Information => 1,
            Self::Connections => 2,
            Self::Unspecified3 => 3,
            Self::Unspecified4 => 4,
            Self::MailSystem => 5,
        }
    }
}

/// A structured three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code {
    /// Outcome class.
    pub severity: Severity,
    /// Functional grouping.
    pub category: Category,
    /// Third digit, `0..=9`.
    pub detail: u8,
}

impl Code {
    /// 220, sent as the connection greeting.
    pub const SERVICE_READY: Self =
        Self::new(Severity::PositiveCompletion, Category::Connections, 0);
    /// 221, sent in response to QUIT.
    pub const CLOSING: Self = Self::new(Severity::PositiveCompletion, Category::Connections, 1);
    /// 250, the generic success reply.
    pub const OK: Self = Self::new(Severity::PositiveCompletion, Category::MailSystem, 0);
    /// 354, sent in response to DATA.
    pub const START_MAIL_INPUT: Self =
        Self::new(Severity::PositiveIntermediate, Category::MailSystem, 4);

    /// Builds a code from its three digits.
    pub const fn new(severity: Severity, category: Category, detail: u8) -> Self {
        Self {
            severity,
            category,
            detail,
        }
    }

    /// The numeric form, e.g. 250.
    pub fn as_u16(self) -> u16 {
        u16::from(self.severity.digit()) * 100
            + u16::from(self.category.digit()) * 10
            + u16::from(self.detail)
    }

    /// True for any 2yz code.
    pub fn is_positive_completion(self) -> bool {
        self.severity == Severity::PositiveCompletion
    }

    pub(crate) fn parse(line: &[u8]) -> Result<Self, ProtoError> {
        let digits = line
            .get(..3)
            .ok_or_else(|| ProtoError::ReplyCodeUnparsable(token::lossy(line)))?;
        let unparsable = || ProtoError::ReplyCodeUnparsable(token::lossy(&line[..3]));

        let severity = Severity::from_digit(digits[0]).ok_or_else(unparsable)?;
        let category = Category::from_digit(digits[1]).ok_or_else(unparsable)?;
        if !digits[2].is_ascii_digit() {
            return Err(unparsable());
        }

        Ok(Self {
            severity,
            category,
            detail: digits[2] - b'0',
        })
    }

    fn put(self, dst: &mut BytesMut) {
        dst.put_slice(&[
            self.severity.digit() + b'0',
            self.category.digit() + b'0',
            self.detail + b'0',
        ]);
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A complete reply group: one code plus the text of every line.
///
/// `message` is the concatenation of each line's post-code text followed
/// by CRLF, so a two-line 250 group reads `"first\r\nsecond\r\n"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The group's shared code.
    pub code: Code,
    /// CRLF-delimited per-line text.
    pub message: String,
}

impl Reply {
    /// Builds a reply from a code and CRLF-delimited text.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Decodes one reply group from the front of `src`.
    ///
    /// Consumes bytes only on success; `ProtoError::Incomplete` means the
    /// terminal line has not arrived yet and the cursor is untouched.
    pub fn decode(src: &mut BytesMut) -> Result<Self, ProtoError> {
        if src.is_empty() {
            return Err(ProtoError::BytesNotFound);
        }

        let data = &src[..];
        let mut code = None;
        let mut message = String::new();
        let mut consumed = 0usize;

        loop {
            let Some(pos) = token::find_crlf(&data[consumed..]) else {
                return Err(ProtoError::Incomplete);
            };
            let line = &data[consumed..consumed + pos];
            consumed += pos + CRLF.len();
            if consumed > MAX_REPLY_LENGTH {
                return Err(ProtoError::ReplyTooLong);
            }

            let current = Code::parse(line)?;
            match code {
                None => code = Some(current),
                Some(first) if first != current => {
                    return Err(ProtoError::ReplyCodesDiffer(first, current));
                }
                Some(_) => {}
            }

            message.push_str(&String::from_utf8_lossy(line.get(4..).unwrap_or(b"")));
            message.push_str(CRLF_STR);

            match line.get(3).copied() {
                Some(b' ') => break,
                Some(b'-') => {}
                other => {
                    return Err(ProtoError::ReplySignBad(
                        other.map(char::from).unwrap_or('\0'),
                    ));
                }
            }
        }

        let code = code.ok_or(ProtoError::Incomplete)?;
        src.advance(consumed);
        Ok(Self { code, message })
    }

    /// Encodes the group, mirroring the decoder's line shape byte for byte.
    pub fn encode(&self, dst: &mut BytesMut) {
        let segments: Vec<&str> = self
            .message
            .split(CRLF_STR)
            .filter(|segment| !segment.is_empty())
            .collect();

        if segments.is_empty() {
            self.code.put(dst);
            dst.put_u8(b' ');
            dst.put_slice(CRLF);
            return;
        }

        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            self.code.put(dst);
            dst.put_u8(if i == last { b' ' } else { b'-' });
            dst.put_slice(segment.as_bytes());
            dst.put_slice(CRLF);
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(bytes: &[u8]) -> BytesMut {
        BytesMut::from(bytes)
    }

    #[test]
    fn test_decode_single_line() {
        let mut src = buf(b"250 OK\r\n");
        let reply = Reply::decode(&mut src).unwrap();
        assert_eq!(reply.code, Code::OK);
        assert_eq!(reply.message, "OK\r\n");
        assert!(src.is_empty());
    }

    #[test]
    fn test_decode_multi_line_group() {
        let mut src = buf(b"221-hello\r\n221 world\r\n");
        let reply = Reply::decode(&mut src).unwrap();
        assert_eq!(reply.code, Code::CLOSING);
        assert_eq!(reply.message, "hello\r\nworld\r\n");
        assert!(src.is_empty());
    }

    #[test]
    fn test_decode_consumes_exactly_one_group() {
        let mut src = buf(b"250 a\r\n250 b\r\n");
        let first = Reply::decode(&mut src).unwrap();
        assert_eq!(first.message, "a\r\n");
        let second = Reply::decode(&mut src).unwrap();
        assert_eq!(second.message, "b\r\n");
        assert!(src.is_empty());
    }

    #[test]
    fn test_incomplete_without_terminal_line() {
        let mut src = buf(b"250-more to come\r\n");
        assert_eq!(Reply::decode(&mut src), Err(ProtoError::Incomplete));
        // cursor untouched
        assert_eq!(&src[..], b"250-more to come\r\n");
    }

    #[test]
    fn test_incomplete_without_crlf() {
        let mut src = buf(b"250 OK");
        assert_eq!(Reply::decode(&mut src), Err(ProtoError::Incomplete));
        assert_eq!(src.len(), 6);
    }

    #[test]
    fn test_empty_buffer() {
        let mut src = BytesMut::new();
        assert_eq!(Reply::decode(&mut src), Err(ProtoError::BytesNotFound));
    }

    #[test]
    fn test_codes_must_agree_across_group() {
        let mut src = buf(b"221-a\r\n220 b\r\n");
        assert_eq!(
            Reply::decode(&mut src),
            Err(ProtoError::ReplyCodesDiffer(
                Code::CLOSING,
                Code::SERVICE_READY
            ))
        );
    }

    #[test]
    fn test_bad_continuation_sign() {
        let mut src = buf(b"250?nope\r\n");
        assert_eq!(Reply::decode(&mut src), Err(ProtoError::ReplySignBad('?')));
    }

    #[test]
    fn test_unparsable_code() {
        let mut src = buf(b"nope\r\n");
        assert!(matches!(
            Reply::decode(&mut src),
            Err(ProtoError::ReplyCodeUnparsable(_))
        ));

        // 6yz is outside the severity range
        let mut src = buf(b"650 odd\r\n");
        assert!(matches!(
            Reply::decode(&mut src),
            Err(ProtoError::ReplyCodeUnparsable(_))
        ));
    }

    #[test]
    fn test_group_too_long() {
        let mut long = Vec::new();
        while long.len() <= MAX_REPLY_LENGTH {
            long.extend_from_slice(b"250-");
            long.extend_from_slice(&[b'x'; 96]);
            long.extend_from_slice(b"\r\n");
        }
        long.extend_from_slice(b"250 end\r\n");
        let mut src = BytesMut::from(&long[..]);
        assert_eq!(Reply::decode(&mut src), Err(ProtoError::ReplyTooLong));
    }

    #[test]
    fn test_encode_single_line() {
        let mut dst = BytesMut::new();
        Reply::new(Code::OK, "OK\r\n").encode(&mut dst);
        assert_eq!(&dst[..], b"250 OK\r\n");
    }

    #[test]
    fn test_encode_multi_line() {
        let mut dst = BytesMut::new();
        Reply::new(Code::CLOSING, "hello\r\nworld\r\n").encode(&mut dst);
        assert_eq!(&dst[..], b"221-hello\r\n221 world\r\n");
    }

    #[test]
    fn test_round_trip() {
        let original = Reply::new(Code::OK, "mx.example.com\r\nSIZE 1000\r\nSMTPUTF8\r\n");
        let mut wire = BytesMut::new();
        original.encode(&mut wire);
        let decoded = Reply::decode(&mut wire).unwrap();
        assert_eq!(decoded, original);
        assert!(wire.is_empty());
    }

    #[test]
    fn test_code_display_and_value() {
        assert_eq!(Code::SERVICE_READY.as_u16(), 220);
        assert_eq!(Code::CLOSING.as_u16(), 221);
        assert_eq!(Code::OK.to_string(), "250");
        assert_eq!(Code::START_MAIL_INPUT.as_u16(), 354);
        assert!(Code::OK.is_positive_completion());
        assert!(!Code::START_MAIL_INPUT.is_positive_completion());
    }
}
