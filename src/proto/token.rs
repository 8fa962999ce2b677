//! Byte-level tokens shared by the command and reply codecs.

pub(crate) const CR: u8 = b'\r';
pub(crate) const LF: u8 = b'\n';
pub(crate) const CRLF: &[u8] = b"\r\n";
pub(crate) const CRLF_STR: &str = "\r\n";

/// Command verb literals, in decode precedence order.
///
/// Bare verbs carry their own CRLF so a prefix match frames the whole line.
pub(crate) const HELO: &str = "HELO ";
pub(crate) const EHLO: &str = "EHLO ";
pub(crate) const MAIL_FROM: &str = "MAIL FROM:";
pub(crate) const RCPT_TO: &str = "RCPT TO:";
pub(crate) const DATA: &str = "DATA\r\n";
pub(crate) const RSET: &str = "RSET\r\n";
pub(crate) const STARTTLS: &str = "STARTTLS\r\n";
pub(crate) const NOOP: &str = "NOOP\r\n";
pub(crate) const QUIT: &str = "QUIT\r\n";

/// Position of the first CRLF pair, if any.
pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == CRLF)
}

/// ASCII-case-insensitive prefix match. Non-ASCII bytes only match exactly.
pub(crate) fn starts_with_ignore_ascii_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Lossy UTF-8 rendering of raw line bytes, for error payloads.
pub(crate) fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"250 ok\r\n"), Some(6));
        assert_eq!(find_crlf(b"250 ok\r"), None);
        assert_eq!(find_crlf(b"250 ok\n"), None);
        assert_eq!(find_crlf(b"\r\n"), Some(0));
    }

    #[test]
    fn test_prefix_match_folds_ascii_only() {
        assert!(!starts_with_ignore_ascii_case(b"ehlo mail.local\r\n", HELO.as_bytes()));
        assert!(starts_with_ignore_ascii_case(b"ehlo mail.local\r\n", EHLO.as_bytes()));
        assert!(starts_with_ignore_ascii_case(b"Mail From:<a@b>\r\n", MAIL_FROM.as_bytes()));
        // 0xC9 is not a case variant of anything
        assert!(!starts_with_ignore_ascii_case(b"\xc9HLO x\r\n", EHLO.as_bytes()));
        assert!(!starts_with_ignore_ascii_case(b"HEL", HELO.as_bytes()));
    }
}
