//! Mailbox addresses and the HELO/EHLO client identity.

use super::ProtoError;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A parsed `local@domain` mailbox.
///
/// Angle brackets are stripped during parsing and re-added when the
/// address is rendered onto the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    raw: String,
}

impl Address {
    /// Parses a path segment such as `<alice@example.com>` or a bare
    /// `alice@example.com`.
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        let inner = match (s.strip_prefix('<'), s.strip_suffix('>')) {
            (Some(_), Some(_)) => &s[1..s.len() - 1],
            (None, None) => s,
            // one bracket without its partner
            _ => return Err(ProtoError::AddressUnparsable(s.to_string())),
        };

        if inner.bytes().filter(|&b| b == b'@').count() != 1 {
            return Err(ProtoError::AddressUnparsable(s.to_string()));
        }

        Ok(Self {
            raw: inner.to_string(),
        })
    }

    /// The bare `local@domain` form, without angle brackets.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Text before the `@`.
    pub fn local_part(&self) -> &str {
        self.raw.split('@').next().unwrap_or("")
    }

    /// Text after the `@`.
    pub fn domain(&self) -> &str {
        self.raw.split('@').nth(1).unwrap_or("")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.raw)
    }
}

/// The identity a client announces in HELO/EHLO.
///
/// Parsing tries an IPv4 literal, then an IPv6 literal, and otherwise
/// keeps the text as a domain. No further validation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientId {
    /// A hostname such as `mail.example.com`.
    Domain(String),
    /// A dotted-quad literal.
    Ipv4(Ipv4Addr),
    /// A colon-separated literal.
    Ipv6(Ipv6Addr),
}

impl ClientId {
    /// Classifies the raw HELO/EHLO argument.
    pub fn parse(s: &str) -> Self {
        if let Ok(v4) = s.parse::<Ipv4Addr>() {
            return Self::Ipv4(v4);
        }
        if let Ok(v6) = s.parse::<Ipv6Addr>() {
            return Self::Ipv6(v6);
        }
        Self::Domain(s.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(domain) => f.write_str(domain),
            Self::Ipv4(addr) => write!(f, "{addr}"),
            Self::Ipv6(addr) => write!(f, "{addr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_strips_brackets() {
        let addr = Address::parse("<alice@example.com>").unwrap();
        assert_eq!(addr.as_str(), "alice@example.com");
        assert_eq!(addr.local_part(), "alice");
        assert_eq!(addr.domain(), "example.com");
        assert_eq!(addr.to_string(), "<alice@example.com>");
    }

    #[test]
    fn test_address_accepts_bare_form() {
        let addr = Address::parse("bob@example.org").unwrap();
        assert_eq!(addr.to_string(), "<bob@example.org>");
    }

    #[test]
    fn test_address_requires_exactly_one_at() {
        assert!(matches!(
            Address::parse("<no-at-sign>"),
            Err(ProtoError::AddressUnparsable(_))
        ));
        assert!(matches!(
            Address::parse("<a@b@c>"),
            Err(ProtoError::AddressUnparsable(_))
        ));
    }

    #[test]
    fn test_address_rejects_unbalanced_brackets() {
        assert!(matches!(
            Address::parse("<a@b.com"),
            Err(ProtoError::AddressUnparsable(_))
        ));
        assert!(matches!(
            Address::parse("a@b.com>"),
            Err(ProtoError::AddressUnparsable(_))
        ));
        assert!(matches!(
            Address::parse("<"),
            Err(ProtoError::AddressUnparsable(_))
        ));
        assert!(matches!(
            Address::parse("<>"),
            Err(ProtoError::AddressUnparsable(_))
        ));
    }

    #[test]
    fn test_client_id_classification() {
        assert_eq!(
            ClientId::parse("mail.example.com"),
            ClientId::Domain("mail.example.com".to_string())
        );
        assert_eq!(
            ClientId::parse("192.0.2.1"),
            ClientId::Ipv4("192.0.2.1".parse().unwrap())
        );
        assert_eq!(
            ClientId::parse("2001:db8::1"),
            ClientId::Ipv6("2001:db8::1".parse().unwrap())
        );
    }

    #[test]
    fn test_client_id_render() {
        assert_eq!(ClientId::parse("192.0.2.1").to_string(), "192.0.2.1");
        assert_eq!(ClientId::parse("::1").to_string(), "::1");
        assert_eq!(ClientId::parse("test.com").to_string(), "test.com");
    }
}
