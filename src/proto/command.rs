//! SMTP command model: typed variants, argument records, and the line codec.

use super::address::{Address, ClientId};
use super::token::{self, CR, CRLF, LF};
use super::{ProtoError, MAX_COMMAND_LINE, MIN_COMMAND_LINE};
use bytes::{BufMut, Bytes, BytesMut};

/// BODY= transport encoding declared on MAIL FROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    /// Plain seven-bit ASCII.
    SevenBit,
    /// 8BITMIME content.
    EightBitMime,
    /// BINARYMIME content (requires CHUNKING).
    BinaryMime,
}

impl BodyType {
    fn parse(value: &str) -> Result<Self, ProtoError> {
        match value.to_ascii_uppercase().as_str() {
            "7BIT" => Ok(Self::SevenBit),
            "8BITMIME" => Ok(Self::EightBitMime),
            "BINARYMIME" => Ok(Self::BinaryMime),
            _ => Err(ProtoError::MimeUnsupported(value.to_string())),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7BIT",
            Self::EightBitMime => "8BITMIME",
            Self::BinaryMime => "BINARYMIME",
        }
    }
}

/// RET= scope of a requested delivery status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsnRet {
    /// Return the full message.
    Full,
    /// Return headers only.
    Hdrs,
}

impl DsnRet {
    fn parse(value: &str) -> Result<Self, ProtoError> {
        match value.to_ascii_uppercase().as_str() {
            "FULL" => Ok(Self::Full),
            "HDRS" => Ok(Self::Hdrs),
            _ => Err(ProtoError::RetUnsupported(value.to_string())),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Hdrs => "HDRS",
        }
    }
}

/// MAIL FROM argument record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailFromArgs {
    /// Envelope sender.
    pub reverse_path: Address,
    /// Optional BODY= declaration.
    pub mime: Option<BodyType>,
    /// Optional SIZE= declaration.
    pub size: Option<u64>,
    /// Optional ENVID= opaque envelope identifier.
    pub envelope_id: Option<String>,
    /// Optional RET= DSN scope.
    pub ret: Option<DsnRet>,
    /// Whether SMTPUTF8 was requested.
    pub use_smtputf8: bool,
}

impl MailFromArgs {
    /// Plain reverse path with no options.
    pub fn new(reverse_path: Address) -> Self {
        Self {
            reverse_path,
            mime: None,
            size: None,
            envelope_id: None,
            ret: None,
            use_smtputf8: false,
        }
    }
}

/// The DSN events a sender can subscribe to per recipient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifySet {
    /// NOTIFY=SUCCESS
    pub success: bool,
    /// NOTIFY=FAILURE
    pub failure: bool,
    /// NOTIFY=DELAY
    pub delay: bool,
}

impl NotifySet {
    fn is_empty(self) -> bool {
        !(self.success || self.failure || self.delay)
    }
}

/// NOTIFY= request: either never, or a non-empty event set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    /// Suppress all notifications.
    Never,
    /// Notify on the given events.
    On(NotifySet),
}

/// ORCPT= original recipient: an address-type label plus the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalRecipient {
    /// Address type label, e.g. `rfc822`.
    pub addr_type: String,
    /// The original forward path.
    pub address: Address,
}

/// RCPT TO argument record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcptToArgs {
    /// Envelope recipient.
    pub forward_path: Address,
    /// Optional ORCPT= original recipient.
    pub original_forward_path: Option<OriginalRecipient>,
    /// Optional NOTIFY= request.
    pub notify: Option<Notify>,
}

impl RcptToArgs {
    /// Plain forward path with no options.
    pub fn new(forward_path: Address) -> Self {
        Self {
            forward_path,
            original_forward_path: None,
            notify: None,
        }
    }
}

/// One SMTP command with its typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO, the pre-extension greeting.
    Helo(ClientId),
    /// EHLO, the extended greeting.
    Ehlo(ClientId),
    /// MAIL FROM, opening a transaction.
    MailFrom(MailFromArgs),
    /// RCPT TO, adding a recipient.
    RcptTo(RcptToArgs),
    /// DATA, starting message transfer.
    Data,
    /// RSET, aborting the transaction.
    Rset,
    /// STARTTLS, requesting a TLS upgrade.
    StartTls,
    /// NOOP.
    Noop,
    /// QUIT.
    Quit,
}

type ArgParser = fn(&str) -> Result<Command, ProtoError>;

/// Decode precedence table: first matching prefix wins.
const VERB_TABLE: &[(&str, ArgParser)] = &[
    (token::HELO, parse_helo),
    (token::EHLO, parse_ehlo),
    (token::MAIL_FROM, parse_mail_from),
    (token::RCPT_TO, parse_rcpt_to),
    (token::DATA, |_| Ok(Command::Data)),
    (token::RSET, |_| Ok(Command::Rset)),
    (token::STARTTLS, |_| Ok(Command::StartTls)),
    (token::NOOP, |_| Ok(Command::Noop)),
    (token::QUIT, |_| Ok(Command::Quit)),
];

impl Command {
    /// Decodes one command line from the front of `src`.
    ///
    /// Consumes the line on a successful frame; `ProtoError::Incomplete`
    /// leaves the cursor untouched.
    pub fn decode(src: &mut BytesMut) -> Result<Self, ProtoError> {
        if src.is_empty() {
            return Err(ProtoError::BytesNotFound);
        }

        let Some(lf) = src.iter().position(|&b| b == LF) else {
            return Err(ProtoError::Incomplete);
        };
        if lf == 0 || src[lf - 1] != CR {
            return Err(ProtoError::CrlfNotFound);
        }

        let len = lf + 1;
        if len < MIN_COMMAND_LINE {
            return Err(ProtoError::CommandTooShort(token::lossy(&src[..len])));
        }
        if len > MAX_COMMAND_LINE {
            return Err(ProtoError::CommandTooLong);
        }

        let line = src.split_to(len);
        for (verb, parse_args) in VERB_TABLE {
            if token::starts_with_ignore_ascii_case(&line, verb.as_bytes()) {
                let rest = &line[verb.len()..];
                let rest = rest.strip_suffix(CRLF).unwrap_or(rest);
                return parse_args(&String::from_utf8_lossy(rest));
            }
        }
        Err(ProtoError::CommandUnknown(token::lossy(&line)))
    }

    /// Encodes the command, CRLF included.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtoError> {
        match self {
            Self::Helo(id) => put_greeting(dst, token::HELO, id),
            Self::Ehlo(id) => put_greeting(dst, token::EHLO, id),
            Self::MailFrom(args) => put_mail_from(dst, args),
            Self::RcptTo(args) => put_rcpt_to(dst, args),
            Self::Data => Ok(dst.put_slice(token::DATA.as_bytes())),
            Self::Rset => Ok(dst.put_slice(token::RSET.as_bytes())),
            Self::StartTls => Ok(dst.put_slice(token::STARTTLS.as_bytes())),
            Self::Noop => Ok(dst.put_slice(token::NOOP.as_bytes())),
            Self::Quit => Ok(dst.put_slice(token::QUIT.as_bytes())),
        }
    }
}

fn parse_helo(rest: &str) -> Result<Command, ProtoError> {
    Ok(Command::Helo(ClientId::parse(rest)))
}

fn parse_ehlo(rest: &str) -> Result<Command, ProtoError> {
    Ok(Command::Ehlo(ClientId::parse(rest)))
}

fn parse_mail_from(rest: &str) -> Result<Command, ProtoError> {
    let mut parts = rest.split(' ').filter(|part| !part.is_empty());
    let path = parts.next().ok_or(ProtoError::AddressNotFound)?;
    let mut args = MailFromArgs::new(Address::parse(path)?);
    let mut size_seen = false;

    for part in parts {
        let (key, value) = split_option(part);
        match key.to_ascii_uppercase().as_str() {
            "BODY" => {
                if args.mime.is_some() {
                    return Err(ProtoError::MailArgDuplicated("BODY".to_string()));
                }
                args.mime = Some(BodyType::parse(value)?);
            }
            "SIZE" => {
                if size_seen {
                    return Err(ProtoError::MailArgDuplicated("SIZE".to_string()));
                }
                size_seen = true;
                // best-effort: unparsable or overflowing sizes are dropped
                args.size = value.parse::<u64>().ok();
            }
            "ENVID" => {
                if args.envelope_id.is_some() {
                    return Err(ProtoError::MailArgDuplicated("ENVID".to_string()));
                }
                args.envelope_id = Some(value.to_string());
            }
            "RET" => {
                if args.ret.is_some() {
                    return Err(ProtoError::MailArgDuplicated("RET".to_string()));
                }
                args.ret = Some(DsnRet::parse(value)?);
            }
            "SMTPUTF8" => {
                if args.use_smtputf8 {
                    return Err(ProtoError::MailArgDuplicated("SMTPUTF8".to_string()));
                }
                args.use_smtputf8 = true;
            }
            _ => return Err(ProtoError::ArgumentUnsupported(key.to_string())),
        }
    }

    Ok(Command::MailFrom(args))
}

fn parse_rcpt_to(rest: &str) -> Result<Command, ProtoError> {
    let mut parts = rest.split(' ').filter(|part| !part.is_empty());
    let path = parts.next().ok_or(ProtoError::AddressNotFound)?;
    let mut args = RcptToArgs::new(Address::parse(path)?);

    for part in parts {
        let (key, value) = split_option(part);
        match key.to_ascii_uppercase().as_str() {
            "ORCPT" => {
                if args.original_forward_path.is_some() {
                    return Err(ProtoError::RcptArgDuplicated("ORCPT".to_string()));
                }
                let (addr_type, address) = value
                    .split_once(';')
                    .ok_or_else(|| ProtoError::AddressUnparsable(value.to_string()))?;
                args.original_forward_path = Some(OriginalRecipient {
                    addr_type: addr_type.to_string(),
                    address: Address::parse(address)?,
                });
            }
            "NOTIFY" => {
                if args.notify.is_some() {
                    return Err(ProtoError::RcptArgDuplicated("NOTIFY".to_string()));
                }
                args.notify = Some(parse_notify(value)?);
            }
            _ => return Err(ProtoError::ArgumentUnsupported(key.to_string())),
        }
    }

    Ok(Command::RcptTo(args))
}

fn parse_notify(value: &str) -> Result<Notify, ProtoError> {
    if value.eq_ignore_ascii_case("NEVER") {
        return Ok(Notify::Never);
    }

    let mut set = NotifySet::default();
    for event in value.split(',').filter(|event| !event.is_empty()) {
        let flag = match event.to_ascii_uppercase().as_str() {
            "SUCCESS" => &mut set.success,
            "FAILURE" => &mut set.failure,
            "DELAY" => &mut set.delay,
            _ => return Err(ProtoError::NotifyUnsupported(event.to_string())),
        };
        if *flag {
            return Err(ProtoError::NotifyArgDuplicated(event.to_ascii_uppercase()));
        }
        *flag = true;
    }

    if set.is_empty() {
        return Err(ProtoError::NotifyNotFound);
    }
    Ok(Notify::On(set))
}

/// Splits `KEY=value` at the first `=`; a bare token is a valueless key.
fn split_option(part: &str) -> (&str, &str) {
    match part.split_once('=') {
        Some((key, value)) => (key, value),
        None => (part, ""),
    }
}

fn put_greeting(dst: &mut BytesMut, verb: &str, id: &ClientId) -> Result<(), ProtoError> {
    if let ClientId::Domain(domain) = id {
        if domain.is_empty() {
            return Err(ProtoError::StringIsNil);
        }
    }
    dst.put_slice(verb.as_bytes());
    dst.put_slice(id.to_string().as_bytes());
    dst.put_slice(CRLF);
    Ok(())
}

fn put_address(dst: &mut BytesMut, address: &Address) -> Result<(), ProtoError> {
    if address.as_str().is_empty() {
        return Err(ProtoError::StringIsNil);
    }
    dst.put_slice(address.to_string().as_bytes());
    Ok(())
}

fn put_mail_from(dst: &mut BytesMut, args: &MailFromArgs) -> Result<(), ProtoError> {
    dst.put_slice(token::MAIL_FROM.as_bytes());
    put_address(dst, &args.reverse_path)?;
    if let Some(mime) = args.mime {
        dst.put_slice(b" BODY=");
        dst.put_slice(mime.as_str().as_bytes());
    }
    if let Some(size) = args.size {
        dst.put_slice(b" SIZE=");
        dst.put_slice(size.to_string().as_bytes());
    }
    if let Some(envelope_id) = &args.envelope_id {
        dst.put_slice(b" ENVID=");
        dst.put_slice(envelope_id.as_bytes());
    }
    if let Some(ret) = args.ret {
        dst.put_slice(b" RET=");
        dst.put_slice(ret.as_str().as_bytes());
    }
    if args.use_smtputf8 {
        dst.put_slice(b" SMTPUTF8");
    }
    dst.put_slice(CRLF);
    Ok(())
}

fn put_rcpt_to(dst: &mut BytesMut, args: &RcptToArgs) -> Result<(), ProtoError> {
    dst.put_slice(token::RCPT_TO.as_bytes());
    put_address(dst, &args.forward_path)?;
    if let Some(orcpt) = &args.original_forward_path {
        dst.put_slice(b" ORCPT=");
        dst.put_slice(orcpt.addr_type.as_bytes());
        dst.put_u8(b';');
        dst.put_slice(orcpt.address.to_string().as_bytes());
    }
    if let Some(notify) = args.notify {
        dst.put_slice(b" NOTIFY=");
        match notify {
            Notify::Never => dst.put_slice(b"NEVER"),
            Notify::On(set) => {
                let mut events: Vec<&str> = Vec::with_capacity(3);
                if set.success {
                    events.push("SUCCESS");
                }
                if set.failure {
                    events.push("FAILURE");
                }
                if set.delay {
                    events.push("DELAY");
                }
                dst.put_slice(events.join(",").as_bytes());
            }
        }
    }
    dst.put_slice(CRLF);
    Ok(())
}

/// What one driver write puts on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A single command.
    Command(Command),
    /// Several commands emitted back to back.
    Bulk(Vec<Command>),
    /// Raw bytes, e.g. a DATA payload ending in `.` CRLF.
    Raw(Bytes),
}
