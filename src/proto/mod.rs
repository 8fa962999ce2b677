//! SMTP wire protocol: typed commands and replies plus their codecs.

pub mod address;
pub mod command;
pub mod frames;
pub mod reply;
mod token;

pub use address::{Address, ClientId};
pub use command::{
    BodyType, Command, DsnRet, MailFromArgs, Notify, NotifySet, OriginalRecipient, Outbound,
    RcptToArgs,
};
pub use frames::{ClientCodec, ServerCodec};
pub use reply::{Category, Code, Reply, Severity};

use thiserror::Error;

/// Hard cap on one command line, CRLF included.
pub const MAX_COMMAND_LINE: usize = 1024;

/// Hard cap on one reply group, CRLFs included.
pub const MAX_REPLY_LENGTH: usize = 4 * 1024;

/// Shortest well-formed command line (`NOOP\r\n`).
pub(crate) const MIN_COMMAND_LINE: usize = 6;

/// Codec-tier error.
///
/// `Incomplete` is internal: the frame adapters turn it into a request
/// for more bytes. Every other variant is fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// More bytes are needed to frame the next item.
    #[error("more bytes needed")]
    Incomplete,
    /// Decode was invoked on an empty buffer.
    #[error("no bytes to decode")]
    BytesNotFound,
    /// A line ended in a bare LF.
    #[error("line is not CRLF terminated")]
    CrlfNotFound,
    /// The framed line is shorter than any command.
    #[error("command line too short: {0:?}")]
    CommandTooShort(String),
    /// The framed line exceeds [`MAX_COMMAND_LINE`].
    #[error("command line exceeds {MAX_COMMAND_LINE} bytes")]
    CommandTooLong,
    /// No verb in the table matched.
    #[error("unknown command: {0:?}")]
    CommandUnknown(String),
    /// MAIL FROM / RCPT TO carried no path segment.
    #[error("missing address")]
    AddressNotFound,
    /// A path segment did not parse as `local@domain`.
    #[error("unparsable address: {0:?}")]
    AddressUnparsable(String),
    /// An empty name or address cannot be put on the wire.
    #[error("empty string cannot be encoded")]
    StringIsNil,
    /// An option key outside the verb's table.
    #[error("unsupported argument: {0}")]
    ArgumentUnsupported(String),
    /// BODY= value outside 7BIT/8BITMIME/BINARYMIME.
    #[error("unsupported BODY value: {0:?}")]
    MimeUnsupported(String),
    /// RET= value outside FULL/HDRS.
    #[error("unsupported RET value: {0:?}")]
    RetUnsupported(String),
    /// A MAIL FROM option appeared twice.
    #[error("duplicated MAIL argument: {0}")]
    MailArgDuplicated(String),
    /// A RCPT TO option appeared twice.
    #[error("duplicated RCPT argument: {0}")]
    RcptArgDuplicated(String),
    /// NOTIFY= resolved to an empty event list.
    #[error("empty NOTIFY list")]
    NotifyNotFound,
    /// NOTIFY= event outside SUCCESS/FAILURE/DELAY.
    #[error("unsupported NOTIFY value: {0:?}")]
    NotifyUnsupported(String),
    /// A NOTIFY= event appeared twice.
    #[error("duplicated NOTIFY value: {0}")]
    NotifyArgDuplicated(String),
    /// Byte four of a reply line was neither SP nor `-`.
    #[error("bad reply continuation byte: {0:?}")]
    ReplySignBad(char),
    /// A reply group exceeds [`MAX_REPLY_LENGTH`].
    #[error("reply group exceeds {MAX_REPLY_LENGTH} bytes")]
    ReplyTooLong,
    /// Lines of one group carried different codes.
    #[error("reply codes differ within a group: first {0}, then {1}")]
    ReplyCodesDiffer(Code, Code),
    /// The first three bytes of a line were not a valid code.
    #[error("unparsable reply code: {0:?}")]
    ReplyCodeUnparsable(String),
}
