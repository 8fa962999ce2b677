//! Streaming frame adapters over the command and reply codecs.
//!
//! Both codecs plug into `tokio_util::codec::Framed`. `Incomplete` from
//! the underlying decoders becomes a "need more data" signal with the
//! read cursor untouched; every other codec error is fatal and surfaces
//! to the connection driver.

use super::command::{Command, Outbound};
use super::reply::Reply;
use super::ProtoError;
use crate::Error;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Client-side codec: decodes server replies, encodes outbound commands.
#[derive(Debug, Default)]
pub struct ClientCodec;

impl ClientCodec {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ClientCodec {
    type Item = Reply;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        match Reply::decode(src) {
            Ok(reply) => Ok(Some(reply)),
            Err(ProtoError::Incomplete) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl Encoder<Outbound> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Outbound::Command(command) => command.encode(dst)?,
            Outbound::Bulk(commands) => {
                for command in &commands {
                    command.encode(dst)?;
                }
            }
            Outbound::Raw(bytes) => dst.put_slice(&bytes),
        }
        Ok(())
    }
}

/// Server-side codec: decodes client commands, encodes replies.
#[derive(Debug, Default)]
pub struct ServerCodec;

impl ServerCodec {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ServerCodec {
    type Item = Command;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        match Command::decode(src) {
            Ok(command) => Ok(Some(command)),
            Err(ProtoError::Incomplete) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl Encoder<Reply> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, item: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}
