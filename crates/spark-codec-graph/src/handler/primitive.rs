//! 内建原语处理器：定宽数值、`bool`、`String` 与 `Bytes`。
//!
//! 注册中心在构造时把它们全部预置进缓存，因此原语永远不会走构建器流程。

use std::marker::PhantomData;

use bytes::Bytes;

use super::{ErasedHandler, Handler};
use crate::channel::Primitive;
use crate::error::Result;
use crate::session::{DecodeSession, EncodeSession};

/// 直接委托给 [`ByteChannel::write`](crate::ByteChannel::write) 的定宽原语处理器。
#[derive(Debug)]
pub struct PrimitiveHandler<P> {
    _marker: PhantomData<fn() -> P>,
}

impl<P> PrimitiveHandler<P> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<P> Default for PrimitiveHandler<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Primitive> Handler<P> for PrimitiveHandler<P> {
    fn encode(&self, value: &P, session: &mut EncodeSession<'_>) -> Result<()> {
        session.channel().write(*value);
        Ok(())
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<P> {
        session.channel().read()
    }
}

/// 7-bit 变长长度前缀的 UTF-8 字符串。
#[derive(Debug, Default)]
pub struct StringHandler;

impl Handler<String> for StringHandler {
    fn encode(&self, value: &String, session: &mut EncodeSession<'_>) -> Result<()> {
        session.channel().write_str(value)
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<String> {
        session.channel().read_string()
    }
}

/// `i32` 长度前缀的字节序列。
#[derive(Debug, Default)]
pub struct BytesHandler;

impl Handler<Bytes> for BytesHandler {
    fn encode(&self, value: &Bytes, session: &mut EncodeSession<'_>) -> Result<()> {
        session.channel().write_bytes(value)
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<Bytes> {
        session.channel().read_bytes()
    }
}

fn primitive<P: Primitive>() -> ErasedHandler {
    ErasedHandler::new::<P, _>(PrimitiveHandler::<P>::new())
}

/// 全部内建处理器，顺序无语义。
pub(crate) fn builtin_handlers() -> Vec<ErasedHandler> {
    vec![
        primitive::<i8>(),
        primitive::<i16>(),
        primitive::<i32>(),
        primitive::<i64>(),
        primitive::<u8>(),
        primitive::<u16>(),
        primitive::<u32>(),
        primitive::<u64>(),
        primitive::<f32>(),
        primitive::<f64>(),
        primitive::<bool>(),
        ErasedHandler::new::<String, _>(StringHandler),
        ErasedHandler::new::<Bytes, _>(BytesHandler),
    ]
}
