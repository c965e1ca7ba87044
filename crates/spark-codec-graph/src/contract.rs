//! 用户自定义类型契约。
//!
//! # 设计背景（Why）
//! - 记录类型的字段布局只有类型自己清楚；实现 [`SelfCodec`] 即表示“我自己写出与读回字段”，
//!   注册中心对这类类型不再做任何拆解，直接合成一个 [`SelfCodecHandler`]；
//! - 解码遵循“先分配默认实例、再原地填充”的顺序，字段可以通过会话继续委托注册中心，
//!   因此递归记录（如树节点持有子节点集合）也能自然表达。
//!
//! # 使用方式（How）
//! ```
//! use spark_codec_graph::{
//!     DecodeSession, EncodeSession, Result, SelfCodec, TypeDescriptor, Wire,
//! };
//!
//! #[derive(Default, Debug, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl SelfCodec for Point {
//!     fn encode_self(&self, session: &mut EncodeSession<'_>) -> Result<()> {
//!         session.write(&self.x)?;
//!         session.write(&self.y)
//!     }
//!
//!     fn decode_self(&mut self, session: &mut DecodeSession<'_>) -> Result<()> {
//!         self.x = session.read()?;
//!         self.y = session.read()?;
//!         Ok(())
//!     }
//! }
//!
//! impl Wire for Point {
//!     fn descriptor() -> TypeDescriptor {
//!         TypeDescriptor::self_coded::<Self>()
//!     }
//! }
//! ```

use std::marker::PhantomData;

use crate::error::Result;
use crate::handler::Handler;
use crate::session::{DecodeSession, EncodeSession};

/// 自行负责编解码的类型。
///
/// # 契约说明（What）
/// - `decode_self` 作用于 `Default::default()` 生成的实例，必须按 `encode_self` 的顺序读回全部字段；
/// - 实现者通常还需实现 [`Wire`](crate::Wire)，在 `descriptor` 中返回
///   [`TypeDescriptor::self_coded`](crate::TypeDescriptor::self_coded)。
pub trait SelfCodec: Default + Send + Sync + 'static {
    /// 写出自身字段。
    fn encode_self(&self, session: &mut EncodeSession<'_>) -> Result<()>;

    /// 从通道读回字段并写入 `self`。
    fn decode_self(&mut self, session: &mut DecodeSession<'_>) -> Result<()>;
}

/// 为 [`SelfCodec`] 类型合成的处理器。
#[derive(Debug)]
pub struct SelfCodecHandler<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SelfCodecHandler<T> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SelfCodecHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SelfCodec> Handler<T> for SelfCodecHandler<T> {
    fn encode(&self, value: &T, session: &mut EncodeSession<'_>) -> Result<()> {
        session.nested(|session| value.encode_self(session))
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<T> {
        session.nested(|session| {
            let mut value = T::default();
            value.decode_self(session)?;
            Ok(value)
        })
    }
}
