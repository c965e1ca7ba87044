//! 共享引用链。
//!
//! # 逻辑解析（How）
//! - 编码：先交给优化上下文写标签；只有首次出现的对象才继续经由
//!   [`Handler::encode_shared`] 写出目标负载；
//! - 解码：`NULL` 与回引用直接还原，`NORMAL` 则调用目标处理器的
//!   [`Handler::decode_shared`]，由它负责在展开负载前登记对象。
//!
//! # 契约说明（What）
//! - `Arc<T>` 是非空引用，读到 `NULL` 报告 [`CodecError::UnexpectedNull`]；
//! - `Option<Arc<T>>` 是可空引用。

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use super::inner_part;
use crate::context::Lookup;
use crate::error::{CodecError, Result};
use crate::handler::{ErasedHandler, Handler};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::Wire;

/// 经由 `Arc` 共享的值。
pub trait SharedRef: Send + Sync + 'static + Sized {
    type Target: Wire;

    /// 取出共享指针；空引用返回 `None`。
    fn as_shared(&self) -> Option<&Arc<Self::Target>>;

    /// 由解码结果还原。
    fn from_shared(shared: Option<Arc<Self::Target>>) -> Result<Self>;
}

impl<T: Wire> SharedRef for Arc<T> {
    type Target = T;

    fn as_shared(&self) -> Option<&Arc<T>> {
        Some(self)
    }

    fn from_shared(shared: Option<Arc<T>>) -> Result<Self> {
        shared.ok_or(CodecError::UnexpectedNull {
            type_name: type_name::<Self>(),
        })
    }
}

impl<T: Wire> SharedRef for Option<Arc<T>> {
    type Target = T;

    fn as_shared(&self) -> Option<&Arc<T>> {
        self.as_ref()
    }

    fn from_shared(shared: Option<Arc<T>>) -> Result<Self> {
        Ok(shared)
    }
}

/// 共享引用处理器。
pub struct ReferenceChain<R: SharedRef> {
    target: Arc<dyn Handler<R::Target>>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: SharedRef> ReferenceChain<R> {
    pub fn new(target: Arc<dyn Handler<R::Target>>) -> Self {
        Self {
            target,
            _marker: PhantomData,
        }
    }

    /// 以目标处理器组装引用处理器。
    pub fn assemble(parts: &[ErasedHandler]) -> Result<ErasedHandler> {
        let target = inner_part::<R, R::Target>(parts, 0)?;
        Ok(ErasedHandler::new::<R, _>(Self::new(target)))
    }
}

impl<R: SharedRef> Handler<R> for ReferenceChain<R> {
    fn encode(&self, value: &R, session: &mut EncodeSession<'_>) -> Result<()> {
        let shared = value.as_shared();
        if session.optimize_shared(shared)? {
            return Ok(());
        }
        match shared {
            Some(shared) => self.target.encode_shared(shared, session),
            None => Ok(()),
        }
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<R> {
        let shared = match session.lookup_shared::<R::Target>()? {
            Lookup::Null => None,
            Lookup::Existing(shared) => Some(shared),
            Lookup::Normal => Some(self.target.decode_shared(session)?),
        };
        R::from_shared(shared)
    }
}
