//! 锁包装链：让共享对象能够被自己的后代引用。
//!
//! # 设计背景（Why）
//! - 不可变的 `Arc<T>` 只有在 `T` 完整解码之后才能构造，此前出现的回引用无从指向它；
//! - `Arc<RwLock<T>>` / `Arc<Mutex<T>>` 则可以先以 `T::default()` 分配并登记，
//!   再解码负载并原地替换，环中的回引用因此总能拿到同一个 `Arc`。
//!
//! # 风险提示（Trade-offs）
//! - 编码期间持有读锁（或互斥锁）；同一对象的再次出现会在加锁前被优化上下文截获，
//!   因此环不会导致重入加锁。调用方不得在编码期间对图中的锁执行写操作。

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::inner_part;
use crate::error::Result;
use crate::handler::{ErasedHandler, Handler};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::Wire;

/// 内部可变的锁包装。
pub trait LockValue: Send + Sync + 'static + Sized {
    type Inner: Wire + Default;

    fn new_locked(inner: Self::Inner) -> Self;

    /// 在持锁期间访问内部值。
    fn with_inner<R>(&self, body: impl FnOnce(&Self::Inner) -> R) -> R;

    /// 替换内部值。
    fn replace_inner(&self, inner: Self::Inner);
}

impl<T: Wire + Default> LockValue for RwLock<T> {
    type Inner = T;

    fn new_locked(inner: T) -> Self {
        RwLock::new(inner)
    }

    fn with_inner<R>(&self, body: impl FnOnce(&T) -> R) -> R {
        body(&*self.read())
    }

    fn replace_inner(&self, inner: T) {
        *self.write() = inner;
    }
}

impl<T: Wire + Default> LockValue for Mutex<T> {
    type Inner = T;

    fn new_locked(inner: T) -> Self {
        Mutex::new(inner)
    }

    fn with_inner<R>(&self, body: impl FnOnce(&T) -> R) -> R {
        body(&*self.lock())
    }

    fn replace_inner(&self, inner: T) {
        *self.lock() = inner;
    }
}

/// 锁包装处理器。
pub struct LockChain<L: LockValue> {
    inner: Arc<dyn Handler<L::Inner>>,
    _marker: PhantomData<fn() -> L>,
}

impl<L: LockValue> LockChain<L> {
    pub fn new(inner: Arc<dyn Handler<L::Inner>>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// 以内部值处理器组装锁处理器。
    pub fn assemble(parts: &[ErasedHandler]) -> Result<ErasedHandler> {
        let inner = inner_part::<L, L::Inner>(parts, 0)?;
        Ok(ErasedHandler::new::<L, _>(Self::new(inner)))
    }
}

impl<L: LockValue> Handler<L> for LockChain<L> {
    fn encode(&self, value: &L, session: &mut EncodeSession<'_>) -> Result<()> {
        value.with_inner(|inner| self.inner.encode(inner, session))
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<L> {
        Ok(L::new_locked(self.inner.decode(session)?))
    }

    fn encode_shared(&self, value: &Arc<L>, session: &mut EncodeSession<'_>) -> Result<()> {
        self.encode(value, session)
    }

    fn decode_shared(&self, session: &mut DecodeSession<'_>) -> Result<Arc<L>> {
        let shared = Arc::new(L::new_locked(L::Inner::default()));
        session.context().add_object(shared.clone());
        let inner = self.inner.decode(session)?;
        shared.replace_inner(inner);
        Ok(shared)
    }
}
