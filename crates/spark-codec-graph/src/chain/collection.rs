//! 集合链。
//!
//! 编码端先用 [`ByteChannel::reserve_and_seek`](crate::ByteChannel::reserve_and_seek) 占住 4 字节，
//! 边遍历边计数，遍历结束后把真实数量回填到占位处；集合因此无需预先知道长度，
//! 写出的计数也总是实际写出的元素个数。解码端读出计数，构造声明类型的空集合并逐个追加。
//! 映射不走这里，见 [`MapChain`](super::MapChain)。

use std::collections::{BTreeSet, HashSet, LinkedList, VecDeque};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{capacity_hint, inner_part};
use crate::error::{CodecError, Result};
use crate::handler::{ErasedHandler, Handler};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::Wire;

/// 可作为集合编解码的值。
pub trait CollectionValue: Send + Sync + 'static + Sized {
    type Element: Wire;

    /// 按集合自身的迭代顺序访问每个元素，访问者报错时立即停止。
    fn for_each_element(
        &self,
        visit: &mut dyn FnMut(&Self::Element) -> Result<()>,
    ) -> Result<()>;

    /// 构造空集合；`capacity` 只是提示。
    fn with_capacity(capacity: usize) -> Self;

    /// 追加一个元素。
    fn push_element(&mut self, element: Self::Element);
}

impl<T: Wire> CollectionValue for Vec<T> {
    type Element = T;

    fn for_each_element(&self, visit: &mut dyn FnMut(&T) -> Result<()>) -> Result<()> {
        self.iter().try_for_each(visit)
    }

    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    fn push_element(&mut self, element: T) {
        self.push(element);
    }
}

impl<T: Wire> CollectionValue for VecDeque<T> {
    type Element = T;

    fn for_each_element(&self, visit: &mut dyn FnMut(&T) -> Result<()>) -> Result<()> {
        self.iter().try_for_each(visit)
    }

    fn with_capacity(capacity: usize) -> Self {
        VecDeque::with_capacity(capacity)
    }

    fn push_element(&mut self, element: T) {
        self.push_back(element);
    }
}

impl<T: Wire> CollectionValue for LinkedList<T> {
    type Element = T;

    fn for_each_element(&self, visit: &mut dyn FnMut(&T) -> Result<()>) -> Result<()> {
        self.iter().try_for_each(visit)
    }

    fn with_capacity(_capacity: usize) -> Self {
        LinkedList::new()
    }

    fn push_element(&mut self, element: T) {
        self.push_back(element);
    }
}

impl<T: Wire + Eq + Hash> CollectionValue for HashSet<T> {
    type Element = T;

    fn for_each_element(&self, visit: &mut dyn FnMut(&T) -> Result<()>) -> Result<()> {
        self.iter().try_for_each(visit)
    }

    fn with_capacity(capacity: usize) -> Self {
        HashSet::with_capacity(capacity)
    }

    fn push_element(&mut self, element: T) {
        self.insert(element);
    }
}

impl<T: Wire + Ord> CollectionValue for BTreeSet<T> {
    type Element = T;

    fn for_each_element(&self, visit: &mut dyn FnMut(&T) -> Result<()>) -> Result<()> {
        self.iter().try_for_each(visit)
    }

    fn with_capacity(_capacity: usize) -> Self {
        BTreeSet::new()
    }

    fn push_element(&mut self, element: T) {
        self.insert(element);
    }
}

/// 集合处理器。
pub struct CollectionChain<C: CollectionValue> {
    element: Arc<dyn Handler<C::Element>>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: CollectionValue> CollectionChain<C> {
    pub fn new(element: Arc<dyn Handler<C::Element>>) -> Self {
        Self {
            element,
            _marker: PhantomData,
        }
    }

    /// 以元素处理器组装集合处理器。
    pub fn assemble(parts: &[ErasedHandler]) -> Result<ErasedHandler> {
        let element = inner_part::<C, C::Element>(parts, 0)?;
        Ok(ErasedHandler::new::<C, _>(Self::new(element)))
    }
}

impl<C: CollectionValue> Handler<C> for CollectionChain<C> {
    fn encode(&self, value: &C, session: &mut EncodeSession<'_>) -> Result<()> {
        session.nested(|session| {
            let slot = session.channel().reserve_and_seek(4);
            let mut count: usize = 0;
            value.for_each_element(&mut |element| {
                self.element.encode(element, session)?;
                count += 1;
                Ok(())
            })?;
            let count = i32::try_from(count).map_err(|_| CodecError::InvalidLength {
                what: "collection count",
                value: count as i64,
            })?;
            session.channel().patch_i32_at(slot, count)
        })
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<C> {
        session.nested(|session| {
            let raw = session.channel().read::<i32>()?;
            let count = usize::try_from(raw).map_err(|_| CodecError::InvalidLength {
                what: "collection count",
                value: i64::from(raw),
            })?;
            let available = session.channel().available();
            let mut collection = C::with_capacity(capacity_hint(count, available));
            for _ in 0..count {
                collection.push_element(self.element.decode(session)?);
            }
            Ok(collection)
        })
    }
}
