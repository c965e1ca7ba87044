//! 映射链。
//!
//! 线格式与元素为 `(K, V)` 的集合完全相同：4 字节计数占位，随后逐项先写键、再写值，
//! 遍历结束后回填实际写出的条目数。区别在于编码端直接借用映射中的键与值，
//! 不会为了凑出一个 `&(K, V)` 而克隆条目，键、值类型因此无需实现 `Clone`。

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{capacity_hint, inner_part};
use crate::error::{CodecError, Result};
use crate::handler::{ErasedHandler, Handler};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::Wire;

/// 可作为映射编解码的值。
pub trait MapValue: Send + Sync + 'static + Sized {
    type Key: Wire;
    type Value: Wire;

    /// 按映射自身的迭代顺序借出每个条目，访问者报错时立即停止。
    fn for_each_entry(
        &self,
        visit: &mut dyn FnMut(&Self::Key, &Self::Value) -> Result<()>,
    ) -> Result<()>;

    /// 构造空映射；`capacity` 只是提示。
    fn with_capacity(capacity: usize) -> Self;

    /// 插入一个条目，重复的键以后出现者为准。
    fn insert_entry(&mut self, key: Self::Key, value: Self::Value);
}

impl<K: Wire + Eq + Hash, V: Wire> MapValue for HashMap<K, V> {
    type Key = K;
    type Value = V;

    fn for_each_entry(&self, visit: &mut dyn FnMut(&K, &V) -> Result<()>) -> Result<()> {
        self.iter().try_for_each(|(key, value)| visit(key, value))
    }

    fn with_capacity(capacity: usize) -> Self {
        HashMap::with_capacity(capacity)
    }

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Wire + Ord, V: Wire> MapValue for BTreeMap<K, V> {
    type Key = K;
    type Value = V;

    fn for_each_entry(&self, visit: &mut dyn FnMut(&K, &V) -> Result<()>) -> Result<()> {
        self.iter().try_for_each(|(key, value)| visit(key, value))
    }

    fn with_capacity(_capacity: usize) -> Self {
        BTreeMap::new()
    }

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

/// 映射处理器。
pub struct MapChain<M: MapValue> {
    key: Arc<dyn Handler<M::Key>>,
    value: Arc<dyn Handler<M::Value>>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: MapValue> MapChain<M> {
    pub fn new(key: Arc<dyn Handler<M::Key>>, value: Arc<dyn Handler<M::Value>>) -> Self {
        Self {
            key,
            value,
            _marker: PhantomData,
        }
    }

    /// 以键、值处理器组装映射处理器。
    pub fn assemble(parts: &[ErasedHandler]) -> Result<ErasedHandler> {
        let key = inner_part::<M, M::Key>(parts, 0)?;
        let value = inner_part::<M, M::Value>(parts, 1)?;
        Ok(ErasedHandler::new::<M, _>(Self::new(key, value)))
    }
}

impl<M: MapValue> Handler<M> for MapChain<M> {
    fn encode(&self, map: &M, session: &mut EncodeSession<'_>) -> Result<()> {
        session.nested(|session| {
            let slot = session.channel().reserve_and_seek(4);
            let mut count: usize = 0;
            map.for_each_entry(&mut |key, value| {
                self.key.encode(key, session)?;
                self.value.encode(value, session)?;
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

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<M> {
        session.nested(|session| {
            let raw = session.channel().read::<i32>()?;
            let count = usize::try_from(raw).map_err(|_| CodecError::InvalidLength {
                what: "collection count",
                value: i64::from(raw),
            })?;
            let available = session.channel().available();
            let mut map = M::with_capacity(capacity_hint(count, available));
            for _ in 0..count {
                let key = self.key.decode(session)?;
                let value = self.value.decode(session)?;
                map.insert_entry(key, value);
            }
            Ok(map)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_borrowed_in_iteration_order() {
        let map = BTreeMap::from([(2_u8, "b".to_owned()), (1, "a".to_owned())]);
        let mut seen = Vec::new();
        map.for_each_entry(&mut |key, value| {
            seen.push((*key, value.as_str().to_owned()));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(1, "a".to_owned()), (2, "b".to_owned())]);
    }

    #[test]
    fn visitor_error_stops_the_walk() {
        let map: HashMap<u8, u8> = (0..8).map(|i| (i, i)).collect();
        let mut visits = 0;
        let err = map
            .for_each_entry(&mut |_, _| {
                visits += 1;
                Err(CodecError::InvalidValue {
                    what: "entry",
                    value: 0,
                })
            })
            .unwrap_err();
        assert_eq!(visits, 1);
        assert!(matches!(err, CodecError::InvalidValue { .. }));
    }
}
