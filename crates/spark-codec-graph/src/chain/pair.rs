//! 键值对链：先写键、再写值，解码顺序相同。

use std::sync::Arc;

use super::inner_part;
use crate::error::Result;
use crate::handler::{ErasedHandler, Handler};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::Wire;

/// `(K, V)` 处理器。
pub struct PairChain<K: Wire, V: Wire> {
    key: Arc<dyn Handler<K>>,
    value: Arc<dyn Handler<V>>,
}

impl<K: Wire, V: Wire> PairChain<K, V> {
    pub fn new(key: Arc<dyn Handler<K>>, value: Arc<dyn Handler<V>>) -> Self {
        Self { key, value }
    }

    /// 以键、值处理器组装键值对处理器。
    pub fn assemble(parts: &[ErasedHandler]) -> Result<ErasedHandler> {
        let key = inner_part::<(K, V), K>(parts, 0)?;
        let value = inner_part::<(K, V), V>(parts, 1)?;
        Ok(ErasedHandler::new::<(K, V), _>(Self::new(key, value)))
    }
}

impl<K: Wire, V: Wire> Handler<(K, V)> for PairChain<K, V> {
    fn encode(&self, value: &(K, V), session: &mut EncodeSession<'_>) -> Result<()> {
        session.nested(|session| {
            self.key.encode(&value.0, session)?;
            self.value.encode(&value.1, session)
        })
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<(K, V)> {
        session.nested(|session| {
            let key = self.key.decode(session)?;
            let value = self.value.decode(session)?;
            Ok((key, value))
        })
    }
}
