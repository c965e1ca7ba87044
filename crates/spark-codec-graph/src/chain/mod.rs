//! 复合处理器链。
//!
//! # 设计背景（Why）
//! - 数组、集合、映射、键值对、共享引用与锁包装都由更小的处理器组合而成；每条链持有 1~2 个内部
//!   处理器的共享引用，并声明自己服务的外层类型；
//! - 每种链配一个“值形态” trait（[`ArrayValue`]、[`CollectionValue`]、[`MapValue`]、
//!   [`SharedRef`]、[`LockValue`]），把具体容器的遍历与构造方式交给 trait 实现，链本身只负责线格式。
//!
//! # 契约说明（What）
//! - 数组、集合、映射与键值对链在入口处通过会话的 `nested` 计入一层嵌套深度；
//!   引用与锁包装只是透明的一跳，不计深度，链表式对象图每个节点只消耗一层（由节点自身的
//!   [`SelfCodecHandler`](crate::SelfCodecHandler) 计入）；
//! - 链只在调用期间借用值，不保留任何引用。

mod array;
mod collection;
mod lock;
mod map;
mod pair;
mod reference;

pub use array::{ArrayChain, ArrayValue, MAX_RANK};
pub use collection::{CollectionChain, CollectionValue};
pub use lock::{LockChain, LockValue};
pub use map::{MapChain, MapValue};
pub use pair::PairChain;
pub use reference::{ReferenceChain, SharedRef};

use std::any::type_name;
use std::sync::Arc;

use crate::error::{CodecError, Result};
use crate::handler::{ErasedHandler, Handler};

/// 从组装参数中取出第 `index` 个内部处理器并还原为强类型。
fn inner_part<Outer, Inner>(parts: &[ErasedHandler], index: usize) -> Result<Arc<dyn Handler<Inner>>>
where
    Outer: 'static,
    Inner: Send + Sync + 'static,
{
    parts
        .get(index)
        .ok_or(CodecError::UnsupportedType {
            type_name: type_name::<Outer>(),
        })?
        .typed::<Inner>()
}

/// 解码端的容量提示：不超过剩余字节数，防止伪造计数触发超大分配。
fn capacity_hint(declared: usize, available: usize) -> usize {
    declared.min(available)
}
