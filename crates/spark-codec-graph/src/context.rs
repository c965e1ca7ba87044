//! # context 模块说明
//!
//! ## 角色定位（Why）
//! - 对象图中同一个共享对象可能被多处引用，甚至被自己的后代引用；若逐次展开，
//!   编码会重复膨胀，遇到环则无限递归；
//! - 优化上下文为每个经由 `Arc` 到达的值写一个 1 字节标签：`NORMAL` 表示随后是完整负载，
//!   `NULL` 表示空引用，`ALREADY_HANDLED` 表示随后是一个 `i32` 回引用索引。
//!
//! ## 核心不变量（What）
//! - 编码端按“首次出现”顺序为对象分配索引 0、1、2……；
//! - 解码端在读到 `NORMAL` 后、展开负载**之前**登记对象，因此两端的索引顺序完全一致；
//! - 空引用只消耗标签字节，不登记任何对象；
//! - 对象身份以 `Arc` 的分配地址判定，从不做结构比较；
//! - 不可变 `Arc<T>` 在负载写完之前处于“未闭合”状态，指向它的回引用在编码端即被拒绝，
//!   只有锁包装的共享对象可以被自己的后代引用。
//!
//! ## 设计权衡（Trade-offs）
//! - 编码上下文持有每个已登记对象的 `Arc` 克隆，保证上下文存活期间地址不会被复用；
//!   代价是对象释放被推迟到上下文销毁。

use std::any::{Any, type_name};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::channel::ByteChannel;
use crate::error::{CodecError, Result};

/// 引用优化标签。
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Tag {
    /// 随后是完整负载。
    Normal = 0,
    /// 空引用，之后没有任何字节。
    Null = 1,
    /// 随后是 `i32` 回引用索引。
    AlreadyHandled = 2,
}

impl TryFrom<u8> for Tag {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Null),
            2 => Ok(Self::AlreadyHandled),
            tag => Err(CodecError::InvalidTag { tag }),
        }
    }
}

/// 基于 `Arc` 分配地址的对象身份。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ObjectIdentity(usize);

impl ObjectIdentity {
    /// 取 `value` 所指分配的身份。
    pub fn of<T: ?Sized>(value: &Arc<T>) -> Self {
        Self(Arc::as_ptr(value).cast::<()>() as usize)
    }
}

type SharedObject = Arc<dyn Any + Send + Sync>;

/// 编码端的对象身份表。
///
/// # 使用方式
/// - 默认每次顶层调用新建一个；调用方也可以把同一个上下文传给多次调用，使跨调用的
///   共享对象只写一次（解码端必须对应地复用同一个 [`DeserializationContext`]）。
#[derive(Default)]
pub struct SerializationContext {
    indices: HashMap<ObjectIdentity, i32>,
    pinned: Vec<SharedObject>,
    open: HashSet<ObjectIdentity>,
}

impl SerializationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在展开一个共享值之前调用。
    ///
    /// # 契约说明（What）
    /// - `None`：写入 `NULL`，返回 `true`；
    /// - 已登记的对象：写入 `ALREADY_HANDLED` 与其索引，返回 `true`；
    ///   若对象仍处于未闭合状态，不写任何字节并返回 [`CodecError::UnsupportedCycle`]；
    /// - 首次出现：分配下一个索引、写入 `NORMAL`，返回 `false`，调用方随后必须写出完整负载。
    pub fn optimize<T>(&mut self, channel: &mut ByteChannel, value: Option<&Arc<T>>) -> Result<bool>
    where
        T: Send + Sync + 'static,
    {
        let Some(value) = value else {
            channel.write(Tag::Null as u8);
            return Ok(true);
        };
        let identity = ObjectIdentity::of(value);
        if let Some(&index) = self.indices.get(&identity) {
            if self.open.contains(&identity) {
                return Err(CodecError::UnsupportedCycle {
                    type_name: type_name::<T>(),
                });
            }
            channel.write(Tag::AlreadyHandled as u8);
            channel.write(index);
            return Ok(true);
        }
        let index = i32::try_from(self.pinned.len()).map_err(|_| CodecError::InvalidLength {
            what: "object index",
            value: self.pinned.len() as i64,
        })?;
        let pinned: SharedObject = value.clone();
        self.indices.insert(identity, index);
        self.pinned.push(pinned);
        channel.write(Tag::Normal as u8);
        Ok(false)
    }

    /// 标记一个不可变共享对象开始写出负载。
    pub(crate) fn open(&mut self, identity: ObjectIdentity) {
        self.open.insert(identity);
    }

    /// 负载写完（或失败）后解除标记。
    pub(crate) fn close(&mut self, identity: ObjectIdentity) {
        self.open.remove(&identity);
    }

    /// 已登记对象数量。
    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }

    /// 查询对象已分配的索引。
    pub fn index_of<T: ?Sized>(&self, value: &Arc<T>) -> Option<i32> {
        self.indices.get(&ObjectIdentity::of(value)).copied()
    }
}

impl fmt::Debug for SerializationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationContext")
            .field("objects", &self.pinned.len())
            .finish()
    }
}

/// 解码端读取标签后的结论。
#[derive(Debug)]
pub enum Lookup<T> {
    /// 空引用。
    Null,
    /// 回引用到已物化的对象。
    Existing(Arc<T>),
    /// 随后是完整负载，调用方需在展开前登记结果。
    Normal,
}

/// 解码端按登记顺序保存的对象列表。
///
/// 槽位可以先预留、后填充：不可变共享值在负载解码完成前无法构造，
/// 预留期间的回引用会得到 [`CodecError::DanglingReference`]。
#[derive(Default)]
pub struct DeserializationContext {
    objects: Vec<Option<SharedObject>>,
}

impl DeserializationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取标签并解析回引用。
    pub fn optimize<T>(&mut self, channel: &mut ByteChannel) -> Result<Lookup<T>>
    where
        T: Send + Sync + 'static,
    {
        let start = channel.position();
        let tag = Tag::try_from(channel.read::<u8>()?).inspect_err(|_| {
            let _ = channel.set_position(start);
        })?;
        match tag {
            Tag::Null => Ok(Lookup::Null),
            Tag::Normal => Ok(Lookup::Normal),
            Tag::AlreadyHandled => {
                let index = channel.read::<i32>()?;
                self.get::<T>(index).map(Lookup::Existing)
            }
        }
    }

    /// 登记一个已分配的对象，返回其索引。
    pub fn add_object<T>(&mut self, value: Arc<T>) -> usize
    where
        T: Send + Sync + 'static,
    {
        let value: SharedObject = value;
        self.objects.push(Some(value));
        self.objects.len() - 1
    }

    /// 预留一个尚未物化的槽位。
    pub fn reserve(&mut self) -> usize {
        self.objects.push(None);
        self.objects.len() - 1
    }

    /// 填充预留槽位。
    pub fn fill<T>(&mut self, slot: usize, value: Arc<T>) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        let value: SharedObject = value;
        match self.objects.get_mut(slot) {
            Some(entry) if entry.is_none() => {
                *entry = Some(value);
                Ok(())
            }
            _ => Err(CodecError::DanglingReference { index: slot as i64 }),
        }
    }

    /// 按索引取出对象并还原为 `Arc<T>`。
    pub fn get<T>(&self, index: i32) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let object = usize::try_from(index)
            .ok()
            .and_then(|slot| self.objects.get(slot))
            .and_then(Option::as_ref)
            .ok_or(CodecError::DanglingReference {
                index: i64::from(index),
            })?;
        Arc::downcast::<T>(object.clone()).map_err(|_| CodecError::BackReferenceMismatch {
            index: i64::from(index),
            expected: type_name::<T>(),
        })
    }

    /// 已登记（含预留）的槽位数量。
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl fmt::Debug for DeserializationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeserializationContext")
            .field("objects", &self.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_consumes_only_the_tag() {
        let mut channel = ByteChannel::new();
        let mut ser = SerializationContext::new();
        assert!(ser.optimize::<i32>(&mut channel, None).unwrap());
        assert_eq!(channel.as_slice(), &[1]);
        assert!(ser.is_empty());

        channel.set_position(0).unwrap();
        let mut de = DeserializationContext::new();
        assert!(matches!(de.optimize::<i32>(&mut channel).unwrap(), Lookup::Null));
        assert_eq!(channel.available(), 0);
        assert!(de.is_empty());
    }

    #[test]
    fn repeated_object_becomes_back_reference() {
        let shared = Arc::new(7_u64);
        let other = Arc::new(7_u64);
        let mut channel = ByteChannel::new();
        let mut ser = SerializationContext::new();
        assert!(!ser.optimize(&mut channel, Some(&shared)).unwrap());
        assert!(!ser.optimize(&mut channel, Some(&other)).unwrap());
        assert!(ser.optimize(&mut channel, Some(&shared)).unwrap());
        assert_eq!(channel.as_slice(), &[0, 0, 2, 0, 0, 0, 0]);
        assert_eq!(ser.index_of(&other), Some(1));
    }

    #[test]
    fn back_reference_to_open_object_writes_nothing() {
        let shared = Arc::new(1_u8);
        let mut channel = ByteChannel::new();
        let mut ser = SerializationContext::new();
        assert!(!ser.optimize(&mut channel, Some(&shared)).unwrap());
        ser.open(ObjectIdentity::of(&shared));
        assert!(matches!(
            ser.optimize(&mut channel, Some(&shared)),
            Err(CodecError::UnsupportedCycle { .. })
        ));
        assert_eq!(channel.as_slice(), &[0]);

        ser.close(ObjectIdentity::of(&shared));
        assert!(ser.optimize(&mut channel, Some(&shared)).unwrap());
        assert_eq!(channel.as_slice(), &[0, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn back_reference_resolves_registered_object() {
        let mut channel = ByteChannel::new();
        channel.write(Tag::AlreadyHandled as u8);
        channel.write(0_i32);
        channel.set_position(0).unwrap();

        let mut de = DeserializationContext::new();
        let original = Arc::new(String::from("shared"));
        de.add_object(original.clone());
        match de.optimize::<String>(&mut channel).unwrap() {
            Lookup::Existing(found) => assert!(Arc::ptr_eq(&found, &original)),
            other => panic!("unexpected lookup {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_protocol_violation() {
        let mut channel = ByteChannel::from_slice(&[3]);
        let mut de = DeserializationContext::new();
        assert_eq!(
            de.optimize::<i32>(&mut channel).unwrap_err(),
            CodecError::InvalidTag { tag: 3 }
        );
    }

    #[test]
    fn reserved_slot_is_dangling_until_filled() {
        let mut de = DeserializationContext::new();
        let slot = de.reserve();
        assert_eq!(
            de.get::<u8>(slot as i32).unwrap_err(),
            CodecError::DanglingReference { index: 0 }
        );
        de.fill(slot, Arc::new(5_u8)).unwrap();
        assert_eq!(*de.get::<u8>(0).unwrap(), 5);
        assert!(de.fill(slot, Arc::new(6_u8)).is_err());
    }

    #[test]
    fn type_confusion_is_reported() {
        let mut de = DeserializationContext::new();
        de.add_object(Arc::new(1_i32));
        assert!(matches!(
            de.get::<String>(0).unwrap_err(),
            CodecError::BackReferenceMismatch { index: 0, .. }
        ));
        assert!(matches!(
            de.get::<i32>(-1).unwrap_err(),
            CodecError::DanglingReference { index: -1 }
        ));
    }
}
