//! 处理器抽象：静态泛型的 [`Handler`] 与注册中心存放的类型擦除形态 [`ErasedHandler`]。
//!
//! # 设计背景（Why）
//! - 编解码分派依赖“类型 → 处理器”映射，而映射表只能存放同一种对象；因此沿用
//!   “泛型 trait + 对象安全 trait + 适配器”三件套：实现者面对强类型的 [`Handler<T>`]，
//!   注册中心面对擦除后的 [`ErasedHandler`]；
//! - 复合链在构建期就把内部处理器还原为 `Arc<dyn Handler<Inner>>`，运行期不再做下转型。
//!
//! # 契约说明（What）
//! - 处理器一经构建即不可变，可被任意线程并发调用；
//! - 每个处理器绑定恰好一种值类型，[`ErasedHandler::value_type`] 返回该类型的 `TypeId`。

pub mod primitive;

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::ObjectIdentity;
use crate::error::{CodecError, Result};
use crate::session::{DecodeSession, EncodeSession};

/// 绑定到单一值类型 `T` 的编解码过程。
///
/// # 契约说明（What）
/// - `encode` 把 `value` 写入会话通道，`decode` 从会话通道读出同样的值；
/// - 对无环的值，`decode(encode(v)) == v` 必须成立；
/// - `encode_shared` / `decode_shared` 服务于经由 `Arc` 共享的值。默认实现把值视为不可变：
///   编码期间对象处于未闭合状态，后代对它的回引用以 [`CodecError::UnsupportedCycle`] 失败；
///   解码前预留上下文索引、完成后回填，保证索引顺序与编码端一致。需要“先分配、后填充”
///   以支持环的类型（见 [`LockChain`](crate::chain::LockChain)）会同时覆盖两者。
pub trait Handler<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// 编码一个值。
    fn encode(&self, value: &T, session: &mut EncodeSession<'_>) -> Result<()>;

    /// 解码一个值。
    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<T>;

    /// 编码一个已在序列化上下文中登记的共享值的负载。
    fn encode_shared(&self, value: &Arc<T>, session: &mut EncodeSession<'_>) -> Result<()> {
        let identity = ObjectIdentity::of(value);
        session.context().open(identity);
        let result = self.encode(value, session);
        session.context().close(identity);
        result
    }

    /// 解码一个即将以 `Arc` 共享的值，并在反序列化上下文中登记它。
    fn decode_shared(&self, session: &mut DecodeSession<'_>) -> Result<Arc<T>> {
        let slot = session.context().reserve();
        let value = self.decode(session)?;
        let shared = Arc::new(value);
        session.context().fill(slot, shared.clone())?;
        Ok(shared)
    }
}

/// 对象安全的处理器接口，仅在 crate 内由 [`TypedHandlerAdapter`] 实现。
pub(crate) trait DynHandler: Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    fn value_type(&self) -> TypeId;

    fn encode_dyn(
        &self,
        value: &(dyn Any + Send + Sync),
        session: &mut EncodeSession<'_>,
    ) -> Result<()>;

    fn decode_dyn(&self, session: &mut DecodeSession<'_>) -> Result<Box<dyn Any + Send + Sync>>;

    fn as_any(&self) -> &dyn Any;
}

/// 把强类型处理器桥接为 [`DynHandler`]。
///
/// # 逻辑解析（How）
/// - `encode_dyn` 先把 `Any` 下转型为 `T`，失败时返回 [`CodecError::HandlerTypeMismatch`]；
/// - `decode_dyn` 把结果装箱为 `Box<dyn Any + Send + Sync>`；
/// - `as_any` 暴露适配器自身，使 [`ErasedHandler::typed`] 能取回内部的 `Arc<dyn Handler<T>>`。
pub(crate) struct TypedHandlerAdapter<T>
where
    T: Send + Sync + 'static,
{
    inner: Arc<dyn Handler<T>>,
}

impl<T> DynHandler for TypedHandlerAdapter<T>
where
    T: Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn encode_dyn(
        &self,
        value: &(dyn Any + Send + Sync),
        session: &mut EncodeSession<'_>,
    ) -> Result<()> {
        let value = value
            .downcast_ref::<T>()
            .ok_or(CodecError::HandlerTypeMismatch {
                expected: type_name::<T>(),
                actual: "<erased value>",
            })?;
        self.inner.encode(value, session)
    }

    fn decode_dyn(&self, session: &mut DecodeSession<'_>) -> Result<Box<dyn Any + Send + Sync>> {
        let value = self.inner.decode(session)?;
        Ok(Box::new(value))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 注册中心中保存的类型擦除处理器。
///
/// 克隆只增加引用计数；两个克隆指向同一实例时 [`ErasedHandler::ptr_eq`] 返回 `true`，
/// 这也是“注册中心对同一类型总是返回同一个处理器”的判定方式。
#[derive(Clone)]
pub struct ErasedHandler {
    inner: Arc<dyn DynHandler>,
}

impl ErasedHandler {
    /// 擦除一个强类型处理器。
    pub fn new<T, H>(handler: H) -> Self
    where
        T: Send + Sync + 'static,
        H: Handler<T>,
    {
        Self::from_typed::<T>(Arc::new(handler))
    }

    /// 擦除一个已共享的强类型处理器。
    pub fn from_typed<T>(handler: Arc<dyn Handler<T>>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(TypedHandlerAdapter { inner: handler }),
        }
    }

    /// 取回强类型处理器；值类型不符时返回 [`CodecError::HandlerTypeMismatch`]。
    pub fn typed<T>(&self) -> Result<Arc<dyn Handler<T>>>
    where
        T: Send + Sync + 'static,
    {
        self.inner
            .as_any()
            .downcast_ref::<TypedHandlerAdapter<T>>()
            .map(|adapter| adapter.inner.clone())
            .ok_or(CodecError::HandlerTypeMismatch {
                expected: type_name::<T>(),
                actual: self.inner.type_name(),
            })
    }

    /// 绑定值类型的名称。
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    /// 绑定值类型的 `TypeId`。
    pub fn value_type(&self) -> TypeId {
        self.inner.value_type()
    }

    /// 以擦除形态编码。
    pub fn encode_dyn(
        &self,
        value: &(dyn Any + Send + Sync),
        session: &mut EncodeSession<'_>,
    ) -> Result<()> {
        self.inner.encode_dyn(value, session)
    }

    /// 以擦除形态解码。
    pub fn decode_dyn(&self, session: &mut DecodeSession<'_>) -> Result<Box<dyn Any + Send + Sync>> {
        self.inner.decode_dyn(session)
    }

    /// 是否与 `other` 为同一处理器实例。
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ErasedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedHandler")
            .field("value_type", &self.type_name())
            .finish()
    }
}

/// 由一对闭包组成的处理器，便于为不透明类型手工注册编解码过程。
///
/// ```
/// use spark_codec_graph::{FnHandler, HandlerRegistry};
///
/// struct Celsius(f32);
///
/// let registry = HandlerRegistry::new();
/// let handler = FnHandler::new(
///     |value: &Celsius, session| {
///         session.channel().write(value.0);
///         Ok(())
///     },
///     |session| Ok(Celsius(session.channel().read()?)),
/// );
/// assert!(registry.register::<Celsius, _>(handler));
/// ```
pub struct FnHandler<T, E, D> {
    encode: E,
    decode: D,
    _marker: PhantomData<fn() -> T>,
}

impl<T, E, D> FnHandler<T, E, D>
where
    T: Send + Sync + 'static,
    E: Fn(&T, &mut EncodeSession<'_>) -> Result<()> + Send + Sync + 'static,
    D: Fn(&mut DecodeSession<'_>) -> Result<T> + Send + Sync + 'static,
{
    /// 以编码、解码闭包构建处理器。
    pub fn new(encode: E, decode: D) -> Self {
        Self {
            encode,
            decode,
            _marker: PhantomData,
        }
    }
}

impl<T, E, D> Handler<T> for FnHandler<T, E, D>
where
    T: Send + Sync + 'static,
    E: Fn(&T, &mut EncodeSession<'_>) -> Result<()> + Send + Sync + 'static,
    D: Fn(&mut DecodeSession<'_>) -> Result<T> + Send + Sync + 'static,
{
    fn encode(&self, value: &T, session: &mut EncodeSession<'_>) -> Result<()> {
        (self.encode)(value, session)
    }

    fn decode(&self, session: &mut DecodeSession<'_>) -> Result<T> {
        (self.decode)(session)
    }
}
