//! # registry 模块说明
//!
//! ## 角色定位（Why）
//! - [`HandlerRegistry`] 是编解码分派的核心：维护“类型 → 处理器”映射，预置全部内建原语处理器，
//!   并在缓存未命中时经由构建器链为新类型构建处理器；
//! - 一个注册中心通常在进程或序列化器实例的整个生命周期内存在，处理器只增不减。
//!
//! ## 并发模型（How）
//! - 映射表基于 `DashMap`，查询与首次插入都无需全局锁；
//! - 两个线程同时首次解析同一类型时，两者都会完成构建，但只有先插入者生效，
//!   后到者丢弃自己的结果并拿到已插入的规范实例，因此同一类型永远只对应一个处理器。
//!
//! ## 契约说明（What）
//! - 严格入口（`serialize`/`deserialize`）在无法解析类型时返回 [`CodecError::UnsupportedType`]；
//! - 安全入口（`try_serialize`/`try_deserialize`）在顶层类型无法解析时返回 `Ok(false)` / `Ok(None)`，
//!   此时通道未被读写；
//! - 可插拔构建器每个注册中心只能安装一次，第二次安装返回 [`CodecError::BuilderConflict`]。

mod builder;
mod resolver;

pub use builder::{HandlerBuilder, SimpleBuilder};
pub use resolver::Resolver;

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, trace};

use self::resolver::BuilderScope;
use crate::channel::ByteChannel;
use crate::config::{CachePolicy, RegistryConfig};
use crate::context::{DeserializationContext, SerializationContext};
use crate::descriptor::TypeDescriptor;
use crate::error::{CodecError, Result};
use crate::handler::primitive::builtin_handlers;
use crate::handler::{ErasedHandler, Handler};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::Wire;

/// 类型到处理器的并发安全注册中心。
///
/// # 教案式说明
/// - **意图 (Why)**：以显式实例替代进程级静态缓存，不同注册中心之间互不影响，测试也能各自隔离；
/// - **逻辑 (How)**：查询先走 `DashMap` 快路径；未命中时由 [`Resolver`] 依次尝试自编解码契约、
///   [`SimpleBuilder`] 与可插拔构建器，成功后按缓存策略写入映射表；
/// - **契约 (What)**：注册中心可在线程间共享（通常包在 `Arc` 中），所有方法只需 `&self`；
/// - **风险 (Trade-offs)**：缓存只增不减；在 `ForceOff` 策略下反复解析同一复合类型会重复构建。
pub struct HandlerRegistry {
    handlers: DashMap<TypeId, ErasedHandler>,
    integrated: SimpleBuilder,
    pluggable: OnceLock<Arc<dyn HandlerBuilder>>,
    config: RegistryConfig,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("cached", &self.handlers.len())
            .field("builder", &self.pluggable.get().map(|builder| builder.name()))
            .field("config", &self.config)
            .finish()
    }
}

impl HandlerRegistry {
    /// 以默认配置创建注册中心。
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// 以指定配置创建注册中心，并预置内建原语处理器。
    pub fn with_config(config: RegistryConfig) -> Self {
        let handlers = DashMap::new();
        for handler in builtin_handlers() {
            handlers.insert(handler.value_type(), handler);
        }
        Self {
            handlers,
            integrated: SimpleBuilder,
            pluggable: OnceLock::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// 安装可插拔构建器。
    ///
    /// # 契约说明（What）
    /// - 每个注册中心只能安装一次；已安装时返回 [`CodecError::BuilderConflict`]，原构建器保持不变；
    /// - 安装前已缓存的处理器不受影响。
    pub fn use_builder<B: HandlerBuilder>(&self, builder: B) -> Result<()> {
        let builder: Arc<dyn HandlerBuilder> = Arc::new(builder);
        let name = builder.name();
        self.pluggable.set(builder).map_err(|_| CodecError::BuilderConflict {
            installed: self
                .pluggable
                .get()
                .map_or("<unknown>", |installed| installed.name()),
        })?;
        debug!(builder = name, "handler builder installed");
        Ok(())
    }

    pub(crate) fn pluggable(&self) -> Option<&Arc<dyn HandlerBuilder>> {
        self.pluggable.get()
    }

    /// 类型 `T` 是否已有缓存的处理器。
    pub fn is_cached<T: 'static>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<T>())
    }

    /// 取出 `T` 的缓存处理器。
    pub fn cached<T>(&self) -> Option<Arc<dyn Handler<T>>>
    where
        T: Send + Sync + 'static,
    {
        self.cached_erased(TypeId::of::<T>())
            .and_then(|handler| handler.typed::<T>().ok())
    }

    pub(crate) fn cached_erased(&self, type_id: TypeId) -> Option<ErasedHandler> {
        self.handlers.get(&type_id).map(|entry| entry.value().clone())
    }

    /// 已缓存的处理器数量（含内建原语）。
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 手工注册处理器；类型已有处理器时不覆盖并返回 `false`。
    pub fn register<T, H>(&self, handler: H) -> bool
    where
        T: Send + Sync + 'static,
        H: Handler<T>,
    {
        match self.handlers.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(ErasedHandler::new::<T, H>(handler));
                debug!(type_name = std::any::type_name::<T>(), "handler registered");
                true
            }
        }
    }

    /// 插入新构建的处理器；若已有处理器则返回已有的规范实例。
    pub(crate) fn insert_canonical(&self, handler: ErasedHandler) -> ErasedHandler {
        match self.handlers.entry(handler.value_type()) {
            Entry::Occupied(existing) => {
                trace!(
                    type_name = handler.type_name(),
                    "handler insert lost race, using canonical instance"
                );
                existing.get().clone()
            }
            Entry::Vacant(vacant) => {
                vacant.insert(handler.clone());
                debug!(type_name = handler.type_name(), cached = true, "handler built");
                handler
            }
        }
    }

    /// 按描述符解析处理器；无法解析时返回 `Ok(None)`。
    pub fn resolve(
        &self,
        descriptor: &TypeDescriptor,
        policy: CachePolicy,
    ) -> Result<Option<ErasedHandler>> {
        Resolver::new(self, self.config.should_cache(policy)).resolve(descriptor)
    }

    /// 按描述符解析处理器；无法解析时返回 [`CodecError::UnsupportedType`]。
    pub fn resolve_strict(
        &self,
        descriptor: &TypeDescriptor,
        policy: CachePolicy,
    ) -> Result<ErasedHandler> {
        self.resolve(descriptor, policy)?
            .ok_or(CodecError::UnsupportedType {
                type_name: descriptor.type_name(),
            })
    }

    /// 以默认策略取得 `T` 的强类型处理器。
    pub fn handler<T: Wire>(&self) -> Result<Arc<dyn Handler<T>>> {
        self.handler_with::<T>(CachePolicy::UseDefault)
    }

    /// 以指定策略取得 `T` 的强类型处理器，缓存命中时不生成描述符。
    pub fn handler_with<T: Wire>(&self, policy: CachePolicy) -> Result<Arc<dyn Handler<T>>> {
        if let Some(handler) = self.cached_erased(TypeId::of::<T>()) {
            return handler.typed::<T>();
        }
        self.resolve_strict(&T::descriptor(), policy)?.typed::<T>()
    }

    /// 以内建构建器（及自编解码契约）构建 `T` 的处理器并写入缓存。
    pub fn prepare<T: Wire>(&self) -> Result<ErasedHandler> {
        let descriptor = T::descriptor();
        Resolver::new(self, true)
            .resolve_scoped(&descriptor, BuilderScope::Integrated)?
            .ok_or(CodecError::UnsupportedType {
                type_name: descriptor.type_name(),
            })
    }

    /// 以已安装的可插拔构建器构建 `T` 的处理器并写入缓存。
    pub fn prepare_with_builder<T: Wire>(&self) -> Result<ErasedHandler> {
        if self.pluggable.get().is_none() {
            return Err(CodecError::NoBuilderInstalled);
        }
        let descriptor = T::descriptor();
        Resolver::new(self, true)
            .resolve_scoped(&descriptor, BuilderScope::Pluggable)?
            .ok_or(CodecError::UnsupportedType {
                type_name: descriptor.type_name(),
            })
    }

    /// 严格编码入口。
    ///
    /// `context` 为 `None` 时为本次调用新建上下文；传入同一个上下文可跨调用去重共享对象。
    pub fn serialize<T: Wire>(
        &self,
        channel: &mut ByteChannel,
        value: &T,
        policy: CachePolicy,
        context: Option<&mut SerializationContext>,
    ) -> Result<()> {
        let handler = self.handler_with::<T>(policy)?;
        self.encode_with(channel, policy, context, |session| {
            handler.encode(value, session)
        })
    }

    /// 安全编码入口：顶层类型无法解析时返回 `Ok(false)`，通道保持不变。
    pub fn try_serialize<T: Wire>(
        &self,
        channel: &mut ByteChannel,
        value: &T,
        policy: CachePolicy,
        context: Option<&mut SerializationContext>,
    ) -> Result<bool> {
        let handler = match self.handler_with::<T>(policy) {
            Ok(handler) => handler,
            Err(err) if err.is_unsupported() => return Ok(false),
            Err(err) => return Err(err),
        };
        self.encode_with(channel, policy, context, |session| {
            handler.encode(value, session)
        })?;
        Ok(true)
    }

    /// 严格解码入口。
    pub fn deserialize<T: Wire>(
        &self,
        channel: &mut ByteChannel,
        policy: CachePolicy,
        context: Option<&mut DeserializationContext>,
    ) -> Result<T> {
        let handler = self.handler_with::<T>(policy)?;
        self.decode_with(channel, policy, context, |session| handler.decode(session))
    }

    /// 安全解码入口：顶层类型无法解析时返回 `Ok(None)`，通道保持不变。
    pub fn try_deserialize<T: Wire>(
        &self,
        channel: &mut ByteChannel,
        policy: CachePolicy,
        context: Option<&mut DeserializationContext>,
    ) -> Result<Option<T>> {
        let handler = match self.handler_with::<T>(policy) {
            Ok(handler) => handler,
            Err(err) if err.is_unsupported() => return Ok(None),
            Err(err) => return Err(err),
        };
        self.decode_with(channel, policy, context, |session| handler.decode(session))
            .map(Some)
    }

    /// 以描述符驱动的擦除编码入口。
    pub fn serialize_dyn(
        &self,
        channel: &mut ByteChannel,
        value: &(dyn Any + Send + Sync),
        descriptor: &TypeDescriptor,
        policy: CachePolicy,
        context: Option<&mut SerializationContext>,
    ) -> Result<()> {
        let handler = self.resolve_strict(descriptor, policy)?;
        self.encode_with(channel, policy, context, |session| {
            handler.encode_dyn(value, session)
        })
    }

    /// 以描述符驱动的擦除解码入口。
    pub fn deserialize_dyn(
        &self,
        channel: &mut ByteChannel,
        descriptor: &TypeDescriptor,
        policy: CachePolicy,
        context: Option<&mut DeserializationContext>,
    ) -> Result<Box<dyn Any + Send + Sync>> {
        let handler = self.resolve_strict(descriptor, policy)?;
        self.decode_with(channel, policy, context, |session| handler.decode_dyn(session))
    }

    fn encode_with(
        &self,
        channel: &mut ByteChannel,
        policy: CachePolicy,
        context: Option<&mut SerializationContext>,
        body: impl FnOnce(&mut EncodeSession<'_>) -> Result<()>,
    ) -> Result<()> {
        let mut local = SerializationContext::new();
        let context = context.unwrap_or(&mut local);
        let mut session = EncodeSession::new(channel, self, context, policy);
        body(&mut session)
    }

    fn decode_with<R>(
        &self,
        channel: &mut ByteChannel,
        policy: CachePolicy,
        context: Option<&mut DeserializationContext>,
        body: impl FnOnce(&mut DecodeSession<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut local = DeserializationContext::new();
        let context = context.unwrap_or(&mut local);
        let mut session = DecodeSession::new(channel, self, context, policy);
        body(&mut session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    struct Opaque;

    impl Wire for Opaque {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::opaque::<Self>()
        }
    }

    struct WrongTypeBuilder;

    impl HandlerBuilder for WrongTypeBuilder {
        fn build(
            &self,
            resolver: &mut Resolver<'_>,
            _descriptor: &TypeDescriptor,
        ) -> Result<Option<ErasedHandler>> {
            resolver.resolve(&u8::descriptor())
        }
    }

    #[test]
    #[traced_test]
    fn building_a_composite_is_logged() {
        let registry = HandlerRegistry::new();
        registry.handler::<Vec<i32>>().unwrap();
        assert!(logs_contain("handler built"));
        assert!(logs_contain("alloc::vec::Vec<i32>"));
    }

    #[test]
    #[traced_test]
    fn mismatched_builder_output_is_warned() {
        let registry = HandlerRegistry::new();
        registry.use_builder(WrongTypeBuilder).unwrap();
        assert!(logs_contain("handler builder installed"));

        let err = registry.handler::<Opaque>().err().unwrap();
        assert!(matches!(err, CodecError::HandlerTypeMismatch { actual: "u8", .. }));
        assert!(logs_contain("builder returned a handler for a different type"));
    }

    #[test]
    fn builtins_are_cached_from_the_start() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_cached::<i8>());
        assert!(registry.is_cached::<f64>());
        assert!(registry.is_cached::<String>());
        assert!(registry.is_cached::<bytes::Bytes>());
        assert!(!registry.is_cached::<Vec<i8>>());
        assert_eq!(registry.len(), 13);
    }
}
