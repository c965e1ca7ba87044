//! 单次解析过程的状态。
//!
//! # 逻辑解析（How）
//! 解析一个类型依次尝试：
//! 1. 注册中心缓存；
//! 2. 自编解码契约（终结，不再拆解）；
//! 3. 构建器链：内建简单构建器，随后是可插拔构建器；
//! 4. 均未命中则返回 `Ok(None)`。
//!
//! 构建器运行期间，类型被压入 `in_progress` 栈；若内部解析再次请求栈上的类型，
//! 立即以 [`CodecError::RecursiveType`] 失败，而不是无限递归。

use std::any::TypeId;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::{HandlerBuilder, HandlerRegistry};
use crate::descriptor::TypeDescriptor;
use crate::error::{CodecError, Result};
use crate::handler::{ErasedHandler, Handler};
use crate::wire::Wire;

/// 顶层解析允许使用的构建器范围；内部类型的解析始终使用完整的构建器链。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BuilderScope {
    All,
    Integrated,
    Pluggable,
}

/// 交给 [`HandlerBuilder`](super::HandlerBuilder) 的解析器。
pub struct Resolver<'r> {
    registry: &'r HandlerRegistry,
    cache: bool,
    in_progress: Vec<TypeId>,
}

impl<'r> Resolver<'r> {
    pub(crate) fn new(registry: &'r HandlerRegistry, cache: bool) -> Self {
        Self {
            registry,
            cache,
            in_progress: Vec::new(),
        }
    }

    /// 所属注册中心。
    pub fn registry(&self) -> &'r HandlerRegistry {
        self.registry
    }

    /// 本次解析新建的处理器是否写入缓存。
    pub fn caching(&self) -> bool {
        self.cache
    }

    /// 解析一个类型；无法解析时返回 `Ok(None)`。
    pub fn resolve(&mut self, descriptor: &TypeDescriptor) -> Result<Option<ErasedHandler>> {
        self.resolve_scoped(descriptor, BuilderScope::All)
    }

    /// 解析一个类型；无法解析时返回 [`CodecError::UnsupportedType`]。
    pub fn resolve_required(&mut self, descriptor: &TypeDescriptor) -> Result<ErasedHandler> {
        self.resolve(descriptor)?
            .ok_or(CodecError::UnsupportedType {
                type_name: descriptor.type_name(),
            })
    }

    /// 解析并还原为强类型处理器，供自定义构建器组装内部字段。
    pub fn resolve_type<T: Wire>(&mut self) -> Result<Arc<dyn Handler<T>>> {
        self.resolve_required(&T::descriptor())?.typed::<T>()
    }

    pub(crate) fn resolve_scoped(
        &mut self,
        descriptor: &TypeDescriptor,
        scope: BuilderScope,
    ) -> Result<Option<ErasedHandler>> {
        let type_id = descriptor.type_id();
        if let Some(handler) = self.registry.cached_erased(type_id) {
            trace!(type_name = descriptor.type_name(), "handler cache hit");
            return Ok(Some(handler));
        }

        if scope != BuilderScope::Pluggable {
            if let Some(factory) = descriptor.self_codec() {
                return self.finish(descriptor, factory()).map(Some);
            }
        }

        if self.in_progress.contains(&type_id) {
            return Err(CodecError::RecursiveType {
                type_name: descriptor.type_name(),
            });
        }
        self.in_progress.push(type_id);
        let built = self.run_builders(descriptor, scope);
        self.in_progress.pop();

        match built? {
            Some(handler) => self.finish(descriptor, handler).map(Some),
            None => Ok(None),
        }
    }

    fn run_builders(
        &mut self,
        descriptor: &TypeDescriptor,
        scope: BuilderScope,
    ) -> Result<Option<ErasedHandler>> {
        let registry = self.registry;
        if scope != BuilderScope::Pluggable {
            if let Some(handler) = registry.integrated.build(self, descriptor)? {
                return Ok(Some(handler));
            }
        }
        if scope != BuilderScope::Integrated {
            if let Some(builder) = registry.pluggable() {
                if let Some(handler) = builder.build(self, descriptor)? {
                    return Ok(Some(handler));
                }
            }
        }
        Ok(None)
    }

    fn finish(&self, descriptor: &TypeDescriptor, handler: ErasedHandler) -> Result<ErasedHandler> {
        if handler.value_type() != descriptor.type_id() {
            warn!(
                expected = descriptor.type_name(),
                actual = handler.type_name(),
                "builder returned a handler for a different type"
            );
            return Err(CodecError::HandlerTypeMismatch {
                expected: descriptor.type_name(),
                actual: handler.type_name(),
            });
        }
        if self.cache {
            Ok(self.registry.insert_canonical(handler))
        } else {
            debug!(
                type_name = descriptor.type_name(),
                cached = false,
                "handler built"
            );
            Ok(handler)
        }
    }
}
