//! 处理器构建器。
//!
//! # 设计背景（Why）
//! - 缓存未命中的类型交给构建器链：内建的 [`SimpleBuilder`] 负责数组、集合、键值对、
//!   共享引用与锁包装；每个注册中心还可以安装一个可插拔构建器，为不透明类型提供处理器；
//! - 构建器通过 [`Resolver`] 递归解析内部类型，递归解析与顶层解析共享同一套缓存策略与
//!   递归检测。
//!
//! # 契约说明（What）
//! - `build` 返回 `Ok(None)` 表示“不认识这个类型”，注册中心会继续询问下一个构建器；
//! - 返回的处理器必须绑定到 `descriptor` 描述的类型，否则注册中心以
//!   [`CodecError::HandlerTypeMismatch`](crate::CodecError::HandlerTypeMismatch) 拒绝它。

use std::any::type_name;

use super::Resolver;
use crate::descriptor::{Shape, TypeDescriptor};
use crate::error::Result;
use crate::handler::ErasedHandler;

/// 为未缓存的类型构建处理器。
pub trait HandlerBuilder: Send + Sync + 'static {
    /// 用于日志与冲突诊断的名称。
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// 尝试为 `descriptor` 构建处理器。
    fn build(
        &self,
        resolver: &mut Resolver<'_>,
        descriptor: &TypeDescriptor,
    ) -> Result<Option<ErasedHandler>>;
}

/// 内建构建器：先解析复合类型的全部内部处理器，再交给描述符的组装函数生成链。
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleBuilder;

impl HandlerBuilder for SimpleBuilder {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn build(
        &self,
        resolver: &mut Resolver<'_>,
        descriptor: &TypeDescriptor,
    ) -> Result<Option<ErasedHandler>> {
        let Shape::Composite(composite) = descriptor.shape() else {
            return Ok(None);
        };
        let mut inner = Vec::with_capacity(composite.parts().len());
        for part in composite.parts() {
            inner.push(resolver.resolve_required(&part())?);
        }
        composite.assemble(&inner).map(Some)
    }
}
