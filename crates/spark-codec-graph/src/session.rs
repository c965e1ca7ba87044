//! 编解码会话：把一次顶层调用需要的全部可变状态打包交给处理器。
//!
//! # 设计背景（Why）
//! - 处理器签名若逐个接收通道、注册中心、上下文与缓存策略，自定义类型实现会非常啰嗦；
//!   会话把它们收拢为一个借用视图，生命周期与顶层调用一致；
//! - 会话同时承担嵌套深度计数，防止恶意或损坏的输入把调用栈耗尽。
//!
//! # 契约说明（What）
//! - 会话只在单个线程、单次调用中存在，不跨线程共享；
//! - [`EncodeSession::write`] / [`DecodeSession::read`] 通过注册中心解析字段类型的处理器，
//!   并沿用本次调用的缓存策略。

use std::sync::Arc;

use crate::channel::ByteChannel;
use crate::config::CachePolicy;
use crate::context::{DeserializationContext, Lookup, SerializationContext};
use crate::error::{CodecError, Result};
use crate::registry::HandlerRegistry;
use crate::wire::Wire;

/// 编码端会话。
pub struct EncodeSession<'a> {
    channel: &'a mut ByteChannel,
    registry: &'a HandlerRegistry,
    context: &'a mut SerializationContext,
    policy: CachePolicy,
    depth: usize,
}

impl<'a> EncodeSession<'a> {
    pub(crate) fn new(
        channel: &'a mut ByteChannel,
        registry: &'a HandlerRegistry,
        context: &'a mut SerializationContext,
        policy: CachePolicy,
    ) -> Self {
        Self {
            channel,
            registry,
            context,
            policy,
            depth: 0,
        }
    }

    /// 底层字节通道。
    pub fn channel(&mut self) -> &mut ByteChannel {
        self.channel
    }

    /// 本次调用的引用优化上下文。
    pub fn context(&mut self) -> &mut SerializationContext {
        self.context
    }

    pub fn registry(&self) -> &'a HandlerRegistry {
        self.registry
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// 当前嵌套层数。
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 通过注册中心编码一个字段。
    pub fn write<T: Wire>(&mut self, value: &T) -> Result<()> {
        let handler = self.registry.handler_with::<T>(self.policy)?;
        handler.encode(value, self)
    }

    /// 在深度预算内执行一层嵌套编码。
    pub fn nested<R>(&mut self, body: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let limit = self.registry.config().max_depth;
        if self.depth >= limit {
            return Err(CodecError::DepthExceeded { limit });
        }
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    /// 为共享值写入优化标签；返回 `true` 表示无需再写负载。
    pub fn optimize_shared<T>(&mut self, value: Option<&Arc<T>>) -> Result<bool>
    where
        T: Send + Sync + 'static,
    {
        self.context.optimize(self.channel, value)
    }
}

/// 解码端会话。
pub struct DecodeSession<'a> {
    channel: &'a mut ByteChannel,
    registry: &'a HandlerRegistry,
    context: &'a mut DeserializationContext,
    policy: CachePolicy,
    depth: usize,
}

impl<'a> DecodeSession<'a> {
    pub(crate) fn new(
        channel: &'a mut ByteChannel,
        registry: &'a HandlerRegistry,
        context: &'a mut DeserializationContext,
        policy: CachePolicy,
    ) -> Self {
        Self {
            channel,
            registry,
            context,
            policy,
            depth: 0,
        }
    }

    pub fn channel(&mut self) -> &mut ByteChannel {
        self.channel
    }

    pub fn context(&mut self) -> &mut DeserializationContext {
        self.context
    }

    pub fn registry(&self) -> &'a HandlerRegistry {
        self.registry
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 通过注册中心解码一个字段。
    pub fn read<T: Wire>(&mut self) -> Result<T> {
        let handler = self.registry.handler_with::<T>(self.policy)?;
        handler.decode(self)
    }

    /// 在深度预算内执行一层嵌套解码。
    pub fn nested<R>(&mut self, body: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let limit = self.registry.config().max_depth;
        if self.depth >= limit {
            return Err(CodecError::DepthExceeded { limit });
        }
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    /// 读取共享值的优化标签。
    pub fn lookup_shared<T>(&mut self) -> Result<Lookup<T>>
    where
        T: Send + Sync + 'static,
    {
        self.context.optimize(self.channel)
    }
}
