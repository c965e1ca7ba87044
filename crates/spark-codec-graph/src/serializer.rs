//! 面向调用方的高层外观。
//!
//! # 设计背景（Why）
//! - 直接调用 [`HandlerRegistry::serialize`] 需要自己准备通道、策略与上下文；大部分场景只想
//!   “把一个值变成字节、再变回来”，[`Serializer`] 把这些样板收拢起来；
//! - [`SerialStream`] 把一个通道与序列化器绑定，适合在同一缓冲中顺序写入、读出多个值，
//!   并可选择让多个值共享同一对优化上下文。

use std::sync::Arc;

use bytes::Bytes;

use crate::channel::ByteChannel;
use crate::config::{CachePolicy, RegistryConfig};
use crate::context::{DeserializationContext, SerializationContext};
use crate::error::Result;
use crate::registry::HandlerRegistry;
use crate::wire::Wire;

/// 持有共享注册中心与默认缓存策略的序列化器。
///
/// ```
/// use spark_codec_graph::Serializer;
///
/// let serializer = Serializer::new();
/// let bytes = serializer.to_bytes(&vec![1_i32, 2, 3]).unwrap();
/// let back: Vec<i32> = serializer.from_bytes(&bytes).unwrap();
/// assert_eq!(back, vec![1, 2, 3]);
/// ```
#[derive(Clone, Debug)]
pub struct Serializer {
    registry: Arc<HandlerRegistry>,
    policy: CachePolicy,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    /// 以全新的默认注册中心创建。
    pub fn new() -> Self {
        Self::with_registry(Arc::new(HandlerRegistry::new()))
    }

    /// 以指定配置创建独享的注册中心。
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_registry(Arc::new(HandlerRegistry::with_config(config)))
    }

    /// 共享一个已有的注册中心。
    pub fn with_registry(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            policy: CachePolicy::UseDefault,
        }
    }

    /// 设置默认缓存策略。
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// 把一个值编码为独立的字节块。
    pub fn to_bytes<T: Wire>(&self, value: &T) -> Result<Bytes> {
        let mut channel = ByteChannel::new();
        self.registry
            .serialize(&mut channel, value, self.policy, None)?;
        Ok(channel.into_bytes())
    }

    /// 以调用方持有的上下文编码，跨调用去重共享对象。
    pub fn to_bytes_with<T: Wire>(
        &self,
        value: &T,
        context: &mut SerializationContext,
    ) -> Result<Bytes> {
        let mut channel = ByteChannel::new();
        self.registry
            .serialize(&mut channel, value, self.policy, Some(context))?;
        Ok(channel.into_bytes())
    }

    /// 从字节块解码一个值。
    pub fn from_bytes<T: Wire>(&self, bytes: &[u8]) -> Result<T> {
        let mut channel = ByteChannel::from_slice(bytes);
        self.registry.deserialize(&mut channel, self.policy, None)
    }

    /// 以调用方持有的上下文解码。
    pub fn from_bytes_with<T: Wire>(
        &self,
        bytes: &[u8],
        context: &mut DeserializationContext,
    ) -> Result<T> {
        let mut channel = ByteChannel::from_slice(bytes);
        self.registry
            .deserialize(&mut channel, self.policy, Some(context))
    }

    /// 创建写入用的流。
    pub fn writer(&self) -> SerialStream {
        SerialStream::new(self.clone(), ByteChannel::new())
    }

    /// 在既有字节之上创建读取用的流。
    pub fn reader(&self, bytes: &[u8]) -> SerialStream {
        SerialStream::new(self.clone(), ByteChannel::from_slice(bytes))
    }
}

/// 与序列化器绑定的字节流。
///
/// # 契约说明（What）
/// - `write` / `read` 每次调用使用独立的上下文，值之间互不引用；
/// - `write_shared` / `read_shared` 使用流自身持有的上下文，同一对象在流中只写一次；
///   读端必须以相同的顺序对应调用 `read_shared`。
#[derive(Debug)]
pub struct SerialStream {
    serializer: Serializer,
    channel: ByteChannel,
    encode_context: SerializationContext,
    decode_context: DeserializationContext,
}

impl SerialStream {
    fn new(serializer: Serializer, channel: ByteChannel) -> Self {
        Self {
            serializer,
            channel,
            encode_context: SerializationContext::new(),
            decode_context: DeserializationContext::new(),
        }
    }

    pub fn channel(&self) -> &ByteChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut ByteChannel {
        &mut self.channel
    }

    pub fn write<T: Wire>(&mut self, value: &T) -> Result<()> {
        let serializer = &self.serializer;
        serializer
            .registry
            .serialize(&mut self.channel, value, serializer.policy, None)
    }

    /// 顶层类型无法解析时返回 `Ok(false)`。
    pub fn try_write<T: Wire>(&mut self, value: &T) -> Result<bool> {
        let serializer = &self.serializer;
        serializer
            .registry
            .try_serialize(&mut self.channel, value, serializer.policy, None)
    }

    pub fn write_shared<T: Wire>(&mut self, value: &T) -> Result<()> {
        let serializer = &self.serializer;
        serializer.registry.serialize(
            &mut self.channel,
            value,
            serializer.policy,
            Some(&mut self.encode_context),
        )
    }

    pub fn read<T: Wire>(&mut self) -> Result<T> {
        let serializer = &self.serializer;
        serializer
            .registry
            .deserialize(&mut self.channel, serializer.policy, None)
    }

    /// 顶层类型无法解析时返回 `Ok(None)`。
    pub fn try_read<T: Wire>(&mut self) -> Result<Option<T>> {
        let serializer = &self.serializer;
        serializer
            .registry
            .try_deserialize(&mut self.channel, serializer.policy, None)
    }

    pub fn read_shared<T: Wire>(&mut self) -> Result<T> {
        let serializer = &self.serializer;
        serializer.registry.deserialize(
            &mut self.channel,
            serializer.policy,
            Some(&mut self.decode_context),
        )
    }

    /// 把游标移回起点，以便读回刚写入的内容。
    pub fn rewind(&mut self) {
        self.channel.rewind();
    }

    pub fn into_bytes(self) -> Bytes {
        self.channel.into_bytes()
    }
}
