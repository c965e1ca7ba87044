//! `spark-codec-graph`：由类型驱动的二进制对象图编解码器。
//!
//! # 教案背景（Why）
//! - 不依赖外部 schema，类型本身决定编码方式：原语、多维与交错数组、有序集合、键值对、
//!   共享引用以及用户自定义记录都能写成紧凑的字节流并原样读回；
//! - 对象图中的空引用、共享对象与环由引用优化上下文处理，共享对象只写一次，环不会导致无限递归。
//!
//! # 使用概览（How）
//! - [`HandlerRegistry`] 为每个类型解析并缓存处理器；未缓存的复合类型由 [`SimpleBuilder`]
//!   递归组装为数组、集合、键值对、引用或锁包装链，不透明类型可交给可插拔的 [`HandlerBuilder`]；
//! - 用户记录实现 [`SelfCodec`] 并在 [`Wire::descriptor`] 中返回 [`TypeDescriptor::self_coded`]；
//! - 日常使用可直接借助 [`Serializer`] 外观完成 `to_bytes` / `from_bytes`。
//!
//! ```
//! use std::collections::HashMap;
//! use spark_codec_graph::Serializer;
//!
//! let serializer = Serializer::new();
//! let scores = HashMap::from([
//!     ("azrael".to_owned(), 5_i32),
//!     ("luthor".to_owned(), 100),
//!     ("tom".to_owned(), 50),
//! ]);
//! let bytes = serializer.to_bytes(&scores).unwrap();
//! let back: HashMap<String, i32> = serializer.from_bytes(&bytes).unwrap();
//! assert_eq!(back, scores);
//! ```
//!
//! # 合约说明（What）
//! - 所有定宽数值按小端序编码；字符串为 7-bit 变长长度前缀加 UTF-8；
//! - 经由 `Arc` 到达的值带 1 字节优化标签（0 完整负载、1 空引用、2 回引用 + `i32` 索引）；
//! - 错误同步返回并携带稳定错误码，见 [`CodecError::code`]。
//!
//! # 风险提示（Trade-offs）
//! - 线格式不做版本协商，也不保证跨语言兼容；
//! - 编码期间不得并发修改图中的值。

pub mod chain;
mod channel;
mod config;
mod context;
mod contract;
mod descriptor;
pub mod error;
mod handler;
mod ndarray;
mod registry;
mod serializer;
mod session;
mod wire;

pub use crate::channel::{ByteChannel, Primitive};
pub use crate::config::{CachePolicy, DEFAULT_MAX_DEPTH, RegistryConfig};
pub use crate::context::{
    DeserializationContext, Lookup, ObjectIdentity, SerializationContext, Tag,
};
pub use crate::contract::{SelfCodec, SelfCodecHandler};
pub use crate::descriptor::{
    AssembleFn, Composite, CompositeKind, DescriptorFn, SelfCodecFactory, Shape, TypeDescriptor,
};
pub use crate::error::{CodecError, ErrorCategory, Result};
pub use crate::handler::primitive::{BytesHandler, PrimitiveHandler, StringHandler};
pub use crate::handler::{ErasedHandler, FnHandler, Handler};
pub use crate::ndarray::{IndexWalker, NdArray};
pub use crate::registry::{HandlerBuilder, HandlerRegistry, Resolver, SimpleBuilder};
pub use crate::serializer::{SerialStream, Serializer};
pub use crate::session::{DecodeSession, EncodeSession};
pub use crate::wire::Wire;
