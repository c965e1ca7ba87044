//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义编解码链路上所有可能出现的失败，保证“类型无法解析”“字节流损坏”“协议标签非法”
//!   “构建器配置冲突”四类语义在调用方看来是稳定、可区分的；
//! - 每个变体都映射到一个点分稳定错误码（`codes::*`），风格与 `spark-core` 的 `protocol.decode`
//!   等错误码一致，便于日志与告警聚合。
//!
//! ## 设计要求（What）
//! - 错误一经检测即同步返回并展开整个编解码调用，不存在部分结果或尽力而为模式；
//! - 编解码器只操作调用方提供的内存缓冲，因此不存在 I/O 重试。

use thiserror::Error;

/// 稳定错误码集合。
pub mod codes {
    /// 无法为请求类型解析出处理器。
    pub const UNSUPPORTED_TYPE: &str = "codec.unsupported_type";
    /// 类型在自身处理器构建完成前递归引用了自己。
    pub const RECURSIVE_TYPE: &str = "codec.recursive_type";
    /// 后代经由回引用指向尚未写完的不可变共享对象。
    pub const UNSUPPORTED_CYCLE: &str = "codec.unsupported_cycle";
    /// 处理器绑定的值类型与请求类型不一致。
    pub const TYPE_MISMATCH: &str = "codec.type_mismatch";
    /// 读取请求超过剩余可读字节。
    pub const UNEXPECTED_EOF: &str = "codec.unexpected_eof";
    /// 长度、秩或维度字段不合法。
    pub const INVALID_LENGTH: &str = "codec.invalid_length";
    /// 固定取值域字段出现越界值。
    pub const INVALID_VALUE: &str = "codec.invalid_value";
    /// 字符串负载不是合法 UTF-8。
    pub const INVALID_UTF8: &str = "codec.invalid_utf8";
    /// 游标定位到缓冲之外。
    pub const INVALID_SEEK: &str = "codec.invalid_seek";
    /// 非空引用位置读到了空标签。
    pub const UNEXPECTED_NULL: &str = "codec.unexpected_null";
    /// 回引用指向不存在或尚未物化的对象。
    pub const DANGLING_REFERENCE: &str = "codec.dangling_reference";
    /// 回引用指向的对象类型与期望不符。
    pub const BACK_REFERENCE_MISMATCH: &str = "codec.back_reference_mismatch";
    /// 嵌套深度超过配置上限。
    pub const DEPTH_EXCEEDED: &str = "codec.depth_exceeded";
    /// 引用优化标签不在已知集合内。
    pub const INVALID_TAG: &str = "codec.invalid_tag";
    /// 重复安装可插拔构建器。
    pub const BUILDER_CONFLICT: &str = "codec.builder_conflict";
    /// 需要可插拔构建器但尚未安装。
    pub const NO_BUILDER: &str = "codec.no_builder";
}

/// 错误大类，对应调用方的处置策略。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorCategory {
    /// 类型无法编解码；安全入口以 `false`/`None` 表达。
    UnsupportedType,
    /// 字节流损坏或与类型不一致，致命。
    StreamCorruption,
    /// 引用优化标签非法，致命。
    ProtocolViolation,
    /// 注册中心配置阶段的错误。
    Configuration,
}

/// 编解码核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：以细粒度枚举区分失败来源，使上层既能按 [`ErrorCategory`] 粗粒度处置，
///   也能按具体变体精确排障；
/// - **契约 (What)**：所有变体满足 `Send + Sync + 'static`，可通过 `?` 直接传播；
///   [`CodecError::code`] 返回的字符串在版本之间保持稳定；
/// - **设计权衡 (Trade-offs)**：类型名使用 `&'static str`（来自 `core::any::type_name`），
///   其文本仅用于诊断，不保证跨编译器版本一致。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CodecError {
    /// 没有任何处理器能够服务该类型。
    #[error("no handler can be resolved for type `{type_name}`")]
    UnsupportedType { type_name: &'static str },

    /// 复合类型的处理器在构建过程中再次请求了自身。
    #[error("type `{type_name}` refers to itself before its handler is constructed")]
    RecursiveType { type_name: &'static str },

    /// 环经过了不可变的 `Arc<T>`：解码端无法在 `T` 解码完成前构造它。
    #[error("cycle passes through immutable shared `{type_name}`; wrap it in a lock to encode it")]
    UnsupportedCycle { type_name: &'static str },

    /// 处理器绑定的值类型与请求不一致。
    #[error("handler for `{actual}` cannot serve values of type `{expected}`")]
    HandlerTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// 读取越过可读区域。
    #[error("read of {requested} bytes exceeds the {available} bytes available")]
    UnexpectedEof { requested: usize, available: usize },

    /// 长度、秩、维度或计数字段不合法。
    #[error("invalid {what}: {value}")]
    InvalidLength { what: &'static str, value: i64 },

    /// 取值域受限的字段出现非法值。
    #[error("invalid {what} value {value}")]
    InvalidValue { what: &'static str, value: i64 },

    /// 字符串负载不是合法 UTF-8。
    #[error("string payload is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },

    /// 游标定位越界。
    #[error("position {position} is outside of a buffer of {length} bytes")]
    InvalidSeek { position: usize, length: usize },

    /// 非空引用类型读到了空标签。
    #[error("null reference decoded into non-nullable `{type_name}`")]
    UnexpectedNull { type_name: &'static str },

    /// 回引用指向不存在或尚未完成物化的对象。
    #[error("back-reference {index} does not point at a materialized object")]
    DanglingReference { index: i64 },

    /// 回引用对象的实际类型与期望不符。
    #[error("back-reference {index} does not hold a `{expected}`")]
    BackReferenceMismatch { index: i64, expected: &'static str },

    /// 嵌套深度超出 [`RegistryConfig::max_depth`](crate::RegistryConfig::max_depth)。
    #[error("nesting depth exceeds the configured limit of {limit}")]
    DepthExceeded { limit: usize },

    /// 引用优化标签非法。
    #[error("invalid reference optimization tag {tag}")]
    InvalidTag { tag: u8 },

    /// 注册中心已安装可插拔构建器。
    #[error("a handler builder is already installed (`{installed}`)")]
    BuilderConflict { installed: &'static str },

    /// 调用要求可插拔构建器，但尚未安装。
    #[error("no pluggable handler builder is installed")]
    NoBuilderInstalled,

    /// 用户自定义处理器报告的错误。
    #[error("{message}")]
    Custom { code: &'static str, message: String },
}

impl CodecError {
    /// 构造用户自定义错误，`code` 应遵循点分命名。
    pub fn custom(code: &'static str, message: impl Into<String>) -> Self {
        Self::Custom {
            code,
            message: message.into(),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedType { .. } => codes::UNSUPPORTED_TYPE,
            Self::RecursiveType { .. } => codes::RECURSIVE_TYPE,
            Self::UnsupportedCycle { .. } => codes::UNSUPPORTED_CYCLE,
            Self::HandlerTypeMismatch { .. } => codes::TYPE_MISMATCH,
            Self::UnexpectedEof { .. } => codes::UNEXPECTED_EOF,
            Self::InvalidLength { .. } => codes::INVALID_LENGTH,
            Self::InvalidValue { .. } => codes::INVALID_VALUE,
            Self::InvalidUtf8 { .. } => codes::INVALID_UTF8,
            Self::InvalidSeek { .. } => codes::INVALID_SEEK,
            Self::UnexpectedNull { .. } => codes::UNEXPECTED_NULL,
            Self::DanglingReference { .. } => codes::DANGLING_REFERENCE,
            Self::BackReferenceMismatch { .. } => codes::BACK_REFERENCE_MISMATCH,
            Self::DepthExceeded { .. } => codes::DEPTH_EXCEEDED,
            Self::InvalidTag { .. } => codes::INVALID_TAG,
            Self::BuilderConflict { .. } => codes::BUILDER_CONFLICT,
            Self::NoBuilderInstalled => codes::NO_BUILDER,
            Self::Custom { code, .. } => code,
        }
    }

    /// 返回错误大类。
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedType { .. }
            | Self::RecursiveType { .. }
            | Self::UnsupportedCycle { .. }
            | Self::HandlerTypeMismatch { .. } => ErrorCategory::UnsupportedType,
            Self::InvalidTag { .. } => ErrorCategory::ProtocolViolation,
            Self::BuilderConflict { .. } | Self::NoBuilderInstalled => {
                ErrorCategory::Configuration
            }
            _ => ErrorCategory::StreamCorruption,
        }
    }

    /// 安全入口据此把错误折叠为“不支持”。
    pub fn is_unsupported(&self) -> bool {
        self.category() == ErrorCategory::UnsupportedType
    }
}

/// crate 内统一使用的结果别名。
pub type Result<T, E = CodecError> = core::result::Result<T, E>;
