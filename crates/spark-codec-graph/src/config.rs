//! 注册中心配置与缓存策略。
//!
//! # 设计背景（Why）
//! - 处理器缓存默认开启，但单次调用需要能够临时强制开启或关闭，因此以三态 [`CachePolicy`]
//!   表达“跟随默认 / 强制缓存 / 强制不缓存”；
//! - [`RegistryConfig`] 通过 `serde` 反序列化，可直接嵌入宿主应用的 TOML 配置段。

use serde::Deserialize;

/// 默认的嵌套深度上限。
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// 单次调用的处理器缓存策略。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum CachePolicy {
    /// 跟随注册中心的 `cache_by_default`。
    #[default]
    UseDefault,
    /// 新构建的处理器一律写入缓存。
    ForceOn,
    /// 新构建的处理器只在本次调用中使用。
    ForceOff,
}

impl CachePolicy {
    /// 结合注册中心默认值得出最终是否缓存。
    pub fn resolve(self, default: bool) -> bool {
        match self {
            Self::UseDefault => default,
            Self::ForceOn => true,
            Self::ForceOff => false,
        }
    }
}

impl From<Option<bool>> for CachePolicy {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Self::UseDefault,
            Some(true) => Self::ForceOn,
            Some(false) => Self::ForceOff,
        }
    }
}

/// [`HandlerRegistry`](crate::HandlerRegistry) 的可调参数。
///
/// # 契约说明（What）
/// - `cache_by_default`：未显式指定策略时是否缓存新处理器，默认 `true`；
/// - `max_depth`：复合值编解码允许的最大嵌套层数，超出报告
///   [`CodecError::DepthExceeded`](crate::CodecError::DepthExceeded)，默认 512；
///   容器与自编解码值各计一层，引用与锁包装不计；
/// - 未知字段会被拒绝，避免拼写错误被静默忽略。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub cache_by_default: bool,
    pub max_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_by_default: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RegistryConfig {
    /// 设置默认缓存行为。
    pub fn with_cache_by_default(mut self, enabled: bool) -> Self {
        self.cache_by_default = enabled;
        self
    }

    /// 设置嵌套深度上限。
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 某策略在当前配置下的生效结果。
    pub fn should_cache(&self, policy: CachePolicy) -> bool {
        policy.resolve(self.cache_by_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_resolution_matches_tri_state() {
        assert!(CachePolicy::UseDefault.resolve(true));
        assert!(!CachePolicy::UseDefault.resolve(false));
        assert!(CachePolicy::ForceOn.resolve(false));
        assert!(!CachePolicy::ForceOff.resolve(true));
        assert_eq!(CachePolicy::from(Some(false)), CachePolicy::ForceOff);
        assert_eq!(CachePolicy::from(None), CachePolicy::UseDefault);
    }

    #[test]
    fn builders_override_defaults() {
        let config = RegistryConfig::default()
            .with_cache_by_default(false)
            .with_max_depth(8);
        assert!(!config.should_cache(CachePolicy::UseDefault));
        assert_eq!(config.max_depth, 8);
    }
}
