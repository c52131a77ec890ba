//! 领域模型错误定义
//!
//! 客户端核心只有两类可恢复的错误：输入校验失败，以及在当前会话阶段不允许的操作。
//! 两者都在产生任何副作用之前返回。

use crate::session::SessionPhase;
use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 验证错误（必填字段为空）
    #[error("验证失败: {field}: {message}")]
    ValidationError { field: String, message: String },

    /// 当前会话阶段不允许该操作
    #[error("操作 `{operation}` 在 {phase} 阶段不可用")]
    InvalidPhase {
        operation: &'static str,
        phase: SessionPhase,
    },
}

impl DomainError {
    /// 创建验证错误
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建阶段错误
    pub fn invalid_phase(operation: &'static str, phase: SessionPhase) -> Self {
        Self::InvalidPhase { operation, phase }
    }

    /// 是否为校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError { .. })
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
