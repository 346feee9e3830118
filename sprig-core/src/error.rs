//! 统一的错误类型
//!
//! 容器内部的所有失败都归入 [`BeansError`]。用户回调（构造函数、setter、
//! init/destroy 方法、FactoryBean、后置处理器）统一返回 `anyhow::Result`，
//! 在发生处被包装成带有 Bean 名称和定义来源的错误。
//!
//! # 示例
//!
//! ```rust,ignore
//! match factory.get_bean("person") {
//!     Err(e) if e.kind() == ErrorKind::CircularReference => { /* ... */ }
//!     Err(e) => return Err(e),
//!     Ok(bean) => { /* ... */ }
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// 容器操作的结果类型
pub type BeansResult<T> = std::result::Result<T, BeansError>;

/// 作为错误来源保存的任意错误
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// 错误的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 找不到定义或 Bean
    NotFound,
    /// 名称已被占用
    StoreConflict,
    /// 定义本身不合法，或配置已冻结
    InvalidDefinition,
    /// 目标类型无法解析
    ClassResolution,
    /// 没有或有多个匹配的构造函数
    ConstructorResolution,
    /// 实例化、属性填充或初始化失败
    Creation,
    /// 实例类型与要求的类型不符
    TypeMismatch,
    /// 无法打破的循环引用
    CircularReference,
    /// 不支持的作用域
    UnsupportedScope,
    /// 不支持的装配模式
    UnsupportedMode,
}

/// 构造函数匹配失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorMismatch {
    /// 没有匹配的构造函数
    NoMatching,
    /// 多个构造函数同时匹配
    Ambiguous(usize),
}

impl fmt::Display for ConstructorMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructorMismatch::NoMatching => write!(f, "no matching constructor"),
            ConstructorMismatch::Ambiguous(count) => {
                write!(f, "ambiguous constructor ({} candidates)", count)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum BeansError {
    #[error("No bean named '{name}' is defined")]
    NoSuchBean { name: String },

    #[error("No qualifying bean of type '{type_name}' is defined")]
    NoSuchBeanOfType { type_name: String },

    #[error(
        "No qualifying bean of type '{type_name}' is defined: expected single matching bean but found {}: {}",
        .candidates.len(),
        .candidates.join(",")
    )]
    NoUniqueBean {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("Cannot register bean '{name}'{}: {message}", origin(.resource_description))]
    StoreConflict {
        name: String,
        resource_description: Option<String>,
        message: String,
    },

    #[error("Invalid bean definition with name '{name}'{}: {message}", origin(.resource_description))]
    InvalidDefinition {
        name: String,
        resource_description: Option<String>,
        message: String,
    },

    #[error("Cannot {operation} bean definition '{name}': configuration is frozen")]
    ConfigurationFrozen { name: String, operation: &'static str },

    #[error(
        "Cannot find class [{class_name}] for bean with name '{name}'{}",
        origin(.resource_description)
    )]
    ClassResolution {
        name: String,
        class_name: String,
        resource_description: Option<String>,
    },

    #[error("Error creating bean with name '{name}'{}: {mismatch}: {message}", origin(.resource_description))]
    ConstructorResolution {
        name: String,
        resource_description: Option<String>,
        mismatch: ConstructorMismatch,
        message: String,
    },

    #[error(
        "Error creating bean with name '{name}'{}: {message}{}",
        origin(.resource_description),
        related_suffix(.related)
    )]
    Creation {
        name: String,
        resource_description: Option<String>,
        message: String,
        #[source]
        source: Option<BoxError>,
        related: Vec<BeansError>,
    },

    #[error("Bean named '{name}' is expected to be of type '{required}' but was actually of type '{actual}'")]
    TypeMismatch {
        name: String,
        required: String,
        actual: String,
    },

    #[error("Error creating bean with name '{name}': {message}")]
    CircularReference { name: String, message: String },

    #[error("No scope registered for scope name '{scope}' (bean '{name}')")]
    UnsupportedScope { name: String, scope: String },

    #[error("Bean '{name}' requests unsupported {mode}")]
    UnsupportedMode { name: String, mode: String },
}

fn origin(resource_description: &Option<String>) -> String {
    match resource_description {
        Some(desc) => format!(" defined in {}", desc),
        None => String::new(),
    }
}

fn related_suffix(related: &[BeansError]) -> String {
    related
        .iter()
        .map(|cause| format!("; related cause: {}", cause))
        .collect()
}

impl BeansError {
    pub fn creation(
        name: impl Into<String>,
        resource_description: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        BeansError::Creation {
            name: name.into(),
            resource_description,
            message: message.into(),
            source: None,
            related: Vec::new(),
        }
    }

    pub fn creation_with_source(
        name: impl Into<String>,
        resource_description: Option<String>,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        BeansError::Creation {
            name: name.into(),
            resource_description,
            message: message.into(),
            source: Some(source.into()),
            related: Vec::new(),
        }
    }

    /// 标准的循环引用错误
    pub fn currently_in_creation(name: impl Into<String>) -> Self {
        BeansError::CircularReference {
            name: name.into(),
            message: "Requested bean is currently in creation: Is there an unresolvable circular reference?"
                .to_string(),
        }
    }

    /// 包装用户回调返回的错误
    ///
    /// 如果回调内部本身是容器错误（例如回调里又调用了 get_bean），
    /// 先取回原始的 BeansError 再按 [`BeansError::into_creation`] 的规则处理。
    pub fn from_callback(
        name: &str,
        resource_description: Option<&str>,
        message: impl Into<String>,
        err: anyhow::Error,
    ) -> Self {
        match err.downcast::<BeansError>() {
            Ok(beans_err) => beans_err.into_creation(name, resource_description, message),
            Err(other) => BeansError::creation_with_source(
                name,
                resource_description.map(str::to_string),
                message,
                other,
            ),
        }
    }

    /// 把任意容器错误包装成属于 `name` 的 Creation 错误
    ///
    /// 循环引用错误原样保留；已经属于同一个 Bean 的 Creation 错误不会被重复包装。
    pub fn into_creation(
        self,
        name: &str,
        resource_description: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        match self {
            e @ BeansError::CircularReference { .. } => e,
            BeansError::Creation { name: ref n, .. } if n == name => self,
            other => BeansError::creation_with_source(
                name,
                resource_description.map(str::to_string),
                message,
                other,
            ),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BeansError::NoSuchBean { .. } | BeansError::NoSuchBeanOfType { .. } => {
                ErrorKind::NotFound
            }
            BeansError::NoUniqueBean { .. } => ErrorKind::NotFound,
            BeansError::StoreConflict { .. } => ErrorKind::StoreConflict,
            BeansError::InvalidDefinition { .. } | BeansError::ConfigurationFrozen { .. } => {
                ErrorKind::InvalidDefinition
            }
            BeansError::ClassResolution { .. } => ErrorKind::ClassResolution,
            BeansError::ConstructorResolution { .. } => ErrorKind::ConstructorResolution,
            BeansError::Creation { .. } => ErrorKind::Creation,
            BeansError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            BeansError::CircularReference { .. } => ErrorKind::CircularReference,
            BeansError::UnsupportedScope { .. } => ErrorKind::UnsupportedScope,
            BeansError::UnsupportedMode { .. } => ErrorKind::UnsupportedMode,
        }
    }

    /// 错误所关联的 Bean 名称
    pub fn bean_name(&self) -> Option<&str> {
        match self {
            BeansError::NoSuchBean { name }
            | BeansError::StoreConflict { name, .. }
            | BeansError::InvalidDefinition { name, .. }
            | BeansError::ConfigurationFrozen { name, .. }
            | BeansError::ClassResolution { name, .. }
            | BeansError::ConstructorResolution { name, .. }
            | BeansError::Creation { name, .. }
            | BeansError::TypeMismatch { name, .. }
            | BeansError::CircularReference { name, .. }
            | BeansError::UnsupportedScope { name, .. }
            | BeansError::UnsupportedMode { name, .. } => Some(name),
            BeansError::NoSuchBeanOfType { .. } | BeansError::NoUniqueBean { .. } => None,
        }
    }

    /// 定义的来源描述
    pub fn resource_description(&self) -> Option<&str> {
        match self {
            BeansError::StoreConflict { resource_description, .. }
            | BeansError::InvalidDefinition { resource_description, .. }
            | BeansError::ClassResolution { resource_description, .. }
            | BeansError::ConstructorResolution { resource_description, .. }
            | BeansError::Creation { resource_description, .. } => resource_description.as_deref(),
            _ => None,
        }
    }

    /// 在同一次创建过程中被压制的相关错误
    pub fn related_causes(&self) -> &[BeansError] {
        match self {
            BeansError::Creation { related, .. } => related,
            _ => &[],
        }
    }

    pub fn add_related_cause(&mut self, cause: BeansError) {
        if let BeansError::Creation { related, .. } = self {
            related.push(cause);
        }
    }

    /// 沿着 source 链查找是否包含指定类别的错误（包括自身）
    pub fn contains_kind(&self, kind: ErrorKind) -> bool {
        if self.kind() == kind {
            return true;
        }
        let mut current = StdError::source(self);
        while let Some(err) = current {
            if let Some(beans_err) = err.downcast_ref::<BeansError>() {
                if beans_err.kind() == kind {
                    return true;
                }
            }
            current = err.source();
        }
        false
    }

    /// source 链最深处的容器错误
    pub fn root_cause(&self) -> &BeansError {
        let mut root = self;
        let mut current = StdError::source(self);
        while let Some(err) = current {
            if let Some(beans_err) = err.downcast_ref::<BeansError>() {
                root = beans_err;
            }
            current = err.source();
        }
        root
    }
}
