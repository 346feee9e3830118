// sprig-core: 类似 Spring 的 Bean 工厂
//
// 把声明式的 Bean 定义变成完整初始化的对象图，支持：
// - 单例和原型作用域
// - 构造函数注入和属性注入（按名称、按类型自动装配）
// - 单例之间的循环属性引用（提前暴露）
// - 生命周期管理（init/destroy 回调、BeanPostProcessor）
// - FactoryBean 间接获取

pub mod bean_factory;
pub mod bean_post_processor;
pub mod class;
pub mod class_registry;
pub mod config;
pub mod constants;
mod constructor_resolver;
pub mod convert;
pub mod definition;
pub mod definition_store;
pub mod disposable;
pub mod error;
pub mod lifecycle;
pub mod logging;
mod property_populator;
pub mod scope;
pub mod singleton_registry;
pub mod utils;
pub mod value;

// Helper trait for init/destroy callbacks
// Allows both () and Result<()> return types
pub trait IntoResult {
    fn into_result(self) -> anyhow::Result<()>;
}

impl IntoResult for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl IntoResult for anyhow::Result<()> {
    fn into_result(self) -> anyhow::Result<()> {
        self
    }
}

// 重新导出常用类型
pub use bean_factory::{
    AutowireCapableBeanFactory, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory,
    ConfigurableListableBeanFactory, DefaultListableBeanFactory, ListableBeanFactory,
};
pub use bean_post_processor::{BeanPostProcessor, DestructionAwareBeanPostProcessor};
pub use class::{BeanClass, BeanClassBuilder, BeanType, ConstructorArgs, Param, ParamType};
pub use class_registry::{ClassRegistry, ClassSubmission};
pub use config::{ConfigError, FactoryConfig};
pub use constants::*;
pub use convert::{EnumType, Literal, SimpleType, SimpleValue};
pub use definition::{AutowireMode, BeanDefinition, BeanDefinitionBuilder};
pub use error::{BeansError, BeansResult, ConstructorMismatch, ErrorKind};
pub use lifecycle::{BeanNameAware, DisposableBean, FactoryBean, InitializingBean};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use scope::Scope;
pub use value::{BeanObject, BeanReference, BeanValue, PropertyValues, ValueHolder};

// 导出 inventory，供 ClassSubmission 使用
pub use inventory;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::bean_factory::{
        AutowireCapableBeanFactory, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory,
        ConfigurableListableBeanFactory, DefaultListableBeanFactory, ListableBeanFactory,
    };
    pub use crate::bean_post_processor::{BeanPostProcessor, DestructionAwareBeanPostProcessor};
    pub use crate::class::{BeanClass, BeanType, Param, ParamType};
    pub use crate::class_registry::ClassSubmission;
    pub use crate::config::FactoryConfig;
    pub use crate::convert::SimpleType;
    pub use crate::definition::{AutowireMode, BeanDefinition, BeanDefinitionBuilder};
    pub use crate::error::{BeansError, BeansResult, ErrorKind};
    pub use crate::lifecycle::{BeanNameAware, DisposableBean, FactoryBean, InitializingBean};
    pub use crate::scope::Scope;
    pub use crate::value::{BeanObject, ValueHolder};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
