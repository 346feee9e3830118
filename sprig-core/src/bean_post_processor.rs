//! BeanPostProcessor - Bean 工厂扩展机制
//!
//! 提供在 Bean 初始化前后以及销毁前进行自定义处理的钩子，类似 Spring 的 BeanPostProcessor。
//! 处理器按注册顺序调用，没有优先级。

use std::any::Any;

use crate::value::BeanObject;

/// BeanPostProcessor trait
///
/// 在 Bean 初始化的不同阶段提供钩子，允许替换或包装 Bean 实例
///
/// # 示例
///
/// ```ignore
/// struct LoggingPostProcessor;
///
/// impl BeanPostProcessor for LoggingPostProcessor {
///     fn post_process_after_initialization(
///         &self,
///         bean: BeanObject,
///         bean_name: &str,
///     ) -> anyhow::Result<BeanObject> {
///         tracing::info!("After initialization: {}", bean_name);
///         Ok(bean)
///     }
/// }
///
/// factory.add_bean_post_processor(Arc::new(LoggingPostProcessor));
/// ```
pub trait BeanPostProcessor: Send + Sync {
    /// 在 Bean 初始化回调（init）之前调用
    ///
    /// # 返回
    /// 处理后的 Bean 实例（原始 Bean 或包装后的 Bean）
    fn post_process_before_initialization(
        &self,
        bean: BeanObject,
        _bean_name: &str,
    ) -> anyhow::Result<BeanObject> {
        Ok(bean)
    }

    /// 在 Bean 初始化回调（init）之后调用
    ///
    /// 返回的实例如果不是原始对象，而原始对象已经作为提前引用注入到其他 Bean，
    /// 这些 Bean 持有的仍是原始对象。
    fn post_process_after_initialization(
        &self,
        bean: BeanObject,
        _bean_name: &str,
    ) -> anyhow::Result<BeanObject> {
        Ok(bean)
    }

    /// 处理器名称（用于日志）
    fn name(&self) -> &str {
        "BeanPostProcessor"
    }
}

/// 额外提供销毁前回调的处理器
///
/// 只要注册了这类处理器，每个单例都会登记销毁适配器。
pub trait DestructionAwareBeanPostProcessor: BeanPostProcessor {
    /// 在 Bean 自身的销毁回调之前调用；错误会被记录并忽略
    fn post_process_before_destruction(
        &self,
        bean: &(dyn Any + Send + Sync),
        bean_name: &str,
    ) -> anyhow::Result<()>;

    /// 该实例是否需要经过本处理器销毁
    fn requires_destruction(&self, _bean: &(dyn Any + Send + Sync)) -> bool {
        true
    }
}
