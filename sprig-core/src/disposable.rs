//! 销毁适配器
//!
//! 把一个 Bean 的所有销毁回调打包成一个 [`DisposableBean`]，按固定顺序执行：
//! 销毁感知后置处理器、`DisposableBean::destroy`、定义中的 destroy-method。
//! 每一步的错误都只记录日志，不会中断后续步骤。

use std::sync::Arc;

use crate::bean_post_processor::DestructionAwareBeanPostProcessor;
use crate::class::BeanClass;
use crate::constants::DESTROY_METHOD;
use crate::lifecycle::DisposableBean;
use crate::value::BeanObject;

pub struct DisposableBeanAdapter {
    bean: BeanObject,
    bean_name: String,
    class: Option<Arc<BeanClass>>,
    destroy_method_name: Option<String>,
    processors: Vec<Arc<dyn DestructionAwareBeanPostProcessor>>,
}

impl DisposableBeanAdapter {
    /// 只保留对该实例声明需要销毁的处理器
    pub fn new(
        bean: BeanObject,
        bean_name: impl Into<String>,
        class: Option<Arc<BeanClass>>,
        destroy_method_name: Option<String>,
        processors: &[Arc<dyn DestructionAwareBeanPostProcessor>],
    ) -> Self {
        let processors = processors
            .iter()
            .filter(|p| p.requires_destruction(&*bean))
            .cloned()
            .collect();
        Self {
            bean,
            bean_name: bean_name.into(),
            class,
            destroy_method_name: destroy_method_name.filter(|name| !name.trim().is_empty()),
            processors,
        }
    }

    /// 实例本身是否带有销毁回调
    pub fn has_destroy_method(class: Option<&BeanClass>, destroy_method_name: Option<&str>) -> bool {
        class.is_some_and(|c| c.disposable().is_some())
            || destroy_method_name.is_some_and(|name| !name.trim().is_empty())
    }

    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }

    fn is_disposable(&self) -> bool {
        self.class
            .as_ref()
            .is_some_and(|class| class.disposable().is_some())
    }

    fn invoke_custom_destroy_method(&self, method_name: &str) {
        let method = self
            .class
            .as_ref()
            .and_then(|class| class.method(method_name));
        match method {
            Some(method) => {
                tracing::debug!(
                    "Invoking destroy method '{}' on bean with name '{}'",
                    method_name,
                    self.bean_name
                );
                if let Err(e) = method(&*self.bean) {
                    tracing::warn!(
                        "Invocation of destroy method '{}' failed on bean with name '{}': {:#}",
                        method_name,
                        self.bean_name,
                        e
                    );
                }
            }
            None => tracing::warn!(
                "Couldn't find a destroy method named '{}' on bean with name '{}'",
                method_name,
                self.bean_name
            ),
        }
    }
}

impl DisposableBean for DisposableBeanAdapter {
    fn destroy(&self) -> anyhow::Result<()> {
        for processor in &self.processors {
            if let Err(e) = processor.post_process_before_destruction(&*self.bean, &self.bean_name) {
                tracing::warn!(
                    "{} failed before destruction of bean '{}': {:#}",
                    processor.name(),
                    self.bean_name,
                    e
                );
            }
        }

        if let Some(destroy) = self.class.as_ref().and_then(|class| class.disposable()) {
            tracing::debug!("Invoking destroy() on bean with name '{}'", self.bean_name);
            if let Err(e) = destroy(&*self.bean) {
                tracing::warn!(
                    "Invocation of destroy method failed on bean with name '{}': {:#}",
                    self.bean_name,
                    e
                );
            }
        }

        if let Some(method_name) = &self.destroy_method_name {
            if !(self.is_disposable() && method_name == DESTROY_METHOD) {
                self.invoke_custom_destroy_method(method_name);
            }
        }
        Ok(())
    }
}
