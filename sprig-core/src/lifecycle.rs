use std::any::Any;
use std::sync::Arc;

/// 属性设置完成后的初始化回调
/// 类似 Spring 的 InitializingBean
///
/// 通过 [`BeanClassBuilder::initializing_bean`](crate::class::BeanClassBuilder::initializing_bean)
/// 登记到类型的访问表中才会被调用。
pub trait InitializingBean: Send + Sync + 'static {
    /// 在所有属性注入完成、初始化前置处理器执行之后调用
    fn after_properties_set(&self) -> anyhow::Result<()>;
}

/// 销毁回调
/// 在容器销毁单例或调用方主动销毁实例时调用
pub trait DisposableBean: Send + Sync {
    fn destroy(&self) -> anyhow::Result<()>;
}

/// 获知自身在容器中的注册名称
pub trait BeanNameAware: Send + Sync + 'static {
    fn set_bean_name(&self, name: &str);
}

/// 生产其他对象的工厂 Bean
///
/// 通过名称获取时返回它生产的对象；以 `&` 前缀获取时返回工厂本身。
///
/// # 示例
///
/// ```ignore
/// struct PasswordFactory {
///     encoded: RwLock<Option<String>>,
/// }
///
/// impl FactoryBean for PasswordFactory {
///     type Object = String;
///
///     fn get_object(&self) -> anyhow::Result<Arc<String>> {
///         let encoded = self.encoded.read().clone().unwrap_or_default();
///         Ok(Arc::new(decode(&encoded)?))
///     }
/// }
/// ```
pub trait FactoryBean: Send + Sync + 'static {
    type Object: Any + Send + Sync;

    fn get_object(&self) -> anyhow::Result<Arc<Self::Object>>;

    /// 生产的对象是否共享（共享时缓存在工厂自身的单例旁边）
    fn is_singleton(&self) -> bool {
        true
    }
}
