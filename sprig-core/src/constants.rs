/// 容器保留的名称常量
///
/// 名称前缀、作用域名以及约定的回调方法名集中定义在这里，
/// 保证定义、工厂和销毁适配器使用相同的标识符

/// 以此前缀请求 FactoryBean 本身，而不是它生产的对象
pub const FACTORY_BEAN_PREFIX: &str = "&";

/// 作用域名称
pub const SCOPE_SINGLETON: &str = "singleton";
pub const SCOPE_PROTOTYPE: &str = "prototype";

/// 自动生成的 Bean 名称与序号之间的分隔符
pub const GENERATED_BEAN_NAME_SEPARATOR: &str = "#";

/// InitializingBean 回调的方法名，与 init-method 同名时只调用一次
pub const AFTER_PROPERTIES_SET_METHOD: &str = "after_properties_set";

/// DisposableBean 回调的方法名，与 destroy-method 同名时只调用一次
pub const DESTROY_METHOD: &str = "destroy";

/// 环境变量配置的前缀
pub const ENV_PREFIX: &str = "SPRIG_";

/// 检查名称是否以 FactoryBean 前缀开头
///
/// # Example
/// ```
/// use sprig_core::constants::is_factory_dereference;
///
/// assert!(is_factory_dereference("&connectionFactory"));
/// assert!(!is_factory_dereference("connectionFactory"));
/// ```
pub fn is_factory_dereference(name: &str) -> bool {
    name.starts_with(FACTORY_BEAN_PREFIX)
}

/// 去掉所有 FactoryBean 前缀，得到注册时使用的名称
pub fn transformed_bean_name(name: &str) -> &str {
    name.trim_start_matches(FACTORY_BEAN_PREFIX)
}
