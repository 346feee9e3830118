//! Bean Factory - 核心容器接口
//!
//! 参考 Spring 的 BeanFactory 架构设计：接口按能力拆成几层 trait，
//! [`DefaultListableBeanFactory`] 是唯一的实现，负责把定义变成完整初始化的实例。

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bean_post_processor::{BeanPostProcessor, DestructionAwareBeanPostProcessor};
use crate::class::{instance_type_id, same_instance, BeanClass, BeanType, ConstructorArgs, FactoryAccessor};
use crate::class_registry::ClassRegistry;
use crate::config::FactoryConfig;
use crate::constants::{
    is_factory_dereference, transformed_bean_name, AFTER_PROPERTIES_SET_METHOD, FACTORY_BEAN_PREFIX,
};
use crate::constructor_resolver::ConstructorResolver;
use crate::definition::{AutowireMode, BeanDefinition};
use crate::definition_store::DefinitionStore;
use crate::disposable::DisposableBeanAdapter;
use crate::error::{BeansError, BeansResult, ConstructorMismatch, ErrorKind};
use crate::lifecycle::DisposableBean;
use crate::property_populator::PropertyPopulator;
use crate::scope::Scope;
use crate::singleton_registry::DefaultSingletonBeanRegistry;
use crate::utils::dependency::{validate_dependency_graph, DependencyValidationError};
use crate::value::BeanObject;

/// BeanFactory - 最基础的容器接口
///
/// 注意：此 trait 不包含泛型方法，因此可以作为 trait object 使用
pub trait BeanFactory: Send + Sync {
    /// 通过名称获取 Bean；`&` 前缀返回 FactoryBean 本身
    fn get_bean(&self, name: &str) -> BeansResult<BeanObject>;

    /// 获取 Bean 并要求实例的类型与 `required` 相同
    fn get_bean_of_type(&self, name: &str, required: BeanType) -> BeansResult<BeanObject>;

    /// 检查是否包含指定名称的 Bean（定义或手动注册的单例）
    fn contains_bean(&self, name: &str) -> bool;

    fn is_singleton(&self, name: &str) -> BeansResult<bool>;

    fn is_prototype(&self, name: &str) -> BeansResult<bool>;

    /// 不创建实例，判断名称对应的对象类型
    fn is_type_match(&self, name: &str, type_id: TypeId) -> BeansResult<bool>;

    /// 名称对应的对象类型；无法确定时返回 None
    fn get_type(&self, name: &str) -> BeansResult<Option<BeanType>>;
}

/// ListableBeanFactory - 可以枚举所有 Bean 的容器
pub trait ListableBeanFactory: BeanFactory {
    fn contains_bean_definition(&self, name: &str) -> bool;

    fn get_bean_definition_count(&self) -> usize;

    /// 按注册顺序返回所有定义名称
    fn get_bean_definition_names(&self) -> Vec<String>;

    /// 类型匹配的名称，包括手动注册的单例
    ///
    /// FactoryBean 按它生产的类型匹配；按工厂自身类型匹配时返回带 `&` 前缀的名称。
    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String>;

    /// 类型匹配的所有实例，按名称顺序
    fn get_beans_of_type_id(&self, type_id: TypeId) -> BeansResult<Vec<(String, BeanObject)>>;

    /// 唯一匹配的实例；多个候选时选择 primary
    fn get_bean_by_type_id(&self, required: BeanType) -> BeansResult<BeanObject>;
}

/// BeanFactoryExt - 带类型参数的便捷方法
///
/// 泛型方法让它不能作为 trait object 使用，所以与 [`BeanFactory`] 分开。
pub trait BeanFactoryExt: ListableBeanFactory {
    /// 通过名称获取并转换为具体类型
    fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> BeansResult<Arc<T>> {
        let bean = self.get_bean_of_type(name, BeanType::of::<T>())?;
        downcast_bean(name, bean)
    }

    /// 通过类型获取唯一的 Bean
    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> BeansResult<Arc<T>> {
        let bean = self.get_bean_by_type_id(BeanType::of::<T>())?;
        downcast_bean(std::any::type_name::<T>(), bean)
    }

    /// 类型匹配的所有实例，按名称顺序
    fn get_beans_of_type<T: Any + Send + Sync>(&self) -> BeansResult<Vec<(String, Arc<T>)>> {
        self.get_beans_of_type_id(TypeId::of::<T>())?
            .into_iter()
            .map(|(name, bean)| {
                let typed = downcast_bean(&name, bean)?;
                Ok((name, typed))
            })
            .collect()
    }

    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool {
        !self.get_bean_names_for_type(TypeId::of::<T>()).is_empty()
    }
}

impl<F: ListableBeanFactory + ?Sized> BeanFactoryExt for F {}

fn downcast_bean<T: Any + Send + Sync>(name: &str, bean: BeanObject) -> BeansResult<Arc<T>> {
    bean.downcast::<T>().map_err(|_| BeansError::TypeMismatch {
        name: name.to_string(),
        required: std::any::type_name::<T>().to_string(),
        actual: "<unknown>".to_string(),
    })
}

/// ConfigurableBeanFactory - 可配置的容器
pub trait ConfigurableBeanFactory: BeanFactory {
    /// 注册 Bean 定义
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> BeansResult<()>;

    /// 使用生成的名称注册，返回该名称
    fn register_with_generated_name(&self, definition: BeanDefinition) -> BeansResult<String>;

    /// 移除 Bean 定义，同时销毁已经创建的单例
    fn remove_bean_definition(&self, name: &str) -> BeansResult<()>;

    fn get_bean_definition(&self, name: &str) -> BeansResult<BeanDefinition>;

    /// 修改 Bean 定义
    ///
    /// 用于在首次使用前调整定义
    fn modify_bean_definition<F>(&self, name: &str, modifier: F) -> BeansResult<()>
    where
        F: FnOnce(&mut BeanDefinition),
        Self: Sized;

    /// 手动注册已经构建好的单例
    fn register_singleton(&self, name: &str, instance: BeanObject) -> BeansResult<()>;

    /// 添加 BeanPostProcessor；同一个处理器再次添加时移到末尾
    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>);

    /// 添加带销毁回调的 BeanPostProcessor
    fn add_destruction_aware_bean_post_processor(
        &self,
        processor: Arc<dyn DestructionAwareBeanPostProcessor>,
    );

    fn get_bean_post_processor_count(&self) -> usize;

    /// 登记 `dependent` 依赖 `name`，销毁 `name` 前先销毁 `dependent`
    fn register_dependent_bean(&self, name: &str, dependent: &str);

    /// 登记 `containing` 包含 `contained`
    fn register_contained_bean(&self, contained: &str, containing: &str);

    fn get_dependent_beans(&self, name: &str) -> Vec<String>;

    fn get_dependencies_for_bean(&self, name: &str) -> Vec<String>;

    fn is_currently_in_creation(&self, name: &str) -> bool;

    /// 销毁调用方持有的实例（通常是原型 Bean）
    fn destroy_bean(&self, name: &str, instance: BeanObject);

    /// 销毁所有单例
    fn destroy_singletons(&self);
}

/// AutowireCapableBeanFactory - 对容器外的对象执行装配和初始化
pub trait AutowireCapableBeanFactory: BeanFactory {
    /// 按已登记的类型创建一个完整初始化、不缓存的实例
    fn create_bean_of_class(&self, class_name: &str) -> BeansResult<BeanObject>;

    /// 对外部对象执行初始化回调和后置处理器
    fn initialize_bean(&self, instance: BeanObject, name: &str) -> BeansResult<BeanObject>;

    /// 把指定定义里的属性值写入外部对象
    fn apply_bean_property_values(&self, instance: &BeanObject, name: &str) -> BeansResult<()>;
}

/// ConfigurableListableBeanFactory - 完整功能的容器接口
pub trait ConfigurableListableBeanFactory:
    ListableBeanFactory + ConfigurableBeanFactory + AutowireCapableBeanFactory
{
    /// 预实例化所有非延迟加载的单例 Bean
    fn pre_instantiate_singletons(&self) -> BeansResult<()>;

    /// 冻结配置（不再允许修改 Bean 定义）
    fn freeze_configuration(&self);

    fn is_configuration_frozen(&self) -> bool;

    /// 静态检查所有 dependsOn 关系：缺失的名称和环
    fn validate_dependencies(&self) -> BeansResult<()>;
}

/// 已注册的后置处理器
#[derive(Clone)]
enum RegisteredProcessor {
    Plain(Arc<dyn BeanPostProcessor>),
    DestructionAware(Arc<dyn DestructionAwareBeanPostProcessor>),
}

impl RegisteredProcessor {
    fn before_initialization(&self, bean: BeanObject, name: &str) -> anyhow::Result<BeanObject> {
        match self {
            RegisteredProcessor::Plain(p) => p.post_process_before_initialization(bean, name),
            RegisteredProcessor::DestructionAware(p) => p.post_process_before_initialization(bean, name),
        }
    }

    fn after_initialization(&self, bean: BeanObject, name: &str) -> anyhow::Result<BeanObject> {
        match self {
            RegisteredProcessor::Plain(p) => p.post_process_after_initialization(bean, name),
            RegisteredProcessor::DestructionAware(p) => p.post_process_after_initialization(bean, name),
        }
    }

    fn name(&self) -> &str {
        match self {
            RegisteredProcessor::Plain(p) => p.name(),
            RegisteredProcessor::DestructionAware(p) => p.name(),
        }
    }

    fn address(&self) -> *const () {
        match self {
            RegisteredProcessor::Plain(p) => Arc::as_ptr(p) as *const (),
            RegisteredProcessor::DestructionAware(p) => Arc::as_ptr(p) as *const (),
        }
    }
}

thread_local! {
    /// 当前线程正在创建的原型 Bean：(工厂地址, 名称)
    static PROTOTYPES_IN_CREATION: RefCell<HashSet<(usize, String)>> = RefCell::new(HashSet::new());
}

/// 使用 RAII 模式确保在任何情况下都会清理原型创建标记
struct PrototypeCreationGuard {
    key: (usize, String),
}

impl PrototypeCreationGuard {
    fn enter(factory: usize, name: &str) -> BeansResult<Self> {
        let key = (factory, name.to_string());
        let inserted = PROTOTYPES_IN_CREATION.with(|set| set.borrow_mut().insert(key.clone()));
        if !inserted {
            return Err(BeansError::currently_in_creation(name));
        }
        Ok(Self { key })
    }

    fn contains(factory: usize, name: &str) -> bool {
        PROTOTYPES_IN_CREATION.with(|set| set.borrow().contains(&(factory, name.to_string())))
    }
}

impl Drop for PrototypeCreationGuard {
    fn drop(&mut self) {
        PROTOTYPES_IN_CREATION.with(|set| {
            set.borrow_mut().remove(&self.key);
        });
    }
}

thread_local! {
    /// 当前线程正在满足的 dependsOn 边：(工厂地址, Bean 名称, 依赖名称)
    static DEPENDS_ON_IN_PROGRESS: RefCell<HashSet<(usize, String, String)>> = RefCell::new(HashSet::new());
}

/// 标记一条正在满足的 dependsOn 边；同一条边在栈上重复出现时不持有标记
struct DependsOnGuard {
    key: Option<(usize, String, String)>,
}

impl DependsOnGuard {
    fn enter(factory: usize, bean_name: &str, dependency: &str) -> Self {
        let key = (factory, bean_name.to_string(), dependency.to_string());
        let inserted = DEPENDS_ON_IN_PROGRESS.with(|set| set.borrow_mut().insert(key.clone()));
        Self {
            key: inserted.then_some(key),
        }
    }

    fn is_reentered(&self) -> bool {
        self.key.is_none()
    }
}

impl Drop for DependsOnGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            DEPENDS_ON_IN_PROGRESS.with(|set| {
                set.borrow_mut().remove(&key);
            });
        }
    }
}

/// DefaultListableBeanFactory - ConfigurableListableBeanFactory 的默认实现
///
/// 这是实际的 Bean 容器实现，类似 Spring 的 DefaultListableBeanFactory
pub struct DefaultListableBeanFactory {
    config: FactoryConfig,

    /// 类型标识到访问表
    classes: ClassRegistry,

    /// Bean 定义存储
    definitions: DefinitionStore,

    /// 已解析的定义，注册、移除和修改时失效
    merged_definitions: RwLock<HashMap<String, Arc<BeanDefinition>>>,

    /// 单例缓存、提前引用和依赖关系
    registry: DefaultSingletonBeanRegistry,

    /// Bean 后置处理器列表（按注册顺序）
    post_processors: RwLock<Vec<RegisteredProcessor>>,
}

impl DefaultListableBeanFactory {
    /// 创建新的 Bean 工厂，载入所有通过 inventory 提交的类型
    pub fn new() -> Self {
        Self::with_config(FactoryConfig::default())
    }

    pub fn with_config(config: FactoryConfig) -> Self {
        Self::with_classes(ClassRegistry::with_submitted_classes(), config)
    }

    pub fn with_classes(classes: ClassRegistry, config: FactoryConfig) -> Self {
        tracing::debug!("Creating bean factory with {:?}", config);
        Self {
            config,
            classes,
            definitions: DefinitionStore::new(),
            merged_definitions: RwLock::new(HashMap::new()),
            registry: DefaultSingletonBeanRegistry::new(),
            post_processors: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn class_registry(&self) -> &ClassRegistry {
        &self.classes
    }

    /// 登记一个目标类型
    pub fn register_class(&self, class: BeanClass) -> Arc<BeanClass> {
        self.classes.register(class)
    }

    fn key(&self) -> usize {
        self as *const Self as usize
    }

    // ========== 定义解析 ==========

    fn get_merged_bean_definition(&self, name: &str) -> BeansResult<Arc<BeanDefinition>> {
        if let Some(definition) = self.merged_definitions.read().get(name) {
            return Ok(definition.clone());
        }
        // 写入方先改存储再清缓存；在写锁内读取存储，清掉的旧定义不会被放回
        let mut merged = self.merged_definitions.write();
        if let Some(definition) = merged.get(name) {
            return Ok(definition.clone());
        }
        let definition = Arc::new(self.definitions.get(name)?);
        merged.insert(name.to_string(), definition.clone());
        Ok(definition)
    }

    fn reset_bean_definition(&self, name: &str) {
        self.merged_definitions.write().remove(name);
        self.registry.destroy_singleton(name);
    }

    fn resolve_class(&self, name: &str, definition: &BeanDefinition) -> BeansResult<Arc<BeanClass>> {
        let Some(class_name) = definition.class_name.as_deref() else {
            return Err(BeansError::InvalidDefinition {
                name: name.to_string(),
                resource_description: definition.resource_description.clone(),
                message: "bean definition does not specify a class".to_string(),
            });
        };
        self.classes
            .load_class(class_name)
            .ok_or_else(|| BeansError::ClassResolution {
                name: name.to_string(),
                class_name: class_name.to_string(),
                resource_description: definition.resource_description.clone(),
            })
    }

    fn committed_singleton(&self, name: &str) -> Option<BeanObject> {
        if self.registry.contains_singleton(name) {
            self.registry.get_singleton(name)
        } else {
            None
        }
    }

    fn factory_accessor(&self, instance: &BeanObject) -> Option<FactoryAccessor> {
        self.classes
            .class_for_instance(instance)
            .and_then(|class| class.factory().cloned())
    }

    fn is_factory_bean(&self, name: &str) -> bool {
        if let Some(instance) = self.committed_singleton(name) {
            return self.factory_accessor(&instance).is_some();
        }
        self.get_merged_bean_definition(name)
            .and_then(|definition| self.resolve_class(name, &definition))
            .is_ok_and(|class| class.is_factory_bean())
    }

    fn describe_instance(&self, instance: &BeanObject) -> String {
        self.classes.describe_instance(instance)
    }

    // ========== 获取 Bean ==========

    fn do_get_bean(&self, name: &str) -> BeansResult<BeanObject> {
        let bean_name = transformed_bean_name(name);
        tracing::trace!("Requesting bean: '{}'", name);

        if let Some(shared) = self.registry.get_singleton(bean_name) {
            if self.registry.is_currently_in_creation(bean_name) {
                tracing::debug!(
                    "Returning eagerly cached instance of singleton bean '{}' that is not fully initialized yet - a consequence of a circular reference",
                    bean_name
                );
            } else {
                tracing::trace!("Returning cached instance of singleton bean '{}'", bean_name);
            }
            return self.get_object_for_bean_instance(shared, name, bean_name);
        }

        let definition = self.get_merged_bean_definition(bean_name)?;
        if definition.is_abstract {
            return Err(BeansError::InvalidDefinition {
                name: bean_name.to_string(),
                resource_description: definition.resource_description.clone(),
                message: "Bean definition is abstract".to_string(),
            });
        }
        self.satisfy_depends_on(bean_name, &definition)?;

        let instance = match &definition.scope {
            Scope::Singleton => self.registry.get_or_create(bean_name, || {
                self.create_bean(bean_name, &definition).map_err(|e| {
                    // 不留下构建到一半的状态
                    self.registry.destroy_singleton(bean_name);
                    e
                })
            })?,
            Scope::Prototype => {
                let _guard = PrototypeCreationGuard::enter(self.key(), bean_name)?;
                tracing::debug!("Creating new instance of prototype bean '{}'", bean_name);
                self.create_bean(bean_name, &definition)?
            }
            Scope::Custom(scope) => {
                return Err(BeansError::UnsupportedScope {
                    name: bean_name.to_string(),
                    scope: scope.clone(),
                })
            }
        };
        self.get_object_for_bean_instance(instance, name, bean_name)
    }

    /// 先创建 dependsOn 中的所有 Bean
    fn satisfy_depends_on(&self, bean_name: &str, definition: &BeanDefinition) -> BeansResult<()> {
        let origin = definition.resource_description.as_deref();
        for dependency in &definition.depends_on {
            let dependency_name = transformed_bean_name(dependency);
            let circular = || BeansError::CircularReference {
                name: bean_name.to_string(),
                message: format!(
                    "Circular depends-on relationship between '{}' and '{}'",
                    bean_name, dependency_name
                ),
            };
            if self.config.detect_depends_on_cycles && self.registry.is_dependent(bean_name, dependency_name) {
                return Err(circular());
            }
            // 同一条边再次出现且依赖不在创建中：没有任何一方能完成
            let guard = DependsOnGuard::enter(self.key(), bean_name, dependency_name);
            if guard.is_reentered() && !self.is_currently_in_creation(dependency_name) {
                return Err(circular());
            }
            self.registry.register_dependent_bean(dependency_name, bean_name);
            self.get_bean(dependency).map_err(|e| {
                let message = if e.kind() == ErrorKind::NotFound {
                    format!("'{}' depends on missing bean '{}'", bean_name, dependency)
                } else {
                    format!("Failed to create dependency '{}' of bean '{}'", dependency, bean_name)
                };
                e.into_creation(bean_name, origin, message)
            })?;
        }
        Ok(())
    }

    /// FactoryBean 的间接规则：普通名称返回它生产的对象，`&` 前缀返回工厂本身
    fn get_object_for_bean_instance(
        &self,
        instance: BeanObject,
        name: &str,
        bean_name: &str,
    ) -> BeansResult<BeanObject> {
        let factory = self.factory_accessor(&instance);
        if is_factory_dereference(name) {
            return match factory {
                Some(_) => Ok(instance),
                None => Err(BeansError::TypeMismatch {
                    name: bean_name.to_string(),
                    required: "FactoryBean".to_string(),
                    actual: self.describe_instance(&instance),
                }),
            };
        }
        let Some(factory) = factory else {
            return Ok(instance);
        };

        if factory.is_singleton(&*instance) && self.registry.contains_singleton(bean_name) {
            self.registry.factory_object_or_insert(bean_name, || {
                self.get_object_from_factory_bean(&factory, &instance, bean_name)
            })
        } else {
            self.get_object_from_factory_bean(&factory, &instance, bean_name)
        }
    }

    fn get_object_from_factory_bean(
        &self,
        factory: &FactoryAccessor,
        instance: &BeanObject,
        bean_name: &str,
    ) -> BeansResult<BeanObject> {
        let mut object = factory.get_object(&**instance).map_err(|e| {
            BeansError::from_callback(bean_name, None, "FactoryBean threw exception on object creation", e)
        })?;
        let processors = self.post_processors.read().clone();
        for processor in &processors {
            object = processor.after_initialization(object, bean_name).map_err(|e| {
                BeansError::from_callback(
                    bean_name,
                    None,
                    format!("Post-processing of FactoryBean's object failed in {}", processor.name()),
                    e,
                )
            })?;
        }
        Ok(object)
    }

    // ========== 创建 Bean ==========

    fn create_bean(&self, bean_name: &str, definition: &BeanDefinition) -> BeansResult<BeanObject> {
        tracing::debug!("Creating instance of bean '{}'", bean_name);
        let bean = self.do_create_bean(bean_name, definition)?;
        tracing::debug!("Finished creating instance of bean '{}'", bean_name);
        Ok(bean)
    }

    /// 实例化、提前暴露、属性填充、初始化、登记销毁适配器
    fn do_create_bean(&self, bean_name: &str, definition: &BeanDefinition) -> BeansResult<BeanObject> {
        let class = self.resolve_class(bean_name, definition)?;
        let origin = definition.resource_description.as_deref();
        let raw = self.create_bean_instance(bean_name, definition, &class)?;

        let early_singleton_exposure = definition.is_singleton()
            && self.config.allow_circular_references
            && self.registry.is_currently_in_creation(bean_name);
        if early_singleton_exposure {
            tracing::debug!(
                "Eagerly caching bean '{}' to allow for resolving potential circular references",
                bean_name
            );
            let early = raw.clone();
            self.registry.add_singleton_factory(bean_name, Box::new(move || early));
        }

        PropertyPopulator::new(self)
            .populate(bean_name, definition, &class, &raw)
            .map_err(|e| e.into_creation(bean_name, origin, "Population of bean properties failed"))?;
        let mut exposed =
            self.initialize_bean_internal(bean_name, raw.clone(), Some(&class), Some(definition))?;

        if early_singleton_exposure {
            exposed = self.check_early_reference(bean_name, definition, &raw, exposed)?;
        }
        if definition.is_singleton() {
            self.register_disposable_bean_if_necessary(bean_name, &raw, class, definition);
        }
        Ok(exposed)
    }

    fn create_bean_instance(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        class: &BeanClass,
    ) -> BeansResult<BeanObject> {
        if definition.has_constructor_args() {
            return ConstructorResolver::new(self).autowire_constructor(bean_name, definition, class);
        }
        let constructor = class.no_arg_constructor().ok_or_else(|| BeansError::ConstructorResolution {
            name: bean_name.to_string(),
            resource_description: definition.resource_description.clone(),
            mismatch: ConstructorMismatch::NoMatching,
            message: format!("No default constructor found on [{}]", class.name()),
        })?;
        constructor
            .instantiate(&ConstructorArgs::new(Vec::new()))
            .map_err(|e| {
                BeansError::from_callback(
                    bean_name,
                    definition.resource_description.as_deref(),
                    "Instantiation of bean failed",
                    e,
                )
            })
    }

    /// 提前引用已经注入到其他 Bean 时，最终对象应当仍是同一个实例
    fn check_early_reference(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        raw: &BeanObject,
        exposed: BeanObject,
    ) -> BeansResult<BeanObject> {
        let Some(early) = self.registry.get_singleton_with(bean_name, false) else {
            return Ok(exposed);
        };
        if same_instance(&exposed, raw) {
            return Ok(early);
        }

        let message = format!(
            "Bean with name '{}' has been injected into other beans [{}] in its raw version as part of a circular reference, \
             but has eventually been wrapped. This means that said other beans do not use the final version of the bean.",
            bean_name,
            self.registry.get_dependent_beans(bean_name).join(",")
        );
        if self.config.reject_wrapped_early_references {
            return Err(BeansError::creation(
                bean_name,
                definition.resource_description.clone(),
                message,
            ));
        }
        tracing::warn!("{}", message);
        Ok(exposed)
    }

    /// BeanNameAware、初始化前置处理器、初始化回调、初始化后置处理器
    fn initialize_bean_internal(
        &self,
        bean_name: &str,
        bean: BeanObject,
        class: Option<&Arc<BeanClass>>,
        definition: Option<&BeanDefinition>,
    ) -> BeansResult<BeanObject> {
        let origin = definition.and_then(|d| d.resource_description.as_deref());

        if let Some(aware) = class.and_then(|c| c.name_aware()) {
            aware(&*bean, bean_name).map_err(|e| {
                BeansError::from_callback(bean_name, origin, "Invocation of BeanNameAware failed", e)
            })?;
        }

        // 快照，处理器内部可以回调容器
        let processors = self.post_processors.read().clone();
        let mut current = bean;
        for processor in &processors {
            current = processor.before_initialization(current, bean_name).map_err(|e| {
                BeansError::from_callback(
                    bean_name,
                    origin,
                    format!("{} failed before initialization", processor.name()),
                    e,
                )
            })?;
        }

        self.invoke_init_methods(bean_name, &current, class, definition)?;

        for processor in &processors {
            current = processor.after_initialization(current, bean_name).map_err(|e| {
                BeansError::from_callback(
                    bean_name,
                    origin,
                    format!("{} failed after initialization", processor.name()),
                    e,
                )
            })?;
        }
        Ok(current)
    }

    fn invoke_init_methods(
        &self,
        bean_name: &str,
        bean: &BeanObject,
        class: Option<&Arc<BeanClass>>,
        definition: Option<&BeanDefinition>,
    ) -> BeansResult<()> {
        let origin = definition.and_then(|d| d.resource_description.as_deref());
        // 前置处理器可能换掉了实例
        let class = match class {
            Some(class) if class.bean_type().type_id() == instance_type_id(bean) => Some(class.clone()),
            _ => self.classes.class_for_instance(bean),
        };

        let initializing = class.as_ref().and_then(|c| c.initializing());
        if let Some(init) = initializing {
            tracing::debug!("Invoking after_properties_set() on bean with name '{}'", bean_name);
            init(&**bean).map_err(|e| {
                BeansError::from_callback(bean_name, origin, "Invocation of init method failed", e)
            })?;
        }

        let init_method = definition
            .and_then(|d| d.init_method_name.as_deref())
            .filter(|name| !name.trim().is_empty());
        let Some(method_name) = init_method else {
            return Ok(());
        };
        if initializing.is_some() && method_name == AFTER_PROPERTIES_SET_METHOD {
            return Ok(());
        }
        let method = class
            .as_ref()
            .and_then(|c| c.method(method_name))
            .ok_or_else(|| {
                BeansError::creation(
                    bean_name,
                    origin.map(str::to_string),
                    format!(
                        "Couldn't find an init method named '{}' on bean with name '{}'",
                        method_name, bean_name
                    ),
                )
            })?;
        tracing::debug!("Invoking init method '{}' on bean with name '{}'", method_name, bean_name);
        method(&**bean).map_err(|e| {
            BeansError::from_callback(
                bean_name,
                origin,
                format!("Invocation of init method '{}' failed", method_name),
                e,
            )
        })
    }

    fn destruction_aware_processors(&self) -> Vec<Arc<dyn DestructionAwareBeanPostProcessor>> {
        self.post_processors
            .read()
            .iter()
            .filter_map(|processor| match processor {
                RegisteredProcessor::DestructionAware(p) => Some(p.clone()),
                RegisteredProcessor::Plain(_) => None,
            })
            .collect()
    }

    fn register_disposable_bean_if_necessary(
        &self,
        bean_name: &str,
        raw: &BeanObject,
        class: Arc<BeanClass>,
        definition: &BeanDefinition,
    ) {
        let processors = self.destruction_aware_processors();
        let destroy_method = definition.destroy_method_name.as_deref();
        let required = DisposableBeanAdapter::has_destroy_method(Some(&*class), destroy_method)
            || processors.iter().any(|p| p.requires_destruction(&**raw));
        if !required {
            return;
        }
        let adapter = DisposableBeanAdapter::new(
            raw.clone(),
            bean_name,
            Some(class),
            definition.destroy_method_name.clone(),
            &processors,
        );
        self.registry.register_disposable_bean(bean_name, Box::new(adapter));
    }

    // ========== 供解析器使用 ==========

    /// 解析对另一个 Bean 的引用，并登记依赖关系
    pub(crate) fn resolve_bean_reference(
        &self,
        requester: &str,
        definition: &BeanDefinition,
        reference: &str,
        target: &str,
    ) -> BeansResult<BeanObject> {
        let bean = self.get_bean(reference).map_err(|e| {
            e.into_creation(
                requester,
                definition.resource_description.as_deref(),
                format!("Cannot resolve reference to bean '{}' while setting {}", reference, target),
            )
        })?;
        self.registry
            .register_dependent_bean(transformed_bean_name(reference), requester);
        Ok(bean)
    }

    /// 按类型自动装配的候选：排除自身和不参与自动装配的定义
    pub(crate) fn find_autowire_candidate(
        &self,
        bean_name: &str,
        required: BeanType,
    ) -> BeansResult<Option<String>> {
        let candidates: Vec<String> = self
            .get_bean_names_for_type(required.type_id())
            .into_iter()
            .filter(|name| transformed_bean_name(name) != bean_name)
            .filter(|name| {
                self.get_merged_bean_definition(transformed_bean_name(name))
                    .map_or(true, |definition| definition.autowire_candidate)
            })
            .collect();
        self.determine_unique_candidate(required, candidates)
    }

    fn determine_unique_candidate(
        &self,
        required: BeanType,
        mut candidates: Vec<String>,
    ) -> BeansResult<Option<String>> {
        if candidates.len() <= 1 {
            return Ok(candidates.pop());
        }
        let primaries: Vec<&String> = candidates
            .iter()
            .filter(|name| {
                self.get_merged_bean_definition(transformed_bean_name(name))
                    .is_ok_and(|definition| definition.primary)
            })
            .collect();
        if primaries.len() == 1 {
            return Ok(Some(primaries[0].clone()));
        }
        Err(BeansError::NoUniqueBean {
            type_name: required.type_name().to_string(),
            candidates,
        })
    }

    /// 手动注册、没有对应定义的单例中类型匹配的名称
    fn manual_singleton_names_for_type(&self, type_id: TypeId) -> Vec<String> {
        let mut names = Vec::new();
        for name in self.registry.singleton_names() {
            if self.definitions.contains(&name) {
                continue;
            }
            let Some(instance) = self.committed_singleton(&name) else {
                continue;
            };
            let own_type_matches = instance_type_id(&instance) == type_id;
            match self.factory_accessor(&instance) {
                Some(factory) if factory.object_type().type_id() == type_id => names.push(name),
                Some(_) if own_type_matches => names.push(format!("{}{}", FACTORY_BEAN_PREFIX, name)),
                None if own_type_matches => names.push(name),
                _ => {}
            }
        }
        names
    }
}

impl Default for DefaultListableBeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> BeansResult<BeanObject> {
        self.do_get_bean(name)
    }

    fn get_bean_of_type(&self, name: &str, required: BeanType) -> BeansResult<BeanObject> {
        let bean = self.do_get_bean(name)?;
        if instance_type_id(&bean) != required.type_id() {
            return Err(BeansError::TypeMismatch {
                name: name.to_string(),
                required: required.type_name().to_string(),
                actual: self.describe_instance(&bean),
            });
        }
        Ok(bean)
    }

    fn contains_bean(&self, name: &str) -> bool {
        let bean_name = transformed_bean_name(name);
        if self.registry.contains_singleton(bean_name) || self.definitions.contains(bean_name) {
            return !is_factory_dereference(name) || self.is_factory_bean(bean_name);
        }
        false
    }

    fn is_singleton(&self, name: &str) -> BeansResult<bool> {
        let bean_name = transformed_bean_name(name);
        if let Some(instance) = self.committed_singleton(bean_name) {
            return Ok(match self.factory_accessor(&instance) {
                Some(factory) if !is_factory_dereference(name) => factory.is_singleton(&*instance),
                _ => true,
            });
        }
        Ok(self.get_merged_bean_definition(bean_name)?.is_singleton())
    }

    fn is_prototype(&self, name: &str) -> BeansResult<bool> {
        let bean_name = transformed_bean_name(name);
        if let Some(instance) = self.committed_singleton(bean_name) {
            return Ok(match self.factory_accessor(&instance) {
                Some(factory) if !is_factory_dereference(name) => !factory.is_singleton(&*instance),
                _ => false,
            });
        }
        Ok(self.get_merged_bean_definition(bean_name)?.is_prototype())
    }

    fn is_type_match(&self, name: &str, type_id: TypeId) -> BeansResult<bool> {
        let bean_name = transformed_bean_name(name);
        if let Some(instance) = self.committed_singleton(bean_name) {
            return Ok(match self.factory_accessor(&instance) {
                Some(factory) if !is_factory_dereference(name) => {
                    factory.object_type().type_id() == type_id
                }
                _ => instance_type_id(&instance) == type_id,
            });
        }
        Ok(self
            .get_type(name)?
            .is_some_and(|ty| ty.type_id() == type_id))
    }

    fn get_type(&self, name: &str) -> BeansResult<Option<BeanType>> {
        let bean_name = transformed_bean_name(name);
        let class = match self.committed_singleton(bean_name) {
            Some(instance) => self.classes.class_for_instance(&instance),
            None => {
                let definition = self.get_merged_bean_definition(bean_name)?;
                if definition.is_abstract {
                    return Ok(None);
                }
                Some(self.resolve_class(bean_name, &definition)?)
            }
        };
        Ok(class.map(|class| {
            if is_factory_dereference(name) {
                class.bean_type()
            } else {
                class.object_type()
            }
        }))
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn contains_bean_definition(&self, name: &str) -> bool {
        self.definitions.contains(name)
    }

    fn get_bean_definition_count(&self) -> usize {
        self.definitions.count()
    }

    fn get_bean_definition_names(&self) -> Vec<String> {
        self.definitions.names()
    }

    fn get_bean_names_for_type(&self, type_id: TypeId) -> Vec<String> {
        let mut names = Vec::new();
        for (name, definition) in self.definitions.snapshot() {
            if definition.is_abstract {
                continue;
            }
            let class = match self.resolve_class(&name, &definition) {
                Ok(class) => class,
                Err(e) => {
                    tracing::trace!("Ignoring bean definition '{}' for type lookup: {}", name, e);
                    self.registry.on_suppressed_error(e);
                    continue;
                }
            };
            if class.object_type().type_id() == type_id {
                names.push(name);
            } else if class.is_factory_bean() && class.bean_type().type_id() == type_id {
                names.push(format!("{}{}", FACTORY_BEAN_PREFIX, name));
            }
        }
        names.extend(self.manual_singleton_names_for_type(type_id));
        names
    }

    fn get_beans_of_type_id(&self, type_id: TypeId) -> BeansResult<Vec<(String, BeanObject)>> {
        let mut beans = Vec::new();
        for name in self.get_bean_names_for_type(type_id) {
            match self.get_bean(&name) {
                Ok(bean) => beans.push((name, bean)),
                Err(e) if e.kind() == ErrorKind::CircularReference => {
                    tracing::debug!("Ignoring match to currently created bean '{}': {}", name, e);
                    self.registry.on_suppressed_error(e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(beans)
    }

    fn get_bean_by_type_id(&self, required: BeanType) -> BeansResult<BeanObject> {
        let candidates = self.get_bean_names_for_type(required.type_id());
        match self.determine_unique_candidate(required, candidates)? {
            Some(name) => self.get_bean(&name),
            None => Err(BeansError::NoSuchBeanOfType {
                type_name: required.type_name().to_string(),
            }),
        }
    }
}

impl ConfigurableBeanFactory for DefaultListableBeanFactory {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> BeansResult<()> {
        let had_singleton = self.registry.contains_singleton(name);
        let replaced = self
            .definitions
            .register(name, definition, self.config.allow_definition_overriding)?;
        if replaced.is_some() {
            tracing::info!("Overriding bean definition for bean '{}'", name);
        }
        if replaced.is_some() || had_singleton {
            self.reset_bean_definition(name);
        }
        Ok(())
    }

    fn register_with_generated_name(&self, definition: BeanDefinition) -> BeansResult<String> {
        let name = self.definitions.generate_bean_name(&definition)?;
        self.register_bean_definition(&name, definition)?;
        Ok(name)
    }

    fn remove_bean_definition(&self, name: &str) -> BeansResult<()> {
        self.definitions.remove(name)?;
        self.reset_bean_definition(name);
        Ok(())
    }

    fn get_bean_definition(&self, name: &str) -> BeansResult<BeanDefinition> {
        self.definitions.get(name)
    }

    fn modify_bean_definition<F>(&self, name: &str, modifier: F) -> BeansResult<()>
    where
        F: FnOnce(&mut BeanDefinition),
    {
        self.definitions.modify(name, modifier)?;
        self.merged_definitions.write().remove(name);
        Ok(())
    }

    fn register_singleton(&self, name: &str, instance: BeanObject) -> BeansResult<()> {
        self.registry.register_singleton(name, instance)
    }

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        self.add_processor(RegisteredProcessor::Plain(processor));
    }

    fn add_destruction_aware_bean_post_processor(
        &self,
        processor: Arc<dyn DestructionAwareBeanPostProcessor>,
    ) {
        self.add_processor(RegisteredProcessor::DestructionAware(processor));
    }

    fn get_bean_post_processor_count(&self) -> usize {
        self.post_processors.read().len()
    }

    fn register_dependent_bean(&self, name: &str, dependent: &str) {
        self.registry.register_dependent_bean(name, dependent);
    }

    fn register_contained_bean(&self, contained: &str, containing: &str) {
        self.registry.register_contained_bean(contained, containing);
    }

    fn get_dependent_beans(&self, name: &str) -> Vec<String> {
        self.registry.get_dependent_beans(name)
    }

    fn get_dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.registry.get_dependencies_for_bean(name)
    }

    fn is_currently_in_creation(&self, name: &str) -> bool {
        self.registry.is_currently_in_creation(name) || PrototypeCreationGuard::contains(self.key(), name)
    }

    fn destroy_bean(&self, name: &str, instance: BeanObject) {
        let class = self.classes.class_for_instance(&instance);
        let destroy_method = self
            .get_merged_bean_definition(name)
            .ok()
            .and_then(|definition| definition.destroy_method_name.clone());
        let adapter = DisposableBeanAdapter::new(
            instance,
            name,
            class,
            destroy_method,
            &self.destruction_aware_processors(),
        );
        if let Err(e) = adapter.destroy() {
            tracing::warn!("Destruction of bean with name '{}' failed: {:#}", name, e);
        }
    }

    fn destroy_singletons(&self) {
        tracing::info!("Destroying singletons in bean factory");
        self.registry.destroy_singletons();
    }
}

impl DefaultListableBeanFactory {
    fn add_processor(&self, processor: RegisteredProcessor) {
        let mut processors = self.post_processors.write();
        let address = processor.address();
        processors.retain(|existing| existing.address() != address);
        tracing::debug!("Adding bean post processor: {}", processor.name());
        processors.push(processor);
    }
}

impl AutowireCapableBeanFactory for DefaultListableBeanFactory {
    fn create_bean_of_class(&self, class_name: &str) -> BeansResult<BeanObject> {
        let definition = BeanDefinition::new(class_name).with_scope(Scope::Prototype);
        let class = self.resolve_class(class_name, &definition)?;
        let bean_name = class.bean_type().type_name();
        let _guard = PrototypeCreationGuard::enter(self.key(), bean_name)?;
        self.create_bean(bean_name, &definition)
    }

    fn initialize_bean(&self, instance: BeanObject, name: &str) -> BeansResult<BeanObject> {
        let class = self.classes.class_for_instance(&instance);
        let definition = self.get_merged_bean_definition(name).ok();
        self.initialize_bean_internal(name, instance, class.as_ref(), definition.as_deref())
    }

    fn apply_bean_property_values(&self, instance: &BeanObject, name: &str) -> BeansResult<()> {
        let definition = self.get_merged_bean_definition(name)?;
        let class = self.classes.class_for_instance(instance).ok_or_else(|| {
            BeansError::creation(
                name,
                definition.resource_description.clone(),
                "No class registered for the given instance",
            )
        })?;
        // 只写入显式的属性值
        let mut explicit = (*definition).clone();
        explicit.autowire_mode = AutowireMode::No;
        PropertyPopulator::new(self).populate(name, &explicit, &class, instance)
    }
}

impl ConfigurableListableBeanFactory for DefaultListableBeanFactory {
    fn pre_instantiate_singletons(&self) -> BeansResult<()> {
        tracing::debug!("Pre-instantiating singletons in {:?}", self.definitions.names());
        for (name, definition) in self.definitions.snapshot() {
            if definition.is_abstract || !definition.is_singleton() || definition.lazy_init {
                continue;
            }
            if self.resolve_class(&name, &definition)?.is_factory_bean() {
                self.get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, name))?;
            } else {
                self.get_bean(&name)?;
            }
        }
        Ok(())
    }

    fn freeze_configuration(&self) {
        self.definitions.freeze();
    }

    fn is_configuration_frozen(&self) -> bool {
        self.definitions.is_frozen()
    }

    fn validate_dependencies(&self) -> BeansResult<()> {
        let mut graph: BTreeMap<String, Vec<String>> = self
            .definitions
            .snapshot()
            .into_iter()
            .map(|(name, definition)| {
                let depends_on = definition
                    .depends_on
                    .iter()
                    .map(|dependency| transformed_bean_name(dependency).to_string())
                    .collect();
                (name, depends_on)
            })
            .collect();
        for name in self.registry.singleton_names() {
            graph.entry(name).or_default();
        }

        validate_dependency_graph(&graph).map_err(|e| match &e {
            DependencyValidationError::CircularDependency { cycle } => BeansError::CircularReference {
                name: cycle.first().cloned().unwrap_or_default(),
                message: e.to_string(),
            },
            DependencyValidationError::MissingDependency { bean, .. } => BeansError::InvalidDefinition {
                name: bean.clone(),
                resource_description: self
                    .definitions
                    .get(bean)
                    .ok()
                    .and_then(|definition| definition.resource_description),
                message: e.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::BeanDefinitionBuilder;
    use crate::lifecycle::{BeanNameAware, FactoryBean, InitializingBean};
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct Greeter {
        name: RwLock<String>,
        log: Mutex<Vec<String>>,
    }

    impl BeanNameAware for Greeter {
        fn set_bean_name(&self, name: &str) {
            self.log.lock().push(format!("aware:{}", name));
        }
    }

    impl InitializingBean for Greeter {
        fn after_properties_set(&self) -> anyhow::Result<()> {
            self.log.lock().push("after_properties_set".to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct GreetingFactory;

    impl FactoryBean for GreetingFactory {
        type Object = String;

        fn get_object(&self) -> anyhow::Result<Arc<String>> {
            Ok(Arc::new("hello".to_string()))
        }
    }

    fn factory() -> DefaultListableBeanFactory {
        let factory = DefaultListableBeanFactory::new();
        factory.register_class(
            BeanClass::builder::<Greeter>("Greeter")
                .default_constructor()
                .property("name", |g: &Greeter, name: String| *g.name.write() = name)
                .bean_name_aware()
                .initializing_bean()
                .method("setup", |g: &Greeter| g.log.lock().push("setup".to_string()))
                .build(),
        );
        factory.register_class(
            BeanClass::builder::<GreetingFactory>("GreetingFactory")
                .default_constructor()
                .factory_bean()
                .build(),
        );
        factory
    }

    fn greeter_definition() -> BeanDefinition {
        BeanDefinitionBuilder::generic_bean_definition("Greeter")
            .add_property_value("name", "world")
            .set_init_method_name("setup")
            .build()
    }

    #[test]
    fn test_singleton_is_shared() {
        let factory = factory();
        factory.register_bean_definition("greeter", greeter_definition()).unwrap();

        let first = factory.get_bean("greeter").unwrap();
        let second = factory.get_bean("greeter").unwrap();
        assert!(same_instance(&first, &second));
        assert!(factory.is_singleton("greeter").unwrap());
    }

    #[test]
    fn test_prototype_creates_new_instances() {
        let factory = factory();
        let definition = BeanDefinitionBuilder::generic_bean_definition("Greeter")
            .set_scope(Scope::Prototype)
            .build();
        factory.register_bean_definition("greeter", definition).unwrap();

        let first = factory.get_bean("greeter").unwrap();
        let second = factory.get_bean("greeter").unwrap();
        assert!(!same_instance(&first, &second));
        assert!(factory.is_prototype("greeter").unwrap());
        assert!(!factory.is_currently_in_creation("greeter"));
    }

    #[test]
    fn test_initialization_order() {
        let factory = factory();
        factory.register_bean_definition("greeter", greeter_definition()).unwrap();

        let greeter = factory.get_bean_typed::<Greeter>("greeter").unwrap();
        assert_eq!(*greeter.name.read(), "world");
        assert_eq!(
            *greeter.log.lock(),
            vec!["aware:greeter", "after_properties_set", "setup"]
        );
    }

    #[test]
    fn test_init_method_matching_callback_runs_once() {
        let factory = factory();
        let definition = BeanDefinitionBuilder::generic_bean_definition("Greeter")
            .set_init_method_name(AFTER_PROPERTIES_SET_METHOD)
            .build();
        factory.register_bean_definition("greeter", definition).unwrap();

        let greeter = factory.get_bean_typed::<Greeter>("greeter").unwrap();
        assert_eq!(*greeter.log.lock(), vec!["aware:greeter", "after_properties_set"]);
    }

    #[test]
    fn test_missing_init_method_fails() {
        let factory = factory();
        let definition = BeanDefinitionBuilder::generic_bean_definition("Greeter")
            .set_init_method_name("start")
            .build();
        factory.register_bean_definition("greeter", definition).unwrap();

        let err = factory.get_bean("greeter").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Creation);
        assert!(err.to_string().contains("Couldn't find an init method named 'start'"));
        assert!(!factory.registry.contains_singleton("greeter"));
    }

    #[test]
    fn test_unknown_class_and_scope() {
        let factory = factory();
        factory
            .register_bean_definition("ghost", BeanDefinition::new("Ghost"))
            .unwrap();
        let err = factory.get_bean("ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassResolution);

        let definition = BeanDefinitionBuilder::generic_bean_definition("Greeter")
            .set_scope(Scope::Custom("session".to_string()))
            .build();
        factory.register_bean_definition("session", definition).unwrap();
        let err = factory.get_bean("session").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedScope);
    }

    #[test]
    fn test_type_mismatch() {
        let factory = factory();
        factory.register_bean_definition("greeter", greeter_definition()).unwrap();

        let err = factory.get_bean_typed::<String>("greeter").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("String"));
        assert!(err.to_string().contains("Greeter"));
    }

    #[test]
    fn test_factory_bean_indirection() {
        let factory = factory();
        factory
            .register_bean_definition("greeting", BeanDefinition::new("GreetingFactory"))
            .unwrap();

        let greeting = factory.get_bean_typed::<String>("greeting").unwrap();
        assert_eq!(*greeting, "hello");
        let again = factory.get_bean_typed::<String>("greeting").unwrap();
        assert!(Arc::ptr_eq(&greeting, &again));

        assert!(factory.get_bean_typed::<GreetingFactory>("&greeting").is_ok());
        assert!(factory.contains_bean("&greeting"));
        assert!(factory.is_type_match("greeting", TypeId::of::<String>()).unwrap());
        assert_eq!(
            factory.get_type("&greeting").unwrap(),
            Some(BeanType::of::<GreetingFactory>())
        );
        assert_eq!(
            factory.get_bean_names_for_type(TypeId::of::<GreetingFactory>()),
            vec!["&greeting".to_string()]
        );
    }

    #[test]
    fn test_dereference_of_plain_bean_is_type_mismatch() {
        let factory = factory();
        factory.register_bean_definition("greeter", greeter_definition()).unwrap();

        assert!(!factory.contains_bean("&greeter"));
        let err = factory.get_bean("&greeter").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_lookup_by_type() {
        let factory = factory();
        factory.register_bean_definition("first", greeter_definition()).unwrap();
        assert!(factory.get_bean_by_type::<Greeter>().is_ok());

        factory.register_bean_definition("second", greeter_definition()).unwrap();
        let err = factory.get_bean_by_type::<Greeter>().unwrap_err();
        assert!(matches!(err, BeansError::NoUniqueBean { .. }));

        factory
            .modify_bean_definition("second", |definition| definition.primary = true)
            .unwrap();
        let primary = factory.get_bean_by_type::<Greeter>().unwrap();
        let second = factory.get_bean_typed::<Greeter>("second").unwrap();
        assert!(Arc::ptr_eq(&primary, &second));

        let all = factory.get_beans_of_type::<Greeter>().unwrap();
        let names: Vec<&str> = all.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);

        let err = factory.get_bean_by_type::<u64>().unwrap_err();
        assert!(matches!(err, BeansError::NoSuchBeanOfType { .. }));
    }

    #[test]
    fn test_manual_singletons() {
        let factory = factory();
        factory
            .register_singleton("answer", Arc::new(42_u64))
            .unwrap();
        assert!(factory.contains_bean("answer"));
        assert_eq!(*factory.get_bean_typed::<u64>("answer").unwrap(), 42);
        assert_eq!(*factory.get_bean_by_type::<u64>().unwrap(), 42);

        let err = factory
            .register_singleton("answer", Arc::new(7_u64))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreConflict);
    }

    #[test]
    fn test_pre_instantiate_skips_lazy_and_prototypes() {
        let factory = factory();
        factory.register_bean_definition("eager", greeter_definition()).unwrap();
        factory
            .register_bean_definition(
                "lazy",
                BeanDefinitionBuilder::generic_bean_definition("Greeter")
                    .set_lazy_init(true)
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "proto",
                BeanDefinitionBuilder::generic_bean_definition("Greeter")
                    .set_scope(Scope::Prototype)
                    .build(),
            )
            .unwrap();
        factory
            .register_bean_definition("greeting", BeanDefinition::new("GreetingFactory"))
            .unwrap();

        factory.pre_instantiate_singletons().unwrap();
        assert!(factory.registry.contains_singleton("eager"));
        assert!(factory.registry.contains_singleton("greeting"));
        assert!(!factory.registry.contains_singleton("lazy"));
        assert!(!factory.registry.contains_singleton("proto"));
    }

    #[test]
    fn test_abstract_definition_cannot_be_instantiated() {
        let factory = factory();
        factory
            .register_bean_definition(
                "template",
                BeanDefinitionBuilder::abstract_bean_definition().build(),
            )
            .unwrap();
        let err = factory.get_bean("template").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDefinition);
    }

    #[test]
    fn test_post_processor_re_registration_moves_to_end() {
        struct Named(&'static str);

        impl BeanPostProcessor for Named {
            fn name(&self) -> &str {
                self.0
            }
        }

        let factory = factory();
        let first: Arc<dyn BeanPostProcessor> = Arc::new(Named("first"));
        let second: Arc<dyn BeanPostProcessor> = Arc::new(Named("second"));
        factory.add_bean_post_processor(first.clone());
        factory.add_bean_post_processor(second);
        factory.add_bean_post_processor(first);

        let names: Vec<String> = factory
            .post_processors
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(factory.get_bean_post_processor_count(), 2);
    }

    #[test]
    fn test_create_and_initialize_external_beans() {
        let factory = factory();
        let created = factory.create_bean_of_class("Greeter").unwrap();
        let created = created.downcast::<Greeter>().unwrap();
        assert_eq!(created.log.lock().len(), 2);
        assert!(factory.get_bean_definition_names().is_empty());

        factory.register_bean_definition("greeter", greeter_definition()).unwrap();
        let external: BeanObject = Arc::new(Greeter::default());
        factory.apply_bean_property_values(&external, "greeter").unwrap();
        let external = factory.initialize_bean(external, "greeter").unwrap();
        let external = external.downcast::<Greeter>().unwrap();
        assert_eq!(*external.name.read(), "world");
        assert_eq!(
            *external.log.lock(),
            vec!["aware:greeter", "after_properties_set", "setup"]
        );
    }

    #[test]
    fn test_merged_definition_follows_concurrent_replacement() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let factory = DefaultListableBeanFactory::with_classes(
            ClassRegistry::new(),
            FactoryConfig::default().allow_definition_overriding(true),
        );
        let subject = |scope: Scope| BeanDefinitionBuilder::generic_bean_definition("Greeter").set_scope(scope).build();
        factory.register_bean_definition("subject", subject(Scope::Singleton)).unwrap();

        for _ in 0..50 {
            let stop = AtomicBool::new(false);
            std::thread::scope(|s| {
                s.spawn(|| {
                    while !stop.load(Ordering::SeqCst) {
                        let _ = factory.is_prototype("subject");
                    }
                });
                for scope in [Scope::Prototype, Scope::Singleton, Scope::Prototype] {
                    factory.register_bean_definition("subject", subject(scope)).unwrap();
                }
                stop.store(true, Ordering::SeqCst);
            });
            // 缓存里不能留下被替换掉的定义
            assert!(factory.is_prototype("subject").unwrap());
            factory.register_bean_definition("subject", subject(Scope::Singleton)).unwrap();
            assert!(!factory.is_prototype("subject").unwrap());
        }
    }
}
