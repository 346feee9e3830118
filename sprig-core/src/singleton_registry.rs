//! 单例注册表
//!
//! 保存已经完成的单例、创建中的标记、用于打破循环引用的提前引用，
//! 以及决定销毁顺序的依赖关系。
//!
//! 单例的整个构建过程都在同一把可重入锁内进行：同一线程在构建中递归获取其他 Bean
//! 可以重入，其他线程的创建请求则排队等待。已经完成的单例可以不经过这把锁直接读取。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::error::{BeansError, BeansResult};
use crate::lifecycle::DisposableBean;
use crate::value::BeanObject;

/// 延迟提供提前引用的工厂，最多调用一次
pub type EarlyReferenceFactory = Box<dyn FnOnce() -> BeanObject + Send>;

#[derive(Default)]
struct EarlyReferences {
    factories: HashMap<String, EarlyReferenceFactory>,
    objects: HashMap<String, BeanObject>,
}

#[derive(Default)]
struct DependencyGraph {
    /// 名称 -> 依赖它的 Bean
    dependent: HashMap<String, Vec<String>>,
    /// 名称 -> 它依赖的 Bean
    dependencies_for: HashMap<String, Vec<String>>,
    /// 名称 -> 它包含的 Bean
    contained: HashMap<String, Vec<String>>,
}

fn insert_unique(map: &mut HashMap<String, Vec<String>>, key: &str, value: &str) {
    let entries = map.entry(key.to_string()).or_default();
    if !entries.iter().any(|v| v == value) {
        entries.push(value.to_string());
    }
}

#[derive(Default)]
pub struct DefaultSingletonBeanRegistry {
    creation_lock: ReentrantMutex<()>,
    singleton_objects: RwLock<HashMap<String, BeanObject>>,
    early: Mutex<EarlyReferences>,
    /// 注册顺序
    registered_singletons: Mutex<Vec<String>>,
    in_creation: Mutex<HashSet<String>>,
    in_destruction: AtomicBool,
    /// 最外层单例创建期间被压制的错误
    suppressed: Mutex<Option<Vec<BeansError>>>,
    disposable_beans: Mutex<Vec<(String, Box<dyn DisposableBean>)>>,
    dependencies: Mutex<DependencyGraph>,
    /// FactoryBean 生产的共享对象
    factory_objects: Mutex<HashMap<String, BeanObject>>,
}

impl DefaultSingletonBeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 手动注册一个已经构建好的单例
    pub fn register_singleton(&self, name: &str, object: BeanObject) -> BeansResult<()> {
        let _guard = self.creation_lock.lock();
        if self.singleton_objects.read().contains_key(name) {
            return Err(BeansError::StoreConflict {
                name: name.to_string(),
                resource_description: None,
                message: "Could not register object: there is already an object bound".to_string(),
            });
        }
        self.add_singleton(name, object);
        tracing::debug!("Registered singleton '{}'", name);
        Ok(())
    }

    fn add_singleton(&self, name: &str, object: BeanObject) {
        self.singleton_objects.write().insert(name.to_string(), object);
        {
            let mut early = self.early.lock();
            early.factories.remove(name);
            early.objects.remove(name);
        }
        self.add_registered_name(name);
    }

    fn add_registered_name(&self, name: &str) {
        let mut registered = self.registered_singletons.lock();
        if !registered.iter().any(|n| n == name) {
            registered.push(name.to_string());
        }
    }

    /// 已完成的单例，或者创建中的单例的提前引用
    pub fn get_singleton(&self, name: &str) -> Option<BeanObject> {
        self.get_singleton_with(name, true)
    }

    /// `allow_early_reference` 为 false 时只返回已经生成过的提前引用，不会调用提前引用工厂
    pub fn get_singleton_with(&self, name: &str, allow_early_reference: bool) -> Option<BeanObject> {
        if let Some(object) = self.singleton_objects.read().get(name).cloned() {
            return Some(object);
        }
        if !self.is_currently_in_creation(name) {
            return None;
        }

        // 其他线程正在构建时在这里等待它完成
        let _guard = self.creation_lock.lock();
        if let Some(object) = self.singleton_objects.read().get(name).cloned() {
            return Some(object);
        }
        let factory = {
            let mut early = self.early.lock();
            if let Some(object) = early.objects.get(name) {
                return Some(object.clone());
            }
            if !allow_early_reference {
                return None;
            }
            early.factories.remove(name)?
        };
        let object = factory();
        self.early
            .lock()
            .objects
            .insert(name.to_string(), object.clone());
        tracing::trace!("Returning early reference to singleton '{}'", name);
        Some(object)
    }

    /// 返回已完成的单例，不存在时调用 `build` 创建并缓存
    ///
    /// 构建失败时不会缓存任何东西；调用方负责清理构建过程中登记的其他状态。
    pub fn get_or_create<F>(&self, name: &str, build: F) -> BeansResult<BeanObject>
    where
        F: FnOnce() -> BeansResult<BeanObject>,
    {
        let _guard = self.creation_lock.lock();
        if let Some(object) = self.singleton_objects.read().get(name).cloned() {
            return Ok(object);
        }
        if self.in_destruction.load(Ordering::SeqCst) {
            return Err(BeansError::creation(
                name,
                None,
                "Singleton bean creation not allowed while singletons of this factory are in destruction \
                 (Do not request a bean from a BeanFactory in a destroy method implementation!)",
            ));
        }

        tracing::debug!("Creating shared instance of singleton bean '{}'", name);
        self.before_singleton_creation(name)?;
        let record_suppressed = {
            let mut suppressed = self.suppressed.lock();
            if suppressed.is_none() {
                *suppressed = Some(Vec::new());
                true
            } else {
                false
            }
        };

        let result = build();

        let suppressed = if record_suppressed {
            self.suppressed.lock().take()
        } else {
            None
        };
        self.after_singleton_creation(name);

        match result {
            Ok(object) => {
                self.add_singleton(name, object.clone());
                Ok(object)
            }
            Err(mut err) => {
                for cause in suppressed.into_iter().flatten() {
                    err.add_related_cause(cause);
                }
                Err(err)
            }
        }
    }

    fn before_singleton_creation(&self, name: &str) -> BeansResult<()> {
        if !self.in_creation.lock().insert(name.to_string()) {
            return Err(BeansError::currently_in_creation(name));
        }
        Ok(())
    }

    fn after_singleton_creation(&self, name: &str) {
        if !self.in_creation.lock().remove(name) {
            tracing::warn!("Singleton '{}' isn't currently in creation", name);
        }
    }

    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.in_creation.lock().contains(name)
    }

    /// 在构建过程中登记提前引用工厂；名称已经有完成的单例时忽略
    pub fn add_singleton_factory(&self, name: &str, factory: EarlyReferenceFactory) {
        let _guard = self.creation_lock.lock();
        if self.singleton_objects.read().contains_key(name) {
            return;
        }
        {
            let mut early = self.early.lock();
            early.factories.insert(name.to_string(), factory);
            early.objects.remove(name);
        }
        self.add_registered_name(name);
    }

    /// 从所有缓存中移除，不触发销毁回调
    pub fn remove_singleton(&self, name: &str) {
        let _guard = self.creation_lock.lock();
        self.singleton_objects.write().remove(name);
        {
            let mut early = self.early.lock();
            early.factories.remove(name);
            early.objects.remove(name);
        }
        self.registered_singletons.lock().retain(|n| n != name);
        self.factory_objects.lock().remove(name);
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singleton_objects.read().contains_key(name)
    }

    /// 按注册顺序返回单例名称
    pub fn singleton_names(&self) -> Vec<String> {
        self.registered_singletons.lock().clone()
    }

    pub fn singleton_count(&self) -> usize {
        self.registered_singletons.lock().len()
    }

    /// 记录在当前单例创建过程中被压制的错误
    pub fn on_suppressed_error(&self, err: BeansError) {
        if let Some(suppressed) = self.suppressed.lock().as_mut() {
            suppressed.push(err);
        }
    }

    // ========== FactoryBean 产物缓存 ==========

    pub fn cached_factory_object(&self, name: &str) -> Option<BeanObject> {
        self.factory_objects.lock().get(name).cloned()
    }

    /// 返回缓存的产物，没有时调用 `produce` 生成并缓存
    ///
    /// 如果 `produce` 内部的递归调用已经放入了产物，以先放入的为准。
    pub fn factory_object_or_insert<F>(&self, name: &str, produce: F) -> BeansResult<BeanObject>
    where
        F: FnOnce() -> BeansResult<BeanObject>,
    {
        let _guard = self.creation_lock.lock();
        if let Some(object) = self.cached_factory_object(name) {
            return Ok(object);
        }
        let object = produce()?;
        let mut cache = self.factory_objects.lock();
        Ok(cache.entry(name.to_string()).or_insert(object).clone())
    }

    // ========== 依赖关系 ==========

    /// 登记 `dependent` 依赖 `name`
    pub fn register_dependent_bean(&self, name: &str, dependent: &str) {
        let mut graph = self.dependencies.lock();
        insert_unique(&mut graph.dependent, name, dependent);
        insert_unique(&mut graph.dependencies_for, dependent, name);
    }

    /// 登记 `containing` 包含 `contained`；销毁外层 Bean 时一并销毁
    pub fn register_contained_bean(&self, contained: &str, containing: &str) {
        insert_unique(&mut self.dependencies.lock().contained, containing, contained);
        self.register_dependent_bean(contained, containing);
    }

    /// `dependent` 是否直接或间接依赖 `name`
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let graph = self.dependencies.lock();
        let mut seen = HashSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(dependents) = graph.dependent.get(&current) {
                if dependents.iter().any(|d| d == dependent) {
                    return true;
                }
                pending.extend(dependents.iter().cloned());
            }
        }
        false
    }

    pub fn has_dependent_bean(&self, name: &str) -> bool {
        self.dependencies.lock().dependent.contains_key(name)
    }

    pub fn get_dependent_beans(&self, name: &str) -> Vec<String> {
        self.dependencies
            .lock()
            .dependent
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.dependencies
            .lock()
            .dependencies_for
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    // ========== 销毁 ==========

    /// 登记销毁适配器；同名的旧适配器被替换并保持原来的位置
    pub fn register_disposable_bean(&self, name: &str, adapter: Box<dyn DisposableBean>) {
        let mut disposables = self.disposable_beans.lock();
        match disposables.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = adapter,
            None => disposables.push((name.to_string(), adapter)),
        }
    }

    pub fn has_disposable_bean(&self, name: &str) -> bool {
        self.disposable_beans.lock().iter().any(|(n, _)| n == name)
    }

    pub fn is_in_destruction(&self) -> bool {
        self.in_destruction.load(Ordering::SeqCst)
    }

    /// 按注册的逆序销毁所有单例，然后清空所有缓存
    pub fn destroy_singletons(&self) {
        tracing::debug!("Destroying singletons");
        self.in_destruction.store(true, Ordering::SeqCst);

        let names: Vec<String> = self
            .disposable_beans
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        *self.dependencies.lock() = DependencyGraph::default();
        {
            let _guard = self.creation_lock.lock();
            self.singleton_objects.write().clear();
            *self.early.lock() = EarlyReferences::default();
            self.registered_singletons.lock().clear();
            self.factory_objects.lock().clear();
        }
        self.in_destruction.store(false, Ordering::SeqCst);
    }

    /// 销毁单个单例：先销毁依赖它的 Bean，再调用它自己的销毁适配器，最后销毁它包含的 Bean
    ///
    /// 重复调用是安全的。
    pub fn destroy_singleton(&self, name: &str) {
        self.remove_singleton(name);
        let adapter = {
            let mut disposables = self.disposable_beans.lock();
            disposables
                .iter()
                .position(|(n, _)| n == name)
                .map(|index| disposables.remove(index).1)
        };
        self.destroy_bean(name, adapter);
    }

    fn destroy_bean(&self, name: &str, adapter: Option<Box<dyn DisposableBean>>) {
        let dependents = self.dependencies.lock().dependent.remove(name);
        for dependent in dependents.into_iter().flatten() {
            self.destroy_singleton(&dependent);
        }

        if let Some(adapter) = adapter {
            tracing::debug!("Invoking destroy callbacks of bean '{}'", name);
            if let Err(e) = adapter.destroy() {
                tracing::error!(
                    "Destroy method on bean with name '{}' threw an error: {:#}",
                    name,
                    e
                );
            }
        }

        let contained = self.dependencies.lock().contained.remove(name);
        for contained_name in contained.into_iter().flatten() {
            self.destroy_singleton(&contained_name);
        }

        let mut graph = self.dependencies.lock();
        graph.dependent.retain(|_, dependents| {
            dependents.retain(|d| d != name);
            !dependents.is_empty()
        });
        graph.dependencies_for.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::same_instance;
    use crate::error::ErrorKind;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl DisposableBean for Recorder {
        fn destroy(&self) -> anyhow::Result<()> {
            self.log.lock().push(self.name.to_string());
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn DisposableBean> {
        Box::new(Recorder {
            name,
            log: log.clone(),
        })
    }

    #[test]
    fn test_get_or_create_commits_once() {
        let registry = DefaultSingletonBeanRegistry::new();
        let calls = AtomicUsize::new(0);
        let build = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(1_u8) as BeanObject)
        };

        let first = registry.get_or_create("one", build).unwrap();
        let second = registry
            .get_or_create("one", || panic!("must not rebuild"))
            .unwrap();
        assert!(same_instance(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registry.is_currently_in_creation("one"));
        assert_eq!(registry.singleton_names(), vec!["one"]);
    }

    #[test]
    fn test_failed_build_commits_nothing() {
        let registry = DefaultSingletonBeanRegistry::new();
        let err = registry
            .get_or_create("broken", || Err(BeansError::creation("broken", None, "boom")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Creation);
        assert!(!registry.contains_singleton("broken"));
        assert!(!registry.is_currently_in_creation("broken"));

        let retried = registry
            .get_or_create("broken", || Ok(Arc::new("fixed") as BeanObject))
            .unwrap();
        assert_eq!(retried.downcast_ref::<&str>(), Some(&"fixed"));
    }

    #[test]
    fn test_reentrant_creation_is_circular() {
        let registry = DefaultSingletonBeanRegistry::new();
        let err = registry
            .get_or_create("a", || {
                registry.get_or_create("a", || Ok(Arc::new(0_u8) as BeanObject))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircularReference);
    }

    #[test]
    fn test_early_reference_factory_invoked_once() {
        let registry = DefaultSingletonBeanRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let raw: BeanObject = Arc::new(String::from("raw"));

        let result = registry
            .get_or_create("a", || {
                let counter = calls.clone();
                let exposed = raw.clone();
                registry.add_singleton_factory(
                    "a",
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        exposed
                    }),
                );
                assert!(registry.get_singleton_with("a", false).is_none());
                let first = registry.get_singleton("a").unwrap();
                let second = registry.get_singleton("a").unwrap();
                assert!(same_instance(&first, &second));
                assert!(registry.get_singleton_with("a", false).is_some());
                Ok(raw.clone())
            })
            .unwrap();

        assert!(same_instance(&result, &raw));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_suppressed_errors_become_related_causes() {
        let registry = DefaultSingletonBeanRegistry::new();
        let err = registry
            .get_or_create("a", || {
                registry.on_suppressed_error(BeansError::NoSuchBean { name: "x".to_string() });
                Err(BeansError::creation("a", None, "failed"))
            })
            .unwrap_err();
        assert_eq!(err.related_causes().len(), 1);

        // 创建之外的错误不会被记录
        registry.on_suppressed_error(BeansError::NoSuchBean { name: "y".to_string() });
        let err = registry
            .get_or_create("b", || Err(BeansError::creation("b", None, "failed")))
            .unwrap_err();
        assert!(err.related_causes().is_empty());
    }

    #[test]
    fn test_register_singleton_conflict() {
        let registry = DefaultSingletonBeanRegistry::new();
        registry.register_singleton("a", Arc::new(1_u8)).unwrap();
        let err = registry.register_singleton("a", Arc::new(2_u8)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreConflict);

        registry.remove_singleton("a");
        registry.register_singleton("a", Arc::new(3_u8)).unwrap();
    }

    #[test]
    fn test_dependents_destroyed_first() {
        let registry = DefaultSingletonBeanRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register_disposable_bean("db", recorder("db", &log));
        registry.register_disposable_bean("service", recorder("service", &log));
        registry.register_disposable_bean("controller", recorder("controller", &log));
        registry.register_dependent_bean("db", "service");
        registry.register_dependent_bean("service", "controller");

        assert!(registry.is_dependent("db", "controller"));
        assert!(!registry.is_dependent("controller", "db"));

        registry.destroy_singleton("db");
        assert_eq!(*log.lock(), vec!["controller", "service", "db"]);
        assert!(registry.get_dependent_beans("db").is_empty());
        assert!(registry.get_dependencies_for_bean("service").is_empty());

        registry.destroy_singleton("db");
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn test_destroy_singletons_in_reverse_order() {
        let registry = DefaultSingletonBeanRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register_disposable_bean("inner", recorder("inner", &log));
        for name in ["first", "second", "third"] {
            registry
                .get_or_create(name, || Ok(Arc::new(name) as BeanObject))
                .unwrap();
            registry.register_disposable_bean(name, recorder(name, &log));
        }
        registry.register_contained_bean("inner", "first");

        registry.destroy_singletons();
        assert_eq!(*log.lock(), vec!["third", "second", "first", "inner"]);
        assert_eq!(registry.singleton_count(), 0);
        assert!(!registry.is_in_destruction());
    }

    #[test]
    fn test_creation_rejected_during_destruction() {
        struct Greedy {
            registry: Arc<DefaultSingletonBeanRegistry>,
            outcome: Arc<Mutex<Option<ErrorKind>>>,
        }

        impl DisposableBean for Greedy {
            fn destroy(&self) -> anyhow::Result<()> {
                let result = self
                    .registry
                    .get_or_create("late", || Ok(Arc::new(0_u8) as BeanObject));
                *self.outcome.lock() = result.err().map(|e| e.kind());
                Ok(())
            }
        }

        let registry = Arc::new(DefaultSingletonBeanRegistry::new());
        let outcome = Arc::new(Mutex::new(None));
        registry.register_disposable_bean(
            "greedy",
            Box::new(Greedy {
                registry: registry.clone(),
                outcome: outcome.clone(),
            }),
        );
        registry.destroy_singletons();
        assert_eq!(*outcome.lock(), Some(ErrorKind::Creation));
        assert!(!registry.contains_singleton("late"));
    }

    #[test]
    fn test_factory_object_cache_evicted_with_singleton() {
        let registry = DefaultSingletonBeanRegistry::new();
        registry.register_singleton("factory", Arc::new(0_u8)).unwrap();
        let first = registry
            .factory_object_or_insert("factory", || Ok(Arc::new(1_u32) as BeanObject))
            .unwrap();
        let second = registry
            .factory_object_or_insert("factory", || Ok(Arc::new(2_u32) as BeanObject))
            .unwrap();
        assert!(same_instance(&first, &second));

        registry.remove_singleton("factory");
        assert!(registry.cached_factory_object("factory").is_none());
    }
}
