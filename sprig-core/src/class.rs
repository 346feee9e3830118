//! 类型访问表
//!
//! 容器不依赖运行时反射。每个可以被定义引用的目标类型都要登记一张 [`BeanClass`]：
//! 有哪些构造函数（参数类型和参数名）、哪些可写属性（setter 和字段）、
//! 哪些可按名称调用的方法，以及实现了哪些生命周期接口。
//!
//! # 示例
//!
//! ```ignore
//! let class = BeanClass::builder::<Person>("Person")
//!     .constructor(
//!         vec![Param::bean::<Mother>("mother"), Param::value::<String>("name")],
//!         |args| Ok(Person::new(args.bean::<Mother>(0)?, args.get::<String>(1)?)),
//!     )
//!     .property("age", |p: &Person, age: u32| *p.age.write() = age)
//!     .method("init", |p: &Person| p.init())
//!     .build();
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::anyhow;

use crate::convert::{SimpleType, SimpleValue};
use crate::lifecycle::{BeanNameAware, DisposableBean, FactoryBean, InitializingBean};
use crate::value::BeanObject;
use crate::IntoResult;

/// 无参方法（init-method、destroy-method 以及生命周期回调）
pub type MethodFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;

type ConstructFn = Arc<dyn Fn(&ConstructorArgs) -> anyhow::Result<BeanObject> + Send + Sync>;
type ApplyFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync), BeanObject) -> anyhow::Result<()> + Send + Sync>;
type NameAwareFn = Arc<dyn Fn(&(dyn Any + Send + Sync), &str) -> anyhow::Result<()> + Send + Sync>;
type FactoryObjectFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<BeanObject> + Send + Sync>;
type FactorySingletonFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync>;

/// 实例的实际类型
pub fn instance_type_id(instance: &BeanObject) -> TypeId {
    (**instance).type_id()
}

/// 两个句柄是否指向同一个对象
pub fn same_instance(a: &BeanObject, b: &BeanObject) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn downcast<T: Any>(bean: &(dyn Any + Send + Sync)) -> anyhow::Result<&T> {
    bean.downcast_ref::<T>()
        .ok_or_else(|| anyhow!("instance is not of type '{}'", std::any::type_name::<T>()))
}

/// 具体的 Rust 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeanType {
    type_id: TypeId,
    type_name: &'static str,
}

impl BeanType {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 去掉模块路径的类型名
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }
}

impl fmt::Display for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)
    }
}

pub(crate) fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let start = base.rfind("::").map(|i| i + 2).unwrap_or(0);
    &type_name[start..]
}

/// 构造参数或属性声明的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// 可以由字面量转换得到的简单类型
    Simple(SimpleType),
    /// 某个具体类型的 Bean
    Bean(BeanType),
    /// 任意 Bean
    AnyBean,
}

impl ParamType {
    pub fn is_simple(&self) -> bool {
        matches!(self, ParamType::Simple(_))
    }

    /// 已有实例能否直接赋给该类型
    pub fn accepts_instance(&self, instance: &BeanObject) -> bool {
        match self {
            ParamType::Simple(ty) => ty.type_id() == instance_type_id(instance),
            ParamType::Bean(ty) => ty.type_id() == instance_type_id(instance),
            ParamType::AnyBean => true,
        }
    }

    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            ParamType::Simple(ty) => Some(ty.type_id()),
            ParamType::Bean(ty) => Some(ty.type_id()),
            ParamType::AnyBean => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParamType::Simple(ty) => ty.type_name(),
            ParamType::Bean(ty) => ty.type_name(),
            ParamType::AnyBean => "any",
        }
    }

    /// 定义里的类型提示是否指向该类型（全名或去掉路径的短名）
    pub fn matches_type_hint(&self, hint: &str) -> bool {
        let hint = hint.trim();
        let name = self.type_name();
        name == hint || short_type_name(name) == hint || short_type_name(hint) == short_type_name(name)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// 构造函数参数
#[derive(Debug, Clone)]
pub struct Param {
    name: Option<String>,
    ty: ParamType,
}

impl Param {
    pub fn value<V: SimpleValue>(name: impl Into<String>) -> Self {
        Self::of_type(name, ParamType::Simple(V::simple_type()))
    }

    pub fn bean<B: Any + Send + Sync>(name: impl Into<String>) -> Self {
        Self::of_type(name, ParamType::Bean(BeanType::of::<B>()))
    }

    pub fn any_bean(name: impl Into<String>) -> Self {
        Self::of_type(name, ParamType::AnyBean)
    }

    pub fn of_type(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }

    /// 没有参数名的参数，只能按位置匹配
    pub fn positional(ty: ParamType) -> Self {
        Self { name: None, ty }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn param_type(&self) -> &ParamType {
        &self.ty
    }
}

/// 传给构造函数的已解析参数
pub struct ConstructorArgs {
    values: Vec<BeanObject>,
}

impl ConstructorArgs {
    pub(crate) fn new(values: Vec<BeanObject>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn object(&self, index: usize) -> anyhow::Result<BeanObject> {
        self.values
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("constructor argument index {} out of range", index))
    }

    /// 取出简单类型的参数值
    pub fn get<T: Clone + 'static>(&self, index: usize) -> anyhow::Result<T> {
        let value = self.object(index)?;
        value.downcast_ref::<T>().cloned().ok_or_else(|| {
            anyhow!(
                "constructor argument {} is not of type '{}'",
                index,
                std::any::type_name::<T>()
            )
        })
    }

    /// 取出 Bean 类型的参数
    pub fn bean<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Arc<T>> {
        self.object(index)?.downcast::<T>().map_err(|_| {
            anyhow!(
                "constructor argument {} is not a bean of type '{}'",
                index,
                std::any::type_name::<T>()
            )
        })
    }
}

/// 一个构造函数
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Param>,
    invoke: ConstructFn,
}

impl Constructor {
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// 所有参数名；只要有一个参数没有名字就返回 None
    pub fn param_names(&self) -> Option<Vec<&str>> {
        self.params.iter().map(|p| p.name()).collect()
    }

    pub(crate) fn instantiate(&self, args: &ConstructorArgs) -> anyhow::Result<BeanObject> {
        (self.invoke)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name().unwrap_or("_"), p.param_type()))
            .collect();
        write!(f, "Constructor({})", params.join(", "))
    }
}

/// 可写属性（setter 或字段）
#[derive(Clone)]
pub struct PropertyAccessor {
    name: String,
    ty: ParamType,
    apply: ApplyFn,
}

impl PropertyAccessor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> &ParamType {
        &self.ty
    }

    pub(crate) fn apply(
        &self,
        bean: &(dyn Any + Send + Sync),
        value: BeanObject,
    ) -> anyhow::Result<()> {
        (self.apply)(bean, value)
    }
}

impl fmt::Debug for PropertyAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// FactoryBean 能力
#[derive(Clone)]
pub struct FactoryAccessor {
    object_type: BeanType,
    get_object: FactoryObjectFn,
    is_singleton: FactorySingletonFn,
}

impl FactoryAccessor {
    pub fn object_type(&self) -> BeanType {
        self.object_type
    }

    pub(crate) fn get_object(&self, factory: &(dyn Any + Send + Sync)) -> anyhow::Result<BeanObject> {
        (self.get_object)(factory)
    }

    pub(crate) fn is_singleton(&self, factory: &(dyn Any + Send + Sync)) -> bool {
        (self.is_singleton)(factory)
    }
}

/// 一个目标类型的访问表
#[derive(Clone)]
pub struct BeanClass {
    name: String,
    bean_type: BeanType,
    constructors: Vec<Constructor>,
    setters: Vec<PropertyAccessor>,
    fields: Vec<PropertyAccessor>,
    methods: HashMap<String, MethodFn>,
    initializing: Option<MethodFn>,
    disposable: Option<MethodFn>,
    name_aware: Option<NameAwareFn>,
    factory: Option<FactoryAccessor>,
}

impl BeanClass {
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> BeanClassBuilder<T> {
        BeanClassBuilder {
            class: BeanClass {
                name: name.into(),
                bean_type: BeanType::of::<T>(),
                constructors: Vec::new(),
                setters: Vec::new(),
                fields: Vec::new(),
                methods: HashMap::new(),
                initializing: None,
                disposable: None,
                name_aware: None,
                factory: None,
            },
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bean_type(&self) -> BeanType {
        self.bean_type
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    pub fn no_arg_constructor(&self) -> Option<&Constructor> {
        self.constructors.iter().find(|c| c.param_count() == 0)
    }

    pub fn setters(&self) -> &[PropertyAccessor] {
        &self.setters
    }

    pub fn setter(&self, name: &str) -> Option<&PropertyAccessor> {
        self.setters.iter().find(|s| s.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&PropertyAccessor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodFn> {
        self.methods.get(name)
    }

    pub fn initializing(&self) -> Option<&MethodFn> {
        self.initializing.as_ref()
    }

    pub fn disposable(&self) -> Option<&MethodFn> {
        self.disposable.as_ref()
    }

    pub(crate) fn name_aware(&self) -> Option<&NameAwareFn> {
        self.name_aware.as_ref()
    }

    pub fn factory(&self) -> Option<&FactoryAccessor> {
        self.factory.as_ref()
    }

    pub fn is_factory_bean(&self) -> bool {
        self.factory.is_some()
    }

    /// 通过名称获取时得到的对象类型：FactoryBean 是它生产的类型
    pub fn object_type(&self) -> BeanType {
        match &self.factory {
            Some(factory) => factory.object_type(),
            None => self.bean_type,
        }
    }
}

impl fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanClass")
            .field("name", &self.name)
            .field("type", &self.bean_type.type_name())
            .field("constructors", &self.constructors)
            .field("setters", &self.setters)
            .field("fields", &self.fields)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("factory_bean", &self.factory.is_some())
            .finish()
    }
}

/// [`BeanClass`] 的构建器
pub struct BeanClassBuilder<T> {
    class: BeanClass,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanClassBuilder<T> {
    pub fn constructor<F>(mut self, params: Vec<Param>, f: F) -> Self
    where
        F: Fn(&ConstructorArgs) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.class.constructors.push(Constructor {
            params,
            invoke: Arc::new(move |args: &ConstructorArgs| Ok(Arc::new(f(args)?) as BeanObject)),
        });
        self
    }

    /// 无参构造函数
    pub fn no_arg<F>(self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructor(Vec::new(), move |_| Ok(f()))
    }

    /// 以 `Default` 作为无参构造函数
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.no_arg(T::default)
    }

    /// 简单类型的 setter
    pub fn property<V, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        V: SimpleValue,
        F: Fn(&T, V) + Send + Sync + 'static,
    {
        let accessor = value_accessor::<T, V, F>(name.into(), f);
        self.class.setters.push(accessor);
        self
    }

    /// Bean 引用的 setter
    pub fn reference<B, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        B: Any + Send + Sync,
        F: Fn(&T, Arc<B>) + Send + Sync + 'static,
    {
        let accessor = reference_accessor::<T, B, F>(name.into(), f);
        self.class.setters.push(accessor);
        self
    }

    /// 任意声明类型的 setter，值以原始句柄传入
    pub fn setter<F>(mut self, name: impl Into<String>, ty: ParamType, f: F) -> Self
    where
        F: Fn(&T, BeanObject) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.class.setters.push(PropertyAccessor {
            name: name.into(),
            ty,
            apply: Arc::new(move |bean: &(dyn Any + Send + Sync), value: BeanObject| {
                f(downcast::<T>(bean)?, value)
            }),
        });
        self
    }

    /// 没有 setter 时直接赋值的字段
    pub fn field<V, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        V: SimpleValue,
        F: Fn(&T, V) + Send + Sync + 'static,
    {
        let accessor = value_accessor::<T, V, F>(name.into(), f);
        self.class.fields.push(accessor);
        self
    }

    pub fn field_reference<B, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        B: Any + Send + Sync,
        F: Fn(&T, Arc<B>) + Send + Sync + 'static,
    {
        let accessor = reference_accessor::<T, B, F>(name.into(), f);
        self.class.fields.push(accessor);
        self
    }

    /// 可以作为 init-method 或 destroy-method 引用的无参方法
    pub fn method<R, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        R: IntoResult,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.class.methods.insert(
            name.into(),
            Arc::new(move |bean: &(dyn Any + Send + Sync)| {
                f(downcast::<T>(bean)?).into_result()
            }),
        );
        self
    }

    pub fn initializing_bean(mut self) -> Self
    where
        T: InitializingBean,
    {
        self.class.initializing = Some(Arc::new(|bean: &(dyn Any + Send + Sync)| {
            downcast::<T>(bean)?.after_properties_set()
        }));
        self
    }

    pub fn disposable_bean(mut self) -> Self
    where
        T: DisposableBean,
    {
        self.class.disposable = Some(Arc::new(|bean: &(dyn Any + Send + Sync)| {
            downcast::<T>(bean)?.destroy()
        }));
        self
    }

    pub fn bean_name_aware(mut self) -> Self
    where
        T: BeanNameAware,
    {
        self.class.name_aware = Some(Arc::new(|bean: &(dyn Any + Send + Sync), name: &str| {
            downcast::<T>(bean)?.set_bean_name(name);
            Ok(())
        }));
        self
    }

    pub fn factory_bean(mut self) -> Self
    where
        T: FactoryBean,
    {
        self.class.factory = Some(FactoryAccessor {
            object_type: BeanType::of::<T::Object>(),
            get_object: Arc::new(|bean: &(dyn Any + Send + Sync)| {
                let object = downcast::<T>(bean)?.get_object()?;
                Ok(object as BeanObject)
            }),
            is_singleton: Arc::new(|bean: &(dyn Any + Send + Sync)| {
                bean.downcast_ref::<T>()
                    .map(|factory| factory.is_singleton())
                    .unwrap_or(false)
            }),
        });
        self
    }

    pub fn build(self) -> BeanClass {
        self.class
    }
}

fn value_accessor<T, V, F>(name: String, f: F) -> PropertyAccessor
where
    T: Any + Send + Sync,
    V: SimpleValue,
    F: Fn(&T, V) + Send + Sync + 'static,
{
    PropertyAccessor {
        name,
        ty: ParamType::Simple(V::simple_type()),
        apply: Arc::new(move |bean: &(dyn Any + Send + Sync), value: BeanObject| {
            let value = value.downcast_ref::<V>().cloned().ok_or_else(|| {
                anyhow!("value is not of type '{}'", std::any::type_name::<V>())
            })?;
            f(downcast::<T>(bean)?, value);
            Ok(())
        }),
    }
}

fn reference_accessor<T, B, F>(name: String, f: F) -> PropertyAccessor
where
    T: Any + Send + Sync,
    B: Any + Send + Sync,
    F: Fn(&T, Arc<B>) + Send + Sync + 'static,
{
    PropertyAccessor {
        name,
        ty: ParamType::Bean(BeanType::of::<B>()),
        apply: Arc::new(move |bean: &(dyn Any + Send + Sync), value: BeanObject| {
            let value = value
                .downcast::<B>()
                .map_err(|_| anyhow!("value is not a bean of type '{}'", std::any::type_name::<B>()))?;
            f(downcast::<T>(bean)?, value);
            Ok(())
        }),
    }
}
