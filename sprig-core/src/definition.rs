use std::fmt;

use crate::error::{BeansError, BeansResult};
use crate::scope::Scope;
use crate::value::{
    ArgumentMode, BeanObject, ConstructorArgumentValues, PropertyValues, ValueHolder,
};
use crate::convert::Literal;

/// 属性自动装配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutowireMode {
    /// 不自动装配
    No,
    /// 按属性名查找同名 Bean
    ByName,
    /// 按属性声明类型查找 Bean
    ByType,
    /// 按构造函数参数类型装配（不支持）
    Constructor,
}

impl Default for AutowireMode {
    fn default() -> Self {
        AutowireMode::No
    }
}

impl fmt::Display for AutowireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutowireMode::No => write!(f, "no"),
            AutowireMode::ByName => write!(f, "byName"),
            AutowireMode::ByType => write!(f, "byType"),
            AutowireMode::Constructor => write!(f, "constructor"),
        }
    }
}

/// Bean 定义 - 描述如何创建和管理 Bean
#[derive(Debug, Clone)]
pub struct BeanDefinition {
    /// 目标类型标识，由 ClassRegistry 解析
    pub class_name: Option<String>,

    /// Bean 的作用域
    pub scope: Scope,

    /// 是否延迟初始化（仅对单例有效）
    pub lazy_init: bool,

    /// 必须先于本 Bean 创建的 Bean 名称
    pub depends_on: Vec<String>,

    /// 构造参数
    pub constructor_args: ConstructorArgumentValues,

    /// 属性值
    pub property_values: PropertyValues,

    /// 自定义初始化方法名
    pub init_method_name: Option<String>,

    /// 自定义销毁方法名
    pub destroy_method_name: Option<String>,

    /// 抽象定义不会被直接实例化
    pub is_abstract: bool,

    /// 按类型查找出现多个候选时优先选择
    pub primary: bool,

    /// 是否参与按类型自动装配
    pub autowire_candidate: bool,

    pub autowire_mode: AutowireMode,

    /// 定义的来源描述（文件名、代码位置等），出现在错误信息中
    pub resource_description: Option<String>,
}

impl Default for BeanDefinition {
    fn default() -> Self {
        Self {
            class_name: None,
            scope: Scope::default(),
            lazy_init: false,
            depends_on: Vec::new(),
            constructor_args: ConstructorArgumentValues::new(),
            property_values: PropertyValues::new(),
            init_method_name: None,
            destroy_method_name: None,
            is_abstract: false,
            primary: false,
            autowire_candidate: true,
            autowire_mode: AutowireMode::No,
            resource_description: None,
        }
    }
}

impl BeanDefinition {
    /// 创建指向某个类型的定义
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::default()
        }
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// 设置延迟初始化
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy_init = lazy;
        self
    }

    pub fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_resource_description(mut self, description: impl Into<String>) -> Self {
        self.resource_description = Some(description.into());
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.scope.is_singleton()
    }

    pub fn is_prototype(&self) -> bool {
        self.scope.is_prototype()
    }

    pub fn has_constructor_args(&self) -> bool {
        !self.constructor_args.is_empty()
    }

    /// 注册前的一致性检查
    pub fn validate(&self, name: &str) -> BeansResult<()> {
        let invalid = |message: String| BeansError::InvalidDefinition {
            name: name.to_string(),
            resource_description: self.resource_description.clone(),
            message,
        };

        if name.trim().is_empty() {
            return Err(invalid("bean name must not be empty".to_string()));
        }
        if !self.is_abstract && self.class_name.as_deref().map_or(true, |c| c.trim().is_empty()) {
            return Err(invalid("non-abstract bean definition requires a class".to_string()));
        }
        if self.depends_on.iter().any(|dep| dep == name) {
            return Err(invalid("bean cannot depend on itself".to_string()));
        }
        self.constructor_args.validate().map_err(invalid)?;
        Ok(())
    }
}

/// 以编程方式构造 [`BeanDefinition`]
///
/// 按位置添加的构造参数自动递增下标。
///
/// ```
/// use sprig_core::definition::BeanDefinitionBuilder;
///
/// let definition = BeanDefinitionBuilder::generic_bean_definition("Person")
///     .add_constructor_arg_reference("mother")
///     .add_constructor_arg_value("Alice")
///     .add_constructor_arg_value(30)
///     .build();
///
/// assert_eq!(definition.constructor_args.argument_count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct BeanDefinitionBuilder {
    definition: BeanDefinition,
    constructor_arg_index: usize,
}

impl BeanDefinitionBuilder {
    pub fn generic_bean_definition(class_name: impl Into<String>) -> Self {
        Self {
            definition: BeanDefinition::new(class_name),
            constructor_arg_index: 0,
        }
    }

    /// 没有目标类型的抽象定义
    pub fn abstract_bean_definition() -> Self {
        Self {
            definition: BeanDefinition {
                is_abstract: true,
                ..BeanDefinition::default()
            },
            constructor_arg_index: 0,
        }
    }

    pub fn add_constructor_arg_value(mut self, value: impl Into<Literal>) -> Self {
        let index = self.next_index();
        self.definition
            .constructor_args
            .add_indexed_argument_value(index, ValueHolder::literal(value));
        self
    }

    pub fn add_constructor_arg_reference(mut self, bean_name: impl Into<String>) -> Self {
        let index = self.next_index();
        self.definition
            .constructor_args
            .add_indexed_argument_value(index, ValueHolder::reference(bean_name));
        self
    }

    pub fn add_constructor_arg_instance(mut self, instance: BeanObject) -> Self {
        let index = self.next_index();
        self.definition
            .constructor_args
            .add_indexed_argument_value(index, ValueHolder::instance(instance));
        self
    }

    /// 指定下标的构造参数，可以带类型提示
    pub fn add_indexed_constructor_arg(mut self, index: usize, holder: ValueHolder) -> Self {
        self.definition
            .constructor_args
            .add_indexed_argument_value(index, holder);
        self.constructor_arg_index = self.constructor_arg_index.max(index + 1);
        self
    }

    /// 按参数名匹配的构造参数
    pub fn add_named_constructor_arg(mut self, name: impl Into<String>, holder: ValueHolder) -> Self {
        self.definition
            .constructor_args
            .add_generic_argument_value(holder.with_name(name), ArgumentMode::Name);
        self
    }

    /// 按声明类型匹配的构造参数
    pub fn add_typed_constructor_arg(mut self, type_name: impl Into<String>, holder: ValueHolder) -> Self {
        self.definition
            .constructor_args
            .add_generic_argument_value(holder.with_type(type_name), ArgumentMode::Type);
        self
    }

    pub fn add_property_value(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.definition
            .property_values
            .add_value(name, ValueHolder::literal(value));
        self
    }

    pub fn add_property_reference(mut self, name: impl Into<String>, bean_name: impl Into<String>) -> Self {
        self.definition
            .property_values
            .add_value(name, ValueHolder::reference(bean_name));
        self
    }

    pub fn add_property_instance(mut self, name: impl Into<String>, instance: BeanObject) -> Self {
        self.definition
            .property_values
            .add_value(name, ValueHolder::instance(instance));
        self
    }

    pub fn set_scope(mut self, scope: Scope) -> Self {
        self.definition.scope = scope;
        self
    }

    pub fn set_lazy_init(mut self, lazy: bool) -> Self {
        self.definition.lazy_init = lazy;
        self
    }

    pub fn set_abstract(mut self, is_abstract: bool) -> Self {
        self.definition.is_abstract = is_abstract;
        self
    }

    pub fn set_primary(mut self, primary: bool) -> Self {
        self.definition.primary = primary;
        self
    }

    pub fn set_autowire_candidate(mut self, candidate: bool) -> Self {
        self.definition.autowire_candidate = candidate;
        self
    }

    pub fn set_autowire_mode(mut self, mode: AutowireMode) -> Self {
        self.definition.autowire_mode = mode;
        self
    }

    pub fn add_depends_on(mut self, bean_name: impl Into<String>) -> Self {
        self.definition.depends_on.push(bean_name.into());
        self
    }

    pub fn set_init_method_name(mut self, method: impl Into<String>) -> Self {
        self.definition.init_method_name = Some(method.into());
        self
    }

    pub fn set_destroy_method_name(mut self, method: impl Into<String>) -> Self {
        self.definition.destroy_method_name = Some(method.into());
        self
    }

    pub fn set_resource_description(mut self, description: impl Into<String>) -> Self {
        self.definition.resource_description = Some(description.into());
        self
    }

    pub fn build(self) -> BeanDefinition {
        self.definition
    }

    fn next_index(&mut self) -> usize {
        let index = self.constructor_arg_index;
        self.constructor_arg_index += 1;
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::BeanValue;

    #[test]
    fn test_builder_assigns_consecutive_indexes() {
        let definition = BeanDefinitionBuilder::generic_bean_definition("Person")
            .add_constructor_arg_reference("mother")
            .add_constructor_arg_value("Alice")
            .add_indexed_constructor_arg(2, ValueHolder::literal(30).with_type("u32"))
            .add_constructor_arg_value(61.5)
            .build();

        let args = definition.constructor_args.indexed_argument_values();
        assert_eq!(args.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!(matches!(args[&0].value(), BeanValue::Reference(r) if r.bean_name() == "mother"));
        assert_eq!(args[&2].type_hint(), Some("u32"));
        assert!(definition.validate("person").is_ok());
    }

    #[test]
    fn test_defaults() {
        let definition = BeanDefinition::new("Mother");
        assert!(definition.is_singleton());
        assert!(definition.autowire_candidate);
        assert!(!definition.lazy_init);
        assert_eq!(definition.autowire_mode, AutowireMode::No);
        assert!(!definition.has_constructor_args());
    }

    #[test]
    fn test_validate_rejects_missing_class() {
        let err = BeanDefinition::default().validate("ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDefinition);

        let abstract_definition = BeanDefinitionBuilder::abstract_bean_definition().build();
        assert!(abstract_definition.validate("template").is_ok());
    }

    #[test]
    fn test_validate_rejects_broken_arguments() {
        let definition = BeanDefinitionBuilder::generic_bean_definition("Person")
            .add_indexed_constructor_arg(1, ValueHolder::literal("Alice"))
            .set_resource_description("people.toml")
            .build();
        let err = definition.validate("person").unwrap_err();
        assert!(err.to_string().contains("people.toml"));

        let definition = BeanDefinitionBuilder::generic_bean_definition("Person")
            .add_depends_on("person")
            .build();
        assert!(definition.validate("person").is_err());
    }

    #[test]
    fn test_property_values_keep_last_write() {
        let definition = BeanDefinitionBuilder::generic_bean_definition("DbConnection")
            .add_property_value("db_name", "orders")
            .add_property_reference("password", "passwordFactory")
            .add_property_value("db_name", "billing")
            .build();

        assert_eq!(definition.property_values.len(), 2);
        match definition.property_values.get("db_name").unwrap().value() {
            BeanValue::Literal(Literal::Str(s)) => assert_eq!(s, "billing"),
            other => panic!("unexpected value {:?}", other),
        }
    }
}
