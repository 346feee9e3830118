//! 构造参数与属性值的描述
//!
//! 定义里的每一个值都由 [`ValueHolder`] 承载：字面量、对另一个 Bean 的命名引用，
//! 或者调用方直接提供的实例。

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::convert::{ConversionError, ConvertedValue, Literal, SimpleType};

/// 容器管理的 Bean 实例句柄
pub type BeanObject = Arc<dyn Any + Send + Sync>;

/// 对另一个 Bean 的命名引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BeanReference {
    bean_name: String,
}

impl BeanReference {
    pub fn new(bean_name: impl Into<String>) -> Self {
        Self {
            bean_name: bean_name.into(),
        }
    }

    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }
}

#[derive(Clone)]
pub enum BeanValue {
    Literal(Literal),
    Reference(BeanReference),
    /// 已经存在的实例，原样注入
    Instance(BeanObject),
}

impl fmt::Debug for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanValue::Literal(l) => f.debug_tuple("Literal").field(l).finish(),
            BeanValue::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
            BeanValue::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

impl fmt::Display for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanValue::Literal(l) => write!(f, "'{}'", l),
            BeanValue::Reference(r) => write!(f, "<ref bean='{}'>", r.bean_name()),
            BeanValue::Instance(_) => write!(f, "<instance>"),
        }
    }
}

impl From<Literal> for BeanValue {
    fn from(value: Literal) -> Self {
        BeanValue::Literal(value)
    }
}

impl From<BeanReference> for BeanValue {
    fn from(value: BeanReference) -> Self {
        BeanValue::Reference(value)
    }
}

/// 值容器：值本身、可选的类型/名称提示，以及一次性的转换结果缓存
#[derive(Debug, Clone)]
pub struct ValueHolder {
    value: BeanValue,
    type_hint: Option<String>,
    name: Option<String>,
    converted: OnceLock<(TypeId, ConvertedValue)>,
}

impl ValueHolder {
    pub fn new(value: impl Into<BeanValue>) -> Self {
        Self {
            value: value.into(),
            type_hint: None,
            name: None,
            converted: OnceLock::new(),
        }
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        Self::new(BeanValue::Literal(value.into()))
    }

    pub fn reference(bean_name: impl Into<String>) -> Self {
        Self::new(BeanValue::Reference(BeanReference::new(bean_name)))
    }

    pub fn instance(instance: BeanObject) -> Self {
        Self::new(BeanValue::Instance(instance))
    }

    pub fn with_type(mut self, type_hint: impl Into<String>) -> Self {
        self.type_hint = Some(type_hint.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn value(&self) -> &BeanValue {
        &self.value
    }

    pub fn type_hint(&self) -> Option<&str> {
        self.type_hint.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.value, BeanValue::Literal(_))
    }

    /// 把字面量转换为目标简单类型
    ///
    /// 第一次成功的转换会被缓存；之后对同一目标类型的请求直接返回缓存值。
    /// 对不同目标类型的请求照常转换，但不覆盖缓存。
    pub fn convert_literal(
        &self,
        literal: &Literal,
        target: &SimpleType,
    ) -> Result<ConvertedValue, ConversionError> {
        let target_id = target.type_id();
        if let Some((cached_type, cached)) = self.converted.get() {
            if *cached_type == target_id {
                return Ok(cached.clone());
            }
        }
        let converted = target.convert(literal)?;
        let _ = self.converted.set((target_id, converted.clone()));
        Ok(converted)
    }

    pub fn is_converted(&self) -> bool {
        self.converted.get().is_some()
    }
}

/// 构造参数的匹配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentMode {
    /// 按位置匹配
    Index,
    /// 按参数名匹配
    Name,
    /// 按声明类型匹配（只做校验，解析时不支持）
    Type,
}

impl Default for ArgumentMode {
    fn default() -> Self {
        ArgumentMode::Index
    }
}

impl fmt::Display for ArgumentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentMode::Index => write!(f, "by-index"),
            ArgumentMode::Name => write!(f, "by-name"),
            ArgumentMode::Type => write!(f, "by-type"),
        }
    }
}

/// 构造参数描述
#[derive(Debug, Clone, Default)]
pub struct ConstructorArgumentValues {
    indexed: BTreeMap<usize, ValueHolder>,
    generic: Vec<ValueHolder>,
    mode: ArgumentMode,
}

impl ConstructorArgumentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_indexed_argument_value(&mut self, index: usize, holder: ValueHolder) {
        self.indexed.insert(index, holder);
    }

    /// 添加按名或按类型匹配的参数，同时切换到对应的匹配方式
    pub fn add_generic_argument_value(&mut self, holder: ValueHolder, mode: ArgumentMode) {
        self.mode = mode;
        self.generic.push(holder);
    }

    pub fn indexed_argument_values(&self) -> &BTreeMap<usize, ValueHolder> {
        &self.indexed
    }

    pub fn indexed_argument_value(&self, index: usize) -> Option<&ValueHolder> {
        self.indexed.get(&index)
    }

    pub fn generic_argument_values(&self) -> &[ValueHolder] {
        &self.generic
    }

    /// 按参数名查找
    pub fn named_argument_value(&self, name: &str) -> Option<&ValueHolder> {
        self.generic.iter().find(|h| h.name() == Some(name))
    }

    pub fn mode(&self) -> ArgumentMode {
        if self.indexed.is_empty() && !self.generic.is_empty() {
            self.mode
        } else {
            ArgumentMode::Index
        }
    }

    pub fn argument_count(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.argument_count() == 0
    }

    /// 检查参数描述是否自洽，返回第一个问题
    pub fn validate(&self) -> Result<(), String> {
        if !self.indexed.is_empty() && !self.generic.is_empty() {
            return Err(
                "indexed and generic constructor arguments cannot be mixed".to_string(),
            );
        }
        for (expected, index) in self.indexed.keys().enumerate() {
            if *index != expected {
                return Err(format!(
                    "constructor argument indexes must be contiguous from 0, missing index {}",
                    expected
                ));
            }
        }
        match self.mode() {
            ArgumentMode::Index => {}
            ArgumentMode::Name => {
                let mut seen = std::collections::HashSet::new();
                for holder in &self.generic {
                    let name = holder.name().ok_or_else(|| {
                        "by-name constructor arguments require a name".to_string()
                    })?;
                    if !seen.insert(name) {
                        return Err(format!("duplicate constructor argument name '{}'", name));
                    }
                }
            }
            ArgumentMode::Type => {
                if self.generic.iter().any(|h| h.type_hint().is_none()) {
                    return Err("by-type constructor arguments require a type".to_string());
                }
            }
        }
        Ok(())
    }
}

/// 单个属性值
#[derive(Debug, Clone)]
pub struct PropertyValue {
    name: String,
    holder: ValueHolder,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, holder: ValueHolder) -> Self {
        Self {
            name: name.into(),
            holder,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn holder(&self) -> &ValueHolder {
        &self.holder
    }

    pub fn value(&self) -> &BeanValue {
        self.holder.value()
    }
}

/// 有序、按名称去重的属性值列表
#[derive(Debug, Clone, Default)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名属性覆盖原位置的值
    pub fn add(&mut self, value: PropertyValue) {
        match self.values.iter_mut().find(|pv| pv.name == value.name) {
            Some(existing) => *existing = value,
            None => self.values.push(value),
        }
    }

    pub fn add_value(&mut self, name: impl Into<String>, holder: ValueHolder) {
        self.add(PropertyValue::new(name, holder));
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.iter().find(|pv| pv.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let pos = self.values.iter().position(|pv| pv.name == name)?;
        Some(self.values.remove(pos))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PropertyValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<'a> IntoIterator for &'a PropertyValues {
    type Item = &'a PropertyValue;
    type IntoIter = std::slice::Iter<'a, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
