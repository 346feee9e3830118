//! 目标类型解析
//!
//! 定义里的目标类型只是一个字符串标识，由 [`ClassRegistry`] 解析为 [`BeanClass`]。
//! 类型既可以显式登记，也可以在任意 crate 中通过 `inventory::submit!` 提交：
//!
//! ```ignore
//! inventory::submit! {
//!     ClassSubmission::new(|| BeanClass::builder::<Mother>("Mother").default_constructor().build())
//! }
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::class::{instance_type_id, BeanClass};
use crate::value::BeanObject;

/// 类型提交记录 - 用于 inventory 收集
pub struct ClassSubmission {
    pub register: fn() -> BeanClass,
}

impl ClassSubmission {
    pub const fn new(register: fn() -> BeanClass) -> Self {
        Self { register }
    }
}

inventory::collect!(ClassSubmission);

/// 类型标识到访问表的映射
#[derive(Default)]
pub struct ClassRegistry {
    by_name: RwLock<HashMap<String, Arc<BeanClass>>>,
    by_type: RwLock<HashMap<TypeId, Arc<BeanClass>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建注册表并载入所有通过 inventory 提交的类型
    pub fn with_submitted_classes() -> Self {
        let registry = Self::new();
        for submission in inventory::iter::<ClassSubmission> {
            registry.register((submission.register)());
        }
        registry
    }

    /// 登记类型；同名或同类型的旧记录被替换
    ///
    /// 类型可以通过登记名或完整的 Rust 类型名解析。
    pub fn register(&self, class: BeanClass) -> Arc<BeanClass> {
        let class = Arc::new(class);
        let type_name = class.bean_type().type_name();
        tracing::debug!("Registering class '{}' ({})", class.name(), type_name);

        {
            let mut by_name = self.by_name.write();
            by_name.insert(class.name().to_string(), class.clone());
            if type_name != class.name() {
                by_name.insert(type_name.to_string(), class.clone());
            }
        }
        self.by_type.write().insert(class.bean_type().type_id(), class.clone());
        class
    }

    /// 按类型标识加载
    pub fn load_class(&self, name: &str) -> Option<Arc<BeanClass>> {
        self.by_name.read().get(name.trim()).cloned()
    }

    pub fn contains_class(&self, name: &str) -> bool {
        self.by_name.read().contains_key(name.trim())
    }

    pub fn class_for_type(&self, type_id: TypeId) -> Option<Arc<BeanClass>> {
        self.by_type.read().get(&type_id).cloned()
    }

    /// 实例实际类型对应的访问表
    pub fn class_for_instance(&self, instance: &BeanObject) -> Option<Arc<BeanClass>> {
        self.class_for_type(instance_type_id(instance))
    }

    /// 实例的类型名，用于错误信息
    pub fn describe_instance(&self, instance: &BeanObject) -> String {
        self.class_for_instance(instance)
            .map(|class| class.bean_type().type_name().to_string())
            .unwrap_or_else(|| "<unregistered type>".to_string())
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_type
            .read()
            .values()
            .map(|class| class.name().to_string())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Mother;

    #[derive(Default)]
    struct Submitted;

    inventory::submit! {
        ClassSubmission::new(|| BeanClass::builder::<Submitted>("Submitted").default_constructor().build())
    }

    #[test]
    fn test_register_and_load() {
        let registry = ClassRegistry::new();
        registry.register(BeanClass::builder::<Mother>("Mother").default_constructor().build());

        assert!(registry.contains_class("Mother"));
        assert!(registry.load_class(std::any::type_name::<Mother>()).is_some());
        assert!(registry.load_class("Father").is_none());
        assert!(registry.class_for_type(TypeId::of::<Mother>()).is_some());

        let instance: BeanObject = Arc::new(Mother);
        assert_eq!(registry.describe_instance(&instance), std::any::type_name::<Mother>());
        let other: BeanObject = Arc::new(7_u8);
        assert_eq!(registry.describe_instance(&other), "<unregistered type>");
    }

    #[test]
    fn test_submitted_classes_are_loaded() {
        let registry = ClassRegistry::with_submitted_classes();
        assert!(registry.contains_class("Submitted"));
        assert!(registry.class_names().contains(&"Submitted".to_string()));
    }
}
