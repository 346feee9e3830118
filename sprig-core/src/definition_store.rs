//! Bean 定义存储
//!
//! 按名称保存定义并记录注册顺序。所有修改都在同一把写锁内完成，
//! 并发调用方看到的是原子的注册、删除和修改。

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::class::short_type_name;
use crate::constants::GENERATED_BEAN_NAME_SEPARATOR;
use crate::definition::BeanDefinition;
use crate::error::{BeansError, BeansResult};
use crate::utils::naming::to_camel_case;

#[derive(Default)]
struct StoreInner {
    definitions: HashMap<String, BeanDefinition>,
    /// 注册顺序
    names: Vec<String>,
}

#[derive(Default)]
pub struct DefinitionStore {
    inner: RwLock<StoreInner>,
    frozen: RwLock<bool>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册定义；名称已存在时失败，除非允许覆盖
    ///
    /// 返回被覆盖的旧定义。
    pub fn register(
        &self,
        name: &str,
        definition: BeanDefinition,
        allow_overriding: bool,
    ) -> BeansResult<Option<BeanDefinition>> {
        self.check_not_frozen(name, "register")?;
        definition.validate(name)?;

        let mut inner = self.inner.write();
        if let Some(existing) = inner.definitions.get(name) {
            if !allow_overriding {
                tracing::warn!("Bean definition '{}' already exists, registration failed", name);
                return Err(BeansError::StoreConflict {
                    name: name.to_string(),
                    resource_description: definition.resource_description.clone(),
                    message: format!(
                        "There is already [{}] bound",
                        existing.class_name.as_deref().unwrap_or("abstract bean")
                    ),
                });
            }
            tracing::debug!("Overriding bean definition for bean '{}'", name);
            let previous = inner.definitions.insert(name.to_string(), definition);
            return Ok(previous);
        }

        inner.definitions.insert(name.to_string(), definition);
        inner.names.push(name.to_string());
        tracing::debug!("Bean definition registered: '{}'", name);
        Ok(None)
    }

    pub fn remove(&self, name: &str) -> BeansResult<BeanDefinition> {
        self.check_not_frozen(name, "remove")?;

        let mut inner = self.inner.write();
        let removed = inner.definitions.remove(name).ok_or_else(|| {
            tracing::trace!("No bean named '{}' found", name);
            BeansError::NoSuchBean {
                name: name.to_string(),
            }
        })?;
        inner.names.retain(|n| n != name);
        tracing::debug!("Bean definition removed: '{}'", name);
        Ok(removed)
    }

    pub fn get(&self, name: &str) -> BeansResult<BeanDefinition> {
        self.inner
            .read()
            .definitions
            .get(name)
            .cloned()
            .ok_or_else(|| BeansError::NoSuchBean {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().definitions.contains_key(name)
    }

    /// 原地修改定义
    pub fn modify<F>(&self, name: &str, modifier: F) -> BeansResult<()>
    where
        F: FnOnce(&mut BeanDefinition),
    {
        self.check_not_frozen(name, "modify")?;

        let mut inner = self.inner.write();
        let definition = inner
            .definitions
            .get_mut(name)
            .ok_or_else(|| BeansError::NoSuchBean {
                name: name.to_string(),
            })?;
        let mut modified = definition.clone();
        modifier(&mut modified);
        modified.validate(name)?;
        *definition = modified;
        tracing::debug!("Bean definition '{}' modified", name);
        Ok(())
    }

    /// 按注册顺序返回所有名称
    pub fn names(&self) -> Vec<String> {
        self.inner.read().names.clone()
    }

    pub fn count(&self) -> usize {
        self.inner.read().names.len()
    }

    /// 名称与定义的快照，按注册顺序
    pub fn snapshot(&self) -> Vec<(String, BeanDefinition)> {
        let inner = self.inner.read();
        inner
            .names
            .iter()
            .filter_map(|name| {
                inner
                    .definitions
                    .get(name)
                    .map(|definition| (name.clone(), definition.clone()))
            })
            .collect()
    }

    /// 为没有名称的定义生成一个：类型短名的驼峰形式，被占用时追加 `#序号`
    pub fn generate_bean_name(&self, definition: &BeanDefinition) -> BeansResult<String> {
        let class_name = definition.class_name.as_deref().ok_or_else(|| {
            BeansError::InvalidDefinition {
                name: String::new(),
                resource_description: definition.resource_description.clone(),
                message: "cannot generate a bean name for a definition without a class"
                    .to_string(),
            }
        })?;
        let base = to_camel_case(short_type_name(class_name));

        let inner = self.inner.read();
        if !inner.definitions.contains_key(&base) {
            return Ok(base);
        }
        let mut counter = 0;
        loop {
            let candidate = format!("{}{}{}", base, GENERATED_BEAN_NAME_SEPARATOR, counter);
            if !inner.definitions.contains_key(&candidate) {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    pub fn freeze(&self) {
        *self.frozen.write() = true;
        tracing::debug!("Bean definition store frozen");
    }

    pub fn is_frozen(&self) -> bool {
        *self.frozen.read()
    }

    fn check_not_frozen(&self, name: &str, operation: &'static str) -> BeansResult<()> {
        if self.is_frozen() {
            return Err(BeansError::ConfigurationFrozen {
                name: name.to_string(),
                operation,
            });
        }
        Ok(())
    }
}
