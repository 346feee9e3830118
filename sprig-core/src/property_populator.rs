//! 属性填充
//!
//! 定义里显式给出的属性值先被收集起来，再按装配模式补充自动装配的引用，
//! 最后逐个写入实例：优先 setter，其次同名字段。

use crate::bean_factory::{BeanFactory, ConfigurableBeanFactory, DefaultListableBeanFactory};
use crate::class::{BeanClass, ParamType, PropertyAccessor};
use crate::definition::{AutowireMode, BeanDefinition};
use crate::error::{BeansError, BeansResult};
use crate::value::{BeanObject, BeanValue, PropertyValue, PropertyValues, ValueHolder};

pub(crate) struct PropertyPopulator<'a> {
    factory: &'a DefaultListableBeanFactory,
}

impl<'a> PropertyPopulator<'a> {
    pub(crate) fn new(factory: &'a DefaultListableBeanFactory) -> Self {
        Self { factory }
    }

    pub(crate) fn populate(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        class: &BeanClass,
        bean: &BeanObject,
    ) -> BeansResult<()> {
        let mut values = definition.property_values.clone();
        match definition.autowire_mode {
            AutowireMode::No => {}
            AutowireMode::ByName => self.autowire_by_name(bean_name, class, &mut values),
            AutowireMode::ByType => self.autowire_by_type(bean_name, class, &mut values)?,
            AutowireMode::Constructor => {
                return Err(BeansError::UnsupportedMode {
                    name: bean_name.to_string(),
                    mode: "constructor autowiring".to_string(),
                })
            }
        }

        for value in &values {
            self.apply_property_value(bean_name, definition, class, bean, value)?;
        }
        Ok(())
    }

    /// 尚未赋值、且声明为 Bean 类型的 setter
    fn unsatisfied_bean_properties<'c>(
        class: &'c BeanClass,
        values: &PropertyValues,
    ) -> impl Iterator<Item = &'c PropertyAccessor> + 'c {
        let satisfied: Vec<String> = values.iter().map(|v| v.name().to_string()).collect();
        class
            .setters()
            .iter()
            .filter(move |setter| !setter.param_type().is_simple() && !satisfied.iter().any(|n| n == setter.name()))
    }

    fn autowire_by_name(&self, bean_name: &str, class: &BeanClass, values: &mut PropertyValues) {
        let properties: Vec<String> = Self::unsatisfied_bean_properties(class, values)
            .map(|setter| setter.name().to_string())
            .collect();
        for property in properties {
            if property != bean_name && self.factory.contains_bean(&property) {
                values.add_value(property.as_str(), ValueHolder::reference(property.as_str()));
                self.factory.register_dependent_bean(&property, bean_name);
                tracing::trace!(
                    "Added autowiring by name from bean name '{}' via property '{}' to bean named '{}'",
                    bean_name,
                    property,
                    property
                );
            } else {
                tracing::trace!(
                    "Not autowiring property '{}' of bean '{}' by name: no matching bean found",
                    property,
                    bean_name
                );
            }
        }
    }

    fn autowire_by_type(
        &self,
        bean_name: &str,
        class: &BeanClass,
        values: &mut PropertyValues,
    ) -> BeansResult<()> {
        let properties: Vec<(String, ParamType)> = Self::unsatisfied_bean_properties(class, values)
            .map(|setter| (setter.name().to_string(), *setter.param_type()))
            .collect();
        for (property, ty) in properties {
            let ParamType::Bean(bean_type) = ty else {
                continue;
            };
            match self.factory.find_autowire_candidate(bean_name, bean_type)? {
                Some(candidate) => {
                    values.add_value(property.as_str(), ValueHolder::reference(candidate.as_str()));
                    self.factory.register_dependent_bean(&candidate, bean_name);
                    tracing::trace!(
                        "Autowiring by type from bean name '{}' via property '{}' to bean named '{}'",
                        bean_name,
                        property,
                        candidate
                    );
                }
                None => tracing::trace!(
                    "Not autowiring property '{}' of bean '{}' by type: no bean of type '{}'",
                    property,
                    bean_name,
                    bean_type
                ),
            }
        }
        Ok(())
    }

    fn apply_property_value(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        class: &BeanClass,
        bean: &BeanObject,
        property: &PropertyValue,
    ) -> BeansResult<()> {
        let name = property.name();
        let holder = property.holder();
        let origin = definition.resource_description.clone();

        let object = match holder.value() {
            BeanValue::Reference(reference) => Some(self.factory.resolve_bean_reference(
                bean_name,
                definition,
                reference.bean_name(),
                &format!("bean property '{}'", name),
            )?),
            BeanValue::Instance(instance) => Some(instance.clone()),
            BeanValue::Literal(_) => None,
        };

        let accessors = [class.setter(name), class.field(name)];
        for accessor in accessors.into_iter().flatten() {
            let value = match (&object, holder.value(), accessor.param_type()) {
                (Some(object), _, ty) if ty.accepts_instance(object) => object.clone(),
                (None, BeanValue::Literal(literal), ParamType::Simple(simple)) => {
                    holder.convert_literal(literal, simple).map_err(|e| {
                        BeansError::creation_with_source(
                            bean_name,
                            origin.clone(),
                            format!("Failed to convert property value for property '{}'", name),
                            e,
                        )
                    })?
                }
                _ => continue,
            };
            return accessor.apply(&**bean, value).map_err(|e| {
                BeansError::from_callback(
                    bean_name,
                    origin.as_deref(),
                    format!("Error setting property value '{}'", name),
                    e,
                )
            });
        }

        Err(BeansError::creation(
            bean_name,
            origin,
            format!(
                "Invalid property '{}' of bean class [{}]: no setter or field accepts value {}",
                name,
                class.name(),
                holder.value()
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean_factory::{BeanFactoryExt, ConfigurableBeanFactory};
    use crate::definition::BeanDefinitionBuilder;
    use crate::error::ErrorKind;
    use parking_lot::RwLock;
    use std::sync::Arc;

    #[derive(Default)]
    struct Engine;

    #[derive(Default)]
    struct Car {
        model: RwLock<String>,
        wheels: RwLock<u32>,
        engine: RwLock<Option<Arc<Engine>>>,
    }

    fn factory(mode: AutowireMode) -> DefaultListableBeanFactory {
        let factory = DefaultListableBeanFactory::new();
        factory.register_class(BeanClass::builder::<Engine>("Engine").default_constructor().build());
        factory.register_class(
            BeanClass::builder::<Car>("Car")
                .default_constructor()
                .property("model", |car: &Car, model: String| *car.model.write() = model)
                .field("wheels", |car: &Car, wheels: u32| *car.wheels.write() = wheels)
                .reference("engine", |car: &Car, engine: Arc<Engine>| {
                    *car.engine.write() = Some(engine)
                })
                .build(),
        );
        factory
            .register_bean_definition(
                "car",
                BeanDefinitionBuilder::generic_bean_definition("Car")
                    .add_property_value("model", "roadster")
                    .add_property_value("wheels", "4")
                    .set_autowire_mode(mode)
                    .build(),
            )
            .unwrap();
        factory
    }

    #[test]
    fn test_setter_and_field_injection() {
        let factory = factory(AutowireMode::No);
        let car = factory.get_bean_typed::<Car>("car").unwrap();
        assert_eq!(*car.model.read(), "roadster");
        assert_eq!(*car.wheels.read(), 4);
        assert!(car.engine.read().is_none());
    }

    #[test]
    fn test_autowire_by_name() {
        let factory = factory(AutowireMode::ByName);
        factory
            .register_bean_definition("engine", BeanDefinitionBuilder::generic_bean_definition("Engine").build())
            .unwrap();

        let car = factory.get_bean_typed::<Car>("car").unwrap();
        let engine = factory.get_bean_typed::<Engine>("engine").unwrap();
        assert!(Arc::ptr_eq(car.engine.read().as_ref().unwrap(), &engine));
        assert!(factory.get_dependent_beans("engine").contains(&"car".to_string()));
    }

    #[test]
    fn test_autowire_by_name_without_bean_leaves_property_unset() {
        let factory = factory(AutowireMode::ByName);
        factory
            .register_bean_definition("motor", BeanDefinitionBuilder::generic_bean_definition("Engine").build())
            .unwrap();
        let car = factory.get_bean_typed::<Car>("car").unwrap();
        assert!(car.engine.read().is_none());
    }

    #[test]
    fn test_autowire_by_type() {
        let factory = factory(AutowireMode::ByType);
        factory
            .register_bean_definition("motor", BeanDefinitionBuilder::generic_bean_definition("Engine").build())
            .unwrap();

        let car = factory.get_bean_typed::<Car>("car").unwrap();
        let motor = factory.get_bean_typed::<Engine>("motor").unwrap();
        assert!(Arc::ptr_eq(car.engine.read().as_ref().unwrap(), &motor));
    }

    #[test]
    fn test_autowire_by_type_prefers_primary() {
        let factory = factory(AutowireMode::ByType);
        factory
            .register_bean_definition("spare", BeanDefinitionBuilder::generic_bean_definition("Engine").build())
            .unwrap();
        factory
            .register_bean_definition(
                "main",
                BeanDefinitionBuilder::generic_bean_definition("Engine")
                    .set_primary(true)
                    .build(),
            )
            .unwrap();

        let car = factory.get_bean_typed::<Car>("car").unwrap();
        let main = factory.get_bean_typed::<Engine>("main").unwrap();
        assert!(Arc::ptr_eq(car.engine.read().as_ref().unwrap(), &main));
    }

    #[test]
    fn test_autowire_by_type_ambiguity() {
        let factory = factory(AutowireMode::ByType);
        for name in ["left", "right"] {
            factory
                .register_bean_definition(name, BeanDefinitionBuilder::generic_bean_definition("Engine").build())
                .unwrap();
        }
        let err = factory.get_bean("car").unwrap_err();
        assert!(err.contains_kind(ErrorKind::NotFound));
        assert!(err.root_cause().to_string().contains("left,right"));
    }

    #[test]
    fn test_autowire_by_type_skips_non_candidates() {
        let factory = factory(AutowireMode::ByType);
        factory
            .register_bean_definition(
                "hidden",
                BeanDefinitionBuilder::generic_bean_definition("Engine")
                    .set_autowire_candidate(false)
                    .build(),
            )
            .unwrap();
        let car = factory.get_bean_typed::<Car>("car").unwrap();
        assert!(car.engine.read().is_none());
    }

    #[test]
    fn test_constructor_autowiring_is_unsupported() {
        let factory = factory(AutowireMode::Constructor);
        let err = factory.get_bean("car").unwrap_err();
        assert!(err.contains_kind(ErrorKind::UnsupportedMode));
    }

    #[test]
    fn test_unknown_property_names_value() {
        let factory = factory(AutowireMode::No);
        factory
            .modify_bean_definition("car", |definition| {
                definition
                    .property_values
                    .add_value("colour", ValueHolder::literal("red"))
            })
            .unwrap();
        let err = factory.get_bean("car").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Creation);
        assert!(err.to_string().contains("Invalid property 'colour'"));
        assert!(err.to_string().contains("'red'"));
    }

    #[test]
    fn test_reference_to_missing_bean_fails() {
        let factory = factory(AutowireMode::No);
        factory
            .modify_bean_definition("car", |definition| {
                definition
                    .property_values
                    .add_value("engine", ValueHolder::reference("ghost"))
            })
            .unwrap();
        let err = factory.get_bean("car").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Creation);
        assert!(err.contains_kind(ErrorKind::NotFound));
    }
}
