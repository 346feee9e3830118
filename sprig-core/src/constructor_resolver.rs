//! 构造函数解析
//!
//! 先按参数个数筛选候选构造函数，再逐个检查每个参数能否接受定义里的值，
//! 最后必须恰好剩下一个。多个构造函数同时匹配时直接报错，不做特异性排序。

use std::collections::HashMap;

use crate::bean_factory::DefaultListableBeanFactory;
use crate::class::{BeanClass, ConstructorArgs, Constructor, Param, ParamType};
use crate::definition::BeanDefinition;
use crate::error::{BeansError, BeansResult, ConstructorMismatch};
use crate::value::{ArgumentMode, BeanObject, BeanValue, ValueHolder};

pub(crate) struct ConstructorResolver<'a> {
    factory: &'a DefaultListableBeanFactory,
}

impl<'a> ConstructorResolver<'a> {
    pub(crate) fn new(factory: &'a DefaultListableBeanFactory) -> Self {
        Self { factory }
    }

    /// 按定义的构造参数选择构造函数并创建实例
    pub(crate) fn autowire_constructor(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        class: &BeanClass,
    ) -> BeansResult<BeanObject> {
        let args = &definition.constructor_args;
        let count = args.argument_count();
        let candidates: Vec<&Constructor> = class
            .constructors()
            .iter()
            .filter(|ctor| ctor.param_count() == count)
            .collect();
        if candidates.is_empty() {
            return Err(self.mismatch(
                bean_name,
                definition,
                ConstructorMismatch::NoMatching,
                format!(
                    "Can not find a appropriate constructor of [{}] with {} argument(s)",
                    class.name(),
                    count
                ),
            ));
        }

        let mode = args.mode();
        if mode == ArgumentMode::Type {
            return Err(BeansError::UnsupportedMode {
                name: bean_name.to_string(),
                mode: "by-type constructor argument matching".to_string(),
            });
        }

        // 同一次解析里每个引用只获取一次
        let mut references = HashMap::new();
        let mut matched = Vec::new();
        for ctor in candidates {
            let bindings = match mode {
                ArgumentMode::Name => self.bind_by_name(bean_name, definition, ctor)?,
                _ => bind_by_index(definition, ctor),
            };
            let Some(bindings) = bindings else {
                continue;
            };
            if self.all_compatible(bean_name, definition, &bindings, &mut references)? {
                matched.push((ctor, bindings));
            }
        }

        let (ctor, bindings) = match matched.len() {
            0 => {
                return Err(self.mismatch(
                    bean_name,
                    definition,
                    ConstructorMismatch::NoMatching,
                    format!(
                        "Can not find a appropriate constructor of [{}] for the given {} argument(s)",
                        class.name(),
                        args.mode()
                    ),
                ))
            }
            1 => matched.remove(0),
            n => {
                return Err(self.mismatch(
                    bean_name,
                    definition,
                    ConstructorMismatch::Ambiguous(n),
                    format!(
                        "{} constructors of [{}] accept the given arguments",
                        n,
                        class.name()
                    ),
                ))
            }
        };
        tracing::trace!("Bean '{}' resolved to {:?}", bean_name, ctor);

        let values = self.build_arguments(bean_name, definition, &bindings, &references)?;
        ctor.instantiate(&ConstructorArgs::new(values)).map_err(|e| {
            BeansError::from_callback(
                bean_name,
                definition.resource_description.as_deref(),
                format!("Instantiation of bean failed through constructor of [{}]", class.name()),
                e,
            )
        })
    }

    /// 参数名对应到定义里的值；参数名不可用时报错
    fn bind_by_name<'c>(
        &self,
        bean_name: &str,
        definition: &'c BeanDefinition,
        ctor: &'c Constructor,
    ) -> BeansResult<Option<Vec<(&'c Param, &'c ValueHolder)>>> {
        let Some(names) = ctor.param_names() else {
            return Err(BeansError::creation(
                bean_name,
                definition.resource_description.clone(),
                format!("Can not get parameter names of constructor {:?}", ctor),
            ));
        };
        let mut bindings = Vec::with_capacity(names.len());
        for (param, name) in ctor.params().iter().zip(names) {
            match definition.constructor_args.named_argument_value(name) {
                Some(holder) => bindings.push((param, holder)),
                None => return Ok(None),
            }
        }
        Ok(Some(bindings))
    }

    fn all_compatible(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        bindings: &[(&Param, &ValueHolder)],
        references: &mut HashMap<String, BeanObject>,
    ) -> BeansResult<bool> {
        for (param, holder) in bindings {
            let ty = param.param_type();
            if let Some(hint) = holder.type_hint() {
                if !ty.matches_type_hint(hint) {
                    return Ok(false);
                }
            }
            let compatible = match holder.value() {
                BeanValue::Literal(_) => ty.is_simple(),
                BeanValue::Instance(instance) => ty.accepts_instance(instance),
                BeanValue::Reference(reference) => {
                    let name = reference.bean_name();
                    if !references.contains_key(name) {
                        let bean = self.factory.resolve_bean_reference(
                            bean_name,
                            definition,
                            name,
                            "constructor argument",
                        )?;
                        references.insert(name.to_string(), bean);
                    }
                    references.get(name).is_some_and(|bean| ty.accepts_instance(bean))
                }
            };
            if !compatible {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn build_arguments(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        bindings: &[(&Param, &ValueHolder)],
        references: &HashMap<String, BeanObject>,
    ) -> BeansResult<Vec<BeanObject>> {
        let origin = definition.resource_description.clone();
        bindings
            .iter()
            .map(|(param, holder)| match (holder.value(), param.param_type()) {
                (BeanValue::Literal(literal), ParamType::Simple(simple)) => {
                    holder.convert_literal(literal, simple).map_err(|e| {
                        BeansError::creation_with_source(
                            bean_name,
                            origin.clone(),
                            format!("convert constructor-arg value '{}' fail", literal),
                            e,
                        )
                    })
                }
                (BeanValue::Literal(literal), other) => Err(BeansError::creation(
                    bean_name,
                    origin.clone(),
                    format!("constructor-arg value '{}' cannot be assigned to '{}'", literal, other),
                )),
                (BeanValue::Instance(instance), _) => Ok(instance.clone()),
                (BeanValue::Reference(reference), _) => references
                    .get(reference.bean_name())
                    .cloned()
                    .ok_or_else(|| {
                        BeansError::creation(
                            bean_name,
                            origin.clone(),
                            format!(
                                "Autowire by constructor fail: Bean reference '{}' not found",
                                reference.bean_name()
                            ),
                        )
                    }),
            })
            .collect()
    }

    fn mismatch(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        mismatch: ConstructorMismatch,
        message: String,
    ) -> BeansError {
        BeansError::ConstructorResolution {
            name: bean_name.to_string(),
            resource_description: definition.resource_description.clone(),
            mismatch,
            message,
        }
    }
}

/// 下标对应到参数；有下标越界时返回 None
fn bind_by_index<'c>(
    definition: &'c BeanDefinition,
    ctor: &'c Constructor,
) -> Option<Vec<(&'c Param, &'c ValueHolder)>> {
    definition
        .constructor_args
        .indexed_argument_values()
        .iter()
        .map(|(index, holder)| ctor.params().get(*index).map(|param| (param, holder)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean_factory::{BeanFactory, BeanFactoryExt, ConfigurableBeanFactory};
    use crate::convert::SimpleType;
    use crate::definition::BeanDefinitionBuilder;
    use crate::error::ErrorKind;
    use std::sync::Arc;

    #[derive(Default)]
    struct Engine;

    struct Car {
        model: String,
        doors: u8,
        engine: Option<Arc<Engine>>,
    }

    fn factory() -> DefaultListableBeanFactory {
        let factory = DefaultListableBeanFactory::new();
        factory.register_class(BeanClass::builder::<Engine>("Engine").default_constructor().build());
        factory.register_class(
            BeanClass::builder::<Car>("Car")
                .constructor(
                    vec![Param::value::<String>("model"), Param::value::<u8>("doors")],
                    |args| {
                        Ok(Car {
                            model: args.get(0)?,
                            doors: args.get(1)?,
                            engine: None,
                        })
                    },
                )
                .constructor(
                    vec![Param::value::<String>("model"), Param::bean::<Engine>("engine")],
                    |args| {
                        Ok(Car {
                            model: args.get(0)?,
                            doors: 4,
                            engine: Some(args.bean(1)?),
                        })
                    },
                )
                .build(),
        );
        factory
            .register_bean_definition("engine", BeanDefinitionBuilder::generic_bean_definition("Engine").build())
            .unwrap();
        factory
    }

    #[test]
    fn test_literal_picks_simple_constructor() {
        let factory = factory();
        let definition = BeanDefinitionBuilder::generic_bean_definition("Car")
            .add_constructor_arg_value("coupe")
            .add_constructor_arg_value(2)
            .build();
        factory.register_bean_definition("car", definition).unwrap();

        let car = factory.get_bean_typed::<Car>("car").unwrap();
        assert_eq!(car.model, "coupe");
        assert_eq!(car.doors, 2);
        assert!(car.engine.is_none());
    }

    #[test]
    fn test_reference_picks_bean_constructor_and_records_dependency() {
        let factory = factory();
        let definition = BeanDefinitionBuilder::generic_bean_definition("Car")
            .add_constructor_arg_value("sedan")
            .add_constructor_arg_reference("engine")
            .build();
        factory.register_bean_definition("car", definition).unwrap();

        let car = factory.get_bean_typed::<Car>("car").unwrap();
        let engine = factory.get_bean_typed::<Engine>("engine").unwrap();
        assert!(Arc::ptr_eq(car.engine.as_ref().unwrap(), &engine));
        assert_eq!(factory.get_dependent_beans("engine"), vec!["car".to_string()]);
    }

    #[test]
    fn test_by_name_arguments() {
        let factory = factory();
        let definition = BeanDefinitionBuilder::generic_bean_definition("Car")
            .add_named_constructor_arg("doors", ValueHolder::literal("3"))
            .add_named_constructor_arg("model", ValueHolder::literal("hatch"))
            .build();
        factory.register_bean_definition("car", definition).unwrap();

        let car = factory.get_bean_typed::<Car>("car").unwrap();
        assert_eq!(car.model, "hatch");
        assert_eq!(car.doors, 3);
    }

    #[test]
    fn test_wrong_argument_count_has_no_match() {
        let factory = factory();
        let definition = BeanDefinitionBuilder::generic_bean_definition("Car")
            .add_constructor_arg_value("solo")
            .build();
        factory.register_bean_definition("car", definition).unwrap();

        let err = factory.get_bean("car").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstructorResolution);
    }

    #[test]
    fn test_literal_matching_several_simple_constructors_is_ambiguous() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_class(
            BeanClass::builder::<Car>("Car")
                .constructor(vec![Param::value::<String>("model")], |args| {
                    Ok(Car { model: args.get(0)?, doors: 0, engine: None })
                })
                .constructor(vec![Param::value::<u8>("doors")], |args| {
                    Ok(Car { model: String::new(), doors: args.get(0)?, engine: None })
                })
                .build(),
        );
        factory
            .register_bean_definition(
                "car",
                BeanDefinitionBuilder::generic_bean_definition("Car")
                    .add_constructor_arg_value(5)
                    .build(),
            )
            .unwrap();
        let err = factory.get_bean("car").unwrap_err();
        assert!(matches!(
            err,
            BeansError::ConstructorResolution {
                mismatch: ConstructorMismatch::Ambiguous(2),
                ..
            }
        ));
    }

    #[test]
    fn test_conversion_failure_is_creation_error() {
        let factory = factory();
        let definition = BeanDefinitionBuilder::generic_bean_definition("Car")
            .add_constructor_arg_value("van")
            .add_constructor_arg_value("many")
            .build();
        factory.register_bean_definition("car", definition).unwrap();

        let err = factory.get_bean("car").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Creation);
        assert!(err.to_string().contains("convert constructor-arg value 'many' fail"));
    }

    #[test]
    fn test_by_type_arguments_are_rejected() {
        let factory = factory();
        let definition = BeanDefinitionBuilder::generic_bean_definition("Car")
            .add_typed_constructor_arg("String", ValueHolder::literal("van"))
            .add_typed_constructor_arg("u8", ValueHolder::literal(2))
            .build();
        factory.register_bean_definition("car", definition).unwrap();

        let err = factory.get_bean("car").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedMode);
    }

    #[test]
    fn test_positional_params_cannot_match_by_name() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_class(
            BeanClass::builder::<Car>("Car")
                .constructor(
                    vec![Param::positional(ParamType::Simple(SimpleType::String))],
                    |args| Ok(Car { model: args.get(0)?, doors: 0, engine: None }),
                )
                .build(),
        );
        factory
            .register_bean_definition(
                "car",
                BeanDefinitionBuilder::generic_bean_definition("Car")
                    .add_named_constructor_arg("model", ValueHolder::literal("x"))
                    .build(),
            )
            .unwrap();
        let err = factory.get_bean("car").unwrap_err();
        assert!(err.to_string().contains("Can not get parameter names of constructor"));
    }
}
