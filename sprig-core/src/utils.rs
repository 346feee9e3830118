//! 通用工具函数

/// Bean 命名
pub mod naming {
    /// 把 PascalCase 类型名转换为 camelCase 的 Bean 名称
    ///
    /// 与 Spring 的默认命名一致：`UserService` 变成 `userService`。
    ///
    /// # Examples
    ///
    /// ```
    /// use sprig_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("UserService"), "userService");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }
}

/// dependsOn 关系的静态检查
pub mod dependency {
    use std::collections::{BTreeMap, HashSet};

    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum DependencyValidationError {
        /// 依赖链构成了环，首尾是同一个名称
        #[error("Circular depends-on relationship: {}", .cycle.join(" -> "))]
        CircularDependency { cycle: Vec<String> },

        #[error("Bean '{bean}' depends on '{missing}' which is not registered")]
        MissingDependency { bean: String, missing: String },
    }

    /// 检查依赖图中缺失的名称和环
    ///
    /// `graph` 的键是所有已注册的名称，值是它的 dependsOn 列表。
    /// 按名称顺序遍历，返回第一个问题。
    pub fn validate_dependency_graph(
        graph: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), DependencyValidationError> {
        for (bean, deps) in graph {
            if let Some(missing) = deps.iter().find(|dep| !graph.contains_key(*dep)) {
                return Err(DependencyValidationError::MissingDependency {
                    bean: bean.clone(),
                    missing: missing.clone(),
                });
            }
        }

        let mut visited = HashSet::new();
        let mut path = Vec::new();
        for bean in graph.keys() {
            if !visited.contains(bean) {
                if let Some(cycle) = find_cycle(bean, graph, &mut visited, &mut path) {
                    return Err(DependencyValidationError::CircularDependency { cycle });
                }
            }
        }
        Ok(())
    }

    fn find_cycle(
        node: &str,
        graph: &BTreeMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        path.push(node.to_string());

        for dep in graph.get(node).into_iter().flatten() {
            if let Some(start) = path.iter().position(|n| n == dep) {
                let mut cycle = path[start..].to_vec();
                cycle.push(dep.clone());
                return Some(cycle);
            }
            if !visited.contains(dep) {
                if let Some(cycle) = find_cycle(dep, graph, visited, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    mod naming_tests {
        use super::super::naming::*;

        #[test]
        fn test_to_camel_case() {
            assert_eq!(to_camel_case("UserService"), "userService");
            assert_eq!(to_camel_case("DbConnection"), "dbConnection");
            assert_eq!(to_camel_case("AB"), "aB");
            assert_eq!(to_camel_case("lowerCase"), "lowerCase");
        }
    }

    mod dependency_tests {
        use super::super::dependency::*;
        use std::collections::BTreeMap;

        fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
            edges
                .iter()
                .map(|(bean, deps)| {
                    (bean.to_string(), deps.iter().map(|d| d.to_string()).collect())
                })
                .collect()
        }

        #[test]
        fn test_missing_dependency() {
            let deps = graph(&[("serviceA", &["serviceB"])]);
            assert_eq!(
                validate_dependency_graph(&deps),
                Err(DependencyValidationError::MissingDependency {
                    bean: "serviceA".to_string(),
                    missing: "serviceB".to_string(),
                })
            );
        }

        #[test]
        fn test_circular_dependency() {
            let deps = graph(&[
                ("serviceA", &["serviceB"]),
                ("serviceB", &["serviceC"]),
                ("serviceC", &["serviceA"]),
            ]);
            match validate_dependency_graph(&deps) {
                Err(DependencyValidationError::CircularDependency { cycle }) => {
                    assert_eq!(cycle, vec!["serviceA", "serviceB", "serviceC", "serviceA"]);
                }
                other => panic!("expected a cycle, got {:?}", other),
            }
        }

        #[test]
        fn test_valid_graph() {
            let deps = graph(&[
                ("config", &[]),
                ("database", &["config"]),
                ("userService", &["database", "config"]),
            ]);
            assert!(validate_dependency_graph(&deps).is_ok());
        }

        #[test]
        fn test_self_dependency() {
            let deps = graph(&[("serviceA", &["serviceA"])]);
            let err = validate_dependency_graph(&deps).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Circular depends-on relationship: serviceA -> serviceA"
            );
        }
    }
}
