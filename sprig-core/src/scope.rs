use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::constants::{SCOPE_PROTOTYPE, SCOPE_SINGLETON};

/// Bean 的作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// 单例模式 - 容器中只有一个实例
    Singleton,

    /// 原型模式 - 每次请求都创建新实例
    Prototype,

    /// 其他作用域名称，容器不支持，解析时报错
    Custom(String),
}

impl Scope {
    pub fn is_singleton(&self) -> bool {
        matches!(self, Scope::Singleton)
    }

    pub fn is_prototype(&self) -> bool {
        matches!(self, Scope::Prototype)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Singleton
    }
}

impl FromStr for Scope {
    type Err = Infallible;

    /// 空字符串视为默认的单例作用域
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s {
            "" | SCOPE_SINGLETON => Scope::Singleton,
            SCOPE_PROTOTYPE => Scope::Prototype,
            other => Scope::Custom(other.to_string()),
        })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => write!(f, "{}", SCOPE_SINGLETON),
            Scope::Prototype => write!(f, "{}", SCOPE_PROTOTYPE),
            Scope::Custom(name) => write!(f, "{}", name),
        }
    }
}
