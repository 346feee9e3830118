//! 简单类型转换
//!
//! 定义中的字面量只能注入到“简单类型”的参数或属性上：字符串、布尔、字符、
//! 各种整数和浮点数、URL、日期、路径以及可以从字符串解析的枚举。

use std::any::{Any, TypeId};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use url::Url;

/// 转换后的值，与 Bean 实例使用同一种共享句柄
pub type ConvertedValue = Arc<dyn Any + Send + Sync>;

/// 定义中的字面量
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{}", s),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Int(value.into())
    }
}

impl From<u32> for Literal {
    fn from(value: u32) -> Self {
        Literal::Int(value.into())
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

#[derive(Debug, Error)]
#[error("Failed to convert value '{value}' to required type '{target}': {reason}")]
pub struct ConversionError {
    pub value: String,
    pub target: &'static str,
    pub reason: String,
}

/// 可以从字符串解析的枚举类型
#[derive(Clone, Copy)]
pub struct EnumType {
    type_id: TypeId,
    type_name: &'static str,
    parse: fn(&str) -> Result<ConvertedValue, String>,
}

impl EnumType {
    pub fn of<E>() -> Self
    where
        E: FromStr + Send + Sync + 'static,
        E::Err: fmt::Display,
    {
        EnumType {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            parse: parse_from_str::<E>,
        }
    }
}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnumType").field(&self.type_name).finish()
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EnumType {}

fn parse_from_str<E>(s: &str) -> Result<ConvertedValue, String>
where
    E: FromStr + Send + Sync + 'static,
    E::Err: fmt::Display,
{
    s.trim()
        .parse::<E>()
        .map(|v| Arc::new(v) as ConvertedValue)
        .map_err(|e| e.to_string())
}

/// 字面量可以转换成的目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleType {
    String,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Url,
    Date,
    DateTime,
    Path,
    Enum(EnumType),
}

impl SimpleType {
    pub fn enumeration<E>() -> Self
    where
        E: FromStr + Send + Sync + 'static,
        E::Err: fmt::Display,
    {
        SimpleType::Enum(EnumType::of::<E>())
    }

    /// 转换结果的 Rust 类型
    pub fn type_id(&self) -> TypeId {
        match self {
            SimpleType::String => TypeId::of::<String>(),
            SimpleType::Bool => TypeId::of::<bool>(),
            SimpleType::Char => TypeId::of::<char>(),
            SimpleType::I8 => TypeId::of::<i8>(),
            SimpleType::I16 => TypeId::of::<i16>(),
            SimpleType::I32 => TypeId::of::<i32>(),
            SimpleType::I64 => TypeId::of::<i64>(),
            SimpleType::I128 => TypeId::of::<i128>(),
            SimpleType::Isize => TypeId::of::<isize>(),
            SimpleType::U8 => TypeId::of::<u8>(),
            SimpleType::U16 => TypeId::of::<u16>(),
            SimpleType::U32 => TypeId::of::<u32>(),
            SimpleType::U64 => TypeId::of::<u64>(),
            SimpleType::U128 => TypeId::of::<u128>(),
            SimpleType::Usize => TypeId::of::<usize>(),
            SimpleType::F32 => TypeId::of::<f32>(),
            SimpleType::F64 => TypeId::of::<f64>(),
            SimpleType::Url => TypeId::of::<Url>(),
            SimpleType::Date => TypeId::of::<NaiveDate>(),
            SimpleType::DateTime => TypeId::of::<NaiveDateTime>(),
            SimpleType::Path => TypeId::of::<PathBuf>(),
            SimpleType::Enum(e) => e.type_id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SimpleType::String => "String",
            SimpleType::Bool => "bool",
            SimpleType::Char => "char",
            SimpleType::I8 => "i8",
            SimpleType::I16 => "i16",
            SimpleType::I32 => "i32",
            SimpleType::I64 => "i64",
            SimpleType::I128 => "i128",
            SimpleType::Isize => "isize",
            SimpleType::U8 => "u8",
            SimpleType::U16 => "u16",
            SimpleType::U32 => "u32",
            SimpleType::U64 => "u64",
            SimpleType::U128 => "u128",
            SimpleType::Usize => "usize",
            SimpleType::F32 => "f32",
            SimpleType::F64 => "f64",
            SimpleType::Url => "Url",
            SimpleType::Date => "NaiveDate",
            SimpleType::DateTime => "NaiveDateTime",
            SimpleType::Path => "PathBuf",
            SimpleType::Enum(e) => e.type_name,
        }
    }

    /// 把字面量转换为该类型的值
    pub fn convert(&self, literal: &Literal) -> Result<ConvertedValue, ConversionError> {
        let fail = |reason: String| ConversionError {
            value: literal.to_string(),
            target: self.type_name(),
            reason,
        };

        macro_rules! integer {
            ($t:ty) => {
                match literal {
                    Literal::Int(i) => <$t>::try_from(*i)
                        .map(|v| Arc::new(v) as ConvertedValue)
                        .map_err(|e| fail(e.to_string())),
                    Literal::Str(s) => s
                        .trim()
                        .parse::<$t>()
                        .map(|v| Arc::new(v) as ConvertedValue)
                        .map_err(|e| fail(e.to_string())),
                    _ => Err(fail("not an integer".to_string())),
                }
            };
        }

        macro_rules! float {
            ($t:ty) => {
                match literal {
                    Literal::Float(x) => Ok(Arc::new(*x as $t) as ConvertedValue),
                    Literal::Int(i) => Ok(Arc::new(*i as $t) as ConvertedValue),
                    Literal::Str(s) => s
                        .trim()
                        .parse::<$t>()
                        .map(|v| Arc::new(v) as ConvertedValue)
                        .map_err(|e| fail(e.to_string())),
                    Literal::Bool(_) => Err(fail("not a number".to_string())),
                }
            };
        }

        match self {
            SimpleType::String => Ok(Arc::new(literal.to_string()) as ConvertedValue),
            SimpleType::Bool => match literal {
                Literal::Bool(b) => Ok(Arc::new(*b) as ConvertedValue),
                Literal::Int(0) => Ok(Arc::new(false) as ConvertedValue),
                Literal::Int(1) => Ok(Arc::new(true) as ConvertedValue),
                Literal::Str(s) => parse_bool(s)
                    .map(|b| Arc::new(b) as ConvertedValue)
                    .ok_or_else(|| fail("not a boolean".to_string())),
                _ => Err(fail("not a boolean".to_string())),
            },
            SimpleType::Char => match literal {
                Literal::Str(s) => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Ok(Arc::new(c) as ConvertedValue),
                        _ => Err(fail("expected exactly one character".to_string())),
                    }
                }
                _ => Err(fail("not a character".to_string())),
            },
            SimpleType::I8 => integer!(i8),
            SimpleType::I16 => integer!(i16),
            SimpleType::I32 => integer!(i32),
            SimpleType::I64 => integer!(i64),
            SimpleType::I128 => integer!(i128),
            SimpleType::Isize => integer!(isize),
            SimpleType::U8 => integer!(u8),
            SimpleType::U16 => integer!(u16),
            SimpleType::U32 => integer!(u32),
            SimpleType::U64 => integer!(u64),
            SimpleType::U128 => integer!(u128),
            SimpleType::Usize => integer!(usize),
            SimpleType::F32 => float!(f32),
            SimpleType::F64 => float!(f64),
            SimpleType::Url => {
                let s = require_str(literal).ok_or_else(|| fail("not a string".to_string()))?;
                Url::parse(s.trim())
                    .map(|u| Arc::new(u) as ConvertedValue)
                    .map_err(|e| fail(e.to_string()))
            }
            SimpleType::Date => {
                let s = require_str(literal).ok_or_else(|| fail("not a string".to_string()))?;
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(|d| Arc::new(d) as ConvertedValue)
                    .map_err(|e| fail(e.to_string()))
            }
            SimpleType::DateTime => {
                let s = require_str(literal).ok_or_else(|| fail("not a string".to_string()))?;
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                    .map(|d| Arc::new(d) as ConvertedValue)
                    .map_err(|e| fail(e.to_string()))
            }
            SimpleType::Path => {
                let s = require_str(literal).ok_or_else(|| fail("not a string".to_string()))?;
                Ok(Arc::new(PathBuf::from(s)) as ConvertedValue)
            }
            SimpleType::Enum(e) => {
                let s = require_str(literal).ok_or_else(|| fail("not a string".to_string()))?;
                (e.parse)(s).map_err(fail)
            }
        }
    }
}

impl fmt::Display for SimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

fn require_str(literal: &Literal) -> Option<&str> {
    match literal {
        Literal::Str(s) => Some(s),
        _ => None,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// 可以作为简单类型注入的 Rust 类型
///
/// 自定义枚举实现此 trait 后即可在构造参数和属性中使用：
///
/// ```rust,ignore
/// impl SimpleValue for Color {
///     fn simple_type() -> SimpleType {
///         SimpleType::enumeration::<Color>()
///     }
/// }
/// ```
pub trait SimpleValue: Clone + Send + Sync + 'static {
    fn simple_type() -> SimpleType;
}

macro_rules! simple_value {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl SimpleValue for $t {
                fn simple_type() -> SimpleType {
                    SimpleType::$variant
                }
            }
        )*
    };
}

simple_value! {
    String => String,
    bool => Bool,
    char => Char,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    Url => Url,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    PathBuf => Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert<T: Clone + 'static>(ty: SimpleType, literal: Literal) -> T {
        let value = ty.convert(&literal).unwrap();
        value.downcast_ref::<T>().unwrap().clone()
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Color {
        Red,
        Green,
    }

    impl FromStr for Color {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "RED" => Ok(Color::Red),
                "GREEN" => Ok(Color::Green),
                other => Err(format!("unknown color {}", other)),
            }
        }
    }

    #[test]
    fn test_integer_conversion() {
        assert_eq!(convert::<i32>(SimpleType::I32, Literal::Int(30)), 30);
        assert_eq!(convert::<u16>(SimpleType::U16, Literal::from(" 8080 ")), 8080);

        let err = SimpleType::U8.convert(&Literal::Int(300)).unwrap_err();
        assert_eq!(err.target, "u8");
        assert!(SimpleType::I32.convert(&Literal::Float(1.5)).is_err());
    }

    #[test]
    fn test_float_and_bool_conversion() {
        assert_eq!(convert::<f64>(SimpleType::F64, Literal::Int(60)), 60.0);
        assert_eq!(convert::<f32>(SimpleType::F32, Literal::from("1.5")), 1.5);
        assert!(convert::<bool>(SimpleType::Bool, Literal::from("Yes")));
        assert!(!convert::<bool>(SimpleType::Bool, Literal::Int(0)));
        assert!(SimpleType::Bool.convert(&Literal::from("maybe")).is_err());
    }

    #[test]
    fn test_string_accepts_every_literal() {
        assert_eq!(convert::<String>(SimpleType::String, Literal::Int(42)), "42");
        assert_eq!(convert::<String>(SimpleType::String, Literal::from("Alice")), "Alice");
    }

    #[test]
    fn test_url_and_date_conversion() {
        let url = convert::<Url>(SimpleType::Url, Literal::from("https://example.com/a"));
        assert_eq!(url.host_str(), Some("example.com"));

        let date = convert::<NaiveDate>(SimpleType::Date, Literal::from("2016-06-01"));
        assert_eq!(date, NaiveDate::from_ymd_opt(2016, 6, 1).unwrap());

        let dt = convert::<NaiveDateTime>(SimpleType::DateTime, Literal::from("2016-06-01 08:30:00"));
        assert_eq!(dt.date(), date);

        assert!(SimpleType::Url.convert(&Literal::from("not a url")).is_err());
    }

    #[test]
    fn test_enum_conversion() {
        let ty = SimpleType::enumeration::<Color>();
        assert_eq!(convert::<Color>(ty, Literal::from("GREEN")), Color::Green);
        assert_eq!(convert::<Color>(ty, Literal::from("RED")), Color::Red);

        let err = ty.convert(&Literal::from("BLUE")).unwrap_err();
        assert!(err.to_string().contains("unknown color BLUE"));
        assert_eq!(ty.type_id(), TypeId::of::<Color>());
    }

    #[test]
    fn test_char_conversion() {
        assert_eq!(convert::<char>(SimpleType::Char, Literal::from("x")), 'x');
        assert!(SimpleType::Char.convert(&Literal::from("xy")).is_err());
    }
}
