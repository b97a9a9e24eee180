use serde::{Deserialize, Serialize};
use std::fmt;

/// Target-language types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    /// `()`
    Unit,
    /// `std::vec::Vec<T>`, `i32`, `str`
    Path {
        segments: Vec<String>,
        generics: Vec<Type>,
    },
    /// `&T`, `&mut T`, `&'a mut T`
    Ref {
        inner: Box<Type>,
        mutable: bool,
        lifetime: Option<String>,
    },
    /// `[T]`
    Slice(Box<Type>),
    /// `[T; N]`
    Array { elem: Box<Type>, len: usize },
    /// `(A, B)`; a 1-tuple renders `(A,)`
    Tuple(Vec<Type>),
}

impl Type {
    /// Plain path with no generic arguments. `name` may be `::`-qualified.
    pub fn path(name: &str) -> Self {
        Type::Path {
            segments: name.split("::").map(str::to_string).collect(),
            generics: Vec::new(),
        }
    }

    pub fn generic(name: &str, generics: Vec<Type>) -> Self {
        Type::Path {
            segments: name.split("::").map(str::to_string).collect(),
            generics,
        }
    }

    pub fn reference(inner: Type, mutable: bool) -> Self {
        Type::Ref {
            inner: Box::new(inner),
            mutable,
            lifetime: None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Unit)
    }

    /// Name of the outermost path segment, when the type is a plain path.
    pub fn head(&self) -> Option<&str> {
        match self {
            Type::Path { segments, .. } => segments.last().map(String::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Unit => write!(f, "()"),
            Type::Path { segments, generics } => {
                write!(f, "{}", segments.join("::"))?;
                if !generics.is_empty() {
                    write!(f, "<")?;
                    for (i, g) in generics.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", g)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Ref {
                inner,
                mutable,
                lifetime,
            } => {
                write!(f, "&")?;
                if let Some(lt) = lifetime {
                    write!(f, "'{} ", lt)?;
                }
                if *mutable {
                    write!(f, "mut ")?;
                }
                write!(f, "{}", inner)
            }
            Type::Slice(inner) => write!(f, "[{}]", inner),
            Type::Array { elem, len } => write!(f, "[{}; {}]", elem, len),
            Type::Tuple(members) => {
                write!(f, "(")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                if members.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_rendering() {
        let ty = Type::generic(
            "std::collections::HashMap",
            vec![Type::path("std::string::String"), Type::path("i32")],
        );
        assert_eq!(
            ty.to_string(),
            "std::collections::HashMap<std::string::String, i32>"
        );
    }

    #[test]
    fn test_ref_rendering() {
        let ty = Type::Ref {
            inner: Box::new(Type::path("str")),
            mutable: false,
            lifetime: Some("a".to_string()),
        };
        assert_eq!(ty.to_string(), "&'a str");

        let ty = Type::reference(Type::path("i32"), true);
        assert_eq!(ty.to_string(), "&mut i32");
    }

    #[test]
    fn test_one_tuple_gets_trailing_comma() {
        let ty = Type::Tuple(vec![Type::path("i32")]);
        assert_eq!(ty.to_string(), "(i32,)");
        let ty = Type::Tuple(vec![Type::path("i32"), Type::path("bool")]);
        assert_eq!(ty.to_string(), "(i32, bool)");
    }

    #[test]
    fn test_array_and_slice() {
        let ty = Type::Array {
            elem: Box::new(Type::path("f32")),
            len: 256,
        };
        assert_eq!(ty.to_string(), "[f32; 256]");
        assert_eq!(Type::Slice(Box::new(Type::path("u8"))).to_string(), "[u8]");
    }
}
