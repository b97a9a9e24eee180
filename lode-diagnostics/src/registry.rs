//! The closed diagnostic catalog.
//!
//! Every user-facing rejection in the compiler carries one of the codes
//! below. Codes are stable across releases: `LO` followed by four digits,
//! grouped into domains by thousands block. New codes are appended, never
//! renumbered.

use std::fmt;

/// Diagnostic domain, derived from the code's thousands block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    EntryAndExpressions,
    ControlFlow,
    FunctionsImportsAndAnnotations,
    ClassesAndMethods,
    TypesAndTraits,
    KernelDialect,
    Other,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Domain::EntryAndExpressions => "entry-and-expressions",
            Domain::ControlFlow => "control-flow",
            Domain::FunctionsImportsAndAnnotations => "functions-imports-and-annotations",
            Domain::ClassesAndMethods => "classes-and-methods",
            Domain::TypesAndTraits => "types-and-traits",
            Domain::KernelDialect => "kernel-dialect",
            Domain::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Catalog constants, grouped by domain.
pub mod codes {
    // Entry and expressions (LO1xxx)
    pub const SYNTAX_ERROR: &str = "LO1001";
    pub const MISSING_MAIN: &str = "LO1002";
    pub const MAIN_SIGNATURE: &str = "LO1003";
    pub const UNSUPPORTED_EXPRESSION: &str = "LO1004";
    pub const UNDEFINED_REJECTED: &str = "LO1005";
    pub const UNSUPPORTED_LITERAL: &str = "LO1006";
    pub const UNSUPPORTED_CAST: &str = "LO1007";
    pub const OBJECT_LITERAL_FIELD_CAST: &str = "LO1008";
    pub const UNSUPPORTED_TEMPLATE_PART: &str = "LO1009";

    // Control flow (LO2xxx)
    pub const UNINITIALIZED_LOCAL: &str = "LO2001";
    pub const UNSUPPORTED_STATEMENT: &str = "LO2002";
    pub const SWITCH_DUPLICATE_LABEL: &str = "LO2003";
    pub const UNION_SWITCH_DEFAULT: &str = "LO2004";
    pub const UNION_SWITCH_NON_LITERAL_CASE: &str = "LO2005";
    pub const UNION_SWITCH_FALLTHROUGH: &str = "LO2006";
    pub const UNION_SWITCH_DUPLICATE_CASE: &str = "LO2007";
    pub const UNION_SWITCH_UNKNOWN_KIND: &str = "LO2008";
    pub const FOR_VAR_REJECTED: &str = "LO2009";
    pub const FOR_OF_REJECTED: &str = "LO2010";
    pub const TOP_LEVEL_NON_CONST: &str = "LO2011";
    pub const BLOCK_BODIED_ARROW: &str = "LO2012";

    // Functions, imports and annotations (LO3xxx)
    pub const UNNAMED_FUNCTION: &str = "LO3001";
    pub const MISSING_BODY: &str = "LO3002";
    pub const DESTRUCTURED_PARAM: &str = "LO3003";
    pub const MISSING_TYPE_ANNOTATION: &str = "LO3004";
    pub const OPTIONAL_OR_DEFAULT_PARAM: &str = "LO3005";
    pub const GENERIC_FUNCTION: &str = "LO3006";
    pub const DUPLICATE_HELPER: &str = "LO3007";
    pub const UNSUPPORTED_TOP_LEVEL: &str = "LO3008";
    pub const IMPORT_RELATIVE_EXTENSION: &str = "LO3009";
    pub const IMPORT_NAMESPACE: &str = "LO3010";
    pub const IMPORT_DEFAULT: &str = "LO3011";
    pub const IMPORT_SIDE_EFFECT: &str = "LO3012";
    pub const IMPORT_MISSING_MAPPING: &str = "LO3013";
    pub const IMPORT_MISSING_MANIFEST: &str = "LO3014";
    pub const IMPORT_UNRESOLVED_PACKAGE: &str = "LO3015";
    pub const IMPORT_ENTRY_MODULE: &str = "LO3016";
    pub const BARREL_REEXPORT: &str = "LO3017";
    pub const MANIFEST_FEATURES_TYPE: &str = "LO3018";
    pub const MANIFEST_CRATE_SOURCE: &str = "LO3019";
    pub const MODULE_NAME_COLLISION: &str = "LO3020";
    pub const ANNOTATION_SHAPE: &str = "LO3021";
    pub const ANNOTATION_TARGET: &str = "LO3022";

    // Classes and methods (LO4xxx)
    pub const ANONYMOUS_CLASS: &str = "LO4001";
    pub const MISSING_FIELD_TYPE: &str = "LO4002";
    pub const CONSTRUCTOR_OPTIONAL_PARAM: &str = "LO4003";
    pub const STATIC_METHOD: &str = "LO4004";
    pub const METHOD_THIS_TYPE: &str = "LO4005";
    pub const OPTIONAL_METHOD_PARAM: &str = "LO4006";
    pub const INVALID_BORROW: &str = "LO4007";
    pub const UNKNOWN_INTERFACE: &str = "LO4008";

    // Types and traits (LO5xxx)
    pub const UNSUPPORTED_TYPE: &str = "LO5001";
    pub const MUT_ARITY: &str = "LO5002";
    pub const OPTION_ARITY: &str = "LO5003";
    pub const RESULT_ARITY: &str = "LO5004";
    pub const VEC_ARITY: &str = "LO5005";
    pub const HASHMAP_ARITY: &str = "LO5006";
    pub const SLICE_ARITY: &str = "LO5007";
    pub const ARRAYN_ARITY: &str = "LO5008";
    pub const ARRAYN_LENGTH: &str = "LO5009";
    pub const REF_ARITY: &str = "LO5010";
    pub const LIFETIME_NOT_LITERAL: &str = "LO5011";
    pub const ALIAS_UNSUPPORTED: &str = "LO5012";
    pub const ALIAS_INTERSECTION: &str = "LO5013";
    pub const TRAIT_OPTIONAL_MEMBER: &str = "LO5014";
    pub const TRAIT_OPTIONAL_METHOD_PARAM: &str = "LO5015";
    pub const TRAIT_GENERIC_DEFAULT: &str = "LO5016";
    pub const UNION_DUPLICATE_KIND: &str = "LO5017";
    pub const UNION_SHAPE: &str = "LO5018";
    pub const UNKNOWN_CONSTRAINT: &str = "LO5019";

    // Kernel dialect (LO6xxx)
    pub const KERNEL_NOT_CONST: &str = "LO6001";
    pub const KERNEL_NOT_TOP_LEVEL: &str = "LO6002";
    pub const KERNEL_DUPLICATE_NAME: &str = "LO6003";
    pub const KERNEL_ARG_COUNT: &str = "LO6004";
    pub const KERNEL_SPEC_SHAPE: &str = "LO6005";
    pub const KERNEL_NAME_IDENT: &str = "LO6006";
    pub const KERNEL_FN_SHAPE: &str = "LO6007";
    pub const KERNEL_PARAM: &str = "LO6008";
    pub const KERNEL_EXPRESSION: &str = "LO6009";
    pub const KERNEL_CALL: &str = "LO6010";
    pub const KERNEL_STATEMENT: &str = "LO6011";
    pub const KERNEL_OPERATOR: &str = "LO6012";
    pub const KERNEL_LITERAL_CAST: &str = "LO6013";
    pub const KERNEL_CAST_NON_SCALAR: &str = "LO6014";
    pub const KERNEL_POINTER_CAST: &str = "LO6015";
    pub const KERNEL_ATOMIC_ADD: &str = "LO6016";
    pub const KERNEL_EXPF: &str = "LO6017";
    pub const KERNEL_ADDR: &str = "LO6018";
    pub const KERNEL_SYNCTHREADS: &str = "LO6019";
    pub const KERNEL_SHARED_ARRAY: &str = "LO6020";
    pub const KERNEL_FOR_SHAPE: &str = "LO6021";
    pub const KERNEL_LAUNCH_SHAPE: &str = "LO6022";
    pub const KERNEL_INTRINSIC_ON_HOST: &str = "LO6023";
    pub const KERNEL_VALUE_ESCAPES: &str = "LO6024";
    pub const KERNEL_TYPE_MISMATCH: &str = "LO6025";
    pub const KERNEL_UNKNOWN_IDENT: &str = "LO6026";
    pub const KERNEL_RETURN_VALUE: &str = "LO6027";
}

/// The full registered set, in catalog order.
pub const ALL_CODES: &[&str] = &[
    codes::SYNTAX_ERROR,
    codes::MISSING_MAIN,
    codes::MAIN_SIGNATURE,
    codes::UNSUPPORTED_EXPRESSION,
    codes::UNDEFINED_REJECTED,
    codes::UNSUPPORTED_LITERAL,
    codes::UNSUPPORTED_CAST,
    codes::OBJECT_LITERAL_FIELD_CAST,
    codes::UNSUPPORTED_TEMPLATE_PART,
    codes::UNINITIALIZED_LOCAL,
    codes::UNSUPPORTED_STATEMENT,
    codes::SWITCH_DUPLICATE_LABEL,
    codes::UNION_SWITCH_DEFAULT,
    codes::UNION_SWITCH_NON_LITERAL_CASE,
    codes::UNION_SWITCH_FALLTHROUGH,
    codes::UNION_SWITCH_DUPLICATE_CASE,
    codes::UNION_SWITCH_UNKNOWN_KIND,
    codes::FOR_VAR_REJECTED,
    codes::FOR_OF_REJECTED,
    codes::TOP_LEVEL_NON_CONST,
    codes::BLOCK_BODIED_ARROW,
    codes::UNNAMED_FUNCTION,
    codes::MISSING_BODY,
    codes::DESTRUCTURED_PARAM,
    codes::MISSING_TYPE_ANNOTATION,
    codes::OPTIONAL_OR_DEFAULT_PARAM,
    codes::GENERIC_FUNCTION,
    codes::DUPLICATE_HELPER,
    codes::UNSUPPORTED_TOP_LEVEL,
    codes::IMPORT_RELATIVE_EXTENSION,
    codes::IMPORT_NAMESPACE,
    codes::IMPORT_DEFAULT,
    codes::IMPORT_SIDE_EFFECT,
    codes::IMPORT_MISSING_MAPPING,
    codes::IMPORT_MISSING_MANIFEST,
    codes::IMPORT_UNRESOLVED_PACKAGE,
    codes::IMPORT_ENTRY_MODULE,
    codes::BARREL_REEXPORT,
    codes::MANIFEST_FEATURES_TYPE,
    codes::MANIFEST_CRATE_SOURCE,
    codes::MODULE_NAME_COLLISION,
    codes::ANNOTATION_SHAPE,
    codes::ANNOTATION_TARGET,
    codes::ANONYMOUS_CLASS,
    codes::MISSING_FIELD_TYPE,
    codes::CONSTRUCTOR_OPTIONAL_PARAM,
    codes::STATIC_METHOD,
    codes::METHOD_THIS_TYPE,
    codes::OPTIONAL_METHOD_PARAM,
    codes::INVALID_BORROW,
    codes::UNKNOWN_INTERFACE,
    codes::UNSUPPORTED_TYPE,
    codes::MUT_ARITY,
    codes::OPTION_ARITY,
    codes::RESULT_ARITY,
    codes::VEC_ARITY,
    codes::HASHMAP_ARITY,
    codes::SLICE_ARITY,
    codes::ARRAYN_ARITY,
    codes::ARRAYN_LENGTH,
    codes::REF_ARITY,
    codes::LIFETIME_NOT_LITERAL,
    codes::ALIAS_UNSUPPORTED,
    codes::ALIAS_INTERSECTION,
    codes::TRAIT_OPTIONAL_MEMBER,
    codes::TRAIT_OPTIONAL_METHOD_PARAM,
    codes::TRAIT_GENERIC_DEFAULT,
    codes::UNION_DUPLICATE_KIND,
    codes::UNION_SHAPE,
    codes::UNKNOWN_CONSTRAINT,
    codes::KERNEL_NOT_CONST,
    codes::KERNEL_NOT_TOP_LEVEL,
    codes::KERNEL_DUPLICATE_NAME,
    codes::KERNEL_ARG_COUNT,
    codes::KERNEL_SPEC_SHAPE,
    codes::KERNEL_NAME_IDENT,
    codes::KERNEL_FN_SHAPE,
    codes::KERNEL_PARAM,
    codes::KERNEL_EXPRESSION,
    codes::KERNEL_CALL,
    codes::KERNEL_STATEMENT,
    codes::KERNEL_OPERATOR,
    codes::KERNEL_LITERAL_CAST,
    codes::KERNEL_CAST_NON_SCALAR,
    codes::KERNEL_POINTER_CAST,
    codes::KERNEL_ATOMIC_ADD,
    codes::KERNEL_EXPF,
    codes::KERNEL_ADDR,
    codes::KERNEL_SYNCTHREADS,
    codes::KERNEL_SHARED_ARRAY,
    codes::KERNEL_FOR_SHAPE,
    codes::KERNEL_LAUNCH_SHAPE,
    codes::KERNEL_INTRINSIC_ON_HOST,
    codes::KERNEL_VALUE_ESCAPES,
    codes::KERNEL_TYPE_MISMATCH,
    codes::KERNEL_UNKNOWN_IDENT,
    codes::KERNEL_RETURN_VALUE,
];

/// Whether `code` is part of the catalog.
pub fn contains(code: &str) -> bool {
    ALL_CODES.contains(&code)
}

/// Domain of a registered code.
///
/// Unknown codes are an internal bug, not a user error. This is the one
/// place in the workspace allowed to abort on bad input.
#[allow(clippy::panic)]
pub fn domain_of(code: &str) -> Domain {
    if !contains(code) {
        panic!("diagnostic code {code} is not registered");
    }
    match code.as_bytes().get(2) {
        Some(b'1') => Domain::EntryAndExpressions,
        Some(b'2') => Domain::ControlFlow,
        Some(b'3') => Domain::FunctionsImportsAndAnnotations,
        Some(b'4') => Domain::ClassesAndMethods,
        Some(b'5') => Domain::TypesAndTraits,
        Some(b'6') => Domain::KernelDialect,
        _ => Domain::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_well_formed() {
        for code in ALL_CODES {
            assert_eq!(code.len(), 6, "code {code} must be LO + four digits");
            assert!(code.starts_with("LO"));
            assert!(code[2..].bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_no_duplicate_codes() {
        let mut seen = std::collections::HashSet::new();
        for code in ALL_CODES {
            assert!(seen.insert(code), "duplicate code {code}");
        }
    }

    #[test]
    fn test_every_code_has_a_domain() {
        for code in ALL_CODES {
            assert_ne!(domain_of(code), Domain::Other, "{code} maps to other");
        }
    }

    #[test]
    fn test_contains_rejects_unknown() {
        assert!(!contains("LO9999"));
        assert!(contains(codes::MISSING_MAIN));
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_domain_of_unknown_panics() {
        let _ = domain_of("LO9999");
    }
}
