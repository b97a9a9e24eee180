//! Facade declaration emission.
//!
//! Each native module becomes one declarations file. Declarations are
//! sorted by kind, then name, so reruns are byte-identical.

use std::collections::BTreeMap;

/// A module ready for emission.
#[derive(Debug, Clone)]
pub struct FacadeModule {
    /// Dotted native module path, e.g. `geo` or `geo.math`.
    pub dotted_path: String,
    /// File stem of the emitted declarations file (`index`, `math`, ...).
    pub stem: String,
    pub decls: Vec<FacadeDecl>,
}

#[derive(Debug, Clone)]
pub enum FacadeDecl {
    Const {
        name: String,
        ty: String,
    },
    Function(FacadeFn),
    Class(FacadeClass),
    /// Native enum: unit variants become PascalCased static members.
    EnumClass {
        name: String,
        members: Vec<String>,
    },
    Interface(FacadeInterface),
}

#[derive(Debug, Clone)]
pub struct FacadeFn {
    pub name: String,
    pub generics: Vec<String>,
    pub params: Vec<(String, String)>,
    pub ret: String,
}

#[derive(Debug, Clone)]
pub struct FacadeClass {
    pub name: String,
    pub generics: Vec<String>,
    pub fields: Vec<(String, String)>,
    pub constructor: Option<Vec<(String, String)>>,
    pub methods: Vec<FacadeFn>,
    pub statics: Vec<FacadeFn>,
}

#[derive(Debug, Clone)]
pub struct FacadeInterface {
    pub name: String,
    /// Generic parameters, associated types appended.
    pub generics: Vec<String>,
    pub methods: Vec<FacadeMethod>,
}

#[derive(Debug, Clone)]
pub struct FacadeMethod {
    pub name: String,
    /// `ref<this>` or `mutref<this>`
    pub this_ty: String,
    pub params: Vec<(String, String)>,
    pub ret: String,
}

impl FacadeDecl {
    fn kind_rank(&self) -> u8 {
        match self {
            FacadeDecl::Const { .. } => 0,
            FacadeDecl::Function(_) => 1,
            FacadeDecl::Class(_) => 2,
            FacadeDecl::EnumClass { .. } => 3,
            FacadeDecl::Interface(_) => 4,
        }
    }

    fn name(&self) -> &str {
        match self {
            FacadeDecl::Const { name, .. } => name,
            FacadeDecl::Function(f) => &f.name,
            FacadeDecl::Class(c) => &c.name,
            FacadeDecl::EnumClass { name, .. } => name,
            FacadeDecl::Interface(i) => &i.name,
        }
    }
}

fn render_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(name, ty)| format!("{}: {}", name, ty))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_generics(generics: &[String]) -> String {
    if generics.is_empty() {
        String::new()
    } else {
        format!("<{}>", generics.join(", "))
    }
}

/// Render one module's declarations file.
pub fn render_module(module: &FacadeModule) -> String {
    let mut decls = module.decls.clone();
    decls.sort_by(|a, b| {
        a.kind_rank()
            .cmp(&b.kind_rank())
            .then_with(|| a.name().cmp(b.name()))
    });

    let mut out = String::new();
    for (i, decl) in decls.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match decl {
            FacadeDecl::Const { name, ty } => {
                out.push_str(&format!("export declare const {}: {};\n", name, ty));
            }
            FacadeDecl::Function(f) => {
                out.push_str(&format!(
                    "export function {}{}({}): {};\n",
                    f.name,
                    render_generics(&f.generics),
                    render_params(&f.params),
                    f.ret
                ));
            }
            FacadeDecl::Class(class) => {
                out.push_str(&format!(
                    "export declare class {}{} {{\n",
                    class.name,
                    render_generics(&class.generics)
                ));
                for (fname, fty) in &class.fields {
                    out.push_str(&format!("  {}: {};\n", fname, fty));
                }
                if let Some(params) = &class.constructor {
                    out.push_str(&format!("  constructor({});\n", render_params(params)));
                }
                for method in &class.methods {
                    out.push_str(&format!(
                        "  {}({}): {};\n",
                        method.name,
                        render_params(&method.params),
                        method.ret
                    ));
                }
                for method in &class.statics {
                    out.push_str(&format!(
                        "  static {}({}): {};\n",
                        method.name,
                        render_params(&method.params),
                        method.ret
                    ));
                }
                out.push_str("}\n");
            }
            FacadeDecl::EnumClass { name, members } => {
                out.push_str(&format!("export declare class {} {{\n", name));
                for member in members {
                    out.push_str(&format!("  static {}: {};\n", member, name));
                }
                out.push_str("}\n");
            }
            FacadeDecl::Interface(iface) => {
                out.push_str(&format!(
                    "export declare interface {}{} {{\n",
                    iface.name,
                    render_generics(&iface.generics)
                ));
                for method in &iface.methods {
                    let mut params = vec![("this".to_string(), method.this_ty.clone())];
                    params.extend(method.params.iter().cloned());
                    out.push_str(&format!(
                        "  {}({}): {};\n",
                        method.name,
                        render_params(&params),
                        method.ret
                    ));
                }
                out.push_str("}\n");
            }
        }
    }
    out
}

/// Package descriptor (`<pkg>.json`) with an exports table per module.
pub fn render_package_descriptor(pkg: &str, version: &str, modules: &[FacadeModule]) -> String {
    let mut exports = BTreeMap::new();
    for module in modules {
        let key = if module.stem == "index" {
            ".".to_string()
        } else {
            format!("./{}", module.stem)
        };
        exports.insert(
            key,
            serde_json::json!({
                "types": format!("./{}.d.ls", module.stem),
                "default": format!("./{}.ls", module.stem),
            }),
        );
    }

    let descriptor = serde_json::json!({
        "name": pkg,
        "version": version,
        "exports": exports,
    });
    serde_json::to_string_pretty(&descriptor).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_class_matches_declaration_shape() {
        let module = FacadeModule {
            dotted_path: "geo".to_string(),
            stem: "index".to_string(),
            decls: vec![
                FacadeDecl::Function(FacadeFn {
                    name: "add".to_string(),
                    generics: vec![],
                    params: vec![
                        ("a".to_string(), "i32".to_string()),
                        ("b".to_string(), "i32".to_string()),
                    ],
                    ret: "i32".to_string(),
                }),
                FacadeDecl::Class(FacadeClass {
                    name: "Point".to_string(),
                    generics: vec![],
                    fields: vec![
                        ("x".to_string(), "i32".to_string()),
                        ("y".to_string(), "i32".to_string()),
                    ],
                    constructor: Some(vec![
                        ("x".to_string(), "i32".to_string()),
                        ("y".to_string(), "i32".to_string()),
                    ]),
                    methods: vec![FacadeFn {
                        name: "sum".to_string(),
                        generics: vec![],
                        params: vec![],
                        ret: "i32".to_string(),
                    }],
                    statics: vec![],
                }),
            ],
        };
        let text = render_module(&module);
        assert!(text.contains("export declare class Point {"));
        assert!(text.contains("constructor(x: i32, y: i32);"));
        assert!(text.contains("sum(): i32;"));
        assert!(text.contains("export function add(a: i32, b: i32): i32;"));
        // Functions sort before classes.
        assert!(text.find("add").unwrap() < text.find("Point").unwrap());
    }

    #[test]
    fn test_enum_members_are_static() {
        let module = FacadeModule {
            dotted_path: "geo".to_string(),
            stem: "index".to_string(),
            decls: vec![FacadeDecl::EnumClass {
                name: "Color".to_string(),
                members: vec!["Red".to_string(), "Green".to_string()],
            }],
        };
        let text = render_module(&module);
        assert!(text.contains("static Red: Color;"));
    }

    #[test]
    fn test_descriptor_exports_table() {
        let modules = vec![
            FacadeModule {
                dotted_path: "geo".to_string(),
                stem: "index".to_string(),
                decls: vec![],
            },
            FacadeModule {
                dotted_path: "geo.math".to_string(),
                stem: "math".to_string(),
                decls: vec![],
            },
        ];
        let json = render_package_descriptor("geo", "0.4.2", &modules);
        assert!(json.contains("\"types\": \"./index.d.ls\""));
        assert!(json.contains("\"./math\""));
    }
}
