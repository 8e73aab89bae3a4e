//! Procedural macros for the docrepo project.
//!
//! `#[derive(Entity)]` implements `docrepo::document::Entity` for a struct with named
//! fields, deriving the field table from the struct's serde representation.
//!
//! ```ignore
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Entity)]
//! #[entity(collection = "articles")]
//! pub struct Article {
//!     #[entity(id)]
//!     pub slug: String,
//!     pub title: String,
//!     #[serde(rename = "tagIds")]
//!     pub tag_ids: Vec<String>,
//! }
//! ```
//!
//! Container options (`#[entity(...)]` on the struct):
//!
//! - `collection = "..."` - collection name, defaults to the snake-cased struct name
//! - `crate = "..."` - path of the docrepo crate, defaults to `::docrepo`
//!
//! The identity is the field marked `#[entity(id)]`, or the field named `id`.
//! Field names honour `#[serde(rename = "...")]`, `#[serde(rename_all = "...")]`
//! and skip `#[serde(skip)]` / `#[serde(skip_serializing)]` fields.

#[allow(unused_extern_crates)]
extern crate self as docrepo_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, Ident, LitStr, Path, Result, Token, Type,
    parse_macro_input, spanned::Spanned,
};

#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    match impl_entity(parse_macro_input!(input as DeriveInput)) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct ContainerConfig {
    collection: Option<LitStr>,
    krate: Option<Path>,
}

struct SerdeField {
    rename: Option<String>,
    skip: bool,
}

fn impl_entity(input: DeriveInput) -> Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(Error::new(
                    input.span(),
                    "#[derive(Entity)] requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.span(),
                "#[derive(Entity)] only supports structs",
            ))
        }
    };

    let config = parse_container(&input.attrs)?;
    let rename_all = parse_rename_all(&input.attrs)?;

    let mut names = Vec::new();
    let mut marked_id: Option<(Ident, Type, String)> = None;
    let mut named_id: Option<(Ident, Type, String)> = None;

    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };

        let serde = parse_serde_field(&field.attrs)?;
        let raw = ident.to_string();
        let raw = raw.strip_prefix("r#").unwrap_or(&raw).to_string();
        let name = match (&serde.rename, &rename_all) {
            (Some(rename), _) => rename.clone(),
            (None, Some(rule)) => apply_rename_rule(&raw, rule, &ident)?,
            (None, None) => raw.clone(),
        };

        let is_marked = is_marked_id(&field.attrs)?;

        if serde.skip {
            if is_marked {
                return Err(Error::new(field.span(), "the identity field cannot be skipped by serde"));
            }
            continue;
        }

        if is_marked {
            if marked_id.is_some() {
                return Err(Error::new(field.span(), "only one field may be marked #[entity(id)]"));
            }
            marked_id = Some((ident.clone(), field.ty.clone(), name.clone()));
        } else if raw == "id" {
            named_id = Some((ident.clone(), field.ty.clone(), name.clone()));
        }

        names.push(name);
    }

    let (id_ident, id_ty, id_name) = marked_id.or(named_id).ok_or_else(|| {
        Error::new(
            input.ident.span(),
            "#[derive(Entity)] needs a field named `id` or a field marked #[entity(id)]",
        )
    })?;

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let krate = config
        .krate
        .map(|path| quote! { #path })
        .unwrap_or_else(|| quote! { ::docrepo });
    let collection = config
        .collection
        .map(|lit| lit.value())
        .unwrap_or_else(|| to_snake_case(&name.to_string()));

    Ok(quote! {
        impl #impl_generics #krate::document::Entity for #name #ty_generics #where_clause {
            type Id = #id_ty;

            fn id(&self) -> &Self::Id {
                &self.#id_ident
            }

            fn collection_name() -> &'static str {
                #collection
            }

            fn field_names() -> &'static [&'static str] {
                &[#(#names),*]
            }

            fn id_field() -> &'static str {
                #id_name
            }
        }
    })
}

fn parse_container(attrs: &[Attribute]) -> Result<ContainerConfig> {
    let mut config = ContainerConfig { collection: None, krate: None };

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                config.collection = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("crate") {
                let path: LitStr = meta.value()?.parse()?;
                config.krate = Some(path.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `collection` or `crate`"))
            }
        })?;
    }

    Ok(config)
}

fn is_marked_id(attrs: &[Attribute]) -> Result<bool> {
    let mut marked = false;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                marked = true;
                Ok(())
            } else {
                Err(meta.error("unsupported entity field attribute, expected `id`"))
            }
        })?;
    }

    Ok(marked)
}

fn parse_rename_all(attrs: &[Attribute]) -> Result<Option<LitStr>> {
    let mut rename_all = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                rename_all = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                skip_meta_value(&meta)
            }
        })?;
    }

    Ok(rename_all)
}

fn parse_serde_field(attrs: &[Attribute]) -> Result<SerdeField> {
    let mut field = SerdeField { rename: None, skip: false };

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                field.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                field.skip = true;
                Ok(())
            } else {
                skip_meta_value(&meta)
            }
        })?;
    }

    Ok(field)
}

/// Consumes `= value` or `(...)` after a serde option this macro does not interpret.
fn skip_meta_value(meta: &syn::meta::ParseNestedMeta) -> Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<TokenStream2>()?;
    }

    Ok(())
}

fn apply_rename_rule(field: &str, rule: &LitStr, ident: &Ident) -> Result<String> {
    let words = field.split('_').filter(|word| !word.is_empty());

    Ok(match rule.value().as_str() {
        "lowercase" => field.to_lowercase(),
        "UPPERCASE" => field.to_uppercase(),
        "snake_case" => field.to_string(),
        "SCREAMING_SNAKE_CASE" => field.to_uppercase(),
        "kebab-case" => field.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => field.replace('_', "-").to_uppercase(),
        "PascalCase" => words.map(capitalize).collect(),
        "camelCase" => words
            .enumerate()
            .map(|(index, word)| if index == 0 { word.to_string() } else { capitalize(word) })
            .collect(),
        other => {
            return Err(Error::new(
                ident.span(),
                format!("unsupported serde rename_all rule `{other}`"),
            ))
        }
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn to_snake_case(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);
    for (index, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if index > 0 {
                snake.push('_');
            }
            snake.extend(ch.to_lowercase());
        } else {
            snake.push(ch);
        }
    }
    snake
}
