//! Procedural macros for Joinery.
//!
//! Provides `#[derive(Component)]`, which writes the declarative
//! parameter descriptor and constructor for a struct.
//!
//! # Attributes
//!
//! ## Struct-level
//!
//! - `#[component(module = "name")]` registers the class in the named
//!   module, so `Module::discover("name")` finds it.
//!
//! ## Field-level
//!
//! - `#[component(name = "param")]` resolves the field under another name.
//! - `#[component(untyped)]` resolves by name only.
//! - `#[component(default = expr)]` falls back to `expr`. String literals
//!   are parsed as expressions, so write `default = String::from("x")`.
//! - `#[component(default_class = "Path")]` falls back to a built `Path`.
//! - `#[component(inject = expr)]` initialises an `Inject` field with
//!   `expr` instead of `Inject::by_name("<field>")`.
//! - `#[component(skip)]` initialises the field with `Default::default()`.
//!
//! Field types decide how the resolved value is read: `Arc<X>` shares the
//! value, `Option<X>` and `Option<Arc<X>>` default to `None`, `Inject<X>`
//! is activated after construction, and anything else is cloned.
//!
//! # Example
//!
//! ```ignore
//! use joinery::prelude::*;
//!
//! #[derive(Component)]
//! #[component(module = "services")]
//! struct Orders {
//!     db: Arc<Database>,
//!     #[component(default = 30u64)]
//!     timeout_secs: u64,
//!     region: Option<String>,
//!     #[component(inject = Inject::now())]
//!     now: Inject<DateTime<Local>>,
//! }
//! ```

use darling::ast::Data;
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Expr, GenericArgument, Ident, Path, PathArguments, Type, parse_macro_input};

#[derive(FromDeriveInput)]
#[darling(attributes(component), supports(struct_named, struct_unit))]
struct ComponentInput {
    ident: Ident,
    generics: syn::Generics,
    data: Data<(), ComponentField>,
    #[darling(default)]
    module: Option<String>,
}

#[derive(FromField)]
#[darling(attributes(component))]
struct ComponentField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    name: Option<String>,
    #[darling(default)]
    untyped: bool,
    #[darling(default)]
    default: Option<Expr>,
    #[darling(default)]
    default_class: Option<Path>,
    #[darling(default)]
    inject: Option<Expr>,
    #[darling(default)]
    skip: bool,
}

/// How a field's type is read from the resolved arguments.
#[derive(Clone, Copy)]
enum Shape<'a> {
    Shared(&'a Type),
    OptionalShared(&'a Type),
    Optional(&'a Type),
    Inject,
    Owned,
}

/// Derives `joinery::Component` for a struct.
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_component_impl(&input)
        .unwrap_or_else(|err| err.write_errors())
        .into()
}

fn derive_component_impl(input: &DeriveInput) -> darling::Result<TokenStream2> {
    let component = ComponentInput::from_derive_input(input)?;
    let ident = &component.ident;

    if !component.generics.params.is_empty() {
        return Err(darling::Error::custom(
            "#[derive(Component)] does not support generic structs",
        )
        .with_span(&component.generics));
    }

    let fields = match component.data {
        Data::Struct(fields) => fields.fields,
        Data::Enum(_) => {
            return Err(darling::Error::custom("#[derive(Component)] only supports structs")
                .with_span(ident));
        }
    };

    let mut params = Vec::new();
    let mut inits = Vec::new();
    let mut activations = Vec::new();
    let mut errors = darling::Error::accumulator();

    for field in &fields {
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };

        if field.skip {
            inits.push(quote! { #field_ident: ::core::default::Default::default() });
            continue;
        }

        let shape = shape_of(&field.ty);

        if let Shape::Inject = shape {
            let name = field_ident.to_string();
            let init = match &field.inject {
                Some(expr) => quote! { #expr },
                None => quote! { ::joinery::Inject::by_name(#name) },
            };
            inits.push(quote! { #field_ident: #init });
            activations.push(quote! { self.#field_ident.activate(di); });
            continue;
        }

        if field.inject.is_some() {
            errors.push(
                darling::Error::custom("`inject` only applies to `Inject<T>` fields")
                    .with_span(field_ident),
            );
            continue;
        }
        if field.default.is_some() && field.default_class.is_some() {
            errors.push(
                darling::Error::custom("use either `default` or `default_class`, not both")
                    .with_span(field_ident),
            );
            continue;
        }

        let name = field
            .name
            .clone()
            .unwrap_or_else(|| field_ident.to_string());
        let field_ty = &field.ty;

        let param_ty = match shape {
            Shape::Shared(inner) | Shape::OptionalShared(inner) | Shape::Optional(inner) => {
                quote! { #inner }
            }
            Shape::Inject | Shape::Owned => quote! { #field_ty },
        };

        let mut param = if field.untyped {
            quote! { ::joinery::Param::named(#name) }
        } else {
            quote! { ::joinery::Param::typed::<#param_ty>(#name) }
        };

        if let Some(expr) = &field.default {
            param = match shape {
                Shape::Shared(inner) => quote! {
                    #param.default_instance(::joinery::Instance::from_arc::<#inner>(#expr))
                },
                _ => quote! { #param.default::<#field_ty>(#expr) },
            };
        } else if let Some(class) = &field.default_class {
            param = quote! { #param.default_class(::joinery::Class::of::<#class>()) };
        } else {
            param = match shape {
                Shape::OptionalShared(inner) => quote! {
                    #param.default::<::core::option::Option<::std::sync::Arc<#inner>>>(::core::option::Option::None)
                },
                Shape::Optional(inner) => quote! { #param.default_none::<#inner>() },
                _ => param,
            };
        }
        params.push(param);

        let read = match shape {
            Shape::Shared(inner) => quote! { args.get::<#inner>(#name)? },
            Shape::OptionalShared(inner) => quote! { args.optional_arc::<#inner>(#name)? },
            Shape::Optional(inner) => quote! { args.optional::<#inner>(#name)? },
            Shape::Inject | Shape::Owned => quote! { args.value::<#field_ty>(#name)? },
        };
        inits.push(quote! { #field_ident: #read });
    }

    errors.finish()?;

    let registration = component.module.as_ref().map(|module| {
        quote! { ::joinery::register_class!(#module, #ident); }
    });

    Ok(quote! {
        impl ::joinery::Component for #ident {
            fn signature() -> ::joinery::Signature {
                ::joinery::Signature::new()
                    #(.param(#params))*
            }

            #[allow(unused_variables)]
            fn construct(args: &::joinery::Arguments) -> ::joinery::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#inits,)*
                })
            }

            #[allow(unused_variables)]
            fn activate(&self, di: &::joinery::Di) {
                #(#activations)*
            }
        }

        #registration
    })
}

fn shape_of(ty: &Type) -> Shape<'_> {
    match wrapper(ty) {
        Some(("Arc", inner)) => Shape::Shared(inner),
        Some(("Option", inner)) => match wrapper(inner) {
            Some(("Arc", shared)) => Shape::OptionalShared(shared),
            _ => Shape::Optional(inner),
        },
        Some(("Inject", _)) => Shape::Inject,
        _ => Shape::Owned,
    }
}

/// Splits `Wrapper<Inner>` into the wrapper's name and `Inner`.
fn wrapper(ty: &Type) -> Option<(&'static str, &Type)> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    let name = ["Arc", "Option", "Inject"]
        .into_iter()
        .find(|known| segment.ident == known)?;
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some((name, inner)),
        _ => None,
    }
}
