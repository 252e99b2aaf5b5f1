//! Attribute macro for spindle test classes.
//!
//! `#[test_class]` goes on an inherent `impl` block. It leaves the block in place and adds an implementation of
//! `spindle_core::Reflect` that describes the type and every `fn` in the block:
//! - name, visibility, receiver, parameter types and return type are recorded as metadata for every method;
//! - methods that take `&self`/`&mut self`, return `()`/`Result<(), E>` and whose parameters are one of `()`,
//!   `(&mut TestLog)`, `(&CancellationToken)` or `(&mut TestLog, &CancellationToken)` are also bound to an entry
//!   point the engine can call;
//! - `#[display_name = "..."]` on a method overrides the name shown to hosts (the attribute is consumed).
//!
//! # Example
//! ```ignore
//! #[derive(Default)]
//! struct ParserTests;
//!
//! #[test_class(namespace = "Demo.Tests")]
//! impl ParserTests {
//!     pub fn parses_empty_input(&mut self) {}
//!
//!     #[display_name = "Reports progress"]
//!     pub fn reports_progress(&mut self, log: &mut TestLog) -> TestResult {
//!         log.line("step 1");
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Options
//! - `namespace = "A.B"`: defaults to the module path with `::` replaced by `.`
//! - `name = "Other"`: overrides the simple class name (defaults to the type's name)
//! - `unsealed`, `is_abstract`: structural flags (classes are sealed and concrete by default)
//! - `disposable`: the type implements `spindle_core::Dispose`
//! - `constructor = "path"`: a `fn() -> Result<Self, E>`; defaults to `Default::default`
//! - `no_constructor`: the type cannot be instantiated
//! - `static_init = "path"`: a `fn()` or `fn() -> Result<(), E>` run once before any test of the class

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::Parser;
use syn::{Attribute, Expr, FnArg, ImplItem, ImplItemFn, ItemImpl, Lit, LitStr, Meta, Path, Type};

#[proc_macro_attribute]
pub fn test_class(attr: TokenStream, item: TokenStream) -> TokenStream {
    match expand(attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

// ============================================================================
// Options
// ============================================================================

#[derive(Default)]
struct ClassOptions {
    namespace: Option<LitStr>,
    name: Option<LitStr>,
    unsealed: bool,
    is_abstract: bool,
    disposable: bool,
    constructor: Option<Path>,
    no_constructor: bool,
    static_init: Option<Path>,
}

fn parse_options(attr: TokenStream2) -> syn::Result<ClassOptions> {
    let mut opts = ClassOptions::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("namespace") {
            opts.namespace = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("name") {
            opts.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("unsealed") {
            opts.unsealed = true;
        } else if meta.path.is_ident("is_abstract") {
            opts.is_abstract = true;
        } else if meta.path.is_ident("disposable") {
            opts.disposable = true;
        } else if meta.path.is_ident("no_constructor") {
            opts.no_constructor = true;
        } else if meta.path.is_ident("constructor") {
            let lit: LitStr = meta.value()?.parse()?;
            opts.constructor = Some(lit.parse()?);
        } else if meta.path.is_ident("static_init") {
            let lit: LitStr = meta.value()?.parse()?;
            opts.static_init = Some(lit.parse()?);
        } else {
            return Err(meta.error("unsupported test_class option"));
        }
        Ok(())
    });
    parser.parse2(attr)?;

    if opts.no_constructor && opts.constructor.is_some() {
        return Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "`constructor` and `no_constructor` are mutually exclusive",
        ));
    }
    Ok(opts)
}

// ============================================================================
// Method classification
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum ReceiverKind {
    Shared,
    Mutable,
    Owned,
    Static,
}

enum Param {
    Logger,
    /// `owned` is true for a by-value `CancellationToken`.
    Cancellation { owned: bool },
    Other(String),
}

enum Returns {
    Unit,
    Value(String),
}

struct MethodShape {
    name: String,
    public: bool,
    receiver: ReceiverKind,
    params: Vec<Param>,
    returns: Returns,
    display_name: Option<LitStr>,
    /// Generic, async, unsafe or const-generic methods cannot be bound.
    bindable: bool,
}

fn last_segment_is(path: &syn::Path, ident: &str) -> bool {
    path.segments.last().is_some_and(|seg| seg.ident == ident)
}

fn type_is(ty: &Type, ident: &str) -> bool {
    match ty {
        Type::Path(tp) => tp.qself.is_none() && last_segment_is(&tp.path, ident),
        Type::Paren(inner) => type_is(&inner.elem, ident),
        Type::Group(inner) => type_is(&inner.elem, ident),
        _ => false,
    }
}

fn type_string(ty: &Type) -> String {
    quote!(#ty).to_string()
}

fn classify_param(ty: &Type) -> Param {
    match ty {
        Type::Reference(r) if r.mutability.is_some() && type_is(&r.elem, "TestLog") => Param::Logger,
        Type::Reference(r) if r.mutability.is_none() && type_is(&r.elem, "CancellationToken") => {
            Param::Cancellation { owned: false }
        }
        _ if type_is(ty, "CancellationToken") => Param::Cancellation { owned: true },
        _ => Param::Other(type_string(ty)),
    }
}

fn classify_return(output: &syn::ReturnType) -> Returns {
    let ty = match output {
        syn::ReturnType::Default => return Returns::Unit,
        syn::ReturnType::Type(_, ty) => ty.as_ref(),
    };
    match ty {
        Type::Tuple(t) if t.elems.is_empty() => Returns::Unit,
        Type::Path(tp) if last_segment_is(&tp.path, "TestResult") => Returns::Unit,
        Type::Path(tp) if last_segment_is(&tp.path, "Result") && result_ok_is_unit(&tp.path) => Returns::Unit,
        _ => Returns::Value(type_string(ty)),
    }
}

fn result_ok_is_unit(path: &syn::Path) -> bool {
    let Some(seg) = path.segments.last() else {
        return false;
    };
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return false;
    };
    matches!(
        args.args.first(),
        Some(syn::GenericArgument::Type(Type::Tuple(t))) if t.elems.is_empty()
    )
}

/// Remove `#[display_name = "..."]` from `attrs`, returning its value.
fn take_display_name(attrs: &mut Vec<Attribute>) -> syn::Result<Option<LitStr>> {
    let mut found = None;
    let mut err = None;
    attrs.retain(|attr| {
        if !attr.path().is_ident("display_name") {
            return true;
        }
        match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => found = Some(s.clone()),
                    other => err = Some(syn::Error::new_spanned(other, "display_name must be a string literal")),
                },
                other => err = Some(syn::Error::new_spanned(other, "display_name must be a string literal")),
            },
            other => err = Some(syn::Error::new_spanned(other, "expected `#[display_name = \"...\"]`")),
        }
        false
    });
    match err {
        Some(e) => Err(e),
        None => Ok(found),
    }
}

fn method_shape(func: &mut ImplItemFn) -> syn::Result<MethodShape> {
    let display_name = take_display_name(&mut func.attrs)?;
    let sig = &func.sig;

    let receiver = match sig.receiver() {
        None => ReceiverKind::Static,
        Some(r) if r.colon_token.is_some() => ReceiverKind::Owned,
        Some(r) => match (&r.reference, &r.mutability) {
            (Some(_), Some(_)) => ReceiverKind::Mutable,
            (Some(_), None) => ReceiverKind::Shared,
            (None, _) => ReceiverKind::Owned,
        },
    };

    let params = sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(pt) => Some(classify_param(&pt.ty)),
            FnArg::Receiver(_) => None,
        })
        .collect();

    Ok(MethodShape {
        name: sig.ident.to_string(),
        public: matches!(func.vis, syn::Visibility::Public(_)),
        receiver,
        params,
        returns: classify_return(&sig.output),
        display_name,
        bindable: sig.generics.params.is_empty()
            && sig.asyncness.is_none()
            && sig.unsafety.is_none()
            && sig.variadic.is_none(),
    })
}

// ============================================================================
// Code generation
// ============================================================================

fn entry_tokens(shape: &MethodShape, ident: &syn::Ident) -> Option<TokenStream2> {
    let instance_receiver = matches!(shape.receiver, ReceiverKind::Shared | ReceiverKind::Mutable);
    if !shape.bindable || !instance_receiver || !matches!(shape.returns, Returns::Unit) {
        return None;
    }
    let token_arg = |owned: bool| {
        if owned {
            quote!(::core::clone::Clone::clone(token))
        } else {
            quote!(token)
        }
    };
    let tokens = match shape.params.as_slice() {
        [] => quote! {
            ::spindle_core::EntryPoint::no_args(|this: &mut Self| Self::#ident(this))
        },
        [Param::Logger] => quote! {
            ::spindle_core::EntryPoint::logger(|this: &mut Self, log: &mut ::spindle_core::TestLog| {
                Self::#ident(this, log)
            })
        },
        [Param::Cancellation { owned }] => {
            let arg = token_arg(*owned);
            quote! {
                ::spindle_core::EntryPoint::cancellation(|this: &mut Self, token: &::spindle_core::CancellationToken| {
                    Self::#ident(this, #arg)
                })
            }
        }
        [Param::Logger, Param::Cancellation { owned }] => {
            let arg = token_arg(*owned);
            quote! {
                ::spindle_core::EntryPoint::logger_and_cancellation(
                    |this: &mut Self, log: &mut ::spindle_core::TestLog, token: &::spindle_core::CancellationToken| {
                        Self::#ident(this, log, #arg)
                    },
                )
            }
        }
        _ => return None,
    };
    Some(tokens)
}

fn method_tokens(shape: &MethodShape, ident: &syn::Ident) -> TokenStream2 {
    let name = &shape.name;
    let visibility = if shape.public {
        quote!(::spindle_core::Visibility::Public)
    } else {
        quote!(::spindle_core::Visibility::Private)
    };
    let receiver = match shape.receiver {
        ReceiverKind::Shared => quote!(::spindle_core::Receiver::Shared),
        ReceiverKind::Mutable => quote!(::spindle_core::Receiver::Mutable),
        ReceiverKind::Owned => quote!(::spindle_core::Receiver::Owned),
        ReceiverKind::Static => quote!(::spindle_core::Receiver::Static),
    };
    let params = shape.params.iter().map(|p| match p {
        Param::Logger => quote!(.with_param(::spindle_core::ParamType::Logger)),
        Param::Cancellation { .. } => quote!(.with_param(::spindle_core::ParamType::Cancellation)),
        Param::Other(ty) => quote!(.with_param(::spindle_core::ParamType::Other(::std::borrow::Cow::Borrowed(#ty)))),
    });
    let returns = match &shape.returns {
        Returns::Unit => quote!(::spindle_core::ReturnType::Unit),
        Returns::Value(ty) => quote!(::spindle_core::ReturnType::Value(::std::borrow::Cow::Borrowed(#ty))),
    };
    let display_name = shape.display_name.as_ref().map(|lit| quote!(.with_display_name(#lit)));
    let entry = entry_tokens(shape, ident).map(|e| quote!(.with_entry(#e)));

    quote! {
        ::spindle_core::MethodInfo::new(#name)
            .with_visibility(#visibility)
            .with_receiver(#receiver)
            .with_signature(::spindle_core::Signature::new() #(#params)* .with_returns(#returns))
            #display_name
            #entry
    }
}

fn constructor_tokens(opts: &ClassOptions) -> TokenStream2 {
    if opts.no_constructor {
        return quote!();
    }
    let with = if opts.disposable {
        quote!(with_disposable_constructor)
    } else {
        quote!(with_constructor)
    };
    let body = match &opts.constructor {
        Some(path) => quote! {
            #path().map_err(::core::convert::Into::<::spindle_core::Fault>::into)
        },
        None => quote! {
            ::core::result::Result::Ok::<Self, ::spindle_core::Fault>(<Self as ::core::default::Default>::default())
        },
    };
    quote!(.#with(|| #body))
}

fn expand(attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let opts = parse_options(attr)?;
    let mut block: ItemImpl = syn::parse2(item)?;

    if let Some((_, path, _)) = &block.trait_ {
        return Err(syn::Error::new_spanned(path, "test_class must be applied to an inherent impl block"));
    }
    if !block.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&block.generics, "test classes cannot be generic"));
    }
    let self_ty = block.self_ty.clone();
    let Type::Path(type_path) = self_ty.as_ref() else {
        return Err(syn::Error::new_spanned(&self_ty, "test_class expects a named type"));
    };
    let Some(type_ident) = type_path.path.segments.last().map(|s| s.ident.clone()) else {
        return Err(syn::Error::new_spanned(&self_ty, "test_class expects a named type"));
    };

    let mut methods = Vec::new();
    for item in &mut block.items {
        if let ImplItem::Fn(func) = item {
            let shape = method_shape(func)?;
            methods.push(method_tokens(&shape, &func.sig.ident));
        }
    }

    let class_name = match &opts.name {
        Some(lit) => quote!(#lit),
        None => {
            let s = type_ident.to_string();
            quote!(#s)
        }
    };
    let namespace = match &opts.namespace {
        Some(lit) => quote!(#lit),
        None => quote!(::std::string::String::from(::core::module_path!()).replace("::", ".")),
    };
    let sealed = !opts.unsealed;
    let is_abstract = opts.is_abstract;
    let constructor = constructor_tokens(&opts);
    let static_init = opts.static_init.as_ref().map(|path| {
        quote! {
            .with_static_initializer(|| ::spindle_core::IntoTestResult::into_test_result(#path()))
        }
    });

    Ok(quote! {
        #block

        impl ::spindle_core::Reflect for #self_ty {
            fn type_info() -> ::spindle_core::TypeInfo {
                ::spindle_core::TypeInfo::class(#namespace, #class_name)
                    .with_sealed(#sealed)
                    .with_abstract(#is_abstract)
                    #constructor
                    #static_init
                    #(.with_method(#methods))*
            }
        }
    })
}
