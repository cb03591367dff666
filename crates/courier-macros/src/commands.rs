//! `#[commands]` expansion.
//!
//! The input impl is emitted unchanged apart from `#[command]` attributes,
//! followed by a `CommandSet` impl whose `register` declares one command per
//! eligible method.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Attribute, Expr, FnArg, ImplItem, ImplItemFn, ItemImpl, Lit, LitStr, Meta, ReturnType, Type,
    Visibility, ext::IdentExt, spanned::Spanned,
};

/// Options from `#[command(...)]`.
#[derive(Default)]
struct CommandAttrs {
    present: bool,
    admin: bool,
    raw: bool,
    skip: bool,
    rename: Option<LitStr>,
    description: Option<LitStr>,
}

/// A method that becomes a command.
struct CommandMethod {
    method: syn::Ident,
    identifier: String,
    is_async: bool,
    event: Type,
    args: Vec<Type>,
    attrs: CommandAttrs,
    doc: Option<String>,
}

pub fn expand(mut item: ItemImpl) -> syn::Result<TokenStream> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new(
            path.span(),
            "#[commands] must be placed on an inherent impl block",
        ));
    }

    let mut commands = Vec::new();
    let mut has_name = false;
    let mut has_description = false;

    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };

        let attrs = take_command_attrs(&mut method.attrs)?;
        if attrs.skip {
            continue;
        }

        if takes_only_self(method) {
            match method.sig.ident.to_string().as_str() {
                "name" => has_name = true,
                "description" => has_description = true,
                _ => {}
            }
            if attrs.present {
                return Err(syn::Error::new(
                    method.sig.span(),
                    "a command must take the triggering event as `&E` after `&self`",
                ));
            }
            continue;
        }

        match command_method(method, attrs)? {
            Some(command) => commands.push(command),
            None => continue,
        }
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    let self_name = has_name.then(|| {
        quote! {
            fn self_name(&self) -> ::std::option::Option<::std::string::String> {
                ::std::option::Option::Some(::std::string::ToString::to_string(&Self::name(self)))
            }
        }
    });
    let self_description = has_description.then(|| {
        quote! {
            fn self_description(&self) -> ::std::option::Option<::std::string::String> {
                ::std::option::Option::Some(::std::string::ToString::to_string(&Self::description(self)))
            }
        }
    });
    let registrations = commands.iter().map(registration);

    Ok(quote! {
        #item

        impl #impl_generics ::courier::CommandSet for #self_ty #where_clause {
            #self_name
            #self_description

            fn register(
                registrar: &mut ::courier::Registrar<'_, Self>,
            ) -> ::std::result::Result<(), ::courier::ConfigurationError> {
                #(#registrations)*
                ::std::result::Result::Ok(())
            }
        }
    })
}

/// Removes `#[command(...)]` attributes and returns their options.
fn take_command_attrs(attrs: &mut Vec<Attribute>) -> syn::Result<CommandAttrs> {
    let mut out = CommandAttrs::default();
    let mut error = None;

    attrs.retain(|attr| {
        if !attr.path().is_ident("command") {
            return true;
        }
        out.present = true;
        if matches!(attr.meta, Meta::Path(_)) {
            return false;
        }

        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("admin") {
                out.admin = true;
            } else if meta.path.is_ident("raw") {
                out.raw = true;
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else if meta.path.is_ident("rename") {
                out.rename = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("description") {
                out.description = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error(
                    "unknown command option; expected admin, raw, skip, rename or description",
                ));
            }
            Ok(())
        });
        if let Err(err) = parsed {
            error.get_or_insert(err);
        }
        false
    });

    match error {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

fn takes_only_self(method: &ImplItemFn) -> bool {
    let mut inputs = method.sig.inputs.iter();
    matches!(inputs.next(), Some(FnArg::Receiver(_))) && inputs.next().is_none()
}

/// Checks the shape of `method`.
///
/// Methods that do not look like commands are helpers and yield `None`,
/// unless they carry `#[command]`, which makes the mismatch an error.
fn command_method(method: &ImplItemFn, attrs: CommandAttrs) -> syn::Result<Option<CommandMethod>> {
    let strict = attrs.present;
    let reject = |span: proc_macro2::Span, message: &str| {
        if strict {
            Err(syn::Error::new(span, message))
        } else {
            Ok(None)
        }
    };

    let sig = &method.sig;
    if !matches!(method.vis, Visibility::Public(_)) {
        return reject(sig.ident.span(), "a command method must be `pub`");
    }
    match sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => return reject(sig.span(), "a command method must take `&self`"),
    }
    if !returns_result(&sig.output) {
        return reject(sig.output.span(), "a command method must return a `Result`");
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "command methods cannot be generic",
        ));
    }

    let mut params = sig.inputs.iter().filter_map(|arg| match arg {
        FnArg::Typed(pat) => Some(pat),
        FnArg::Receiver(_) => None,
    });

    let event = match params.next().map(|pat| &*pat.ty) {
        Some(Type::Reference(reference)) if reference.mutability.is_none() => {
            (*reference.elem).clone()
        }
        Some(other) => return reject(other.span(), "the first parameter must be `&E` for an event type `E`"),
        None => return reject(sig.span(), "a command method must take the triggering event"),
    };

    let mut args = Vec::new();
    for pat in params {
        if let Type::Reference(_) = &*pat.ty {
            return Err(syn::Error::new(
                pat.ty.span(),
                "command arguments are passed by value",
            ));
        }
        args.push((*pat.ty).clone());
    }

    let identifier = match &attrs.rename {
        Some(rename) => rename.value(),
        None => sig.ident.unraw().to_string(),
    };

    Ok(Some(CommandMethod {
        method: sig.ident.clone(),
        identifier,
        is_async: sig.asyncness.is_some(),
        event,
        args,
        doc: doc_text(&method.attrs),
        attrs,
    }))
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .is_some_and(|seg| seg.ident == "Result"),
            _ => false,
        },
        ReturnType::Default => false,
    }
}

/// Collects `///` lines into one description.
fn doc_text(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => Some(s.value().trim().to_owned()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .collect();

    let text = lines.join("\n").trim().to_owned();
    (!text.is_empty()).then_some(text)
}

fn registration(command: &CommandMethod) -> TokenStream {
    let CommandMethod {
        method,
        identifier,
        is_async,
        event,
        args,
        attrs,
        doc,
    } = command;

    let admin = attrs.admin.then(|| quote!(.admin()));
    let raw = attrs.raw.then(|| quote!(.raw()));
    let description = match (&attrs.description, doc) {
        (Some(lit), _) => Some(quote!(.description(#lit))),
        (None, Some(doc)) => Some(quote!(.description(#doc))),
        (None, None) => None,
    };

    let arg_names: Vec<_> = (0..args.len()).map(|i| format_ident!("__arg{}", i)).collect();
    let (args_param, rebind) = if args.is_empty() {
        (quote!(_), None)
    } else {
        (quote!(args), Some(quote!(let mut args = args;)))
    };
    let await_call = is_async.then(|| quote!(.await));
    let mismatch = format!("command `{identifier}` received an event of another type");

    quote! {
        registrar
            .command::<#event>(#identifier)
            #admin
            #raw
            #description
            #(.arg::<#args>())*
            .invoke(
                |this: ::std::sync::Arc<Self>,
                 event: ::courier::BoxedEvent,
                 #args_param: ::courier::Arguments|
                 -> ::courier::__private::BoxFuture<
                    'static,
                    ::std::result::Result<(), ::courier::BoxError>,
                > {
                    ::std::boxed::Box::pin(async move {
                        #rebind
                        let ::std::option::Option::Some(__event) = event.downcast_ref::<#event>() else {
                            return ::std::result::Result::Err(::courier::BoxError::from(#mismatch));
                        };
                        #(
                            let #arg_names = match args.take::<#args>() {
                                ::std::result::Result::Ok(value) => value,
                                ::std::result::Result::Err(err) => {
                                    return ::std::result::Result::Err(::courier::BoxError::from(err));
                                }
                            };
                        )*
                        let __result: ::std::result::Result<(), ::courier::BoxError> =
                            match this.#method(__event #(, #arg_names)*)#await_call {
                                ::std::result::Result::Ok(_) => ::std::result::Result::Ok(()),
                                ::std::result::Result::Err(err) => {
                                    ::std::result::Result::Err(::std::convert::Into::into(err))
                                }
                            };
                        __result
                    })
                },
            )?;
    }
}
