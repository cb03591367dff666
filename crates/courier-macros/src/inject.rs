use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, FieldsNamed, Ident, Type, spanned::Spanned};

pub fn derive_inject(input: &DeriveInput) -> syn::Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields,
            Fields::Unnamed(_) | Fields::Unit => {
                return Err(syn::Error::new(
                    input.span(),
                    "Inject can only be derived for structs with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Inject can only be derived for structs",
            ));
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Inject cannot be derived for unions",
            ));
        }
    };

    let name = &input.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match slot_field(fields) {
        Some(field) => quote! {
            self.#field.set(ctx);
            true
        },
        None => quote! {
            let _ = ctx;
            false
        },
    };

    Ok(quote! {
        impl #impl_generics ::courier::Inject for #name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            fn inject_context(
                &mut self,
                ctx: &::std::sync::Arc<::courier::Context>,
            ) -> bool {
                #body
            }
        }
    })
}

/// Finds the first field of type `ContextSlot`.
fn slot_field(fields: &FieldsNamed) -> Option<Ident> {
    fields
        .named
        .iter()
        .find(|field| is_context_slot(&field.ty))
        .and_then(|field| field.ident.clone())
}

fn is_context_slot(ty: &Type) -> bool {
    match ty {
        Type::Path(path) if path.qself.is_none() => path
            .path
            .segments
            .last()
            .is_some_and(|seg| seg.ident == "ContextSlot" && seg.arguments.is_empty()),
        _ => false,
    }
}
