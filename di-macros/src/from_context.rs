//! `#[derive(FromContext)]`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, LitStr, Type};

use crate::named_fields;

pub fn derive_from_context_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let root = root_type(input)?;
    let fields = named_fields(input, "FromContext")?;

    let inits = fields.iter().filter_map(|field| {
        let ident = field.ident.as_ref()?;
        let ty = &field.ty;
        Some(quote! {
            #ident: <#ty as crate::FromRef<#root>>::from_ref(root)
        })
    });

    Ok(quote! {
        impl #impl_generics crate::FromRef<#root> for #name #ty_generics #where_clause {
            fn from_ref(root: &#root) -> Self {
                Self {
                    #(#inits),*
                }
            }
        }
    })
}

/// Reads `#[from_context(Context = "Root")]`, defaulting to `Context`.
fn root_type(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let mut root: Option<Type> = None;

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("from_context")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("Context") {
                let value: LitStr = meta.value()?.parse()?;
                root = Some(value.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `Context = \"Type\"`"))
            }
        })?;
    }

    Ok(match root {
        Some(ty) => quote! { #ty },
        None => quote! { Context },
    })
}
