//! Derive macros wiring docrepo repositories to their connector.
//!
//! - `#[derive(Context)]` makes each field of a root struct extractable.
//! - `#[derive(FromContext)]` builds a struct by extracting every field from
//!   a root struct.
//!
//! Generated code refers to `crate::FromRef`, so the consuming crate must
//! export that trait at its root.

use proc_macro::TokenStream;
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{Data, DeriveInput, Field, Fields};

mod context;
mod from_context;

/// Derive macro for a dependency root.
///
/// Generates `impl FromRef<Root> for FieldType` for every field, cloning the
/// field out of the root. Field types must therefore be distinct and `Clone`.
///
/// # Example
///
/// ```ignore
/// #[derive(Context, Clone)]
/// pub struct Connector {
///     pub store: SharedStore,
///     pub blobs: SharedBlobStore,
///     pub settings: Arc<ConnectionSettings>,
/// }
///
/// // impl FromRef<Connector> for SharedStore { ... }
/// // impl FromRef<Connector> for SharedBlobStore { ... }
/// // impl FromRef<Connector> for Arc<ConnectionSettings> { ... }
/// ```
#[proc_macro_derive(Context)]
pub fn derive_context(input: TokenStream) -> TokenStream {
    context::derive_context_impl(input)
}

/// Derive macro for a struct resolved from a dependency root.
///
/// Generates `impl FromRef<Root> for Self`, resolving each field with
/// `<FieldType as FromRef<Root>>::from_ref`. The root type is named with
/// `#[from_context(Context = "Root")]` and defaults to `Context`.
///
/// # Example
///
/// ```ignore
/// #[derive(FromContext, Clone)]
/// #[from_context(Context = "Connector")]
/// pub struct Backends {
///     pub store: SharedStore,
///     pub blobs: SharedBlobStore,
/// }
/// ```
#[proc_macro_derive(FromContext, attributes(from_context))]
pub fn derive_from_context(input: TokenStream) -> TokenStream {
    from_context::derive_from_context_impl(input)
}

/// Named fields of a struct, or a spanned error naming the derive.
pub(crate) fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> syn::Result<&'a Punctuated<Field, Comma>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(&fields.named),
            _ => Err(syn::Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            input,
            format!("{derive} can only be derived for structs"),
        )),
    }
}
