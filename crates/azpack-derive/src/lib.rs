//! Derive macros for `azpack`.
//!
//! - `#[derive(Record)]` lists a struct's bindable fields and generates path
//!   accessors for them.
//! - `#[derive(Marshal)]` / `#[derive(Unmarshal)]` delegate a single-field
//!   wrapper to its inner value.
//!
//! Field attributes for `Record`:
//!
//! ```text
//! #[binding("name")]          explicit binding name
//! #[binding(name = "name")]   same
//! #[binding(flatten)]         promote the fields of an embedded record
//! #[binding(skip)]            never bind ("-" as the name does the same)
//! #[binding(omit_empty)]      empty output values count as absent
//! #[binding(string)]          emit scalar outputs as wire strings
//! ```
//!
//! Only `pub` leaf fields are bindable. Embedded records are walked regardless of
//! visibility, so their `pub` fields are promoted.

use heck::ToUpperCamelCase;
use proc_macro::TokenStream;
use proc_macro2::Literal;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::Data;
use syn::DeriveInput;
use syn::Fields;
use syn::Ident;
use syn::LitStr;
use syn::Token;
use syn::Visibility;
use syn::ext::IdentExt;
use syn::parse::Parse;
use syn::parse::ParseStream;
use syn::parse_macro_input;
use syn::punctuated::Punctuated;

#[proc_macro_derive(Record, attributes(binding))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_record(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(Marshal)]
pub fn derive_marshal(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_marshal(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(Unmarshal)]
pub fn derive_unmarshal(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_unmarshal(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

// --- Attributes ---

enum BindingArg {
    Name(LitStr),
    Flag(Ident),
}

impl Parse for BindingArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(LitStr) {
            return Ok(BindingArg::Name(input.parse()?));
        }
        let ident: Ident = input.parse()?;
        if ident == "name" {
            input.parse::<Token![=]>()?;
            return Ok(BindingArg::Name(input.parse()?));
        }
        Ok(BindingArg::Flag(ident))
    }
}

#[derive(Default)]
struct FieldAttrs {
    tag: Option<String>,
    skip: bool,
    flatten: bool,
    omit_empty: bool,
    as_string: bool,
}

impl FieldAttrs {
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut out = FieldAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("binding")) {
            let args = attr.parse_args_with(Punctuated::<BindingArg, Token![,]>::parse_terminated)?;
            for arg in args {
                match arg {
                    BindingArg::Name(lit) if lit.value() == "-" => out.skip = true,
                    BindingArg::Name(lit) if lit.value().is_empty() => {
                        return Err(syn::Error::new_spanned(lit, "binding name must not be empty"));
                    }
                    BindingArg::Name(lit) => out.tag = Some(lit.value()),
                    BindingArg::Flag(flag) if flag == "skip" => out.skip = true,
                    BindingArg::Flag(flag) if flag == "flatten" => out.flatten = true,
                    BindingArg::Flag(flag) if flag == "omit_empty" => out.omit_empty = true,
                    BindingArg::Flag(flag) if flag == "string" => out.as_string = true,
                    BindingArg::Flag(flag) => {
                        return Err(syn::Error::new_spanned(flag, "unknown binding attribute"));
                    }
                }
            }
        }
        Ok(out)
    }
}

// --- Record ---

fn expand_record(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(&input.ident, "Record can only be derived for structs"));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(&input.ident, "Record requires named fields"));
    };

    let mut decls = Vec::new();
    let mut reads = Vec::new();
    let mut writes = Vec::new();

    for field in &named.named {
        let attrs = FieldAttrs::parse(&field.attrs)?;
        let Some(ident) = &field.ident else { continue };
        if attrs.skip {
            continue;
        }

        let embedded = attrs.flatten && attrs.tag.is_none();
        let exported = matches!(field.vis, Visibility::Public(_));
        if !exported && !embedded {
            continue;
        }

        let name = ident.unraw().to_string().to_upper_camel_case();
        let ty = &field.ty;
        let index = Literal::usize_unsuffixed(decls.len());

        if embedded {
            decls.push(quote! { ::azpack::FieldDecl::embedded::<#ty>(#name) });
            reads.push(quote! {
                [#index, rest @ ..] => ::azpack::Record::slot(&self.#ident, rest),
            });
            writes.push(quote! {
                [#index, rest @ ..] => ::azpack::Record::slot_mut(&mut self.#ident, rest),
            });
        } else {
            let tag = match &attrs.tag {
                Some(tag) => quote! { ::core::option::Option::Some(#tag) },
                None => quote! { ::core::option::Option::None },
            };
            let omit_empty = attrs.omit_empty;
            let as_string = attrs.as_string;
            decls.push(quote! {
                ::azpack::FieldDecl::leaf::<#ty>(
                    #name,
                    #tag,
                    ::azpack::Hints { omit_empty: #omit_empty, as_string: #as_string },
                )
            });
            reads.push(quote! {
                [#index] => ::core::option::Option::Some(&self.#ident as &dyn ::azpack::Slot),
            });
            writes.push(quote! {
                [#index] => ::core::option::Option::Some(&mut self.#ident as &mut dyn ::azpack::Slot),
            });
        }
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::azpack::Record for #ident #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<::azpack::FieldDecl> {
                ::std::vec![#(#decls),*]
            }

            #[allow(unused_variables)]
            fn slot(&self, path: &[usize]) -> ::core::option::Option<&dyn ::azpack::Slot> {
                match path {
                    #(#reads)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn slot_mut(&mut self, path: &[usize]) -> ::core::option::Option<&mut dyn ::azpack::Slot> {
                match path {
                    #(#writes)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

// --- Newtype delegation ---

fn inner_member(input: &DeriveInput, derive: &str) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            format!("{} can only be derived for single-field structs", derive),
        ));
    };
    let mut fields = data.fields.iter();
    match (fields.next(), fields.next()) {
        (Some(field), None) => Ok(match &field.ident {
            Some(ident) => quote! { #ident },
            None => {
                let zero = syn::Index::from(0);
                quote! { #zero }
            }
        }),
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            format!("{} can only be derived for single-field structs", derive),
        )),
    }
}

fn expand_marshal(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let member = inner_member(input, "Marshal")?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::azpack::Marshal for #ident #ty_generics #where_clause {
            fn marshal(&self) -> ::azpack::Result<::core::option::Option<::azpack::TypedData>> {
                ::azpack::Marshal::marshal(&self.#member)
            }
        }
    })
}

fn expand_unmarshal(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let member = inner_member(input, "Unmarshal")?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::azpack::Unmarshal for #ident #ty_generics #where_clause {
            fn unmarshal(&mut self, data: &::azpack::TypedData) -> ::azpack::Result<()> {
                ::azpack::Unmarshal::unmarshal(&mut self.#member, data)
            }
        }
    })
}
