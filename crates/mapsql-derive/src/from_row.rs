//! FromRow derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::{Data, DeriveInput, Fields, LitStr, Result};

struct FieldAttrs {
    column: Option<String>,
    skip: bool,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "FromRow can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "FromRow can only be derived for structs",
            ));
        }
    };

    let mut columns = Vec::new();
    let mut seen = HashSet::new();
    let mut field_extracts = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let attrs = parse_field_attrs(field)?;

        if attrs.skip {
            field_extracts.push(quote! {
                #field_name: ::core::default::Default::default()
            });
            continue;
        }

        let column_name = attrs.column.unwrap_or_else(|| field_name.to_string());
        if !seen.insert(column_name.clone()) {
            return Err(syn::Error::new_spanned(
                field,
                format!("column \"{column_name}\" is mapped by more than one field"),
            ));
        }

        field_extracts.push(quote! {
            #field_name: row.try_get(#column_name)?
        });
        columns.push(column_name);
    }

    Ok(quote! {
        impl #impl_generics ::mapsql::FromRow for #name #ty_generics #where_clause {
            const COLUMNS: &'static [&'static str] = &[#(#columns),*];

            fn from_row(row: &::mapsql::Row) -> ::mapsql::SqlResult<Self> {
                Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}

fn parse_field_attrs(field: &syn::Field) -> Result<FieldAttrs> {
    let mut attrs = FieldAttrs {
        column: None,
        skip: false,
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.column = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported orm attribute, expected `column = \"...\"` or `skip`"))
            }
        })?;
    }

    if attrs.skip && attrs.column.is_some() {
        return Err(syn::Error::new_spanned(
            field,
            "`skip` and `column` cannot be combined",
        ));
    }

    Ok(attrs)
}
