use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, GenericArgument, LitStr, PathArguments,
    Token, Type, meta::ParseNestedMeta,
};

pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    expand(&input).unwrap_or_else(Error::into_compile_error)
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                ident,
                "Entity can only be derived for structs with named fields",
            ));
        }
    };

    let collection = collection_name(input)?;

    if !fields
        .iter()
        .any(|field| field.ident.as_ref().is_some_and(|name| name == "id"))
    {
        return Err(Error::new_spanned(
            ident,
            "Entity requires an `id: Option<DocumentId>` field",
        ));
    }

    let rename_all = serde_rename_all(&input.attrs)?;
    let mut references = Vec::new();

    for field in fields {
        if is_reference(field)? {
            references.push(stored_name(field, rename_all.as_deref())?);
        }
    }

    Ok(quote! {
        impl #impl_generics ::docgate::document::Entity for #ident #ty_generics #where_clause {
            fn collection_name() -> &'static str {
                #collection
            }

            fn id(&self) -> ::std::option::Option<&::docgate::document::DocumentId> {
                self.id.as_ref()
            }

            fn reference_fields() -> &'static [&'static str] {
                &[#(#references),*]
            }
        }
    })
}

fn collection_name(input: &DeriveInput) -> syn::Result<LitStr> {
    let mut collection = None;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                collection = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `collection = \"...\"`"))
            }
        })?;
    }

    match collection {
        Some(name) if name.value().is_empty() || name.value().contains('/') => Err(Error::new_spanned(
            name,
            "collection name must be non-empty and contain no `/`",
        )),
        Some(name) => Ok(name),
        None => Err(Error::new_spanned(
            &input.ident,
            "missing #[entity(collection = \"...\")]",
        )),
    }
}

fn is_reference(field: &Field) -> syn::Result<bool> {
    let mut marked = false;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("reference") {
                marked = true;
                Ok(())
            } else {
                Err(meta.error("unsupported entity field attribute, expected `reference`"))
            }
        })?;
    }

    // A hydrated reference is a map, which a plain DocumentRef cannot hold.
    if marked && is_document_ref(&field.ty) {
        return Err(Error::new_spanned(
            &field.ty,
            "#[entity(reference)] field cannot be a DocumentRef, use Link<T> to receive the referenced entity",
        ));
    }

    Ok(marked || is_link(&field.ty))
}

// Link<T> or Option<Link<T>>
fn is_link(ty: &Type) -> bool {
    names_type(ty, "Link")
}

// DocumentRef or Option<DocumentRef>
fn is_document_ref(ty: &Type) -> bool {
    names_type(ty, "DocumentRef")
}

fn names_type(ty: &Type, name: &str) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    let Some(last) = path.path.segments.last() else {
        return false;
    };

    if last.ident == name {
        return true;
    }

    if last.ident != "Option" {
        return false;
    }

    match &last.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(GenericArgument::Type(inner)) => names_type(inner, name),
            _ => false,
        },
        _ => false,
    }
}

/// Consumes an attribute entry this macro does not care about.
fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let _content;
        syn::parenthesized!(_content in meta.input);
    }

    Ok(())
}

fn serde_rename_all(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename_all = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                rename_all = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                skip_meta(&meta)
            }
        })?;
    }

    Ok(rename_all)
}

fn stored_name(field: &Field, rename_all: Option<&str>) -> syn::Result<String> {
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        let mut rename = None;

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                rename = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                skip_meta(&meta)
            }
        })?;

        if let Some(rename) = rename {
            return Ok(rename);
        }
    }

    let name = field
        .ident
        .as_ref()
        .map(|ident| ident.to_string().trim_start_matches("r#").to_string())
        .ok_or_else(|| Error::new_spanned(field, "expected a named field"))?;

    match rename_all {
        Some(rule) => apply_rename_rule(&name, rule)
            .ok_or_else(|| Error::new_spanned(field, format!("unsupported rename_all rule `{rule}`"))),
        None => Ok(name),
    }
}

fn apply_rename_rule(name: &str, rule: &str) -> Option<String> {
    let words = name.split('_').filter(|word| !word.is_empty());
    let capitalize = |word: &str| {
        let mut chars = word.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect::<String>())
            .unwrap_or_default()
    };

    Some(match rule {
        "lowercase" | "snake_case" => name.to_lowercase(),
        "UPPERCASE" | "SCREAMING_SNAKE_CASE" => name.to_uppercase(),
        "kebab-case" => name.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => name.to_uppercase().replace('_', "-"),
        "PascalCase" => words.map(capitalize).collect(),
        "camelCase" => words
            .enumerate()
            .map(|(index, word)| if index == 0 { word.to_string() } else { capitalize(word) })
            .collect(),
        _ => return None,
    })
}
