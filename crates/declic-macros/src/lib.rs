use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, ExprLit, ExprPath, Fields, Lit, LitStr, Member, Meta,
    Result, Type, Visibility, parse_macro_input, spanned::Spanned,
};

/// Derive `declic::Flags` for a struct with named fields.
///
/// Every `pub` field becomes a flag unless marked `#[flag(skip)]`:
///
/// ```ignore
/// #[derive(Default, declic::Flags)]
/// pub struct CreateFlags {
///     #[flag(flatten)]
///     pub common: CommonFlags,
///     /// Team slug.
///     #[flag(short = "t", usage = "Team to create the resource in, |team|.")]
///     pub team: String,
///     #[flag(name = "dry-run")]
///     pub dry_run: bool,
/// }
/// ```
///
/// - `name`: defaults to the lower-cased field identifier
/// - `short`: single character, checked when the flags are registered
/// - `usage`: defaults to the doc comment, then to the field identifier
/// - `flatten`: recurse into a nested struct that also derives `Flags`
#[proc_macro_derive(Flags, attributes(flag))]
pub fn derive_flags(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_flags(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldAttrs {
    name: Option<String>,
    short: Option<String>,
    usage: Option<String>,
    flatten: bool,
    skip: bool,
}

fn expand_flags(input: DeriveInput) -> Result<proc_macro2::TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "#[derive(Flags)] requires a struct with named fields",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new(
            data.fields.span(),
            "#[derive(Flags)] requires a struct with named fields",
        ));
    };

    let mut visits = Vec::new();
    let mut completes = Vec::new();

    for field in &fields.named {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip || matches!(field.vis, Visibility::Inherited) {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };

        if attrs.flatten {
            if attrs.name.is_some() || attrs.short.is_some() || attrs.usage.is_some() {
                return Err(syn::Error::new(
                    field.span(),
                    "#[flag(flatten)] cannot be combined with name, short or usage",
                ));
            }
            visits.push(quote! {
                ::declic::Flags::visit_flags(&mut self.#ident, visitor);
            });
            completes.push(quote! {
                if let ::core::option::Option::Some(found) =
                    ::declic::Flags::complete_flag(&self.#ident, flag, request, root)
                {
                    return ::core::option::Option::Some(found);
                }
            });
            continue;
        }

        let field_name = ident.to_string();
        let field_name = field_name.trim_start_matches("r#");
        let name = attrs.name.unwrap_or_else(|| field_name.to_lowercase());
        let usage = attrs
            .usage
            .or_else(|| doc_comment(&field.attrs))
            .unwrap_or_else(|| field_name.to_string());
        let short = attrs.short.unwrap_or_default();

        let name = LitStr::new(&name, ident.span());
        let short = LitStr::new(&short, ident.span());
        let usage = LitStr::new(&usage, ident.span());

        visits.push(quote! {
            visitor.visit(::declic::FlagField {
                name: #name,
                short: #short,
                usage: #usage,
                value: &mut self.#ident,
            });
        });
        completes.push(quote! {
            if flag == #name {
                return ::declic::FlagValue::complete(&self.#ident, request, root);
            }
        });
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::declic::Flags for #ident #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn visit_flags(&mut self, visitor: &mut dyn ::declic::FlagVisitor) {
                #(#visits)*
            }

            #[allow(unused_variables)]
            fn complete_flag(
                &self,
                flag: &str,
                request: &::declic::CompletionRequest<'_>,
                root: &dyn ::core::any::Any,
            ) -> ::core::option::Option<::declic::Completion> {
                #(#completes)*
                ::core::option::Option::None
            }
        }
    })
}

/// Derive `declic::FlagValue` for a single-field wrapper, delegating to the
/// wrapped type.
///
/// ```ignore
/// #[derive(Debug, Default, declic::FlagValue)]
/// #[flag_value(complete = complete_team)]
/// pub struct Team(String);
///
/// #[derive(Debug, Default, declic::FlagValue)]
/// #[flag_value(extensions = "yaml,yml")]
/// pub struct Manifest(String);
/// ```
///
/// A wrapper over `String` also gets `declic::FlagString`, so `Vec<Team>`
/// is a list flag.
///
/// - `complete`: path to a `fn(&CompletionRequest<'_>, &dyn Any) -> Option<Completion>`
/// - `extensions`: comma-separated file extensions to complete
#[proc_macro_derive(FlagValue, attributes(flag_value))]
pub fn derive_flag_value(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_flag_value(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct ValueAttrs {
    complete: Option<ExprPath>,
    extensions: Option<Vec<String>>,
}

fn expand_flag_value(input: DeriveInput) -> Result<proc_macro2::TokenStream> {
    const SHAPE: &str = "#[derive(FlagValue)] requires a struct with exactly one field";
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(input.ident.span(), SHAPE));
    };
    let mut fields = data.fields.iter();
    let (Some(field), None) = (fields.next(), fields.next()) else {
        return Err(syn::Error::new(data.fields.span(), SHAPE));
    };
    let member = match &field.ident {
        Some(ident) => Member::Named(ident.clone()),
        None => Member::Unnamed(0.into()),
    };
    let inner = &field.ty;

    let attrs = parse_value_attrs(&input.attrs)?;
    let extensions = match attrs.extensions {
        Some(list) => {
            let list = list.iter().map(|e| LitStr::new(e, input.ident.span()));
            quote! {
                ::core::option::Option::Some(::std::vec![#(::std::string::String::from(#list)),*])
            }
        }
        None => quote! { ::declic::FlagValue::file_extensions(&self.#member) },
    };
    let complete = match attrs.complete {
        Some(path) => quote! { #path(request, flags) },
        None => quote! { ::declic::FlagValue::complete(&self.#member, request, flags) },
    };

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let flag_string = is_string(inner).then(|| {
        let build = match &field.ident {
            Some(name) => quote! { Self { #name: value } },
            None => quote! { Self(value) },
        };
        quote! {
            impl #impl_generics ::declic::FlagString for #ident #ty_generics #where_clause {
                fn from_flag(value: ::std::string::String) -> Self {
                    #build
                }

                fn flag_str(&self) -> &str {
                    &self.#member
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::declic::FlagValue for #ident #ty_generics #where_clause {
            fn slot(&mut self) -> ::declic::FlagSlot<'_> {
                ::declic::FlagValue::slot(&mut self.#member)
            }

            fn file_extensions(&self) -> ::core::option::Option<::std::vec::Vec<::std::string::String>> {
                #extensions
            }

            fn complete(
                &self,
                request: &::declic::CompletionRequest<'_>,
                flags: &dyn ::core::any::Any,
            ) -> ::core::option::Option<::declic::Completion> {
                #complete
            }
        }

        #flag_string
    })
}

fn is_string(ty: &Type) -> bool {
    match ty {
        Type::Path(path) if path.qself.is_none() => path
            .path
            .segments
            .last()
            .is_some_and(|seg| seg.ident == "String" && seg.arguments.is_none()),
        _ => false,
    }
}

fn parse_value_attrs(attrs: &[Attribute]) -> Result<ValueAttrs> {
    let mut out = ValueAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("flag_value") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("complete") {
                out.complete = Some(meta.value()?.parse::<ExprPath>()?);
            } else if meta.path.is_ident("extensions") {
                let list = meta.value()?.parse::<LitStr>()?.value();
                let list: Vec<String> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(|e| e.trim_start_matches('.').to_string())
                    .collect();
                if list.is_empty() {
                    return Err(meta.error("extensions cannot be empty"));
                }
                out.extensions = Some(list);
            } else {
                return Err(meta.error("unsupported flag_value attribute (expected complete or extensions)"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("flag") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                out.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("short") {
                out.short = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("usage") {
                out.usage = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("flatten") {
                out.flatten = true;
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else {
                return Err(meta.error("unsupported flag attribute (expected name, short, usage, flatten or skip)"));
            }
            Ok(())
        })?;
    }

    if let Some(name) = &out.name {
        if name.trim().is_empty() {
            return Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                "flag name cannot be empty",
            ));
        }
    }
    Ok(out)
}

fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}
