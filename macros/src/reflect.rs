//! `#[derive(Reflect)]` implementation
//!
//! Generates `Typed`, `Reflect` and the matching access trait
//! (`FieldAccess` for structs, `VariantAccess` for enums).
//!
//! # Usage
//!
//! ```ignore
//! #[derive(Reflect)]
//! #[reflect(display)]
//! pub struct Version {
//!     pub major: u32,
//!     #[tag(datahash = "-")]
//!     pub build_host: String,
//!     #[reflect(skip)]
//!     pub scratch: NotHashable,
//! }
//! ```

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    Attribute, Data, DeriveInput, Fields, GenericParam, Ident, Index, LitStr, Member, Result, Type,
    parse_quote,
};

// =============================================================================
// Attributes
// =============================================================================

/// Options from the container-level `#[reflect(...)]`.
#[derive(Default)]
struct ContainerArgs {
    hash_writer: bool,
    binary: bool,
    text: bool,
    json: bool,
    display: bool,
    opaque: bool,
}

impl ContainerArgs {
    fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut args = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("reflect")) {
            attr.parse_nested_meta(|meta| {
                let flag = if meta.path.is_ident("hash_writer") {
                    &mut args.hash_writer
                } else if meta.path.is_ident("binary") {
                    &mut args.binary
                } else if meta.path.is_ident("text") {
                    &mut args.text
                } else if meta.path.is_ident("json") {
                    &mut args.json
                } else if meta.path.is_ident("display") {
                    &mut args.display
                } else if meta.path.is_ident("opaque") {
                    &mut args.opaque
                } else {
                    return Err(meta.error(
                        "expected one of `hash_writer`, `binary`, `text`, `json`, `display`, `opaque`",
                    ));
                };
                *flag = true;
                Ok(())
            })?;
        }
        Ok(args)
    }

    fn capabilities(&self) -> TokenStream {
        let caps = [
            (self.hash_writer, quote!(HASH_WRITER)),
            (self.binary, quote!(BINARY)),
            (self.text, quote!(TEXT)),
            (self.json, quote!(JSON)),
            (self.display, quote!(DISPLAY)),
        ];
        let declared = caps
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| quote!(::tola_datahash::Capabilities::#name));
        quote!(::tola_datahash::Capabilities::NONE #(| #declared)*)
    }

    /// Capability hook overrides for the `Reflect` impl.
    fn hooks(&self) -> TokenStream {
        let mut hooks = TokenStream::new();
        if self.hash_writer {
            hooks.extend(quote! {
                fn hash_writer(&self) -> ::std::option::Option<&dyn ::tola_datahash::HashWriter> {
                    ::std::option::Option::Some(self as &dyn ::tola_datahash::HashWriter)
                }
            });
        }
        if self.binary {
            hooks.extend(quote! {
                fn binary_delegate(&self) -> ::std::option::Option<::tola_datahash::DelegateResult> {
                    ::std::option::Option::Some(::tola_datahash::MarshalBinary::marshal_binary(self))
                }
            });
        }
        if self.text {
            hooks.extend(quote! {
                fn text_delegate(&self) -> ::std::option::Option<::tola_datahash::DelegateResult> {
                    ::std::option::Option::Some(::tola_datahash::MarshalText::marshal_text(self))
                }
            });
        }
        if self.json {
            hooks.extend(quote! {
                fn json_delegate(&self) -> ::std::option::Option<::tola_datahash::DelegateResult> {
                    ::std::option::Option::Some(
                        ::tola_datahash::__private::serde_json::to_vec(self)
                            .map_err(::std::convert::Into::into),
                    )
                }
            });
        }
        if self.display {
            hooks.extend(quote! {
                fn display_delegate(&self) -> ::std::option::Option<::std::string::String> {
                    ::std::option::Option::Some(::std::string::ToString::to_string(self))
                }
            });
        }
        hooks
    }
}

/// A field that takes part in hashing.
struct FieldDef {
    /// Position among all declared fields
    index: usize,
    member: Member,
    name: String,
    ty: Type,
    tags: Vec<(String, String)>,
}

impl FieldDef {
    /// Collect fields, dropping those marked `#[reflect(skip)]`.
    fn collect(fields: &Fields) -> Result<Vec<Self>> {
        let mut out = Vec::new();
        for (index, field) in fields.iter().enumerate() {
            if is_skipped(&field.attrs)? {
                continue;
            }
            let (member, name) = match &field.ident {
                Some(ident) => (Member::Named(ident.clone()), ident.unraw().to_string()),
                None => (Member::Unnamed(Index::from(index)), index.to_string()),
            };
            out.push(Self {
                index,
                member,
                name,
                ty: field.ty.clone(),
                tags: parse_tags(&field.attrs)?,
            });
        }
        Ok(out)
    }

    fn info(&self) -> TokenStream {
        let Self {
            index, name, ty, tags, ..
        } = self;
        let keys = tags.iter().map(|(k, _)| k);
        let values = tags.iter().map(|(_, v)| v);
        quote! {
            ::tola_datahash::FieldInfo::new(
                #name,
                #index,
                <#ty as ::tola_datahash::Typed>::type_info,
            )
            .with_tags(&[#((#keys, #values)),*])
        }
    }
}

fn is_skipped(attrs: &[Attribute]) -> Result<bool> {
    let mut skip = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("reflect")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

/// `#[tag(key = "value", ...)]`
fn parse_tags(attrs: &[Attribute]) -> Result<Vec<(String, String)>> {
    let mut tags = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("tag")) {
        attr.parse_nested_meta(|meta| {
            let key = meta
                .path
                .get_ident()
                .ok_or_else(|| meta.error("expected a tag key"))?
                .unraw()
                .to_string();
            let value: LitStr = meta.value()?.parse()?;
            tags.push((key, value.value()));
            Ok(())
        })?;
    }
    Ok(tags)
}

// =============================================================================
// Expansion
// =============================================================================

pub fn expand(mut input: DeriveInput) -> Result<TokenStream> {
    let args = ContainerArgs::parse(&input.attrs)?;

    for param in &mut input.generics.params {
        if let GenericParam::Type(ty) = param {
            ty.bounds.push(parse_quote!(::tola_datahash::Typed));
            ty.bounds.push(parse_quote!(::tola_datahash::Reflect));
        }
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let capabilities = args.capabilities();
    let hooks = args.hooks();

    let body = if args.opaque {
        Body::opaque()
    } else {
        match &input.data {
            Data::Struct(data) => Body::structure(&data.fields)?,
            Data::Enum(data) => Body::enumeration(data)?,
            Data::Union(_) => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "unions cannot derive Reflect; use #[reflect(opaque, ...)] with a capability",
                ));
            }
        }
    };

    let Body {
        kind,
        view,
        is_zero,
        access,
    } = body;

    let access = access.map(|(trait_name, items)| {
        quote! {
            impl #impl_generics ::tola_datahash::#trait_name for #name #ty_generics #where_clause {
                #items
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::tola_datahash::Typed for #name #ty_generics #where_clause {
            fn type_info() -> ::tola_datahash::TypeInfo {
                ::tola_datahash::TypeInfo::of::<Self>(#kind).with_capabilities(#capabilities)
            }
        }

        impl #impl_generics ::tola_datahash::Reflect for #name #ty_generics #where_clause {
            fn value_type(&self) -> ::tola_datahash::TypeInfo {
                <Self as ::tola_datahash::Typed>::type_info()
            }

            fn reflect_ref(&self) -> ::tola_datahash::ReflectRef<'_> {
                #view
            }

            fn is_zero(&self) -> bool {
                #is_zero
            }

            #hooks
        }

        #access
    })
}

/// Generated pieces that differ between structs, enums and opaque types.
struct Body {
    kind: TokenStream,
    view: TokenStream,
    is_zero: TokenStream,
    access: Option<(Ident, TokenStream)>,
}

impl Body {
    fn opaque() -> Self {
        Self {
            kind: quote!(::tola_datahash::TypeKind::Opaque),
            view: quote!(::tola_datahash::ReflectRef::Opaque),
            is_zero: quote!(false),
            access: None,
        }
    }

    fn structure(fields: &Fields) -> Result<Self> {
        let fields = FieldDef::collect(fields)?;
        let infos = fields.iter().map(FieldDef::info);
        let members: Vec<_> = fields.iter().map(|f| &f.member).collect();
        let indices = fields.iter().map(|f| f.index);

        Ok(Self {
            kind: quote! {
                ::tola_datahash::TypeKind::Struct {
                    fields: ::std::vec![#(#infos),*],
                }
            },
            view: quote!(::tola_datahash::ReflectRef::Fields(self)),
            is_zero: quote!(true #(&& ::tola_datahash::Reflect::is_zero(&self.#members))*),
            access: Some((
                Ident::new("FieldAccess", Span::call_site()),
                quote! {
                    fn field(&self, index: usize) -> ::std::option::Option<&dyn ::tola_datahash::Reflect> {
                        match index {
                            #(#indices => ::std::option::Option::Some(&self.#members as &dyn ::tola_datahash::Reflect),)*
                            _ => ::std::option::Option::None,
                        }
                    }
                },
            )),
        })
    }

    fn enumeration(data: &syn::DataEnum) -> Result<Self> {
        let mut infos = Vec::new();
        let mut index_arms = Vec::new();
        let mut field_arms = Vec::new();

        for (position, variant) in data.variants.iter().enumerate() {
            let ident = &variant.ident;
            let name = ident.unraw().to_string();
            let fields = FieldDef::collect(&variant.fields)?;

            let field_infos = fields.iter().map(FieldDef::info);
            infos.push(quote! {
                ::tola_datahash::VariantInfo::new(#name, ::std::vec![#(#field_infos),*])
            });
            index_arms.push(quote!(Self::#ident { .. } => #position,));

            let bindings: Vec<_> = fields.iter().map(|f| format_ident!("__field{}", f.index)).collect();
            let members = fields.iter().map(|f| &f.member);
            let indices = fields.iter().map(|f| f.index);
            field_arms.push(quote! {
                Self::#ident { #(#members: #bindings,)* .. } => match index {
                    #(#indices => ::std::option::Option::Some(#bindings as &dyn ::tola_datahash::Reflect),)*
                    _ => ::std::option::Option::None,
                },
            });
        }

        let (index_body, field_body) = if data.variants.is_empty() {
            (quote!(match *self {}), quote!(match *self {}))
        } else {
            (
                quote!(match self { #(#index_arms)* }),
                quote!(match self { #(#field_arms)* }),
            )
        };

        Ok(Self {
            kind: quote! {
                ::tola_datahash::TypeKind::Enum {
                    variants: ::std::vec![#(#infos),*],
                }
            },
            view: quote!(::tola_datahash::ReflectRef::Variant(self)),
            is_zero: quote!(false),
            access: Some((
                Ident::new("VariantAccess", Span::call_site()),
                quote! {
                    fn variant_index(&self) -> usize {
                        #index_body
                    }

                    fn variant_field(&self, index: usize) -> ::std::option::Option<&dyn ::tola_datahash::Reflect> {
                        #field_body
                    }
                },
            )),
        })
    }
}
