// #[derive(Class)] implementation
//
// Generates the field accessor table used by the class projector.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

use crate::attrs::{container_attrs, named_fields};

/// Expands the Class derive.
///
/// Each non-skipped field becomes a `FieldAccessor` holding a getter that
/// encodes the field and a setter that decodes into it in place. The bare
/// struct gets the `Struct` kind, so it can only be projected through
/// `Object<T>`.
pub fn expand_class(input: DeriveInput) -> Result<TokenStream> {
    let container = container_attrs(&input.attrs)?;
    if container.standalone {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "`standalone` applies to TableMapping, classes are always standalone",
        ));
    }
    let fields = named_fields(&input, "Class")?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let raw_tags = fields.iter().map(|f| {
        let name = f.name();
        let raw = &f.raw_tag;
        quote! { (#name, #raw) }
    });

    let accessors = fields.iter().filter(|f| !f.skip).map(|f| {
        let field = &f.ident;
        let name = f.name();
        quote! {
            ::tether_engine::FieldAccessor {
                field: #name,
                get: |this, en| en.encode(&this.#field),
                set: |this, de, value| de.decode_into(value, &mut this.#field),
            }
        }
    });

    let methods = container.methods.map(|path| {
        quote! {
            fn methods() -> ::tether_engine::Methods<Self> {
                #path()
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::tether_engine::HostType for #ident #ty_generics #where_clause {
            const KIND: ::tether_engine::Kind = ::tether_engine::Kind::Struct;
        }

        impl #impl_generics ::tether_engine::Encode for #ident #ty_generics #where_clause {
            fn encode(
                &self,
                en: &mut ::tether_engine::Encoder<'_>,
            ) -> ::std::result::Result<::tether_engine::vm::Value, ::tether_engine::ConversionError> {
                Err(en.reject::<Self>())
            }
        }

        impl #impl_generics ::tether_engine::Decode for #ident #ty_generics #where_clause {
            fn decode(
                de: &mut ::tether_engine::Decoder<'_>,
                _src: &::tether_engine::vm::Value,
            ) -> ::std::result::Result<Self, ::tether_engine::ConversionError> {
                Err(de.reject::<Self>())
            }
        }

        impl #impl_generics ::tether_engine::Class for #ident #ty_generics #where_clause {
            fn raw_tags() -> &'static [(&'static str, &'static str)] {
                &[#(#raw_tags),*]
            }

            fn fields() -> ::std::vec::Vec<::tether_engine::FieldAccessor<Self>> {
                ::std::vec![#(#accessors),*]
            }

            #methods
        }

        impl #impl_generics ::tether_engine::Receiver for #ident #ty_generics #where_clause {
            fn with_receiver<R>(
                call: &::tether_engine::Call<'_>,
                f: impl FnOnce(&Self) -> R,
            ) -> ::tether_engine::vm::VmResult<R> {
                ::tether_engine::methods::class_receiver(call, f)
            }

            fn with_receiver_mut<R>(
                call: &::tether_engine::Call<'_>,
                f: impl FnOnce(&mut Self) -> R,
            ) -> ::tether_engine::vm::VmResult<R> {
                ::tether_engine::methods::class_receiver_mut(call, f)
            }
        }
    })
}
