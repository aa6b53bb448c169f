// #[derive(TableMapping)] implementation
//
// Generates table conversion code for a struct with named fields.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

use crate::attrs::{container_attrs, named_fields};

/// Expands the TableMapping derive.
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[derive(Default, TableMapping)]
/// struct Pair {
///     #[tether("option")]
///     left: i64,
///     right: String,
/// }
///
/// // Output (abridged):
/// impl ::tether_engine::TableMapping for Pair {
///     fn raw_tags() -> &'static [(&'static str, &'static str)] {
///         &[("left", "option"), ("right", "")]
///     }
///     fn encode_fields(&self, en, table) -> Result<(), ConversionError> {
///         let tags = Self::tags();
///         en.write_field(table, &tags[0], &self.left)?;
///         en.write_field(table, &tags[1], &self.right)?;
///         Ok(())
///     }
///     ...
/// }
/// ```
pub fn expand_table_mapping(input: DeriveInput) -> Result<TokenStream> {
    let container = container_attrs(&input.attrs)?;
    let fields = named_fields(&input, "TableMapping")?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let raw_tags = fields.iter().map(|f| {
        let name = f.name();
        let raw = &f.raw_tag;
        quote! { (#name, #raw) }
    });

    let writes = fields.iter().enumerate().filter(|(_, f)| !f.skip).map(|(i, f)| {
        let field = &f.ident;
        quote! { en.write_field(table, &tags[#i], &self.#field)?; }
    });

    let reads = fields.iter().enumerate().filter(|(_, f)| !f.skip).map(|(i, f)| {
        let field = &f.ident;
        quote! { de.read_field(table, &tags[#i], &mut self.#field)?; }
    });

    let standalone = container.standalone;
    let methods = container.methods.map(|path| {
        quote! {
            fn methods() -> ::tether_engine::Methods<Self> {
                #path()
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::tether_engine::HostType for #ident #ty_generics #where_clause {
            const KIND: ::tether_engine::Kind = ::tether_engine::Kind::Mapping;
        }

        impl #impl_generics ::tether_engine::TableMapping for #ident #ty_generics #where_clause {
            const STANDALONE: bool = #standalone;

            fn raw_tags() -> &'static [(&'static str, &'static str)] {
                &[#(#raw_tags),*]
            }

            #[allow(unused_variables)]
            fn encode_fields(
                &self,
                en: &mut ::tether_engine::Encoder<'_>,
                table: &::tether_engine::vm::Table,
            ) -> ::std::result::Result<(), ::tether_engine::ConversionError> {
                let tags = <Self as ::tether_engine::TableMapping>::tags();
                #(#writes)*
                Ok(())
            }

            #[allow(unused_variables)]
            fn decode_fields(
                &mut self,
                de: &mut ::tether_engine::Decoder<'_>,
                table: &::tether_engine::vm::Table,
            ) -> ::std::result::Result<(), ::tether_engine::ConversionError> {
                let tags = <Self as ::tether_engine::TableMapping>::tags();
                #(#reads)*
                Ok(())
            }

            #methods
        }

        impl #impl_generics ::tether_engine::Encode for #ident #ty_generics #where_clause {
            fn encode(
                &self,
                en: &mut ::tether_engine::Encoder<'_>,
            ) -> ::std::result::Result<::tether_engine::vm::Value, ::tether_engine::ConversionError> {
                en.encode_mapping(self)
            }
        }

        impl #impl_generics ::tether_engine::Decode for #ident #ty_generics #where_clause {
            fn decode(
                de: &mut ::tether_engine::Decoder<'_>,
                src: &::tether_engine::vm::Value,
            ) -> ::std::result::Result<Self, ::tether_engine::ConversionError> {
                let mut out = <Self as ::std::default::Default>::default();
                de.decode_mapping(src, &mut out)?;
                Ok(out)
            }

            fn decode_into(
                &mut self,
                de: &mut ::tether_engine::Decoder<'_>,
                src: &::tether_engine::vm::Value,
            ) -> ::std::result::Result<(), ::tether_engine::ConversionError> {
                de.decode_mapping(src, self)
            }
        }

        impl #impl_generics ::tether_engine::Receiver for #ident #ty_generics #where_clause {
            fn with_receiver<R>(
                call: &::tether_engine::Call<'_>,
                f: impl FnOnce(&Self) -> R,
            ) -> ::tether_engine::vm::VmResult<R> {
                ::tether_engine::methods::mapping_receiver(call, f)
            }

            fn with_receiver_mut<R>(
                call: &::tether_engine::Call<'_>,
                f: impl FnOnce(&mut Self) -> R,
            ) -> ::tether_engine::vm::VmResult<R> {
                ::tether_engine::methods::mapping_receiver_mut(call, f)
            }
        }
    })
}
