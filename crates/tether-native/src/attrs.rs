// Attribute parsing shared by both derives
//
// Container attributes use meta syntax: #[tether(standalone, methods = path)]
// Field attributes are a single string literal: #[tether("option,name=x")]
// The string is validated at runtime by the engine's tag parser; here we
// only need to know whether the field is skipped.

use syn::ext::IdentExt;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr, Path, Result};

/// Options declared on the struct itself
#[derive(Default)]
pub struct ContainerAttrs {
    pub methods: Option<Path>,
    pub standalone: bool,
}

/// One named field with its raw annotation
pub struct FieldInfo {
    pub ident: Ident,
    pub raw_tag: String,
    pub skip: bool,
}

impl FieldInfo {
    pub fn name(&self) -> String {
        self.ident.unraw().to_string()
    }
}

pub fn container_attrs(attrs: &[Attribute]) -> Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("tether")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("standalone") {
                out.standalone = true;
                Ok(())
            } else if meta.path.is_ident("methods") {
                out.methods = Some(meta.value()?.parse::<Path>()?);
                Ok(())
            } else {
                Err(meta.error("expected `standalone` or `methods = path`"))
            }
        })?;
    }
    Ok(out)
}

pub fn named_fields(input: &DeriveInput, derive: &str) -> Result<Vec<FieldInfo>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    format!("{} can only be derived for structs with named fields", derive),
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                format!("{} can only be derived for structs", derive),
            ))
        }
    };

    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let mut raw_tag = None;
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("tether")) {
            if raw_tag.is_some() {
                return Err(syn::Error::new_spanned(
                    attr,
                    "duplicate #[tether] annotation on field",
                ));
            }
            raw_tag = Some(attr.parse_args::<LitStr>()?.value());
        }
        let raw_tag = raw_tag.unwrap_or_default();
        let skip = raw_tag.split(',').any(|d| d.trim() == "-");
        out.push(FieldInfo {
            // named fields always carry an identifier
            ident: field.ident.clone().ok_or_else(|| {
                syn::Error::new_spanned(field, "expected a named field")
            })?,
            raw_tag,
            skip,
        });
    }
    Ok(out)
}
