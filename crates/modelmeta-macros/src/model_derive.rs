//! Implementation of the Model derive macro.
//!
//! Emits one static descriptor table per struct plus the `Model`, `Record`,
//! `Shaped` and `Bindable` implementations that expose its fields.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, LitStr, Result, Type};

/// Parsed definition of a struct with `#[derive(Model)]`.
#[derive(Debug)]
pub struct ModelDef {
    /// The struct name.
    pub name: Ident,
    /// Explicit table name from `#[model(table_name = "...")]`.
    pub table_name: Option<String>,
    /// Parsed fields, in declaration order.
    pub fields: Vec<ModelFieldDef>,
}

/// Parsed attributes of a single field.
#[derive(Debug)]
pub struct ModelFieldDef {
    /// The field name.
    pub name: Ident,
    /// The field type.
    pub ty: Type,
    /// Model annotation, `;`-joined when given more than once.
    pub model_tag: String,
    /// Storage annotation, `;`-joined when given more than once.
    pub sql_tag: String,
    /// `#[model(skip)]` or `#[sql("-")]`.
    pub ignored: bool,
    /// `#[model(flatten)]`: anonymously embedded.
    pub anonymous: bool,
}

/// Parse a `DeriveInput` into a `ModelDef`.
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => parse_model_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    let mut table_name = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table_name") {
                let value: LitStr = meta.value()?.parse()?;
                table_name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unknown model attribute; expected `table_name = \"...\"`"))
            }
        })?;
    }

    Ok(ModelDef {
        name: input.ident.clone(),
        table_name,
        fields,
    })
}

fn parse_model_fields(fields: &Fields) -> Result<Vec<ModelFieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_model_field).collect(),
        Fields::Unnamed(_) => Err(Error::new_spanned(
            fields,
            "Model requires a struct with named fields",
        )),
        Fields::Unit => Ok(Vec::new()),
    }
}

fn parse_model_field(field: &Field) -> Result<ModelFieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut model_tags = Vec::new();
    let mut sql_tags = Vec::new();
    let mut ignored = false;
    let mut anonymous = false;

    for attr in &field.attrs {
        if attr.path().is_ident("model") {
            // #[model("foreignkey:owner_id;embedded")]
            if let Ok(tag) = attr.parse_args::<LitStr>() {
                model_tags.push(tag.value());
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    ignored = true;
                    Ok(())
                } else if meta.path.is_ident("flatten") {
                    anonymous = true;
                    Ok(())
                } else {
                    Err(meta.error(
                        "unknown model attribute; expected a tag string, `skip` or `flatten`",
                    ))
                }
            })?;
        } else if attr.path().is_ident("sql") {
            let tag: LitStr = attr.parse_args()?;
            let tag = tag.value();
            if tag.trim() == "-" {
                ignored = true;
            }
            sql_tags.push(tag);
        }
    }

    Ok(ModelFieldDef {
        name,
        ty: field.ty.clone(),
        model_tag: model_tags.join(";"),
        sql_tag: sql_tags.join(";"),
        ignored,
        anonymous,
    })
}

/// Generate the trait implementations for a parsed model.
pub fn generate_model_impl(def: &ModelDef) -> TokenStream {
    let name = &def.name;
    let name_str = name.to_string();

    let decls = def.fields.iter().map(|field| {
        let field_name = field.name.to_string();
        if field.ignored {
            return quote! { ::modelmeta::FieldDecl::ignored(#field_name) };
        }
        let ty = &field.ty;
        let model_tag = &field.model_tag;
        let sql_tag = &field.sql_tag;
        let anonymous = field.anonymous;
        quote! {
            ::modelmeta::FieldDecl::new(#field_name, <#ty as ::modelmeta::Shaped>::type_shape)
                .model_tag(#model_tag)
                .sql_tag(#sql_tag)
                .anonymous(#anonymous)
        }
    });

    let table_name = def
        .table_name
        .as_ref()
        .map(|table| quote! { .table_name(#table) });

    let stored: Vec<_> = def.fields.iter().filter(|f| !f.ignored).collect();
    let slot_names: Vec<String> = stored.iter().map(|f| f.name.to_string()).collect();
    let slot_idents: Vec<&Ident> = stored.iter().map(|f| &f.name).collect();

    quote! {
        impl ::modelmeta::Model for #name {
            fn shape() -> &'static ::modelmeta::ModelShape {
                static SHAPE: ::modelmeta::ModelShape =
                    ::modelmeta::ModelShape::new(#name_str, &[#(#decls),*]) #table_name;
                &SHAPE
            }
        }

        impl ::modelmeta::Record for #name {
            fn record_type(&self) -> ::modelmeta::ModelType {
                ::modelmeta::ModelType::of::<Self>()
            }

            fn slots(&self) -> ::std::vec::Vec<(&'static str, &dyn ::modelmeta::Bindable)> {
                ::std::vec![
                    #((#slot_names, &self.#slot_idents as &dyn ::modelmeta::Bindable)),*
                ]
            }

            fn slots_mut(
                &mut self,
            ) -> ::std::vec::Vec<(&'static str, &mut dyn ::modelmeta::Bindable)> {
                ::std::vec![
                    #((#slot_names, &mut self.#slot_idents as &mut dyn ::modelmeta::Bindable)),*
                ]
            }
        }

        impl ::modelmeta::Shaped for #name {
            fn type_shape() -> ::modelmeta::TypeShape {
                ::modelmeta::TypeShape::Record(::modelmeta::ModelType::of::<Self>())
            }
        }

        impl ::modelmeta::Bindable for #name {
            fn type_name(&self) -> &'static str {
                #name_str
            }

            fn is_blank(&self) -> bool {
                ::modelmeta::Record::slots(self)
                    .iter()
                    .all(|(_, slot)| slot.is_blank())
            }

            fn to_value(&self) -> ::modelmeta::Value {
                ::modelmeta::Value::Null
            }

            fn assign(
                &mut self,
                value: ::modelmeta::Value,
            ) -> ::core::result::Result<(), ::modelmeta::ConvertError> {
                ::core::result::Result::Err(::modelmeta::ConvertError::new(
                    value.kind_name(),
                    #name_str,
                ))
            }

            fn as_record(&self) -> ::core::option::Option<&dyn ::modelmeta::Record> {
                ::core::option::Option::Some(self)
            }

            fn as_record_mut(&mut self) -> ::core::option::Option<&mut dyn ::modelmeta::Record> {
                ::core::option::Option::Some(self)
            }
        }
    }
}
