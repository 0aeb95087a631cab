use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// `#[derive(DdsData)]`
///
/// Fields marked `#[key]` form the instance key, in declaration order.
/// `#[dds_data(type_name = "...")]` overrides the registered type name.
#[proc_macro_derive(DdsData, attributes(key, dds_data))]
pub fn derive_ddsdata(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut user_type_name = None;
    for attr in &input.attrs {
        if attr.path().is_ident("dds_data") {
            let parsed = attr.parse_nested_meta(|meta| {
                // #[dds_data(type_name = "...")]
                if meta.path.is_ident("type_name") {
                    let expr = meta.value()?;
                    let s: LitStr = expr.parse()?;
                    user_type_name = Some(s.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported dds_data attribute"))
                }
            });
            if let Err(e) = parsed {
                return e.to_compile_error().into();
            }
        }
    }

    let mut keys = Vec::new();
    match &input.data {
        Data::Struct(data_struct) => {
            if let Fields::Named(fields) = &data_struct.fields {
                for field in &fields.named {
                    if field.attrs.iter().any(|attr| attr.path().is_ident("key")) {
                        if let Some(ident) = &field.ident {
                            keys.push(ident);
                        }
                    }
                }
            }
        }
        _ => {
            return syn::Error::new_spanned(name, "DdsData can only be derived for structs")
                .to_compile_error()
                .into();
        }
    }

    let final_type_name = user_type_name.unwrap_or_else(|| name.to_string());
    let keys_count = keys.len();

    let push_keys = keys.iter().map(|key| {
        quote! {
            holder.push(&self.#key);
        }
    });

    let expanded = quote! {
        impl #impl_generics ::union_dds::dds::key::DdsData for #name #ty_generics #where_clause {
            fn gen_key(&self) -> ::union_dds::dds::key::KeyHash {
                let mut holder = ::union_dds::dds::key::KeyHolder::new();
                #(#push_keys)*
                holder.finish()
            }
            fn type_name() -> String {
                #final_type_name.to_string()
            }
            fn is_with_key() -> bool {
                #keys_count != 0
            }
        }
    };

    TokenStream::from(expanded)
}
