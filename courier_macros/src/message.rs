use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr};

#[derive(Default)]
struct MessageArgs {
    name: Option<String>,
    local_queue: Option<String>,
    headers: Vec<(String, String)>,
}

pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let args = match extract_args(&input) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };

    let message_type = args.name.unwrap_or_else(|| name.to_string());

    let local_queue = args.local_queue.map(|queue| {
        quote! { .with_local_queue(#queue) }
    });

    let headers = args.headers.iter().map(|(key, value)| {
        quote! { .modify_with(courier::SetHeader::new(#key, #value)) }
    });

    let expanded = quote! {
        impl #impl_generics courier::Message for #name #ty_generics #where_clause {
            fn message_type(&self) -> &'static str {
                #message_type
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        impl #impl_generics courier::MessageDescriptor for #name #ty_generics #where_clause {
            const MESSAGE_TYPE: &'static str = #message_type;

            fn options() -> courier::MessageOptions {
                courier::MessageOptions::new()
                    #local_queue
                    #(#headers)*
            }
        }
    };

    TokenStream::from(expanded)
}

fn extract_args(input: &DeriveInput) -> syn::Result<MessageArgs> {
    let mut args = MessageArgs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                args.name = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("local_queue") {
                let value: LitStr = meta.value()?.parse()?;
                args.local_queue = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("header") {
                let mut key = None;
                let mut value = None;
                meta.parse_nested_meta(|inner| {
                    let lit: LitStr = inner.value()?.parse()?;
                    if inner.path.is_ident("key") {
                        key = Some(lit.value());
                    } else if inner.path.is_ident("value") {
                        value = Some(lit.value());
                    } else {
                        return Err(inner.error("expected `key` or `value`"));
                    }
                    Ok(())
                })?;
                match (key, value) {
                    (Some(key), Some(value)) => {
                        args.headers.push((key, value));
                        Ok(())
                    }
                    _ => Err(meta.error("header requires both `key` and `value`")),
                }
            } else {
                Err(meta.error("unsupported message attribute"))
            }
        })?;
    }

    Ok(args)
}
