use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ItemFn;

/// Proc macro to denote a Transaction
///
/// A transaction is one measured request. Its duration is recorded into `http_req_duration`
/// and an `Err` return counts towards `http_req_failed`.
///
/// NOTE: Currently this macro only works on `async` functions with a `Result<T, E>` return value.
///
/// # Example
/// ```ignore
/// use gateload::prelude::*;
///
/// #[transaction]
/// async fn my_transaction(client: &Client) -> Result<StatusCode, MyError> {
///     ...
/// }
/// ```
#[proc_macro_attribute]
pub fn transaction(attr: TokenStream, item: TokenStream) -> TokenStream {
    match transaction_internal(attr.into(), item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn transaction_internal(_attr: TokenStream2, item: TokenStream) -> syn::Result<TokenStream2> {
    let input = syn::parse::<ItemFn>(item)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[transaction] can only be applied to async functions",
        ));
    }

    let stmts = &block.stmts;
    let name = &sig.ident;

    Ok(quote! {
        #(#attrs)* #vis #sig {
            ::gateload::transaction::transaction_hook(
                ::gateload::core::generate_labels!(#name),
                async move {
                    #(#stmts)*
                },
            ).await
        }
    })
}
