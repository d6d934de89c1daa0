use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Error, Ident, ItemFn, Token};

use crate::funcutils::{
    body_function, extractions, invocation, outer_attributes, parameters, parse_inputs,
    reject_generics,
};

/// `#[flow_function]` or `#[flow_function(cached)]`.
pub struct FunctionOptions {
    pub cached: bool,
}
impl Parse for FunctionOptions {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut cached = false;
        for option in Punctuated::<Ident, Token![,]>::parse_terminated(input)? {
            if option != "cached" {
                return Err(Error::new(option.span(), "expected `cached`"));
            }
            cached = true;
        }
        Ok(Self { cached })
    }
}

pub fn flow_function_impl(options: FunctionOptions, func_ast: ItemFn) -> TokenStream {
    match expand(options, func_ast) {
        Ok(code) => code,
        Err(error) => error.to_compile_error(),
    }
}

fn expand(options: FunctionOptions, func_ast: ItemFn) -> syn::Result<TokenStream> {
    reject_generics(&func_ast)?;
    let inputs = parse_inputs(&func_ast.sig.inputs)?;
    let attrs = outer_attributes(&func_ast);
    let vis = &func_ast.vis;
    let name = &func_ast.sig.ident;
    let name_quoted = name.to_string();
    let cached = options.cached;
    let body = body_function(&func_ast);
    let parameters = parameters(&inputs);
    let extractions = extractions(&inputs);
    let invocation = invocation(&func_ast, &inputs);
    Ok(quote! {
        #attrs
        #vis fn #name() -> ::flow_compose::Dependency {
            #body

            static DEPENDENCY: ::flow_compose::__private::OnceCell<::flow_compose::Dependency> =
                ::flow_compose::__private::OnceCell::new();
            DEPENDENCY
                .get_or_init(|| {
                    ::flow_compose::declare_dependency(#name_quoted)
                        .cached(#cached)
                        #parameters
                        .build(|__call: ::flow_compose::Call| async move {
                            #extractions
                            #invocation
                        })
                        .expect("parameter order is checked when the flow function is expanded")
                })
                .clone()
        }
    })
}
