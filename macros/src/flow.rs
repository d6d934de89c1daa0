use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Error, Expr, Ident, ItemFn, Token};

use crate::funcutils::{
    body_function, extractions, invocation, outer_attributes, parameters, parse_inputs,
    reject_generics,
};

enum FlowOption {
    Cached,
    Configure(Ident, Expr),
}
impl Parse for FlowOption {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let ident: Ident = input.parse()?;
        if input.peek(Token![=]) {
            input.parse::<Token![=]>()?;
            Ok(FlowOption::Configure(ident, input.parse()?))
        } else if ident == "cached" {
            Ok(FlowOption::Cached)
        } else {
            Err(Error::new(
                ident.span(),
                "expected `cached` or a configuration entry `name = dependency`",
            ))
        }
    }
}

/// `#[flow(cached, greeting = greeting_hello_world(), name = Argument::new::<String>())]`
pub struct FlowOptions {
    cached: bool,
    configuration: Vec<(Ident, Expr)>,
}
impl Parse for FlowOptions {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut options = FlowOptions {
            cached: false,
            configuration: Vec::new(),
        };
        for option in Punctuated::<FlowOption, Token![,]>::parse_terminated(input)? {
            match option {
                FlowOption::Cached => options.cached = true,
                FlowOption::Configure(name, dependency) => {
                    if options.configuration.iter().any(|(configured, _)| *configured == name) {
                        return Err(Error::new(
                            name.span(),
                            format!("`{}` is configured more than once", name),
                        ));
                    }
                    options.configuration.push((name, dependency));
                }
            }
        }
        Ok(options)
    }
}

pub fn flow_impl(options: FlowOptions, func_ast: ItemFn) -> TokenStream {
    match expand(options, func_ast) {
        Ok(code) => code,
        Err(error) => error.to_compile_error(),
    }
}

fn expand(options: FlowOptions, func_ast: ItemFn) -> syn::Result<TokenStream> {
    reject_generics(&func_ast)?;
    let inputs = parse_inputs(&func_ast.sig.inputs)?;
    for (name, _) in options.configuration.iter() {
        if let Some(input) = inputs
            .iter()
            .find(|input| !input.is_dependency() && input.ident == *name)
        {
            return Err(Error::new(
                name.span(),
                format!(
                    "`{}` is not a dependency of the flow `{}` and cannot be configured",
                    input.ident, func_ast.sig.ident
                ),
            ));
        }
    }

    let attrs = outer_attributes(&func_ast);
    let vis = &func_ast.vis;
    let name = &func_ast.sig.ident;
    let name_quoted = name.to_string();
    let cached = options.cached;
    let configured = options.configuration.iter().map(|(name, _)| name.to_string());
    let dependencies = options.configuration.iter().map(|(_, dependency)| dependency);
    let body = body_function(&func_ast);
    let parameters = parameters(&inputs);
    let extractions = extractions(&inputs);
    let invocation = invocation(&func_ast, &inputs);
    Ok(quote! {
        #attrs
        #vis fn #name() -> ::flow_compose::Flow {
            #body

            static FLOW: ::flow_compose::__private::OnceCell<::flow_compose::Flow> =
                ::flow_compose::__private::OnceCell::new();
            FLOW
                .get_or_init(|| {
                    ::flow_compose::declare_flow(#name_quoted)
                        .cached(#cached)
                        #(.configure(#configured, #dependencies))*
                        #parameters
                        .build(|__call: ::flow_compose::Call| async move {
                            #extractions
                            #invocation
                        })
                        .expect("flow signature and configuration are checked at expansion")
                })
                .clone()
        }
    })
}
