use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::token::Comma;
use syn::{
    Error, Expr, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments, ReturnType, Type,
    Visibility,
};

/// How the body receives a parameter, decided by the parameter's type name.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Value,
    Function,
    Argument,
}

/// One parameter of an annotated function.
pub struct Input {
    pub ident: Ident,
    pub kind: InputKind,
    /// `T` of `FlowFunction<T>` and `FlowArgument<T>`, the declared type otherwise.
    pub output: Type,
    pub default: Option<Expr>,
}
impl Input {
    pub fn name(&self) -> String {
        self.ident.to_string()
    }

    pub fn is_dependency(&self) -> bool {
        self.kind != InputKind::Value
    }

    /// The `Parameter` registration for this input.
    pub fn parameter(&self) -> TokenStream {
        let name = self.name();
        let output = &self.output;
        let constructor = match self.kind {
            InputKind::Value => quote!(value),
            InputKind::Function => quote!(dependency),
            InputKind::Argument => quote!(argument),
        };
        let default = match (&self.default, self.kind) {
            (None, _) => quote!(),
            (Some(expr), InputKind::Value) => {
                quote!(.default_value(::flow_compose::Value::new::<#output>(#expr)))
            }
            (Some(expr), _) => quote!(.default_dependency(#expr)),
        };
        quote! {
            ::flow_compose::Parameter::#constructor::<#output>(#name)#default
        }
    }

    /// Pulls this input out of the `Call` the body is invoked with.
    pub fn extraction(&self) -> TokenStream {
        let ident = &self.ident;
        let name = self.name();
        let output = &self.output;
        let accessor = match self.kind {
            InputKind::Value => quote!(argument),
            InputKind::Function => quote!(dependency),
            InputKind::Argument => quote!(flow_argument),
        };
        quote! {
            let #ident = __call.#accessor::<#output>(#name)?;
        }
    }
}

fn wrapped_output(ty: &Type) -> Option<(InputKind, Type)> {
    let segment = match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last()?,
        _ => return None,
    };
    let kind = if segment.ident == "FlowFunction" {
        InputKind::Function
    } else if segment.ident == "FlowArgument" {
        InputKind::Argument
    } else {
        return None;
    };
    match &segment.arguments {
        PathArguments::AngleBracketed(arguments) if arguments.args.len() == 1 => {
            match arguments.args.first() {
                Some(GenericArgument::Type(output)) => Some((kind, output.clone())),
                _ => None,
            }
        }
        _ => None,
    }
}

fn parse_input(arg: &FnArg) -> syn::Result<Input> {
    let pat_type = match arg {
        FnArg::Typed(pat_type) => pat_type,
        FnArg::Receiver(receiver) => {
            return Err(Error::new(
                receiver.span(),
                "flows and flow functions cannot take `self`",
            ))
        }
    };
    let ident = match &*pat_type.pat {
        Pat::Ident(pat_ident) => pat_ident.ident.clone(),
        pat => {
            return Err(Error::new(
                pat.span(),
                "parameters of flows and flow functions must be plain identifiers",
            ))
        }
    };
    let mut default = None;
    for attr in pat_type.attrs.iter().filter(|attr| attr.path.is_ident("default")) {
        if default.is_some() {
            return Err(Error::new(attr.span(), "duplicate `#[default]`"));
        }
        default = Some(attr.parse_args::<Expr>()?);
    }
    let (kind, output) = wrapped_output(&pat_type.ty)
        .unwrap_or_else(|| (InputKind::Value, (*pat_type.ty).clone()));
    Ok(Input {
        ident,
        kind,
        output,
        default,
    })
}

/// Parses the parameters of an annotated function, rejecting an ordinary parameter that follows
/// a dependency parameter.
pub fn parse_inputs(inputs: &Punctuated<FnArg, Comma>) -> syn::Result<Vec<Input>> {
    let inputs = inputs.iter().map(parse_input).collect::<syn::Result<Vec<_>>>()?;
    let mut dependency = None;
    for input in inputs.iter() {
        match (input.is_dependency(), &dependency) {
            (true, None) => dependency = Some(input.name()),
            (false, Some(dependency)) => {
                return Err(Error::new(
                    input.ident.span(),
                    format!(
                        "ordinary parameter `{}` cannot follow dependency parameter `{}`",
                        input.ident, dependency
                    ),
                ))
            }
            _ => {}
        }
    }
    Ok(inputs)
}

pub fn reject_generics(func_ast: &ItemFn) -> syn::Result<()> {
    if func_ast.sig.generics.params.is_empty() && func_ast.sig.generics.where_clause.is_none() {
        Ok(())
    } else {
        Err(Error::new(
            func_ast.sig.generics.span(),
            "flows and flow functions cannot be generic",
        ))
    }
}

/// The annotated function, renamed to `__flow_body` and stripped of its outer and `#[default]`
/// attributes, to be nested inside the generated function.
pub fn body_function(func_ast: &ItemFn) -> ItemFn {
    let mut body = func_ast.clone();
    body.attrs.clear();
    body.vis = Visibility::Inherited;
    body.sig.ident = Ident::new("__flow_body", func_ast.sig.ident.span());
    for arg in body.sig.inputs.iter_mut() {
        if let FnArg::Typed(pat_type) = arg {
            pat_type.attrs.retain(|attr| !attr.path.is_ident("default"));
        }
    }
    body
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Default => false,
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .map_or(false, |segment| segment.ident == "Result"),
            _ => false,
        },
    }
}

/// Calls `__flow_body` with the extracted inputs.  Blocking functions run on tokio's blocking
/// pool.  The result always ends up as a `Result<_, FlowError>`.
pub fn invocation(func_ast: &ItemFn, inputs: &[Input]) -> TokenStream {
    let name = func_ast.sig.ident.to_string();
    let idents = inputs.iter().map(|input| &input.ident);
    let call = if func_ast.sig.asyncness.is_some() {
        quote! { __flow_body(#(#idents),*).await }
    } else {
        quote! {
            ::flow_compose::__private::spawn_blocking(move || __flow_body(#(#idents),*))
                .await
                .map_err(|_| ::flow_compose::FlowError::Panicked {
                    function: ::std::string::String::from(#name),
                })?
        }
    };
    if returns_result(&func_ast.sig.output) {
        quote! {
            #call.map_err(::std::convert::Into::<::flow_compose::FlowError>::into)
        }
    } else {
        quote! {
            ::std::result::Result::<_, ::flow_compose::FlowError>::Ok(#call)
        }
    }
}

pub fn extractions(inputs: &[Input]) -> TokenStream {
    let mut out = TokenStream::new();
    for input in inputs.iter() {
        out.extend(input.extraction());
    }
    out
}

pub fn parameters(inputs: &[Input]) -> TokenStream {
    let mut out = TokenStream::new();
    for input in inputs.iter() {
        let parameter = input.parameter();
        out.extend(quote! { .parameter(#parameter) });
    }
    out
}

pub fn outer_attributes(func_ast: &ItemFn) -> TokenStream {
    let mut out = TokenStream::new();
    for attr in func_ast.attrs.iter() {
        out.extend(attr.to_token_stream());
    }
    out
}
