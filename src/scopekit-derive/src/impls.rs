use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::token::Comma;
use syn::visit_mut::{self, VisitMut};
use syn::{
    AngleBracketedGenericArguments, Attribute, Error as SynError, FnArg, GenericArgument, Ident,
    ImplItem, ImplItemFn, ItemImpl, Meta, PathArguments, Result as SynResult, ReturnType,
    Signature, Type, TypePath,
};

use crate::attrs::AttributeData;

const RETURN_TYPE_MESSAGE: &str =
    "a constructor's return type should be `Self` or `Result<Self, E>`";

#[derive(Debug)]
struct ConstructorData {
    self_type: TypePath,
    identifier: Ident,
    arguments: Vec<ArgumentData>,
    return_type: ReturnTypeData,
}

#[derive(Debug)]
struct ArgumentData {
    span: Span,
    optional: bool,
}

#[derive(Debug)]
enum ReturnTypeData {
    Infallible,
    Result { error_type: Box<Type> },
}

struct AttributeRemovalVisitor;

impl AttributeRemovalVisitor {
    fn is_custom_attribute(attr: &Attribute) -> bool {
        attr.path().is_ident("inject") || attr.path().is_ident("optional")
    }
}

impl VisitMut for AttributeRemovalVisitor {
    fn visit_attributes_mut(&mut self, attrs: &mut Vec<Attribute>) {
        attrs.retain(|attr| !Self::is_custom_attribute(attr));
        attrs
            .iter_mut()
            .for_each(|attr| visit_mut::visit_attribute_mut(self, attr));
    }
}

pub fn expand_implementation(
    impls: TokenStream,
    attr_data: AttributeData,
) -> SynResult<TokenStream2> {
    let mut impls = match syn::parse::<ItemImpl>(impls) {
        Ok(impls) => impls,
        Err(err) => {
            return Err(SynError::new(
                err.span(),
                "`#[component]` should be annotated on the `impl` block",
            ))
        }
    };

    let self_type = get_self_type(&impls)?;
    let signature = get_constructor_signature(&impls.items, impls.span())?;
    let ctor_data = parse_constructor(self_type, signature)?;

    let expanded = expand_component_implementation(ctor_data, attr_data);

    let mut visitor = AttributeRemovalVisitor;
    visitor.visit_item_impl_mut(&mut impls);

    Ok(quote! {
        #impls
        #expanded
    })
}

fn get_self_type(impls: &ItemImpl) -> SynResult<TypePath> {
    if let Type::Path(ty) = impls.self_ty.as_ref() {
        Ok(ty.clone())
    } else {
        Err(SynError::new(impls.self_ty.span(), "invalid self type"))
    }
}

fn get_constructor_signature(items: &[ImplItem], impl_span: Span) -> SynResult<Signature> {
    let ctors: Vec<_> = items
        .iter()
        .filter_map(filter_and_map_item_fn)
        .filter(is_annotated_with_inject)
        .collect();

    let signature = match ctors.as_slice() {
        [ctor] => ctor.sig.clone(),
        [] => {
            return Err(SynError::new(
                impl_span,
                "no associated function is annotated with `#[inject]`",
            ))
        }
        _ => {
            return Err(SynError::new(
                impl_span,
                "only one associated function can be annotated with `#[inject]`",
            ))
        }
    };

    if let Some(FnArg::Receiver(rec)) = signature.inputs.first() {
        return Err(SynError::new(
            rec.span(),
            "method is not allowed to be annotated with `#[inject]`",
        ));
    }

    Ok(signature)
}

fn filter_and_map_item_fn(item: &ImplItem) -> Option<&ImplItemFn> {
    if let ImplItem::Fn(impl_fn) = item {
        Some(impl_fn)
    } else {
        None
    }
}

fn is_annotated_with_inject(item_fn: &&ImplItemFn) -> bool {
    item_fn
        .attrs
        .iter()
        .any(|attr| matches!(&attr.meta, Meta::Path(path) if path.is_ident("inject")))
}

fn parse_constructor(self_type: TypePath, signature: Signature) -> SynResult<ConstructorData> {
    let identifier = signature.ident;
    let arguments = parse_constructor_arguments(signature.inputs)?;
    let return_type = parse_constructor_return_type(signature.output, &self_type)?;

    Ok(ConstructorData {
        self_type,
        identifier,
        arguments,
        return_type,
    })
}

fn parse_constructor_arguments(inputs: Punctuated<FnArg, Comma>) -> SynResult<Vec<ArgumentData>> {
    inputs
        .into_iter()
        .map(|arg| match arg {
            FnArg::Typed(arg) => {
                let span = arg.span();
                parse_argument_attributes(&arg.attrs)
                    .map(|optional| ArgumentData { span, optional })
            }
            FnArg::Receiver(rec) => Err(SynError::new(
                rec.span(),
                "a constructor should not have a receiver argument",
            )),
        })
        .collect()
}

fn parse_argument_attributes(attrs: &[Attribute]) -> SynResult<bool> {
    let mut optional = false;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("optional")) {
        if !matches!(attr.meta, Meta::Path(_)) {
            return Err(SynError::new(
                attr.span(),
                "`#[optional]` does not take any argument",
            ));
        }
        if optional {
            return Err(SynError::new(
                attr.span(),
                "`#[optional]` is allowed only once per argument",
            ));
        }
        optional = true;
    }

    Ok(optional)
}

fn parse_constructor_return_type(
    output: ReturnType,
    self_type: &TypePath,
) -> SynResult<ReturnTypeData> {
    let ReturnType::Type(_, return_type) = output else {
        return Err(SynError::new(output.span(), RETURN_TYPE_MESSAGE));
    };
    let Type::Path(return_type) = *return_type else {
        return Err(SynError::new(return_type.span(), RETURN_TYPE_MESSAGE));
    };

    if is_self_type(&return_type, self_type) {
        return Ok(ReturnTypeData::Infallible);
    }

    let segments = &return_type.path.segments;
    let idents: Vec<_> = segments.iter().map(|s| s.ident.to_string()).collect();
    let is_result = match idents.as_slice() {
        [result] => result == "Result",
        [krate, module, result] => krate == "std" && module == "result" && result == "Result",
        _ => false,
    };

    match segments.last() {
        Some(last) if is_result => parse_result_return_type(&last.arguments, self_type),
        _ => Err(SynError::new(return_type.span(), RETURN_TYPE_MESSAGE)),
    }
}

fn is_self_type(ty: &TypePath, self_type: &TypePath) -> bool {
    ty == self_type || ty.path.is_ident("Self")
}

fn parse_result_return_type(
    type_args: &PathArguments,
    self_type: &TypePath,
) -> SynResult<ReturnTypeData> {
    let PathArguments::AngleBracketed(AngleBracketedGenericArguments { args, .. }) = type_args
    else {
        return Err(SynError::new(type_args.span(), RETURN_TYPE_MESSAGE));
    };

    match (args.first(), args.get(1), args.len()) {
        (
            Some(GenericArgument::Type(Type::Path(ok_type))),
            Some(GenericArgument::Type(error_type)),
            2,
        ) if is_self_type(ok_type, self_type) => {
            Ok(ReturnTypeData::Result {
                error_type: Box::new(error_type.clone()),
            })
        }
        _ => Err(SynError::new(args.span(), RETURN_TYPE_MESSAGE)),
    }
}

fn expand_component_implementation(
    ctor_data: ConstructorData,
    attr_data: AttributeData,
) -> TokenStream2 {
    let self_type = &ctor_data.self_type;
    let constructor = &ctor_data.identifier;

    let (associated_type_constructed, post_process_body) = match &attr_data {
        AttributeData::Full {
            output_type,
            post_processor,
        } => (
            quote! { type Constructed = #output_type; },
            quote! { #post_processor(self) },
        ),
        AttributeData::Default => (
            quote! { type Constructed = ::std::sync::Arc<Self>; },
            quote! { ::std::sync::Arc::new(self) },
        ),
    };

    let associated_type_error = match &ctor_data.return_type {
        ReturnTypeData::Result { error_type } => quote! { type Error = #error_type; },
        ReturnTypeData::Infallible => quote! { type Error = ::std::convert::Infallible; },
    };

    let get_dep_statements = ctor_data
        .arguments
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            let dep = Ident::new(&format!("dep{i}"), arg.span);
            if arg.optional {
                quote! { let #dep = ::scopekit::container::TypedResolver::resolve(resolver)?; }
            } else {
                quote! {
                    let #dep = ::scopekit::container::TypedResolver::resolve_required(resolver)?;
                }
            }
        })
        .collect::<TokenStream2>();

    let dep_args = ctor_data
        .arguments
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            let dep = Ident::new(&format!("dep{i}"), arg.span);
            quote! { #dep, }
        })
        .collect::<TokenStream2>();

    let wire_deps = match &ctor_data.return_type {
        ReturnTypeData::Infallible => quote! { Ok(Ok(<#self_type>::#constructor(#dep_args))) },
        ReturnTypeData::Result { .. } => quote! { Ok(<#self_type>::#constructor(#dep_args)) },
    };

    quote! {
        impl ::scopekit::provider::component::Component for #self_type {
            #associated_type_constructed
            #associated_type_error

            fn construct<R>(resolver: &R) -> ::std::result::Result<
                ::std::result::Result<Self, Self::Error>,
                ::scopekit::container::ResolveError
            >
            where
                R: ::scopekit::container::TypedResolver + ?Sized
            {
                #get_dep_statements
                #wire_deps
            }

            fn post_process(self) -> Self::Constructed {
                #post_process_body
            }
        }
    }
}
