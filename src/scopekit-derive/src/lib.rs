mod attrs;
mod impls;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use syn::Result as SynResult;

/// Implements `Component` for the type of the annotated `impl` block.
///
/// Exactly one associated function must be marked `#[inject]`. It returns
/// `Self` or `Result<Self, E>`, and each of its arguments is resolved by
/// type; arguments marked `#[optional]` are `Option<T>` and resolve to
/// `None` when nothing is registered.
///
/// By default the component is registered as `Arc<Self>`. Use
/// `#[component(OutputType, post_processor)]` to register it as something
/// else, such as `Arc<dyn Trait>`, where `post_processor` converts `Self`
/// into `OutputType`.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    match component_impl(attr, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

fn component_impl(attr: TokenStream, item: TokenStream) -> SynResult<TokenStream2> {
    let attr_data = attrs::parse_attributes(attr)?;
    let expanded = impls::expand_implementation(item, attr_data)?;
    Ok(expanded)
}
