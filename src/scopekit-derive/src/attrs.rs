use proc_macro::TokenStream;
use syn::parse::{Parse, ParseStream};
use syn::{Error as SynError, Path, Result as SynResult, Token, Type};

#[derive(Debug)]
pub enum AttributeData {
    Default,
    Full {
        output_type: Box<Type>,
        post_processor: Path,
    },
}

impl Parse for AttributeData {
    fn parse(input: ParseStream) -> SynResult<Self> {
        if input.is_empty() {
            return Ok(Self::Default);
        }

        let output_type = input.parse()?;
        input.parse::<Token![,]>().map_err(|err| {
            SynError::new(
                err.span(),
                "expects an output type and a post-processor function, separated by a comma",
            )
        })?;
        let post_processor = input.parse()?;
        input.parse::<Option<Token![,]>>()?;

        Ok(Self::Full {
            output_type: Box::new(output_type),
            post_processor,
        })
    }
}

pub fn parse_attributes(attr: TokenStream) -> SynResult<AttributeData> {
    syn::parse(attr)
}
