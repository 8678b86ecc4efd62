use proc_macro::TokenStream;
use quote::quote;

#[derive(deluxe::ParseMetaItem)]
#[deluxe(attributes(comparison))]
struct ComparisonAttributes(syn::Ident, #[deluxe(flatten)] ComparisonNamedAttributes);

#[derive(deluxe::ParseMetaItem)]
struct ComparisonNamedAttributes {
  name: String,
}

/// Turns a bare `compare` function into a unit struct implementing `Comparison`.
///
/// ```ignore
/// #[comparison(Equals, name = "equals")]
/// fn compare(&self, lhs: &str, rhs: &str, _: Option<&Regex>) -> f64 {
///   if lhs == rhs { 100.0 } else { 0.0 }
/// }
/// ```
#[proc_macro_attribute]
pub fn comparison(attrs: TokenStream, input: TokenStream) -> TokenStream {
  let ComparisonAttributes(ident, ComparisonNamedAttributes { name }) = match deluxe::parse2::<ComparisonAttributes>(attrs.into()) {
    Ok(attrs) => attrs,
    Err(err) => return err.to_compile_error().into(),
  };

  let input = proc_macro2::TokenStream::from(input);

  quote! {
      #[derive(Clone, Copy, Debug, Default)]
      pub struct #ident;

      impl Comparison for #ident {
        fn name(&self) -> &'static str {
            #name
        }

        #[tracing::instrument(level = "trace", name = #name, skip_all)]
        #input
      }
  }
  .into()
}
