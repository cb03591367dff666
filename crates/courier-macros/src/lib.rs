//! Procedural macros for courier.
//!
//! - `#[derive(Inject)]` wires a handler's `ContextSlot` field
//! - `#[commands]` turns the methods of an `impl` block into commands
//!
//! ```rust,ignore
//! use courier::{BoxError, ContextSlot, Inject, MessageCreate, commands};
//!
//! #[derive(Default, Inject)]
//! struct Dice {
//!     ctx: ContextSlot,
//! }
//!
//! #[commands]
//! impl Dice {
//!     /// Rolls a die with the given number of sides.
//!     pub async fn roll(&self, m: &MessageCreate, sides: u32) -> Result<(), BoxError> {
//!         let ctx = self.ctx.context()?;
//!         ctx.reply(m, &format!("{}", sides / 2)).await?;
//!         Ok(())
//!     }
//!
//!     #[command(admin, rename = "Rーreset")]
//!     pub async fn reset(&self, _: &MessageCreate) -> Result<(), BoxError> {
//!         Ok(())
//!     }
//! }
//! ```

mod commands;
mod inject;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemImpl, parse_macro_input};

/// Derives `courier::Inject`.
///
/// The first field whose type is `ContextSlot` receives the router's context
/// at registration. A struct without such a field still derives, but fails
/// to register.
#[proc_macro_derive(Inject)]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match inject::derive_inject(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `courier::CommandSet` from the methods of an inherent `impl`.
///
/// A method becomes a command when it is `pub`, takes `&self`, takes the
/// triggering event as `&E` in its first parameter and returns a `Result`.
/// Further parameters become the command's arguments. Methods may be `async`.
///
/// `name(&self)` and `description(&self)` without further parameters provide
/// the handler's subcommand name and description.
///
/// # Method attributes
///
/// | Attribute | Effect |
/// |-----------|--------|
/// | `#[command(admin)]` | Only administrators see the command |
/// | `#[command(raw)]` | Name matches case-sensitively |
/// | `#[command(rename = "...")]` | Identifier used instead of the method name |
/// | `#[command(description = "...")]` | Overrides the doc comment |
/// | `#[command(skip)]` | Not a command |
#[proc_macro_attribute]
pub fn commands(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[commands] takes no arguments",
        )
        .to_compile_error()
        .into();
    }
    let item = parse_macro_input!(item as ItemImpl);

    match commands::expand(item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
