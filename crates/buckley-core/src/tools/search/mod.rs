//! Content and symbol search tools

mod symbols;
mod text;

pub use symbols::{CodeIndex, FindReferences, FindSymbol, GetFunctionSignature, SymbolHit};
pub use text::SearchText;
