//! tplc lexer: splits template source into text runs and action tokens.

pub mod lexer;
pub mod token;

pub use lexer::{LexResult, Lexer};
pub use token::{Token, TokenKind, KEYWORDS};
