pub mod ast;
pub mod lexer;
pub mod parser;
pub mod sql;
pub mod translate;

pub use ast::*;
pub use lexer::{tokenize, Lexer, Span, Token, TokenKind};
pub use parser::{parse_query, ParseError, ParseResult, Parser};
pub use translate::{
    translate_query, TranslateError, TranslateResult, TranslatedQuery, Translation,
    TranslatorConfig,
};
