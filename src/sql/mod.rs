//! # SQL Fragment Processing
//!
//! Everything that reads statement text. Nothing here resolves types,
//! privileges or subqueries; the goal is only to find which partition-key
//! columns a statement pins, and to which values.
//!
//! ## Module Structure
//!
//! - `token`: token vocabulary and byte spans
//! - `lexer`: zero-copy MySQL tokenizer with a phf keyword table
//! - `cursor`: one-token-lookahead helpers shared by both scanners
//! - `statement`: statement head scan (target table, alias, rewrite sites)
//! - `matcher`: column reference to partition-key resolution
//! - `arena`: per-request node store with a node budget
//! - `relation`: token lists and `RelationExpr`
//! - `parser`: WHERE / VALUES fragment grammar
//!
//! ## Data Flow
//!
//! ```text
//! sql ──► StatementHead::scan ──► FragmentStart ──► ExprParser::parse
//!              │                                       │
//!              ├─ target db/table spans                ├─ RelationExpr list
//!              └─ select-list qualifiers               ├─ placeholder / batch counts
//!                                                      └─ qualifier spans
//! ```
//!
//! Tokens borrow from the statement; unescaped string literals are the only
//! text copied, into the caller's `bumpalo::Bump`.
//!
//! ## Example
//!
//! ```ignore
//! use keyroute::sql::{Lexer, Token};
//! use keyroute::config::QuoteMode;
//!
//! let mut lexer = Lexer::new("WHERE id = 1001", QuoteMode::Mysql);
//! loop {
//!     let token = lexer.next_token();
//!     if matches!(token, Token::Eof) { break; }
//!     println!("{:?}", token);
//! }
//! ```

pub mod arena;
pub mod cursor;
pub mod lexer;
pub mod matcher;
pub mod parser;
pub mod relation;
pub mod statement;
pub mod token;

pub use arena::ParseArena;
pub use cursor::{HintComment, TokenCursor};
pub use lexer::{unescape_string, Lexer};
pub use matcher::PartKeyMatcher;
pub use parser::{
    AbortReason, ExprParseResult, ExprParser, ParseMode, ParseStatus, SyntaxIssue, ValueRow,
};
pub use relation::{
    ArithOp, ColumnRef, CompareOp, ListId, PartLevel, Placeholder, RelationExpr, RelationId,
    TokenId, TokenKind, TokenList, TokenNode,
};
pub use statement::{
    FragmentStart, Ident, IdentRole, IdentSite, QualifiedRef, StatementHead, StatementKind,
};
pub use token::{Keyword, Parameter, Span, Token};
