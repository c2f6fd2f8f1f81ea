// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! SQL parsing. A thin wrapper over [`sqlparser`] re-exporting the AST
//! types the plan bridge consumes.

pub use sqlparser::ast::*;
use sqlparser::dialect::PostgreSqlDialect;
pub use sqlparser::parser::ParserError;
use sqlparser::parser::Parser;

/// Parse a SQL string into a list of statements.
pub fn parse(sql: &str) -> Result<Vec<Statement>, ParserError> {
    let dialect = PostgreSqlDialect {};
    Parser::parse_sql(&dialect, sql)
}
