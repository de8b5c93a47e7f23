use nl2sql_core::database::DatabaseError;
use sqlparser::{
    dialect::MySqlDialect,
    tokenizer::{Token, Tokenizer},
};

/// Accept `sql` only when it holds exactly one statement.
///
/// Statements are separated at `;` tokens, so semicolons inside string
/// literals, quoted identifiers and comments do not count. A trailing
/// semicolon is allowed.
pub fn ensure_single(sql: &str) -> Result<(), DatabaseError> {
    let tokens = Tokenizer::new(&MySqlDialect {}, sql)
        .tokenize()
        .map_err(|err| DatabaseError::Rejected(format!("unreadable SQL: {err}")))?;

    let mut statements = 0usize;
    let mut in_statement = false;
    for token in tokens {
        match token {
            Token::Whitespace(_) | Token::EOF => {}
            Token::SemiColon => in_statement = false,
            _ if !in_statement => {
                statements += 1;
                in_statement = true;
                if statements > 1 {
                    return Err(DatabaseError::Rejected(
                        "only one SQL statement may be executed".into(),
                    ));
                }
            }
            _ => {}
        }
    }

    if statements == 0 {
        return Err(DatabaseError::Rejected("no SQL statement to execute".into()));
    }
    Ok(())
}
