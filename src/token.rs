/// Lexical tokens, including the synthetic `Newline`/`Indent`/`Dedent`
/// markers that encode line structure and indentation depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Number(i64),
    String(String),
    Id(String),
    /// Any byte that is not part of a longer token.
    Char(char),

    // Keywords
    Class,
    Return,
    If,
    Else,
    Def,
    Print,
    And,
    Or,
    Not,
    None,
    True,
    False,

    // Two-character operators
    Eq,          // ==
    NotEq,       // !=
    LessOrEq,    // <=
    GreaterOrEq, // >=

    // Structural
    Newline,
    Indent,
    Dedent,
    Eof,
}
