use thiserror::Error;

use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexerState {
    LineBegin,
    InLine,
    EndOfInput,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unterminated string literal at position {position}")]
    UnterminatedString { position: usize },
    #[error("Invalid integer literal '{literal}' at position {position}")]
    InvalidIntegerLiteral { literal: String, position: usize },
}

pub type LexResult<T> = Result<T, LexError>;

/// Streaming lexer over Mython source text.
///
/// One indentation unit is two spaces. At the start of each logical line the
/// lexer compares the line's indentation with the depth currently in effect
/// and emits one `Indent` or `Dedent` per call until they agree; only then do
/// content tokens of that line appear. Blank lines and comment-only lines are
/// invisible, consecutive newlines collapse into a single `Newline`, and the
/// stream always ends with any pending `Dedent`s followed by `Eof` forever.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line_indent: usize,
    current_indent: usize,
    pending_tokens: Vec<Token>,
    state: LexerState,
    last_was_newline: bool,
    current: Token,
}

impl<'a> Lexer<'a> {
    /// Reads the first real token, so `current_token` is valid immediately.
    pub fn new(input: &'a str) -> LexResult<Self> {
        let mut lexer = Self {
            input,
            pos: 0,
            line_indent: 0,
            current_indent: 0,
            pending_tokens: Vec::new(),
            state: LexerState::LineBegin,
            last_was_newline: true,
            current: Token::Eof,
        };
        lexer.current = lexer.next_token()?;
        Ok(lexer)
    }

    pub fn current_token(&self) -> &Token {
        &self.current
    }

    /// Consumes the current token and returns the next one.
    pub fn advance(&mut self) -> LexResult<&Token> {
        self.current = self.next_token()?;
        Ok(&self.current)
    }

    fn next_token(&mut self) -> LexResult<Token> {
        loop {
            // Queued indentation tokens go out one at a time before anything else.
            if let Some(token) = self.pending_tokens.pop() {
                return Ok(self.emit(token));
            }

            match self.state {
                LexerState::LineBegin => {
                    let spaces = self.consume_while(|c| c == ' ');
                    match self.peek_char() {
                        None => {
                            self.state = LexerState::EndOfInput;
                        }
                        Some('\n') => {
                            // Blank line: invisible, no indentation change.
                            self.consume_char();
                        }
                        Some('#') => {
                            // Comment-only line: swallow it and its newline.
                            self.skip_comment();
                            if self.peek_char() == Some('\n') {
                                self.consume_char();
                            }
                        }
                        Some(_) => {
                            self.line_indent = spaces / 2;
                            while self.line_indent > self.current_indent {
                                self.current_indent += 1;
                                self.pending_tokens.push(Token::Indent);
                            }
                            while self.line_indent < self.current_indent {
                                self.current_indent -= 1;
                                self.pending_tokens.push(Token::Dedent);
                            }
                            self.state = LexerState::InLine;
                        }
                    }
                }
                LexerState::InLine => {
                    self.consume_while(|c| c == ' ');
                    match self.peek_char() {
                        None => {
                            self.state = LexerState::EndOfInput;
                            if !self.last_was_newline {
                                return Ok(self.emit(Token::Newline));
                            }
                        }
                        Some('\n') => {
                            self.consume_char();
                            self.state = LexerState::LineBegin;
                            return Ok(self.emit(Token::Newline));
                        }
                        Some('#') => {
                            // Trailing comment; the newline after it is emitted normally.
                            self.skip_comment();
                        }
                        Some(c) => {
                            let token = self.read_token(c)?;
                            return Ok(self.emit(token));
                        }
                    }
                }
                LexerState::EndOfInput => {
                    if self.current_indent > 0 {
                        self.current_indent -= 1;
                        return Ok(Token::Dedent);
                    }
                    return Ok(Token::Eof);
                }
            }
        }
    }

    fn emit(&mut self, token: Token) -> Token {
        self.last_was_newline = matches!(token, Token::Newline);
        token
    }

    fn read_token(&mut self, first: char) -> LexResult<Token> {
        if first.is_ascii_digit() {
            return self.read_number();
        }
        if first == '"' || first == '\'' {
            return self.read_string(first);
        }
        if first.is_alphabetic() || first == '_' {
            return Ok(self.read_identifier());
        }
        Ok(self.read_symbol(first))
    }

    fn read_number(&mut self) -> LexResult<Token> {
        let start = self.pos;
        self.consume_while(|c| c.is_ascii_digit());
        let literal = &self.input[start..self.pos];
        let value = literal
            .parse::<i64>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                position: start,
            })?;
        Ok(Token::Number(value))
    }

    fn read_string(&mut self, delimiter: char) -> LexResult<Token> {
        let start = self.pos;
        self.consume_char();
        let mut text = String::new();
        loop {
            let c = self
                .consume_char()
                .ok_or(LexError::UnterminatedString { position: start })?;
            if c == delimiter {
                return Ok(Token::String(text));
            }
            if c != '\\' {
                text.push(c);
                continue;
            }
            let escaped = self
                .consume_char()
                .ok_or(LexError::UnterminatedString { position: start })?;
            match escaped {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                // Unknown escapes drop the backslash and keep the character.
                other => text.push(other),
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.pos;
        self.consume_while(|c| c.is_alphanumeric() || c == '_');
        match &self.input[start..self.pos] {
            "class" => Token::Class,
            "return" => Token::Return,
            "if" => Token::If,
            "else" => Token::Else,
            "def" => Token::Def,
            "print" => Token::Print,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "None" => Token::None,
            "True" => Token::True,
            "False" => Token::False,
            ident => Token::Id(ident.to_string()),
        }
    }

    fn read_symbol(&mut self, first: char) -> Token {
        self.consume_char();
        let compound = match (first, self.peek_char()) {
            ('=', Some('=')) => Some(Token::Eq),
            ('!', Some('=')) => Some(Token::NotEq),
            ('<', Some('=')) => Some(Token::LessOrEq),
            ('>', Some('=')) => Some(Token::GreaterOrEq),
            _ => None,
        };
        if let Some(token) = compound {
            self.consume_char();
            return token;
        }
        Token::Char(first)
    }

    fn skip_comment(&mut self) {
        self.consume_while(|c| c != '\n');
    }

    fn consume_while<P>(&mut self, keep_predicate: P) -> usize
    where
        P: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !keep_predicate(c) {
                break;
            }
            self.consume_char();
        }
        self.pos - start
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}

/// Drains a `Lexer` into the full token vector, `Eof` included.
pub fn tokenize(input: &str) -> LexResult<Vec<Token>> {
    let mut lexer = Lexer::new(input)?;
    let mut tokens = vec![lexer.current_token().clone()];
    while !matches!(tokens.last(), Some(Token::Eof)) {
        tokens.push(lexer.advance()?.clone());
    }
    Ok(tokens)
}
