//! Tokenizer for the DBML source language

use crate::error::{Span, SyntaxError};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare word: `[A-Za-z0-9_]+` that is not a number
    Ident(String),
    /// `"..."`
    QuotedIdent(String),
    /// `'...'` or `'''...'''`, escapes already processed
    Str(String),
    /// `` `...` ``
    Expr(String),
    /// Integer or decimal literal, kept as written
    Number(String),
    /// `#RRGGBB`
    Color(String),
    /// `// ...` or `/* ... */`, trimmed
    Comment(String),

    LBrace,   // {
    RBrace,   // }
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Colon,    // :
    Dot,      // .
    Gt,       // >
    Lt,       // <
    LtGt,     // <>
    Dash,     // -

    Eof,
}

impl Token {
    /// Short human-readable form for error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{}'", s),
            Token::QuotedIdent(s) => format!("\"{}\"", s),
            Token::Str(_) => "string".to_string(),
            Token::Expr(_) => "expression".to_string(),
            Token::Number(n) => format!("number {}", n),
            Token::Color(c) => format!("color {}", c),
            Token::Comment(_) => "comment".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::LtGt => "'<>'".to_string(),
            Token::Dash => "'-'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// Token with its location and whether a line break separates it from the
/// previous token.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
    pub newline_before: bool,
}

pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    saw_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            saw_newline: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn mark(&self) -> (usize, usize, usize) {
        (self.pos, self.line, self.column)
    }

    fn span_from(&self, (offset, line, column): (usize, usize, usize)) -> Span {
        Span::new(offset, self.pos - offset, line, column)
    }

    fn error(&self, message: impl Into<String>, span: Span) -> SyntaxError {
        SyntaxError::new(message, span, self.source)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            if c == '\n' {
                self.saw_newline = true;
            }
            self.bump();
        }
    }

    fn read_line_comment(&mut self) -> String {
        // leading "//"
        self.bump();
        self.bump();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
        self.source[start..self.pos].trim().to_string()
    }

    fn read_block_comment(&mut self, mark: (usize, usize, usize)) -> Result<String, SyntaxError> {
        // leading "/*"
        self.bump();
        self.bump();
        let start = self.pos;
        loop {
            if self.rest().starts_with("*/") {
                let text = &self.source[start..self.pos];
                self.bump();
                self.bump();
                let lines: Vec<&str> = text.lines().map(str::trim).collect();
                return Ok(lines.join("\n").trim().to_string());
            }
            if self.bump().is_none() {
                return Err(self.error("unterminated block comment", self.span_from(mark)));
            }
        }
    }

    /// Body of a quoted run after the opening delimiter. `\` escapes the
    /// delimiter and itself; `\` before a line break joins the two lines.
    fn read_quoted(
        &mut self,
        delimiter: &str,
        allow_newlines: bool,
        mark: (usize, usize, usize),
    ) -> Result<String, SyntaxError> {
        let quote = delimiter.chars().next().unwrap_or('\'');
        let mut s = String::new();
        loop {
            if self.rest().starts_with(delimiter) {
                for _ in delimiter.chars() {
                    self.bump();
                }
                return Ok(s);
            }
            match self.bump() {
                Some('\\') => match self.peek() {
                    Some('\n') => {
                        self.bump();
                    }
                    Some('\r') if self.peek_second() == Some('\n') => {
                        self.bump();
                        self.bump();
                    }
                    Some(c) if c == quote || c == '\\' => {
                        self.bump();
                        s.push(c);
                    }
                    _ => s.push('\\'),
                },
                Some('\n') if !allow_newlines => {
                    return Err(self.error("unterminated string", self.span_from(mark)));
                }
                Some(c) => s.push(c),
                None => return Err(self.error("unterminated string", self.span_from(mark))),
            }
        }
    }

    fn read_backtick(&mut self, mark: (usize, usize, usize)) -> Result<String, SyntaxError> {
        self.bump();
        let start = self.pos;
        loop {
            match self.peek() {
                Some('`') => {
                    let text = self.source[start..self.pos].to_string();
                    self.bump();
                    return Ok(text);
                }
                Some(_) => {
                    self.bump();
                }
                None => {
                    return Err(self.error("unterminated expression", self.span_from(mark)));
                }
            }
        }
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.source[start..self.pos];
        if !word.bytes().all(|b| b.is_ascii_digit()) {
            return Token::Ident(word.to_string());
        }
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        Token::Number(self.source[start..self.pos].to_string())
    }

    pub fn next_token(&mut self) -> Result<Spanned, SyntaxError> {
        self.skip_whitespace();
        let newline_before = std::mem::take(&mut self.saw_newline);
        let mark = self.mark();

        let c = match self.peek() {
            Some(c) => c,
            None => {
                return Ok(Spanned {
                    token: Token::Eof,
                    span: self.span_from(mark),
                    newline_before,
                })
            }
        };

        let token = match c {
            '/' if self.peek_second() == Some('/') => Token::Comment(self.read_line_comment()),
            '/' if self.peek_second() == Some('*') => Token::Comment(self.read_block_comment(mark)?),
            '\'' if self.rest().starts_with("'''") => {
                for _ in 0..3 {
                    self.bump();
                }
                let raw = self.read_quoted("'''", true, mark)?;
                Token::Str(normalize_multiline(&raw))
            }
            '\'' => {
                self.bump();
                Token::Str(self.read_quoted("'", false, mark)?)
            }
            '"' => {
                self.bump();
                Token::QuotedIdent(self.read_quoted("\"", false, mark)?)
            }
            '`' => Token::Expr(self.read_backtick(mark)?),
            '#' => {
                self.bump();
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
                    self.bump();
                }
                if self.pos == start {
                    return Err(self.error("expected color after '#'", self.span_from(mark)));
                }
                Token::Color(self.source[mark.0..self.pos].to_string())
            }
            '<' if self.peek_second() == Some('>') => {
                self.bump();
                self.bump();
                Token::LtGt
            }
            c if c.is_ascii_alphanumeric() || c == '_' => self.read_word(),
            _ => {
                self.bump();
                match c {
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    ':' => Token::Colon,
                    '.' => Token::Dot,
                    '>' => Token::Gt,
                    '<' => Token::Lt,
                    '-' => Token::Dash,
                    _ => {
                        return Err(self.error(
                            format!("unexpected character '{}'", c),
                            self.span_from(mark),
                        ))
                    }
                }
            }
        };

        Ok(Spanned {
            token,
            span: self.span_from(mark),
            newline_before,
        })
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.token == Token::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

/// Triple-quoted text: drop the line break after the opening quotes, then
/// strip the indentation shared by the non-blank lines. Closing quotes on a
/// line of their own drop that line, and its indentation caps the strip.
fn normalize_multiline(raw: &str) -> String {
    let indentation = |line: &str| line.len() - line.trim_start_matches([' ', '\t']).len();

    let mut lines: Vec<&str> = raw.split('\n').collect();
    if lines.len() > 1 && lines[0].trim().is_empty() {
        lines.remove(0);
    }
    let closing = match lines.last() {
        Some(last) if lines.len() > 1 && last.trim().is_empty() => lines.pop(),
        _ => None,
    };

    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .chain(closing.iter())
        .map(|l| indentation(l))
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| {
            if indentation(l) >= common {
                &l[common..]
            } else {
                ""
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            tokens("Table users { }"),
            vec![
                Token::Ident("Table".into()),
                Token::Ident("users".into()),
                Token::LBrace,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_relation_symbols() {
        assert_eq!(
            tokens("> < - <>"),
            vec![Token::Gt, Token::Lt, Token::Dash, Token::LtGt, Token::Eof]
        );
    }

    #[test]
    fn test_numbers_and_words() {
        assert_eq!(
            tokens("42 4.99 2fa t.1"),
            vec![
                Token::Number("42".into()),
                Token::Number("4.99".into()),
                Token::Ident("2fa".into()),
                Token::Ident("t".into()),
                Token::Dot,
                Token::Number("1".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            tokens(r#"'it\'s' "quoted \"id\"" `now()` #3498DB"#),
            vec![
                Token::Str("it's".into()),
                Token::QuotedIdent("quoted \"id\"".into()),
                Token::Expr("now()".into()),
                Token::Color("#3498DB".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_unknown_escape_is_kept() {
        assert_eq!(
            tokens(r"'a\tb'"),
            vec![Token::Str(r"a\tb".into()), Token::Eof]
        );
    }

    #[test]
    fn test_triple_quoted_string_is_dedented() {
        let input = "'''\n    first line\n      indented\n    last\n    '''";
        assert_eq!(
            tokens(input),
            vec![
                Token::Str("first line\n  indented\nlast".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_closing_quotes_bound_the_dedent() {
        let input = "'''\n      indented\n      block\n    '''";
        assert_eq!(
            tokens(input),
            vec![Token::Str("  indented\n  block".into()), Token::Eof]
        );

        // a blank line before the closing line survives
        let input = "'''\n    line\n\n    '''";
        assert_eq!(tokens(input), vec![Token::Str("line\n".into()), Token::Eof]);

        // only the first line break after the opening quotes is dropped
        let input = "'''\n\nline\n'''";
        assert_eq!(tokens(input), vec![Token::Str("\nline".into()), Token::Eof]);

        // closing quotes after text leave the common indentation in charge
        let input = "'''\n    gross\n    amount'''";
        assert_eq!(tokens(input), vec![Token::Str("gross\namount".into()), Token::Eof]);
    }

    #[test]
    fn test_line_continuation_in_triple_quoted_string() {
        let input = "'''one \\\ntwo'''";
        assert_eq!(tokens(input), vec![Token::Str("one two".into()), Token::Eof]);
    }

    #[test]
    fn test_comments_are_tokens() {
        let input = "// leading\nTable /* inline */ t";
        assert_eq!(
            tokens(input),
            vec![
                Token::Comment("leading".into()),
                Token::Ident("Table".into()),
                Token::Comment("inline".into()),
                Token::Ident("t".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_tracking() {
        let spanned = Lexer::new("a b\nc").tokenize().unwrap();
        assert!(!spanned[1].newline_before);
        assert!(spanned[2].newline_before);
        assert_eq!(spanned[2].span.line, 2);
        assert_eq!(spanned[2].span.column, 1);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("'abc").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated string"));
        assert_eq!(err.span.line, 1);
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("Table t { id int ; }").tokenize().unwrap_err();
        assert_eq!(err.message, "unexpected character ';'");
        assert_eq!(err.span.column, 18);
    }
}
