//! Tokenizer for binding expressions.

use crate::errors::{ForgeError, ForgeResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    OptDot,
    Comma,
    Colon,
    Question,
    Nullish,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    AndAnd,
    OrOr,
    Arrow,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub offset: usize,
}

fn syntax(offset: usize, message: impl Into<String>) -> ForgeError {
    ForgeError::Syntax {
        offset,
        message: message.into(),
    }
}

/// Split an expression source into tokens. The last token is always `Tok::Eof`.
pub fn tokenize(src: &str) -> ForgeResult<Vec<Token>> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|(_, c)| *c);

    while i < chars.len() {
        let (off, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && peek(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            if matches!(peek(i), Some('e' | 'E')) {
                let sign = usize::from(matches!(peek(i + 1), Some('+' | '-')));
                if peek(i + 1 + sign).is_some_and(|d| d.is_ascii_digit()) {
                    i += 1 + sign;
                    while peek(i).is_some_and(|d| d.is_ascii_digit()) {
                        i += 1;
                    }
                }
            }
            let end = chars.get(i).map(|(o, _)| *o).unwrap_or(src.len());
            let text = &src[chars[start].0..end];
            let n: f64 = text
                .parse()
                .map_err(|_| syntax(off, format!("invalid number literal: {text}")))?;
            out.push(Token { tok: Tok::Num(n), offset: off });
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '$') {
                i += 1;
            }
            let end = chars.get(i).map(|(o, _)| *o).unwrap_or(src.len());
            out.push(Token {
                tok: Tok::Ident(src[chars[start].0..end].to_string()),
                offset: off,
            });
            continue;
        }

        if c == '"' || c == '\'' || c == '`' {
            let quote = c;
            i += 1;
            let mut s = String::new();
            loop {
                let Some(ch) = peek(i) else {
                    return Err(syntax(off, "unterminated string literal"));
                };
                i += 1;
                if ch == quote {
                    break;
                }
                if ch == '\\' {
                    let Some(esc) = peek(i) else {
                        return Err(syntax(off, "unterminated escape sequence"));
                    };
                    i += 1;
                    s.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                    continue;
                }
                s.push(ch);
            }
            out.push(Token { tok: Tok::Str(s), offset: off });
            continue;
        }

        let next = peek(i + 1);
        let next2 = peek(i + 2);
        let (tok, width) = match (c, next, next2) {
            ('=', Some('='), Some('=')) => (Tok::EqEqEq, 3),
            ('!', Some('='), Some('=')) => (Tok::NotEqEq, 3),
            ('=', Some('='), _) => (Tok::EqEq, 2),
            ('!', Some('='), _) => (Tok::NotEq, 2),
            ('=', Some('>'), _) => (Tok::Arrow, 2),
            ('<', Some('='), _) => (Tok::Le, 2),
            ('>', Some('='), _) => (Tok::Ge, 2),
            ('&', Some('&'), _) => (Tok::AndAnd, 2),
            ('|', Some('|'), _) => (Tok::OrOr, 2),
            ('?', Some('?'), _) => (Tok::Nullish, 2),
            ('?', Some('.'), n) if !n.is_some_and(|d| d.is_ascii_digit()) => (Tok::OptDot, 2),
            ('(', _, _) => (Tok::LParen, 1),
            (')', _, _) => (Tok::RParen, 1),
            ('[', _, _) => (Tok::LBracket, 1),
            (']', _, _) => (Tok::RBracket, 1),
            ('{', _, _) => (Tok::LBrace, 1),
            ('}', _, _) => (Tok::RBrace, 1),
            ('.', _, _) => (Tok::Dot, 1),
            (',', _, _) => (Tok::Comma, 1),
            (':', _, _) => (Tok::Colon, 1),
            ('?', _, _) => (Tok::Question, 1),
            ('!', _, _) => (Tok::Bang, 1),
            ('+', _, _) => (Tok::Plus, 1),
            ('-', _, _) => (Tok::Minus, 1),
            ('*', _, _) => (Tok::Star, 1),
            ('/', _, _) => (Tok::Slash, 1),
            ('%', _, _) => (Tok::Percent, 1),
            ('<', _, _) => (Tok::Lt, 1),
            ('>', _, _) => (Tok::Gt, 1),
            ('=', _, _) => return Err(syntax(off, "assignment is not allowed in expressions")),
            _ => return Err(syntax(off, format!("unexpected character '{c}'"))),
        };
        out.push(Token { tok, offset: off });
        i += width;
    }

    out.push(Token {
        tok: Tok::Eof,
        offset: src.len(),
    });
    Ok(out)
}
