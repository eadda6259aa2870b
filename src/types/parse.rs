use crate::errors::SignatureParseError;
use crate::types::{ANY, ArgKind, Argument, ELLIPSIS, NONE, OPTIONAL, Signature, TypeExpression};

/// Generic parameters nested deeper than this are replaced by `Unknown`.
pub const MAX_TYPE_DEPTH: usize = 8;

/// One parsed `(t1, *t2, **t3) -> tr` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedComment {
    pub args: Vec<Argument>,
    pub return_type: TypeExpression,
}

pub fn parse_type_comment(input: &str) -> Result<ParsedComment, SignatureParseError> {
    let mut reader = Reader::new(input)?;
    reader.expect(&Token::LParen)?;
    let mut args = Vec::new();
    if reader.peek() != &Token::RParen {
        loop {
            args.push(reader.argument()?);
            if reader.peek() == &Token::Comma {
                reader.advance();
                continue;
            }
            break;
        }
    }
    reader.expect(&Token::RParen)?;
    reader.expect(&Token::Arrow)?;
    let return_type = reader.type_expression(0)?;
    reader.expect(&Token::End)?;
    Ok(ParsedComment { args, return_type })
}

impl From<ParsedComment> for Signature {
    /// Takes the comment as written, without the merge-time simplifications.
    fn from(parsed: ParsedComment) -> Self {
        Signature {
            args: parsed.args,
            return_type: parsed.return_type,
        }
    }
}

pub fn parse_type(input: &str) -> Result<TypeExpression, SignatureParseError> {
    let mut reader = Reader::new(input)?;
    let ty = reader.type_expression(0)?;
    reader.expect(&Token::End)?;
    Ok(ty)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Star,
    DoubleStar,
    Arrow,
    Ellipsis,
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Name(name) => format!("name `{name}`"),
            Token::LBracket => "`[`".to_string(),
            Token::RBracket => "`]`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::DoubleStar => "`**`".to_string(),
            Token::Arrow => "`->`".to_string(),
            Token::Ellipsis => "`...`".to_string(),
            Token::End => "end of input".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, SignatureParseError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let ch = bytes[pos];
        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;
        let token = match ch {
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b',' => Token::Comma,
            b'*' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 1;
                Token::DoubleStar
            }
            b'*' => Token::Star,
            b'-' if bytes.get(pos + 1) == Some(&b'>') => {
                pos += 1;
                Token::Arrow
            }
            b'.' if input[pos..].starts_with("...") => {
                pos += 2;
                Token::Ellipsis
            }
            ch if ch.is_ascii_alphabetic() || ch == b'_' => {
                let mut end = pos;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_' || bytes[end] == b'.')
                {
                    end += 1;
                }
                let name = &input[pos..end];
                if name.ends_with('.') || name.contains("..") {
                    return Err(error(input, start, format!("malformed dotted name `{name}`")));
                }
                pos = end - 1;
                Token::Name(name.to_string())
            }
            _ => {
                let found = input[pos..].chars().next().unwrap_or('?');
                return Err(error(input, start, format!("unexpected character `{found}`")));
            }
        };
        pos += 1;
        tokens.push((token, start));
    }
    tokens.push((Token::End, input.len()));
    Ok(tokens)
}

struct Reader<'a> {
    input: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Result<Self, SignatureParseError> {
        Ok(Self {
            input,
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), SignatureParseError> {
        if self.peek() == expected {
            self.advance();
            return Ok(());
        }
        Err(self.unexpected(&expected.describe()))
    }

    fn unexpected(&self, wanted: &str) -> SignatureParseError {
        error(
            self.input,
            self.offset(),
            format!("expected {wanted}, found {}", self.peek().describe()),
        )
    }

    fn argument(&mut self) -> Result<Argument, SignatureParseError> {
        let kind = match self.peek() {
            Token::Star => {
                self.advance();
                ArgKind::Star
            }
            Token::DoubleStar => {
                self.advance();
                ArgKind::DoubleStar
            }
            _ => ArgKind::Positional,
        };
        let ty = self.type_expression(0)?;
        Ok(Argument::new(ty, kind))
    }

    fn type_expression(&mut self, depth: usize) -> Result<TypeExpression, SignatureParseError> {
        let name = match self.peek().clone() {
            Token::Name(name) => {
                self.advance();
                name
            }
            Token::Ellipsis => {
                self.advance();
                return Ok(TypeExpression::atomic(ELLIPSIS));
            }
            _ => return Err(self.unexpected("a type")),
        };
        if self.peek() != &Token::LBracket {
            return Ok(match name.as_str() {
                ANY => TypeExpression::Unknown,
                NONE => TypeExpression::none(),
                _ => TypeExpression::Atomic(name),
            });
        }
        self.advance();
        if depth + 1 > MAX_TYPE_DEPTH {
            self.skip_brackets()?;
            return Ok(TypeExpression::Unknown);
        }
        let params = self.parameters(&name, depth + 1)?;
        self.expect(&Token::RBracket)?;
        Ok(match name.as_str() {
            "Union" => TypeExpression::union_of(params),
            OPTIONAL if params.len() == 1 => {
                TypeExpression::optional(params.into_iter().next().unwrap_or(TypeExpression::Unknown))
            }
            _ => TypeExpression::Parameterized(name, params),
        })
    }

    /// Consumes tokens up to the `]` matching an already consumed `[`.
    fn skip_brackets(&mut self) -> Result<(), SignatureParseError> {
        let mut open = 1usize;
        while open > 0 {
            match self.advance() {
                Token::LBracket => open += 1,
                Token::RBracket => open -= 1,
                Token::End => return Err(self.unexpected("`]`")),
                _ => {}
            }
        }
        Ok(())
    }

    fn parameters(
        &mut self,
        name: &str,
        depth: usize,
    ) -> Result<Vec<TypeExpression>, SignatureParseError> {
        // `Tuple[()]` spells the empty tuple.
        if name == "Tuple" && self.peek() == &Token::LParen {
            self.advance();
            self.expect(&Token::RParen)?;
            return Ok(Vec::new());
        }
        let mut params = vec![self.type_expression(depth)?];
        while self.peek() == &Token::Comma {
            self.advance();
            params.push(self.type_expression(depth)?);
        }
        Ok(params)
    }
}

fn error(input: &str, offset: usize, message: String) -> SignatureParseError {
    SignatureParseError {
        input: input.to_string(),
        offset,
        message,
    }
}
