use smallvec::SmallVec;
use std::convert::TryFrom;
use std::fmt::{self, Display};

const TOKEN_ENDERS: &str = ",;}) +-*/^&=><%";

const fn build_token_enders() -> [bool; 256] {
    let mut tbl = [false; 256];
    let bytes = TOKEN_ENDERS.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        tbl[bytes[i] as usize] = true;
        i += 1;
    }
    tbl
}
static TOKEN_ENDERS_TABLE: [bool; 256] = build_token_enders();

#[inline(always)]
fn is_token_ender(c: u8) -> bool {
    TOKEN_ENDERS_TABLE[c as usize]
}

static ERROR_CODES: &[&str] = &[
    "#NULL!",
    "#DIV/0!",
    "#VALUE!",
    "#REF!",
    "#NAME?",
    "#NUM!",
    "#N/A",
    "#GETTING_DATA",
    "#SPILL!",
    "#CALC!",
];

/// Tokenizer failure with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tokenizer error at byte {pos}: {message}")]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl TokenizerError {
    fn at(pos: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Literal,
    Operand,
    Func,
    Array,
    Paren,
    Sep,
    OpPrefix,
    OpInfix,
    OpPostfix,
    Whitespace,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The subtype of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubType {
    None,
    Text,
    Number,
    Logical,
    Error,
    Range,
    Open,
    Close,
    Arg,
    Row,
}

impl Display for TokenSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A token in an Excel formula, with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub subtype: TokenSubType,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} subtype: {:?} value: {}>",
            self.token_type, self.subtype, self.value
        )
    }
}

impl Token {
    fn from_slice(
        source: &str,
        token_type: TokenType,
        subtype: TokenSubType,
        start: usize,
        end: usize,
    ) -> Self {
        Token {
            value: source[start..end].to_string(),
            token_type,
            subtype,
            start,
            end,
        }
    }

    fn operand(source: &str, start: usize, end: usize) -> Self {
        let text = &source[start..end];
        let subtype = if text.starts_with('"') {
            TokenSubType::Text
        } else if text.starts_with('#') {
            TokenSubType::Error
        } else if text.eq_ignore_ascii_case("TRUE") || text.eq_ignore_ascii_case("FALSE") {
            TokenSubType::Logical
        } else if text.parse::<f64>().is_ok() {
            TokenSubType::Number
        } else {
            TokenSubType::Range
        };
        Token::from_slice(source, TokenType::Operand, subtype, start, end)
    }

    /// Opener or closer of a function call, array constant or parenthesised group.
    fn subexpression(source: &str, func: bool, start: usize, end: usize) -> Self {
        let last = source.as_bytes()[end - 1];
        let token_type = if func {
            TokenType::Func
        } else if last == b'{' || last == b'}' {
            TokenType::Array
        } else {
            TokenType::Paren
        };
        let subtype = if last == b')' || last == b'}' {
            TokenSubType::Close
        } else {
            TokenSubType::Open
        };
        Token::from_slice(source, token_type, subtype, start, end)
    }

    /// Function name for a `Func`/`Open` token, without the trailing `(`.
    pub fn function_name(&self) -> Option<&str> {
        if self.token_type == TokenType::Func && self.subtype == TokenSubType::Open {
            self.value.strip_suffix('(')
        } else {
            None
        }
    }

    /// True for operand tokens that name cells, ranges, tables or defined names.
    pub fn is_reference(&self) -> bool {
        self.token_type == TokenType::Operand && self.subtype == TokenSubType::Range
    }
}

/// A tokenizer for Excel worksheet formulas.
///
/// Text that does not start with `=` is kept as a single `Literal` token.
pub struct Tokenizer {
    formula: String,
    pub items: Vec<Token>,
    openers: SmallVec<[TokenType; 16]>,
    offset: usize,
    token_start: usize,
    token_end: usize,
}

impl Tokenizer {
    /// Create a new tokenizer and immediately tokenize the formula.
    pub fn new(formula: &str) -> Result<Self, TokenizerError> {
        let mut tokenizer = Tokenizer {
            formula: formula.to_string(),
            items: Vec::with_capacity(formula.len() / 2),
            openers: SmallVec::new(),
            offset: 0,
            token_start: 0,
            token_end: 0,
        };
        tokenizer.parse()?;
        Ok(tokenizer)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.items
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.items
    }

    #[inline]
    fn byte(&self, at: usize) -> Option<u8> {
        self.formula.as_bytes().get(at).copied()
    }

    #[inline]
    fn has_token(&self) -> bool {
        self.token_end > self.token_start
    }

    #[inline]
    fn start_token(&mut self) {
        self.token_start = self.offset;
        self.token_end = self.offset;
    }

    #[inline]
    fn extend_token(&mut self) {
        self.token_end = self.offset;
    }

    fn parse(&mut self) -> Result<(), TokenizerError> {
        if self.formula.is_empty() {
            return Ok(());
        }

        if self.byte(0) != Some(b'=') {
            self.items.push(Token::from_slice(
                &self.formula,
                TokenType::Literal,
                TokenSubType::None,
                0,
                self.formula.len(),
            ));
            return Ok(());
        }

        self.offset = 1;
        self.start_token();

        while let Some(curr) = self.byte(self.offset) {
            if self.consume_exponent_sign(curr) {
                continue;
            }

            if is_token_ender(curr) && self.has_token() {
                self.save_token();
                self.start_token();
            }

            match curr {
                b'"' | b'\'' => self.parse_string(curr)?,
                b'[' => self.parse_brackets()?,
                b'#' => self.parse_hash()?,
                b' ' | b'\n' | b'\r' | b'\t' => self.parse_whitespace(),
                b'+' | b'-' | b'*' | b'/' | b'^' | b'&' | b'=' | b'>' | b'<' | b'%' => {
                    self.parse_operator(curr)
                }
                b'{' | b'(' => self.parse_opener(curr),
                b')' | b'}' => self.parse_closer(curr)?,
                b';' | b',' => self.parse_separator(curr),
                _ => {
                    if !self.has_token() {
                        self.start_token();
                    }
                    self.offset += 1;
                    self.extend_token();
                }
            }
        }

        if self.has_token() {
            self.save_token();
        }

        if !self.openers.is_empty() {
            return Err(TokenizerError::at(
                self.offset,
                "unmatched opening parenthesis or brace",
            ));
        }
        Ok(())
    }

    /// Keep the sign of `1.5E+3` inside the number token.
    fn consume_exponent_sign(&mut self, curr: u8) -> bool {
        if (curr == b'+' || curr == b'-') && self.is_exponent_base() {
            self.offset += 1;
            self.extend_token();
            return true;
        }
        false
    }

    fn is_exponent_base(&self) -> bool {
        if !self.has_token() {
            return false;
        }
        let slice = &self.formula.as_bytes()[self.token_start..self.token_end];
        let Some((&last, head)) = slice.split_last() else {
            return false;
        };
        if !(last == b'E' || last == b'e') {
            return false;
        }
        let Some((&first, middle)) = head.split_first() else {
            return false;
        };
        if !first.is_ascii_digit() {
            return false;
        }
        let mut dot_seen = false;
        for &ch in middle {
            match ch {
                b'0'..=b'9' => {}
                b'.' if !dot_seen => dot_seen = true,
                _ => return false,
            }
        }
        true
    }

    fn save_token(&mut self) {
        if self.has_token() {
            let token = Token::operand(&self.formula, self.token_start, self.token_end);
            self.items.push(token);
        }
    }

    /// Double-quoted text becomes its own operand; single-quoted sheet names
    /// stay glued to the reference being accumulated.
    fn parse_string(&mut self, delim: u8) -> Result<(), TokenizerError> {
        let glued = delim == b'\''
            && self.has_token()
            && matches!(self.byte(self.token_end - 1), Some(b'$' | b':'));
        if !glued {
            self.save_token();
            self.start_token();
        }
        let string_start = self.token_start;
        self.offset += 1;

        while let Some(b) = self.byte(self.offset) {
            self.offset += 1;
            if b != delim {
                continue;
            }
            if self.byte(self.offset) == Some(delim) {
                self.offset += 1;
                continue;
            }
            if delim == b'"' {
                let token = Token::operand(&self.formula, string_start, self.offset);
                self.items.push(token);
                self.start_token();
            } else {
                self.token_end = self.offset;
            }
            return Ok(());
        }

        Err(TokenizerError::at(
            self.offset,
            "reached end of formula while parsing string",
        ))
    }

    /// Brackets belong to the current operand: `[Book.xlsx]Sheet1!A1`, `Table1[Col]`.
    fn parse_brackets(&mut self) -> Result<(), TokenizerError> {
        if !self.has_token() {
            self.start_token();
        }

        let mut depth = 1usize;
        self.offset += 1;
        while let Some(b) = self.byte(self.offset) {
            self.offset += 1;
            match b {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        self.extend_token();
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        Err(TokenizerError::at(self.offset, "encountered unmatched '['"))
    }

    /// `#` starts an error literal (`#N/A`) or, after a reference, marks a
    /// spilled range (`A1#`).
    fn parse_hash(&mut self) -> Result<(), TokenizerError> {
        let rest = &self.formula.as_bytes()[self.offset..];
        let matched = ERROR_CODES
            .iter()
            .find(|code| {
                rest.len() >= code.len() && rest[..code.len()].eq_ignore_ascii_case(code.as_bytes())
            })
            .map(|code| code.len());

        let after_sheet = self.has_token()
            && self.token_end > 0
            && self.byte(self.token_end - 1) == Some(b'!');

        match matched {
            Some(len) => {
                if self.has_token() && !after_sheet {
                    self.save_token();
                    self.start_token();
                }
                let start = if self.has_token() {
                    self.token_start
                } else {
                    self.offset
                };
                self.offset += len;
                let token = Token::operand(&self.formula, start, self.offset);
                self.items.push(token);
                self.start_token();
                Ok(())
            }
            None if self.has_token() && !after_sheet => {
                self.offset += 1;
                self.extend_token();
                Ok(())
            }
            None => Err(TokenizerError::at(
                self.offset,
                format!("invalid error code at byte {}", self.offset),
            )),
        }
    }

    fn parse_whitespace(&mut self) {
        self.save_token();

        let ws_start = self.offset;
        while matches!(self.byte(self.offset), Some(b' ' | b'\n' | b'\r' | b'\t')) {
            self.offset += 1;
        }

        self.items.push(Token::from_slice(
            &self.formula,
            TokenType::Whitespace,
            TokenSubType::None,
            ws_start,
            self.offset,
        ));
        self.start_token();
    }

    fn parse_operator(&mut self, curr: u8) {
        self.save_token();

        if let Some(next) = self.byte(self.offset + 1) {
            if matches!((curr, next), (b'>', b'=') | (b'<', b'=') | (b'<', b'>')) {
                self.items.push(Token::from_slice(
                    &self.formula,
                    TokenType::OpInfix,
                    TokenSubType::None,
                    self.offset,
                    self.offset + 2,
                ));
                self.offset += 2;
                self.start_token();
                return;
            }
        }

        let token_type = match curr {
            b'%' => TokenType::OpPostfix,
            b'+' | b'-' => {
                let prev = self
                    .items
                    .iter()
                    .rev()
                    .find(|t| t.token_type != TokenType::Whitespace);
                match prev {
                    Some(p)
                        if p.subtype == TokenSubType::Close
                            || p.token_type == TokenType::OpPostfix
                            || p.token_type == TokenType::Operand =>
                    {
                        TokenType::OpInfix
                    }
                    _ => TokenType::OpPrefix,
                }
            }
            _ => TokenType::OpInfix,
        };

        self.items.push(Token::from_slice(
            &self.formula,
            token_type,
            TokenSubType::None,
            self.offset,
            self.offset + 1,
        ));
        self.offset += 1;
        self.start_token();
    }

    fn parse_opener(&mut self, curr: u8) {
        let token = if curr == b'{' {
            self.save_token();
            Token::subexpression(&self.formula, false, self.offset, self.offset + 1)
        } else if self.has_token() {
            self.split_range_prefix();
            Token::subexpression(&self.formula, true, self.token_start, self.offset + 1)
        } else {
            Token::subexpression(&self.formula, false, self.offset, self.offset + 1)
        };

        self.openers.push(token.token_type);
        self.items.push(token);
        self.offset += 1;
        self.start_token();
    }

    /// In `A1:INDEX(` the accumulated text is a range operand, the `:`
    /// operator and a function name. Emit the first two and leave only the
    /// name in the current token.
    fn split_range_prefix(&mut self) {
        let text = &self.formula[self.token_start..self.token_end];
        let Some(colon) = text.rfind(':') else {
            return;
        };
        let name = &text[colon + 1..];
        if name.is_empty() || name.contains(['\'', '"', '[', ']', '!']) {
            return;
        }
        let colon_at = self.token_start + colon;
        if colon_at > self.token_start {
            let left = Token::operand(&self.formula, self.token_start, colon_at);
            self.items.push(left);
        }
        self.items.push(Token::from_slice(
            &self.formula,
            TokenType::OpInfix,
            TokenSubType::None,
            colon_at,
            colon_at + 1,
        ));
        self.token_start = colon_at + 1;
    }

    fn parse_closer(&mut self, curr: u8) -> Result<(), TokenizerError> {
        self.save_token();

        let Some(open) = self.openers.pop() else {
            return Err(TokenizerError::at(
                self.offset,
                format!("no matching opener for closer at byte {}", self.offset),
            ));
        };
        let brace_closer = curr == b'}';
        if brace_closer != (open == TokenType::Array) {
            return Err(TokenizerError::at(self.offset, "mismatched ( and { pair"));
        }

        self.items.push(Token::from_slice(
            &self.formula,
            open,
            TokenSubType::Close,
            self.offset,
            self.offset + 1,
        ));
        self.offset += 1;
        self.start_token();
        Ok(())
    }

    /// `,` separates arguments inside calls and arrays; elsewhere it is the
    /// union operator. `;` separates array rows.
    fn parse_separator(&mut self, curr: u8) {
        self.save_token();

        let (token_type, subtype) = if curr == b';' {
            (TokenType::Sep, TokenSubType::Row)
        } else {
            match self.openers.last() {
                Some(TokenType::Func | TokenType::Array) => (TokenType::Sep, TokenSubType::Arg),
                _ => (TokenType::OpInfix, TokenSubType::None),
            }
        };

        self.items.push(Token::from_slice(
            &self.formula,
            token_type,
            subtype,
            self.offset,
            self.offset + 1,
        ));
        self.offset += 1;
        self.start_token();
    }
}

impl TryFrom<&str> for Tokenizer {
    type Error = TokenizerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Tokenizer::new(value)
    }
}

impl TryFrom<String> for Tokenizer {
    type Error = TokenizerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Tokenizer::new(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(formula: &str) -> Vec<(TokenType, String)> {
        Tokenizer::new(formula)
            .unwrap()
            .items
            .into_iter()
            .map(|t| (t.token_type, t.value))
            .collect()
    }

    #[test]
    fn function_call_with_range_argument() {
        let toks = kinds("=SUM(A1:B3)");
        assert_eq!(
            toks,
            vec![
                (TokenType::Func, "SUM(".to_string()),
                (TokenType::Operand, "A1:B3".to_string()),
                (TokenType::Func, ")".to_string()),
            ]
        );
    }

    #[test]
    fn quoted_sheet_stays_with_reference() {
        let tokenizer = Tokenizer::new("='Q1 Sales'!B2*2").unwrap();
        let first = &tokenizer.items[0];
        assert_eq!(first.value, "'Q1 Sales'!B2");
        assert!(first.is_reference());
    }

    #[test]
    fn external_workbook_brackets_fold_into_operand() {
        let tokenizer = Tokenizer::new("=[Budget.xlsx]Plan!C4+1").unwrap();
        assert_eq!(tokenizer.items[0].value, "[Budget.xlsx]Plan!C4");
    }

    #[test]
    fn spill_reference_and_error_literal() {
        let tokenizer = Tokenizer::new("=IFERROR(SUM(A2#),#N/A)").unwrap();
        let values: Vec<&str> = tokenizer.items.iter().map(|t| t.value.as_str()).collect();
        assert!(values.contains(&"A2#"));
        let err = tokenizer
            .items
            .iter()
            .find(|t| t.value == "#N/A")
            .unwrap();
        assert_eq!(err.subtype, TokenSubType::Error);
    }

    #[test]
    fn scientific_notation_keeps_sign() {
        let toks = kinds("=1.5E+3-2");
        assert_eq!(toks[0], (TokenType::Operand, "1.5E+3".to_string()));
        assert_eq!(toks[1], (TokenType::OpInfix, "-".to_string()));
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(Tokenizer::new("=SUM(A1").is_err());
        assert!(Tokenizer::new("=A1+)").is_err());
        assert!(Tokenizer::new("=(1}").is_err());
        assert!(Tokenizer::new("=\"open").is_err());
        assert!(Tokenizer::new("=#BAD").is_err());
    }

    #[test]
    fn literal_text_is_one_token() {
        let literal = Tokenizer::new("just text").unwrap();
        assert_eq!(literal.items.len(), 1);
        assert_eq!(literal.items[0].token_type, TokenType::Literal);
        assert_eq!(literal.items[0].value, "just text");
    }

    #[test]
    fn range_operator_before_function_call_splits() {
        let toks = kinds("=A1:INDEX(B:B,3)");
        assert_eq!(
            toks,
            vec![
                (TokenType::Operand, "A1".to_string()),
                (TokenType::OpInfix, ":".to_string()),
                (TokenType::Func, "INDEX(".to_string()),
                (TokenType::Operand, "B:B".to_string()),
                (TokenType::Sep, ",".to_string()),
                (TokenType::Operand, "3".to_string()),
                (TokenType::Func, ")".to_string()),
            ]
        );
        let tokenizer = Tokenizer::new("=SUM(Data!B2:INDEX(Data!B:B,9))").unwrap();
        assert_eq!(tokenizer.items[1].value, "Data!B2");
        assert!(tokenizer.items[1].is_reference());
        assert_eq!(tokenizer.items[3].function_name(), Some("INDEX"));
    }

    #[test]
    fn function_name_strips_paren() {
        let tokenizer = Tokenizer::new("=_xlfn.XLOOKUP(A1,B:B,C:C)").unwrap();
        assert_eq!(tokenizer.items[0].function_name(), Some("_xlfn.XLOOKUP"));
    }
}
