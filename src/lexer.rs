//! PDF lexer (tokenizer).
//!
//! Splits PDF bytes into tokens: numbers, literal and hex strings, names,
//! delimiters and keywords. Bare keywords that have no dedicated token
//! (`xref`, `trailer`, `startxref`, the `n`/`f` markers of xref entries)
//! come out as [`Token::Keyword`] so the cross-reference reader can share
//! this tokenizer with the object parser.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    error::{Error as NomError, ErrorKind},
    sequence::{delimited, preceded},
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string bytes, escapes not yet decoded
    LiteralString(&'a [u8]),

    /// Hexadecimal string digits, whitespace preserved
    HexString(&'a [u8]),

    /// Name with `#XX` escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// Indirect object start keyword "obj"
    ObjStart,

    /// Indirect object end keyword "endobj"
    ObjEnd,

    /// Stream start keyword "stream"
    StreamStart,

    /// Stream end keyword "endstream"
    StreamEnd,

    /// Reference keyword "R" (used in "10 0 R")
    R,

    /// Any other bare keyword (e.g. `xref`, `trailer`, `n`, `f`)
    Keyword(&'a [u8]),
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn fail<T>(input: &[u8], kind: ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(NomError::new(input, kind)))
}

/// Skip all whitespace and comments.
pub(crate) fn skip_ws(input: &[u8]) -> &[u8] {
    let mut remaining = input;
    loop {
        let trimmed_len = remaining.iter().take_while(|&&c| is_whitespace(c)).count();
        remaining = &remaining[trimmed_len..];

        let comment: IResult<&[u8], ()> =
            value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(remaining);
        match comment {
            Ok((rest, _)) => remaining = rest,
            Err(_) => return remaining,
        }
    }
}

/// Parse an integer or real number.
///
/// Accepts a leading sign and reals starting or ending with a decimal point
/// (`.5`, `5.`).
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let start = input;
    let (input, _) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    // A lone sign or '.' is not a number.
    if int_part.is_none() && !matches!(frac_part, Some(Some(_))) {
        return fail(start, ErrorKind::Digit);
    }

    let consumed = &start[..start.len() - input.len()];
    let text = std::str::from_utf8(consumed)
        .map_err(|_| nom::Err::Error(NomError::new(start, ErrorKind::Digit)))?;

    if frac_part.is_some() {
        let num: f64 = text
            .parse()
            .map_err(|_| nom::Err::Error(NomError::new(start, ErrorKind::Float)))?;
        Ok((input, Token::Real(num)))
    } else {
        let num: i64 = text
            .trim_start_matches('+')
            .parse()
            .map_err(|_| nom::Err::Error(NomError::new(start, ErrorKind::Digit)))?;
        Ok((input, Token::Integer(num)))
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Balanced nested parentheses and backslash escapes are honoured while
/// scanning; the raw bytes are returned and decoded by the parser.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 || pos > remaining.len() {
        return fail(input, ErrorKind::Tag);
    }

    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// Parse a hexadecimal string enclosed in angle brackets.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return fail(input, ErrorKind::Tag);
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode #XX escape sequences in PDF names.
///
/// ```
/// # use certseal::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes("A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes("Type"), "Type");
/// assert_eq!(decode_name_escapes("A#"), "A#");
/// ```
pub fn decode_name_escapes(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'#' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Parse a name starting with /.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |bytes: &[u8]| {
            Token::Name(decode_name_escapes(&String::from_utf8_lossy(bytes)))
        }),
    )(input)
}

/// Parse delimiters and keywords with dedicated tokens.
///
/// Multi-character delimiters are tried before their single-character
/// prefixes (`<<` before `<`).
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, tok) = alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
    .or_else(|_: nom::Err<NomError<&[u8]>>| {
        let (rest, word) = take_while1(is_regular)(input)?;
        let tok = match word {
            b"true" => Token::True,
            b"false" => Token::False,
            b"null" => Token::Null,
            b"obj" => Token::ObjStart,
            b"endobj" => Token::ObjEnd,
            b"stream" => Token::StreamStart,
            b"endstream" => Token::StreamEnd,
            b"R" => Token::R,
            _ => return fail(input, ErrorKind::Tag),
        };
        Ok((rest, tok))
    })?;
    Ok((rest, tok))
}

/// Parse any other run of regular characters as a bare keyword.
fn parse_bare_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    match input.first() {
        Some(c) if c.is_ascii_alphabetic() => {
            map(take_while1(is_regular), Token::Keyword)(input)
        },
        _ => fail(input, ErrorKind::Alpha),
    }
}

/// Parse a single PDF token, skipping leading whitespace and comments.
///
/// # Errors
///
/// Returns `Err` if the input doesn't start with a valid token after
/// skipping whitespace.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
        parse_bare_keyword,
    ))(input)
}
