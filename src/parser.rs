//! PDF object parser.
//!
//! Recursive descent over lexer tokens: primitives, arrays, dictionaries,
//! streams, indirect references and indirect object headers (`N G obj`).
//! All functions return nom's `IResult`; callers convert failures into
//! [`Error::ParseError`] with the byte offset they were reading at.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::error::{Error as NomError, ErrorKind};
use nom::IResult;

/// Arrays and dictionaries nested deeper than this are rejected.
const MAX_NESTING_DEPTH: u32 = 256;

fn fail<T>(input: &[u8], kind: ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(NomError::new(input, kind)))
}

/// Decode escape sequences in PDF literal strings.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` and line continuations.
///
/// ```
/// # use certseal::parser::decode_literal_string_escapes;
/// let decoded = decode_literal_string_escapes(b"Section \\247 71.01");
/// assert_eq!(decoded, b"Section \xa7 71.01");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        let escaped = raw[i + 1];
        i += 2;
        match escaped {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(8),
            b'f' => result.push(12),
            b'(' | b')' | b'\\' => result.push(escaped),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut octal = u32::from(escaped - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(d @ b'0'..=b'7') => {
                            octal = octal * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                result.push((octal & 0xFF) as u8);
            },
            // Unknown escape: the backslash is dropped
            other => result.push(other),
        }
    }

    result
}

/// Parse a PDF object from input bytes.
///
/// ```
/// use certseal::parser::parse_object;
///
/// let (_, obj) = parse_object(b"<< /ByteRange [0 10 20 30] >>").unwrap();
/// assert!(obj.as_dict().is_some());
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_nested(input, 0)
}

fn parse_nested(input: &[u8], depth: u32) -> IResult<&[u8], Object> {
    if depth >= MAX_NESTING_DEPTH {
        log::warn!("Object nesting exceeds {} levels", MAX_NESTING_DEPTH);
        return Err(nom::Err::Failure(NomError::new(input, ErrorKind::TooLarge)));
    }

    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),

        Token::Integer(i) => {
            // `N G R` is a reference; anything else leaves a plain integer.
            if let Ok((after_gen, Token::Integer(gen))) = token(input) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if let (Ok(id), Ok(gen)) = (u32::try_from(i), u16::try_from(gen)) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(id, gen))));
                    }
                }
            }
            Ok((input, Object::Integer(i)))
        },

        Token::Real(r) => Ok((input, Object::Real(r))),

        Token::LiteralString(bytes) => {
            Ok((input, Object::String(decode_literal_string_escapes(bytes))))
        },

        Token::HexString(hex_bytes) => match decode_hex(hex_bytes) {
            Ok(decoded) => Ok((input, Object::String(decoded))),
            Err(_) => Err(nom::Err::Failure(NomError::new(input, ErrorKind::HexDigit))),
        },

        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::ArrayStart => parse_array(input, depth + 1),

        Token::DictStart => {
            let (remaining, dict) = parse_dictionary(input, depth + 1)?;

            if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
                let (rest, data) = parse_stream_data(stream_input, &dict)?;
                return Ok((
                    rest,
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::from(data),
                    },
                ));
            }

            Ok((remaining, Object::Dictionary(dict)))
        },

        _ => fail(input, ErrorKind::Tag),
    }
}

/// Parse an indirect object definition: `N G obj <object> endobj`.
///
/// The trailing `endobj` is consumed when present.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    let (input, id) = match token(input)? {
        (rest, Token::Integer(id)) => (rest, id),
        (rest, _) => return fail(rest, ErrorKind::Digit),
    };
    let (input, gen) = match token(input)? {
        (rest, Token::Integer(gen)) => (rest, gen),
        (rest, _) => return fail(rest, ErrorKind::Digit),
    };
    let (input, _) = match token(input)? {
        (rest, Token::ObjStart) => (rest, ()),
        (rest, _) => return fail(rest, ErrorKind::Tag),
    };

    let (id, gen) = match (u32::try_from(id), u16::try_from(gen)) {
        (Ok(id), Ok(gen)) => (id, gen),
        _ => return fail(input, ErrorKind::Verify),
    };

    let (input, obj) = parse_object(input)?;
    let input = match token(input) {
        Ok((rest, Token::ObjEnd)) => rest,
        _ => input,
    };

    Ok((input, (ObjectRef::new(id, gen), obj)))
}

/// Parse stream data after the `stream` keyword.
///
/// Uses a direct `/Length`; an indirect or missing length falls back to
/// scanning for `endstream`.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], Vec<u8>> {
    let input = input
        .strip_prefix(b"\r\n")
        .or_else(|| input.strip_prefix(b"\n"))
        .or_else(|| input.strip_prefix(b"\r"))
        .unwrap_or(input);

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = usize::try_from(length).unwrap_or(usize::MAX);
        if length <= input.len() {
            let rest = &input[length..];
            if let Ok((after, Token::StreamEnd)) = token(rest) {
                return Ok((after, input[..length].to_vec()));
            }
        }
    }

    let keyword = b"endstream";
    match input.windows(keyword.len()).position(|w| w == keyword) {
        Some(pos) => {
            let data = &input[..pos];
            let data = data
                .strip_suffix(b"\r\n")
                .or_else(|| data.strip_suffix(b"\n"))
                .unwrap_or(data);
            Ok((&input[pos + keyword.len()..], data.to_vec()))
        },
        None => fail(input, ErrorKind::Eof),
    }
}

/// Parse a PDF array: `[ obj1 obj2 ... objN ]`
fn parse_array(input: &[u8], depth: u32) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(remaining) {
            return Ok((rest, Object::Array(objects)));
        }
        let (rest, obj) = parse_nested(remaining, depth)?;
        objects.push(obj);
        remaining = rest;
    }
}

/// Parse a PDF dictionary: `<< /Key1 value1 /Key2 value2 ... >>`
fn parse_dictionary(input: &[u8], depth: u32) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        match token(remaining)? {
            (rest, Token::DictEnd) => return Ok((rest, dict)),
            (rest, Token::Name(key)) => {
                let (rest, value) = parse_nested(rest, depth)?;
                dict.insert(key, value);
                remaining = rest;
            },
            _ => return fail(remaining, ErrorKind::Tag),
        }
    }
}

/// Decode a hex string to bytes.
///
/// Whitespace is ignored and an odd trailing digit is padded with 0.
///
/// ```
/// use certseal::parser::decode_hex;
///
/// assert_eq!(decode_hex(b"48656C6C6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"7").unwrap(), vec![0x70]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|&c| hex_value(c))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| Error::ParseError {
            offset: 0,
            reason: "invalid hex digit".to_string(),
        })?;

    Ok(digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect())
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Convert a nom failure into a crate error at `base_offset` within `data`.
pub(crate) fn to_parse_error(
    data: &[u8],
    base_offset: usize,
    err: nom::Err<NomError<&[u8]>>,
) -> Error {
    let offset = match &err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            base_offset + data.len().saturating_sub(e.input.len())
        },
        nom::Err::Incomplete(_) => base_offset + data.len(),
    };
    Error::ParseError {
        offset,
        reason: format!("{:?}", err.map(|e| e.code)),
    }
}
