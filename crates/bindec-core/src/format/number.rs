//! Number patterns with replacement fields.
//!
//! A pattern is literal text with replacement fields, e.g. `0x{:08x}` or
//! `{:+11d}`. The grammar inside a field is
//! `[[fill]align][sign][z][#][0][width][grouping][.precision][type]`, with the
//! usual meaning of each part. Doubled braces produce literal braces.

use crate::error::{Error, Result};

/// Which values a pattern will be applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberClass {
    /// Signed or unsigned integers
    Integer,
    /// IEEE-754 floats
    Float,
}

/// A value to render
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed integer
    Signed(i128),
    /// Unsigned integer
    Unsigned(u128),
    /// Floating point
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    AfterSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Minus,
    Plus,
    Space,
}

#[derive(Debug, Clone, PartialEq)]
struct Spec {
    fill: char,
    align: Option<Align>,
    sign: Sign,
    alternate: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    ty: Option<char>,
}

impl Default for Spec {
    fn default() -> Self {
        Self {
            fill: ' ',
            align: None,
            sign: Sign::Minus,
            alternate: false,
            width: 0,
            grouping: None,
            precision: None,
            ty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(String),
    Field(Spec),
}

/// A validated number pattern
#[derive(Debug, Clone, PartialEq)]
pub struct NumberFormat {
    source: String,
    pieces: Vec<Piece>,
}

impl NumberFormat {
    /// Parses `source`, checking every replacement field against `class`
    pub fn parse(source: &str, class: NumberClass) -> Result<Self> {
        let pieces = parse_pieces(source)?;
        for piece in &pieces {
            if let Piece::Field(spec) = piece {
                check_spec(spec, class).map_err(|msg| invalid(source, msg))?;
            }
        }
        Ok(Self {
            source: source.to_string(),
            pieces,
        })
    }

    /// Pattern as written in the schema
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders `value` into `out`
    pub fn render_into(&self, value: Number, out: &mut String) {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Field(spec) => render_field(spec, value, out),
            }
        }
    }

    /// Renders `value` into a new string
    pub fn render(&self, value: Number) -> String {
        let mut out = String::new();
        self.render_into(value, &mut out);
        out
    }
}

fn invalid(source: &str, msg: impl std::fmt::Display) -> Error {
    Error::evaluation(format!("invalid format \"{}\": {}", source, msg))
}

fn parse_pieces(source: &str) -> Result<Vec<Piece>> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(invalid(source, "single '}' encountered")),
            '{' => {
                let mut body = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => return Err(invalid(source, "nested fields are not supported")),
                        Some(c) => body.push(c),
                        None => return Err(invalid(source, "unterminated '{'")),
                    }
                }
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                let (name, spec) = body.split_once(':').unwrap_or((body.as_str(), ""));
                if !(name.is_empty() || name == "0") {
                    return Err(invalid(
                        source,
                        format!("field reference \"{}\" is not supported", name),
                    ));
                }
                pieces.push(Piece::Field(parse_spec(spec).map_err(|m| invalid(source, m))?));
            }
            c => literal.push(c),
        }
    }

    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

fn parse_spec(text: &str) -> std::result::Result<Spec, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut spec = Spec::default();
    let mut i = 0;

    if chars.len() >= 2 && align_of(chars[1]).is_some() {
        spec.fill = chars[0];
        spec.align = align_of(chars[1]);
        i = 2;
    } else if let Some(align) = chars.first().and_then(|c| align_of(*c)) {
        spec.align = Some(align);
        i = 1;
    }

    let sign = match chars.get(i) {
        Some('+') => Some(Sign::Plus),
        Some('-') => Some(Sign::Minus),
        Some(' ') => Some(Sign::Space),
        _ => None,
    };
    if let Some(sign) = sign {
        spec.sign = sign;
        i += 1;
    }

    if chars.get(i) == Some(&'z') {
        i += 1;
    }
    if chars.get(i) == Some(&'#') {
        spec.alternate = true;
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        if spec.align.is_none() {
            spec.fill = '0';
            spec.align = Some(Align::AfterSign);
        }
        i += 1;
    }

    let start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i > start {
        let digits: String = chars[start..i].iter().collect();
        spec.width = digits.parse().map_err(|_| "width too large".to_string())?;
    }

    if let Some(&c) = chars.get(i) {
        if c == ',' || c == '_' {
            spec.grouping = Some(c);
            i += 1;
        }
    }

    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == start {
            return Err("format specifier missing precision".to_string());
        }
        let digits: String = chars[start..i].iter().collect();
        spec.precision = Some(digits.parse().map_err(|_| "precision too large".to_string())?);
    }

    if let Some(&c) = chars.get(i) {
        spec.ty = Some(c);
        i += 1;
    }
    if i != chars.len() {
        return Err(format!("invalid format specifier \"{}\"", text));
    }
    Ok(spec)
}

fn check_spec(spec: &Spec, class: NumberClass) -> std::result::Result<(), String> {
    const FLOAT_TYPES: &str = "eEfFgGn%";
    const INT_TYPES: &str = "bcdoxXn";

    match (spec.ty, class) {
        (None, _) => {}
        (Some(t), NumberClass::Integer) if INT_TYPES.contains(t) || FLOAT_TYPES.contains(t) => {}
        (Some(t), NumberClass::Float) if FLOAT_TYPES.contains(t) => {}
        (Some(t), NumberClass::Integer) => {
            return Err(format!("unknown format code '{}' for integer values", t))
        }
        (Some(t), NumberClass::Float) => {
            return Err(format!("unknown format code '{}' for float values", t))
        }
    }

    let int_presentation = match spec.ty {
        None | Some('n') => class == NumberClass::Integer,
        Some(t) => "bcdoxX".contains(t),
    };
    if int_presentation && spec.precision.is_some() {
        return Err("precision not allowed in integer format specifier".to_string());
    }
    if spec.grouping == Some(',') && matches!(spec.ty, Some('b' | 'o' | 'x' | 'X' | 'c' | 'n')) {
        return Err("cannot use ',' with this format code".to_string());
    }
    if spec.ty == Some('c') && (spec.sign != Sign::Minus || spec.alternate) {
        return Err("sign and alternate form not allowed with 'c'".to_string());
    }
    Ok(())
}

fn render_field(spec: &Spec, value: Number, out: &mut String) {
    let float_type = spec.ty.is_some_and(|t| "eEfFgG%".contains(t));
    let (negative, body) = match value {
        Number::Float(v) => float_body(spec, v),
        Number::Signed(v) if float_type => float_body(spec, v as f64),
        Number::Unsigned(v) if float_type => float_body(spec, v as f64),
        Number::Signed(v) => int_body(spec, v < 0, v.unsigned_abs()),
        Number::Unsigned(v) => int_body(spec, false, v),
    };

    let sign = match (negative, spec.sign) {
        (true, _) => "-",
        (false, Sign::Plus) => "+",
        (false, Sign::Space) => " ",
        (false, Sign::Minus) => "",
    };
    pad(spec, sign, &body, out);
}

fn int_body(spec: &Spec, negative: bool, magnitude: u128) -> (bool, String) {
    if spec.ty == Some('c') {
        let c = u32::try_from(magnitude)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        return (false, c.to_string());
    }

    let (prefix, digits, group_size) = match spec.ty {
        Some('b') => ("0b", format!("{:b}", magnitude), 4),
        Some('o') => ("0o", format!("{:o}", magnitude), 4),
        Some('x') => ("0x", format!("{:x}", magnitude), 4),
        Some('X') => ("0X", format!("{:X}", magnitude), 4),
        _ => ("", magnitude.to_string(), 3),
    };
    let digits = match spec.grouping {
        Some(sep) => group_digits(&digits, sep, group_size),
        None => digits,
    };
    let body = if spec.alternate {
        format!("{}{}", prefix, digits)
    } else {
        digits
    };
    (negative, body)
}

fn float_body(spec: &Spec, value: f64) -> (bool, String) {
    let negative = value.is_sign_negative() && !value.is_nan();
    let abs = value.abs();
    let upper = spec.ty.is_some_and(|t| t.is_ascii_uppercase());

    if !abs.is_finite() {
        let text = if abs.is_nan() { "nan" } else { "inf" };
        let text = if upper { text.to_uppercase() } else { text.to_string() };
        return (negative, text);
    }

    let body = match spec.ty {
        Some('f' | 'F') => format!("{:.*}", spec.precision.unwrap_or(6), abs),
        Some('e' | 'E') => scientific(abs, spec.precision.unwrap_or(6), spec.alternate),
        Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), abs * 100.0),
        Some('g' | 'G' | 'n') => general(abs, spec.precision.unwrap_or(6), spec.alternate, false),
        None => match spec.precision {
            Some(p) => general(abs, p, spec.alternate, true),
            None => shortest(abs),
        },
        Some(_) => shortest(abs),
    };

    let body = match spec.grouping {
        Some(sep) => group_float(&body, sep),
        None => body,
    };
    let body = if upper { body.to_uppercase() } else { body };
    (negative, body)
}

/// `1.5e3` style from Rust becomes `1.5e+03`
fn fix_exponent(text: &str) -> String {
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => text.to_string(),
    }
}

fn scientific(abs: f64, precision: usize, alternate: bool) -> String {
    let text = fix_exponent(&format!("{:.*e}", precision, abs));
    if alternate && precision == 0 {
        text.replacen('e', ".e", 1)
    } else {
        text
    }
}

fn general(abs: f64, precision: usize, alternate: bool, keep_point: bool) -> String {
    let p = precision.max(1);
    let probe = format!("{:.*e}", p - 1, abs);
    let exp: i32 = probe
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    let mut text = if exp >= -4 && exp < p as i32 {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, abs)
    } else {
        fix_exponent(&probe)
    };

    if !alternate {
        text = strip_trailing_zeros(&text);
    }
    if keep_point && !text.contains(['.', 'e', 'n', 'i']) {
        text.push_str(".0");
    }
    text
}

fn strip_trailing_zeros(text: &str) -> String {
    let (mantissa, exp) = match text.find('e') {
        Some(pos) => text.split_at(pos),
        None => (text, ""),
    };
    if !mantissa.contains('.') {
        return text.to_string();
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, exp)
}

/// Shortest round-trip representation, switching to exponent form for very
/// large or small magnitudes
fn shortest(abs: f64) -> String {
    let text = format!("{:?}", abs);
    if text.contains('e') {
        fix_exponent(&text)
    } else {
        text
    }
}

fn group_digits(digits: &str, sep: char, size: usize) -> String {
    let len = digits.chars().count();
    let mut out = String::with_capacity(len + len / size);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % size == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

fn group_float(body: &str, sep: char) -> String {
    let end = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    let (int_part, rest) = body.split_at(end);
    format!("{}{}", group_digits(int_part, sep, 3), rest)
}

fn pad(spec: &Spec, sign: &str, body: &str, out: &mut String) {
    let len = sign.chars().count() + body.chars().count();
    let fill = spec.width.saturating_sub(len);
    let fill_str = |n: usize| std::iter::repeat(spec.fill).take(n).collect::<String>();

    match spec.align.unwrap_or(Align::Right) {
        Align::Left => {
            out.push_str(sign);
            out.push_str(body);
            out.push_str(&fill_str(fill));
        }
        Align::Right => {
            out.push_str(&fill_str(fill));
            out.push_str(sign);
            out.push_str(body);
        }
        Align::Center => {
            out.push_str(&fill_str(fill / 2));
            out.push_str(sign);
            out.push_str(body);
            out.push_str(&fill_str(fill - fill / 2));
        }
        Align::AfterSign => {
            // keep a 0x/0b/0o prefix in front of the padding
            let prefix_len = if body.len() > 2
                && body.starts_with('0')
                && matches!(body.as_bytes()[1], b'x' | b'X' | b'o' | b'b')
            {
                2
            } else {
                0
            };
            out.push_str(sign);
            out.push_str(&body[..prefix_len]);
            out.push_str(&fill_str(fill));
            out.push_str(&body[prefix_len..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int(pattern: &str, v: i128) -> String {
        NumberFormat::parse(pattern, NumberClass::Integer)
            .unwrap()
            .render(Number::Signed(v))
    }

    fn uint(pattern: &str, v: u128) -> String {
        NumberFormat::parse(pattern, NumberClass::Integer)
            .unwrap()
            .render(Number::Unsigned(v))
    }

    fn float(pattern: &str, v: f64) -> String {
        NumberFormat::parse(pattern, NumberClass::Float)
            .unwrap()
            .render(Number::Float(v))
    }

    #[test]
    fn test_integer_patterns() {
        assert_eq!(int("{:06x}", 0x3c2b1a), "3c2b1a");
        assert_eq!(int("{:06x}", 0x1a), "00001a");
        assert_eq!(uint("0x{:08x}", 0xdead), "0x0000dead");
        assert_eq!(uint("{:016x}h", 1), "0000000000000001h");
        assert_eq!(int("{:+4d}", 5), "  +5");
        assert_eq!(int("{:+4d}", -5), "  -5");
        assert_eq!(int("{:d}", -42), "-42");
        assert_eq!(int("{}", 7), "7");
        assert_eq!(int("{:#x}", 255), "0xff");
        assert_eq!(int("{:#06x}", 255), "0x00ff");
        assert_eq!(int("{:<5d}|", 3), "3    |");
        assert_eq!(int("{:*^7d}", 3), "***3***");
        assert_eq!(int("{:,d}", 1234567), "1,234,567");
        assert_eq!(int("{:_x}", 0x12345), "1_2345");
        assert_eq!(int("{:c}", 65), "A");
        assert_eq!(uint("{:X}", 0xabc), "ABC");
        assert_eq!(uint("{:b}", 5), "101");
        assert_eq!(int("{:05d}", -42), "-0042");
    }

    #[test]
    fn test_integer_with_float_type() {
        assert_eq!(int("{:.2f}", 3), "3.00");
        assert_eq!(uint("{:f}", 1), "1.000000");
    }

    #[test]
    fn test_float_patterns() {
        assert_eq!(float("{:f}", 1.5), "1.500000");
        assert_eq!(float("{:.3f}", 2.0006), "2.001");
        assert_eq!(float("{:8.6f}", 1.25), "1.250000");
        assert_eq!(float("{:10.2f}", -1.25), "     -1.25");
        assert_eq!(float("{:e}", 1234.5), "1.234500e+03");
        assert_eq!(float("{:.2E}", 0.00012), "1.20E-04");
        assert_eq!(float("{:g}", 0.0001), "0.0001");
        assert_eq!(float("{:g}", 1234567.0), "1.23457e+06");
        assert_eq!(float("{:g}", 100.0), "100");
        assert_eq!(float("{}", 1.0), "1.0");
        assert_eq!(float("{}", 1e16), "1e+16");
        assert_eq!(float("{:.1%}", 0.25), "25.0%");
        assert_eq!(float("{:f}", f64::INFINITY), "inf");
        assert_eq!(float("{:F}", f64::NAN), "NAN");
    }

    #[test]
    fn test_literals_and_escapes() {
        assert_eq!(int("***", 1), "***");
        assert_eq!(int("{{{:d}}}", 9), "{9}");
        assert_eq!(int("I_{:d} / {0:x}", 10), "I_10 / a");
    }

    #[test]
    fn test_rejected_patterns() {
        let bad_int = ["{:.3d}", "{xxx}", "{", "}", "{:q}", "{:,x}", "{:d", "{!r}"];
        for p in bad_int {
            assert!(NumberFormat::parse(p, NumberClass::Integer).is_err(), "{}", p);
        }
        for p in ["{:x}", "{:d}", "{:c}"] {
            assert!(NumberFormat::parse(p, NumberClass::Float).is_err(), "{}", p);
        }
    }
}
