use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::mask;
use crate::split::split_regex;

/// Error returned when an obfuscated token cannot be restored.
#[derive(Debug, PartialEq)]
pub enum Error {
    EmptyPayload,
    InvalidCheckDigit(char),
    InvalidHexDigit(char),
    InvalidRunLength(usize),
    MissingTerminator,
    NotCanonical,
    Overflow,
    PayloadTooWide { width: usize, expected: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::EmptyPayload => {
                write!(f, "Token has no payload")
            }
            Error::InvalidCheckDigit(c) => {
                write!(f, "Check digit was {:?}, expected a decimal digit", c)
            }
            Error::InvalidHexDigit(c) => {
                write!(f, "Invalid hex digit {:?}", c)
            }
            Error::InvalidRunLength(len) => {
                write!(
                    f,
                    "Run length was {}, expected {} to {}",
                    len, MIN_RUN, MAX_RUN
                )
            }
            Error::MissingTerminator => {
                write!(f, "Token does not end with '!'")
            }
            Error::NotCanonical => {
                write!(f, "Token is not in the form the encoder produces")
            }
            Error::Overflow => {
                write!(f, "Payload does not fit in 128 bits")
            }
            Error::PayloadTooWide { width, expected } => {
                write!(f, "Restored payload has {} digits, expected {}", width, expected)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Shortest digit run that gets obfuscated or masked.
pub const MIN_RUN: usize = 8;
/// Longest digit run that gets obfuscated or masked.
pub const MAX_RUN: usize = 20;

const TERMINATOR: char = '!';
const PADDING: char = '*';

pub(crate) static DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new("[0-9]+").expect("Digit run pattern should compile"));

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new("[0-9a-f*]{6,18}[0-9]!").expect("Token pattern should compile")
});

pub(crate) fn in_range(run: &str) -> bool {
    (MIN_RUN..=MAX_RUN).contains(&run.len())
}

/// The pluggable obfuscation strategy used by the column adapters.
///
/// [`Codec`] is the default. Replace it through [`crate::EncryptConfig`].
pub trait EncryptService: Send + Sync {
    fn encode(&self, value: &str) -> String;
    fn decode(&self, value: &str) -> String;
    fn mask(&self, value: &str) -> String;
}

/// Reversible obfuscation of the digit runs in free-form text.
///
/// Runs of 8 to 20 decimal digits are rewritten as a shifted hex payload followed
/// by the run's last digit and a `!`, padded with `*` to the run's original length.
/// The rest of the text is upper-cased but otherwise kept as is.
///
/// This is an obfuscation, not encryption: anyone who knows the scheme can reverse it.
///
/// # Examples
///
/// ```
/// use veiled_rs::Codec;
///
/// let codec = Codec::new();
/// let encoded = codec.encode("ID 110101199003078515");
/// assert_eq!(encoded, "ID 8db649ba**52eda85!");
/// assert_eq!(codec.decode(&encoded), "ID 110101199003078515");
/// assert_eq!(codec.mask("ID 110101199003078515"), "ID 1101**********8515");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec;

impl Codec {
    pub fn new() -> Codec {
        Codec
    }

    /// Obfuscates every run of 8 to 20 digits in `value`.
    ///
    /// The whole string is upper-cased first, so that letters left in the output
    /// can never be mistaken for the lowercase hex of an obfuscated token.
    pub fn encode(&self, value: &str) -> String {
        let upper = value.to_uppercase();
        let mut out = String::with_capacity(upper.len());
        for segment in split_regex(&DIGIT_RUN, &upper) {
            if segment.matched && in_range(segment.text) {
                out.push_str(&encode_run(segment.text));
            } else {
                out.push_str(segment.text);
            }
        }
        out
    }

    /// Restores the obfuscated tokens in `value`.
    ///
    /// Only tokens exactly as [`encode_run`] writes them are restored, so `*` or
    /// digits just before a token stay part of the surrounding text.
    /// Tokens that look obfuscated but cannot be restored are left untouched.
    /// Use [`Codec::try_decode`] to reject them instead.
    pub fn decode(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for segment in split_regex(&TOKEN, value) {
            if !segment.matched {
                out.push_str(segment.text);
                continue;
            }
            match restore(segment.text) {
                Ok((prefix, run)) => {
                    out.push_str(prefix);
                    out.push_str(&run);
                }
                Err(err) => {
                    tracing::debug!(token = segment.text, error = %err, "Passing through token");
                    out.push_str(segment.text);
                }
            }
        }
        out
    }

    /// Like [`Codec::decode`], but fails on the first token that cannot be restored.
    pub fn try_decode(&self, value: &str) -> Result<String, Error> {
        let mut out = String::with_capacity(value.len());
        for segment in split_regex(&TOKEN, value) {
            if segment.matched {
                let (prefix, run) = restore(segment.text)?;
                out.push_str(prefix);
                out.push_str(&run);
            } else {
                out.push_str(segment.text);
            }
        }
        Ok(out)
    }

    /// Masks digit runs for display, see [`mask::mask`].
    pub fn mask(&self, value: &str) -> String {
        mask::mask(value)
    }
}

impl EncryptService for Codec {
    fn encode(&self, value: &str) -> String {
        Codec::encode(self, value)
    }

    fn decode(&self, value: &str) -> String {
        Codec::decode(self, value)
    }

    fn mask(&self, value: &str) -> String {
        Codec::mask(self, value)
    }
}

// The last digit of a run doubles as the shift amount; zero shifts by ten.
fn offset_of(check: char) -> Result<u32, Error> {
    match check.to_digit(10) {
        Some(0) => Ok(10),
        Some(d) => Ok(d),
        None => Err(Error::InvalidCheckDigit(check)),
    }
}

fn shift_hex(hex: &str, offset: u32, forward: bool) -> Result<String, Error> {
    hex.chars()
        .map(|c| {
            let value = c.to_digit(16).ok_or(Error::InvalidHexDigit(c))?;
            let shifted = if forward {
                (value + offset) % 16
            } else {
                (value + 16 - offset) % 16
            };
            Ok(char::from_digit(shifted, 16).expect("Value below 16 should be a hex digit"))
        })
        .collect()
}

// A pattern match can start early on `*` or digits that precede the real token.
// Returns that leading text and the run restored from the first suffix that
// re-encodes to itself.
fn restore(found: &str) -> Result<(&str, String), Error> {
    let mut first_error = None;
    // The token pattern only matches ASCII, so every offset is a char boundary.
    for start in 0..found.len() {
        let candidate = &found[start..];
        if candidate.len() < MIN_RUN {
            break;
        }
        let err = match decode_run(candidate) {
            Ok(run) if encode_run(&run) == candidate => return Ok((&found[..start], run)),
            Ok(_) => Error::NotCanonical,
            Err(err) => err,
        };
        first_error.get_or_insert(err);
    }
    Err(first_error.unwrap_or(Error::InvalidRunLength(found.len())))
}

fn reversed(s: &str) -> String {
    s.chars().rev().collect()
}

/// Obfuscates a single run of 8 to 20 decimal digits.
///
/// The output always has the same length as `run`. Input outside that shape is
/// returned unchanged.
pub fn encode_run(run: &str) -> String {
    if !in_range(run) || !run.bytes().all(|b| b.is_ascii_digit()) {
        return run.to_string();
    }
    let size = run.len();
    let (payload, check) = run.split_at(size - 1);
    let offset = match check.chars().next().map(offset_of) {
        Some(Ok(offset)) => offset,
        _ => return run.to_string(),
    };

    let payload = if offset % 2 == 1 {
        reversed(payload)
    } else {
        payload.to_string()
    };
    // At most 19 digits, which always fits.
    let num: u128 = match payload.parse() {
        Ok(num) => num,
        Err(_) => return run.to_string(),
    };
    let hex = format!("{:x}", num);
    let mut token = match shift_hex(&hex, offset, true) {
        Ok(shifted) => shifted,
        Err(_) => return run.to_string(),
    };
    token.push_str(check);
    token.push(TERMINATOR);

    if token.len() < size {
        let middle = token.len() / 2;
        let padding: String = std::iter::repeat(PADDING).take(size - token.len()).collect();
        token.insert_str(middle, &padding);
    }
    token
}

/// Restores a single token produced by [`encode_run`].
pub fn decode_run(token: &str) -> Result<String, Error> {
    let body = token
        .strip_suffix(TERMINATOR)
        .ok_or(Error::MissingTerminator)?;
    // Width of the original payload, check digit excluded.
    let width = body.len();
    if !(MIN_RUN..=MAX_RUN).contains(&(width + 1)) {
        return Err(Error::InvalidRunLength(width + 1));
    }

    let stripped: String = body.chars().filter(|&c| c != PADDING).collect();
    let check = stripped.chars().last().ok_or(Error::EmptyPayload)?;
    let offset = offset_of(check)?;
    let hex = &stripped[..stripped.len() - check.len_utf8()];
    if hex.is_empty() {
        return Err(Error::EmptyPayload);
    }

    let restored = shift_hex(hex, offset, false)?;
    let num = u128::from_str_radix(&restored, 16).map_err(|_| Error::Overflow)?;
    let digits = num.to_string();
    if digits.len() > width {
        return Err(Error::PayloadTooWide {
            width: digits.len(),
            expected: width,
        });
    }

    let mut payload = format!("{:0>width$}", digits, width = width);
    if offset % 2 == 1 {
        payload = reversed(&payload);
    }
    payload.push(check);
    Ok(payload)
}
