use crate::codec::{in_range, DIGIT_RUN};
use crate::split::split_regex;

/// Masks every run of 8 to 20 digits in `value` for display.
///
/// Masking is one-way. Letters and shorter or longer digit runs are kept as is.
///
/// # Examples
///
/// ```
/// use veiled_rs::mask;
///
/// assert_eq!(mask("tel 13812345678"), "tel 1381***5678");
/// assert_eq!(mask("pin 1234"), "pin 1234");
/// ```
pub fn mask(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for segment in split_regex(&DIGIT_RUN, value) {
        if segment.matched && in_range(segment.text) {
            out.push_str(&mask_run(segment.text));
        } else {
            out.push_str(segment.text);
        }
    }
    out
}

/// Masks a single digit run: runs of 10 or more digits keep four digits at each
/// end, shorter runs keep three.
pub fn mask_run(run: &str) -> String {
    let size = run.len();
    let keep = if size >= 10 { 4 } else { 3 };
    if size <= keep * 2 || !run.is_ascii() {
        return run.to_string();
    }
    format!(
        "{}{}{}",
        &run[..keep],
        "*".repeat(size - keep * 2),
        &run[size - keep..]
    )
}
