//! Maintainer name inference from email addresses

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static LOCAL_PART_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.\-_]").expect("separator pattern is valid"));

static MAC_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Ma?c)([a-z])").expect("Mac prefix pattern is valid"));

static LEADING_MACKENZIE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^MacKenzie").expect("MacKenzie pattern is valid"));

/// Infers the owner's name from an email address
///
/// The local part is split on `.`, `-` and `_`, the words are title-cased and
/// `Mac`/`Mc` prefixes get their next letter capitalized. A leading
/// `MacKenzie` is then written `Mackenzie`, which is how that given name is
/// spelled in the directory.
///
/// # Examples
///
/// ```
/// use catalogue_scanner::inventory::infer_name_from_email;
///
/// assert_eq!(infer_name_from_email("cameron_mackenzie@example.ca"), "Cameron MacKenzie");
/// assert_eq!(infer_name_from_email("mackenzie.mcdonald@example.ca"), "Mackenzie McDonald");
/// ```
pub fn infer_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default().to_lowercase();
    let words = LOCAL_PART_SEPARATORS.split(&local).collect::<Vec<_>>().join(" ");

    let name = title_case(&words);
    let name = MAC_PREFIX.replace_all(&name, |caps: &Captures| {
        format!("{}{}", &caps[1], caps[2].to_uppercase())
    });
    LEADING_MACKENZIE.replace(&name, "Mackenzie").into_owned()
}

/// Uppercases every letter that follows a non-letter and lowercases the rest
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            result.push(c);
            previous_is_letter = false;
        }
    }
    result
}
