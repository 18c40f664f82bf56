use std::sync::LazyLock;

use regex::Regex;

use crate::dom::Element;

// Currency marker and the whitespace after it. The amount itself is read by
// hand because a single leftmost-first match can pick a grouped reading
// (`$9 150` in `$9 1500mAh`) that fails the word boundary while a shorter
// one (`$9`) holds.
static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[$€£¥₹]|usd|cad|aud|eur|gbp|jpy|inr)\s*").unwrap()
});
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+").unwrap());
static GROUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[,\s]\d{3}").unwrap());
static FRACTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[.,]\d{2}").unwrap());

static PRICE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)price|amount|cost|value").unwrap());

const PRICE_ATTRS: &[&str] = &["class", "id", "itemprop", "data-price", "aria-label"];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn bounded_at(text: &str, end: usize) -> bool {
    !text[end..].chars().next().is_some_and(is_word_char)
}

/// Shortest end offset (into `rest`) of an amount reading that is not
/// followed by a word character.
///
/// Readings are a plain digit run, or one to three digits followed by
/// `,`/whitespace separated groups of three; each may carry a two-digit
/// `.`/`,` fraction.
fn bounded_amount_end(rest: &str) -> Option<usize> {
    let run = DIGITS_RE.find(rest)?;
    let mut integer_ends = vec![run.end()];
    if run.as_str().chars().count() <= 3 {
        let mut end = run.end();
        while let Some(group) = GROUP_RE.find(&rest[end..]) {
            end += group.end();
            integer_ends.push(end);
        }
    }
    integer_ends.sort_unstable();

    integer_ends.into_iter().find_map(|end| {
        if bounded_at(rest, end) {
            return Some(end);
        }
        FRACTION_RE
            .find(&rest[end..])
            .map(|fraction| end + fraction.end())
            .filter(|&stop| bounded_at(rest, stop))
    })
}

/// Byte ranges of the currency amounts in `text`, in order: marker start to
/// the end of its shortest bounded reading.
pub fn currency_amounts(text: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    CURRENCY_RE.find_iter(text).filter_map(move |marker| {
        let before = text[..marker.start()].chars().next_back();
        if before.is_some_and(is_word_char) {
            return None;
        }
        bounded_amount_end(&text[marker.end()..]).map(|end| (marker.start(), marker.end() + end))
    })
}

/// True when `text` contains a currency amount such as `$1,299.99` or `EUR 15`.
pub fn has_currency_amount(text: &str) -> bool {
    currency_amounts(text).next().is_some()
}

/// True when one of the price-bearing attributes mentions price/amount/cost/value.
pub fn has_price_attribute(el: &Element) -> bool {
    PRICE_ATTRS
        .iter()
        .filter_map(|name| el.attr(name))
        .any(|value| PRICE_ATTR_RE.is_match(value))
}
