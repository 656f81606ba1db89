use crate::types::Atom;

/// Classifies one token's text as an integer, a float, or a symbol.
///
/// Integers are an optional `-` followed by digits. Floats are an optional
/// `-`, digits, a single `.`, and digits, where either side of the point may
/// be empty but not both. Everything else is a symbol, kept verbatim.
pub fn classify(token: &str) -> Atom {
    let unsigned = token.strip_prefix('-').unwrap_or(token);

    if is_digits(unsigned) {
        return match token.parse::<i64>() {
            Ok(n) => Atom::Integer(n),
            // Out of i64 range: keep the magnitude as a float rather than
            // turning a numeral into a symbol.
            Err(_) => token
                .parse::<f64>()
                .map(Atom::Float)
                .unwrap_or_else(|_| Atom::Symbol(token.to_string())),
        };
    }

    if let Some((whole, fraction)) = unsigned.split_once('.') {
        let well_formed = (is_digits(whole) || whole.is_empty())
            && (is_digits(fraction) || fraction.is_empty())
            && !(whole.is_empty() && fraction.is_empty());
        if well_formed {
            if let Ok(n) = token.parse::<f64>() {
                return Atom::Float(n);
            }
        }
    }

    Atom::Symbol(token.to_string())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
