//! Number formatting for the sweep log.

/// Significant digits of a default-configured C++ output stream.
const LEGACY_PRECISION: usize = 6;

/// Format `v` like a default C++ `ostream` (`%g` with 6 significant digits).
///
/// `0` → `"0"`, `360` → `"360"`, `-4` → `"-4"`, `0.1234567` → `"0.123457"`,
/// `1234567` → `"1.23457e+06"`, `0.00001` → `"1e-05"`.
pub fn legacy_float(v: f64) -> String {
    if v.is_nan() {
        return if v.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Round to the target precision first; the decimal exponent of the
    // rounded value picks between fixed and scientific notation.
    let sci = format!("{:.*e}", LEGACY_PRECISION - 1, v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= LEGACY_PRECISION as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            strip_trailing_zeros(mantissa),
            exp.unsigned_abs()
        )
    } else {
        let decimals = (LEGACY_PRECISION as i32 - 1 - exp).max(0) as usize;
        strip_trailing_zeros(&format!("{v:.decimals$}")).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
