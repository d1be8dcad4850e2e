//! Non-cryptographic cache keys for memoized endpoint results.

/// Number of leading UTF-16 code units of the content that feed the key.
pub const KEY_PREFIX_UNITS: usize = 200;

/// 32-bit rolling hash (`h = h * 31 + unit`, wrapping) over UTF-16 code units.
///
/// Matches the keys the browser extension has always produced, so keep it on UTF-16.
pub fn rolling_hash(s: &str) -> i32 {
    fold_units(s.encode_utf16())
}

fn fold_units(units: impl Iterator<Item = u16>) -> i32 {
    units.fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
    })
}

/// `"{prefix}_{hash}"` over the first `KEY_PREFIX_UNITS` code units of `content`.
pub fn cache_key(prefix: &str, content: &str) -> String {
    let h = fold_units(content.encode_utf16().take(KEY_PREFIX_UNITS));
    format!("{prefix}_{h}")
}
