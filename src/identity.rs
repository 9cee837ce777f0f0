//! Stable identity for job postings across crawls.
//!
//! A record with a real external id is keyed by that id. Everything else is keyed
//! by a 32-bit rolling hash over `title|company|url|sourceType`. The hash is cheap
//! and stable, but collisions become plausible once tens of thousands of hashed
//! records share one catalog.

const ID_PREFIX: &str = "id:";
const HASH_PREFIX: &str = "hash:";
const PLACEHOLDER_TOKEN: &str = "random";

pub fn dedup_key(
    external_id: Option<&str>,
    title: &str,
    company: &str,
    url: &str,
    source_type: &str,
) -> String {
    if let Some(id) = external_id.filter(|id| is_stable_id(id)) {
        return format!("{}{}", ID_PREFIX, id);
    }

    let tuple = [title, company, url, source_type]
        .iter()
        .map(|part| part.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join("|");
    format!("{}{}", HASH_PREFIX, to_base36(rolling_hash(&tuple).unsigned_abs()))
}

/// Generated ids carrying a random component change on every crawl and must not key records.
fn is_stable_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(PLACEHOLDER_TOKEN)
}

/// `h = h * 31 + unit` over UTF-16 code units, wrapping at 32 bits.
pub fn rolling_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(unit as i32))
}

pub fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Short stable token for arbitrary text, used for raw feed item ids.
pub fn short_hash(s: &str) -> String {
    to_base36(rolling_hash(s).unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(title: &str, company: &str, url: &str, source: &str) -> String {
        dedup_key(None, title, company, url, source)
    }

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(rolling_hash("a"), 97);
        assert_eq!(rolling_hash("ab"), 97 * 31 + 98);
        assert_eq!(to_base36(97), "2p");
        assert_eq!(to_base36(0), "0");
    }

    #[test]
    fn hash_wraps_instead_of_overflowing() {
        let long = "x".repeat(10_000);
        let _ = rolling_hash(&long);
        assert!(dedup_key(None, &long, "c", "u", "rss").starts_with("hash:"));
    }

    #[test]
    fn unchanged_tuple_gives_same_key() {
        let a = key("Backend Engineer", "Acme", "https://acme.io/jobs/1", "trusted");
        let b = key("  backend engineer ", "ACME", "https://acme.io/jobs/1 ", "trusted");
        assert_eq!(a, b);
    }

    #[test]
    fn each_field_changes_the_key() {
        let base = key("Backend Engineer", "Acme", "https://acme.io/jobs/1", "trusted");
        assert_ne!(base, key("Frontend Engineer", "Acme", "https://acme.io/jobs/1", "trusted"));
        assert_ne!(base, key("Backend Engineer", "Acme Corp", "https://acme.io/jobs/1", "trusted"));
        assert_ne!(base, key("Backend Engineer", "Acme", "https://acme.io/jobs/2", "trusted"));
        assert_ne!(base, key("Backend Engineer", "Acme", "https://acme.io/jobs/1", "rss"));
    }

    #[test]
    fn stable_external_id_is_authoritative() {
        assert_eq!(dedup_key(Some("gh-123"), "a", "b", "c", "rss"), "id:gh-123");
    }

    #[test]
    fn placeholder_ids_fall_back_to_hash() {
        assert!(dedup_key(Some(""), "a", "b", "c", "rss").starts_with("hash:"));
        assert!(dedup_key(Some("crawled_random_42"), "a", "b", "c", "rss").starts_with("hash:"));
    }
}
