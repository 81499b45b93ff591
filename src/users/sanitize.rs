/// Substrings removed from free text, in application order.
const STRIPPED_PATTERNS: [&str; 6] = [";", "--", "/*", "*/", "xp_", "sp_"];

/// Remove every occurrence of each stripped pattern, then trim.
pub fn sanitize(input: &str) -> String {
    let mut out = input.to_string();
    for pattern in STRIPPED_PATTERNS {
        if out.contains(pattern) {
            out = out.replace(pattern, "");
        }
    }
    out.trim().to_string()
}
