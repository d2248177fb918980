//! Text rendering utilities for human-friendly error messages.

/// Renders a resolution chain as a readable string.
///
/// ```
/// use joinery_support::rendering::render_chain;
///
/// let chain = ["Checkout(payments)", "Payments(gateway)"];
/// assert_eq!(render_chain(&chain), "Checkout(payments) → Payments(gateway)");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Suggests known names that look like the one requested.
///
/// Substring matches rank first, then names sharing a prefix of at least
/// three characters.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested = requested.to_lowercase();
    if requested.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter_map(|&name| {
            let candidate = name.to_lowercase();
            if candidate == requested {
                return None;
            }
            if candidate.contains(&requested) || requested.contains(&candidate) {
                return Some((name, 100));
            }

            let common = candidate
                .chars()
                .zip(requested.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored.dedup_by(|a, b| a.0 == b.0);
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
