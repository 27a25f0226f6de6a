use super::team_name::normalize_team;

/// Normalize a tennis player's name to `"surname initial"`.
///
/// Mirrors the source system's behavior exactly: the last normalized
/// token is treated as the surname and the first character of the first
/// token as the initial, regardless of whether the input was written
/// `"First Last"` or `"F. Last"` — both collapse to the same form, which
/// is what lets `"Novak Djokovic"` and `"N. Djokovic"` match. A
/// `"Last, First"` input is not special-cased (the comma is stripped by
/// normalization like any other punctuation), so it does not round-trip
/// to the same form as `"First Last"` — this matches the original
/// implementation's behavior rather than "fixing" it.
pub fn normalize_tennis_player(name: &str) -> String {
    let normalized = normalize_team(name);
    let parts: Vec<&str> = normalized.split_whitespace().collect();

    match parts.len() {
        0 => normalized,
        1 => parts[0].to_string(),
        _ => {
            let surname = parts[parts.len() - 1];
            let initial = parts[0].chars().next().unwrap_or(' ');
            format!("{surname} {initial}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_and_initial_match() {
        assert_eq!(
            normalize_tennis_player("Novak Djokovic"),
            normalize_tennis_player("N. Djokovic")
        );
    }

    #[test]
    fn single_token_passthrough() {
        assert_eq!(normalize_tennis_player("Djokovic"), "djokovic");
    }
}
