use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Serbian Cyrillic -> Latin transliteration table, matching the source
/// system's scraper fixtures (`core/matching.py::CYRILLIC_TO_LATIN`).
const CYRILLIC_TO_LATIN: &[(char, &str)] = &[
    ('а', "a"), ('б', "b"), ('в', "v"), ('г', "g"), ('д', "d"), ('ђ', "dj"), ('е', "e"),
    ('ж', "z"), ('з', "z"), ('и', "i"), ('ј', "j"), ('к', "k"), ('л', "l"), ('љ', "lj"),
    ('м', "m"), ('н', "n"), ('њ', "nj"), ('о', "o"), ('п', "p"), ('р', "r"), ('с', "s"),
    ('т', "t"), ('ћ', "c"), ('у', "u"), ('ф', "f"), ('х', "h"), ('ц', "c"), ('ч', "c"),
    ('џ', "dz"), ('ш', "s"),
    ('А', "A"), ('Б', "B"), ('В', "V"), ('Г', "G"), ('Д', "D"), ('Ђ', "Dj"), ('Е', "E"),
    ('Ж', "Z"), ('З', "Z"), ('И', "I"), ('Ј', "J"), ('К', "K"), ('Л', "L"), ('Љ', "Lj"),
    ('М', "M"), ('Н', "N"), ('Њ', "Nj"), ('О', "O"), ('П', "P"), ('Р', "R"), ('С', "S"),
    ('Т', "T"), ('Ћ', "C"), ('У', "U"), ('Ф', "F"), ('Х', "H"), ('Ц', "C"), ('Ч', "C"),
    ('Џ', "Dz"), ('Ш', "S"),
];

fn transliterate(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match CYRILLIC_TO_LATIN.iter().find(|(k, _)| *k == c) {
            Some((_, latin)) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// Category marker patterns. Each must match as a whole word/boundary
/// the way the Python source's `CATEGORY_PATTERNS` does.
static CATEGORY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("u15", Regex::new(r"(?i)\b(u-?15|under.?15|jun(?:ior)?s?\s*15)\b").unwrap()),
        ("u16", Regex::new(r"(?i)\b(u-?16|under.?16|jun(?:ior)?s?\s*16)\b").unwrap()),
        ("u17", Regex::new(r"(?i)\b(u-?17|under.?17|jun(?:ior)?s?\s*17)\b").unwrap()),
        ("u18", Regex::new(r"(?i)\b(u-?18|under.?18|jun(?:ior)?s?\s*18)\b").unwrap()),
        ("u19", Regex::new(r"(?i)\b(u-?19|under.?19|jun(?:ior)?s?\s*19)\b").unwrap()),
        ("u20", Regex::new(r"(?i)\b(u-?20|under.?20|jun(?:ior)?s?\s*20)\b").unwrap()),
        ("u21", Regex::new(r"(?i)\b(u-?21|under.?21|jun(?:ior)?s?\s*21)\b").unwrap()),
        ("u23", Regex::new(r"(?i)\b(u-?23|under.?23)\b").unwrap()),
        ("women", Regex::new(r"(?i)\b(wom[ae]n|ladies|female|zene)\b|\(w\)").unwrap()),
        ("reserves", Regex::new(r"(?i)\b(reserves?|res\.|ii|b\s*team)\b").unwrap()),
        ("youth", Regex::new(r"(?i)\b(youth|omladinci|kadeti|pioniri)\b").unwrap()),
        ("amateur", Regex::new(r"(?i)\b(amat(?:eu)?r|ljubitelji)\b").unwrap()),
    ]
});

static TEAM_SUFFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\s+(fc|fk|sk|bc|hc|kk|rk|ok|sc|ac|as|ss|us|cd|cf|sd|ud|rc|afc|sfc)$").unwrap(),
        Regex::new(r"\s+\d{4}$").unwrap(),
        Regex::new(r"(?i)\s+\(w\)$").unwrap(),
        Regex::new(r"(?i)\s+\(e\)$").unwrap(),
        Regex::new(r"(?i)\s+esports?$").unwrap(),
        Regex::new(r"(?i)\s+gaming$").unwrap(),
    ]
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// The set of category tags present in a team-name pair. Used as a hard
/// filter by the matcher: two pairs with different category sets can
/// never be the same event regardless of name similarity.
pub type Categories = HashSet<&'static str>;

/// Extract category markers (youth grades, women's/reserve teams, etc.)
/// from a pair of team names. Does not remove them from `a`/`b`.
pub fn extract_categories(a: &str, b: &str) -> Categories {
    let combined = format!("{a} {b}").to_lowercase();
    CATEGORY_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&combined))
        .map(|(tag, _)| *tag)
        .collect()
}

/// Normalize a team name for cross-book comparison: transliterate
/// Cyrillic, lowercase, strip category markers and club suffixes,
/// drop punctuation, and collapse whitespace. Idempotent.
pub fn normalize_team(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let mut normalized = transliterate(name).to_lowercase();

    for (_, re) in CATEGORY_PATTERNS.iter() {
        normalized = re.replace_all(&normalized, "").to_string();
    }

    for re in TEAM_SUFFIXES.iter() {
        normalized = re.replace_all(&normalized, "").to_string();
    }

    normalized = NON_WORD.replace_all(&normalized, " ").to_string();
    normalized = WHITESPACE
        .replace_all(normalized.trim(), " ")
        .to_string();

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent() {
        let once = normalize_team("FK Partizan (W)");
        let twice = normalize_team(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn strips_club_suffix_and_cyrillic() {
        let latin = normalize_team("Partizan FK");
        let cyrillic = normalize_team("Партизан ФК");
        assert_eq!(latin, cyrillic);
    }

    #[test]
    fn category_mismatch_detected() {
        let senior = extract_categories("USA", "Brazil");
        let u19 = extract_categories("USA U19", "Brazil U19");
        assert_ne!(senior, u19);
        assert!(senior.is_empty());
        assert!(u19.contains("u19"));
    }

    #[test]
    fn women_marker_extracted() {
        let cats = extract_categories("Chelsea (W)", "Arsenal (W)");
        assert!(cats.contains("women"));
    }
}
