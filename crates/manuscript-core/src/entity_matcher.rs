//! Entity matching across snapshots (`spec.md` §4.11 "Comparison", pass 1
//! exact then pass 2 fuzzy).

use std::collections::HashSet;

/// Lowercase, strip leading Spanish articles, collapse whitespace — so
/// `"La Señora García"` and `"señora garcía"` normalize to the same key.
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let trimmed = lower
        .strip_prefix("el ")
        .or_else(|| lower.strip_prefix("la "))
        .or_else(|| lower.strip_prefix("los "))
        .or_else(|| lower.strip_prefix("las "))
        .unwrap_or(&lower);
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Character trigrams of a normalized name, used for fuzzy (Jaccard)
/// matching. Falls back to the whole string as its own single "gram" when
/// shorter than the gram size, so short names still compare.
pub fn char_ngrams(s: &str, n: usize) -> HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < n {
        return HashSet::from([s.to_string()]);
    }
    (0..=chars.len() - n)
        .map(|i| chars[i..i + n].iter().collect())
        .collect()
}

pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Exact match: normalized names or any normalized alias pair equal.
pub fn exact_match(name_a: &str, aliases_a: &HashSet<String>, name_b: &str, aliases_b: &HashSet<String>) -> bool {
    let norm_a = normalize_name(name_a);
    let norm_b = normalize_name(name_b);
    if norm_a == norm_b {
        return true;
    }
    let normalized_aliases_a: HashSet<String> = aliases_a.iter().map(|a| normalize_name(a)).collect();
    let normalized_aliases_b: HashSet<String> = aliases_b.iter().map(|a| normalize_name(a)).collect();
    normalized_aliases_a.contains(&norm_b) || normalized_aliases_b.contains(&norm_a) || !normalized_aliases_a.is_disjoint(&normalized_aliases_b)
}

const FUZZY_MATCH_THRESHOLD: f64 = 0.6;
const CONTAINMENT_BONUS: f64 = 0.15;

/// Fuzzy match score between two names: trigram Jaccard similarity, with a
/// bonus when one normalized name is a substring of the other (handles
/// "García" vs "María García" linking on a shared surname).
pub fn fuzzy_match_score(name_a: &str, name_b: &str) -> f64 {
    let norm_a = normalize_name(name_a);
    let norm_b = normalize_name(name_b);
    let grams_a = char_ngrams(&norm_a, 3);
    let grams_b = char_ngrams(&norm_b, 3);
    let mut score = jaccard_similarity(&grams_a, &grams_b);
    if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
        score = (score + CONTAINMENT_BONUS).min(1.0);
    }
    score
}

pub fn fuzzy_match(name_a: &str, name_b: &str) -> bool {
    fuzzy_match_score(name_a, name_b) >= FUZZY_MATCH_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_leading_article() {
        assert_eq!(normalize_name("La Señora García"), "señora garcía");
    }

    #[test]
    fn exact_match_via_shared_alias() {
        let aliases_a: HashSet<String> = ["Doña Inés".to_string()].into_iter().collect();
        let aliases_b: HashSet<String> = ["doña inés".to_string()].into_iter().collect();
        assert!(exact_match("Inés", &aliases_a, "La Inés", &aliases_b));
    }

    #[test]
    fn fuzzy_match_links_shared_surname() {
        assert!(fuzzy_match("María García", "García"));
    }

    #[test]
    fn unrelated_names_do_not_fuzzy_match() {
        assert!(!fuzzy_match("Juan Pérez", "Roberto Salas"));
    }

    #[test]
    fn jaccard_of_identical_sets_is_one() {
        let a: HashSet<String> = ["abc".to_string(), "bcd".to_string()].into_iter().collect();
        assert_eq!(jaccard_similarity(&a, &a), 1.0);
    }
}
