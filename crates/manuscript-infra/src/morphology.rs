//! Rule-based Spanish morphological annotator (`spec.md` §4.2/§7): regex
//! suffix matching plus closed lexicons, standing in for a bundled NLP
//! model so `manuscript-core`'s mention extraction has real POS/gender/
//! number/person signal without pulling in spaCy or a tokenizer crate.

use manuscript_core::mention::{Gender, Number};
use manuscript_core::morphology::{MorphAnnotator, PartOfSpeech, Person, Token};
use regex::Regex;
use std::sync::OnceLock;

const DETERMINERS: &[(&str, Gender, Number)] = &[
    ("el", Gender::Masculine, Number::Singular),
    ("la", Gender::Feminine, Number::Singular),
    ("los", Gender::Masculine, Number::Plural),
    ("las", Gender::Feminine, Number::Plural),
    ("un", Gender::Masculine, Number::Singular),
    ("una", Gender::Feminine, Number::Singular),
    ("unos", Gender::Masculine, Number::Plural),
    ("unas", Gender::Feminine, Number::Plural),
];

/// Common nouns with known gender/number, closed lexicon (`spec.md` §4.2
/// definite-NP support needs at least a handful of referring nouns).
const COMMON_NOUNS: &[(&str, Gender, Number)] = &[
    ("hombre", Gender::Masculine, Number::Singular),
    ("hombres", Gender::Masculine, Number::Plural),
    ("mujer", Gender::Feminine, Number::Singular),
    ("mujeres", Gender::Feminine, Number::Plural),
    ("niño", Gender::Masculine, Number::Singular),
    ("niños", Gender::Masculine, Number::Plural),
    ("niña", Gender::Feminine, Number::Singular),
    ("niñas", Gender::Feminine, Number::Plural),
    ("padre", Gender::Masculine, Number::Singular),
    ("madre", Gender::Feminine, Number::Singular),
    ("casa", Gender::Feminine, Number::Singular),
    ("puerta", Gender::Feminine, Number::Singular),
    ("hermano", Gender::Masculine, Number::Singular),
    ("hermana", Gender::Feminine, Number::Singular),
];

const ADJECTIVES: &[&str] = &[
    "pequeño", "pequeña", "pequeños", "pequeñas", "grande", "grandes", "viejo", "vieja", "viejos", "viejas", "joven",
    "jóvenes", "cansado", "cansada", "cansados", "cansadas",
];

/// Closed lexicon of common irregular verb forms, tagged with person and
/// number directly rather than by suffix (`spec.md` §7 "rule-based
/// implementation... sufficient for Spanish morphology without a bundled
/// ML model").
const IRREGULAR_VERBS: &[(&str, Person, Number)] = &[
    ("es", Person::Third, Number::Singular),
    ("fue", Person::Third, Number::Singular),
    ("fueron", Person::Third, Number::Plural),
    ("era", Person::Third, Number::Singular),
    ("eran", Person::Third, Number::Plural),
    ("va", Person::Third, Number::Singular),
    ("van", Person::Third, Number::Plural),
    ("dijo", Person::Third, Number::Singular),
    ("dijeron", Person::Third, Number::Plural),
    ("dice", Person::Third, Number::Singular),
    ("dicen", Person::Third, Number::Plural),
    ("había", Person::Third, Number::Singular),
    ("habían", Person::Third, Number::Plural),
    ("tenía", Person::Third, Number::Singular),
    ("tenían", Person::Third, Number::Plural),
    ("tiene", Person::Third, Number::Singular),
    ("tienen", Person::Third, Number::Plural),
    ("vio", Person::Third, Number::Singular),
    ("vieron", Person::Third, Number::Plural),
    ("quiso", Person::Third, Number::Singular),
    ("quisieron", Person::Third, Number::Plural),
    ("soy", Person::First, Number::Singular),
    ("somos", Person::First, Number::Plural),
    ("eres", Person::Second, Number::Singular),
    ("sois", Person::Second, Number::Plural),
];

fn finite_verb_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[a-záéíóúñü]{3,}(o|as|a|amos|áis|an|e|es|emos|éis|en|i|iste|imos|isteis|ieron|ió|aba|ía|abas|ías|ábamos|íamos|abais|íais|aban|ían|ará|erá|irá|arás|erás|irás|aremos|eremos|iremos|aréis|eréis|iréis|arán|erán|irán|aría|ería|iría|aríamos|eríamos|iríamos|arían|erían|irían)$",
        )
        .unwrap()
    })
}

/// Map a regular-conjugation suffix to its person/number. Longest suffixes
/// are matched first so e.g. `-aron` isn't mistaken for a bare `-a`.
const REGULAR_SUFFIXES: &[(&str, Person, Number)] = &[
    ("aríamos", Person::First, Number::Plural),
    ("eríamos", Person::First, Number::Plural),
    ("iríamos", Person::First, Number::Plural),
    ("aremos", Person::First, Number::Plural),
    ("eremos", Person::First, Number::Plural),
    ("iremos", Person::First, Number::Plural),
    ("ábamos", Person::First, Number::Plural),
    ("íamos", Person::First, Number::Plural),
    ("isteis", Person::Second, Number::Plural),
    ("arían", Person::Third, Number::Plural),
    ("erían", Person::Third, Number::Plural),
    ("irían", Person::Third, Number::Plural),
    ("abais", Person::Second, Number::Plural),
    ("íais", Person::Second, Number::Plural),
    ("aban", Person::Third, Number::Plural),
    ("ían", Person::Third, Number::Plural),
    ("aréis", Person::Second, Number::Plural),
    ("eréis", Person::Second, Number::Plural),
    ("iréis", Person::Second, Number::Plural),
    ("arán", Person::Third, Number::Plural),
    ("erán", Person::Third, Number::Plural),
    ("irán", Person::Third, Number::Plural),
    ("ieron", Person::Third, Number::Plural),
    ("amos", Person::First, Number::Plural),
    ("emos", Person::First, Number::Plural),
    ("imos", Person::First, Number::Plural),
    ("aste", Person::Second, Number::Singular),
    ("iste", Person::Second, Number::Singular),
    ("abas", Person::Second, Number::Singular),
    ("ías", Person::Second, Number::Singular),
    ("aría", Person::Third, Number::Singular),
    ("ería", Person::Third, Number::Singular),
    ("iría", Person::Third, Number::Singular),
    ("áis", Person::Second, Number::Plural),
    ("éis", Person::Second, Number::Plural),
    ("ará", Person::Third, Number::Singular),
    ("erá", Person::Third, Number::Singular),
    ("irá", Person::Third, Number::Singular),
    ("aba", Person::Third, Number::Singular),
    ("ía", Person::Third, Number::Singular),
    ("ió", Person::Third, Number::Singular),
    ("an", Person::Third, Number::Plural),
    ("en", Person::Third, Number::Plural),
    ("as", Person::Second, Number::Singular),
    ("es", Person::Second, Number::Singular),
    ("a", Person::Third, Number::Singular),
    ("e", Person::Third, Number::Singular),
    ("i", Person::Second, Number::Singular),
    ("o", Person::First, Number::Singular),
];

fn classify_verb(lower: &str) -> Option<(Person, Number)> {
    for &(form, person, number) in IRREGULAR_VERBS {
        if lower == form {
            return Some((person, number));
        }
    }
    if !finite_verb_re().is_match(lower) {
        return None;
    }
    REGULAR_SUFFIXES
        .iter()
        .find(|&&(suffix, _, _)| lower.ends_with(suffix))
        .map(|&(_, person, number)| (person, number))
}

fn looks_capitalized_word(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.is_uppercase() && chars.next().map(|c| c.is_lowercase()).unwrap_or(false),
        None => false,
    }
}

/// Rule-based annotator: whitespace tokenization followed by closed-lexicon
/// and regex suffix classification. Degrades to `PartOfSpeech::Other` for
/// anything outside its lexicons/suffix patterns rather than guessing.
pub struct RuleBasedMorphAnnotator;

impl MorphAnnotator for RuleBasedMorphAnnotator {
    fn annotate(&self, text: &str) -> Option<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut char_idx = 0usize;
        let mut sentence_start = true;

        for word in text.split_whitespace() {
            let start = match text[char_idx..].find(word) {
                Some(offset) => char_idx + offset,
                None => char_idx,
            };
            let end = start + word.len();
            char_idx = end;
            let sentence_end = word.ends_with(['.', '!', '?']);

            let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
            let lower = trimmed.to_lowercase();

            let mut pos = PartOfSpeech::Other;
            let mut gender = Gender::Unknown;
            let mut number = Number::Unknown;
            let mut person = Person::Unknown;

            if let Some(&(_, g, n)) = DETERMINERS.iter().find(|&&(form, _, _)| form == lower) {
                pos = PartOfSpeech::Determiner;
                gender = g;
                number = n;
            } else if let Some(&(_, g, n)) = COMMON_NOUNS.iter().find(|&&(form, _, _)| form == lower) {
                pos = PartOfSpeech::CommonNoun;
                gender = g;
                number = n;
            } else if ADJECTIVES.contains(&lower.as_str()) {
                pos = PartOfSpeech::Adjective;
            } else if let Some((p, n)) = classify_verb(&lower) {
                pos = PartOfSpeech::Verb;
                person = p;
                number = n;
            } else if !sentence_start && looks_capitalized_word(trimmed) {
                pos = PartOfSpeech::ProperNoun;
            }

            tokens.push(Token {
                text: word.to_string(),
                start_char: start,
                end_char: end,
                lemma: lower,
                pos,
                gender,
                number,
                person,
                sentence_end,
            });

            sentence_start = sentence_end;
        }

        Some(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_third_person_preterite_as_finite_verb() {
        let tokens = RuleBasedMorphAnnotator.annotate("Salió cansada.").unwrap();
        let verb = tokens.iter().find(|t| t.lemma == "salió").unwrap();
        assert_eq!(verb.pos, PartOfSpeech::Verb);
        assert_eq!(verb.person, Person::Third);
    }

    #[test]
    fn excludes_first_person_verbs_from_third_person_class() {
        let tokens = RuleBasedMorphAnnotator.annotate("Yo camino despacio.").unwrap();
        let verb = tokens.iter().find(|t| t.lemma == "camino").unwrap();
        assert_eq!(verb.person, Person::First);
    }

    #[test]
    fn tags_capitalized_mid_sentence_word_as_proper_noun() {
        let tokens = RuleBasedMorphAnnotator.annotate("Ayer vi a Maria en la plaza.").unwrap();
        let name = tokens.iter().find(|t| t.text.trim_matches(|c: char| !c.is_alphanumeric()) == "Maria").unwrap();
        assert_eq!(name.pos, PartOfSpeech::ProperNoun);
    }

    #[test]
    fn tags_definite_article_with_gender_and_number() {
        let tokens = RuleBasedMorphAnnotator.annotate("La casa es grande.").unwrap();
        let article = tokens.iter().find(|t| t.lemma == "la").unwrap();
        assert_eq!(article.pos, PartOfSpeech::Determiner);
        assert_eq!(article.gender, Gender::Feminine);
    }
}
