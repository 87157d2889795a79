// ==========================================
// Paie - header normalization and aliases
// ==========================================
// normalize_header:
//   trim -> NBSP/narrow NBSP/tab to space -> fold diacritics ->
//   lowercase -> punctuation to space -> "/ - _" to space -> collapse
// ==========================================

use crate::domain::types::LogicalField;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Known French headers, already normalized
const ALIASES: &[(LogicalField, &[&str])] = &[
    (LogicalField::LineNumber, &["n de ligne", "no de ligne", "numero de ligne", "n ligne", "ligne"]),
    (LogicalField::JobCategory, &["categorie d emploi", "categorie emploi", "cat emploi"]),
    (LogicalField::JobCode, &["code emploi", "code d emploi"]),
    (LogicalField::JobTitle, &["titre d emploi", "titre emploi", "emploi"]),
    (LogicalField::PayDate, &["date de paie", "date paie", "date de paye", "date"]),
    (LogicalField::Matricule, &["matricule", "no employe", "numero employe", "id employe"]),
    (LogicalField::EmployeeName, &["employe", "nom employe", "nom complet", "nom"]),
    (LogicalField::PayCategory, &["categorie de paie", "categorie paie"]),
    (LogicalField::PayCode, &["code de paie", "code paie"]),
    (
        LogicalField::PayCodeLabel,
        &["description du code de paie", "description code de paie", "desc code de paie", "libelle code de paie"],
    ),
    (LogicalField::BudgetPost, &["poste budgetaire", "poste budget"]),
    (
        LogicalField::BudgetPostLabel,
        &["desc poste budgetaire", "description poste budgetaire", "libelle poste budgetaire"],
    ),
    (LogicalField::Amount, &["montant", "montant employe", "mnt"]),
    (LogicalField::EmployerShare, &["part employeur", "montant employeur", "part patronale"]),
    (LogicalField::CombinedAmount, &["mnt cmb", "montant combine", "mnt combine"]),
];

/// Header score of an exact alias match
pub const EXACT_ALIAS_SCORE: f64 = 1.0;
/// Header score when an alias appears as whole words inside the header
pub const PARTIAL_ALIAS_SCORE: f64 = 0.7;

/// Strips accents (NFD, then combining marks dropped); œ/æ expand.
/// Precomposed and already-decomposed input fold the same way.
pub fn fold_diacritics(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.nfd() {
        match c {
            c if is_combining_mark(c) => {}
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            other => out.push(other),
        }
    }
    out
}

pub fn normalize_header(raw: &str) -> String {
    let spaced: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '\u{00A0}' | '\u{202F}' | '\t' => ' ',
            other => other,
        })
        .collect();

    let lowered = fold_diacritics(&spaced).to_lowercase();

    let cleaned: String = lowered
        .chars()
        .map(|c| match c {
            '.' | ',' | ';' | ':' | '!' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | '\''
            | '\u{2019}' | '°' | 'º' => ' ',
            '/' | '-' | '_' => ' ',
            other => other,
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"hdr:" + sorted normalized headers joined by "|"`
pub fn header_signature(normalized_headers: &[String]) -> String {
    let mut sorted: Vec<&str> = normalized_headers.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("hdr:{}", sorted.join("|"))
}

pub fn aliases(field: LogicalField) -> &'static [&'static str] {
    ALIASES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, a)| *a)
        .unwrap_or(&[])
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    let padded = format!(" {} ", haystack);
    padded.contains(&format!(" {} ", needle))
}

/// 1.0 exact alias, 0.7 alias contained as whole words, else 0
pub fn header_score(normalized: &str, field: LogicalField) -> f64 {
    if normalized.is_empty() {
        return 0.0;
    }
    let field_aliases = aliases(field);
    if field_aliases.iter().any(|a| *a == normalized) {
        EXACT_ALIAS_SCORE
    } else if field_aliases.iter().any(|a| contains_words(normalized, a)) {
        PARTIAL_ALIAS_SCORE
    } else {
        0.0
    }
}

/// Field whose alias list contains `normalized` exactly
pub fn exact_alias_field(normalized: &str) -> Option<LogicalField> {
    ALIASES
        .iter()
        .find(|(_, a)| a.contains(&normalized))
        .map(|(f, _)| *f)
}

pub fn is_known_alias(normalized: &str) -> bool {
    exact_alias_field(normalized).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decomposed_accents_fold_like_precomposed() {
        // "Employe" + U+0301, as written by macOS exports
        assert_eq!(normalize_header("Employe\u{301}"), "employe");
        assert_eq!(
            normalize_header("Cate\u{301}gorie d'emploi"),
            normalize_header("Catégorie d'emploi")
        );
        assert_eq!(
            exact_alias_field(&normalize_header("Poste budge\u{301}taire")),
            Some(LogicalField::BudgetPost)
        );
        assert_eq!(fold_diacritics("Œuvre Ærè"), "OEuvre AEre");
    }

    #[test]
    fn test_normalizes_canonical_headers() {
        assert_eq!(normalize_header("N° de ligne"), "n de ligne");
        assert_eq!(normalize_header("Catégorie d'emploi"), "categorie d emploi");
        assert_eq!(normalize_header("  Desc. Poste Budgétaire "), "desc poste budgetaire");
        assert_eq!(normalize_header("Mnt/Cmb"), "mnt cmb");
        assert_eq!(normalize_header("Part\u{00A0}employeur"), "part employeur");
        assert_eq!(normalize_header("Employé"), "employe");
        assert_eq!(normalize_header("Cœur_de-métier"), "coeur de metier");
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = vec!["montant".to_string(), "matricule".to_string()];
        let b = vec!["matricule".to_string(), "montant".to_string()];
        assert_eq!(header_signature(&a), header_signature(&b));
        assert_eq!(header_signature(&a), "hdr:matricule|montant");
    }

    #[test]
    fn test_header_scores() {
        assert_eq!(header_score("code de paie", LogicalField::PayCode), 1.0);
        assert_eq!(
            header_score("description du code de paie", LogicalField::PayCodeLabel),
            1.0
        );
        assert_eq!(header_score("code de paie interne", LogicalField::PayCode), 0.7);
        assert_eq!(header_score("quantite", LogicalField::Amount), 0.0);
    }

    #[test]
    fn test_every_canonical_label_is_an_alias() {
        for field in LogicalField::CANONICAL_ORDER {
            let normalized = normalize_header(field.label_fr());
            assert_eq!(exact_alias_field(&normalized), Some(field), "{}", normalized);
        }
    }
}
