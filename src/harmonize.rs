//! Header harmonization to the stable column vocabulary.
//!
//! The source extracts disagree on case, stray whitespace, and a handful of
//! accented letters. Harmonization is a pure, total function: it never drops
//! or fails a column, it only rewrites the name. Only the fixed accent set
//! seen in the extracts is folded; this is deliberately not general Unicode
//! normalization.

/// Normalizes one header: trim, lowercase, spaces to underscores, and fold
/// é/è/ê → e, à → a, ô → o, œ → oe.
pub fn harmonize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        match ch {
            ' ' => out.push('_'),
            'é' | 'è' | 'ê' | 'É' | 'È' | 'Ê' => out.push('e'),
            'à' | 'À' => out.push('a'),
            'ô' | 'Ô' => out.push('o'),
            'œ' | 'Œ' => out.push_str("oe"),
            other => out.extend(other.to_lowercase()),
        }
    }
    out
}

/// Harmonizes a full header set, preserving order.
pub fn harmonize_headers(headers: &[String]) -> Vec<String> {
    headers.iter().map(|name| harmonize_name(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harmonize_name_folds_known_accents() {
        assert_eq!(harmonize_name("Année"), "annee");
        assert_eq!(harmonize_name("Libellé classe âge"), "libelle_classe_âge");
        assert_eq!(harmonize_name("  Prévalence  "), "prevalence");
        assert_eq!(harmonize_name("Contrôle"), "controle");
        assert_eq!(harmonize_name("Cœur"), "coeur");
    }

    #[test]
    fn harmonize_name_leaves_unknown_columns_intact() {
        assert_eq!(harmonize_name("Niveau prioritaire"), "niveau_prioritaire");
        assert_eq!(harmonize_name("custom_extra"), "custom_extra");
    }

    #[test]
    fn harmonize_headers_is_idempotent() {
        let raw = vec![
            "Année".to_string(),
            "DEPT".to_string(),
            "patho niv1".to_string(),
            "prev".to_string(),
        ];
        let once = harmonize_headers(&raw);
        let twice = harmonize_headers(&once);
        assert_eq!(once, twice);
        assert_eq!(once, vec!["annee", "dept", "patho_niv1", "prev"]);
    }
}
