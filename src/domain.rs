//! Keyword-based domain tagging for questions.

use crate::config::DomainConfig;

/// Tag `question` with the first rule whose keyword it contains
/// (case-insensitive), or the configured default.
pub fn classify(question: &str, config: &DomainConfig) -> String {
    let question = question.to_lowercase();
    config
        .rules
        .iter()
        .find(|rule| {
            rule.keywords
                .iter()
                .any(|k| !k.is_empty() && question.contains(&k.to_lowercase()))
        })
        .map(|rule| rule.name.clone())
        .unwrap_or_else(|| config.default.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainRule;

    #[test]
    fn test_default_rules() {
        let config = DomainConfig::default();
        assert_eq!(classify("อัตรา VAT สำหรับส่งออก", &config), "ภาษีมูลค่าเพิ่ม");
        assert_eq!(classify("หักภาษีเงินเดือนอย่างไร", &config), "เงินได้บุคคลธรรมดา");
        assert_eq!(classify("อากรแสตมป์สัญญาจ้าง", &config), "ทั่วไป");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let config = DomainConfig::default();
        assert_eq!(
            classify("vat ของเงินเดือน", &config),
            "ภาษีมูลค่าเพิ่ม"
        );
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let config = DomainConfig {
            default: "general".into(),
            rules: vec![DomainRule {
                name: "everything".into(),
                keywords: vec![String::new()],
            }],
        };
        assert_eq!(classify("anything", &config), "general");
    }
}
