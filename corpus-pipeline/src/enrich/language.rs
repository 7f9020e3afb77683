use corpus_core::domain::Language;

/// Capability interface: detect the language of a text sample.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Language;
}

/// Script-ratio heuristic: classifies by the mix of CJK and Latin letters in
/// the first 1000 characters. Not a linguistic model; swap in a real detector
/// through the trait if one is available.
pub struct ScriptRatioDetector;

impl LanguageDetector for ScriptRatioDetector {
    fn detect(&self, text: &str) -> Language {
        let mut cjk = 0usize;
        let mut latin = 0usize;
        for c in text.chars().take(1000) {
            if is_cjk(c) {
                cjk += 1;
            } else if c.is_ascii_alphabetic() {
                latin += 1;
            }
        }
        let letters = cjk + latin;
        if letters == 0 {
            return Language::Unknown;
        }
        if cjk as f64 / letters as f64 >= 0.3 {
            Language::Zh
        } else {
            Language::En
        }
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_english() {
        assert_eq!(
            ScriptRatioDetector.detect("Reservoir storage fell during the drought."),
            Language::En
        );
    }

    #[test]
    fn detects_chinese() {
        assert_eq!(ScriptRatioDetector.detect("水库调度与防洪管理"), Language::Zh);
    }

    #[test]
    fn digits_only_is_unknown() {
        assert_eq!(ScriptRatioDetector.detect("12345 67.8 9%"), Language::Unknown);
    }
}
