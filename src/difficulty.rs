// Keyword-based difficulty scoring
// Substring matching over the lowercased description; Korean and English
// keywords carry the same weight within a tier

use serde::Serialize;

use crate::models::Difficulty;

/// Keywords hinting at advanced work, weight 3 each
const HIGH_KEYWORDS: [&str; 21] = [
    "아키텍처",
    "설계",
    "리팩토링",
    "최적화",
    "성능",
    "보안",
    "구현",
    "개발",
    "작성",
    "알고리즘",
    "시스템",
    "통합",
    "architecture",
    "refactor",
    "optimize",
    "implement",
    "design",
    "security",
    "performance",
    "algorithm",
    "complex",
];

/// Keywords hinting at general work, weight 2 each
const MEDIUM_KEYWORDS: [&str; 16] = [
    "분석",
    "리뷰",
    "테스트",
    "에러",
    "버그",
    "수정",
    "설명",
    "analyze",
    "review",
    "test",
    "error",
    "bug",
    "fix",
    "explain",
    "debug",
    "check",
];

/// Keywords hinting at simple work, weight 1 each
const LOW_KEYWORDS: [&str; 14] = [
    "검색",
    "찾기",
    "조회",
    "커밋",
    "메시지",
    "번역",
    "목록",
    "search",
    "find",
    "list",
    "commit",
    "message",
    "translate",
    "simple",
];

/// Outcome of scoring a work description
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAnalysis {
    pub difficulty: Difficulty,
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_model: &'static str,
    pub found_keywords: Vec<&'static str>,
}

/// Scores a description against the keyword tiers. The tier with the
/// highest weighted score wins; ties resolve toward the harder tier.
pub fn analyze_difficulty(description: &str) -> DifficultyAnalysis {
    let text = description.to_lowercase();
    let mut high = 0u32;
    let mut medium = 0u32;
    let mut low = 0u32;
    let mut found = Vec::new();

    for kw in HIGH_KEYWORDS {
        if text.contains(kw) {
            high += 3;
            found.push(kw);
        }
    }
    for kw in MEDIUM_KEYWORDS {
        if text.contains(kw) {
            medium += 2;
            found.push(kw);
        }
    }
    for kw in LOW_KEYWORDS {
        if text.contains(kw) {
            low += 1;
            found.push(kw);
        }
    }

    let total = high + medium + low;
    if total == 0 {
        return DifficultyAnalysis {
            difficulty: Difficulty::Medium,
            confidence: 0.5,
            reasoning: "no keyword match, defaulting to M".to_string(),
            suggested_model: Difficulty::Medium.suggested_model(),
            found_keywords: found,
        };
    }

    let sample = found[..found.len().min(3)].join(", ");
    let (difficulty, score, kind) = if high >= medium && high >= low {
        (Difficulty::High, high, "advanced")
    } else if medium >= low {
        (Difficulty::Medium, medium, "general")
    } else {
        (Difficulty::Low, low, "simple")
    };

    DifficultyAnalysis {
        difficulty,
        confidence: f64::from(score) / f64::from(total),
        reasoning: format!("{} work keywords found: {}", kind, sample),
        suggested_model: difficulty.suggested_model(),
        found_keywords: found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advanced_keywords_win() {
        let a = analyze_difficulty("Implement the retry algorithm");
        assert_eq!(a.difficulty, Difficulty::High);
        assert_eq!(a.suggested_model, "opus");
        assert!((a.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(a.found_keywords, vec!["implement", "algorithm"]);
    }

    #[test]
    fn mixed_tiers_pick_the_heaviest() {
        let a = analyze_difficulty("fix a bug in search");
        assert_eq!(a.difficulty, Difficulty::Medium);
        assert_eq!(a.found_keywords, vec!["bug", "fix", "search"]);
        assert!((a.confidence - 4.0 / 5.0).abs() < 1e-9);
        assert!(a.reasoning.starts_with("general work keywords found: bug, fix"));
    }

    #[test]
    fn korean_keywords_score_the_same() {
        let a = analyze_difficulty("성능 최적화 작업");
        assert_eq!(a.difficulty, Difficulty::High);
        assert_eq!(a.found_keywords, vec!["최적화", "성능"]);
    }

    #[test]
    fn lone_simple_keyword_maps_to_low() {
        let a = analyze_difficulty("검색");
        assert_eq!(a.difficulty, Difficulty::Low);
        assert_eq!(a.suggested_model, "haiku");
    }

    #[test]
    fn no_match_defaults_to_medium_at_half_confidence() {
        let a = analyze_difficulty("water the plants");
        assert_eq!(a.difficulty, Difficulty::Medium);
        assert!((a.confidence - 0.5).abs() < f64::EPSILON);
        assert!(a.found_keywords.is_empty());
        assert_eq!(a.reasoning, "no keyword match, defaulting to M");
    }

    #[test]
    fn ties_resolve_toward_the_harder_tier() {
        // one high keyword (3) against one medium (2) plus one low (1)
        let a = analyze_difficulty("구현 버그 검색");
        assert_eq!(a.difficulty, Difficulty::High);
        assert!((a.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn matching_is_substring_based() {
        let a = analyze_difficulty("add regression testing");
        assert_eq!(a.found_keywords, vec!["test"]);
        assert_eq!(a.difficulty, Difficulty::Medium);
    }
}
