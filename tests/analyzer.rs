use std::collections::BTreeMap;

use sitescout::analyzer::*;
use sitescout::data_models::{CompetitorRecord, CrawlResult};

fn page(title: &str, description: &str, headings: &[&str], content: &str) -> CrawlResult {
    CrawlResult {
        url: "https://example.com".to_string(),
        title: title.to_string(),
        description: description.to_string(),
        headings: headings.iter().map(|h| h.to_string()).collect(),
        content: content.to_string(),
        ..Default::default()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod text_analyzer_tests {
    use super::*;

    mod word_tokenizer {
        use super::*;

        #[test]
        fn test_empty_string() {
            assert!(WordTokenizer.tokenize("").is_empty());
        }

        #[test]
        fn test_only_punctuation() {
            assert!(WordTokenizer.tokenize("-- !! ,, ..").is_empty());
        }

        #[test]
        fn test_unicode_words() {
            assert_eq!(WordTokenizer.tokenize("Café–Kajak"), vec!["Café", "Kajak"]);
        }
    }

    mod keyword_pipeline {
        use super::*;

        #[test]
        fn test_positions_survive_filtering() {
            let tokens = TextAnalyzer::keywords().analyze("The kayak and the canoe");
            let found: Vec<(String, usize)> = tokens.into_iter().map(|t| (t.term, t.pos)).collect();
            assert_eq!(
                found,
                vec![("kayak".to_string(), 1), ("canoe".to_string(), 4)]
            );
        }

        #[test]
        fn test_drops_numbers_short_words_and_boilerplate() {
            let terms: Vec<String> = TextAnalyzer::keywords()
                .analyze("Kayak 2024 cookie policy for all paddle fans, sup")
                .into_iter()
                .map(|t| t.term)
                .collect();
            assert!(terms.contains(&"kayak".to_string()));
            assert!(terms.contains(&"paddle".to_string()));
            for dropped in ["2024", "cookie", "policy", "for", "all", "sup"] {
                assert!(!terms.contains(&dropped.to_string()), "{dropped} should be dropped");
            }
        }

        #[test]
        fn test_custom_pipeline() {
            let analyzer = TextAnalyzer::new(Box::new(WordTokenizer), vec![Box::new(LowerCaseTokenFilter)]);
            let terms: Vec<String> = analyzer.analyze("Kayak IT").into_iter().map(|t| t.term).collect();
            assert_eq!(terms, vec!["kayak", "it"]);
        }
    }
}

#[cfg(test)]
mod keyword_extraction_tests {
    use super::*;

    #[test]
    fn test_ranked_by_count_then_first_position() {
        let result = page(
            "Kayak Lakeside",
            "Canoe kayak",
            &["Paddle canoe"],
            "kayak paddle lakeside",
        );
        assert_eq!(
            extract_keywords_from_content(&result, 3),
            vec!["kayak", "lakeside", "canoe"]
        );
    }

    #[test]
    fn test_deterministic() {
        let result = page(
            "Lakeside Paddle",
            "",
            &[],
            "canoe kayak paddle canoe lakeside kayak",
        );
        let first = extract_keywords_from_content(&result, DEFAULT_MAX_KEYWORDS);
        for _ in 0..5 {
            assert_eq!(extract_keywords_from_content(&result, DEFAULT_MAX_KEYWORDS), first);
        }
    }

    #[test]
    fn test_empty_page_has_no_keywords() {
        assert!(extract_keywords_from_content(&CrawlResult::default(), 10).is_empty());
    }

    #[test]
    fn test_only_content_head_is_used() {
        let filler = "kayak ".repeat(CONTENT_SAMPLE_CHARS / 6 + 10);
        let content = format!("{filler}paddle paddle paddle");
        let result = page("", "", &[], &content);
        assert_eq!(extract_keywords_from_content(&result, 5), vec!["kayak"]);
    }

    #[test]
    fn test_competitor_record_keywords() {
        let result = page("Canoe Rentals", "Canoe trips", &[], "canoe lakeside");
        let record = CompetitorRecord::from_crawl(result.clone());
        assert_eq!(record.page, result);
        assert_eq!(record.keywords[0], "canoe");
        assert!(record.keywords.len() <= COMPETITOR_KEYWORDS);
    }
}

#[cfg(test)]
mod keyword_gap_tests {
    use super::*;

    fn competitor_map(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(url, keywords)| (url.to_string(), strings(keywords)))
            .collect()
    }

    #[test]
    fn test_gaps_ordered_by_competitor_count() {
        let competitors = competitor_map(&[
            ("a.com", &["video", "ai", "captions"]),
            ("b.com", &["captions", "branding"]),
        ]);
        let gaps = compute_keyword_gaps(&strings(&["video", "editing"]), &competitors, 25);
        let summary: Vec<(&str, usize)> = gaps.iter().map(|g| (g.keyword.as_str(), g.count)).collect();
        assert_eq!(summary, vec![("captions", 2), ("ai", 1), ("branding", 1)]);
        assert_eq!(gaps[0].competitors_using, vec!["a.com", "b.com"]);
    }

    #[test]
    fn test_site_keywords_compared_case_insensitively() {
        let competitors = competitor_map(&[("a.com", &["Kayak", "Canoe"])]);
        let gaps = compute_keyword_gaps(&strings(&["KAYAK"]), &competitors, 25);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].keyword, "canoe");
    }

    #[test]
    fn test_repeats_within_one_competitor_count_once() {
        let competitors = competitor_map(&[("a.com", &["paddle", "paddle", "PADDLE"])]);
        let gaps = compute_keyword_gaps(&[], &competitors, 25);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].count, 1);
    }

    #[test]
    fn test_gap_limit() {
        let competitors = competitor_map(&[("a.com", &["kayak", "canoe", "paddle", "lakeside"])]);
        let gaps = compute_keyword_gaps(&[], &competitors, 2);
        let keywords: Vec<&str> = gaps.iter().map(|g| g.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["kayak", "canoe"]);
    }

    #[test]
    fn test_ties_follow_competitor_url_order() {
        let competitors = competitor_map(&[
            ("z.com", &["anchor"]),
            ("m.com", &["zodiac", "yacht"]),
        ]);
        let gaps = compute_keyword_gaps(&[], &competitors, 25);
        let keywords: Vec<&str> = gaps.iter().map(|g| g.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["zodiac", "yacht", "anchor"]);
    }

    #[test]
    fn test_no_competitors_no_gaps() {
        assert!(compute_keyword_gaps(&strings(&["kayak"]), &BTreeMap::new(), 25).is_empty());
    }
}

#[cfg(test)]
mod brand_name_tests {
    use super::*;

    #[test]
    fn test_leading_title_segment() {
        let result = page("Kayak Club | Lakeside Rentals", "", &[], "");
        assert_eq!(brand_name("https://example.com", Some(&result)), "Kayak Club");

        let result = page("Paddle Works - Guided tours", "", &[], "");
        assert_eq!(brand_name("https://example.com", Some(&result)), "Paddle Works");
    }

    #[test]
    fn test_domain_fallback() {
        assert_eq!(brand_name("https://www.paddleworks.io/tours", None), "Paddleworks");

        let untitled = page("", "", &[], "some text");
        assert_eq!(brand_name("https://canoe.example", Some(&untitled)), "Canoe");
    }

    #[test]
    fn test_long_title_truncated() {
        let result = page(&"Lakeside ".repeat(20), "", &[], "");
        assert!(brand_name("https://example.com", Some(&result)).chars().count() <= 50);
    }

    #[test]
    fn test_unparsable_url_without_title() {
        assert_eq!(brand_name("not a url", None), "");
    }
}
