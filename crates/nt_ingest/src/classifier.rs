use lazy_static::lazy_static;
use nt_core::{ArticleDraft, Category, Classification};
use regex::Regex;

/// Rule order is the tie-break order: on equal scores the earlier rule wins.
const CATEGORY_RULES: &[(Category, &str)] = &[
    (
        Category::ArtificialIntelligence,
        r"(?i)\b(ai|artificial intelligence|machine learning|openai|gpt|llms?|chatgpt|neural|deep learning)\b",
    ),
    (
        Category::Technology,
        r"(?i)\b(software|tech|technology|cloud|semiconductors?|chips?|smartphones?|apps?|cybersecurity|hardware)\b",
    ),
    (
        Category::Startups,
        r"(?i)\b(startups?|seed round|series [a-d]|venture capital|founders?|unicorns?)\b",
    ),
    (
        Category::Finance,
        r"(?i)\b(banks?|banking|loans?|interest rates?|federal reserve|inflation|fintech|credit|bonds?)\b",
    ),
    (
        Category::Markets,
        r"(?i)\b(stocks?|shares|nasdaq|dow jones|ipo|markets?|trading|investors?)\b",
    ),
    (
        Category::Healthcare,
        r"(?i)\b(health|healthcare|pharma|biotech|fda|drugs?|vaccines?|hospitals?|medical)\b",
    ),
    (
        Category::Energy,
        r"(?i)\b(energy|oil|gas|solar|wind power|renewables?|batter(y|ies)|electric vehicles?|nuclear)\b",
    ),
    (
        Category::Policy,
        r"(?i)\b(regulations?|regulators?|antitrust|congress|senate|lawmakers|policy|tariffs?)\b",
    ),
    (
        Category::Science,
        r"(?i)\b(research|scientists?|space|nasa|physics|climate)\b",
    ),
    (
        Category::Business,
        r"(?i)\b(company|companies|ceo|revenue|earnings|acquisitions?|mergers?|deal|profits?)\b",
    ),
];

/// Exact names recognized in article text. Anything not listed is missed.
const KNOWN_COMPANIES: &[&str] = &[
    "Apple", "Microsoft", "Google", "Alphabet", "Amazon", "Meta", "Tesla", "Nvidia", "OpenAI",
    "Anthropic", "IBM", "Intel", "AMD", "Netflix", "Salesforce", "Oracle", "Samsung", "Sony",
    "Uber", "Airbnb", "SpaceX", "Stripe", "Shopify", "Adobe", "Qualcomm", "JPMorgan",
    "Goldman Sachs", "Berkshire Hathaway", "Walmart", "Pfizer",
];

const MAX_TAGS: usize = 10;
const MIN_TAG_CHARS: usize = 5;

lazy_static! {
    static ref COMPILED_RULES: Vec<(Category, Regex)> = CATEGORY_RULES
        .iter()
        .filter_map(|(category, pattern)| match Regex::new(pattern) {
            Ok(regex) => Some((*category, regex)),
            Err(e) => {
                tracing::error!(%category, error = %e, "invalid category rule");
                None
            }
        })
        .collect();
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentClassifier;

impl ContentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Title matches count fully, body matches count half.
    pub fn categorize(&self, title: &str, content: &str) -> Category {
        let mut best = Category::Business;
        let mut best_score = 0.0f64;
        for (category, regex) in COMPILED_RULES.iter() {
            let score = regex.find_iter(title).count() as f64
                + 0.5 * regex.find_iter(content).count() as f64;
            if score > best_score {
                best = *category;
                best_score = score;
            }
        }
        best
    }

    pub fn extract_tags(&self, title: &str, source_categories: &[String]) -> Vec<String> {
        let mut tags = Vec::new();
        for word in title.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.chars().count() >= MIN_TAG_CHARS {
                push_unique(&mut tags, word);
            }
        }
        for category in source_categories {
            push_unique(&mut tags, category.trim().to_lowercase());
        }
        tags.truncate(MAX_TAGS);
        tags
    }

    pub fn extract_companies(&self, text: &str) -> Vec<String> {
        KNOWN_COMPANIES
            .iter()
            .filter(|name| text.contains(*name))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn extract_industries(&self, source_categories: &[String]) -> Vec<String> {
        let mut industries = Vec::new();
        for category in source_categories {
            push_unique(&mut industries, category.trim().to_string());
        }
        industries
    }

    pub fn classify(&self, draft: &ArticleDraft) -> Classification {
        Classification {
            category: self.categorize(&draft.title, &draft.content),
            tags: self.extract_tags(&draft.title, &draft.source_categories),
            companies: self.extract_companies(&format!("{}\n{}", draft.title, draft.content)),
            industries: self.extract_industries(&draft.source_categories),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(COMPILED_RULES.len(), CATEGORY_RULES.len());
    }

    #[test]
    fn test_categorize_weights_title_over_content() {
        let classifier = ContentClassifier::new();
        assert_eq!(
            classifier.categorize("OpenAI launches GPT-5", "The company said revenue grew."),
            Category::ArtificialIntelligence
        );
        // two half-weight body hits beat nothing in the title
        assert_eq!(
            classifier.categorize("Quarterly update", "Oil and gas prices rose."),
            Category::Energy
        );
    }

    #[test]
    fn test_categorize_defaults_to_business() {
        let classifier = ContentClassifier::new();
        assert_eq!(classifier.categorize("Hello there", "Nothing to see"), Category::Business);
    }

    #[test]
    fn test_categorize_tie_goes_to_earlier_rule() {
        let classifier = ContentClassifier::new();
        // one technology hit, one markets hit: technology comes first
        assert_eq!(classifier.categorize("Software stocks", ""), Category::Technology);
        assert_eq!(classifier.categorize("Stocks and software", ""), Category::Technology);
    }

    #[test]
    fn test_extract_tags() {
        let classifier = ContentClassifier::new();
        let tags = classifier.extract_tags(
            "Nvidia unveils faster chips, Nvidia says",
            &["Semiconductors".to_string(), "nvidia".to_string()],
        );
        assert_eq!(tags, vec!["nvidia", "unveils", "faster", "chips", "semiconductors"]);

        let long_title = (0..20).map(|i| format!("word{}x", i)).collect::<Vec<_>>().join(" ");
        assert_eq!(classifier.extract_tags(&long_title, &[]).len(), MAX_TAGS);
    }

    #[test]
    fn test_extract_companies_is_exact_match_only() {
        let classifier = ContentClassifier::new();
        assert_eq!(
            classifier.extract_companies("Microsoft expands cloud deal"),
            vec!["Microsoft".to_string()]
        );
        assert!(classifier.extract_companies("Zyntrax Labs raises funding").is_empty());
    }

    #[test]
    fn test_extract_industries_dedups_in_order() {
        let classifier = ContentClassifier::new();
        let industries = classifier.extract_industries(&[
            "Fintech".to_string(),
            "Banking".to_string(),
            "Fintech".to_string(),
        ]);
        assert_eq!(industries, vec!["Fintech", "Banking"]);
    }
}
