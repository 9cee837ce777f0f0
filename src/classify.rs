//! Keyword classification of job postings and companies.
//!
//! Dictionaries are compiled once into read-only statics. Matching is on lowercased
//! text. Keywords must start on a word boundary; keywords of three or fewer
//! alphanumeric chars, and every seniority keyword, must also end on one. The
//! highest weight wins; ties go to dictionary order.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_CATEGORY: &str = "other";
pub const DEFAULT_LEVEL: &str = "unspecified";
pub const DEFAULT_INDUSTRY: &str = "other";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: &'static str,
    pub experience_level: &'static str,
    pub industry: &'static str,
    pub tags: Vec<&'static str>,
}

struct Entry {
    pattern: Regex,
    label: &'static str,
    weight: u8,
}

struct Dictionary {
    entries: Vec<Entry>,
}

impl Dictionary {
    fn build(table: &[(&str, &'static str, u8)], whole_words: bool) -> Self {
        let entries = table
            .iter()
            .map(|(keyword, label, weight)| Entry {
                pattern: keyword_pattern(keyword, whole_words),
                label,
                weight: *weight,
            })
            .collect();
        Self { entries }
    }

    /// Highest-weight match; the first entry wins among equal weights.
    fn best(&self, text: &str) -> Option<&'static str> {
        let mut best: Option<&Entry> = None;
        for entry in &self.entries {
            if entry.pattern.is_match(text) && best.map_or(true, |b| entry.weight > b.weight) {
                best = Some(entry);
            }
        }
        best.map(|e| e.label)
    }

    fn all(&self, text: &str) -> Vec<&'static str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| e.pattern.is_match(text))
            .map(|e| e.label)
            .filter(|label| seen.insert(*label))
            .collect()
    }
}

fn keyword_pattern(keyword: &str, whole_words: bool) -> Regex {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    let short_word = keyword.len() <= 3 && keyword.chars().all(|c| c.is_ascii_alphanumeric());
    let lead = if is_word(keyword.chars().next()) { r"\b" } else { "" };
    let tail = if (whole_words || short_word) && is_word(keyword.chars().last()) {
        r"\b"
    } else {
        ""
    };
    Regex::new(&format!("{}{}{}", lead, regex::escape(keyword), tail)).unwrap()
}

#[rustfmt::skip]
const CATEGORY_TABLE: &[(&str, &str, u8)] = &[
    ("frontend", "frontend", 2), ("front-end", "frontend", 2), ("react", "frontend", 1),
    ("vue", "frontend", 1), ("angular", "frontend", 1), ("javascript", "frontend", 1),
    ("typescript", "frontend", 1), ("web developer", "frontend", 2),

    ("backend", "backend", 2), ("back-end", "backend", 2), ("java", "backend", 1),
    ("python", "backend", 1), ("golang", "backend", 1), ("node.js", "backend", 1),
    ("ruby", "backend", 1), ("php", "backend", 1), ("rust", "backend", 1),
    ("c++", "backend", 1), (".net", "backend", 1),

    ("fullstack", "fullstack", 3), ("full-stack", "fullstack", 3), ("full stack", "fullstack", 3),

    ("ios", "mobile", 2), ("android", "mobile", 2), ("mobile", "mobile", 2),
    ("flutter", "mobile", 2), ("react native", "mobile", 3), ("swift", "mobile", 1),
    ("kotlin", "mobile", 1),

    ("machine learning", "machine-learning", 3), ("deep learning", "machine-learning", 3),
    ("ai engineer", "machine-learning", 3), ("nlp", "machine-learning", 2),
    ("computer vision", "machine-learning", 3), ("algorithm", "machine-learning", 2),

    ("data engineer", "data-engineering", 3), ("etl", "data-engineering", 2),
    ("spark", "data-engineering", 1), ("hadoop", "data-engineering", 1),

    ("devops", "devops", 3), ("sre", "devops", 3), ("site reliability", "devops", 3),
    ("sysadmin", "devops", 2), ("infrastructure", "devops", 2), ("kubernetes", "devops", 1),
    ("platform engineer", "devops", 3), ("cloud", "devops", 1),

    ("qa", "qa", 2), ("quality assurance", "qa", 3), ("test engineer", "qa", 3),
    ("sdet", "qa", 3),

    ("security", "security", 2), ("cyber", "security", 2), ("infosec", "security", 3),
    ("penetration", "security", 3),

    ("hardware", "hardware", 2), ("embedded", "hardware", 2), ("firmware", "hardware", 3),
    ("fpga", "hardware", 3),

    ("architect", "architecture", 2),

    ("cto", "engineering-management", 4), ("vp of engineering", "engineering-management", 4),
    ("engineering manager", "engineering-management", 4), ("tech lead", "engineering-management", 3),

    ("product manager", "product", 4), ("product owner", "product", 4), ("pm", "product", 2),

    ("product designer", "design", 4), ("ux", "design", 3), ("ui", "design", 3),
    ("designer", "design", 3), ("design", "design", 2),

    ("data analyst", "data-analysis", 4), ("business analyst", "data-analysis", 4),
    ("data scientist", "data-analysis", 4), ("analytics", "data-analysis", 2),

    ("marketing", "marketing", 3), ("marketer", "marketing", 3), ("seo", "marketing", 3),
    ("growth", "marketing", 2),

    ("copywriter", "content", 3), ("writer", "content", 3), ("editor", "content", 3),
    ("content", "content", 2),

    ("sales", "sales", 3), ("account executive", "sales", 4), ("sdr", "sales", 3),
    ("bdr", "sales", 3), ("business development", "sales", 3),

    ("account manager", "account-management", 4), ("customer success manager", "account-management", 5),

    ("customer support", "customer-support", 4), ("customer service", "customer-support", 4),
    ("support engineer", "customer-support", 4), ("technical support", "customer-support", 4),

    ("operations", "operations", 2), ("ops", "operations", 1),

    ("human resources", "hr", 4), ("people ops", "hr", 4), ("hr", "hr", 3),
    ("recruiter", "recruiting", 4), ("talent acquisition", "recruiting", 4),

    ("finance", "finance", 3), ("accountant", "finance", 3), ("controller", "finance", 2),

    ("legal", "legal", 3), ("lawyer", "legal", 3), ("counsel", "legal", 3),

    ("executive assistant", "admin", 4), ("office manager", "admin", 4), ("admin", "admin", 2),

    ("ceo", "executive", 4), ("co-founder", "executive", 4), ("head of", "executive", 3),
    ("director", "executive", 3), ("vp", "executive", 3),

    ("teacher", "education", 3), ("tutor", "education", 3), ("curriculum", "education", 3),

    ("consultant", "consulting", 3),

    // Generic role nouns, outweighed by anything specific.
    ("engineer", "software-engineering", 1), ("developer", "software-engineering", 1),
];

#[rustfmt::skip]
const LEVEL_TITLE_TABLE: &[(&str, &str, u8)] = &[
    ("cto", "executive", 5), ("ceo", "executive", 5), ("coo", "executive", 5), ("cfo", "executive", 5),
    ("vp", "executive", 5), ("vice president", "executive", 5), ("director", "executive", 5),
    ("head of", "executive", 5),
    ("lead", "lead", 4), ("principal", "lead", 4), ("staff", "lead", 4), ("architect", "lead", 4),
    ("manager", "lead", 4),
    ("senior", "senior", 3), ("sr", "senior", 3), ("iii", "senior", 3),
    ("junior", "entry", 2), ("jr", "entry", 2), ("entry", "entry", 2),
    ("intern", "entry", 2), ("internship", "entry", 2), ("graduate", "entry", 2),
    ("mid", "mid", 1), ("intermediate", "mid", 1),
];

#[rustfmt::skip]
const LEVEL_TEXT_TABLE: &[(&str, &str, u8)] = &[
    ("vice president", "executive", 2), ("director", "executive", 2),
    ("principal", "lead", 1), ("staff engineer", "lead", 1),
];

#[rustfmt::skip]
const INDUSTRY_TABLE: &[(&str, &str, u8)] = &[
    ("artificial intelligence", "ai", 9), ("machine learning", "ai", 9), ("llm", "ai", 9),
    ("gpt", "ai", 9), ("deep learning", "ai", 9), ("ai", "ai", 9),
    ("crypto", "web3", 8), ("blockchain", "web3", 8), ("web3", "web3", 8), ("defi", "web3", 8),
    ("nft", "web3", 8), ("bitcoin", "web3", 8), ("ethereum", "web3", 8),
    ("saas", "saas", 7), ("b2b", "saas", 7), ("enterprise software", "saas", 7),
    ("developer tools", "saas", 7), ("api", "saas", 7),
    ("fintech", "fintech", 6), ("banking", "fintech", 6), ("payment", "fintech", 6),
    ("trading", "fintech", 6), ("insurance", "fintech", 6), ("lending", "fintech", 6),
    ("e-commerce", "ecommerce", 5), ("ecommerce", "ecommerce", 5), ("retail", "ecommerce", 5),
    ("marketplace", "ecommerce", 5), ("dtc", "ecommerce", 5),
    ("gaming", "gaming-media", 4), ("game", "gaming-media", 4), ("esports", "gaming-media", 4),
    ("streaming", "gaming-media", 4), ("music", "gaming-media", 4),
    ("healthcare", "health", 3), ("health", "health", 3), ("medical", "health", 3),
    ("biotech", "health", 3), ("pharma", "health", 3), ("patient", "health", 3),
    ("edtech", "education", 2), ("education", "education", 2), ("university", "education", 2),
    ("hardware", "hardware-iot", 1), ("iot", "hardware-iot", 1), ("robotics", "hardware-iot", 1),
    ("semiconductor", "hardware-iot", 1), ("manufacturing", "hardware-iot", 1),
];

#[rustfmt::skip]
const TAG_TABLE: &[(&str, &str, u8)] = &[
    ("remote", "remote-first", 1), ("distributed", "remote-first", 1),
    ("work from home", "remote-first", 1), ("wfh", "remote-first", 1),
    ("worldwide", "global-hiring", 1), ("global", "global-hiring", 1),
    ("international", "global-hiring", 1),
    ("startup", "startup", 1), ("early stage", "startup", 1), ("seed", "startup", 1),
    ("series a", "startup", 1),
    ("unicorn", "unicorn", 1),
    ("visa sponsorship", "visa-sponsorship", 1),
];

static CATEGORIES: LazyLock<Dictionary> = LazyLock::new(|| Dictionary::build(CATEGORY_TABLE, false));
static LEVELS_TITLE: LazyLock<Dictionary> = LazyLock::new(|| Dictionary::build(LEVEL_TITLE_TABLE, true));
static LEVELS_TEXT: LazyLock<Dictionary> = LazyLock::new(|| Dictionary::build(LEVEL_TEXT_TABLE, true));
static INDUSTRIES: LazyLock<Dictionary> = LazyLock::new(|| Dictionary::build(INDUSTRY_TABLE, false));
static TAGS: LazyLock<Dictionary> = LazyLock::new(|| Dictionary::build(TAG_TABLE, false));

pub fn classify_job(title: &str, description: &str) -> Classification {
    let title = title.to_lowercase();
    let description = crate::text::strip_html(description).to_lowercase();
    let text = format!("{} {}", title, description);

    Classification {
        category: category(&title, &description),
        experience_level: experience_level(&title, &text),
        industry: INDUSTRIES.best(&text).unwrap_or(DEFAULT_INDUSTRY),
        tags: TAGS.all(&text),
    }
}

fn category(title: &str, description: &str) -> &'static str {
    CATEGORIES
        .best(title)
        .or_else(|| CATEGORIES.best(description))
        .unwrap_or(DEFAULT_CATEGORY)
}

fn experience_level(title: &str, text: &str) -> &'static str {
    LEVELS_TITLE
        .best(title)
        .or_else(|| LEVELS_TEXT.best(text))
        .unwrap_or(DEFAULT_LEVEL)
}

/// Industry and tags for a company profile.
pub fn classify_company(name: &str, description: &str) -> (&'static str, Vec<&'static str>) {
    let text = format!("{} {}", name, crate::text::strip_html(description)).to_lowercase();
    (INDUSTRIES.best(&text).unwrap_or(DEFAULT_INDUSTRY), TAGS.all(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_keywords_pick_category() {
        assert_eq!(classify_job("Senior Frontend Engineer", "").category, "frontend");
        assert_eq!(classify_job("Full Stack Developer", "").category, "fullstack");
        assert_eq!(classify_job("Product Designer", "").category, "design");
    }

    #[test]
    fn specific_keyword_outweighs_generic() {
        // "engineer" alone is weight 1; "backend" is 2.
        assert_eq!(classify_job("Backend Engineer", "").category, "backend");
        assert_eq!(classify_job("Engineer", "").category, "software-engineering");
    }

    #[test]
    fn short_keywords_need_word_boundaries() {
        // "ops" must not match inside "devops"
        assert_eq!(classify_job("DevOps Specialist", "").category, "devops");
        // "pm" must not match inside "development"
        assert_ne!(classify_job("Development Lead", "").category, "product");
    }

    #[test]
    fn keywords_anchor_at_word_start() {
        // "rust" must not match inside "trust"
        assert_ne!(classify_job("Trust and Safety Lead", "").category, "backend");
        assert_ne!(classify_job("International Sales Intern", "").experience_level, "lead");
        assert_eq!(classify_job("Internal Tools Engineer", "").experience_level, DEFAULT_LEVEL);
    }

    #[test]
    fn description_used_only_without_title_match() {
        let c = classify_job("Wizard", "You will build kubernetes operators for our cloud");
        assert_eq!(c.category, "devops");
    }

    #[test]
    fn defaults_when_nothing_matches() {
        let c = classify_job("Wizard", "Magic things");
        assert_eq!(c.category, DEFAULT_CATEGORY);
        assert_eq!(c.experience_level, DEFAULT_LEVEL);
        assert_eq!(c.industry, DEFAULT_INDUSTRY);
        assert!(c.tags.is_empty());
    }

    #[test]
    fn experience_levels() {
        assert_eq!(classify_job("VP of Engineering", "").experience_level, "executive");
        assert_eq!(classify_job("Senior Engineering Manager", "").experience_level, "lead");
        assert_eq!(classify_job("Sr. Backend Engineer", "").experience_level, "senior");
        assert_eq!(classify_job("Junior QA", "").experience_level, "entry");
        assert_eq!(classify_job("Engineer", "reports to the director").experience_level, "executive");
    }

    #[test]
    fn industry_and_tags_from_text() {
        let c = classify_job("Backend Engineer", "<p>We are a remote-first fintech startup building payment rails</p>");
        assert_eq!(c.industry, "fintech");
        assert_eq!(c.tags, vec!["remote-first", "startup"]);
    }

    #[test]
    fn deterministic() {
        let a = classify_job("Staff Data Engineer", "Spark and ETL at a SaaS company");
        let b = classify_job("Staff Data Engineer", "Spark and ETL at a SaaS company");
        assert_eq!(a, b);
    }

    #[test]
    fn company_industry() {
        let (industry, _) = classify_company("Ledgerly", "A banking API for small businesses");
        // "api" (saas, 7) outweighs "banking" (fintech, 6)
        assert_eq!(industry, "saas");
    }
}
