//! Static risk pattern registries
//!
//! Two registries share one category type and one matching implementation:
//! the presence-weighted registry drives the rule engine, the count-mode
//! registry drives the pattern features and `matched_categories`.
//! Both are compiled once on first use and never mutated.

use once_cell::sync::Lazy;
use regex::Regex;

/// A named group of regex patterns sharing one weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskCategory {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
    /// Weight in [0, 1]; only the presence-weighted mode reads it
    pub weight: f64,
}

impl RiskCategory {
    /// Human-readable label, e.g. `guaranteed_returns` -> `Guaranteed Returns`
    pub fn display_name(&self) -> String {
        self.name
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

/// Categories scored by the rule engine (presence-weighted)
pub const RISK_CATEGORIES: &[RiskCategory] = &[
    RiskCategory {
        name: "guaranteed_returns",
        patterns: &[r"guaranteed.*return", r"100%.*profit", r"risk.*free"],
        weight: 0.8,
    },
    RiskCategory {
        name: "urgency_pressure",
        patterns: &[r"limited.*time", r"act.*now", r"hurry", r"expires.*soon"],
        weight: 0.6,
    },
    RiskCategory {
        name: "unrealistic_claims",
        patterns: &[r"miracle.*cure", r"instant.*results", r"amazing.*results"],
        weight: 0.7,
    },
    RiskCategory {
        name: "contact_requests",
        patterns: &[r"dm.*me", r"private.*message", r"whatsapp", r"telegram.*@"],
        weight: 0.5,
    },
    RiskCategory {
        name: "price_manipulation",
        patterns: &[r"special.*price", r"discount.*today", r"50%.*off"],
        weight: 0.4,
    },
];

/// Categories counted into the feature vector (count mode, unweighted)
pub const SUSPICIOUS_CATEGORIES: &[RiskCategory] = &[
    RiskCategory {
        name: "urgency",
        patterns: &[r"urgent", r"limited time", r"act now", r"expires soon"],
        weight: 1.0,
    },
    RiskCategory {
        name: "financial_promises",
        patterns: &[r"guaranteed", r"100%", r"risk free", r"instant profit"],
        weight: 1.0,
    },
    RiskCategory {
        name: "contact_pressure",
        patterns: &[r"dm me", r"private message", r"whatsapp", r"call now"],
        weight: 1.0,
    },
    RiskCategory {
        name: "medical_claims",
        patterns: &[r"miracle cure", r"instant healing", r"100% effective"],
        weight: 1.0,
    },
    RiskCategory {
        name: "price_manipulation",
        patterns: &[r"special price", r"discount", r"50% off", r"limited offer"],
        weight: 1.0,
    },
];

/// Medical/pharmaceutical product keywords, matched as lowercase substrings
pub const MEDICAL_PRODUCTS: &[&str] = &[
    "paracetamol",
    "ibuprofen",
    "aspirin",
    "antibiotic",
    "vaccine",
    "insulin",
    "cream",
    "pills",
    "tablets",
    "capsules",
    "syrup",
    "injection",
    "medicine",
    "drug",
    "pharmaceutical",
];

pub static RISK_REGISTRY: Lazy<CategoryRegistry> =
    Lazy::new(|| CategoryRegistry::compile(RISK_CATEGORIES));

pub static SUSPICIOUS_REGISTRY: Lazy<CategoryRegistry> =
    Lazy::new(|| CategoryRegistry::compile(SUSPICIOUS_CATEGORIES));

#[derive(Debug)]
struct CompiledCategory {
    definition: &'static RiskCategory,
    regexes: Vec<Regex>,
}

/// Compiled, ordered set of categories
#[derive(Debug)]
pub struct CategoryRegistry {
    categories: Vec<CompiledCategory>,
}

impl CategoryRegistry {
    fn compile(definitions: &'static [RiskCategory]) -> Self {
        let categories = definitions
            .iter()
            .map(|definition| CompiledCategory {
                definition,
                regexes: definition
                    .patterns
                    .iter()
                    .map(|p| Regex::new(p).expect("static risk pattern must compile"))
                    .collect(),
            })
            .collect();
        Self { categories }
    }

    /// Category definitions in registry order
    pub fn categories(&self) -> impl Iterator<Item = &'static RiskCategory> + '_ {
        self.categories.iter().map(|c| c.definition)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.categories().map(|c| c.name).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Position of a category in registry order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.definition.name == name)
    }

    /// Categories with at least one matching pattern, in registry order.
    /// Each category appears at most once no matter how many patterns match.
    pub fn matched(&self, text: &str) -> Vec<&'static RiskCategory> {
        let lowered = text.to_lowercase();
        self.categories
            .iter()
            .filter(|c| c.regexes.iter().any(|re| re.is_match(&lowered)))
            .map(|c| c.definition)
            .collect()
    }

    /// Sum of matched category weights, clipped to [0, 1]
    pub fn presence_score(&self, text: &str) -> f64 {
        self.matched(text)
            .iter()
            .map(|c| c.weight)
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }

    /// Non-overlapping occurrence count per category, summed over its patterns
    pub fn occurrence_counts(&self, text: &str) -> Vec<usize> {
        let lowered = text.to_lowercase();
        self.categories
            .iter()
            .map(|c| c.regexes.iter().map(|re| re.find_iter(&lowered).count()).sum())
            .collect()
    }
}

/// Medical product keywords found in the text, in keyword-list order
pub fn detect_products(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    MEDICAL_PRODUCTS
        .iter()
        .filter(|product| lowered.contains(*product))
        .map(|product| product.to_string())
        .collect()
}
