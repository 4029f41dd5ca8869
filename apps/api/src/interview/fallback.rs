//! Fallback Question Synthesizer.
//!
//! Deterministic, keyword-driven questions.
//!
//! Used whenever the generation backend fails, returns nothing usable, or
//! repeats a question already asked in the round. No I/O, no randomness:
//! identical inputs always produce the identical question.
//!
//! Algorithm:
//! 1. Tokenize the job description / topic text (lowercase, keep letters,
//!    digits, `+`, `.`, `#`, whitespace; tokens of 2–24 chars; stop words dropped)
//! 2. Rank tokens by frequency desc, then alphabetically; top 3 are the focus keywords
//! 3. Fill the round type's template pool with the focus keywords
//! 4. Return the first template not already asked; the generic question if all were

use std::collections::{HashMap, HashSet};

use crate::interview::backend::GeneratedQuestion;
use crate::models::interview::RoundType;

const FOCUS_KEYWORD_COUNT: usize = 3;
const MIN_TOKEN_CHARS: usize = 2;
const MAX_TOKEN_CHARS: usize = 24;

/// Placeholder when neither the job text nor the topics yield a keyword.
const NO_KEYWORD: &str = "your core skills";

/// Asked once every template of the pool has been used.
pub const GENERIC_QUESTION: &str = "Tell me about something you have worked on recently that \
    you are proud of, and what you would do differently next time.";

const STOP_WORDS: &[&str] = &[
    // articles, conjunctions, prepositions
    "a", "an", "the", "and", "or", "but", "nor", "of", "to", "in", "on", "for", "with", "at",
    "by", "from", "as", "into", "onto", "over", "about", "across", "within", "per", "via",
    // pronouns
    "i", "me", "my", "we", "us", "our", "ours", "you", "your", "yours", "he", "she", "him",
    "her", "they", "them", "their", "it", "its", "this", "that", "these", "those", "who",
    "whom", "what", "which",
    // auxiliaries
    "is", "are", "was", "were", "be", "been", "being", "will", "would", "can", "could",
    "should", "must", "may", "might", "have", "has", "had", "do", "does", "did",
    // role-description filler
    "role", "job", "position", "candidate", "candidates", "team", "teams", "work", "working",
    "experience", "experienced", "years", "year", "skills", "skill", "ability", "abilities",
    "strong", "excellent", "good", "great", "required", "requirements", "preferred", "plus",
    "responsibilities", "responsible", "including", "etc", "able", "looking", "join",
    "company", "opportunity", "knowledge", "understanding", "environment", "such", "also",
    "well", "all", "any", "more", "new", "other", "using", "use", "ideal", "seeking",
];

const TECHNICAL_TEMPLATES: &[&str] = &[
    "Walk me through a project where you used {k1}. What was the hardest technical problem and how did you solve it?",
    "How would you explain the core trade-offs of {k2} to a teammate who has never used it?",
    "Describe how you would design a small production system that relies on {k1} and {k3}. What would fail first?",
    "Tell me about a bug or performance issue involving {k2}. How did you find the root cause?",
    "If a new engineer had one week to become productive with {k3}, what would you teach first and why?",
    "How do you test and validate work that depends on {k1}?",
];

const BEHAVIORAL_TEMPLATES: &[&str] = &[
    "Tell me about a time you had to learn {k1} quickly to meet a deadline. What did you do?",
    "Describe a disagreement with a teammate about how to approach {k2}. How was it resolved?",
    "Tell me about a mistake you made while working with {k3} and what you changed afterwards.",
    "Why does a role centred on {k1} interest you at this point in your career?",
    "Describe a situation where you had to prioritise competing demands. How did you decide what came first?",
    "Tell me about feedback you received that changed the way you work.",
];

const COMMUNICATION_TEMPLATES: &[&str] = &[
    "Explain {k1} to a non-technical stakeholder in under two minutes.",
    "How would you present a risky decision about {k2} to leadership?",
    "Summarise a complex piece of work involving {k3} as if you were writing a weekly status update.",
    "How do you make sure a discussion about {k1} ends with clear next steps for everyone involved?",
    "How would you adapt your explanation of {k2} for a junior colleague compared with an expert?",
];

/// Lowercased, whitespace-collapsed form used to compare question texts.
pub fn normalize_question(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Splits free text into candidate keyword tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '+' | '.' | '#'))
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| {
            let len = token.chars().count();
            (MIN_TOKEN_CHARS..=MAX_TOKEN_CHARS).contains(&len)
        })
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Top keywords of `text` by frequency (ties alphabetical), falling back to
/// the first non-empty `topics` when the text yields none.
pub fn focus_keywords(text: &str, topics: &[String]) -> Vec<String> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let keywords: Vec<String> = ranked
        .into_iter()
        .take(FOCUS_KEYWORD_COUNT)
        .map(|(token, _)| token)
        .collect();

    if !keywords.is_empty() {
        return keywords;
    }

    topics
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take(FOCUS_KEYWORD_COUNT)
        .map(str::to_string)
        .collect()
}

fn template_pool(round_type: RoundType) -> &'static [&'static str] {
    match round_type {
        RoundType::Technical => TECHNICAL_TEMPLATES,
        RoundType::Hr | RoundType::Behavioral => BEHAVIORAL_TEMPLATES,
        RoundType::Communication => COMMUNICATION_TEMPLATES,
    }
}

fn category_for(round_type: RoundType) -> &'static str {
    match round_type {
        RoundType::Technical => "technical",
        RoundType::Hr | RoundType::Behavioral => "behavioral",
        RoundType::Communication => "communication",
    }
}

fn evaluation_points_for(round_type: RoundType) -> Vec<String> {
    let points: &[&str] = match round_type {
        RoundType::Technical => &[
            "Accurate use of technical concepts",
            "Concrete example from real work",
            "Discussion of trade-offs or alternatives",
            "Structured problem-solving approach",
        ],
        RoundType::Hr | RoundType::Behavioral => &[
            "Clear situation, task, action and result",
            "Personal ownership of actions",
            "Reflection on what was learned",
            "Measurable or observable outcome",
        ],
        RoundType::Communication => &[
            "Clear structure with a beginning, middle and end",
            "Language adapted to the audience",
            "Concise delivery without filler",
            "Explicit summary or next steps",
        ],
    };
    points.iter().map(|p| p.to_string()).collect()
}

/// Fills `{k1}`..`{k3}`, cycling the available keywords when fewer than three.
fn fill_template(template: &str, keywords: &[String]) -> String {
    let keyword = |i: usize| -> &str {
        if keywords.is_empty() {
            NO_KEYWORD
        } else {
            &keywords[i % keywords.len()]
        }
    };
    template
        .replace("{k1}", keyword(0))
        .replace("{k2}", keyword(1))
        .replace("{k3}", keyword(2))
}

/// Produces a question that is not in `asked` (compared after normalization),
/// unless the whole pool is exhausted, in which case `GENERIC_QUESTION` is returned.
pub fn synthesize_question(
    round_type: RoundType,
    context_text: &str,
    topics: &[String],
    asked: &[String],
) -> GeneratedQuestion {
    let keywords = focus_keywords(context_text, topics);
    let forbidden: HashSet<String> = asked.iter().map(|q| normalize_question(q)).collect();

    let question = template_pool(round_type)
        .iter()
        .map(|template| fill_template(template, &keywords))
        .find(|candidate| !forbidden.contains(&normalize_question(candidate)))
        .unwrap_or_else(|| GENERIC_QUESTION.to_string());

    GeneratedQuestion {
        question,
        category: category_for(round_type).to_string(),
        what_to_look_for: evaluation_points_for(round_type),
        sample_answer_points: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JD: &str = "Senior Rust Engineer. You will build Rust services on Kubernetes today. \
        Rust and Kafka experience required; Kubernetes a plus. C++ or C# welcome.";

    #[test]
    fn test_tokenize_strips_punctuation_and_stop_words() {
        let tokens = tokenize("We need C++, C# and Node.js (strong experience)!");
        assert_eq!(tokens, vec!["need", "c++", "c#", "node.js"]);
    }

    #[test]
    fn test_tokenize_drops_short_and_long_tokens() {
        let long = "x".repeat(25);
        let tokens = tokenize(&format!("a go {long} sql"));
        assert_eq!(tokens, vec!["go", "sql"]);
    }

    #[test]
    fn test_tokenize_keeps_dots_as_token_characters() {
        assert_eq!(tokenize("Ship .NET apps."), vec!["ship", ".net", "apps."]);
        assert_eq!(tokenize("Kubernetes. kubernetes"), vec!["kubernetes.", "kubernetes"]);
    }

    #[test]
    fn test_focus_keywords_rank_by_frequency_then_alphabet() {
        let keywords = focus_keywords(JD, &[]);
        // rust ×3, kubernetes ×2, then the alphabetically first of the singletons
        assert_eq!(keywords, vec!["rust", "kubernetes", "build"]);
    }

    #[test]
    fn test_focus_keywords_fall_back_to_topics() {
        let topics = vec!["graphs".to_string(), " ".to_string(), "dynamic programming".to_string()];
        let keywords = focus_keywords("the and of", &topics);
        assert_eq!(keywords, vec!["graphs", "dynamic programming"]);
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let a = synthesize_question(RoundType::Technical, JD, &[], &[]);
        let b = synthesize_question(RoundType::Technical, JD, &[], &[]);
        assert_eq!(a.question, b.question);
        assert!(a.question.contains("rust"));
        assert_eq!(a.category, "technical");
        assert!(!a.what_to_look_for.is_empty());
    }

    #[test]
    fn test_synthesize_skips_asked_questions() {
        let first = synthesize_question(RoundType::Communication, JD, &[], &[]);
        // Case and spacing differences still count as the same question
        let asked = vec![format!("  {}  ", first.question.to_uppercase())];
        let second = synthesize_question(RoundType::Communication, JD, &[], &asked);
        assert_ne!(normalize_question(&first.question), normalize_question(&second.question));
    }

    #[test]
    fn test_synthesize_never_repeats_until_pool_exhausted() {
        let mut asked: Vec<String> = Vec::new();
        for _ in 0..TECHNICAL_TEMPLATES.len() {
            let q = synthesize_question(RoundType::Technical, JD, &[], &asked);
            assert!(!asked.contains(&q.question), "repeated: {}", q.question);
            asked.push(q.question);
        }
        let exhausted = synthesize_question(RoundType::Technical, JD, &[], &asked);
        assert_eq!(exhausted.question, GENERIC_QUESTION);
    }

    #[test]
    fn test_hr_and_behavioral_share_pool() {
        let hr = synthesize_question(RoundType::Hr, JD, &[], &[]);
        let behavioral = synthesize_question(RoundType::Behavioral, JD, &[], &[]);
        assert_eq!(hr.question, behavioral.question);
        assert_eq!(hr.category, "behavioral");
    }

    #[test]
    fn test_synthesize_without_any_keywords_uses_placeholder() {
        let q = synthesize_question(RoundType::Technical, "", &[], &[]);
        assert!(q.question.contains(NO_KEYWORD));
    }
}
