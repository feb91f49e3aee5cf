//! Keyword relevance ranking and snippet extraction.
//!
//! Everything here is a linear scan over the document list; there is no index.
//! Offsets are counted in characters so windows never split a UTF-8 sequence.

use once_cell::sync::Lazy;
use regex::Regex;

use super::document::{Document, DocumentKind};
use crate::utils::content_guard::truncate_chars;

/// How many documents make it into the prompt context.
pub const MAX_RELEVANT_DOCUMENTS: usize = 3;
/// Bonus for a document that contains the whole query verbatim.
pub const PHRASE_BONUS: usize = 10;
/// Length of the leading excerpt used when no sentence matches.
pub const DEFAULT_SNIPPET_LENGTH: usize = 1500;
/// Characters kept on each side of the best matching sentence.
pub const SNIPPET_CONTEXT_CHARS: usize = 300;
/// Sentences at or below this many characters never become the anchor.
const MIN_SENTENCE_CHARS: usize = 10;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument<'a> {
    pub document: &'a Document,
    pub score: usize,
}

/// A ranked document reduced to what goes into the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Excerpt {
    pub name: String,
    pub kind: DocumentKind,
    pub score: usize,
    pub snippet: String,
}

impl Excerpt {
    pub fn to_context_block(&self) -> String {
        format!("Document: {} ({})\n{}", self.name, self.kind.label(), self.snippet)
    }
}

fn query_words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Scores every document against the query and returns the best few, highest first.
///
/// A document scores one point per non-overlapping occurrence of each query word
/// (case-insensitive, substring match) plus [`PHRASE_BONUS`] when it contains the
/// whole query. Zero-score documents are dropped; ties keep their original order.
pub fn find_relevant_documents<'a>(query: &str, documents: &'a [Document]) -> Vec<ScoredDocument<'a>> {
    let words = query_words(query);
    let phrase = query.trim().to_lowercase();

    let mut scored: Vec<ScoredDocument<'a>> = documents
        .iter()
        .map(|document| {
            let content = document.content.to_lowercase();
            let mut score: usize = words
                .iter()
                .map(|word| content.matches(word.as_str()).count())
                .sum();
            if !phrase.is_empty() && content.contains(&phrase) {
                score += PHRASE_BONUS;
            }
            ScoredDocument { document, score }
        })
        .filter(|scored| scored.score > 0)
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(MAX_RELEVANT_DOCUMENTS);
    scored
}

/// Picks the passage of `content` that best matches `query`.
///
/// The anchor is the first sentence containing the most query words. The snippet
/// is that sentence plus [`SNIPPET_CONTEXT_CHARS`] characters on either side, with
/// `...` marking any cut. Without an anchor the first `max_length` characters are used.
pub fn extract_relevant_snippet(content: &str, query: &str, max_length: usize) -> String {
    let words = query_words(query);

    let mut best: Option<&str> = None;
    let mut best_score = 0;
    for sentence in SENTENCE_BOUNDARY.split(content) {
        let lower = sentence.to_lowercase();
        let score = words
            .iter()
            .filter(|word| lower.contains(word.as_str()))
            .count();
        let trimmed = sentence.trim();
        if score > best_score && trimmed.chars().count() > MIN_SENTENCE_CHARS {
            best_score = score;
            best = Some(trimmed);
        }
    }

    let anchor = match best {
        Some(sentence) if best_score > 0 => sentence,
        _ => {
            let (head, truncated) = truncate_chars(content, max_length);
            return if truncated {
                format!("{}...", head)
            } else {
                head.to_string()
            };
        }
    };

    let anchor_start = content.find(anchor).unwrap_or(0);
    let anchor_end = anchor_start + anchor.len();

    let window_start = content[..anchor_start]
        .char_indices()
        .rev()
        .nth(SNIPPET_CONTEXT_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window_end = content[anchor_end..]
        .char_indices()
        .nth(SNIPPET_CONTEXT_CHARS)
        .map(|(i, _)| anchor_end + i)
        .unwrap_or(content.len());

    let mut snippet = String::with_capacity(window_end - window_start + 6);
    if window_start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(&content[window_start..window_end]);
    if window_end < content.len() {
        snippet.push_str("...");
    }
    snippet
}

/// Turns ranked documents into excerpts carrying their best snippet.
pub fn build_excerpts(query: &str, ranked: &[ScoredDocument<'_>]) -> Vec<Excerpt> {
    ranked
        .iter()
        .map(|scored| Excerpt {
            name: scored.document.name.clone(),
            kind: scored.document.kind,
            score: scored.score,
            snippet: extract_relevant_snippet(
                &scored.document.content,
                query,
                DEFAULT_SNIPPET_LENGTH,
            ),
        })
        .collect()
}

/// Prompt context: one `Document: name (TYPE)` block per excerpt, separated by `---`.
pub fn build_context(excerpts: &[Excerpt]) -> String {
    excerpts
        .iter()
        .map(Excerpt::to_context_block)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, content: &str) -> Document {
        Document::new(
            name.to_string(),
            DocumentKind::Txt,
            content.to_string(),
            content.len() as u64,
            1,
        )
    }

    fn names(ranked: &[ScoredDocument<'_>]) -> Vec<String> {
        ranked.iter().map(|s| s.document.name.clone()).collect()
    }

    #[test]
    fn counts_every_occurrence_case_insensitively() {
        let docs = vec![doc("a.txt", "Rust rust RUST and more rust")];
        let ranked = find_relevant_documents("rust", &docs);
        // four word hits plus the phrase bonus (the query is a single word)
        assert_eq!(ranked[0].score, 4 + PHRASE_BONUS);
    }

    #[test]
    fn occurrences_do_not_overlap() {
        let docs = vec![doc("a.txt", "aaaa")];
        let ranked = find_relevant_documents("aa", &docs);
        assert_eq!(ranked[0].score, 2 + PHRASE_BONUS);
    }

    #[test]
    fn words_match_as_substrings() {
        let docs = vec![doc("a.txt", "the cats were catalogued")];
        let ranked = find_relevant_documents("cat dog", &docs);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 2);
    }

    #[test]
    fn phrase_match_adds_bonus() {
        let docs = vec![
            doc("split.txt", "safety of memory. Also memory and safety."),
            doc("phrase.txt", "we talk about memory safety here"),
        ];
        let ranked = find_relevant_documents("Memory Safety", &docs);
        assert_eq!(names(&ranked), vec!["phrase.txt", "split.txt"]);
        assert_eq!(ranked[0].score, 2 + PHRASE_BONUS);
        assert_eq!(ranked[1].score, 4);
    }

    #[test]
    fn drops_zero_scores_and_keeps_top_three_in_stable_order() {
        let docs = vec![
            doc("one.txt", "apple"),
            doc("none.txt", "banana"),
            doc("two.txt", "apple apple"),
            doc("one-b.txt", "apple"),
            doc("one-c.txt", "apple"),
        ];
        let ranked = find_relevant_documents("apple", &docs);
        assert_eq!(names(&ranked), vec!["two.txt", "one.txt", "one-b.txt"]);
    }

    #[test]
    fn special_characters_are_literal() {
        let docs = vec![doc("cpp.txt", "I write c++ and (sometimes) C")];
        let ranked = find_relevant_documents("c++ (sometimes)", &docs);
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].score >= 2);
    }

    #[test]
    fn empty_collection_yields_nothing() {
        assert!(find_relevant_documents("anything", &[]).is_empty());
    }

    #[test]
    fn snippet_without_match_is_leading_text() {
        let content = "x".repeat(2000);
        let snippet = extract_relevant_snippet(&content, "zebra", DEFAULT_SNIPPET_LENGTH);
        assert_eq!(snippet.len(), DEFAULT_SNIPPET_LENGTH + 3);
        assert!(snippet.ends_with("..."));

        let short = extract_relevant_snippet("short text", "zebra", DEFAULT_SNIPPET_LENGTH);
        assert_eq!(short, "short text");
    }

    #[test]
    fn short_sentences_are_never_anchors() {
        // "Zebra ok" is a match but too short, so we fall back to the leading text
        let snippet = extract_relevant_snippet("Zebra ok. Nothing else here", "zebra", 5);
        assert_eq!(snippet, "Zebra...");
    }

    #[test]
    fn snippet_windows_around_best_sentence() {
        let before = "a".repeat(500);
        let after = "b".repeat(500);
        let content = format!("{}. The zebra lives in Africa. {}", before, after);
        let snippet = extract_relevant_snippet(&content, "zebra africa", DEFAULT_SNIPPET_LENGTH);

        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("The zebra lives in Africa"));
        let body = &snippet[3..snippet.len() - 3];
        assert_eq!(body.chars().count(), 300 + "The zebra lives in Africa".len() + 300);
    }

    #[test]
    fn snippet_prefers_first_sentence_with_most_hits() {
        let content = "Cats are small animals. Dogs and cats share homes. Dogs and cats and birds too.";
        let snippet = extract_relevant_snippet(content, "dogs cats", DEFAULT_SNIPPET_LENGTH);
        // the whole text is shorter than the window, so no ellipses
        assert_eq!(snippet, content);
    }

    #[test]
    fn snippet_window_counts_characters_not_bytes() {
        let before = "é".repeat(400);
        let content = format!("{}. Unicode zebra sentence here. end", before);
        let snippet = extract_relevant_snippet(&content, "zebra", DEFAULT_SNIPPET_LENGTH);
        assert!(snippet.starts_with("..."));
        let prefix: String = snippet[3..].chars().take_while(|c| *c == 'é').collect();
        // 300 characters back from the anchor: two are ". " and the rest are é
        assert_eq!(prefix.chars().count(), 298);
        assert!(!snippet.ends_with("..."));
    }

    #[test]
    fn context_blocks_are_labelled_and_separated() {
        let docs = vec![
            doc("a.txt", "The apple is red and tasty."),
            doc("b.txt", "Another apple sentence is here."),
        ];
        let ranked = find_relevant_documents("apple", &docs);
        let excerpts = build_excerpts("apple", &ranked);
        let context = build_context(&excerpts);
        assert_eq!(
            context,
            "Document: a.txt (TXT)\nThe apple is red and tasty.\n\n---\n\nDocument: b.txt (TXT)\nAnother apple sentence is here."
        );
    }
}
