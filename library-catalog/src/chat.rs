//! Keyword-driven book suggestions for the chat endpoint.
//!
//! Two passes: titles that contain the whole message, then a small hand-made
//! map from topic keywords to related titles, filtered to what the catalog
//! actually holds.

use crate::catalog::Catalog;

const MAX_SUGGESTIONS: usize = 3;

const EMPTY_PROMPT: &str = "I'm listening! Ask me about any book, character, or topic.";
const FALLBACK: &str =
    "I'm not sure which book you mean. Try mentioning a character, genre, or title keyword!";

/// Keyword fragment -> titles (or title fragments) it relates to.
const KNOWLEDGE_BASE: &[(&str, &[&str])] = &[
    ("sherlock", &["Sherlock Holmes"]),
    ("holmes", &["Sherlock Holmes"]),
    ("watson", &["Sherlock Holmes"]),
    ("detective", &["Sherlock Holmes", "Case of the Lame Canary", "Agatha Christie"]),
    ("dinosaur", &["Jurassic Park"]),
    ("jurassic", &["Jurassic Park"]),
    ("langdon", &["Angels & Demons"]),
    ("illuminati", &["Angels & Demons"]),
    ("vatican", &["Angels & Demons"]),
    ("raskolnikov", &["Crime and Punishment"]),
    ("murder", &["Crime and Punishment", "Sherlock Holmes"]),
    ("napoleon", &["Animal Farm"]),
    ("pig", &["Animal Farm"]),
    ("communis", &["Animal Farm", "Karl Marx"]),
    ("wizard", &["Harry Potter"]),
    ("magic", &["Harry Potter", "The Amulet of Samarkand"]),
    ("hobbit", &["Lord of the Rings"]),
    ("ring", &["Lord of the Rings"]),
    ("economics", &["Wealth of Nations", "Freakonomics", "Superfreakonomics"]),
    ("freak", &["Freakonomics"]),
    ("physics", &["Physics & Philosophy", "Tao of Physics", "Feynman"]),
    ("feynman", &["Surely You're Joking Mr Feynman"]),
    ("joking", &["Surely You're Joking Mr Feynman"]),
    ("wavelet", &["Fundamentals of Wavelets"]),
    ("signal", &["Fundamentals of Wavelets", "Signals and Systems"]),
    (
        "india",
        &["Discovery of India", "Integration of the Indian States", "India from Midnight to Milennium"],
    ),
    ("nehru", &["Discovery of India"]),
    ("gandhi", &["My Experiments with Truth"]),
    ("hitler", &["Mein Kampf"]),
    ("war", &["Mein Kampf", "War and Peace", "Farewell to Arms", "Once There Was a War"]),
    ("hemingway", &["Farewell to Arms"]),
    ("steinbeck", &["Grapes of Wrath", "Russian Journal", "Moon is Down"]),
    ("grapes", &["Grapes of Wrath"]),
    ("monk", &["The Monk Who Sold His Ferrari"]),
    ("ferrari", &["The Monk Who Sold His Ferrari"]),
    ("kalam", &["Wings of Fire"]),
    ("fire", &["Wings of Fire", "Harry Potter", "Girl who played with Fire"]),
    ("girl", &["Girl with the Dragon Tattoo", "Girl who played with Fire"]),
    ("dragon", &["Girl with the Dragon Tattoo"]),
    ("tattoo", &["Girl with the Dragon Tattoo"]),
    ("vampire", &["Twilight", "Dracula"]),
    ("potter", &["Harry Potter"]),
];

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn related_concepts(message: &str) -> Vec<&'static str> {
    let mut concepts = Vec::new();
    let tokens = message
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| !token.is_empty());
    for token in tokens {
        for (keyword, titles) in KNOWLEDGE_BASE {
            // "dinosaurs" should still hit "dinosaur".
            if token.contains(keyword) {
                for title in *titles {
                    if !concepts.contains(title) {
                        concepts.push(*title);
                    }
                }
            }
        }
    }
    concepts
}

/// Builds a chat reply suggesting books from `catalog` for `message`.
pub fn recommend(catalog: &Catalog, message: &str) -> String {
    let message = message.trim().to_lowercase();
    if message.is_empty() {
        return EMPTY_PROMPT.to_string();
    }

    let mut found = Vec::new();
    for record in catalog.list(false) {
        if record.title().to_lowercase().contains(&message) {
            push_unique(&mut found, format!("{} (ID: {})", record.title(), record.id()));
        }
    }

    let concepts = related_concepts(&message);
    let mut recommendations = Vec::new();
    for concept in &concepts {
        let concept = concept.to_lowercase();
        for record in catalog.list(false) {
            if record.title().to_lowercase().contains(&concept) {
                push_unique(&mut recommendations, format!("{} (#{})", record.title(), record.id()));
            }
        }
    }

    let mut response = String::new();
    if !found.is_empty() {
        let shown: Vec<&str> = found.iter().take(MAX_SUGGESTIONS).map(String::as_str).collect();
        response.push_str(&format!(
            "I found these books matching '{message}': {}. ",
            shown.join(", ")
        ));
    }

    if !recommendations.is_empty() {
        let shown: Vec<&str> = recommendations
            .iter()
            .take(MAX_SUGGESTIONS)
            .map(String::as_str)
            .collect();
        response.push_str(&format!(
            "Based on your interest in '{message}', you might like: {}.",
            shown.join(", ")
        ));
    } else if !concepts.is_empty() && found.is_empty() {
        let hinted: Vec<&str> = concepts.iter().take(2).copied().collect();
        response.push_str(&format!(
            "I think you're looking for something related to {}, but I don't see it in stock right now.",
            hinted.join(", ")
        ));
    }

    if response.is_empty() {
        FALLBACK.to_string()
    } else {
        response.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{catalog::CatalogOptions, files::CatalogFiles};

    fn catalog_with(titles: &str) -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = CatalogFiles::in_dir(dir.path());
        fs::write(&files.titles, titles).expect("seed");
        let catalog = Catalog::open(files, CatalogOptions::default()).expect("open");
        (dir, catalog)
    }

    #[test]
    fn empty_message_prompts_for_input() {
        let (_dir, catalog) = catalog_with("Dune\n");
        assert_eq!(recommend(&catalog, "   "), EMPTY_PROMPT);
    }

    #[test]
    fn direct_title_match_is_reported_with_id() {
        let (_dir, catalog) = catalog_with("Dune\nEmma\n");
        let reply = recommend(&catalog, "DUNE");
        assert!(reply.contains("Dune (ID: 101)"), "{reply}");
    }

    #[test]
    fn keywords_map_to_titles_in_stock() {
        let (_dir, catalog) = catalog_with("Jurassic Park\nEmma\n");
        let reply = recommend(&catalog, "I like dinosaurs");
        assert!(reply.contains("you might like: Jurassic Park (#101)"), "{reply}");
    }

    #[test]
    fn known_topic_without_stock_says_so() {
        let (_dir, catalog) = catalog_with("Emma\n");
        let reply = recommend(&catalog, "vampire");
        assert!(reply.contains("Twilight"), "{reply}");
        assert!(reply.contains("don't see it in stock"), "{reply}");
    }

    #[test]
    fn unknown_topic_falls_back() {
        let (_dir, catalog) = catalog_with("Emma\n");
        assert_eq!(recommend(&catalog, "quantum gardening"), FALLBACK);
    }
}
