//! Shared word lists and compiled patterns for the built-in checkers.
//!
//! Compiled once per process on first use and read-only afterwards, so every
//! worker thread shares the same instance.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

pub struct Lexicon {
    pub word: Regex,
    pub sentence: Regex,
    /// be-verb, optional adverb, past participle.
    pub passive: Regex,
    pub vague_term: Regex,
    pub placeholder: Regex,
    pub modal: Regex,
    pub acronym: Regex,
    /// `Long Form (ACR)`; group 1 is the acronym.
    pub acronym_after_definition: Regex,
    /// `ACR (Long Form)`; groups are acronym and expansion.
    pub acronym_before_definition: Regex,
    /// `the Role shall`; group 1 is the role.
    pub role_subject: Regex,
    /// Upper-case tokens that never need a definition.
    pub well_known_acronyms: HashSet<&'static str>,
    /// Words skipped when matching acronym initials.
    pub connectors: HashSet<&'static str>,
}

pub static LEXICON: LazyLock<Lexicon> = LazyLock::new(|| Lexicon {
    word: Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'’\-]*").unwrap(),
    sentence: Regex::new(r"[^.!?]+(?:[.!?]+|$)").unwrap(),
    passive: Regex::new(concat!(
        r"(?i)\b(?:am|is|are|was|were|be|been|being)\s+(?:[a-z]+ly\s+)?",
        r"(?:[a-z]{2,}ed|known|written|given|taken|made|done|seen|shown|built|sent|held|kept|found|",
        r"paid|sold|told|brought|bought|caught|taught|chosen|driven|broken|spoken|frozen|",
        r"stolen|forgotten|hidden|set|put|read|run|met|understood|withdrawn|undertaken)\b",
    ))
    .unwrap(),
    vague_term: Regex::new(concat!(
        r"(?i)\b(?:appropriate|adequate|as needed|as required|as appropriate|user[- ]friendly|",
        r"etc|and/or|reasonable|sufficient|approximately|flexible|robust|state[- ]of[- ]the[- ]art|",
        r"easy to use|if possible|where practical|minimi[sz]e|maximi[sz]e|timely|various)\b",
    ))
    .unwrap(),
    placeholder: Regex::new(r"\b(?:TBD|TBR|TBS|TBC|XXX)\b").unwrap(),
    modal: Regex::new(r"(?i)\b(?:shall|will|must)\b").unwrap(),
    acronym: Regex::new(r"\b[A-Z][A-Z0-9]{1,5}s?\b").unwrap(),
    acronym_after_definition: Regex::new(r"\(([A-Z][A-Z0-9]{1,5})s?\)").unwrap(),
    acronym_before_definition: Regex::new(r"\b([A-Z][A-Z0-9]{1,5})\s+\(([A-Za-z][^()]{2,80})\)")
        .unwrap(),
    role_subject: Regex::new(concat!(
        r"\b[Tt]he\s+((?:[A-Z][a-z]+\s+){0,3}[A-Z][a-z]+|[A-Z][A-Z0-9]{1,5})",
        r"\s+(?:shall|will|must|should|may)\b",
    ))
    .unwrap(),
    well_known_acronyms: [
        "TBD", "TBR", "TBS", "TBC", "XXX", "PDF", "US", "USA", "UK", "EU", "UN", "ID", "OK",
        "FAQ", "URL", "HTML", "XML", "JSON", "API", "CEO", "CFO", "CTO", "IT", "HR", "ISO",
        "IEEE", "ASAP", "II", "III", "IV", "VI", "VII", "VIII", "IX", "XI", "XII", "NOTE", "NOT",
        "AND", "OR", "THE", "SHALL", "MUST", "WILL", "ALL", "ANY", "NO", "YES",
    ]
    .into_iter()
    .collect(),
    connectors: ["of", "and", "the", "for", "to", "in", "on", "&"].into_iter().collect(),
});

/// Words of `text` with their byte offsets.
pub fn words(text: &str) -> impl Iterator<Item = (usize, &str)> {
    LEXICON.word.find_iter(text).map(|m| (m.start(), m.as_str()))
}

/// Sentences of `text` with their byte offsets, leading whitespace trimmed.
pub fn sentences(text: &str) -> Vec<(usize, &str)> {
    LEXICON
        .sentence
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str();
            let trimmed = raw.trim_start();
            let start = m.start() + (raw.len() - trimmed.len());
            let trimmed = trimmed.trim_end();
            (!trimmed.is_empty()).then_some((start, trimmed))
        })
        .collect()
}

/// Lines set entirely in capitals (banners, shouted headings).
pub fn is_shouting(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 8 && letters.iter().filter(|c| c.is_uppercase()).count() * 10 >= letters.len() * 9
}
