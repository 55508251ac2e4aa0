use std::collections::{BTreeMap, BTreeSet};

use super::CANDIDATE_REJECT_DELTA;
use crate::learning::LearningDomain;
use crate::pipeline::checkers::context::{CheckContext, Checker};
use crate::pipeline::checkers::lexicon::{is_shouting, words, LEXICON};
use crate::pipeline::checkers::types::{CheckerGroup, CheckerOutput, Finding, Location, Severity};
use crate::pipeline::checkers::CheckerError;
use crate::pipeline::extraction::Paragraph;

pub const ID: &str = "acronyms";

/// Artifact: sorted acronyms with a definition.
pub const DEFINED: &str = "defined";
/// Artifact: `ACR=Expansion` entries.
pub const EXPANSIONS: &str = "expansions";
/// Artifact: sorted acronyms seen in body text.
pub const USED: &str = "used";

/// Learning category for acronym candidates.
pub const CANDIDATE_CATEGORY: &str = "acronym";

pub struct Acronyms;

struct Definition {
    acronym: String,
    expansion: Option<String>,
    location: Location,
}

impl Checker for Acronyms {
    fn id(&self) -> &'static str {
        ID
    }

    fn group(&self) -> CheckerGroup {
        CheckerGroup::Nlp
    }

    fn description(&self) -> &'static str {
        "Finds acronyms used without a definition or defined more than once"
    }

    fn candidate_domain(&self) -> Option<LearningDomain> {
        Some(LearningDomain::AcronymCandidates)
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        let mut definitions = Vec::new();
        // Byte ranges of definition spans; acronyms inside them are not uses.
        let mut definition_spans: Vec<(usize, usize)> = Vec::new();
        for paragraph in &ctx.structure().paragraphs {
            for caps in LEXICON.acronym_after_definition.captures_iter(&paragraph.text) {
                let (Some(whole), Some(acr)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                definitions.push(Definition {
                    acronym: acr.as_str().to_string(),
                    expansion: expansion_before(&paragraph.text[..whole.start()], acr.as_str()),
                    location: ctx.locate(paragraph, acr.start(), acr.len()),
                });
                definition_spans.push((paragraph.start + whole.start(), paragraph.start + whole.end()));
            }
            for caps in LEXICON.acronym_before_definition.captures_iter(&paragraph.text) {
                let (Some(whole), Some(acr), Some(exp)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                    continue;
                };
                if !initials_match(exp.as_str(), acr.as_str()) {
                    continue;
                }
                definitions.push(Definition {
                    acronym: acr.as_str().to_string(),
                    expansion: Some(exp.as_str().trim().to_string()),
                    location: ctx.locate(paragraph, acr.start(), acr.len()),
                });
                definition_spans.push((paragraph.start + whole.start(), paragraph.start + whole.end()));
            }
        }
        definitions.sort_by_key(|d| d.location);

        let mut findings = Vec::new();
        let mut defined: BTreeMap<String, Option<String>> = BTreeMap::new();
        for def in &definitions {
            if defined.contains_key(&def.acronym) {
                findings.push(
                    Finding::new(
                        ID,
                        "ACRONYM-002",
                        "terminology",
                        Severity::Minor,
                        def.location,
                        format!("Acronym \"{}\" is defined more than once", def.acronym),
                    )
                    .flagged(def.acronym.as_str())
                    .confidence(0.8),
                );
                continue;
            }
            defined.insert(def.acronym.clone(), def.expansion.clone());
        }

        let mut used = BTreeSet::new();
        for paragraph in ctx.body_paragraphs().filter(|p| !is_shouting(&p.text)) {
            for m in LEXICON.acronym.find_iter(&paragraph.text) {
                let absolute = paragraph.start + m.start();
                if definition_spans.iter().any(|(s, e)| absolute >= *s && absolute < *e) {
                    continue;
                }
                let Some(acronym) = candidate(m.as_str()) else {
                    continue;
                };
                if ctx.learned_delta(CANDIDATE_CATEGORY, acronym) <= CANDIDATE_REJECT_DELTA {
                    continue;
                }
                used.insert(acronym.to_string());
                if defined.contains_key(acronym) {
                    continue;
                }
                findings.push(undefined_use(ctx, paragraph, m.start(), acronym));
            }
        }

        let expansions = defined
            .iter()
            .filter_map(|(acr, exp)| exp.as_ref().map(|e| format!("{acr}={e}")))
            .collect();
        Ok(CheckerOutput::findings(findings)
            .with_artifact(DEFINED, defined.keys().cloned().collect())
            .with_artifact(EXPANSIONS, expansions)
            .with_artifact(USED, used.into_iter().collect()))
    }
}

fn undefined_use(ctx: &CheckContext<'_>, paragraph: &Paragraph, start: usize, acronym: &str) -> Finding {
    Finding::new(
        ID,
        "ACRONYM-001",
        "terminology",
        Severity::Major,
        ctx.locate(paragraph, start, acronym.len()),
        format!("Acronym \"{acronym}\" is used but never defined"),
    )
    .flagged(acronym)
    .confidence(0.65)
}

/// Strip a plural `s` and drop tokens that are not acronyms.
fn candidate(token: &str) -> Option<&str> {
    let acronym = token.strip_suffix('s').unwrap_or(token);
    let letters = acronym.chars().filter(char::is_ascii_uppercase).count();
    if letters < 2 || LEXICON.well_known_acronyms.contains(acronym) {
        return None;
    }
    Some(acronym)
}

/// Letters of the acronym equal the initials of the expansion, with or
/// without its connector words.
fn initials_match(expansion: &str, acronym: &str) -> bool {
    let letters: String = acronym.chars().filter(char::is_ascii_alphabetic).collect();
    let tokens: Vec<&str> = words(expansion).map(|(_, w)| w).collect();
    let initials = |skip_connectors: bool| -> String {
        tokens
            .iter()
            .filter(|w| !skip_connectors || !LEXICON.connectors.contains(w.to_lowercase().as_str()))
            .filter_map(|w| w.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    };
    !letters.is_empty() && (initials(true) == letters || initials(false) == letters)
}

/// Expansion preceding `Long Form (ACR)`: the shortest run of trailing words
/// whose initials spell the acronym.
fn expansion_before(preceding: &str, acronym: &str) -> Option<String> {
    let letters = acronym.chars().filter(char::is_ascii_alphabetic).count();
    let trimmed = preceding.trim_end();
    let tokens: Vec<(usize, &str)> = words(trimmed).collect();
    let longest = (letters * 2).min(tokens.len());
    (letters..=longest)
        .map(|take| trimmed[tokens[tokens.len() - take].0..].trim())
        .find(|candidate| initials_match(candidate, acronym))
        .map(str::to_string)
}
