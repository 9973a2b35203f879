//! Deployment names.
//!
//! A name becomes the engine stack name and the Kubernetes namespace, so it
//! has to be a DNS-1123 label. Generated names are three dash-joined words.

use std::sync::OnceLock;

use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;

use crate::engine::{DeployError, Result};

const MAX_NAME_LEN: usize = 63;
const NAME_PATTERN: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";

const ADVERBS: &[&str] = &[
    "amply", "boldly", "briskly", "calmly", "deftly", "eagerly", "fairly", "gently", "gladly",
    "keenly", "kindly", "lightly", "merrily", "neatly", "nimbly", "openly", "quietly", "rarely",
    "simply", "softly", "swiftly", "truly", "vastly", "warmly", "wisely",
];

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "bright", "clever", "cosmic", "crisp", "daring", "eager", "fancy", "gentle",
    "golden", "happy", "humble", "jolly", "lucid", "lively", "mellow", "noble", "polite", "quick",
    "rapid", "shiny", "steady", "sunny", "tidy", "vivid", "witty",
];

const NOUNS: &[&str] = &[
    "badger", "beacon", "canyon", "comet", "condor", "falcon", "fjord", "gecko", "harbor",
    "heron", "island", "lagoon", "lynx", "meadow", "otter", "panda", "pebble", "quail", "raven",
    "river", "salmon", "summit", "tiger", "walrus", "willow", "yak", "zebra",
];

/// A fresh `adverb-adjective-noun` name. Collisions with existing
/// deployments are not checked; the word lists make them unlikely.
pub fn generate() -> String {
    generate_with(&mut rand::rng())
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let words: Vec<&str> = [ADVERBS, ADJECTIVES, NOUNS]
        .iter()
        .filter_map(|list| list.choose(rng).copied())
        .collect();
    words.join("-")
}

pub fn validate(name: &str) -> Result<()> {
    let valid =
        name.len() <= MAX_NAME_LEN && name_pattern().is_some_and(|pattern| pattern.is_match(name));
    if valid {
        Ok(())
    } else {
        Err(DeployError::InvalidName(name.to_string()))
    }
}

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(NAME_PATTERN).ok()).as_ref()
}
