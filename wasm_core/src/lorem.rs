//! Placeholder text generator.
//!
//! Randomness is injected so callers (and tests) can seed it; [`generate`]
//! seeds a `StdRng` from the platform entropy source.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::debug;

use crate::error::ToolError;

/// Upper bound on `count`, keeping output size sane for a text area.
pub const MAX_COUNT: u32 = 1_000;

const SENTENCE_WORDS: RangeInclusive<usize> = 10..=20;
const PARAGRAPH_SENTENCES: RangeInclusive<usize> = 3..=6;

const CLASSIC_OPENING: [&str; 5] = ["lorem", "ipsum", "dolor", "sit", "amet"];

// "ut" appears twice, so it is drawn twice as often.
const WORDS: [&str; 35] = [
    "lorem",
    "ipsum",
    "dolor",
    "sit",
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "sed",
    "do",
    "eiusmod",
    "tempor",
    "incididunt",
    "ut",
    "labore",
    "et",
    "dolore",
    "magna",
    "aliqua",
    "enim",
    "ad",
    "minim",
    "veniam",
    "quis",
    "nostrud",
    "exercitation",
    "ullamco",
    "laboris",
    "nisi",
    "ut",
    "aliquip",
    "ex",
    "ea",
    "commodo",
    "consequat",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoremUnit {
    Words,
    Sentences,
    Paragraphs,
}

impl FromStr for LoremUnit {
    type Err = ToolError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "words" => Ok(Self::Words),
            "sentences" => Ok(Self::Sentences),
            "paragraphs" => Ok(Self::Paragraphs),
            other => Err(ToolError::Validation(format!(
                "Invalid generation type: {other}"
            ))),
        }
    }
}

impl fmt::Display for LoremUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Words => "words",
            Self::Sentences => "sentences",
            Self::Paragraphs => "paragraphs",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoremOptions {
    pub unit: LoremUnit,
    pub count: u32,
    pub classic_opening: bool,
}

impl Default for LoremOptions {
    fn default() -> Self {
        Self {
            unit: LoremUnit::Paragraphs,
            count: 3,
            classic_opening: true,
        }
    }
}

pub fn generate(options: LoremOptions) -> Result<String, ToolError> {
    let mut seed = [0u8; 32];
    getrandom::fill(&mut seed)
        .map_err(|err| ToolError::Processing(format!("entropy source unavailable: {err}")))?;
    generate_with(&mut StdRng::from_seed(seed), options)
}

pub fn generate_with<R>(rng: &mut R, options: LoremOptions) -> Result<String, ToolError>
where
    R: Rng + ?Sized,
{
    if options.count == 0 || options.count > MAX_COUNT {
        return Err(ToolError::Validation(format!(
            "count must be between 1 and {MAX_COUNT}"
        )));
    }
    debug!(unit = %options.unit, count = options.count, "lorem");
    let count = options.count as usize;
    Ok(match options.unit {
        LoremUnit::Words => words(rng, count, options.classic_opening),
        LoremUnit::Sentences => sentences(rng, count, options.classic_opening),
        LoremUnit::Paragraphs => paragraphs(rng, count, options.classic_opening),
    })
}

fn words<R: Rng + ?Sized>(rng: &mut R, count: usize, classic: bool) -> String {
    let opening: &[&str] = if classic { &CLASSIC_OPENING } else { &[] };
    let drawn = (0..count).filter_map(|_| WORDS.choose(&mut *rng).copied());
    opening
        .iter()
        .copied()
        .chain(drawn)
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

fn sentences<R: Rng + ?Sized>(rng: &mut R, count: usize, classic: bool) -> String {
    (0..count)
        .map(|index| {
            let length = rng.gen_range(SENTENCE_WORDS);
            let mut sentence = capitalize(&words(rng, length, classic && index == 0));
            sentence.push('.');
            sentence
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn paragraphs<R: Rng + ?Sized>(rng: &mut R, count: usize, classic: bool) -> String {
    (0..count)
        .map(|index| {
            let length = rng.gen_range(PARAGRAPH_SENTENCES);
            sentences(rng, length, classic && index == 0)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
