//! Word challenges that guard power-up pickups.
//!
//! When a session runs with [`PickupMode::Challenge`](crate::PickupMode),
//! stepping onto a pickup opens a [`Challenge`] for the mover. The session
//! treats the [`ChallengeProvider`] as a black box: whatever it generates
//! is shown to the solver, whatever it says about an answer is final. If
//! the provider fails, the session falls back to [`Challenge::fallback`],
//! which anyone can solve, so nobody is ever stuck on a broken puzzle.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, RngCore};
use reaper_grid::Cell;
use reaper_protocol::{ChallengeKind, ChallengePrompt};

/// The answer the fallback challenge accepts.
pub const FALLBACK_ANSWER: &str = "ghost";

/// Errors a provider may report. The session never surfaces these to a
/// client; it logs them and falls back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    #[error("challenge provider failed: {0}")]
    Provider(String),
}

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

/// What an answer must look like to solve a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    /// The answer must equal this word.
    Exact(String),
    /// The answer must start with this prefix and have at least
    /// [`AnswerKey::MIN_CHAIN_LEN`] letters.
    StartsWith(String),
    /// The answer must be one of these words.
    OneOf(Vec<String>),
}

impl AnswerKey {
    pub const MIN_CHAIN_LEN: usize = 3;

    /// Checks an answer that has already been through [`normalize_answer`].
    pub fn accepts(&self, answer: &str) -> bool {
        match self {
            Self::Exact(word) => answer == word,
            Self::StartsWith(prefix) => {
                answer.starts_with(prefix.as_str())
                    && answer.chars().count() >= Self::MIN_CHAIN_LEN
            }
            Self::OneOf(words) => words.iter().any(|w| w == answer),
        }
    }
}

/// A generated puzzle: the prompt shown to the solver and the hidden key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub kind: ChallengeKind,
    pub prompt: String,
    pub key: AnswerKey,
    /// The pickup cell this challenge guards.
    pub cell: Cell,
}

impl Challenge {
    /// The trivial challenge used when a provider fails.
    pub fn fallback(cell: Cell) -> Self {
        Self {
            kind: ChallengeKind::Fallback,
            prompt: format!("Whisper \"{FALLBACK_ANSWER}\" to claim the power-up"),
            key: AnswerKey::Exact(FALLBACK_ANSWER.to_string()),
            cell,
        }
    }

    /// Whether a raw answer solves this challenge by its own key.
    pub fn accepts(&self, raw: &str) -> bool {
        normalize_answer(raw).is_some_and(|answer| self.key.accepts(&answer))
    }

    /// The public part, safe to send to the solver.
    pub fn prompt(&self) -> ChallengePrompt {
        ChallengePrompt {
            kind: self.kind,
            prompt: self.prompt.clone(),
            cell: self.cell,
        }
    }
}

/// Trims and lowercases an answer.
///
/// Returns `None` unless the result is at least two ASCII letters and
/// nothing else.
pub fn normalize_answer(raw: &str) -> Option<String> {
    let answer = raw.trim().to_ascii_lowercase();
    if answer.len() < 2 || !answer.bytes().all(|b| b.is_ascii_lowercase()) {
        return None;
    }
    Some(answer)
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Generates and checks challenges.
///
/// Shared by every session of a registry, so it must be `Send + Sync`.
/// The session passes its own random source so seeded sessions stay
/// reproducible.
pub trait ChallengeProvider: Send + Sync + 'static {
    /// Creates a challenge guarding `cell`.
    fn generate(&self, cell: Cell, rng: &mut dyn RngCore) -> Result<Challenge, ChallengeError>;

    /// Decides whether `answer` solves `challenge`.
    ///
    /// Default: normalize the answer and check it against the key.
    fn validate(&self, challenge: &Challenge, answer: &str) -> Result<bool, ChallengeError> {
        Ok(challenge.accepts(answer))
    }
}

// ---------------------------------------------------------------------------
// WordPuzzles
// ---------------------------------------------------------------------------

const WORDS: &[&str] = &[
    "ghost", "shadow", "whisper", "reaper", "lantern", "crypt", "raven", "candle",
    "grave", "spirit", "midnight", "coffin", "haunt", "phantom",
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("animal", &["lion", "elephant", "giraffe", "zebra", "penguin", "tiger", "bear"]),
    ("color", &["red", "blue", "green", "yellow", "purple", "orange", "pink"]),
    ("fruit", &["apple", "banana", "orange", "grape", "mango", "pear", "kiwi"]),
    ("country", &["france", "spain", "italy", "germany", "japan", "brazil", "canada"]),
];

/// The built-in provider: anagrams, categories and word chains over fixed
/// word lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordPuzzles;

impl WordPuzzles {
    fn anagram(rng: &mut dyn RngCore, cell: Cell) -> Result<Challenge, ChallengeError> {
        let word = *WORDS.choose(rng).ok_or_else(empty_list)?;
        let mut letters: Vec<char> = word.chars().collect();
        // A few tries to avoid handing out the word unscrambled.
        for _ in 0..4 {
            letters.shuffle(rng);
            if letters.iter().collect::<String>() != word {
                break;
            }
        }
        let scrambled: String = letters.into_iter().collect();
        Ok(Challenge {
            kind: ChallengeKind::Anagram,
            prompt: format!("Unscramble: {scrambled}"),
            key: AnswerKey::Exact(word.to_string()),
            cell,
        })
    }

    fn category(rng: &mut dyn RngCore, cell: Cell) -> Result<Challenge, ChallengeError> {
        let (name, words) = *CATEGORIES.choose(rng).ok_or_else(empty_list)?;
        Ok(Challenge {
            kind: ChallengeKind::Category,
            prompt: format!("Name a {name}"),
            key: AnswerKey::OneOf(words.iter().map(|w| w.to_string()).collect()),
            cell,
        })
    }

    fn word_chain(rng: &mut dyn RngCore, cell: Cell) -> Result<Challenge, ChallengeError> {
        let word = *WORDS.choose(rng).ok_or_else(empty_list)?;
        let prefix = &word[word.len().saturating_sub(2)..];
        Ok(Challenge {
            kind: ChallengeKind::WordChain,
            prompt: format!(
                "Give a word of at least {} letters starting with \"{prefix}\"",
                AnswerKey::MIN_CHAIN_LEN
            ),
            key: AnswerKey::StartsWith(prefix.to_string()),
            cell,
        })
    }
}

impl ChallengeProvider for WordPuzzles {
    fn generate(&self, cell: Cell, rng: &mut dyn RngCore) -> Result<Challenge, ChallengeError> {
        match rng.random_range(0..3) {
            0 => Self::anagram(rng, cell),
            1 => Self::category(rng, cell),
            _ => Self::word_chain(rng, cell),
        }
    }
}

fn empty_list() -> ChallengeError {
    ChallengeError::Provider("word list is empty".into())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_normalize_answer_rules() {
        assert_eq!(normalize_answer("  Ghost "), Some("ghost".into()));
        assert_eq!(normalize_answer("a"), None);
        assert_eq!(normalize_answer("gh0st"), None);
        assert_eq!(normalize_answer("two words"), None);
    }

    #[test]
    fn test_fallback_accepts_its_answer() {
        let challenge = Challenge::fallback(5);
        assert_eq!(challenge.kind, ChallengeKind::Fallback);
        assert!(challenge.accepts("GHOST"));
        assert!(!challenge.accepts("shadow"));
        assert_eq!(challenge.prompt().cell, 5);
    }

    #[test]
    fn test_starts_with_needs_three_letters() {
        let key = AnswerKey::StartsWith("st".into());
        assert!(key.accepts("stone"));
        assert!(!key.accepts("st"));
        assert!(!key.accepts("tone"));
    }

    #[test]
    fn test_one_of_matches_listed_words() {
        let key = AnswerKey::OneOf(vec!["kiwi".into(), "pear".into()]);
        assert!(key.accepts("pear"));
        assert!(!key.accepts("plum"));
    }

    #[test]
    fn test_word_puzzles_generate_solvable_challenges() {
        let mut rng = StdRng::seed_from_u64(7);
        for cell in 0..50 {
            let challenge = WordPuzzles.generate(cell, &mut rng).unwrap();
            assert_eq!(challenge.cell, cell);
            let solution = match &challenge.key {
                AnswerKey::Exact(word) => word.clone(),
                AnswerKey::StartsWith(prefix) => format!("{prefix}xyz"),
                AnswerKey::OneOf(words) => words[0].clone(),
            };
            assert!(WordPuzzles.validate(&challenge, &solution).unwrap());
            assert!(!WordPuzzles.validate(&challenge, "1").unwrap());
        }
    }

    #[test]
    fn test_anagram_prompt_uses_same_letters() {
        let mut rng = StdRng::seed_from_u64(1);
        let challenge = WordPuzzles::anagram(&mut rng, 0).unwrap();
        let AnswerKey::Exact(word) = &challenge.key else {
            panic!("anagram must have an exact key");
        };
        let scrambled = challenge.prompt.trim_start_matches("Unscramble: ");
        let mut a: Vec<char> = scrambled.chars().collect();
        let mut b: Vec<char> = word.chars().collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }
}
