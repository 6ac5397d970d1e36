//! Question source abstraction: builds a normalized card deck from either the
//! LLM generation endpoint or the external trivia provider.

pub mod llm;
pub mod trivia;

use thiserror::Error;

use crate::state::game::Card;

/// Failure to acquire a usable card deck. Surfaced to the game-creation
/// caller; never leaks raw parse or transport errors past this boundary.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The generation backend rejected the request or answered abnormally.
    #[error("generation backend error: {0}")]
    Backend(String),
    /// LLM decks were requested but no generator is configured.
    #[error("no LLM generator is configured")]
    GeneratorMissing,
    /// The generation response could not be parsed into cards.
    #[error("could not parse generated cards: {0}")]
    Unparseable(String),
    /// The deck parsed but violates the card invariants.
    #[error("generated deck is invalid: {0}")]
    InvalidDeck(String),
    /// The trivia provider answered with a non-success response code.
    #[error("trivia provider returned code {0}")]
    Provider(u8),
    /// The trivia provider could not be reached.
    #[error("trivia provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Check a freshly acquired deck against the card invariants and the
/// requested size.
pub(crate) fn validate_deck(cards: Vec<Card>, requested: usize) -> Result<Vec<Card>, ContentError> {
    if cards.len() < requested {
        return Err(ContentError::InvalidDeck(format!(
            "expected {requested} cards, got {}",
            cards.len()
        )));
    }
    let mut cards = cards;
    cards.truncate(requested);
    for card in &cards {
        card.validate().map_err(ContentError::InvalidDeck)?;
    }
    Ok(cards)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(i: usize) -> Card {
        Card {
            front: format!("Q{i}"),
            back: "A".into(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        }
    }

    #[test]
    fn deck_is_truncated_to_requested_size() {
        let deck = validate_deck(vec![card(0), card(1), card(2)], 2).unwrap();
        assert_eq!(deck.len(), 2);
    }

    #[test]
    fn short_deck_is_rejected() {
        assert!(validate_deck(vec![card(0)], 3).is_err());
    }

    #[test]
    fn malformed_card_is_rejected() {
        let mut bad = card(0);
        bad.options.pop();
        assert!(validate_deck(vec![bad], 1).is_err());
    }
}
