//! LLM-backed flashcard generation: prompt construction, the opaque
//! generation call, and defensive parsing of the free-text response.

use futures::future::BoxFuture;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::{
    services::content::{ContentError, validate_deck},
    state::game::{Card, GameDifficulty},
};

/// Reference document text attached to a generation request.
///
/// Extraction from the stored binary is the document service's job; by the
/// time content generation runs we only see plain text.
#[derive(Debug, Clone)]
pub struct DocumentAttachment {
    /// Original file name, shown to the model for context.
    pub name: String,
    /// Extracted document text.
    pub text: String,
}

/// Opaque LLM generation call: takes a prompt plus attachments, returns the
/// model's raw text response or fails.
pub trait CardGenerator: Send + Sync {
    /// Run one stateless generation call.
    fn generate(
        &self,
        prompt: String,
        attachments: Vec<DocumentAttachment>,
    ) -> BoxFuture<'static, Result<String, ContentError>>;
}

/// Acquire a validated deck of `num_cards` cards from the generator.
pub async fn generate_cards(
    generator: &dyn CardGenerator,
    topic: &str,
    num_cards: u8,
    difficulty: GameDifficulty,
    attachments: Vec<DocumentAttachment>,
) -> Result<Vec<Card>, ContentError> {
    let prompt = build_prompt(topic, num_cards, difficulty, !attachments.is_empty());
    let response = generator.generate(prompt, attachments).await?;
    let cards = parse_cards(&response)?;
    validate_deck(cards, num_cards as usize)
}

/// Difficulty-specific generation instructions.
fn difficulty_instruction(difficulty: GameDifficulty) -> &'static str {
    match difficulty {
        GameDifficulty::Easy => {
            "Focus on high-level definitions and basic terminology. \
             Options should be clearly distinct."
        }
        GameDifficulty::Medium => {
            "Focus on application of concepts and standard edge cases. \
             Options should be plausible."
        }
        GameDifficulty::Hard => {
            "Focus on specific details, complex relationships, or 'trick' questions. \
             Options should be very similar to test precision. HOWEVER, the question \
             MUST remain short enough to read and solve within the answer window."
        }
    }
}

/// Build the flashcard-generation prompt for a speed-round deck.
pub fn build_prompt(
    topic: &str,
    num_cards: u8,
    difficulty: GameDifficulty,
    grounded_in_documents: bool,
) -> String {
    let grounding = if grounded_in_documents {
        "Questions must be derived directly from the attached documents."
    } else {
        "Questions must stay within the stated topic."
    };

    format!(
        "You are a Flashcard Generator for a speed-round game.\n\
         Task: Generate {num_cards} flashcards.\n\
         Topic Focus: {topic}\n\
         \n\
         Difficulty Level: {difficulty}\n\
         Specific Instructions: {instruction}\n\
         \n\
         Format: Return ONLY a raw JSON list of objects. No markdown formatting.\n\
         Structure:\n\
         [\n\
           {{\n\
             \"front\": \"Question or term\",\n\
             \"back\": \"The correct answer\",\n\
             \"options\": [\"four\", \"distinct\", \"answer\", \"options\"]\n\
           }}\n\
         ]\n\
         \n\
         Constraints:\n\
         - \"options\" must contain exactly 4 strings.\n\
         - \"back\" must match exactly one of the strings in \"options\".\n\
         - {grounding}\n\
         - The question text must be concise (under 20 words if possible).\n\
         - Players only have a few seconds. Do not generate paragraphs or complex scenarios.\n",
        num_cards = num_cards,
        topic = topic,
        difficulty = difficulty.as_str().to_uppercase(),
        instruction = difficulty_instruction(difficulty),
        grounding = grounding,
    )
}

/// Parse the model's free-text response into cards.
///
/// Models reliably emit *almost*-JSON, so parsing degrades gracefully:
/// strict JSON first, then trailing-comma repair, then a tolerant pass that
/// accepts single-quoted strings and Python boolean/null literals. Only when
/// all three fail does the caller see an error.
pub fn parse_cards(response: &str) -> Result<Vec<Card>, ContentError> {
    let (start, end) = match (response.find('['), response.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(ContentError::Unparseable(
                "no JSON list found in response".into(),
            ));
        }
    };
    let list = &response[start..=end];

    if let Ok(cards) = serde_json::from_str::<Vec<Card>>(list) {
        return Ok(cards);
    }

    let repaired = strip_trailing_commas(list);
    if let Ok(cards) = serde_json::from_str::<Vec<Card>>(&repaired) {
        return Ok(cards);
    }

    let tolerant = strip_trailing_commas(&pythonish_to_json(list));
    serde_json::from_str::<Vec<Card>>(&tolerant)
        .map_err(|err| ContentError::Unparseable(err.to_string()))
}

/// Drop commas that directly precede a closing bracket or brace.
fn strip_trailing_commas(input: &str) -> String {
    // Unwrap is fine: the pattern is a compile-time constant.
    let pattern = Regex::new(r",\s*([\]}])").expect("valid trailing-comma pattern");
    pattern.replace_all(input, "$1").into_owned()
}

/// Rewrite Python-flavored literals into JSON: single-quoted strings become
/// double-quoted, `True`/`False`/`None` become their JSON spellings. String
/// contents are preserved, including quotes of the other kind.
fn pythonish_to_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let quote = c;
                out.push('"');
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    if c == '\\' && i + 1 < chars.len() {
                        let next = chars[i + 1];
                        if next == '\'' {
                            // `\'` only needs escaping inside single quotes.
                            out.push('\'');
                        } else {
                            out.push('\\');
                            out.push(next);
                        }
                        i += 2;
                        continue;
                    }
                    if c == quote {
                        break;
                    }
                    if c == '"' {
                        out.push_str("\\\"");
                    } else {
                        out.push(c);
                    }
                    i += 1;
                }
                out.push('"');
                i += 1;
            }
            c if c.is_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    other => out.push_str(other),
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    out
}

/// Generation client for a Gemini-style `generateContent` endpoint.
pub struct GeminiGenerator {
    client: Client,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    /// Build a generator for the given model, authenticated by API key.
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            model,
            api_key,
        }
    }
}

impl CardGenerator for GeminiGenerator {
    fn generate(
        &self,
        prompt: String,
        attachments: Vec<DocumentAttachment>,
    ) -> BoxFuture<'static, Result<String, ContentError>> {
        let client = self.client.clone();
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let api_key = self.api_key.clone();

        Box::pin(async move {
            let mut parts = vec![json!({ "text": prompt })];
            for attachment in attachments {
                parts.push(json!({
                    "text": format!("Document `{}`:\n{}", attachment.name, attachment.text)
                }));
            }
            let body = json!({
                "contents": [{ "parts": parts }],
                "generationConfig": { "maxOutputTokens": 4000 }
            });

            let response = client
                .post(&url)
                .query(&[("key", api_key.as_str())])
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ContentError::Backend(format!(
                    "generation endpoint returned {}",
                    response.status()
                )));
            }

            let payload: GenerateContentResponse = response.json().await?;
            payload
                .candidates
                .into_iter()
                .next()
                .and_then(|candidate| candidate.content.parts.into_iter().next())
                .map(|part| part.text)
                .ok_or_else(|| {
                    ContentError::Backend("generation response contained no candidates".into())
                })
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}
