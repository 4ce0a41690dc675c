//! Quiz parsing: turn the model's JSON answer into validated questions.
//!
//! Models drift from the requested shape in predictable ways: fenced JSON, a
//! bare top-level array, prose before the object, an answer that is not one of
//! the options. The parser absorbs the first three and drops questions showing
//! the last, so the front end only ever gets answerable questions.

use crate::error::RelayError;
use crate::pipeline::postprocess::strip_code_fences;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Body of `POST /trans_quiz/get_questions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRequest {
    #[serde(default)]
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuiz {
    Object { questions: Vec<RawQuestion> },
    List(Vec<RawQuestion>),
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(default)]
    question: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    answer: String,
}

/// Parse and validate a model's quiz answer.
pub fn parse_quiz(raw: &str) -> Result<Quiz, RelayError> {
    let body = strip_code_fences(raw);
    let raw_questions = find_questions(&body)?;

    let total = raw_questions.len();
    let questions: Vec<QuizQuestion> = raw_questions.into_iter().filter_map(validate).collect();
    if questions.len() < total {
        debug!("Dropped {} malformed quiz questions", total - questions.len());
    }
    if questions.is_empty() {
        return Err(RelayError::InvalidModelOutput {
            detail: "quiz contained no usable questions".into(),
        });
    }
    Ok(Quiz { questions })
}

/// Try every `{` or `[` in order and keep the first one that starts a quiz.
///
/// Prose around the JSON may contain brackets of its own (`[5 questions]`),
/// so the first bracket is not necessarily the answer. A candidate that
/// parses but holds no questions only wins if nothing better follows.
fn find_questions(text: &str) -> Result<Vec<RawQuestion>, RelayError> {
    let mut first_error = None;
    let mut empty = None;

    for (start, _) in text.match_indices(['{', '[']) {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<RawQuiz>();
        match values.next() {
            Some(Ok(RawQuiz::Object { questions })) | Some(Ok(RawQuiz::List(questions))) => {
                if !questions.is_empty() {
                    return Ok(questions);
                }
                empty.get_or_insert(questions);
            }
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            None => {}
        }
    }

    if let Some(questions) = empty {
        return Ok(questions);
    }
    Err(RelayError::InvalidModelOutput {
        detail: match first_error {
            Some(e) => format!("quiz JSON did not match the expected shape: {e}"),
            None => "no JSON object in quiz answer".into(),
        },
    })
}

fn validate(q: RawQuestion) -> Option<QuizQuestion> {
    let question = q.question.trim().to_string();
    let options: Vec<String> = q
        .options
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    let answer = q.answer.trim().to_string();
    if question.is_empty() || options.len() < 2 || !options.contains(&answer) {
        return None;
    }
    Some(QuizQuestion {
        question,
        options,
        answer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{"questions": [
        {"question": "What does chlorophyll absorb?", "options": ["Light", "Water", "Salt", "Soil"], "answer": "Light"},
        {"question": "Where does photosynthesis happen?", "options": ["Roots", "Chloroplasts"], "answer": "Chloroplasts"}
    ]}"#;

    #[test]
    fn parses_plain_object() {
        let quiz = parse_quiz(GOOD).unwrap();
        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(quiz.questions[0].answer, "Light");
    }

    #[test]
    fn tolerates_fences_and_prose() {
        let fenced = format!("```json\n{GOOD}\n```");
        assert_eq!(parse_quiz(&fenced).unwrap().questions.len(), 2);

        let chatty = format!("Sure! Here is your quiz:\n{GOOD}\nGood luck.");
        assert_eq!(parse_quiz(&chatty).unwrap().questions.len(), 2);
    }

    #[test]
    fn skips_brackets_in_leading_prose() {
        let raw = r#"Sure [5 questions]: {"questions":[{"question":"Q?","options":["a","b"],"answer":"a"}]}"#;
        let quiz = parse_quiz(raw).unwrap();
        assert_eq!(quiz.questions[0].question, "Q?");

        let raw = r#"Format [] then {note} then {"questions":[{"question":"Q?","options":["a","b"],"answer":"b"}]}"#;
        assert_eq!(parse_quiz(raw).unwrap().questions[0].answer, "b");
    }

    #[test]
    fn accepts_top_level_array() {
        let raw = r#"[{"question": "2+2?", "options": ["3", "4"], "answer": "4"}]"#;
        assert_eq!(parse_quiz(raw).unwrap().questions[0].answer, "4");
    }

    #[test]
    fn drops_questions_with_foreign_answers() {
        let raw = r#"{"questions": [
            {"question": "2+2?", "options": ["3", "4"], "answer": "5"},
            {"question": "1+1?", "options": ["2", "3"], "answer": " 2 "}
        ]}"#;
        let quiz = parse_quiz(raw).unwrap();
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].question, "1+1?");
    }

    #[test]
    fn garbage_is_invalid_model_output() {
        for raw in ["I cannot help with that.", "{\"questions\": 3}", "{\"questions\": []}"] {
            assert!(matches!(
                parse_quiz(raw),
                Err(RelayError::InvalidModelOutput { .. })
            ));
        }
    }
}
