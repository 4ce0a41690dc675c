//! System prompts for the generative endpoints.
//!
//! Kept in one place so unit tests can inspect them without a live model.

/// System prompt for describing an uploaded screenshot.
pub const SCREENSHOT_SYSTEM_PROMPT: &str = r#"You are an assistant that reads screenshots of lecture slides and course material.

Follow these rules precisely:

1. Transcribe ALL readable text in reading order
2. Describe diagrams, charts and figures in one or two sentences each
3. Use Markdown headings and lists where the slide uses them
4. Do NOT invent content that is not visible
5. Output ONLY the transcription; no commentary and no ```markdown fences"#;

/// User prompt sent with the screenshot when the caller gives none.
pub const DEFAULT_SCREENSHOT_PROMPT: &str = "Transcribe and describe this screenshot.";

/// System prompt for quiz generation.
pub const QUIZ_SYSTEM_PROMPT: &str = r#"You write multiple-choice quizzes from lecture transcripts.

Respond with a single JSON object and nothing else, in exactly this shape:

{"questions": [{"question": "...", "options": ["...", "...", "...", "..."], "answer": "..."}]}

Rules:
- Every question is answerable from the transcript alone
- Each question has exactly four distinct options
- "answer" is copied verbatim from one of the options
- Do NOT wrap the JSON in code fences"#;

/// Build the user message for quiz generation.
pub fn quiz_prompt(transcript: &str, questions: usize) -> String {
    format!(
        "Write {} questions about the following transcript.\n\n\"\"\"{}\"\"\"",
        questions,
        transcript.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_prompt_embeds_transcript_and_count() {
        let p = quiz_prompt("  Photosynthesis converts light.  ", 3);
        assert!(p.starts_with("Write 3 questions"));
        assert!(p.contains("\"\"\"Photosynthesis converts light.\"\"\""));
    }

    #[test]
    fn quiz_system_prompt_describes_json_shape() {
        assert!(QUIZ_SYSTEM_PROMPT.contains("\"questions\""));
        assert!(QUIZ_SYSTEM_PROMPT.contains("\"answer\""));
    }
}
