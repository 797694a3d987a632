use crate::models::{resolve_directive, Resolved, RewriteRequest};

const PREAMBLE: &str = r#"You are Chameleon, an assistant that rewrites email snippets for webmail users.

Rules:
- Keep the original meaning and facts.
- Improve clarity and flow; concise by default.
- Preserve names, links, dates, numbers.
- Return only the requested output (no preface, no commentary).
- Match the requested tone and align to the stated goal when provided.
"#;

const SINGLE_FORMAT: &str = r#"Return a JSON object with exactly two string fields: "subject" (a short proposed subject line) and "body" (the rewritten email, with "\n\n" between paragraphs). Return nothing else."#;

/// Build the completion prompt for a rewrite request.
///
/// Pure: the same request always yields the same text. `tones` is the effective comparison list
/// and is only read when the request asks for a comparison.
pub fn build(request: &RewriteRequest, tones: &[String]) -> String {
    let mut prompt = String::with_capacity(PREAMBLE.len() + request.text.len() + 512);
    prompt.push_str(PREAMBLE);
    prompt.push_str("\nInput:\n<email>\n");
    prompt.push_str(&request.text);
    prompt.push_str("\n</email>\n\n");

    if request.compare_tones {
        prompt.push_str(&format!(
            "Rewrite the input once for each of these tones, in this order: {}.\n",
            tones.join(", ")
        ));
        prompt.push_str(
            r#"Respond with a JSON array of objects { "tone": string, "text": string }, one per tone, in the same order."#,
        );
        return prompt;
    }

    match resolve_directive(request.tone.as_ref(), &request.custom_tone) {
        Resolved::Fixed(tone) => prompt.push_str(&format!("Tone: {tone}.\n")),
        Resolved::Infer => prompt.push_str(
            "Tone: infer the most fitting tone from the email and its context instead of imposing one.\n",
        ),
        Resolved::Unconstrained => {}
    }
    match resolve_directive(request.goal.as_ref(), &request.custom_goal) {
        Resolved::Fixed(goal) => prompt.push_str(&format!("Goal: {goal}.\n")),
        Resolved::Infer => prompt.push_str(
            "Goal: infer what the sender is trying to achieve and align the rewrite to it.\n",
        ),
        Resolved::Unconstrained => {}
    }
    let notes = request.custom_prompt.trim();
    if !notes.is_empty() {
        prompt.push_str(&format!("Additional notes: {notes}\n"));
    }

    prompt.push_str(SINGLE_FORMAT);
    prompt
}
