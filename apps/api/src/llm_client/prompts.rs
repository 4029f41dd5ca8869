// Shared prompt fragments. Feature modules keep their own prompts.rs
// alongside the code that uses them.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Persona shared by every interview prompt.
pub const INTERVIEWER_PERSONA: &str = "\
    You are an experienced hiring panelist running a realistic mock interview. \
    Be fair, specific and professional. Never reveal scoring rubrics to the candidate.";

/// Builds a system prompt from the persona, a task-specific instruction and the JSON rule.
pub fn system_prompt(task: &str) -> String {
    format!("{INTERVIEWER_PERSONA}\n\n{task}\n\n{JSON_ONLY_SYSTEM}")
}

/// Replaces each `{name}` placeholder with its value in a single left-to-right
/// pass. Substituted text is never rescanned, and braces that do not name a
/// known placeholder (the JSON shapes in the templates) are copied as is.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        filled.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let placeholder = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match placeholder {
            Some((value, close)) => {
                filled.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                filled.push('{');
                rest = after;
            }
        }
    }
    filled.push_str(rest);
    filled
}
