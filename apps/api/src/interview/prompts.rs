// Prompt templates for the interview generation backend.
// Placeholders are filled in one pass by `llm_client::prompts::fill_template`;
// JSON-bearing placeholders get serialized values.

pub const QUESTION_TASK: &str = "\
    Your task is to ask the NEXT interview question for one round of a mock interview. \
    Ask exactly one question. It must be answerable verbally in two to four minutes and \
    must not repeat or paraphrase any question already asked in this round.";

pub const QUESTION_PROMPT_TEMPLATE: &str = r#"Interview mode: {mode}
Target: {context_name}
Background (job description or topics):
"""
{context_text}
"""

Round type: {round_type}
Difficulty: {difficulty}

Conversation so far in this round (oldest first):
{history_json}

Respond with a JSON object of this exact shape:
{
  "question": "<the question to ask>",
  "category": "<short category label, e.g. system design, teamwork, clarity>",
  "what_to_look_for": ["<signal a strong answer shows>", "..."],
  "sample_answer_points": ["<point a strong answer covers>", "..."]
}"#;

pub const ANSWER_TASK: &str = "\
    Your task is to score one candidate answer against the question and the evaluation \
    hints. Scores are 0-100. Be calibrated: 70 means a solid, hireable answer.";

pub const ANSWER_PROMPT_TEMPLATE: &str = r#"Round type: {round_type}

Question:
"""
{question}
"""

Evaluation hints (what a strong answer covers):
{expected_points_json}

Candidate answer:
"""
{answer}
"""

Respond with a JSON object of this exact shape:
{
  "score": <0-100 overall>,
  "content_score": <0-100>,
  "clarity_score": <0-100>,
  "depth_score": <0-100>,
  "strengths": ["..."],
  "improvements": ["..."],
  "feedback": "<two or three sentences addressed to the candidate>",
  "pass": <true|false>,
  "confidence_level": "<low|medium|high>"
}"#;

pub const FINAL_TASK: &str = "\
    Your task is to write the closing evaluation of a completed multi-round mock interview. \
    Weigh every round. Recommendations must be concrete next steps.";

pub const FINAL_PROMPT_TEMPLATE: &str = r#"Interview mode: {mode}
Target: {context_name}

Round scores:
{round_scores_json}

Condensed transcript (answers may be truncated):
{transcript_json}

Respond with a JSON object of this exact shape:
{
  "overall_score": <0-100>,
  "technical_score": <0-100>,
  "communication_score": <0-100>,
  "problem_solving_score": <0-100>,
  "confidence_score": <0-100>,
  "strengths": ["..."],
  "weaknesses": ["..."],
  "recommendations": ["..."],
  "pass": <true|false>
}"#;
