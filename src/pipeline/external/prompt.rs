use serde::Serialize;

use crate::catalog::CategoryCatalog;
use crate::models::enums::EntrustmentLevel;

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are helping an attending physician draft a \
resident EPA assessment from a FEEDBACK conversation transcript. This output is a DRAFT only. \
The attending will review/edit and must approve before sending. You must be conservative: if \
unsure about the EPA mapping, set primary_epa_id = null and lower confidence. If the transcript \
lacks specific evidence, set insufficient_evidence = true, explain why in insufficient_reason, \
and keep evidence-related arrays sparse (including empty arrays). Evidence quotes must be \
verbatim excerpts of the transcript. Do not invent patient identifiers; the transcript is \
de-identified already. Return ONLY valid JSON matching the required schema.";

const OUTPUT_SCHEMA: &str = r#"Output JSON fields required:
{
  "insufficient_evidence": boolean,
  "insufficient_reason": string|null (<=400 chars),
  "primary_epa_id": string|null,
  "secondary_epa_ids": string[<=2],
  "epa_confidence": number 0-1,
  "epa_rationale": string (<=400 chars),
  "entrustment_level": "Intervention"|"Direction"|"Support"|"Autonomy"|"Excellence",
  "entrustment_confidence": number 0-1,
  "strengths": string[] (2-6 concise bullets; allow 0 when insufficient_evidence=true),
  "improvements": string[] (2-6 concise bullets; actionable; allow 0 when insufficient_evidence=true),
  "next_steps": string[] (2-6 concrete next-time steps; allow 0 when insufficient_evidence=true),
  "evidence_quotes": string[] (2-6 short verbatim excerpts from transcript; allow 0 when insufficient_evidence=true),
  "summary_comment": string (20-1200 chars; fair, specific, non-judgmental)
}

Return JSON only."#;

#[derive(Serialize)]
struct PromptCategory<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
}

/// Build the user message for one transcript. Categories are listed sorted
/// by id so the prompt is stable for a given catalog.
pub fn build_analysis_prompt(
    transcript: &str,
    context: Option<&str>,
    catalog: &CategoryCatalog,
) -> String {
    let categories: Vec<PromptCategory> = catalog
        .sorted()
        .into_iter()
        .map(|e| PromptCategory {
            id: &e.id,
            title: &e.title,
            description: &e.description,
        })
        .collect();
    let category_list = serde_json::to_string_pretty(&categories).unwrap_or_else(|_| "[]".into());

    let scale: String = EntrustmentLevel::ALL
        .iter()
        .map(|level| format!("- {}: {}\n", level, level.descriptor()))
        .collect();

    let context = context
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("unknown");

    format!(
        "Task: (1) map the transcript to the best matching EPA from the list, \
(2) suggest an entrustment level, and (3) draft feedback.

Entrustment scale (choose one):
{scale}
Context (optional): {context}

EPA LIST (closed set):
{category_list}

Transcript (de-identified):
<transcript>
{transcript}
</transcript>

{OUTPUT_SCHEMA}"
    )
}
