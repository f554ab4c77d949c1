//! Blueprint writer.

use super::{ensure_sections, StageWriter, WriterContext, WriterError, WriterOutcome};
use crate::validate::{extract_req_ids, required_sections};
use async_trait::async_trait;
use quillflow_gen::GenMessage;
use quillflow_store::{DocName, Stage};

const SYSTEM_PROMPT: &str = "You design technical blueprints from requirements documents. \
Write Markdown with these sections: '## Architecture', '## Components', '## Data Flow'. \
Reference the requirement ids (REQ-NNN) each part of the design covers.";

pub struct BlueprintWriter;

#[async_trait]
impl StageWriter for BlueprintWriter {
    fn stage(&self) -> Stage {
        Stage::Blueprint
    }

    fn required_inputs(&self) -> &'static [DocName] {
        &[DocName::Requirements]
    }

    async fn write(&self, ctx: &mut WriterContext<'_>) -> Result<WriterOutcome, WriterError> {
        let requirements = ctx.read_upstream(DocName::Requirements).await?;
        let req_ids = extract_req_ids(&requirements);

        let mut prompt = format!(
            "Requirements:\n\n{requirements}\n\nWrite the technical blueprint."
        );
        if let Some(assets) = ctx.assets.filter(|a| !a.is_empty()) {
            prompt.push_str("\n\nAssets available to the project:\n");
            prompt.push_str(&assets.summary_lines().join("\n"));
        }

        let messages = vec![GenMessage::system(SYSTEM_PROMPT), GenMessage::user(prompt)];
        let raw = ctx.call_generation(messages).await?;

        let mut body = ensure_sections(raw, required_sections(Stage::Blueprint));
        if !req_ids.is_empty() && !req_ids.iter().any(|id| body.contains(id.as_str())) {
            body.push_str(&format!(
                "\n## Traceability\n\nCovers {}.\n",
                req_ids.join(", ")
            ));
        }

        ctx.persist_and_announce(DocName::Blueprint, body).await?;
        Ok(WriterOutcome::Ready)
    }
}
