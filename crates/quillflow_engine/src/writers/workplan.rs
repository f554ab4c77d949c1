//! Workplan writer.

use super::{ensure_sections, StageWriter, WriterContext, WriterError, WriterOutcome};
use crate::validate::{extract_req_ids, required_sections};
use async_trait::async_trait;
use quillflow_gen::GenMessage;
use quillflow_store::{DocName, Stage};

const SYSTEM_PROMPT: &str = "You break technical blueprints into work plans. \
Write Markdown with these sections: '## Milestones', '## Tasks'. Tasks are \
unchecked checkboxes ('- [ ] ...') and name the requirement ids (REQ-NNN) they cover.";

pub struct WorkplanWriter;

#[async_trait]
impl StageWriter for WorkplanWriter {
    fn stage(&self) -> Stage {
        Stage::Workplan
    }

    fn required_inputs(&self) -> &'static [DocName] {
        &[DocName::Blueprint, DocName::Requirements]
    }

    async fn write(&self, ctx: &mut WriterContext<'_>) -> Result<WriterOutcome, WriterError> {
        let blueprint = ctx.read_upstream(DocName::Blueprint).await?;
        let requirements = ctx.read_upstream(DocName::Requirements).await?;
        let req_ids = extract_req_ids(&requirements);

        let messages = vec![
            GenMessage::system(SYSTEM_PROMPT),
            GenMessage::user(format!(
                "Blueprint:\n\n{blueprint}\n\nRequirements:\n\n{requirements}\n\nWrite the work plan."
            )),
        ];
        let raw = ctx.call_generation(messages).await?;

        let mut body = ensure_sections(raw, required_sections(Stage::Workplan));
        if !body.lines().any(|l| l.trim_start().starts_with("- [ ]")) {
            let coverage = req_ids
                .first()
                .map(|id| format!(" covering {id}"))
                .unwrap_or_default();
            body.push_str(&format!(
                "\n- [ ] Review the work plan with the delivery team{coverage}\n"
            ));
        } else if !req_ids.is_empty() && !req_ids.iter().any(|id| body.contains(id.as_str())) {
            body.push_str(&format!(
                "\n- [ ] Confirm coverage of {}\n",
                req_ids.join(", ")
            ));
        }

        ctx.persist_and_announce(DocName::Workplan, body).await?;
        Ok(WriterOutcome::Ready)
    }
}
