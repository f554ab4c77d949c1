//! Handoff writer.
//!
//! The terminal, templated stage: assembles the export manifest from
//! the four upstream documents and the asset index. Deterministic
//! over fixed inputs; no generation call, no budget consumption.

use super::{StageWriter, WriterContext, WriterError, WriterOutcome};
use async_trait::async_trait;
use quillflow_store::{DocName, Stage, StoreError};

pub struct HandoffWriter;

const UPSTREAM: [DocName; 4] = [
    DocName::Brief,
    DocName::Requirements,
    DocName::Blueprint,
    DocName::Workplan,
];

#[async_trait]
impl StageWriter for HandoffWriter {
    fn stage(&self) -> Stage {
        Stage::Handoff
    }

    fn required_inputs(&self) -> &'static [DocName] {
        &UPSTREAM
    }

    async fn write(&self, ctx: &mut WriterContext<'_>) -> Result<WriterOutcome, WriterError> {
        let mut body = String::from("# Handoff Package\n\n## Documents\n\n");

        for name in UPSTREAM {
            let doc = ctx
                .store
                .read_doc(ctx.session, name)
                .await?
                .ok_or(StoreError::DocumentNotFound {
                    session: ctx.session,
                    doc: name,
                })?;
            let status = if doc.approved { "approved" } else { "draft" };
            body.push_str(&format!(
                "- {} ({} bytes, {status})\n",
                name.file_name(),
                doc.byte_size()
            ));
        }

        body.push_str("\n## Assets\n\n");
        match ctx.assets.filter(|a| !a.is_empty()) {
            Some(assets) => {
                for line in assets.summary_lines() {
                    body.push_str(&line);
                    body.push('\n');
                }
            }
            None => body.push_str("No assets were attached to this session.\n"),
        }

        ctx.persist_and_announce(DocName::Handoff, body).await?;
        Ok(WriterOutcome::Ready)
    }
}
