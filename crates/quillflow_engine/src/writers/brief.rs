//! Interactive brief writer.
//!
//! The only multi-turn stage: it interviews the user through the chat
//! transcript, one focused question per turn, until either readiness
//! signal fires. Then it compiles the conversation into `brief.md`.

use super::{ensure_sections, StageWriter, WriterContext, WriterError, WriterOutcome};
use crate::readiness::{assistant_signals_ready, ready_to_compile, strip_ready_marker};
use crate::validate::required_sections;
use async_trait::async_trait;
use quillflow_gen::GenMessage;
use quillflow_protocol::{PipelineEvent, ReasonCode};
use quillflow_store::{ChatMessage, ChatRole, DocName, Stage};
use tracing::info;

const INTERVIEW_SYSTEM_PROMPT: &str = "You run the intake interview for a new document project. \
Ask exactly one focused question per turn about the project, its goals, audience, and constraints. \
Once the answers cover project, goals, and constraints well enough to write a one-page brief, \
append the token [[READY_TO_DRAFT]] to your reply instead of asking another question.";

const COMPILE_SYSTEM_PROMPT: &str = "You compile intake interviews into a concise project brief. \
Write Markdown with exactly these sections: '## Project', '## Goals', '## Constraints'. \
Use only information from the conversation; do not invent facts.";

pub struct BriefWriter;

impl BriefWriter {
    /// Render the persisted transcript as prompt messages.
    fn transcript_messages(transcript: &[ChatMessage]) -> Vec<GenMessage> {
        transcript
            .iter()
            .filter_map(|m| match m.role {
                ChatRole::User => Some(GenMessage::user(m.content.clone())),
                ChatRole::Assistant => Some(GenMessage::assistant(m.content.clone())),
                ChatRole::Orchestrator => None,
            })
            .collect()
    }

    async fn compile(
        &self,
        ctx: &mut WriterContext<'_>,
        transcript: &[ChatMessage],
    ) -> Result<WriterOutcome, WriterError> {
        let mut messages = vec![GenMessage::system(COMPILE_SYSTEM_PROMPT)];
        messages.extend(Self::transcript_messages(transcript));
        messages.push(GenMessage::user(
            "Compile the project brief from this conversation now.",
        ));

        let raw = ctx.call_generation(messages).await?;
        let body = ensure_sections(
            strip_ready_marker(&raw),
            required_sections(Stage::Brief),
        );

        ctx.persist_and_announce(DocName::Brief, body).await?;
        ctx.store
            .append_chat(ChatMessage::new(
                ctx.session,
                Some(Stage::Brief),
                ChatRole::Orchestrator,
                "Compiled brief.md from the intake conversation.",
            ))
            .await?;
        info!(session = %ctx.session, "compiled project brief");
        Ok(WriterOutcome::Ready)
    }

    async fn ask_next_question(
        &self,
        ctx: &mut WriterContext<'_>,
        transcript: &[ChatMessage],
    ) -> Result<WriterOutcome, WriterError> {
        let mut messages = vec![GenMessage::system(INTERVIEW_SYSTEM_PROMPT)];
        let history = Self::transcript_messages(transcript);
        if history.is_empty() {
            messages.push(GenMessage::user(
                "Start the intake interview for a new project.",
            ));
        } else {
            messages.extend(history);
        }

        let reply = ctx.call_generation(messages).await?;

        if assistant_signals_ready(&reply) {
            // The marker is the assistant's out-of-band signal; strip
            // it before anything reaches a human transcript.
            let visible = strip_ready_marker(&reply);
            let mut extended = transcript.to_vec();
            if !visible.trim().is_empty() {
                let closing = ChatMessage::new(
                    ctx.session,
                    Some(Stage::Brief),
                    ChatRole::Assistant,
                    visible.clone(),
                );
                ctx.store.append_chat(closing.clone()).await?;
                ctx.sink
                    .emit(PipelineEvent::AssistantDelta { text: visible });
                extended.push(closing);
            }
            return self.compile(ctx, &extended).await;
        }

        ctx.store
            .append_chat(ChatMessage::new(
                ctx.session,
                Some(Stage::Brief),
                ChatRole::Assistant,
                reply.clone(),
            ))
            .await?;
        ctx.sink.emit(PipelineEvent::AssistantDelta { text: reply });
        Ok(WriterOutcome::NeedsMore(ReasonCode::AwaitingUser))
    }
}

#[async_trait]
impl StageWriter for BriefWriter {
    fn stage(&self) -> Stage {
        Stage::Brief
    }

    fn required_inputs(&self) -> &'static [DocName] {
        &[]
    }

    async fn write(&self, ctx: &mut WriterContext<'_>) -> Result<WriterOutcome, WriterError> {
        let transcript = ctx
            .store
            .chat_history(ctx.session, Some(Stage::Brief))
            .await?;

        // The user explicitly asking for the draft is sufficient on
        // its own; skip another interview turn.
        if ready_to_compile(&transcript, Stage::Brief) {
            return self.compile(ctx, &transcript).await;
        }
        self.ask_next_question(ctx, &transcript).await
    }
}
