//! Ideas, notes and everything the bot could not place

use async_trait::async_trait;
use serde_json::json;

use super::{HandlerContext, HandlerResponse, IntentHandler, Services, quote, subject};
use crate::db::NoteKind;
use crate::intent::{IntentResult, UserIntent};
use crate::Result;

async fn save_note(
    services: &Services,
    result: &IntentResult,
    kind: NoteKind,
) -> Result<HandlerResponse> {
    let content = subject(result, "content");
    if content.is_empty() {
        return Ok(HandlerResponse::failure("🤔 No encontré nada que guardar."));
    }
    let note = services.inbox.add_note(kind, &content)?;
    let title = match kind {
        NoteKind::Idea => "💡 <b>Idea guardada</b>",
        NoteKind::Note => "📝 <b>Nota guardada</b>",
    };
    Ok(HandlerResponse::new(format!("{title}\n\n<i>{}</i>", quote(&content, 100)))
        .with_data(json!({ "note_id": note.id })))
}

pub struct IdeaHandler;

#[async_trait]
impl IntentHandler for IdeaHandler {
    fn name(&self) -> &'static str {
        "idea"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::Idea
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        save_note(services, result, NoteKind::Idea).await
    }
}

pub struct NoteHandler;

#[async_trait]
impl IntentHandler for NoteHandler {
    fn name(&self) -> &'static str {
        "note"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::Note
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        save_note(services, result, NoteKind::Note).await
    }
}

/// Parks unclassifiable messages in the inbox
pub struct UnknownHandler;

#[async_trait]
impl IntentHandler for UnknownHandler {
    fn name(&self) -> &'static str {
        "unknown"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::Unknown
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let notes = format!("Intent: unknown (confidence: {:.2})", result.confidence);
        let item = services
            .inbox
            .capture(&result.raw_message, "telegram", Some(&notes))?;
        tracing::info!(chat_id = ctx.chat_id, inbox_id = %item.id, "message saved to inbox");

        Ok(HandlerResponse::new(format!(
            "📥 <b>Guardado en Inbox</b>\n\n<i>{}</i>\n\nNo estoy seguro qué hacer con esto, así que lo guardé para que lo revises.",
            quote(&result.raw_message, 100)
        ))
        .with_data(json!({ "inbox_id": item.id })))
    }
}

/// Used for intents without a registered handler
pub struct FallbackHandler;

#[async_trait]
impl IntentHandler for FallbackHandler {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::Unknown
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let notes = format!("Fallback handler - confidence: {:.2}", result.confidence);
        let item = services
            .inbox
            .capture(&result.raw_message, "telegram", Some(&notes))?;

        Ok(HandlerResponse::new(
            "🤔 No entendí completamente tu mensaje.\n\nLo guardé en el inbox para revisarlo después.",
        )
        .with_data(json!({ "inbox_id": item.id, "intent": result.intent })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{ctx, services};

    #[tokio::test]
    async fn unknown_goes_to_inbox_with_confidence_note() {
        let services = services();
        let result = IntentResult::new(UserIntent::Unknown, 0.3, "asdf qwerty");

        let response = UnknownHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert!(response.message.contains("Guardado en Inbox"));

        let items = services.inbox.pending(10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "asdf qwerty");
        assert_eq!(items[0].notes.as_deref(), Some("Intent: unknown (confidence: 0.30)"));
    }

    #[tokio::test]
    async fn fallback_notes_its_origin() {
        let services = services();
        let result = IntentResult::new(UserIntent::GymQuery, 0.55, "cuánto entrené");

        FallbackHandler.handle(&services, &ctx(), &result).await.unwrap();
        let items = services.inbox.pending(10).unwrap();
        assert_eq!(items[0].notes.as_deref(), Some("Fallback handler - confidence: 0.55"));
    }

    #[tokio::test]
    async fn idea_prefers_content_entity() {
        let services = services();
        let result = IntentResult::new(UserIntent::Idea, 0.95, "idea: app de recetas")
            .with_entity("content", "app de recetas");

        let response = IdeaHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert!(response.message.contains("Idea guardada"));
        let ideas = services.inbox.recent_notes(NoteKind::Idea, 5).unwrap();
        assert_eq!(ideas[0].content, "app de recetas");
    }

    #[tokio::test]
    async fn escapes_user_text() {
        let result = IntentResult::new(UserIntent::Note, 0.9, "a <b> & c");
        let response = NoteHandler.handle(&services(), &ctx(), &result).await.unwrap();
        assert!(response.message.contains("a &lt;b&gt; &amp; c"));
    }
}
