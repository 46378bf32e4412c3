// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read and transfer commands. Each returns the text to print.

use std::fmt::Write as _;
use std::path::Path;

use murmur_conversation::{ConversationOrchestrator, ListFilter};
use murmur_core::{ConversationMetadata, MurmurError};

pub async fn list(orchestrator: &ConversationOrchestrator, archived: bool, favorites: bool) -> String {
    let filter = ListFilter {
        archived: Some(archived),
        favorites_only: favorites,
        ..ListFilter::default()
    };
    let entries = orchestrator.list(&filter).await;
    if entries.is_empty() {
        return "no conversations".to_string();
    }
    render_entries(&entries)
}

pub async fn show(orchestrator: &ConversationOrchestrator, id: &str) -> Result<String, MurmurError> {
    let conversation = orchestrator.repository().load(id).await?;
    let mut out = String::new();
    let _ = writeln!(out, "{}  [{}]", conversation.title, conversation.id);
    let _ = writeln!(
        out,
        "created {}  updated {}  tokens {}",
        conversation.created_at, conversation.updated_at, conversation.tokens_used
    );
    if !conversation.tags.is_empty() {
        let tags: Vec<&str> = conversation.tags.iter().map(String::as_str).collect();
        let _ = writeln!(out, "tags: {}", tags.join(", "));
    }
    for message in &conversation.messages {
        let _ = write!(out, "\n{} {}: {}", message.timestamp, message.role, message.content);
        if !message.attachments.is_empty() {
            let _ = write!(out, " (+{} attachment(s))", message.attachments.len());
        }
    }
    Ok(out.trim_end().to_string())
}

pub async fn search(orchestrator: &ConversationOrchestrator, query: &str) -> Result<String, MurmurError> {
    let hits = orchestrator.search(query).await?;
    if hits.is_empty() {
        return Ok(format!("no conversations match \"{}\"", query.trim()));
    }
    Ok(render_entries(&hits))
}

pub async fn stats(orchestrator: &ConversationOrchestrator) -> Result<String, MurmurError> {
    let stats = orchestrator.stats().await?;
    Ok(format!(
        "conversations: {}\nmessages:      {}\ntokens:        {}\navg/convo:     {:.2}",
        stats.total_conversations,
        stats.total_messages,
        stats.total_tokens,
        stats.average_messages_per_conversation
    ))
}

pub async fn export(orchestrator: &ConversationOrchestrator, file: &Path) -> Result<String, MurmurError> {
    let blob = orchestrator.export_all().await?;
    tokio::fs::write(file, blob)
        .await
        .map_err(MurmurError::storage)?;
    let count = orchestrator.conversations().await.len();
    Ok(format!("exported {count} conversation(s) to {}", file.display()))
}

pub async fn import(orchestrator: &ConversationOrchestrator, file: &Path) -> Result<String, MurmurError> {
    let blob = tokio::fs::read_to_string(file)
        .await
        .map_err(MurmurError::storage)?;
    let report = orchestrator.import_all(&blob).await?;
    Ok(format!(
        "imported {} conversation(s), skipped {} already present",
        report.imported, report.skipped
    ))
}

fn render_entries(entries: &[ConversationMetadata]) -> String {
    entries
        .iter()
        .map(|entry| {
            let marker = if entry.is_favorite { '*' } else { ' ' };
            let mut line = format!(
                "{marker} {}  {}  ({} msgs, {})",
                entry.id, entry.title, entry.message_count, entry.last_activity
            );
            if let Some(preview) = &entry.last_message {
                let _ = write!(line, "\n    {preview}");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use murmur_config::MurmurConfig;
    use murmur_conversation::NoopMirror;
    use murmur_core::NewMessage;
    use murmur_storage::MemoryStore;

    fn orchestrator() -> ConversationOrchestrator {
        ConversationOrchestrator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(NoopMirror),
            &MurmurConfig::default(),
        )
    }

    #[tokio::test]
    async fn list_hides_archived_by_default() {
        let orch = orchestrator();
        let kept = orch.create_conversation(None, Some("Kept".into())).await.unwrap();
        let gone = orch.create_conversation(None, Some("Gone".into())).await.unwrap();
        orch.toggle_archive(&gone.id).await.unwrap();

        let active = list(&orch, false, false).await;
        assert!(active.contains(&kept.id));
        assert!(!active.contains(&gone.id));

        let archived = list(&orch, true, false).await;
        assert!(archived.contains(&gone.id));
        assert_eq!(list(&orch, false, true).await, "no conversations");
    }

    #[tokio::test]
    async fn show_prints_messages_in_order() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        orch.add_message(&conv.id, NewMessage::user("first")).await.unwrap();
        orch.add_message(&conv.id, NewMessage::assistant("second")).await.unwrap();

        let out = show(&orch, &conv.id).await.unwrap();
        let first = out.find("first").unwrap();
        let second = out.find("second").unwrap();
        assert!(first < second);
        assert!(show(&orch, "missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn search_reports_no_matches() {
        let orch = orchestrator();
        orch.create_conversation(None, None).await.unwrap();
        let out = search(&orch, "  zebra ").await.unwrap();
        assert_eq!(out, "no conversations match \"zebra\"");
    }

    #[tokio::test]
    async fn export_then_import_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("export.json");

        let source = orchestrator();
        source.create_conversation(None, None).await.unwrap();
        let out = export(&source, &file).await.unwrap();
        assert!(out.starts_with("exported 1 conversation(s)"));

        let target = orchestrator();
        assert_eq!(
            import(&target, &file).await.unwrap(),
            "imported 1 conversation(s), skipped 0 already present"
        );
        assert_eq!(
            import(&target, &file).await.unwrap(),
            "imported 0 conversation(s), skipped 1 already present"
        );
    }

    #[tokio::test]
    async fn stats_on_empty_store() {
        let orch = orchestrator();
        let out = stats(&orch).await.unwrap();
        assert!(out.contains("conversations: 0"));
        assert!(out.contains("avg/convo:     0.00"));
    }
}
