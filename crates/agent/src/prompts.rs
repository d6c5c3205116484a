//! Prompt text for the planner.

use chrono::{DateTime, Local};
use parley_config::{BotConfig, LlmConfig};
use parley_core::event::Event;

use crate::action::ActionRecord;
use crate::context::UnreadSummary;

const ACTION_CATALOGUE: &str = r#"You are an autonomous agent living in group chats, connected through the Satori protocol. Each turn you pick exactly one action.

Available actions:
1. list_channels - List every channel you know about.
   Example: {"action": "list_channels"}
2. send_message - Post a message into a channel.
   Example: {"action": "send_message", "channelId": "123456", "content": "Hello!"}
3. read_unread_messages - Read and mark as read the unread messages of a channel.
   Example: {"action": "read_unread_messages", "channelId": "123456"}
4. continue - Do nothing for now and wait for new events.
   Example: {"action": "continue"}
5. break - Clear your memory of this channel and stop.
   Example: {"action": "break"}
6. sleep - Pause for a while, then decide again.
   Example: {"action": "sleep", "seconds": 30}

Rules:
- Answer with ONE JSON object describing the action and nothing else.
- No explanations, no markdown, no code fences.
- Read unread messages before replying to a channel.
- Be selective: not every message needs an answer, but reply when someone talks to you."#;

/// The fixed system turn: action catalogue, persona, language.
pub fn system_prompt(bot: &BotConfig, llm: &LlmConfig) -> String {
    let mut sections = vec![ACTION_CATALOGUE.to_string()];

    if let Some(language) = &llm.response_language {
        sections.push(format!("Respond in {language}."));
    }

    let persona = bot.personality.as_deref().unwrap_or(
        "You are friendly and conversational, concise when that fits and detailed when it helps. \
         You talk like a person in a chat, not like a formal assistant, and you answer in the language people write to you in.",
    );
    sections.push(format!("Your name is {}. {persona}", bot.name));

    sections.join("\n\n")
}

/// Everything the decision turn renders.
pub struct DecisionInput<'a> {
    pub actions: &'a [ActionRecord],
    pub unread: &'a UnreadSummary,
    pub incoming: Option<&'a Event>,
    pub now: DateTime<Local>,
}

/// The user-role turn that asks for the next action.
pub fn decision_prompt(input: &DecisionInput<'_>) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(event) = input.incoming {
        sections.push(format!("Incoming events:\n{}", render_event(event)));
    }

    sections.push("History actions:".into());
    let history = input
        .actions
        .iter()
        .map(|record| {
            let result = serde_json::to_string(&record.result).unwrap_or_default();
            format!("- Action: {}, Result: {result}", record.action)
        })
        .collect::<Vec<_>>()
        .join("\n");
    if !history.is_empty() {
        sections.push(history);
    }

    sections.push(format!(
        "Currently, it's {} on the server that hosts you.",
        input.now.format("%A, %B %-d, %Y %H:%M:%S %:z")
    ));
    sections.push(format!("You have total {} unread events.", input.unread.total));
    sections.push("Unread events count are:".into());
    let counts = input
        .unread
        .per_channel
        .iter()
        .map(|(id, n)| format!("Channel ID:{id}, Unread event count:{n}"))
        .collect::<Vec<_>>()
        .join("\n");
    if !counts.is_empty() {
        sections.push(counts);
    }

    sections.push(
        "Based on the context, what do you want to do? Choose the right action from the list of actions.".into(),
    );
    sections.push(
        "Respond with the action and parameters you choose in JSON only, without any explanation and markups."
            .into(),
    );

    sections.join("\n\n")
}

/// `- [channel] author: content`
pub fn render_event(event: &Event) -> String {
    let channel = event
        .channel_name()
        .or_else(|| event.channel_id())
        .unwrap_or("unknown");
    let author = event.author_name().unwrap_or("unknown");
    let content = event.content().unwrap_or("[No content]");
    format!("- [{channel}] {author}: {content}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionResult;
    use chrono::TimeZone;
    use parley_core::event::{EventChannel, EventMessage, EventUser};

    fn incoming() -> Event {
        Event {
            channel: Some(EventChannel {
                id: "c1".into(),
                name: Some("general".into()),
            }),
            user: Some(EventUser {
                id: "u1".into(),
                name: Some("alice".into()),
                ..EventUser::default()
            }),
            message: Some(EventMessage {
                id: "m1".into(),
                content: "hello bot".into(),
                ..EventMessage::default()
            }),
            ..Event::default()
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn system_prompt_includes_name_and_language() {
        let bot = BotConfig {
            name: "Ava".into(),
            personality: None,
        };
        let llm = LlmConfig {
            response_language: Some("Japanese".into()),
            ..LlmConfig::default()
        };
        let prompt = system_prompt(&bot, &llm);
        assert!(prompt.contains("read_unread_messages"));
        assert!(prompt.contains("Your name is Ava."));
        assert!(prompt.contains("Respond in Japanese."));
    }

    #[test]
    fn decision_prompt_renders_all_sections() {
        let actions = vec![ActionRecord {
            action: serde_json::json!({"action": "list_channels"}),
            result: ActionResult::ok("ID:c1, Name:general, Platform:qq", true),
        }];
        let unread = UnreadSummary {
            total: 3,
            per_channel: vec![("c1".into(), 2), ("c2".into(), 1)],
        };
        let event = incoming();
        let prompt = decision_prompt(&DecisionInput {
            actions: &actions,
            unread: &unread,
            incoming: Some(&event),
            now: now(),
        });

        assert!(prompt.starts_with("Incoming events:\n- [general] alice: hello bot"));
        assert!(prompt.contains(
            r#"- Action: {"action":"list_channels"}, Result: {"success":true,"shouldContinue":true,"result":"ID:c1, Name:general, Platform:qq"}"#
        ));
        assert!(prompt.contains("You have total 3 unread events."));
        assert!(prompt.contains(
            "Channel ID:c1, Unread event count:2\nChannel ID:c2, Unread event count:1"
        ));
        assert!(prompt.contains("2025"));
        assert!(prompt.ends_with("without any explanation and markups."));
    }

    #[test]
    fn decision_prompt_without_event_or_history() {
        let unread = UnreadSummary::default();
        let prompt = decision_prompt(&DecisionInput {
            actions: &[],
            unread: &unread,
            incoming: None,
            now: now(),
        });
        assert!(prompt.starts_with("History actions:\n\nCurrently"));
        assert!(prompt.contains("You have total 0 unread events."));
    }

    #[test]
    fn render_event_falls_back_to_ids() {
        let mut event = incoming();
        event.channel.as_mut().unwrap().name = None;
        event.user.as_mut().unwrap().name = None;
        assert_eq!(render_event(&event), "- [c1] u1: hello bot");
    }
}
